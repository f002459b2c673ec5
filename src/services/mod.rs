//! Service layer
//!
//! Services orchestrate the dialect clients and the catalog store for the
//! web layer:
//!
//! - [`StreamResolver`]: stored channel reference to a playable URL
//! - [`ChannelViewService`]: the customer-facing channel list with
//!   overrides applied

pub mod channel_view;
pub mod stream_resolver;

pub use channel_view::{ChannelView, ChannelViewService};
pub use stream_resolver::StreamResolver;
