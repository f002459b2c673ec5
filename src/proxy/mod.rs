//! Stream proxying
//!
//! - [`upstream_headers`]: which device an upstream expects to talk to
//! - [`http_stream`]: relaying the media body with byte-range support

pub mod http_stream;
pub mod upstream_headers;

pub use http_stream::{error_response, preflight_response, proxy_resolved, proxy_stream};
pub use upstream_headers::UpstreamProfile;
