//! Stream reference classification
//!
//! Decides, without touching the network, which upstream dialect governs a
//! stored channel `cmd` or URL.

pub mod classification;

pub use classification::{ClassificationResult, ClassifierInput, StreamRoute, classify, extract_url};
