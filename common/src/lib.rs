//! Common code shared between `context_server` and `sample_sender`.
pub mod protocol;

/// Error type.
pub type Error = Box<dyn std::error::Error + Send + Sync>;
