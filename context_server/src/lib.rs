//! Smooth a noisy stream of per-frame classifications into a stable scene context.
//!
//! Classification samples arrive over the data socket, are stamped on arrival and fed into one
//! [`aggregator::ContextAggregator`] per named channel. The current context of every channel is
//! served over HTTP.

pub mod aggregator;
pub mod clock;
pub mod data_socket;
pub mod endpoints;
pub mod meter;
pub mod registry;

pub use common::Error;

/// Default length of the trailing vote window in milliseconds.
pub const WINDOW_MS: u64 = 10_000;

/// Context reported while no sample is inside the window.
pub const NO_CONTEXT: &str = "N/A";

/// Channel name used when a request does not name one.
pub const DEFAULT_CHANNEL: &str = "default";
