//! Drive a classifier at a fixed cadence and publish its results.
pub mod replay;
pub mod sampler;

pub use common::Error;

/// Default period between two classifications in milliseconds.
pub const SAMPLE_INTERVAL_MS: u64 = 2_000;
