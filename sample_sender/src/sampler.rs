//! Periodic classification driver.
//!
use std::time::Duration;

use anyhow::Result;
use tokio::{
    sync::mpsc,
    task::{spawn_blocking, JoinHandle},
    time::{interval, MissedTickBehavior},
};

/// Top result of one classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub label: String,
    pub confidence: f32,
}

impl Classification {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Anything producing one classification per call.
///
/// Calls run on the blocking thread pool, so implementations may block on model inference.
pub trait Classify: Send + 'static {
    /// Classify the current input, `Ok(None)` once there is nothing left to classify.
    fn classify(&mut self) -> Result<Option<Classification>>;
}

/// Call `classifier` once every `period` and send its results to `tx`.
///
/// A call always completes before the next one starts. Ticks missed during a slow call are
/// skipped rather than made up for. Failed calls are logged and produce no sample. The task ends
/// when the classifier is exhausted or panics, or when `tx` is closed.
pub fn spawn_sampler<C: Classify>(
    mut classifier: C,
    period: Duration,
    tx: mpsc::Sender<Classification>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = interval(period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticks.tick().await;

            // The classifier travels to the blocking pool and back with every call
            let result = spawn_blocking(move || {
                let result = classifier.classify();
                (classifier, result)
            })
            .await;
            let result = match result {
                Ok((returned, result)) => {
                    classifier = returned;
                    result
                }
                Err(err) => {
                    log::error!("Classifier panicked, stopping sampler: {}", err);
                    break;
                }
            };

            let classification = match result {
                Ok(Some(classification)) => classification,
                Ok(None) => {
                    log::info!("Classifier exhausted, stopping sampler");
                    break;
                }
                Err(err) => {
                    log::warn!("Classification failed, skipping cycle: {:#}", err);
                    continue;
                }
            };

            log::debug!(
                "Classified {} ({:.3})",
                &classification.label,
                classification.confidence
            );
            if tx.send(classification).await.is_err() {
                log::info!("Receiver dropped, stopping sampler");
                break;
            }
        }
    })
}
