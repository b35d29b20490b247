//! Ingestion counters, logged once per period.
//!
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use tokio::{task::JoinHandle, time::interval};

pub static METER: Meter = Meter::new();

/// Counters over all channels since the last [`Meter::take`].
#[derive(Default)]
pub struct Meter {
    observed_samples: AtomicU64,
    context_changes: AtomicU64,
    rejected_frames: AtomicU64,
}

/// Counts taken out of a [`Meter`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MeterSnapshot {
    pub observed_samples: u64,
    pub context_changes: u64,
    pub rejected_frames: u64,
}

impl MeterSnapshot {
    pub fn is_idle(&self) -> bool {
        *self == MeterSnapshot::default()
    }

    /// Share of samples which moved a context, `None` without samples.
    pub fn change_ratio(&self) -> Option<f64> {
        match self.observed_samples {
            0 => None,
            observed => Some(self.context_changes as f64 / observed as f64),
        }
    }
}

impl Meter {
    pub const fn new() -> Meter {
        Meter {
            observed_samples: AtomicU64::new(0),
            context_changes: AtomicU64::new(0),
            rejected_frames: AtomicU64::new(0),
        }
    }

    pub fn tick_observed(&self) {
        self.observed_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tick_changed(&self) {
        self.context_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tick_rejected(&self) {
        self.rejected_frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Read and reset all counters.
    pub fn take(&self) -> MeterSnapshot {
        MeterSnapshot {
            observed_samples: self.observed_samples.swap(0, Ordering::Relaxed),
            context_changes: self.context_changes.swap(0, Ordering::Relaxed),
            rejected_frames: self.rejected_frames.swap(0, Ordering::Relaxed),
        }
    }
}

/// Log the global [`METER`] every `period`, staying quiet while nothing happens.
pub fn spawn_meter_logger(period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut log_interval = interval(period);
        log_interval.tick().await;

        loop {
            log_interval.tick().await;

            let snapshot = METER.take();
            if snapshot.is_idle() {
                continue;
            }

            let change_ratio = snapshot.change_ratio().unwrap_or_default() * 100.0;
            log::info!(
                "Last {:.0}s: {} samples, {} context changes ({:.0}%)",
                period.as_secs_f32(),
                snapshot.observed_samples,
                snapshot.context_changes,
                change_ratio
            );
            if snapshot.rejected_frames > 0 {
                log::warn!(
                    "Last {:.0}s: rejected {} frames",
                    period.as_secs_f32(),
                    snapshot.rejected_frames
                );
            }
        }
    })
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_take_resets() {
        let meter = Meter::new();
        meter.tick_observed();
        meter.tick_observed();
        meter.tick_changed();
        meter.tick_rejected();

        assert_eq!(
            meter.take(),
            MeterSnapshot {
                observed_samples: 2,
                context_changes: 1,
                rejected_frames: 1,
            }
        );
        assert!(meter.take().is_idle());
    }

    #[test]
    fn test_change_ratio() {
        assert_eq!(MeterSnapshot::default().change_ratio(), None);

        let snapshot = MeterSnapshot {
            observed_samples: 4,
            context_changes: 1,
            rejected_frames: 0,
        };
        assert_eq!(snapshot.change_ratio(), Some(0.25));
    }
}
