//! Rolling majority vote over classification samples.
//!
use std::collections::{HashMap, VecDeque};

use crate::{NO_CONTEXT, WINDOW_MS};

/// One classification observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub label: String,
    pub confidence: f32,
    /// Milliseconds since an arbitrary fixed epoch.
    pub timestamp: u64,
}

/// How a sample contributes to the vote of its label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AggregationMode {
    /// Every sample counts once, confidence is ignored.
    #[default]
    Count,
    /// Every sample counts with its confidence. Alternative to the plain majority vote.
    ConfidenceWeighted,
}

impl AggregationMode {
    fn weight(&self, sample: &Sample) -> f64 {
        match self {
            AggregationMode::Count => 1.0,
            AggregationMode::ConfidenceWeighted => f64::from(sample.confidence),
        }
    }
}

/// Tunables of a [`ContextAggregator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregatorSettings {
    pub window_ms: u64,
    pub mode: AggregationMode,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            window_ms: WINDOW_MS,
            mode: AggregationMode::Count,
        }
    }
}

/// Time-windowed majority vote over classification labels.
///
/// The window is anchored at the latest observed timestamp: samples only age out when a new sample
/// arrives, an idle aggregator keeps reporting its last context.
#[derive(Debug, Clone, Default)]
pub struct ContextAggregator {
    window: VecDeque<Sample>,
    settings: AggregatorSettings,
}

impl ContextAggregator {
    /// Create an empty aggregator with the given settings.
    pub fn new(settings: AggregatorSettings) -> Self {
        Self {
            window: VecDeque::new(),
            settings,
        }
    }

    /// Record a sample and return the context of the updated window.
    ///
    /// Every sample at least `window_ms` older than `timestamp` is evicted, so a sample exactly
    /// `window_ms` old is gone. Inputs are not validated. An out-of-order `timestamp` gives newer
    /// samples an age of zero, which keeps them in the window.
    pub fn observe(&mut self, label: impl Into<String>, confidence: f32, timestamp: u64) -> &str {
        self.window.push_back(Sample {
            label: label.into(),
            confidence,
            timestamp,
        });

        let window_ms = self.settings.window_ms;
        self.window
            .retain(|sample| timestamp.saturating_sub(sample.timestamp) < window_ms);

        self.current_aggregate()
    }

    /// Context of the current window, [`NO_CONTEXT`] if the window is empty.
    ///
    /// Tallies are rebuilt from the whole window on every call. Among labels with the same
    /// tally, the one appearing first in the window wins.
    pub fn current_aggregate(&self) -> &str {
        // Tallies in order of first appearance, oldest to newest
        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut tallies: Vec<(&str, f64)> = Vec::new();

        for sample in self.window.iter() {
            let weight = self.settings.mode.weight(sample);
            match positions.get(sample.label.as_str()) {
                Some(&idx) => tallies[idx].1 += weight,
                None => {
                    positions.insert(sample.label.as_str(), tallies.len());
                    tallies.push((sample.label.as_str(), weight));
                }
            }
        }

        let mut candidates = tallies.into_iter();
        match candidates.next() {
            None => NO_CONTEXT,
            Some(first) => {
                // Only a strictly larger tally takes over, ties stay with the earlier label
                candidates
                    .fold(first, |winner, candidate| match candidate.1 > winner.1 {
                        true => candidate,
                        false => winner,
                    })
                    .0
            }
        }
    }

    /// Retained samples, oldest first.
    pub fn window(&self) -> impl Iterator<Item = &Sample> {
        self.window.iter()
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn window_ms(&self) -> u64 {
        self.settings.window_ms
    }

    pub fn mode(&self) -> AggregationMode {
        self.settings.mode
    }
}
