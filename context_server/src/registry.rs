//! Named context channels.
//!
use std::{collections::HashMap, sync::Arc};

use tokio::sync::{watch, Mutex};

use crate::{
    aggregator::{AggregatorSettings, ContextAggregator},
    clock::Clock,
    meter::METER,
    NO_CONTEXT,
};

pub type ContextReceiver = watch::Receiver<String>;

/// Aggregator of one channel together with the watchers of its context.
struct ContextChannel {
    aggregator: Mutex<ContextAggregator>,
    context_tx: watch::Sender<String>,
}

impl ContextChannel {
    fn new(settings: AggregatorSettings) -> Self {
        let (context_tx, _) = watch::channel(NO_CONTEXT.to_owned());
        Self {
            aggregator: Mutex::new(ContextAggregator::new(settings)),
            context_tx,
        }
    }
}

/// Map from channel name to its aggregator.
///
/// Channels are created on first use. All samples of a channel go through the channel lock, which
/// makes every aggregator single-writer no matter how many connections feed it.
pub struct ContextRegistry {
    map: Mutex<HashMap<String, Arc<ContextChannel>>>,
    settings: AggregatorSettings,
    clock: Arc<dyn Clock>,
}

impl ContextRegistry {
    pub fn new(settings: AggregatorSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
            settings,
            clock,
        }
    }

    async fn get_channel(&self, name: &str) -> Arc<ContextChannel> {
        let mut map = self.map.lock().await;
        match map.get(name) {
            Some(channel) => Arc::clone(channel),
            None => {
                log::info!("Creating context channel {}", name);
                let channel = Arc::new(ContextChannel::new(self.settings));
                map.insert(name.to_owned(), Arc::clone(&channel));
                channel
            }
        }
    }

    /// Stamp a classification with the current time and feed it to the channel `name`.
    ///
    /// Returns the context of the channel after the update.
    pub async fn observe(&self, name: &str, label: &str, confidence: f32) -> String {
        let channel = self.get_channel(name).await;
        let mut aggregator = channel.aggregator.lock().await;

        // Read the clock under the lock so timestamps enter the window in order
        let timestamp = self.clock.now_ms();
        let context = aggregator.observe(label, confidence, timestamp).to_owned();
        METER.tick_observed();

        log::debug!(
            "{}: observed {} ({:.3}) at {}, {} samples in window",
            name,
            label,
            confidence,
            timestamp,
            aggregator.len()
        );

        // Watchers are only woken when the context actually changes
        channel.context_tx.send_if_modified(|current| {
            if *current == context {
                return false;
            }
            log::info!("{}: context changed from {} to {}", name, current, context);
            METER.tick_changed();
            *current = context.clone();
            true
        });

        context
    }

    /// Current context of the channel `name`, [`NO_CONTEXT`] for unknown channels.
    pub async fn current(&self, name: &str) -> String {
        let channel = {
            let map = self.map.lock().await;
            map.get(name).cloned()
        };

        match channel {
            Some(channel) => channel.aggregator.lock().await.current_aggregate().to_owned(),
            None => NO_CONTEXT.to_owned(),
        }
    }

    /// Watch the context of the channel `name`, creating the channel if needed.
    pub async fn subscribe(&self, name: &str) -> ContextReceiver {
        self.get_channel(name).await.context_tx.subscribe()
    }

    /// Names of all known channels, sorted.
    pub async fn names(&self) -> Vec<String> {
        let map = self.map.lock().await;
        let mut names: Vec<String> = map.keys().cloned().collect();
        names.sort();
        names
    }
}
