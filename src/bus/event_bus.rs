//! Central message hub with topic subscriptions and a delivery log.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use super::envelope::Envelope;

/// History entries returned when callers do not pick their own limit.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Boxed future produced by a topic handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Async callback registered for a topic.
pub type TopicHandler = Arc<dyn Fn(Envelope) -> HandlerFuture + Send + Sync>;

/// Central message hub shared by every agent in a running system.
///
/// The subscriber registry and the history log are the only shared mutable
/// state in the core, and both live here. Neither ever shrinks: there is no
/// unsubscribe operation, and history is append-only. Locks guard the maps
/// but are never held across an await, so handlers are free to call back
/// into the bus.
pub struct EventBus {
    topics: Mutex<HashMap<String, Vec<TopicHandler>>>,
    history: Mutex<Vec<Envelope>>,
}

impl EventBus {
    pub fn new() -> Self {
        tracing::debug!("event bus initialized");
        Self {
            topics: Mutex::new(HashMap::new()),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Register `handler` for every future publish on `topic`.
    ///
    /// The topic entry is created lazily on first subscription. Registering
    /// the same handler twice results in duplicate deliveries; nothing is
    /// deduplicated.
    pub fn subscribe(&self, topic: impl Into<String>, handler: TopicHandler) -> bool {
        let topic = topic.into();
        let mut topics = self.topics.lock().unwrap();
        topics.entry(topic.clone()).or_default().push(handler);
        tracing::debug!(topic = %topic, "new subscription");
        true
    }

    /// Publish `payload` on `topic`, fanning out to every current subscriber.
    ///
    /// Delivery is sequential in subscription order: each handler runs to
    /// completion before the next starts, and all of them complete before
    /// this call returns. A publisher therefore observes every side effect
    /// of delivery, and one slow handler stalls the handlers behind it.
    /// With zero subscribers the envelope is still recorded in history.
    pub async fn publish(
        &self,
        topic: impl Into<String>,
        payload: Value,
        source: impl Into<String>,
    ) -> Envelope {
        let envelope = Envelope::new(topic, source, payload);

        self.history.lock().unwrap().push(envelope.clone());

        // Snapshot under the lock, deliver without it.
        let handlers: Vec<TopicHandler> = {
            let topics = self.topics.lock().unwrap();
            topics.get(&envelope.topic).cloned().unwrap_or_default()
        };

        if !handlers.is_empty() {
            tracing::debug!(
                topic = %envelope.topic,
                source = %envelope.source,
                subscribers = handlers.len(),
                "publishing"
            );
            for handler in &handlers {
                handler(envelope.clone()).await;
            }
        }

        envelope
    }

    /// Return up to the last `limit` envelopes, oldest first, optionally
    /// filtered to a single topic.
    pub fn get_history(&self, topic: Option<&str>, limit: usize) -> Vec<Envelope> {
        let history = self.history.lock().unwrap();
        let filtered: Vec<Envelope> = match topic {
            Some(t) => history.iter().filter(|e| e.topic == t).cloned().collect(),
            None => history.clone(),
        };
        let skip = filtered.len().saturating_sub(limit);
        filtered.into_iter().skip(skip).collect()
    }

    /// Topics that have at least one subscriber.
    pub fn topics(&self) -> Vec<String> {
        self.topics.lock().unwrap().keys().cloned().collect()
    }

    /// Number of handlers currently registered for `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.lock().unwrap().get(topic).map_or(0, |h| h.len())
    }

    /// Total number of envelopes recorded so far.
    pub fn history_len(&self) -> usize {
        self.history.lock().unwrap().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
