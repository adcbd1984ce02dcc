//! Immutable message envelopes recorded by the event bus.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// One published message, wrapped with delivery metadata.
///
/// Envelopes are constructed by the bus at publish time and never mutated
/// afterwards. The `source` field is always the identifier the publisher
/// handed to `publish`; it is not read out of the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique message ID (ULID)
    pub id: String,
    /// Creation timestamp (unix ms)
    pub timestamp: i64,
    /// Topic this message was published on
    pub topic: String,
    /// Identifier of the publishing agent
    pub source: String,
    /// Opaque payload, uninterpreted by the core
    pub payload: Value,
}

impl Envelope {
    /// Create a new envelope, assigning its ID and timestamp.
    pub fn new(topic: impl Into<String>, source: impl Into<String>, payload: Value) -> Self {
        Self {
            id: generate_id(),
            timestamp: current_timestamp(),
            topic: topic.into(),
            source: source.into(),
            payload,
        }
    }
}

fn generate_id() -> String {
    ulid::Ulid::new().to_string()
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}
