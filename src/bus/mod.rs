//! Publish/subscribe messaging core.
//!
//! One `EventBus` instance is shared by every agent in a running system:
//! - Topic-keyed subscriber registry, delivery in subscription order
//! - Immutable message envelopes with IDs and timestamps
//! - Append-only envelope history for auditing

pub mod envelope;
pub mod event_bus;

pub use envelope::Envelope;
pub use event_bus::{EventBus, HandlerFuture, TopicHandler, DEFAULT_HISTORY_LIMIT};
