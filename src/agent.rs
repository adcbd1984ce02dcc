//! Agent lifecycle contract and message dispatch.
//!
//! Every worker on the bus embeds an [`AgentCore`] and implements the
//! [`Agent`] trait. The trait's default methods carry the lifecycle state
//! machine (start/stop), the bus-facing dispatch wrapper, and status
//! introspection; implementors only supply the hooks.

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bus::{Envelope, EventBus, HandlerFuture};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct AgentState {
    running: bool,
    started_at: Option<i64>,
    subscriptions: Vec<String>,
}

/// State shared by every agent: identity, bus handle, and lifecycle
/// bookkeeping.
///
/// The subscription list kept here is the agent's own record for
/// introspection. The bus maintains its registry independently and never
/// reads it, so after `stop()` the two intentionally diverge: the local
/// list is cleared while the bus-side callbacks remain registered.
pub struct AgentCore {
    id: String,
    bus: Arc<EventBus>,
    state: Mutex<AgentState>,
}

impl AgentCore {
    pub fn new(id: impl Into<String>, bus: Arc<EventBus>) -> Self {
        let id = id.into();
        tracing::debug!(agent = %id, "agent initialized");
        Self {
            id,
            bus,
            state: Mutex::new(AgentState::default()),
        }
    }

    /// Unique identifier of this agent.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The shared bus this agent talks through.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().running
    }

    /// Transition Created/Stopped -> Running. False if already running.
    fn mark_started(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.running {
            return false;
        }
        state.running = true;
        state.started_at = Some(current_timestamp());
        true
    }

    /// Transition Running -> Stopped. False if not running.
    fn mark_stopped(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if !state.running {
            return false;
        }
        state.running = false;
        true
    }

    fn record_subscription(&self, topic: &str) {
        self.state
            .lock()
            .unwrap()
            .subscriptions
            .push(topic.to_string());
    }

    fn clear_subscriptions(&self) {
        self.state.lock().unwrap().subscriptions.clear();
    }

    /// Point-in-time status snapshot, no side effects.
    pub fn status(&self) -> AgentStatus {
        let state = self.state.lock().unwrap();
        let uptime_seconds = state
            .started_at
            .map(|started| (current_timestamp() - started) as f64 / 1000.0);
        AgentStatus {
            agent_id: self.id.clone(),
            running: state.running,
            started_at: state.started_at,
            uptime_seconds,
            subscriptions: state.subscriptions.clone(),
        }
    }
}

/// Snapshot returned by [`Agent::get_status`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    pub agent_id: String,
    pub running: bool,
    /// Unix ms of the most recent start, if the agent ever started.
    pub started_at: Option<i64>,
    pub uptime_seconds: Option<f64>,
    pub subscriptions: Vec<String>,
}

/// Contract every worker on the bus implements.
///
/// Implementors supply the four hooks (and may override `on_error`); the
/// default methods provide the lifecycle machinery. Agents are always
/// handled as `Arc<dyn Agent>` so their dispatch wrapper can outlive the
/// call that registered it.
#[async_trait]
pub trait Agent: Send + Sync + 'static {
    /// The shared core this agent embeds.
    fn core(&self) -> &AgentCore;

    /// Register topic subscriptions. Runs inside `start()`, before
    /// `on_start`. Use [`Agent::subscribe_to`] for each topic of interest.
    async fn setup_subscriptions(self: Arc<Self>) -> Result<()>;

    /// Handle one envelope from a subscribed topic.
    async fn process_message(&self, envelope: &Envelope) -> Result<()>;

    /// Startup side effects, after subscriptions are in place.
    async fn on_start(&self) -> Result<()>;

    /// Cleanup when the agent stops.
    async fn on_stop(&self) -> Result<()>;

    /// Called when `process_message` fails. Default: log and continue.
    async fn on_error(&self, error: &Error, envelope: Option<&Envelope>) {
        match envelope {
            Some(e) => tracing::error!(
                agent = %self.core().id(),
                topic = %e.topic,
                %error,
                "message handler failed"
            ),
            None => tracing::error!(agent = %self.core().id(), %error, "agent error"),
        }
    }

    /// Start the agent: record the start time, run `setup_subscriptions`,
    /// then `on_start`, both to completion before returning. Starting a
    /// running agent warns and does nothing.
    async fn start(self: Arc<Self>) -> Result<()> {
        if !self.core().mark_started() {
            tracing::warn!(agent = %self.core().id(), "already running, start ignored");
            return Ok(());
        }
        self.clone().setup_subscriptions().await?;
        self.on_start().await?;
        tracing::info!(agent = %self.core().id(), "agent started");
        Ok(())
    }

    /// Stop the agent: run `on_stop`, then clear the local subscription
    /// records. Stopping a non-running agent warns and does nothing.
    ///
    /// The bus keeps the registered callbacks (it has no unsubscribe);
    /// `handle_message` drops deliveries while the agent is stopped.
    async fn stop(&self) -> Result<()> {
        if !self.core().mark_stopped() {
            tracing::warn!(agent = %self.core().id(), "not running, stop ignored");
            return Ok(());
        }
        self.on_stop().await?;
        self.core().clear_subscriptions();
        tracing::info!(agent = %self.core().id(), "agent stopped");
        Ok(())
    }

    /// Publish on the bus with this agent's identifier as the source.
    async fn publish_message(&self, topic: &str, payload: Value) -> Envelope {
        self.core()
            .bus()
            .publish(topic, payload, self.core().id())
            .await
    }

    /// Subscribe this agent's dispatch wrapper to `topic` and record the
    /// topic in the local bookkeeping.
    fn subscribe_to(self: Arc<Self>, topic: &str) {
        let agent = self.clone();
        self.core().bus().subscribe(
            topic,
            Arc::new(move |envelope: Envelope| -> HandlerFuture {
                let agent = agent.clone();
                Box::pin(async move { agent.handle_message(envelope).await })
            }),
        );
        self.core().record_subscription(topic);
        tracing::debug!(agent = %self.core().id(), topic = %topic, "subscribed");
    }

    /// Bus-facing dispatch wrapper.
    ///
    /// Drops the agent's own envelopes (self-message suppression), drops
    /// deliveries while stopped, and routes `process_message` failures to
    /// `on_error`. Errors never propagate into the bus delivery loop, so a
    /// failing agent cannot break delivery to subscribers behind it.
    async fn handle_message(self: Arc<Self>, envelope: Envelope) {
        if envelope.source == self.core().id() {
            return;
        }
        if !self.core().is_running() {
            tracing::debug!(
                agent = %self.core().id(),
                topic = %envelope.topic,
                "dropping delivery while stopped"
            );
            return;
        }
        if let Err(error) = self.process_message(&envelope).await {
            self.on_error(&error, Some(&envelope)).await;
        }
    }

    /// Current status snapshot.
    fn get_status(&self) -> AgentStatus {
        self.core().status()
    }
}

impl std::fmt::Debug for dyn Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent").field("id", &self.core().id()).finish()
    }
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}
