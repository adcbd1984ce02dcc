//! Agent type registry and team construction.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::agent::Agent;
use crate::bus::EventBus;
use crate::config::{merge_config, ProjectConfig};
use crate::error::{Error, Result};

/// Constructor registered for an agent type: identifier, shared bus, and the
/// merged configuration in; a contract implementation out.
pub type AgentConstructor =
    Arc<dyn Fn(String, Arc<EventBus>, Map<String, Value>) -> Result<Arc<dyn Agent>> + Send + Sync>;

/// Builds agents and named teams against one shared bus.
///
/// Configuration errors fail fast and abort the whole call; no partially
/// constructed team is ever returned. Where the configuration comes from is
/// the caller's concern (see [`crate::config`]).
pub struct AgentFactory {
    bus: Arc<EventBus>,
    registry: HashMap<String, AgentConstructor>,
}

impl AgentFactory {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            registry: HashMap::new(),
        }
    }

    /// Register (or overwrite) the constructor for `type_name`.
    ///
    /// The contract itself needs no runtime validation: a constructor can
    /// only produce values that already implement [`Agent`].
    pub fn register(&mut self, type_name: impl Into<String>, constructor: AgentConstructor) {
        let type_name = type_name.into();
        tracing::debug!(agent_type = %type_name, "registered agent type");
        self.registry.insert(type_name, constructor);
    }

    /// Registered type names, sorted for stable output.
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.registry.keys().cloned().collect();
        types.sort();
        types
    }

    /// Construct a single agent of `type_name`.
    ///
    /// The identifier comes from the config's `agent_id` field, falling back
    /// to `"<type_name>_agent"`. The whole config map is handed through to
    /// the constructor.
    pub fn create(&self, type_name: &str, config: Map<String, Value>) -> Result<Arc<dyn Agent>> {
        let constructor =
            self.registry
                .get(type_name)
                .ok_or_else(|| Error::UnknownAgentType {
                    agent_type: type_name.to_string(),
                    available: self.registered_types(),
                })?;

        let agent_id = config
            .get("agent_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{type_name}_agent"));

        tracing::debug!(agent_type = %type_name, agent = %agent_id, "creating agent");
        constructor(agent_id, Arc::clone(&self.bus), config)
    }

    /// Build a named team in one call.
    ///
    /// Every entry must carry a string `type` field; the first entry that
    /// does not aborts the whole call.
    pub fn create_team(
        &self,
        team_config: &Map<String, Value>,
    ) -> Result<HashMap<String, Arc<dyn Agent>>> {
        let mut team = HashMap::new();

        for (agent_name, config) in team_config {
            let config = as_object(agent_name, config)?;
            let agent_type = required_type(agent_name, config)?;
            team.insert(agent_name.clone(), self.create(agent_type, config.clone())?);
        }

        Ok(team)
    }

    /// Build every agent a project configuration declares: one per entry of
    /// `agents` (keyed by type) plus the named `custom_agents`, with the
    /// shared `common` block merged under each agent-specific block.
    pub fn create_project_team(
        &self,
        project: &ProjectConfig,
    ) -> Result<HashMap<String, Arc<dyn Agent>>> {
        let mut team = HashMap::new();

        for (agent_type, config) in &project.agents {
            let config = as_object(agent_type, config)?;
            let merged = merge_config(&project.common, config);
            team.insert(agent_type.clone(), self.create(agent_type, merged)?);
        }

        for (agent_name, config) in &project.custom_agents {
            let config = as_object(agent_name, config)?;
            let agent_type = required_type(agent_name, config)?.to_string();
            let merged = merge_config(&project.common, config);
            team.insert(agent_name.clone(), self.create(&agent_type, merged)?);
        }

        Ok(team)
    }
}

fn as_object<'a>(agent_name: &str, config: &'a Value) -> Result<&'a Map<String, Value>> {
    config.as_object().ok_or_else(|| {
        Error::Config(format!(
            "Agent '{agent_name}' configuration must be a JSON object"
        ))
    })
}

fn required_type<'a>(agent_name: &str, config: &'a Map<String, Value>) -> Result<&'a str> {
    config
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Config(format!("Agent '{agent_name}' missing 'type' field")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentCore;
    use crate::bus::Envelope;
    use async_trait::async_trait;
    use serde_json::json;

    struct RelayAgent {
        core: AgentCore,
        topic: Option<String>,
    }

    #[async_trait]
    impl Agent for RelayAgent {
        fn core(&self) -> &AgentCore {
            &self.core
        }

        async fn setup_subscriptions(self: Arc<Self>) -> Result<()> {
            if let Some(topic) = self.topic.clone() {
                self.clone().subscribe_to(&topic);
            }
            Ok(())
        }

        async fn process_message(&self, _envelope: &Envelope) -> Result<()> {
            Ok(())
        }

        async fn on_start(&self) -> Result<()> {
            Ok(())
        }

        async fn on_stop(&self) -> Result<()> {
            Ok(())
        }
    }

    fn relay_constructor() -> AgentConstructor {
        Arc::new(|agent_id, bus, config| {
            Ok(Arc::new(RelayAgent {
                core: AgentCore::new(agent_id, bus),
                topic: config
                    .get("topic")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }) as Arc<dyn Agent>)
        })
    }

    fn factory_with_relay() -> AgentFactory {
        let mut factory = AgentFactory::new(Arc::new(EventBus::new()));
        factory.register("relay", relay_constructor());
        factory
    }

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_create_with_default_identifier() {
        let factory = factory_with_relay();

        let agent = factory.create("relay", Map::new()).unwrap();

        assert_eq!(agent.core().id(), "relay_agent");
    }

    #[test]
    fn test_create_with_configured_identifier() {
        let factory = factory_with_relay();

        let agent = factory
            .create("relay", object(json!({"agent_id": "relay_primary"})))
            .unwrap();

        assert_eq!(agent.core().id(), "relay_primary");
    }

    #[test]
    fn test_create_unknown_type_fails() {
        let factory = factory_with_relay();

        let err = factory.create("unregistered_type", Map::new()).unwrap_err();

        assert!(matches!(err, Error::UnknownAgentType { .. }));
        let message = err.to_string();
        assert!(message.contains("unregistered_type"));
        assert!(message.contains("relay"));
    }

    #[test]
    fn test_register_overwrites_existing_type() {
        let mut factory = factory_with_relay();
        factory.register("relay", relay_constructor());

        assert_eq!(factory.registered_types(), vec!["relay"]);
    }

    #[test]
    fn test_create_team() {
        let factory = factory_with_relay();
        let team_config = object(json!({
            "ingest": {"type": "relay", "topic": "in"},
            "egress": {"type": "relay", "topic": "out", "agent_id": "egress"},
        }));

        let team = factory.create_team(&team_config).unwrap();

        assert_eq!(team.len(), 2);
        assert_eq!(team["ingest"].core().id(), "relay_agent");
        assert_eq!(team["egress"].core().id(), "egress");
    }

    #[test]
    fn test_create_team_missing_type_aborts() {
        let factory = factory_with_relay();
        let team_config = object(json!({"a": {}}));

        let err = factory.create_team(&team_config).unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        let message = err.to_string();
        assert!(message.contains("'a'"));
        assert!(message.contains("type"));
    }

    #[test]
    fn test_create_team_unknown_type_aborts() {
        let factory = factory_with_relay();
        let team_config = object(json!({"a": {"type": "unregistered_type"}}));

        let err = factory.create_team(&team_config).unwrap_err();

        assert!(err.to_string().contains("unregistered_type"));
    }

    #[tokio::test]
    async fn test_project_team_merges_common_under_specific() {
        let bus = Arc::new(EventBus::new());
        let mut factory = AgentFactory::new(bus.clone());
        factory.register("relay", relay_constructor());

        let project = ProjectConfig {
            agents: object(json!({"relay": {"topic": "own"}})),
            common: object(json!({"topic": "shared"})),
            custom_agents: object(json!({"fallback": {"type": "relay"}})),
        };

        let team = factory.create_project_team(&project).unwrap();
        assert_eq!(team.len(), 2);

        for agent in team.values() {
            agent.clone().start().await.unwrap();
        }

        // The typed agent kept its own topic; the custom agent inherited
        // the shared one.
        assert_eq!(bus.subscriber_count("own"), 1);
        assert_eq!(bus.subscriber_count("shared"), 1);
        assert_eq!(
            team["relay"].get_status().subscriptions,
            vec!["own".to_string()]
        );
        assert_eq!(
            team["fallback"].get_status().subscriptions,
            vec!["shared".to_string()]
        );
    }

    #[test]
    fn test_project_team_custom_agent_missing_type_aborts() {
        let factory = factory_with_relay();
        let project = ProjectConfig {
            custom_agents: object(json!({"ghost": {"topic": "t"}})),
            ..ProjectConfig::default()
        };

        let err = factory.create_project_team(&project).unwrap_err();

        assert!(err.to_string().contains("'ghost'"));
    }
}
