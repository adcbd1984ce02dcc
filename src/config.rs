//! Project configuration consumed by the agent factory.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use crate::error::{Error, Result};

/// Structured project configuration.
///
/// `agents` is keyed by agent type, `custom_agents` by agent name (each
/// entry carrying its own `type` field), and `common` holds fields shared
/// by every agent in the project. The factory consumes this value as-is;
/// loading it from a file is a convenience and callers are free to build
/// it from any other origin.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ProjectConfig {
    #[serde(default)]
    pub agents: Map<String, Value>,

    #[serde(default)]
    pub common: Map<String, Value>,

    #[serde(default)]
    pub custom_agents: Map<String, Value>,
}

/// Load a project configuration from a JSON file.
pub fn load_project_config(path: impl AsRef<Path>) -> Result<ProjectConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(Error::Config(format!(
            "Project config not found: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let config: ProjectConfig = serde_json::from_str(&content)?;

    tracing::debug!(path = %path.display(), "loaded project config");
    Ok(config)
}

/// Merge a shared config block under agent-specific overrides.
///
/// Shallow, per-field: on a conflicting key the agent-specific value wins
/// outright, nested objects are not merged recursively.
pub fn merge_config(common: &Map<String, Value>, specific: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = common.clone();
    for (key, value) in specific {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
