//! swarmbus library root.
//!
//! An in-process coordination kernel for teams of long-lived workers that
//! communicate exclusively through named topics on a shared [`EventBus`].
//! Workers implement the [`Agent`] contract; an [`AgentFactory`] assembles
//! named teams of them from configuration.

pub mod agent;
pub mod bus;
pub mod config;
pub mod error;
pub mod factory;
pub mod logging;

pub use agent::{Agent, AgentCore, AgentStatus};
pub use bus::{Envelope, EventBus};
pub use config::{load_project_config, merge_config, ProjectConfig};
pub use error::{Error, Result};
pub use factory::{AgentConstructor, AgentFactory};
