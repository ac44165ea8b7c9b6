//! KDL configuration for the OpenChecker scan agent.
//!
//! This crate handles:
//! - Parsing the agent configuration file (openchecker.kdl)
//! - Environment variable overrides
//! - The reloadable credentials handle passed to checkers and the broker

pub mod agent;
pub mod credentials;
pub mod error;

pub use agent::{
    AgentConfig, BrokerConfig, CallbackConfig, LlmConfig, SonarQubeConfig, ToolsConfig,
    WorkspaceConfig, parse_agent_config,
};
pub use credentials::{Credentials, Secrets};
pub use error::{ConfigError, ConfigResult};
