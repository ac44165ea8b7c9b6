//! CLI command implementations.

pub mod agent;
pub mod scan;

use anyhow::{Context, Result};
use openchecker_checkers::{CheckerContext, CheckerRegistry, Requires};
use openchecker_config::{AgentConfig, Credentials};
use openchecker_scheduler::{AmqpBroker, CallbackClient, JobDispatcher};
use openchecker_workspace::{ToolRunner, WorkspaceManager};
use std::path::Path;
use std::sync::Arc;

pub(crate) fn load_config(path: Option<&Path>) -> Result<AgentConfig> {
    AgentConfig::load(path).context("Failed to load configuration")
}

pub(crate) fn build_registry(config: &AgentConfig, credentials: Credentials) -> Result<CheckerRegistry> {
    let context = CheckerContext::from_config(config, credentials)
        .context("Failed to create checker context")?;
    Ok(CheckerRegistry::builtin(context))
}

/// Wire workspaces, checkers and callback delivery into a dispatcher.
pub(crate) fn build_dispatcher(config: &AgentConfig, credentials: Credentials) -> Result<JobDispatcher> {
    let runner = ToolRunner::new(config.tools.timeout);
    let workspaces = WorkspaceManager::with_git(config.workspace.root.clone(), runner);
    let registry = build_registry(config, credentials)?;
    let callback =
        CallbackClient::from_config(&config.callback).context("Failed to create callback client")?;

    Ok(JobDispatcher::new(
        Arc::new(workspaces),
        Arc::new(registry),
        callback,
    ))
}

/// Load and check a configuration, printing a short summary when it is valid.
pub fn validate(path: Option<&Path>) -> Result<()> {
    let config = AgentConfig::load(path).context("Configuration is invalid")?;

    println!("Configuration is valid");
    println!(
        "  broker:    {}:{} (queue '{}')",
        config.broker.host, config.broker.port, config.broker.queue
    );
    println!("  workspace: {}", config.workspace.root.display());
    println!(
        "  callback:  {} retries, x{} backoff",
        config.callback.max_retries, config.callback.backoff_multiplier
    );
    println!(
        "  sonarqube: {}",
        config
            .sonarqube
            .as_ref()
            .map(|s| s.base_url())
            .unwrap_or_else(|| "not configured".to_string())
    );
    println!(
        "  llm:       {}",
        config
            .llm
            .as_ref()
            .map(|l| format!("{} ({})", l.base_url, l.model))
            .unwrap_or_else(|| "not configured".to_string())
    );
    Ok(())
}

pub fn checkers(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let registry = build_registry(&config, Credentials::from_config(&config))?;

    for command in registry.commands() {
        let input = match registry.get(command).map(|c| c.requires()) {
            Some(Requires::ProjectUrl) => "project url",
            Some(Requires::WorkspaceAndCommit) => "workspace + commit",
            _ => "workspace",
        };
        println!("  {:<36} {}", command.as_str(), input);
    }
    println!("\n{} checkers registered", registry.len());
    Ok(())
}

pub async fn status(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let broker = AmqpBroker::new(config.broker.clone(), Credentials::from_config(&config));

    let status = broker
        .queue_status()
        .await
        .with_context(|| format!("Failed to query queue '{}'", config.broker.queue))?;

    println!("Queue:     {}", config.broker.queue);
    println!("Messages:  {}", status.messages);
    println!("Consumers: {}", status.consumers);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use openchecker_config::ConfigError;

    #[test]
    fn test_validate_returns_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openchecker.kdl");
        std::fs::write(&path, r#"broker { port 0 }"#).unwrap();

        let err = validate(Some(&path)).unwrap_err();
        assert_eq!(err.to_string(), "Configuration is invalid");
        let cause = err.downcast_ref::<ConfigError>().unwrap();
        assert_eq!(cause.setting().as_deref(), Some("broker.port"));
    }

    #[test]
    fn test_validate_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate(Some(&dir.path().join("missing.kdl"))).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_validate_accepts_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openchecker.kdl");
        std::fs::write(&path, r#"broker { queue "scans" }"#).unwrap();
        validate(Some(&path)).unwrap();
    }
}
