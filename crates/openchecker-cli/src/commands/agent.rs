//! Long-running agent command.

use anyhow::{Context, Result};
use openchecker_config::Credentials;
use openchecker_scheduler::{AmqpBroker, QueueConsumer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::{build_dispatcher, load_config};

/// Consume jobs until Ctrl-C. SIGHUP re-reads credentials from the config.
pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let credentials = Credentials::from_config(&config);

    tokio::fs::create_dir_all(&config.workspace.root)
        .await
        .with_context(|| {
            format!(
                "Failed to create workspace root: {}",
                config.workspace.root.display()
            )
        })?;

    let dispatcher = build_dispatcher(&config, credentials.clone())?;
    let broker = AmqpBroker::new(config.broker.clone(), credentials.clone());
    let consumer = QueueConsumer::new(
        Arc::new(broker),
        Arc::new(dispatcher),
        config.broker.heartbeat_interval,
        config.broker.reconnect_delay,
    );

    let shutdown = CancellationToken::new();
    spawn_shutdown_handler(shutdown.clone());
    spawn_reload_handler(credentials, config_path.map(Path::to_path_buf))?;

    info!(
        host = %config.broker.host,
        port = config.broker.port,
        queue = %config.broker.queue,
        workspace_root = %config.workspace.root.display(),
        "Starting agent"
    );

    consumer
        .run(shutdown)
        .await
        .context("Queue consumer stopped with an error")?;

    info!("Agent stopped");
    Ok(())
}

fn spawn_shutdown_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested, finishing the current job");
                shutdown.cancel();
            }
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });
}

#[cfg(unix)]
fn spawn_reload_handler(credentials: Credentials, config_path: Option<PathBuf>) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("SIGHUP received, reloading credentials");
            if let Err(e) = credentials.reload_from(config_path.as_deref()) {
                error!(error = %e, "Credential reload failed, keeping current credentials");
            }
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn spawn_reload_handler(_credentials: Credentials, _config_path: Option<PathBuf>) -> Result<()> {
    Ok(())
}
