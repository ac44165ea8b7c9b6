//! Local single-job scan command.

use anyhow::{Context, Result};
use openchecker_config::Credentials;
use openchecker_core::JobMessage;
use openchecker_scheduler::JobEvent;
use std::path::Path;
use tokio::sync::mpsc;

use super::{build_dispatcher, load_config};

/// Run one job from a file and print its progress and payload.
pub async fn run(config_path: Option<&Path>, job_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;

    let body = tokio::fs::read(job_path)
        .await
        .with_context(|| format!("Failed to read job file: {}", job_path.display()))?;
    let job = JobMessage::decode(&body)
        .and_then(JobMessage::validate)
        .with_context(|| format!("Invalid job: {}", job_path.display()))?;

    println!("Scanning: {}", job.project);
    println!("Commands: {}", job.command_list.join(", "));

    let (tx, mut rx) = mpsc::channel(64);
    let dispatcher = build_dispatcher(&config, Credentials::from_config(&config))?.with_events(tx);

    // The dispatcher owns the only sender; the channel closes when the job ends.
    let handle = tokio::spawn(async move { dispatcher.run(job).await });

    println!("\n--- Starting scan ---\n");
    while let Some(event) = rx.recv().await {
        match event {
            JobEvent::JobStarted { job_id, .. } => {
                println!("Job {}", job_id);
            }
            JobEvent::CheckerStarted { command, .. } => {
                println!("▶ '{}' started", command);
            }
            JobEvent::CheckerCompleted {
                command, success, ..
            } => {
                if success {
                    println!("✓ '{}' completed", command);
                } else {
                    println!("✗ '{}' failed", command);
                }
            }
            JobEvent::CheckerSkipped {
                command, reason, ..
            } => {
                println!("⊘ '{}' skipped: {}", command, reason);
            }
            JobEvent::JobCompleted { success, .. } => {
                if success {
                    println!("\n--- Scan completed ---");
                } else {
                    println!("\n--- Scan failed ---");
                }
            }
        }
    }

    let payload = handle
        .await
        .context("Scan task failed")?
        .context("Job failed")?;

    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("Failed to render payload")?
    );
    Ok(())
}
