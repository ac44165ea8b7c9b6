use async_trait::async_trait;
use openchecker_core::Command;
use serde_json::Value;
use tracing::warn;

use super::workspace_arg;
use crate::{CheckInput, Checker, Result};

/// Vulnerability scan with `osv-scanner`.
///
/// OpenHarmony lock files are presented to the scanner as npm lock files for
/// the duration of the run.
pub struct OsvScanner;

#[async_trait]
impl Checker for OsvScanner {
    fn command(&self) -> Command {
        Command::OsvScanner
    }

    async fn check(&self, input: &CheckInput<'_>) -> Result<Value> {
        let ws = input.workspace;
        let alias = ws
            .alias_file("oh-package-lock.json5", "package-lock.json")
            .await?;

        // Exit code 1 means vulnerabilities were found.
        let output = ws
            .runner()
            .run_accepting(
                "osv-scanner",
                ["--format", "json", "-r", workspace_arg(ws).as_str()],
                ws.path(),
                &[0, 1],
            )
            .await;

        if let Some(alias) = alias {
            if let Err(e) = alias.restore().await {
                warn!(job_id = %input.job_id, error = %e, "Failed to restore oh-package-lock.json5");
            }
        }

        Ok(serde_json::from_str(&output?.stdout)?)
    }
}
