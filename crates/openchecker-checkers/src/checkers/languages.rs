use async_trait::async_trait;
use openchecker_core::Command;
use serde_json::Value;

use super::workspace_arg;
use crate::{CheckInput, Checker, Result};

/// Language breakdown from `github-linguist`.
pub struct LanguagesDetector;

#[async_trait]
impl Checker for LanguagesDetector {
    fn command(&self) -> Command {
        Command::LanguagesDetector
    }

    async fn check(&self, input: &CheckInput<'_>) -> Result<Value> {
        let ws = input.workspace;
        let output = ws
            .runner()
            .run(
                "github-linguist",
                [workspace_arg(ws).as_str(), "--breakdown", "--json"],
                ws.path(),
            )
            .await?;
        Ok(serde_json::from_str(&output.stdout)?)
    }
}
