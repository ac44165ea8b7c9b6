use async_trait::async_trait;
use openchecker_core::Command;
use serde_json::Value;

use super::{path_arg, workspace_arg};
use crate::{CheckInput, Checker, Result};

/// License and copyright scan with `scancode`.
pub struct Scancode;

#[async_trait]
impl Checker for Scancode {
    fn command(&self) -> Command {
        Command::Scancode
    }

    async fn check(&self, input: &CheckInput<'_>) -> Result<Value> {
        let ws = input.workspace;
        let report = ws.scratch_dir().join("scancode.json");

        ws.runner()
            .run(
                "scancode",
                [
                    "-lc".to_string(),
                    "--json-pp".to_string(),
                    path_arg(&report),
                    workspace_arg(ws),
                    "--license-score".to_string(),
                    "90".to_string(),
                    "-n".to_string(),
                    "4".to_string(),
                ],
                &ws.scratch_dir(),
            )
            .await?;

        let content = tokio::fs::read_to_string(&report).await?;
        Ok(serde_json::from_str(&content)?)
    }
}
