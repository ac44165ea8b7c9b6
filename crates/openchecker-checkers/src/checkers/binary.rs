use async_trait::async_trait;
use openchecker_core::Command;
use serde_json::{Value, json};
use std::sync::Arc;

use super::workspace_arg;
use crate::{CheckInput, Checker, CheckerContext, Result};

/// Binary artifacts reported by the configured detection script.
pub struct BinaryChecker {
    ctx: Arc<CheckerContext>,
}

impl BinaryChecker {
    pub fn new(ctx: Arc<CheckerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Checker for BinaryChecker {
    fn command(&self) -> Command {
        Command::BinaryChecker
    }

    async fn check(&self, input: &CheckInput<'_>) -> Result<Value> {
        let ws = input.workspace;
        // Relative script paths resolve against the agent's working directory.
        let cwd = std::env::current_dir()?;
        let script = self.ctx.tools.binary_checker.to_string_lossy();

        let output = ws
            .runner()
            .run(script.as_ref(), [workspace_arg(ws)], &cwd)
            .await?;
        Ok(parse_report(&output.stdout))
    }
}

fn parse_report(stdout: &str) -> Value {
    let mut files = Vec::new();
    let mut archives = Vec::new();

    for line in stdout.lines() {
        if let Some((_, path)) = line.split_once("Binary file found: ") {
            files.push(path.trim());
        } else if let Some((_, path)) = line.split_once("Binary archive found: ") {
            archives.push(path.trim());
        }
    }

    json!({
        "binary_file_list": files,
        "binary_archive_list": archives,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkers::testing::fixture;
    use openchecker_config::{Credentials, ToolsConfig};
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_parse_report() {
        let stdout = "scanning...\n\
                      Binary file found: /ws/lib/libfoo.so\n\
                      Binary archive found: /ws/vendor/bundle.jar\n\
                      done\n";
        assert_eq!(
            parse_report(stdout),
            json!({
                "binary_file_list": ["/ws/lib/libfoo.so"],
                "binary_archive_list": ["/ws/vendor/bundle.jar"]
            })
        );
    }

    #[tokio::test]
    async fn test_runs_configured_script() {
        let scripts = tempfile::tempdir().unwrap();
        let script = scripts.path().join("binary_checker.sh");
        std::fs::write(&script, "#!/bin/sh\necho \"Binary file found: $1/app.exe\"\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let tools = ToolsConfig {
            binary_checker: script,
            ..ToolsConfig::default()
        };
        let ctx = CheckerContext::new(Credentials::default(), tools).unwrap();
        let fx = fixture(&[]).await;

        let result = BinaryChecker::new(Arc::new(ctx))
            .check(&fx.input())
            .await
            .unwrap();
        let expected = format!("{}/app.exe", fx.workspace.path().display());
        assert_eq!(result["binary_file_list"], json!([expected]));
        assert_eq!(result["binary_archive_list"], json!([]));
    }
}
