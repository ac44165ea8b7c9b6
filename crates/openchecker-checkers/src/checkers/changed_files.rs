use async_trait::async_trait;
use openchecker_core::Command;
use openchecker_workspace::Workspace;
use serde_json::{Value, json};
use tracing::debug;

use crate::{CheckInput, Checker, Requires, Result};

/// `git diff --diff-filter` classes reported by the detector, by result key.
const DIFF_FILTERS: &[(&str, &str)] = &[
    ("changed_files", "ACDMRTUXB"),
    ("new_files", "A"),
    ("rename_files", "R"),
    ("deleted_files", "D"),
    ("modified_files", "M"),
];

/// Files changed between the job's commit and the checked-out HEAD.
pub struct ChangedFilesDetector;

impl ChangedFilesDetector {
    /// Make `commit` available in a shallow clone.
    async fn ensure_commit(ws: &Workspace, commit: &str) -> Result<()> {
        let object = format!("{}^{{commit}}", commit);
        if ws
            .runner()
            .run("git", ["cat-file", "-e", object.as_str()], ws.path())
            .await
            .is_ok()
        {
            return Ok(());
        }

        debug!(commit = %commit, "Commit not in shallow clone, fetching");
        ws.runner()
            .run("git", ["fetch", "--depth=1", "origin", commit], ws.path())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Checker for ChangedFilesDetector {
    fn command(&self) -> Command {
        Command::ChangedFilesSinceCommitDetector
    }

    fn requires(&self) -> Requires {
        Requires::WorkspaceAndCommit
    }

    async fn check(&self, input: &CheckInput<'_>) -> Result<Value> {
        let commit = input.commit_hash(self.command())?;
        let ws = input.workspace;
        Self::ensure_commit(ws, commit).await?;

        let range = format!("{}..HEAD", commit);
        let mut result = serde_json::Map::new();
        for (key, filter) in DIFF_FILTERS {
            let filter = format!("--diff-filter={}", filter);
            let output = ws
                .runner()
                .run(
                    "git",
                    ["diff", "--name-only", filter.as_str(), range.as_str()],
                    ws.path(),
                )
                .await?;
            result.insert(key.to_string(), json!(file_lines(&output.stdout)));
        }
        Ok(Value::Object(result))
    }
}

fn file_lines(stdout: &str) -> Vec<&str> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}
