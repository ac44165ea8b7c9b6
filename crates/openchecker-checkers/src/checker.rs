//! The checker trait.

use async_trait::async_trait;
use openchecker_core::{Command, JobId, ProjectUrl};
use openchecker_workspace::Workspace;
use serde_json::Value;

use crate::{CheckerError, Result};

/// What a checker needs from the job before it can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requires {
    /// The materialized workspace.
    Workspace,
    /// Only the parsed project URL; the workspace is left alone.
    ProjectUrl,
    /// The workspace plus the job's `commit_hash`.
    WorkspaceAndCommit,
}

/// Everything a checker may read for one job.
#[derive(Debug, Clone, Copy)]
pub struct CheckInput<'a> {
    pub job_id: JobId,
    pub project: &'a ProjectUrl,
    pub workspace: &'a Workspace,
    pub commit_hash: Option<&'a str>,
}

impl<'a> CheckInput<'a> {
    pub fn commit_hash(&self, command: Command) -> Result<&'a str> {
        self.commit_hash
            .ok_or(CheckerError::MissingCommitHash(command))
    }
}

/// A single scan.
///
/// Checkers never see each other's results. A returned error (or a panic) is
/// recorded for this command only and the job moves on to the next one.
#[async_trait]
pub trait Checker: Send + Sync {
    /// The command this checker answers to.
    fn command(&self) -> Command;

    fn requires(&self) -> Requires {
        Requires::Workspace
    }

    async fn check(&self, input: &CheckInput<'_>) -> Result<Value>;
}
