//! Checks answered by looking for well-known files.

use async_trait::async_trait;
use openchecker_core::Command;
use serde_json::{Value, json};
use tracing::debug;

use crate::{CheckInput, Checker, Result};

const README_PATTERNS: &[&str] = &["**/README*", "**/.github/README*", "**/docs/README*"];

const MAINTAINERS_PATTERNS: &[&str] = &[
    "**/MAINTAINERS*",
    "**/COMMITTERS*",
    "**/OWNERS*",
    "**/CODEOWNERS*",
];

const README_OPENSOURCE: &str = "README.OpenSource";

const README_OPENSOURCE_KEYS: &[&str] = &[
    "Name",
    "License",
    "License File",
    "Version Number",
    "Owner",
    "Upstream URL",
    "Description",
];

pub struct ReadmeChecker;

#[async_trait]
impl Checker for ReadmeChecker {
    fn command(&self) -> Command {
        Command::ReadmeChecker
    }

    async fn check(&self, input: &CheckInput<'_>) -> Result<Value> {
        let files = input.workspace.find(README_PATTERNS, &["."]);
        Ok(json!({ "readme_file": files }))
    }
}

pub struct MaintainersChecker;

#[async_trait]
impl Checker for MaintainersChecker {
    fn command(&self) -> Command {
        Command::MaintainersChecker
    }

    async fn check(&self, input: &CheckInput<'_>) -> Result<Value> {
        let files = input.workspace.find(MAINTAINERS_PATTERNS, &["."]);
        Ok(json!({ "maintainers_file": files }))
    }
}

/// `true` when `README.OpenSource` is a JSON array of fully described components.
pub struct ReadmeOpensourceChecker;

#[async_trait]
impl Checker for ReadmeOpensourceChecker {
    fn command(&self) -> Command {
        Command::ReadmeOpensourceChecker
    }

    async fn check(&self, input: &CheckInput<'_>) -> Result<Value> {
        let Some(content) = input.workspace.read(README_OPENSOURCE).await else {
            debug!(job_id = %input.job_id, "README.OpenSource does not exist");
            return Ok(Value::Bool(false));
        };
        Ok(Value::Bool(readme_opensource_valid(&content)))
    }
}

fn readme_opensource_valid(content: &str) -> bool {
    let Ok(Value::Array(entries)) = serde_json::from_str::<Value>(content) else {
        return false;
    };
    entries.iter().all(|entry| {
        entry
            .as_object()
            .is_some_and(|o| README_OPENSOURCE_KEYS.iter().all(|k| o.contains_key(*k)))
    })
}
