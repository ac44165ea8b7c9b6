//! Checker errors.
//!
//! Any of these ends up in the job's results as `{"error": "<message>"}`.

use openchecker_core::Command;
use openchecker_workspace::{ProcessError, WorkspaceError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckerError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("{service} returned HTTP {status}")]
    Api { service: &'static str, status: u16 },

    #[error("Commit hash is required for {0}")]
    MissingCommitHash(Command),

    #[error("{0}")]
    Tool(String),
}

pub type Result<T> = std::result::Result<T, CheckerError>;
