//! Workspace and process errors.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {timeout:?}")]
    TimedOut { program: String, timeout: Duration },

    #[error("{program} exited with {}: {stderr}", describe_exit(.code))]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "signal".to_string(),
    }
}

/// Failures that make a job unable to produce any result.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("clone failed for {url}: {message}")]
    CloneFailed { url: String, message: String },

    #[error("checkout of {revision} failed: {message}")]
    CheckoutFailed { revision: String, message: String },

    #[error("lock file generation failed: {0}")]
    LockfileGeneration(String),
}

pub type Result<T> = std::result::Result<T, WorkspaceError>;
