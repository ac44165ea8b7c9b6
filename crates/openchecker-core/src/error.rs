//! Error types for OpenChecker.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid project URL: {0}")]
    InvalidProjectUrl(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a job could not produce (or hand off) a result payload.
///
/// Every variant leads to the queue message being rejected without requeue.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("malformed job message: {0}")]
    Malformed(String),

    #[error("Project URL is required")]
    MissingProjectUrl,

    #[error("invalid project URL: {0}")]
    InvalidProjectUrl(String),

    #[error("workspace error: {0}")]
    Workspace(String),

    #[error("callback delivery failed: {0}")]
    Delivery(String),
}

impl JobError {
    /// Message-level errors happen before any workspace exists.
    pub fn is_message_level(&self) -> bool {
        matches!(
            self,
            JobError::Malformed(_) | JobError::MissingProjectUrl | JobError::InvalidProjectUrl(_)
        )
    }
}
