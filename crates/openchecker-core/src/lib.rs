//! Core domain types for the OpenChecker scan agent.
//!
//! This crate contains:
//! - Job identifiers and the decoded queue message
//! - Project URL parsing (platform, owner, repo)
//! - The enumerated command set and unknown-token handling
//! - Scan results and the outbound callback payload
//! - Retry backoff for outbound HTTP calls

pub mod command;
pub mod error;
pub mod id;
pub mod job;
pub mod payload;
pub mod project;
pub mod retry;

pub use command::{Command, CommandToken};
pub use error::{Error, JobError, Result};
pub use id::JobId;
pub use job::{JobMessage, TaskMetadata, ValidatedJob};
pub use payload::{ResultPayload, ScanResults};
pub use project::{Platform, ProjectUrl};
pub use retry::{RetryConfig, is_transient_status};
