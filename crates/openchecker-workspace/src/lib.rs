//! Workspace management for the OpenChecker scan agent.
//!
//! This crate provides:
//! - [`WorkspaceManager`]: materializes one job-scoped working copy per job
//! - [`Workspace`]: pin, read, find, lock-file preparation and teardown
//! - [`ToolRunner`]: external process execution with an optional timeout

pub mod error;
pub mod manager;
pub mod process;
pub mod workspace;

pub use error::{ProcessError, WorkspaceError};
pub use manager::{GitFetcher, RepoFetcher, WorkspaceManager, WorkspaceStats};
pub use process::{ToolOutput, ToolRunner};
pub use workspace::{FileAlias, Workspace};
