//! Checkers for the OpenChecker scan agent.
//!
//! A [`Checker`] inspects one job's workspace (or just its project URL) and
//! produces a JSON result. The [`CheckerRegistry`] maps each [`Command`] to
//! its checker; the dispatcher looks commands up there.
//!
//! [`Command`]: openchecker_core::Command

pub mod checker;
pub mod checkers;
pub mod context;
pub mod error;
pub mod registry;

pub use checker::{CheckInput, Checker, Requires};
pub use context::{ApiEndpoints, CheckerContext, LLM_RETRY};
pub use error::{CheckerError, Result};
pub use registry::CheckerRegistry;
