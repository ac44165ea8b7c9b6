//! Job dispatcher - runs one job's checkers against its workspace.

use async_trait::async_trait;
use futures::FutureExt;
use openchecker_checkers::{CheckInput, CheckerError, CheckerRegistry, Requires};
use openchecker_core::{
    CommandToken, JobError, JobId, JobMessage, ResultPayload, ScanResults, ValidatedJob,
};
use openchecker_workspace::{Workspace, WorkspaceManager};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::CallbackClient;

/// What to tell the broker about a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    /// Negative-acknowledge without requeue.
    Reject,
}

/// Progress of a job, for callers that want to watch it.
#[derive(Debug, Clone)]
pub enum JobEvent {
    JobStarted { job_id: JobId, project_url: String },
    CheckerStarted { job_id: JobId, command: String },
    CheckerCompleted { job_id: JobId, command: String, success: bool },
    CheckerSkipped { job_id: JobId, command: String, reason: String },
    JobCompleted { job_id: JobId, success: bool },
}

/// Turns a raw queue message into a broker disposition.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, body: &[u8]) -> Disposition;
}

pub struct JobDispatcher {
    workspaces: Arc<WorkspaceManager>,
    registry: Arc<CheckerRegistry>,
    callback: CallbackClient,
    events: Option<mpsc::Sender<JobEvent>>,
}

impl JobDispatcher {
    pub fn new(
        workspaces: Arc<WorkspaceManager>,
        registry: Arc<CheckerRegistry>,
        callback: CallbackClient,
    ) -> Self {
        Self {
            workspaces,
            registry,
            callback,
            events: None,
        }
    }

    /// Send [`JobEvent`]s to `tx` while jobs run.
    pub fn with_events(mut self, tx: mpsc::Sender<JobEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    async fn emit(&self, event: JobEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }

    /// Run a validated job: materialize, pin, prepare, check, destroy, deliver.
    ///
    /// The workspace is destroyed exactly once whatever happens after it was
    /// created. Checker failures never fail the job; workspace and delivery
    /// failures do.
    pub async fn run(&self, job: ValidatedJob) -> Result<ResultPayload, JobError> {
        info!(job_id = %job.id, project_url = %job.project, commands = ?job.command_list, "Processing job");
        self.emit(JobEvent::JobStarted {
            job_id: job.id,
            project_url: job.project.url.clone(),
        })
        .await;

        let outcome = self.scan(&job).await;
        let result = match outcome {
            Ok(payload) => self.deliver(&job, payload).await,
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            error!(job_id = %job.id, error = %e, "Job failed");
        }
        self.emit(JobEvent::JobCompleted {
            job_id: job.id,
            success: result.is_ok(),
        })
        .await;
        result
    }

    async fn scan(&self, job: &ValidatedJob) -> Result<ResultPayload, JobError> {
        let workspace = self
            .workspaces
            .materialize(job.id, &job.project)
            .await
            .map_err(|e| JobError::Workspace(e.to_string()))?;

        let prepared = self.prepare(job, &workspace).await;
        let outcome = match prepared {
            Ok(()) => {
                let mut payload = ResultPayload::for_job(job);
                payload.scan_results = self.run_checkers(job, &workspace).await;
                Ok(payload)
            }
            Err(e) => Err(e),
        };

        workspace.destroy().await;
        outcome
    }

    async fn prepare(&self, job: &ValidatedJob, workspace: &Workspace) -> Result<(), JobError> {
        if let Some(revision) = job.task_metadata.version_number() {
            workspace
                .pin(revision)
                .await
                .map_err(|e| JobError::Workspace(e.to_string()))?;
        }
        workspace
            .prepare_lockfiles()
            .await
            .map_err(|e| JobError::Workspace(e.to_string()))
    }

    /// Run every command in order. Each occurrence of a command runs; a later
    /// occurrence overwrites the earlier result.
    async fn run_checkers(&self, job: &ValidatedJob, workspace: &Workspace) -> ScanResults {
        let mut results = ScanResults::new();
        let input = CheckInput {
            job_id: job.id,
            project: &job.project,
            workspace,
            commit_hash: job.commit_hash.as_deref(),
        };

        for token in &job.commands {
            let command = match token {
                CommandToken::Known(command) => *command,
                CommandToken::Unknown(raw) => {
                    warn!(job_id = %job.id, command = %raw, "Unknown command");
                    self.skipped(job.id, raw, "unknown command").await;
                    continue;
                }
            };
            let name = command.as_str();

            let Some(checker) = self.registry.get(command) else {
                warn!(job_id = %job.id, command = %name, "No checker registered");
                self.skipped(job.id, name, "no checker registered").await;
                continue;
            };

            self.emit(JobEvent::CheckerStarted {
                job_id: job.id,
                command: name.to_string(),
            })
            .await;

            if checker.requires() == Requires::WorkspaceAndCommit && input.commit_hash.is_none() {
                let e = CheckerError::MissingCommitHash(command);
                warn!(job_id = %job.id, command = %name, error = %e, "Checker skipped");
                results.record_failure(name, e.to_string());
                self.completed(job.id, name, false).await;
                continue;
            }

            let outcome = AssertUnwindSafe(checker.check(&input)).catch_unwind().await;
            match outcome {
                Ok(Ok(value)) => {
                    info!(job_id = %job.id, command = %name, "Checker completed");
                    results.record_success(name, value);
                    self.completed(job.id, name, true).await;
                }
                Ok(Err(e)) => {
                    error!(job_id = %job.id, command = %name, error = %e, "Checker failed");
                    results.record_failure(name, e.to_string());
                    self.completed(job.id, name, false).await;
                }
                Err(panic) => {
                    let message = format!("checker panicked: {}", panic_message(panic.as_ref()));
                    error!(job_id = %job.id, command = %name, error = %message, "Checker failed");
                    results.record_failure(name, message);
                    self.completed(job.id, name, false).await;
                }
            }
        }

        results
    }

    async fn deliver(&self, job: &ValidatedJob, payload: ResultPayload) -> Result<ResultPayload, JobError> {
        let Some(url) = &job.callback_url else {
            return Ok(payload);
        };

        if let Err(e) = self.callback.deliver(url, &payload).await {
            // Keep the result recoverable from logs.
            let body = payload.to_json().unwrap_or_default();
            error!(job_id = %job.id, callback_url = %url, error = %e, payload = %body, "Callback delivery failed");
            return Err(JobError::Delivery(e.to_string()));
        }
        Ok(payload)
    }

    async fn skipped(&self, job_id: JobId, command: &str, reason: &str) {
        self.emit(JobEvent::CheckerSkipped {
            job_id,
            command: command.to_string(),
            reason: reason.to_string(),
        })
        .await;
    }

    async fn completed(&self, job_id: JobId, command: &str, success: bool) {
        self.emit(JobEvent::CheckerCompleted {
            job_id,
            command: command.to_string(),
            success,
        })
        .await;
    }
}

#[async_trait]
impl MessageHandler for JobDispatcher {
    async fn handle(&self, body: &[u8]) -> Disposition {
        let job = match JobMessage::decode(body).and_then(JobMessage::validate) {
            Ok(job) => job,
            Err(e) => {
                error!(error = %e, body = %String::from_utf8_lossy(body), "Rejecting message");
                return Disposition::Reject;
            }
        };

        match self.run(job).await {
            Ok(_) => Disposition::Ack,
            Err(_) => Disposition::Reject,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
