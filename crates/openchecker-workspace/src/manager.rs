//! Workspace creation and repository fetching.

use async_trait::async_trait;
use openchecker_core::{JobId, ProjectUrl};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

use crate::error::Result;
use crate::workspace::SCRATCH_DIR;
use crate::{ToolRunner, Workspace, WorkspaceError};

/// Fetches a repository into a directory that does not exist yet.
#[async_trait]
pub trait RepoFetcher: Send + Sync {
    async fn fetch(&self, project: &ProjectUrl, dest: &Path) -> Result<()>;
}

/// Shallow `git clone` of the default branch.
#[derive(Debug, Clone, Default)]
pub struct GitFetcher {
    runner: ToolRunner,
}

impl GitFetcher {
    pub fn new(runner: ToolRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl RepoFetcher for GitFetcher {
    async fn fetch(&self, project: &ProjectUrl, dest: &Path) -> Result<()> {
        let parent = dest.parent().unwrap_or(dest);
        let dest_str = dest.to_string_lossy();

        info!(project_url = %project, path = %dest.display(), "Cloning repository");

        self.runner
            .run(
                "git",
                ["clone", "--depth=1", project.url.as_str(), dest_str.as_ref()],
                parent,
            )
            .await
            .map_err(|e| WorkspaceError::CloneFailed {
                url: project.url.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }
}

/// Counts of workspaces created and torn down, shared by every clone.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceStats {
    created: Arc<AtomicUsize>,
    destroyed: Arc<AtomicUsize>,
}

impl WorkspaceStats {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Workspaces created but not yet destroyed.
    pub fn live(&self) -> usize {
        self.created().saturating_sub(self.destroyed())
    }

    pub(crate) fn record_created(&self) {
        self.created.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_destroyed(&self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Creates job-scoped workspaces under a root directory.
pub struct WorkspaceManager {
    root: PathBuf,
    fetcher: Arc<dyn RepoFetcher>,
    runner: ToolRunner,
    stats: WorkspaceStats,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>, fetcher: Arc<dyn RepoFetcher>, runner: ToolRunner) -> Self {
        Self {
            root: root.into(),
            fetcher,
            runner,
            stats: WorkspaceStats::default(),
        }
    }

    /// A manager that clones with `git`.
    pub fn with_git(root: impl Into<PathBuf>, runner: ToolRunner) -> Self {
        let fetcher = Arc::new(GitFetcher::new(runner.clone()));
        Self::new(root, fetcher, runner)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stats(&self) -> WorkspaceStats {
        self.stats.clone()
    }

    /// Create `<root>/<job-id>/<repo>` and fetch the project into it.
    ///
    /// An existing checkout is reused as-is. If the fetch fails, the
    /// half-built workspace is destroyed before the error is returned.
    pub async fn materialize(&self, job_id: JobId, project: &ProjectUrl) -> Result<Workspace> {
        let job_dir = self.root.join(job_id.to_string());
        tokio::fs::create_dir_all(job_dir.join(SCRATCH_DIR)).await?;

        let workspace = Workspace::new(
            job_id,
            job_dir,
            &project.repo,
            self.runner.clone(),
            self.stats.clone(),
        );

        if workspace.path().exists() {
            info!(job_id = %job_id, path = %workspace.path().display(), "Reusing existing checkout");
            return Ok(workspace);
        }

        if let Err(e) = self.fetcher.fetch(project, workspace.path()).await {
            workspace.destroy().await;
            return Err(e);
        }

        Ok(workspace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixtureFetcher;

    #[async_trait]
    impl RepoFetcher for FixtureFetcher {
        async fn fetch(&self, _project: &ProjectUrl, dest: &Path) -> Result<()> {
            tokio::fs::create_dir_all(dest).await?;
            tokio::fs::write(dest.join("README.md"), "# fixture").await?;
            Ok(())
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl RepoFetcher for FailingFetcher {
        async fn fetch(&self, project: &ProjectUrl, dest: &Path) -> Result<()> {
            // Leave a partial checkout behind.
            tokio::fs::create_dir_all(dest).await?;
            Err(WorkspaceError::CloneFailed {
                url: project.url.clone(),
                message: "repository not found".to_string(),
            })
        }
    }

    fn project() -> ProjectUrl {
        ProjectUrl::parse("https://github.com/acme/widget.git").unwrap()
    }

    #[tokio::test]
    async fn test_materialize_layout() {
        let root = tempfile::tempdir().unwrap();
        let manager =
            WorkspaceManager::new(root.path(), Arc::new(FixtureFetcher), ToolRunner::default());
        let job_id = JobId::new();

        let ws = manager.materialize(job_id, &project()).await.unwrap();
        assert_eq!(ws.path(), root.path().join(job_id.to_string()).join("widget"));
        assert!(ws.scratch_dir().is_dir());
        assert!(ws.exists("README.md"));

        ws.destroy().await;
        assert!(!root.path().join(job_id.to_string()).exists());
        assert_eq!(manager.stats().live(), 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_nothing_behind() {
        let root = tempfile::tempdir().unwrap();
        let manager =
            WorkspaceManager::new(root.path(), Arc::new(FailingFetcher), ToolRunner::default());
        let job_id = JobId::new();

        let err = manager.materialize(job_id, &project()).await.unwrap_err();
        assert!(matches!(err, WorkspaceError::CloneFailed { .. }));
        assert!(!root.path().join(job_id.to_string()).exists());

        let stats = manager.stats();
        assert_eq!(stats.created(), 1);
        assert_eq!(stats.destroyed(), 1);
    }

    #[tokio::test]
    async fn test_existing_checkout_is_reused() {
        let root = tempfile::tempdir().unwrap();
        let manager =
            WorkspaceManager::new(root.path(), Arc::new(FailingFetcher), ToolRunner::default());
        let job_id = JobId::new();
        let existing = root.path().join(job_id.to_string()).join("widget");
        std::fs::create_dir_all(&existing).unwrap();
        std::fs::write(existing.join("kept.txt"), "x").unwrap();

        let ws = manager.materialize(job_id, &project()).await.unwrap();
        assert!(ws.exists("kept.txt"));
        ws.destroy().await;
    }

    #[tokio::test]
    async fn test_jobs_get_distinct_directories() {
        let root = tempfile::tempdir().unwrap();
        let manager =
            WorkspaceManager::new(root.path(), Arc::new(FixtureFetcher), ToolRunner::default());

        let a = manager.materialize(JobId::new(), &project()).await.unwrap();
        let b = manager.materialize(JobId::new(), &project()).await.unwrap();
        assert_ne!(a.path(), b.path());
        assert_eq!(manager.stats().live(), 2);

        a.destroy().await;
        b.destroy().await;
        assert_eq!(manager.stats().live(), 0);
    }
}
