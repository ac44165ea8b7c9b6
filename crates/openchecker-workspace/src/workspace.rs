//! A job's working copy of a repository.
//!
//! A [`Workspace`] is exclusively owned by one job. It is torn down exactly
//! once: either explicitly with [`Workspace::destroy`], or by `Drop` when the
//! job unwinds or is cancelled before reaching teardown.

use openchecker_core::JobId;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::manager::WorkspaceStats;
use crate::{ToolRunner, WorkspaceError};

/// Directory next to the checkout that holds tool outputs.
pub const SCRATCH_DIR: &str = ".scratch";

/// Package ecosystems whose lock file is generated when missing.
struct LockfileEcosystem {
    manifest: &'static str,
    lockfile: &'static str,
    installer: &'static str,
    artifacts: &'static str,
}

const LOCKFILE_ECOSYSTEMS: &[LockfileEcosystem] = &[
    LockfileEcosystem {
        manifest: "package.json",
        lockfile: "package-lock.json",
        installer: "npm",
        artifacts: "node_modules",
    },
    LockfileEcosystem {
        manifest: "oh-package.json5",
        lockfile: "oh-package-lock.json5",
        installer: "ohpm",
        artifacts: "oh_modules",
    },
];

#[derive(Debug)]
pub struct Workspace {
    job_id: JobId,
    /// `<root>/<job-id>`, removed on teardown.
    job_dir: PathBuf,
    /// `<root>/<job-id>/<repo>`, the checkout itself.
    path: PathBuf,
    runner: ToolRunner,
    stats: WorkspaceStats,
    open: bool,
}

impl Workspace {
    pub(crate) fn new(
        job_id: JobId,
        job_dir: PathBuf,
        repo: &str,
        runner: ToolRunner,
        stats: WorkspaceStats,
    ) -> Self {
        stats.record_created();
        Self {
            job_id,
            path: job_dir.join(repo),
            job_dir,
            runner,
            stats,
            open: true,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Root of the checked-out repository.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Per-job directory for tool outputs, outside the checkout.
    pub fn scratch_dir(&self) -> PathBuf {
        self.job_dir.join(SCRATCH_DIR)
    }

    pub fn runner(&self) -> &ToolRunner {
        &self.runner
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Check out `revision`, fetching it first when the shallow clone lacks it.
    ///
    /// Revisions that git would read as an option are refused.
    pub async fn pin(&self, revision: &str) -> Result<()> {
        if revision.is_empty() || revision.starts_with('-') {
            return Err(WorkspaceError::CheckoutFailed {
                revision: revision.to_string(),
                message: "not a revision".to_string(),
            });
        }
        info!(job_id = %self.job_id, revision = %revision, "Pinning workspace");

        if self
            .runner
            .run("git", ["checkout", revision], &self.path)
            .await
            .is_ok()
        {
            return Ok(());
        }

        debug!(revision = %revision, "Revision not in shallow clone, fetching");
        let checkout_failed = |e: crate::ProcessError| WorkspaceError::CheckoutFailed {
            revision: revision.to_string(),
            message: e.to_string(),
        };

        self.runner
            .run("git", ["fetch", "--depth=1", "origin", revision], &self.path)
            .await
            .map_err(checkout_failed)?;
        self.runner
            .run("git", ["checkout", "FETCH_HEAD"], &self.path)
            .await
            .map_err(checkout_failed)?;
        Ok(())
    }

    /// Read a workspace-relative text file. Missing or unreadable files are `None`.
    pub async fn read(&self, relative: &str) -> Option<String> {
        let path = self.path.join(relative);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(job_id = %self.job_id, path = %relative, error = %e, "Failed to read workspace file");
                None
            }
        }
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.path.join(relative).exists()
    }

    /// Find files matching any of `patterns` under each of `search_roots`.
    ///
    /// Roots are workspace-relative (`"."` is the checkout itself); missing
    /// roots are skipped. Results are workspace-relative paths, de-duplicated,
    /// in discovery order. Nothing under `.git` is returned.
    pub fn find(&self, patterns: &[&str], search_roots: &[&str]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for root in search_roots {
            let base = match *root {
                "" | "." => self.path.clone(),
                other => self.path.join(other),
            };
            if !base.is_dir() {
                continue;
            }

            for pattern in patterns {
                let full = base.join(pattern);
                let Some(full) = full.to_str() else {
                    continue;
                };
                let paths = match glob::glob(full) {
                    Ok(paths) => paths,
                    Err(e) => {
                        warn!(pattern = %pattern, error = %e, "Invalid glob pattern");
                        continue;
                    }
                };

                for path in paths.flatten() {
                    if !path.is_file() {
                        continue;
                    }
                    let Ok(relative) = path.strip_prefix(&self.path) else {
                        continue;
                    };
                    if relative.starts_with(".git") {
                        continue;
                    }
                    let relative = relative.to_string_lossy().into_owned();
                    if seen.insert(relative.clone()) {
                        found.push(relative);
                    }
                }
            }
        }

        found
    }

    /// Generate missing lock files for supported package managers.
    ///
    /// Install artifacts are removed afterwards so they are not scanned.
    pub async fn prepare_lockfiles(&self) -> Result<()> {
        for eco in LOCKFILE_ECOSYSTEMS {
            if !self.exists(eco.manifest) || self.exists(eco.lockfile) {
                continue;
            }

            info!(
                job_id = %self.job_id,
                manifest = eco.manifest,
                installer = eco.installer,
                "Generating missing lock file"
            );

            self.runner
                .run(eco.installer, ["install"], &self.path)
                .await
                .map_err(|e| {
                    WorkspaceError::LockfileGeneration(format!("{}: {}", eco.lockfile, e))
                })?;

            let artifacts = self.path.join(eco.artifacts);
            if artifacts.exists() {
                tokio::fs::remove_dir_all(&artifacts).await.map_err(|e| {
                    WorkspaceError::LockfileGeneration(format!(
                        "failed to remove {}: {}",
                        eco.artifacts, e
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Temporarily rename `from` to `to` inside the workspace.
    ///
    /// Only happens when `from` exists and `to` does not. The returned guard
    /// renames the file back on [`FileAlias::restore`] or on drop.
    pub async fn alias_file(&self, from: &str, to: &str) -> Result<Option<FileAlias>> {
        let from = self.path.join(from);
        let to = self.path.join(to);
        if !from.exists() || to.exists() {
            return Ok(None);
        }

        tokio::fs::rename(&from, &to).await?;
        debug!(from = %from.display(), to = %to.display(), "Aliased workspace file");
        Ok(Some(FileAlias {
            original: from,
            alias: to,
            restored: false,
        }))
    }

    /// Remove the job directory. Consumes the workspace.
    pub async fn destroy(mut self) {
        self.open = false;
        self.stats.record_destroyed();
        match tokio::fs::remove_dir_all(&self.job_dir).await {
            Ok(()) => debug!(job_id = %self.job_id, "Workspace destroyed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(job_id = %self.job_id, error = %e, "Failed to remove workspace"),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        self.stats.record_destroyed();
        warn!(job_id = %self.job_id, "Workspace dropped without destroy, removing");
        match std::fs::remove_dir_all(&self.job_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(job_id = %self.job_id, error = %e, "Failed to remove workspace"),
        }
    }
}

/// A file renamed for the duration of one tool run.
#[derive(Debug)]
pub struct FileAlias {
    original: PathBuf,
    alias: PathBuf,
    restored: bool,
}

impl FileAlias {
    pub async fn restore(mut self) -> std::io::Result<()> {
        self.restored = true;
        tokio::fs::rename(&self.alias, &self.original).await
    }
}

impl Drop for FileAlias {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(e) = std::fs::rename(&self.alias, &self.original) {
            warn!(path = %self.original.display(), error = %e, "Failed to restore aliased file");
        }
    }
}
