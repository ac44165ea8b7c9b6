//! Latest-release inspection on GitHub and Gitee.

use async_trait::async_trait;
use openchecker_core::{Command, Platform, ProjectUrl};
use serde::Deserialize;
use serde_json::{Value, json};
use std::io::Cursor;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{CheckInput, Checker, CheckerContext, CheckerError, Requires, Result};

const SIGNATURE_SUFFIXES: &[&str] = &[".asc", ".sig", ".cer", ".crt", ".pem", ".sha256", ".sha512"];
const RELEASE_NOTE_NAMES: &[&str] = &["changelog", "releasenotes", "release_notes"];

#[derive(Debug, Deserialize)]
struct GitHubRelease {
    zipball_url: String,
}

#[derive(Debug, Deserialize)]
struct GiteeRelease {
    tag_name: Option<String>,
}

/// Whether the project has a release, and what its source archive ships.
pub struct ReleaseChecker {
    ctx: Arc<CheckerContext>,
}

impl ReleaseChecker {
    pub fn new(ctx: Arc<CheckerContext>) -> Self {
        Self { ctx }
    }

    /// Source archive URL of the latest release, `None` when there is none.
    async fn latest_archive_url(&self, project: &ProjectUrl) -> Result<Option<String>> {
        match project.platform {
            Platform::GitHub => {
                let url = format!(
                    "{}/repos/{}/{}/releases/latest",
                    self.ctx.endpoints.github, project.owner, project.repo
                );
                let mut request = self.ctx.http.get(&url);
                if let Some(token) = self.ctx.credentials.github_token() {
                    request = request.bearer_auth(token);
                }

                let response = request.send().await?;
                if response.status() != reqwest::StatusCode::OK {
                    debug!(project_url = %project, status = %response.status(), "No GitHub release");
                    return Ok(None);
                }
                let release: GitHubRelease = response.json().await?;
                Ok(Some(release.zipball_url))
            }
            Platform::Gitee => {
                let base = format!(
                    "{}/repos/{}/{}",
                    self.ctx.endpoints.gitee, project.owner, project.repo
                );
                let token = self.ctx.credentials.gitee_access_token();

                let response = self
                    .ctx
                    .http
                    .get(format!("{}/releases/latest", base))
                    .send()
                    .await?;
                if response.status() != reqwest::StatusCode::OK {
                    debug!(project_url = %project, status = %response.status(), "No Gitee release");
                    return Ok(None);
                }

                // Gitee answers `null` for repositories without releases.
                let release: Option<GiteeRelease> = response.json().await?;
                let Some(tag) = release.and_then(|r| r.tag_name) else {
                    return Ok(None);
                };

                let mut archive = format!("{}/zipball?ref={}", base, urlencoding::encode(&tag));
                if let Some(token) = token {
                    archive.push_str("&access_token=");
                    archive.push_str(&urlencoding::encode(&token));
                }
                Ok(Some(archive))
            }
            Platform::GitCode => {
                warn!(project_url = %project, "Release lookup is not available for gitcode.com");
                Ok(None)
            }
        }
    }

    async fn inspect(&self, project: &ProjectUrl) -> Result<Value> {
        let Some(archive_url) = self.latest_archive_url(project).await? else {
            return Ok(release_summary(false, Vec::new(), Vec::new()));
        };

        let response = self.ctx.http.get(&archive_url).send().await?;
        if response.status() != reqwest::StatusCode::OK {
            warn!(project_url = %project, status = %response.status(), "Failed to download release archive");
            return Ok(release_summary(true, Vec::new(), Vec::new()));
        }

        let bytes = response.bytes().await?;
        let (signatures, notes) = classify_archive(&bytes)?;
        Ok(release_summary(true, signatures, notes))
    }
}

#[async_trait]
impl Checker for ReleaseChecker {
    fn command(&self) -> Command {
        Command::ReleaseChecker
    }

    fn requires(&self) -> Requires {
        Requires::ProjectUrl
    }

    async fn check(&self, input: &CheckInput<'_>) -> Result<Value> {
        self.inspect(input.project).await
    }
}

fn release_summary(released: bool, signatures: Vec<String>, notes: Vec<String>) -> Value {
    json!({
        "is_released": released,
        "signature_files": signatures,
        "release_notes": notes,
    })
}

/// Signature files and release notes inside a zip archive, in archive order.
fn classify_archive(bytes: &[u8]) -> Result<(Vec<String>, Vec<String>)> {
    let archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut signatures = Vec::new();
    let mut notes = Vec::new();

    for name in archive.file_names() {
        let lower = name.to_lowercase();
        if SIGNATURE_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
            signatures.push(name.to_string());
        }

        let basename = lower.rsplit('/').next().unwrap_or(&lower);
        if RELEASE_NOTE_NAMES.iter().any(|n| basename.contains(n)) {
            notes.push(name.to_string());
        }
    }

    Ok((signatures, notes))
}
