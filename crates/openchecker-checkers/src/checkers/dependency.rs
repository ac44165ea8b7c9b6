use async_trait::async_trait;
use openchecker_core::{Command, ProjectUrl};
use openchecker_workspace::{GitFetcher, RepoFetcher, Workspace};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{path_arg, workspace_arg};
use crate::{CheckInput, Checker, CheckerContext, CheckerError, Result};

const GITHUB_PREFIX: &str = "https://github.com/";

/// Dependency inventory from the ORT analyzer.
///
/// Packages that declare no license but link to a GitHub repository get one
/// from running `licensee` on a shallow clone of that repository.
pub struct DependencyChecker {
    licensee: PathBuf,
    fetcher: Option<Arc<dyn RepoFetcher>>,
}

impl DependencyChecker {
    pub fn new(ctx: &CheckerContext) -> Self {
        Self {
            licensee: ctx.tools.licensee.clone(),
            fetcher: None,
        }
    }

    /// Fetch license sources with `fetcher` instead of `git clone`.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn RepoFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Append a detected license to every package that declares none.
    ///
    /// Detection failures are logged and leave the package untouched.
    async fn fill_missing_licenses(&self, ws: &Workspace, analyzer: &mut Value) -> Result<()> {
        let Some(packages) = analyzer
            .pointer_mut("/analyzer/result/packages")
            .and_then(Value::as_array_mut)
        else {
            return Ok(());
        };

        let fetcher: Arc<dyn RepoFetcher> = match &self.fetcher {
            Some(fetcher) => Arc::clone(fetcher),
            None => Arc::new(GitFetcher::new(ws.runner().clone())),
        };
        let clones = ws.scratch_dir().join("licensee");
        tokio::fs::create_dir_all(&clones).await?;

        for (index, package) in packages.iter_mut().enumerate() {
            if has_declared_license(package) {
                continue;
            }
            let Some(source) = license_source(package) else {
                continue;
            };

            let dest = clones.join(index.to_string());
            match self.detect(ws, fetcher.as_ref(), &source, &dest).await {
                Ok(Some(license)) => {
                    info!(project_url = %source, license = %license, "Detected undeclared license");
                    declare_license(package, license);
                }
                Ok(None) => debug!(project_url = %source, "No license detected"),
                Err(e) => warn!(project_url = %source, error = %e, "License detection failed"),
            }

            if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
                if let Err(e) = tokio::fs::remove_dir_all(&dest).await {
                    warn!(path = %dest.display(), error = %e, "Failed to remove license clone");
                }
            }
        }
        Ok(())
    }

    async fn detect(
        &self,
        ws: &Workspace,
        fetcher: &dyn RepoFetcher,
        source: &ProjectUrl,
        dest: &Path,
    ) -> Result<Option<String>> {
        fetcher.fetch(source, dest).await?;

        let output = ws
            .runner()
            .run(
                &self.licensee.to_string_lossy(),
                ["detect".to_string(), path_arg(dest), "--json".to_string()],
                ws.path(),
            )
            .await?;
        Ok(license_title(&serde_json::from_str(&output.stdout)?))
    }
}

#[async_trait]
impl Checker for DependencyChecker {
    fn command(&self) -> Command {
        Command::DependencyChecker
    }

    async fn check(&self, input: &CheckInput<'_>) -> Result<Value> {
        let ws = input.workspace;
        let out_dir = ws.scratch_dir().join("ort");
        tokio::fs::create_dir_all(&out_dir).await?;

        ws.runner()
            .run(
                "ort",
                [
                    "-P".to_string(),
                    "ort.analyzer.allowDynamicVersions=true".to_string(),
                    "analyze".to_string(),
                    "-i".to_string(),
                    workspace_arg(ws),
                    "-o".to_string(),
                    path_arg(&out_dir),
                    "-f".to_string(),
                    "JSON".to_string(),
                ],
                ws.path(),
            )
            .await?;

        let content = tokio::fs::read_to_string(out_dir.join("analyzer-result.json")).await?;
        let mut analyzer: Value = serde_json::from_str(&content)?;
        self.fill_missing_licenses(ws, &mut analyzer).await?;
        summarize_packages(&analyzer)
    }
}

fn has_declared_license(package: &Value) -> bool {
    package
        .get("declared_licenses")
        .and_then(Value::as_array)
        .is_some_and(|l| !l.is_empty())
}

fn declare_license(package: &mut Value, license: String) {
    match package.get_mut("declared_licenses").and_then(Value::as_array_mut) {
        Some(licenses) => licenses.push(Value::String(license)),
        None => {
            if let Some(fields) = package.as_object_mut() {
                fields.insert("declared_licenses".to_string(), json!([license]));
            }
        }
    }
}

/// GitHub repository of a package, from its VCS URL or else its homepage.
fn license_source(package: &Value) -> Option<ProjectUrl> {
    let vcs = package
        .pointer("/vcs_processed/url")
        .and_then(Value::as_str)
        .map(|url| url.strip_suffix(".git").unwrap_or(url));
    let homepage = package.get("homepage_url").and_then(Value::as_str);

    let url = [vcs, homepage]
        .into_iter()
        .flatten()
        .find(|url| url.starts_with(GITHUB_PREFIX))?;
    ProjectUrl::parse(&format!("{}.git", url.trim_end_matches('/'))).ok()
}

/// First license title in a `licensee detect --json` report.
fn license_title(report: &Value) -> Option<String> {
    report
        .get("licenses")?
        .as_array()?
        .iter()
        .find_map(|l| l.pointer("/meta/title").and_then(Value::as_str))
        .map(str::to_string)
}

/// Split analyzed packages by whether a license was declared.
fn summarize_packages(analyzer: &Value) -> Result<Value> {
    let packages = analyzer
        .pointer("/analyzer/result/packages")
        .and_then(Value::as_array)
        .ok_or_else(|| CheckerError::Tool("analyzer result has no package list".to_string()))?;

    let mut all = Vec::new();
    let mut with_license = Vec::new();
    let mut without_license = Vec::new();

    for package in packages {
        let Some(purl) = package.get("purl").and_then(Value::as_str) else {
            continue;
        };
        all.push(purl);

        if has_declared_license(package) {
            with_license.push(purl);
        } else {
            without_license.push(purl);
        }
    }

    Ok(json!({
        "packages_all": all,
        "packages_with_license_detect": with_license,
        "packages_without_license_detect": without_license,
    }))
}
