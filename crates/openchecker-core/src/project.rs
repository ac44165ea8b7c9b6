//! Project URL parsing.

use derive_more::Display;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::{Error, Result};

// Only these three hosting platforms are accepted, and the URL must end in `.git`.
static PROJECT_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.)?(github\.com|gitee\.com|gitcode\.com)/([^/]+)/([^/]+)\.git$")
        .unwrap()
});

/// Code hosting platform a project lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Platform {
    #[display("github.com")]
    GitHub,
    #[display("gitee.com")]
    Gitee,
    #[display("gitcode.com")]
    GitCode,
}

impl Platform {
    fn from_host(host: &str) -> Option<Self> {
        match host {
            "github.com" => Some(Platform::GitHub),
            "gitee.com" => Some(Platform::Gitee),
            "gitcode.com" => Some(Platform::GitCode),
            _ => None,
        }
    }
}

/// A parsed, canonical remote repository URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectUrl {
    /// The URL exactly as received.
    pub url: String,
    pub platform: Platform,
    pub owner: String,
    /// Repository name without the `.git` suffix.
    pub repo: String,
}

impl ProjectUrl {
    /// Parse a URL of the form `https://{github.com|gitee.com|gitcode.com}/{owner}/{repo}.git`.
    pub fn parse(url: &str) -> Result<Self> {
        let caps = PROJECT_URL_REGEX
            .captures(url)
            .ok_or_else(|| Error::InvalidProjectUrl(url.to_string()))?;

        let platform = Platform::from_host(&caps[1])
            .ok_or_else(|| Error::InvalidProjectUrl(url.to_string()))?;

        Ok(Self {
            url: url.to_string(),
            platform,
            owner: caps[2].to_string(),
            repo: caps[3].to_string(),
        })
    }

    /// Key used for per-project resources on external services, e.g. `github.com_acme_widget`.
    pub fn project_key(&self) -> String {
        format!("{}_{}_{}", self.platform, self.owner, self.repo)
    }
}

impl std::fmt::Display for ProjectUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_github_url() {
        let project = ProjectUrl::parse("https://github.com/acme/widget.git").unwrap();
        assert_eq!(project.platform, Platform::GitHub);
        assert_eq!(project.owner, "acme");
        assert_eq!(project.repo, "widget");
    }

    #[test]
    fn test_parse_www_and_http() {
        let project = ProjectUrl::parse("http://www.gitee.com/openharmony/docs.git").unwrap();
        assert_eq!(project.platform, Platform::Gitee);
        assert_eq!(project.repo, "docs");

        let project = ProjectUrl::parse("https://gitcode.com/a/b.git").unwrap();
        assert_eq!(project.platform, Platform::GitCode);
    }

    #[test]
    fn test_repo_with_dots() {
        let project = ProjectUrl::parse("https://github.com/acme/widget.rs.git").unwrap();
        assert_eq!(project.repo, "widget.rs");
    }

    #[test]
    fn test_rejects_malformed_urls() {
        for url in [
            "https://github.com/acme/widget",
            "https://gitlab.com/acme/widget.git",
            "git@github.com:acme/widget.git",
            "https://github.com/acme/widget.git/extra",
            "https://github.com/widget.git",
            "",
        ] {
            assert!(
                matches!(ProjectUrl::parse(url), Err(Error::InvalidProjectUrl(_))),
                "expected rejection for {url:?}"
            );
        }
    }

    #[test]
    fn test_project_key() {
        let project = ProjectUrl::parse("https://gitee.com/acme/widget.git").unwrap();
        assert_eq!(project.project_key(), "gitee.com_acme_widget");
    }
}
