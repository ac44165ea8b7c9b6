//! The enumerated set of scan commands.
//!
//! Tokens arriving in a job's `command_list` are resolved into a [`CommandToken`]:
//! either a known [`Command`] or an explicit `Unknown` carrying the raw token.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// A recognised checker command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Command {
    OsvScanner,
    Scancode,
    BinaryChecker,
    ReleaseChecker,
    UrlChecker,
    SonarScanner,
    DependencyChecker,
    ReadmeChecker,
    MaintainersChecker,
    ReadmeOpensourceChecker,
    BuildDocChecker,
    ApiDocChecker,
    LanguagesDetector,
    ChangedFilesSinceCommitDetector,
    OatScanner,
    DependencyUpdateToolChecker,
}

impl Command {
    pub const ALL: [Command; 16] = [
        Command::OsvScanner,
        Command::Scancode,
        Command::BinaryChecker,
        Command::ReleaseChecker,
        Command::UrlChecker,
        Command::SonarScanner,
        Command::DependencyChecker,
        Command::ReadmeChecker,
        Command::MaintainersChecker,
        Command::ReadmeOpensourceChecker,
        Command::BuildDocChecker,
        Command::ApiDocChecker,
        Command::LanguagesDetector,
        Command::ChangedFilesSinceCommitDetector,
        Command::OatScanner,
        Command::DependencyUpdateToolChecker,
    ];

    /// The wire name of this command, also used as its key in `scan_results`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::OsvScanner => "osv-scanner",
            Command::Scancode => "scancode",
            Command::BinaryChecker => "binary-checker",
            Command::ReleaseChecker => "release-checker",
            Command::UrlChecker => "url-checker",
            Command::SonarScanner => "sonar-scanner",
            Command::DependencyChecker => "dependency-checker",
            Command::ReadmeChecker => "readme-checker",
            Command::MaintainersChecker => "maintainers-checker",
            Command::ReadmeOpensourceChecker => "readme-opensource-checker",
            Command::BuildDocChecker => "build-doc-checker",
            Command::ApiDocChecker => "api-doc-checker",
            Command::LanguagesDetector => "languages-detector",
            Command::ChangedFilesSinceCommitDetector => "changed-files-since-commit-detector",
            Command::OatScanner => "oat-scanner",
            Command::DependencyUpdateToolChecker => "dependency-update-tool-checker",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::UnknownCommand(s.to_string()))
    }
}

/// A token from `command_list`, resolved against the known command set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandToken {
    Known(Command),
    Unknown(String),
}

impl CommandToken {
    pub fn resolve(token: &str) -> Self {
        match token.parse::<Command>() {
            Ok(command) => CommandToken::Known(command),
            Err(_) => CommandToken::Unknown(token.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CommandToken::Known(command) => command.as_str(),
            CommandToken::Unknown(token) => token,
        }
    }
}
