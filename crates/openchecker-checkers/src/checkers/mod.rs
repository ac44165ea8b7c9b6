//! Built-in checkers, thin adapters over external tools and hosting APIs.

mod binary;
mod changed_files;
mod dependency;
mod dependency_update;
mod docs;
mod files;
mod languages;
mod oat;
mod osv;
mod release;
mod scancode;
mod sonar;
mod url;

pub use binary::BinaryChecker;
pub use changed_files::ChangedFilesDetector;
pub use dependency::DependencyChecker;
pub use dependency_update::DependencyUpdateToolChecker;
pub use docs::{DocContentChecker, DocKind};
pub use files::{MaintainersChecker, ReadmeChecker, ReadmeOpensourceChecker};
pub use languages::LanguagesDetector;
pub use oat::OatScanner;
pub use osv::OsvScanner;
pub use release::ReleaseChecker;
pub use scancode::Scancode;
pub use sonar::SonarScanner;
pub use url::UrlChecker;

use openchecker_workspace::Workspace;
use std::path::Path;

/// Workspace path as a tool argument.
fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Workspace root as a tool argument.
fn workspace_arg(workspace: &Workspace) -> String {
    path_arg(workspace.path())
}
