use async_trait::async_trait;
use openchecker_core::{Command, Platform};
use serde::Serialize;
use serde_json::Value;

use crate::{CheckInput, Checker, Result};

struct UpdateTool {
    name: &'static str,
    url: &'static str,
    desc: &'static str,
    /// Config file locations; `{platform}` is the hosting platform's config dir.
    files: &'static [&'static str],
}

const UPDATE_TOOLS: &[UpdateTool] = &[
    UpdateTool {
        name: "Dependabot",
        url: "https://github.com/dependabot",
        desc: "Automated dependency updates built into GitHub",
        files: &[".github/dependabot.yml", ".github/dependabot.yaml"],
    },
    UpdateTool {
        name: "RenovateBot",
        url: "https://github.com/renovatebot/renovate",
        desc: "Automated dependency updates. Multi-platform and multi-language.",
        files: &[
            "renovate.json",
            "renovate.json5",
            "{platform}/renovate.json",
            "{platform}/renovate.json5",
            ".renovaterc",
            ".renovaterc.json",
            ".renovaterc.json5",
        ],
    },
    UpdateTool {
        name: "PyUp",
        url: "https://pyup.io/",
        desc: "Automated dependency updates for Python.",
        files: &[".pyup.yml"],
    },
    UpdateTool {
        name: "scala-steward",
        url: "https://github.com/scala-steward-org/scala-steward",
        desc: "Works with Maven, Mill, sbt, and Scala CLI.",
        files: &[
            ".scala-steward.conf",
            "scala-steward.conf",
            "{platform}/.scala-steward.conf",
            "{platform}/scala-steward.conf",
            ".config/.scala-steward.conf",
            ".config/scala-steward.conf",
        ],
    },
];

#[derive(Debug, Serialize)]
struct FoundTool {
    name: &'static str,
    url: &'static str,
    desc: &'static str,
    files: Vec<FoundFile>,
}

#[derive(Debug, Serialize)]
struct FoundFile {
    path: String,
    file_type: &'static str,
    offset: u32,
}

fn platform_dir(platform: Platform) -> &'static str {
    match platform {
        Platform::GitHub => ".github",
        Platform::Gitee => ".gitee",
        Platform::GitCode => ".gitcode",
    }
}

/// Dependency update bots configured in the repository, first config file per tool.
pub struct DependencyUpdateToolChecker;

#[async_trait]
impl Checker for DependencyUpdateToolChecker {
    fn command(&self) -> Command {
        Command::DependencyUpdateToolChecker
    }

    async fn check(&self, input: &CheckInput<'_>) -> Result<Value> {
        let platform = platform_dir(input.project.platform);
        let found: Vec<FoundTool> = UPDATE_TOOLS
            .iter()
            .filter_map(|tool| {
                let path = tool
                    .files
                    .iter()
                    .map(|f| f.replace("{platform}", platform))
                    .find(|f| input.workspace.exists(f))?;
                Some(FoundTool {
                    name: tool.name,
                    url: tool.url,
                    desc: tool.desc,
                    files: vec![FoundFile {
                        path,
                        file_type: "source",
                        offset: 0,
                    }],
                })
            })
            .collect();

        Ok(serde_json::to_value(found)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkers::testing::{fixture, fixture_for};
    use serde_json::json;

    #[tokio::test]
    async fn test_detects_first_file_per_tool() {
        let fx = fixture(&[
            (".github/dependabot.yml", ""),
            ("renovate.json5", "{}"),
            (".renovaterc", "{}"),
        ])
        .await;

        let result = DependencyUpdateToolChecker.check(&fx.input()).await.unwrap();
        assert_eq!(
            result,
            json!([
                {
                    "name": "Dependabot",
                    "url": "https://github.com/dependabot",
                    "desc": "Automated dependency updates built into GitHub",
                    "files": [{"path": ".github/dependabot.yml", "file_type": "source", "offset": 0}]
                },
                {
                    "name": "RenovateBot",
                    "url": "https://github.com/renovatebot/renovate",
                    "desc": "Automated dependency updates. Multi-platform and multi-language.",
                    "files": [{"path": "renovate.json5", "file_type": "source", "offset": 0}]
                }
            ])
        );
    }

    #[tokio::test]
    async fn test_platform_specific_location() {
        let fx = fixture_for(
            "https://gitee.com/acme/widget.git",
            &[(".gitee/scala-steward.conf", "")],
        )
        .await;

        let result = DependencyUpdateToolChecker.check(&fx.input()).await.unwrap();
        assert_eq!(result[0]["name"], "scala-steward");
        assert_eq!(result[0]["files"][0]["path"], ".gitee/scala-steward.conf");
    }

    #[tokio::test]
    async fn test_no_tools() {
        let fx = fixture(&[("README.md", "")]).await;
        let result = DependencyUpdateToolChecker.check(&fx.input()).await.unwrap();
        assert_eq!(result, json!([]));
    }
}
