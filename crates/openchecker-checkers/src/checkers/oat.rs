//! OpenHarmony OSS audit tool (OAT) scan.

use async_trait::async_trait;
use openchecker_core::Command;
use regex::Regex;
use serde_json::{Map, Value, json};
use std::sync::{Arc, LazyLock};

use super::{path_arg, workspace_arg};
use crate::{CheckInput, Checker, CheckerContext, Result};

static SECTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*) Total Count:\s*(\d+)").unwrap());

static ENTRY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Name:\s*(.+?)\s*Content:\s*(.+?)\s*Line:\s*(\d+)\s*Project:\s*(.+?)\s*File:\s*(.+)")
        .unwrap()
});

pub struct OatScanner {
    ctx: Arc<CheckerContext>,
}

impl OatScanner {
    pub fn new(ctx: Arc<CheckerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Checker for OatScanner {
    fn command(&self) -> Command {
        Command::OatScanner
    }

    async fn check(&self, input: &CheckInput<'_>) -> Result<Value> {
        let ws = input.workspace;
        if !ws.exists("OAT.xml") {
            return Ok(json!({"status_code": 404, "error": "OAT.xml not found"}));
        }

        let repo = &input.project.repo;
        let out_dir = ws.scratch_dir().join("oat_out");
        let jar = path_arg(&self.ctx.tools.oat_jar);
        let cwd = std::env::current_dir()?;

        ws.runner()
            .run(
                "java",
                [
                    "-jar".to_string(),
                    jar,
                    "-mode".to_string(),
                    "s".to_string(),
                    "-s".to_string(),
                    workspace_arg(ws),
                    "-r".to_string(),
                    path_arg(&out_dir),
                    "-n".to_string(),
                    repo.clone(),
                ],
                &cwd,
            )
            .await?;

        let report = out_dir
            .join("single")
            .join(format!("PlainReport_{}.txt", repo));
        match tokio::fs::read_to_string(&report).await {
            Ok(content) => Ok(parse_report(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(json!({"status_code": 500, "error": "Report file not found"}))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Parse a plain-text OAT report into `{section: {total_count, details}}`.
fn parse_report(content: &str) -> Value {
    let mut result = Map::new();
    let mut section: Option<String> = None;

    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(caps) = SECTION_REGEX.captures(line) {
            let name = caps[1].trim().to_string();
            let total: u64 = caps[2].parse().unwrap_or(0);
            result.insert(name.clone(), json!({"total_count": total, "details": []}));
            section = Some(name);
        } else if line.starts_with("Name:") {
            let (Some(name), Some(caps)) = (&section, ENTRY_REGEX.captures(line)) else {
                continue;
            };
            let entry = json!({
                "name": caps[1].trim(),
                "content": caps[2].trim(),
                "line": caps[3].parse::<u64>().unwrap_or(0),
                "project": caps[4].trim(),
                "file": caps[5].trim(),
            });
            if let Some(details) = result
                .get_mut(name)
                .and_then(|s| s.get_mut("details"))
                .and_then(Value::as_array_mut)
            {
                details.push(entry);
            }
        }
    }

    result.insert("status_code".to_string(), json!(200));
    Value::Object(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkers::testing::fixture;
    use openchecker_config::{Credentials, ToolsConfig};

    #[test]
    fn test_parse_report() {
        let report = "\
Invalid File Type Total Count: 2
Name: binary Content: libfoo.so Line: 0 Project: widget File: lib/libfoo.so
Name: binary Content: app.exe Line: 0 Project: widget File: bin/app.exe

License Header Invalid Total Count: 1
Name: license Content: missing header Line: 1 Project: widget File: src/main.c
";
        let parsed = parse_report(report);
        assert_eq!(parsed["status_code"], 200);
        assert_eq!(parsed["Invalid File Type"]["total_count"], 2);
        assert_eq!(parsed["Invalid File Type"]["details"].as_array().unwrap().len(), 2);
        assert_eq!(
            parsed["License Header Invalid"]["details"][0],
            json!({
                "name": "license",
                "content": "missing header",
                "line": 1,
                "project": "widget",
                "file": "src/main.c"
            })
        );
    }

    #[test]
    fn test_entries_before_any_section_are_ignored() {
        let parsed = parse_report("Name: x Content: y Line: 1 Project: p File: f\n");
        assert_eq!(parsed, json!({"status_code": 200}));
    }

    #[tokio::test]
    async fn test_missing_oat_xml() {
        let ctx = CheckerContext::new(Credentials::default(), ToolsConfig::default()).unwrap();
        let fx = fixture(&[("README.md", "")]).await;

        let result = OatScanner::new(Arc::new(ctx)).check(&fx.input()).await.unwrap();
        assert_eq!(result, json!({"status_code": 404, "error": "OAT.xml not found"}));
    }
}
