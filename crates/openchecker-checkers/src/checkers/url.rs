use async_trait::async_trait;
use openchecker_core::Command;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::{CheckInput, Checker, CheckerContext, Requires, Result};

/// Reachability of the project URL itself.
///
/// Never fails: an unreachable URL is a `"fail"` result, not an error.
pub struct UrlChecker {
    ctx: Arc<CheckerContext>,
}

impl UrlChecker {
    pub fn new(ctx: Arc<CheckerContext>) -> Self {
        Self { ctx }
    }

    async fn probe(&self, url: &str) -> Value {
        match self.ctx.http.head(url).send().await {
            Ok(response) if response.status() == reqwest::StatusCode::OK => {
                json!({"url": url, "status": "pass", "error": null})
            }
            Ok(response) => {
                let status = response.status();
                let reason = status
                    .canonical_reason()
                    .map(str::to_string)
                    .unwrap_or_else(|| status.as_u16().to_string());
                json!({"url": url, "status": "fail", "error": reason})
            }
            Err(e) => json!({"url": url, "status": "fail", "error": e.to_string()}),
        }
    }
}

#[async_trait]
impl Checker for UrlChecker {
    fn command(&self) -> Command {
        Command::UrlChecker
    }

    fn requires(&self) -> Requires {
        Requires::ProjectUrl
    }

    async fn check(&self, input: &CheckInput<'_>) -> Result<Value> {
        Ok(self.probe(&input.project.url).await)
    }
}
