//! Documentation quality checks backed by an OpenAI-compatible chat endpoint.

use async_trait::async_trait;
use openchecker_config::LlmConfig;
use openchecker_core::{Command, is_transient_status};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{CheckInput, Checker, CheckerContext, CheckerError, Result};

const CHUNK_CHARS: usize = 3000;
const DOC_PATTERNS: &[&str] = &["**/*.md", "**/*.markdown"];
const DOC_ROOTS: &[&str] = &[".", "doc", "docs"];

/// Projects that point here follow the shared OpenHarmony build instructions.
const HAR_USAGE_LINK: &str =
    "https://gitee.com/openharmony-tpc/docs/blob/master/OpenHarmony_har_usage.md";

const BUILD_DOC_PROMPT: &str = "You are a professional programmer, please assess whether the \
provided text offers a thorough and in-depth introduction to the processes of software \
compilation and packaging.\nIf the text segment introduce the software compilation and packaging \
completely, please return 'YES'; otherwise, return 'NO'.\nYou need to ensure the accuracy of your \
answers as much as possible, and if unsure, please simply answer NO. Your response must not \
include other content.\n\nText content as below:\n\n";

const API_DOC_PROMPT: &str = "You are a professional programmer, please assess whether the \
provided text offer a comprehensive introduction to the use of software API.\nIf the text segment \
introduce the software API completely, please return 'YES'; otherwise, return 'NO'.\nYou need to \
ensure the accuracy of your answers as much as possible, and if unsure, please simply answer NO. \
Your response must not include other content.\n\nText content as below:\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKind {
    Build,
    Api,
}

impl DocKind {
    fn prompt(self) -> &'static str {
        match self {
            DocKind::Build => BUILD_DOC_PROMPT,
            DocKind::Api => API_DOC_PROMPT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Finds the first markdown file that documents building or API usage.
///
/// Result is a list holding at most one workspace-relative path.
pub struct DocContentChecker {
    ctx: Arc<CheckerContext>,
    kind: DocKind,
}

impl DocContentChecker {
    pub fn build_doc(ctx: Arc<CheckerContext>) -> Self {
        Self {
            ctx,
            kind: DocKind::Build,
        }
    }

    pub fn api_doc(ctx: Arc<CheckerContext>) -> Self {
        Self {
            ctx,
            kind: DocKind::Api,
        }
    }

    async fn classify(&self, llm: &LlmConfig, chunk: &str) -> Result<bool> {
        let body = json!({
            "model": llm.model,
            "temperature": 0.2,
            "messages": [{"role": "user", "content": format!("{}{}", self.kind.prompt(), chunk)}],
        });

        let url = format!("{}/chat/completions", llm.base_url);
        let retry = &self.ctx.llm_retry;
        let mut attempt = 0;

        // Transient failures back off; other statuses are final.
        let response = loop {
            let mut request = self.ctx.http.post(&url).json(&body);
            if let Some(key) = self.ctx.credentials.llm_api_key() {
                request = request.bearer_auth(key);
            }

            let failure = match request.send().await {
                Ok(r) if is_transient_status(r.status().as_u16()) => CheckerError::Api {
                    service: "llm",
                    status: r.status().as_u16(),
                },
                Ok(r) => break r,
                Err(e) if e.is_builder() => return Err(e.into()),
                Err(e) => CheckerError::from(e),
            };

            if attempt >= retry.max_retries {
                return Err(failure);
            }
            let delay = retry.jittered_delay(attempt);
            warn!(
                model = %llm.model,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "LLM request failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        };

        if !response.status().is_success() {
            return Err(CheckerError::Api {
                service: "llm",
                status: response.status().as_u16(),
            });
        }

        let completion: ChatCompletion = response.json().await?;
        let answer = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        Ok(answer.trim() == "YES")
    }
}

#[async_trait]
impl Checker for DocContentChecker {
    fn command(&self) -> Command {
        match self.kind {
            DocKind::Build => Command::BuildDocChecker,
            DocKind::Api => Command::ApiDocChecker,
        }
    }

    async fn check(&self, input: &CheckInput<'_>) -> Result<Value> {
        let llm = self
            .ctx
            .llm
            .as_ref()
            .ok_or(CheckerError::NotConfigured("llm"))?;

        for doc in input.workspace.find(DOC_PATTERNS, DOC_ROOTS) {
            let Some(content) = input.workspace.read(&doc).await else {
                continue;
            };
            if content.is_empty() {
                continue;
            }

            if self.kind == DocKind::Build
                && content.to_lowercase().contains(&HAR_USAGE_LINK.to_lowercase())
            {
                debug!(job_id = %input.job_id, doc = %doc, "Found shared build instructions link");
                return Ok(json!([doc]));
            }

            for chunk in chunks(&content, CHUNK_CHARS) {
                if self.classify(llm, chunk).await? {
                    return Ok(json!([doc]));
                }
            }
        }

        Ok(json!([]))
    }
}

/// Split `text` into pieces of at most `size` characters.
fn chunks(text: &str, size: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (index, _) in text.char_indices() {
        if count == size {
            pieces.push(&text[start..index]);
            start = index;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkers::testing::fixture;
    use openchecker_config::{Credentials, Secrets, ToolsConfig};
    use openchecker_core::RetryConfig;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ctx(server: &MockServer) -> Arc<CheckerContext> {
        let secrets = Secrets {
            llm_api_key: Some("llm-key".to_string()),
            ..Secrets::default()
        };
        Arc::new(
            CheckerContext::new(Credentials::new(secrets), ToolsConfig::default())
                .unwrap()
                .with_llm(LlmConfig {
                    base_url: server.uri(),
                    model: "test-model".to_string(),
                })
                .with_llm_retry(RetryConfig {
                    max_retries: 2,
                    initial_delay: Duration::from_millis(5),
                    max_delay: Duration::from_millis(20),
                    backoff_multiplier: 2.0,
                    jitter: false,
                }),
        )
    }

    fn answer(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .set_body_json(json!({"choices": [{"message": {"role": "assistant", "content": text}}]}))
    }

    #[test]
    fn test_chunks_respect_char_boundaries() {
        assert_eq!(chunks("abcdefg", 3), vec!["abc", "def", "g"]);
        assert_eq!(chunks("日本語テキスト", 4), vec!["日本語テ", "キスト"]);
        assert!(chunks("", 3).is_empty());
    }

    #[tokio::test]
    async fn test_api_doc_found() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer llm-key"))
            .and(body_string_contains("## API reference"))
            .respond_with(answer("YES"))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(answer("NO"))
            .mount(&mock_server)
            .await;

        let fx = fixture(&[
            ("README.md", "# widget"),
            ("docs/api.md", "## API reference\n`widget::new()`"),
        ])
        .await;

        let result = DocContentChecker::api_doc(ctx(&mock_server))
            .check(&fx.input())
            .await
            .unwrap();
        assert_eq!(result, json!(["docs/api.md"]));
    }

    #[tokio::test]
    async fn test_no_doc_found() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(answer("NO"))
            .mount(&mock_server)
            .await;

        let fx = fixture(&[("README.md", "# widget")]).await;
        let result = DocContentChecker::build_doc(ctx(&mock_server))
            .check(&fx.input())
            .await
            .unwrap();
        assert_eq!(result, json!([]));
    }

    #[tokio::test]
    async fn test_build_doc_shared_link_short_circuits() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(answer("NO"))
            .expect(0)
            .mount(&mock_server)
            .await;

        let content = format!("See {} for building.", HAR_USAGE_LINK);
        let fx = fixture(&[("README.md", content.as_str())]).await;
        let result = DocContentChecker::build_doc(ctx(&mock_server))
            .check(&fx.input())
            .await
            .unwrap();
        assert_eq!(result, json!(["README.md"]));
    }

    #[tokio::test]
    async fn test_llm_errors_propagate() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let fx = fixture(&[("README.md", "# widget")]).await;
        let err = DocContentChecker::api_doc(ctx(&mock_server))
            .check(&fx.input())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckerError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_rate_limited_request_is_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .respond_with(answer("YES"))
            .mount(&mock_server)
            .await;

        let fx = fixture(&[("docs/build.md", "## Building
cargo build")]).await;
        let result = DocContentChecker::build_doc(ctx(&mock_server))
            .check(&fx.input())
            .await
            .unwrap();
        assert_eq!(result, json!(["docs/build.md"]));
        assert_eq!(mock_server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_persistent_rate_limit_gives_up() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let fx = fixture(&[("README.md", "# widget")]).await;
        let err = DocContentChecker::api_doc(ctx(&mock_server))
            .check(&fx.input())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckerError::Api { status: 429, .. }));
        assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
    }
}
