//! Shared dependencies handed to every built-in checker.

use openchecker_config::{AgentConfig, Credentials, LlmConfig, SonarQubeConfig, ToolsConfig};
use openchecker_core::RetryConfig;
use std::time::Duration;

use crate::Result;

/// Base URLs of the hosting platform APIs.
#[derive(Debug, Clone)]
pub struct ApiEndpoints {
    pub github: String,
    pub gitee: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            github: "https://api.github.com".to_string(),
            gitee: "https://gitee.com/api/v5".to_string(),
        }
    }
}

/// Backoff for chat completion calls, which are often rate limited.
pub const LLM_RETRY: RetryConfig = RetryConfig {
    max_retries: 5,
    initial_delay: Duration::from_secs(1),
    max_delay: Duration::from_secs(60),
    backoff_multiplier: 2.0,
    jitter: true,
};

#[derive(Debug, Clone)]
pub struct CheckerContext {
    pub credentials: Credentials,
    pub http: reqwest::Client,
    pub tools: ToolsConfig,
    pub sonarqube: Option<SonarQubeConfig>,
    pub llm: Option<LlmConfig>,
    pub llm_retry: RetryConfig,
    pub endpoints: ApiEndpoints,
}

impl CheckerContext {
    pub fn new(credentials: Credentials, tools: ToolsConfig) -> Result<Self> {
        Ok(Self {
            credentials,
            http: http_client()?,
            tools,
            sonarqube: None,
            llm: None,
            llm_retry: LLM_RETRY,
            endpoints: ApiEndpoints::default(),
        })
    }

    pub fn from_config(config: &AgentConfig, credentials: Credentials) -> Result<Self> {
        Ok(Self {
            sonarqube: config.sonarqube.clone(),
            llm: config.llm.clone(),
            ..Self::new(credentials, config.tools.clone())?
        })
    }

    pub fn with_endpoints(mut self, endpoints: ApiEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_llm(mut self, llm: LlmConfig) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_llm_retry(mut self, retry: RetryConfig) -> Self {
        self.llm_retry = retry;
        self
    }
}

fn http_client() -> Result<reqwest::Client> {
    // GitHub rejects requests without a User-Agent.
    Ok(reqwest::Client::builder()
        .user_agent(concat!("openchecker/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(30))
        .timeout(Duration::from_secs(300))
        .build()?)
}
