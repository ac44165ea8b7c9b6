use async_trait::async_trait;
use openchecker_config::SonarQubeConfig;
use openchecker_core::Command;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use super::workspace_arg;
use crate::{CheckInput, Checker, CheckerContext, CheckerError, Result};

const METRIC_KEYS: &str = "coverage,complexity,duplicated_lines_density,lines";

/// Code quality measures from a SonarQube analysis.
pub struct SonarScanner {
    ctx: Arc<CheckerContext>,
}

impl SonarScanner {
    pub fn new(ctx: Arc<CheckerContext>) -> Self {
        Self { ctx }
    }

    fn get(&self, sonar: &SonarQubeConfig, endpoint: &str) -> reqwest::RequestBuilder {
        self.ctx
            .http
            .get(format!("{}{}", sonar.base_url(), endpoint))
            .basic_auth(&sonar.username, self.ctx.credentials.sonar_password())
    }

    /// Create the SonarQube project unless it already exists.
    async fn ensure_project(&self, sonar: &SonarQubeConfig, key: &str) -> Result<()> {
        let response = self
            .get(sonar, "/api/projects/search")
            .query(&[("projects", key)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CheckerError::Api {
                service: "sonarqube project search",
                status: response.status().as_u16(),
            });
        }

        let search: Value = response.json().await?;
        if search.pointer("/paging/total").and_then(Value::as_u64) != Some(0) {
            return Ok(());
        }

        info!(project = %key, "Creating SonarQube project");
        let response = self
            .ctx
            .http
            .post(format!("{}/api/projects/create", sonar.base_url()))
            .basic_auth(&sonar.username, self.ctx.credentials.sonar_password())
            .form(&[("project", key), ("name", key)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CheckerError::Api {
                service: "sonarqube project create",
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn measures(&self, sonar: &SonarQubeConfig, key: &str) -> Result<Value> {
        let response = self
            .get(sonar, "/api/measures/component")
            .query(&[("component", key), ("metricKeys", METRIC_KEYS)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CheckerError::Api {
                service: "sonarqube measures",
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl Checker for SonarScanner {
    fn command(&self) -> Command {
        Command::SonarScanner
    }

    async fn check(&self, input: &CheckInput<'_>) -> Result<Value> {
        let sonar = self
            .ctx
            .sonarqube
            .as_ref()
            .ok_or(CheckerError::NotConfigured("sonarqube"))?;
        let key = input.project.project_key();
        let ws = input.workspace;

        self.ensure_project(sonar, &key).await?;

        let mut args = vec![
            format!("-Dsonar.projectKey={}", key),
            format!("-Dsonar.sources={}", workspace_arg(ws)),
            format!("-Dsonar.host.url={}", sonar.base_url()),
            "-Dsonar.exclusions=**/*.java".to_string(),
        ];
        if let Some(token) = self.ctx.credentials.sonar_token() {
            args.push(format!("-Dsonar.token={}", token));
        }
        ws.runner().run("sonar-scanner", args, ws.path()).await?;

        // Analysis reports are processed asynchronously by the server.
        tokio::time::sleep(sonar.processing_delay).await;

        self.measures(sonar, &key).await
    }
}
