//! Callback delivery with exponential backoff.

use openchecker_config::CallbackConfig;
use openchecker_core::{ResultPayload, RetryConfig, is_transient_status};
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Callback retry policy, taken whole from the `callback` section.
pub fn retry_config(config: &CallbackConfig) -> RetryConfig {
    RetryConfig {
        max_retries: config.max_retries,
        initial_delay: config.initial_delay,
        max_delay: config.max_delay,
        backoff_multiplier: config.backoff_multiplier,
        jitter: config.jitter,
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("failed to serialize payload: {0}")]
    Serialization(#[from] openchecker_core::Error),

    #[error("invalid callback URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("callback rejected with HTTP {0}")]
    Rejected(StatusCode),

    #[error("callback failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

enum Attempt {
    Delivered,
    Transient(String),
    Permanent(StatusCode),
    /// The request could not be built; retrying cannot help.
    Invalid(String),
}

/// Posts result payloads to callback URLs.
///
/// Only HTTP 200 counts as delivered. Connection errors, timeouts and
/// 429/502/503/504 are retried; any other status fails at once, as does a
/// URL the client cannot build a request for.
#[derive(Debug, Clone)]
pub struct CallbackClient {
    http: reqwest::Client,
    retry: RetryConfig,
}

impl CallbackClient {
    pub fn new(retry: RetryConfig, timeout: Duration) -> Result<Self, DeliveryError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(DeliveryError::Client)?;
        Ok(Self { http, retry })
    }

    pub fn from_config(config: &CallbackConfig) -> Result<Self, DeliveryError> {
        Self::new(retry_config(config), config.timeout)
    }

    pub async fn deliver(&self, url: &str, payload: &ResultPayload) -> Result<(), DeliveryError> {
        let body = payload.to_json()?;
        let mut attempt = 0;

        loop {
            match self.attempt(url, &body).await {
                Attempt::Delivered => {
                    info!(callback_url = %url, attempts = attempt + 1, "Callback delivered");
                    return Ok(());
                }
                Attempt::Permanent(status) => {
                    warn!(callback_url = %url, status = %status, "Callback rejected");
                    return Err(DeliveryError::Rejected(status));
                }
                Attempt::Invalid(message) => {
                    warn!(callback_url = %url, error = %message, "Callback URL rejected");
                    return Err(DeliveryError::InvalidUrl {
                        url: url.to_string(),
                        message,
                    });
                }
                Attempt::Transient(reason) if attempt >= self.retry.max_retries => {
                    return Err(DeliveryError::Exhausted {
                        attempts: attempt + 1,
                        last_error: reason,
                    });
                }
                Attempt::Transient(reason) => {
                    let delay = self.retry.jittered_delay(attempt);
                    warn!(
                        callback_url = %url,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        reason = %reason,
                        "Callback failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(&self, url: &str, body: &str) -> Attempt {
        let response = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await;

        match response {
            Ok(r) if r.status() == StatusCode::OK => Attempt::Delivered,
            Ok(r) if is_transient_status(r.status().as_u16()) => {
                Attempt::Transient(format!("HTTP {}", r.status()))
            }
            Ok(r) => Attempt::Permanent(r.status()),
            Err(e) if e.is_builder() => Attempt::Invalid(e.to_string()),
            Err(e) => {
                debug!(callback_url = %url, error = %e, "Callback request error");
                Attempt::Transient(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openchecker_core::JobMessage;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    fn payload() -> ResultPayload {
        let body = json!({"project_url": "https://github.com/acme/widget.git"});
        let job = JobMessage::decode(body.to_string().as_bytes())
            .unwrap()
            .validate()
            .unwrap();
        ResultPayload::for_job(&job)
    }

    fn client() -> CallbackClient {
        CallbackClient::new(fast_retry(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_retry_policy_follows_callback_config() {
        let config = CallbackConfig {
            max_retries: 2,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
            backoff_multiplier: 3.0,
            jitter: false,
            timeout: Duration::from_secs(5),
        };
        let retry = retry_config(&config);
        assert_eq!(retry.max_retries, 2);
        assert_eq!(retry.backoff_multiplier, 3.0);
        assert!(!retry.jitter);
        assert_eq!(retry.jittered_delay(2), Duration::from_millis(2250));
    }

    #[tokio::test]
    async fn test_delivered_on_200() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cb"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        client()
            .deliver(&format!("{}/cb", mock_server.uri()), &payload())
            .await
            .unwrap();

        let requests = mock_server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["project_url"], "https://github.com/acme/widget.git");
        assert_eq!(body["scan_results"], json!({}));
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        client().deliver(&mock_server.uri(), &payload()).await.unwrap();
        assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_non_transient_status_fails_immediately() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&mock_server)
            .await;

        let err = client().deliver(&mock_server.uri(), &payload()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Rejected(StatusCode::BAD_REQUEST)));
    }

    #[tokio::test]
    async fn test_other_success_codes_are_failures() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let err = client().deliver(&mock_server.uri(), &payload()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Rejected(StatusCode::NO_CONTENT)));
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&mock_server)
            .await;

        let err = client().deliver(&mock_server.uri(), &payload()).await.unwrap_err();
        match err {
            DeliveryError::Exhausted { attempts, .. } => assert_eq!(attempts, 4),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(mock_server.received_requests().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_unbuildable_url_fails_without_retry() {
        let err = client().deliver("not a url", &payload()).await.unwrap_err();
        match err {
            DeliveryError::InvalidUrl { url, .. } => assert_eq!(url, "not a url"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_connection_errors_are_transient() {
        // Nothing listens on the discard port.
        let err = client()
            .deliver("http://127.0.0.1:9/cb", &payload())
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Exhausted { attempts: 4, .. }));
    }
}
