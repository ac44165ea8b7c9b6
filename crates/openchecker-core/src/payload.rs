//! Scan results and the outbound callback payload.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;

use crate::{Result, TaskMetadata, ValidatedJob};

/// Per-command results of one job.
///
/// A failed command is stored as `{"error": "<message>"}`. Entries are only
/// ever inserted; recording one command never touches another's entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanResults(BTreeMap<String, Value>);

impl ScanResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, command: &str, value: Value) {
        self.0.insert(command.to_string(), value);
    }

    pub fn record_failure(&mut self, command: &str, message: impl Into<String>) {
        self.0
            .insert(command.to_string(), json!({ "error": message.into() }));
    }

    pub fn get(&self, command: &str) -> Option<&Value> {
        self.0.get(command)
    }

    /// Whether the stored entry for `command` is an error record.
    pub fn is_failure(&self, command: &str) -> bool {
        self.0
            .get(command)
            .and_then(|v| v.as_object())
            .is_some_and(|o| o.len() == 1 && o.contains_key("error"))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// The aggregate delivered to the callback endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    pub command_list: Vec<String>,
    pub project_url: String,
    pub task_metadata: TaskMetadata,
    pub scan_results: ScanResults,
}

impl ResultPayload {
    /// An empty payload echoing the job's request fields.
    pub fn for_job(job: &ValidatedJob) -> Self {
        Self {
            command_list: job.command_list.clone(),
            project_url: job.project.url.clone(),
            task_metadata: job.task_metadata.clone(),
            scan_results: ScanResults::new(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JobMessage;

    fn job() -> ValidatedJob {
        let body = json!({
            "command_list": ["readme-checker", "url-checker"],
            "project_url": "https://github.com/acme/widget.git",
            "task_metadata": {"version_number": "v2", "nested": {"a": [1, 2]}}
        });
        JobMessage::decode(body.to_string().as_bytes())
            .unwrap()
            .validate()
            .unwrap()
    }

    #[test]
    fn test_payload_round_trip_preserves_request_fields() {
        let mut payload = ResultPayload::for_job(&job());
        payload
            .scan_results
            .record_success("readme-checker", json!({"readme_file": ["README.md"]}));
        payload.scan_results.record_failure("url-checker", "timed out");

        let parsed: ResultPayload = serde_json::from_str(&payload.to_json().unwrap()).unwrap();

        assert_eq!(parsed.command_list, payload.command_list);
        assert_eq!(parsed.project_url, payload.project_url);
        assert_eq!(parsed.task_metadata, payload.task_metadata);
        assert_eq!(parsed, payload);
    }

    #[test]
    fn test_wire_shape() {
        let mut payload = ResultPayload::for_job(&job());
        payload.scan_results.record_failure("url-checker", "boom");

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["project_url"], "https://github.com/acme/widget.git");
        assert_eq!(value["task_metadata"]["version_number"], "v2");
        assert_eq!(value["scan_results"]["url-checker"], json!({"error": "boom"}));
    }

    #[test]
    fn test_failure_does_not_touch_other_entries() {
        let mut results = ScanResults::new();
        results.record_success("a", json!({"ok": true}));
        results.record_failure("b", "broken");

        assert_eq!(results.get("a"), Some(&json!({"ok": true})));
        assert!(results.is_failure("b"));
        assert!(!results.is_failure("a"));
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_success_value_with_error_field_is_not_a_failure() {
        let mut results = ScanResults::new();
        results.record_success("oat-scanner", json!({"status_code": 404, "error": "OAT.xml not found"}));
        assert!(!results.is_failure("oat-scanner"));
    }
}
