//! Job messages received from the queue.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{CommandToken, JobError, JobId, ProjectUrl};

/// Opaque metadata forwarded verbatim from the request to the callback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskMetadata(Map<String, Value>);

impl TaskMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revision to pin the workspace to, if any.
    ///
    /// `null`, empty strings and the literal `"None"` all mean "no pin".
    pub fn version_number(&self) -> Option<&str> {
        match self.0.get("version_number") {
            Some(Value::String(v)) if !v.is_empty() && v != "None" => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }
}

impl From<Map<String, Value>> for TaskMetadata {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// A scan request as it arrives on the queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobMessage {
    #[serde(default)]
    pub command_list: Vec<String>,
    #[serde(default)]
    pub project_url: Option<String>,
    #[serde(default)]
    pub commit_hash: Option<String>,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub task_metadata: TaskMetadata,
}

impl JobMessage {
    /// Decode a raw queue message body.
    pub fn decode(body: &[u8]) -> Result<Self, JobError> {
        serde_json::from_slice(body).map_err(|e| JobError::Malformed(e.to_string()))
    }

    /// Check required fields and parse the project URL.
    ///
    /// Runs before any workspace is created; failures are message-level.
    pub fn validate(self) -> Result<ValidatedJob, JobError> {
        let url = self
            .project_url
            .filter(|u| !u.trim().is_empty())
            .ok_or(JobError::MissingProjectUrl)?;

        let project =
            ProjectUrl::parse(&url).map_err(|_| JobError::InvalidProjectUrl(url.clone()))?;

        let commands = self
            .command_list
            .iter()
            .map(|c| CommandToken::resolve(c))
            .collect();

        Ok(ValidatedJob {
            id: JobId::new(),
            project,
            command_list: self.command_list,
            commands,
            commit_hash: self.commit_hash.filter(|h| !h.is_empty()),
            callback_url: self.callback_url.filter(|u| !u.is_empty()),
            task_metadata: self.task_metadata,
        })
    }
}

/// A decoded job whose required fields are present and whose URL parsed.
#[derive(Debug, Clone)]
pub struct ValidatedJob {
    pub id: JobId,
    pub project: ProjectUrl,
    /// The command list exactly as received, echoed in the payload.
    pub command_list: Vec<String>,
    /// `command_list` resolved token by token, same order and length.
    pub commands: Vec<CommandToken>,
    pub commit_hash: Option<String>,
    pub callback_url: Option<String>,
    pub task_metadata: TaskMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Command;
    use serde_json::json;

    #[test]
    fn test_decode_full_message() {
        let body = json!({
            "command_list": ["readme-checker", "osv-scanner"],
            "project_url": "https://github.com/acme/widget.git",
            "commit_hash": "abc123",
            "callback_url": "http://x/cb",
            "task_metadata": {"version_number": "v1.0.0", "task_id": 7}
        });

        let job = JobMessage::decode(body.to_string().as_bytes())
            .unwrap()
            .validate()
            .unwrap();

        assert_eq!(job.project.repo, "widget");
        assert_eq!(
            job.commands,
            vec![
                CommandToken::Known(Command::ReadmeChecker),
                CommandToken::Known(Command::OsvScanner)
            ]
        );
        assert_eq!(job.commit_hash.as_deref(), Some("abc123"));
        assert_eq!(job.callback_url.as_deref(), Some("http://x/cb"));
        assert_eq!(job.task_metadata.version_number(), Some("v1.0.0"));
        assert_eq!(job.task_metadata.get("task_id"), Some(&json!(7)));
    }

    #[test]
    fn test_optional_fields_default() {
        let body = br#"{"project_url": "https://gitee.com/a/b.git"}"#;
        let job = JobMessage::decode(body).unwrap().validate().unwrap();

        assert!(job.commands.is_empty());
        assert!(job.commit_hash.is_none());
        assert!(job.callback_url.is_none());
        assert_eq!(job.task_metadata, TaskMetadata::new());
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        let err = JobMessage::decode(b"{not json").unwrap_err();
        assert!(matches!(err, JobError::Malformed(_)));
        assert!(err.is_message_level());
    }

    #[test]
    fn test_missing_project_url() {
        let body = br#"{"command_list": ["readme-checker"]}"#;
        let err = JobMessage::decode(body).unwrap().validate().unwrap_err();
        assert!(matches!(err, JobError::MissingProjectUrl));

        let body = br#"{"project_url": "  "}"#;
        let err = JobMessage::decode(body).unwrap().validate().unwrap_err();
        assert!(matches!(err, JobError::MissingProjectUrl));
    }

    #[test]
    fn test_invalid_project_url() {
        let body = br#"{"project_url": "https://example.com/a/b.git"}"#;
        let err = JobMessage::decode(body).unwrap().validate().unwrap_err();
        assert!(matches!(err, JobError::InvalidProjectUrl(_)));
    }

    #[test]
    fn test_version_number_sentinels() {
        for value in [json!(null), json!(""), json!("None"), json!(3)] {
            let mut metadata = TaskMetadata::new();
            metadata.insert("version_number", value);
            assert_eq!(metadata.version_number(), None);
        }
        assert_eq!(TaskMetadata::new().version_number(), None);
    }

    #[test]
    fn test_duplicate_and_unknown_tokens_preserved() {
        let body = json!({
            "command_list": ["readme-checker", "bogus", "readme-checker"],
            "project_url": "https://github.com/acme/widget.git"
        });
        let job = JobMessage::decode(body.to_string().as_bytes())
            .unwrap()
            .validate()
            .unwrap();

        assert_eq!(job.commands.len(), 3);
        assert_eq!(job.commands[1], CommandToken::Unknown("bogus".to_string()));
        assert_eq!(job.command_list, vec!["readme-checker", "bogus", "readme-checker"]);
    }
}
