//! Agent configuration errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("configuration is not valid KDL: {0}")]
    Kdl(#[from] kdl::KdlError),

    #[error("section '{0}' is defined more than once")]
    DuplicateSection(String),

    #[error("section '{section}' requires '{key}'")]
    MissingSetting {
        section: &'static str,
        key: &'static str,
    },

    #[error("invalid {section}.{key}: {message}")]
    InvalidSetting {
        section: String,
        key: String,
        message: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(section: &str, key: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidSetting {
            section: section.to_string(),
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// Dotted `section.key` of the offending setting, when there is one.
    pub fn setting(&self) -> Option<String> {
        match self {
            ConfigError::MissingSetting { section, key } => Some(format!("{section}.{key}")),
            ConfigError::InvalidSetting { section, key, .. } => Some(format!("{section}.{key}")),
            _ => None,
        }
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_setting() {
        let err = ConfigError::invalid("broker", "port", "70000 is not a valid port");
        assert_eq!(err.to_string(), "invalid broker.port: 70000 is not a valid port");
        assert_eq!(err.setting().as_deref(), Some("broker.port"));

        let err = ConfigError::MissingSetting {
            section: "llm",
            key: "model",
        };
        assert_eq!(err.to_string(), "section 'llm' requires 'model'");
        assert_eq!(err.setting().as_deref(), Some("llm.model"));
    }

    #[test]
    fn test_read_error_names_the_file() {
        let err = ConfigError::Read {
            path: PathBuf::from("/etc/openchecker.kdl"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().starts_with("failed to read configuration /etc/openchecker.kdl"));
        assert!(err.setting().is_none());
    }
}
