//! Reloadable credentials handle.
//!
//! Checkers and the broker receive a cloned [`Credentials`] and read the
//! current secret at the point of use, so a reload takes effect on the next
//! connect or the next checker run without restarting the agent.

use crate::{AgentConfig, ConfigResult};
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard};
use tracing::info;

/// Passwords and tokens read from the configuration file or environment.
#[derive(Clone, PartialEq, Eq)]
pub struct Secrets {
    pub broker_password: String,
    pub sonar_password: Option<String>,
    pub sonar_token: Option<String>,
    pub gitee_access_token: Option<String>,
    pub github_token: Option<String>,
    pub llm_api_key: Option<String>,
}

impl Default for Secrets {
    fn default() -> Self {
        Self {
            broker_password: "guest".to_string(),
            sonar_password: None,
            sonar_token: None,
            gitee_access_token: None,
            github_token: None,
            llm_api_key: None,
        }
    }
}

// Never print secret values.
impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn mask(v: &Option<String>) -> &'static str {
            if v.is_some() { "<set>" } else { "<unset>" }
        }
        f.debug_struct("Secrets")
            .field("broker_password", &"<set>")
            .field("sonar_password", &mask(&self.sonar_password))
            .field("sonar_token", &mask(&self.sonar_token))
            .field("gitee_access_token", &mask(&self.gitee_access_token))
            .field("github_token", &mask(&self.github_token))
            .field("llm_api_key", &mask(&self.llm_api_key))
            .finish()
    }
}

/// Shared, cloneable view of the current [`Secrets`].
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    inner: Arc<RwLock<Secrets>>,
}

impl Credentials {
    pub fn new(secrets: Secrets) -> Self {
        Self {
            inner: Arc::new(RwLock::new(secrets)),
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.secrets.clone())
    }

    fn read(&self) -> RwLockReadGuard<'_, Secrets> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> Secrets {
        self.read().clone()
    }

    pub fn broker_password(&self) -> String {
        self.read().broker_password.clone()
    }

    pub fn sonar_password(&self) -> Option<String> {
        self.read().sonar_password.clone()
    }

    pub fn sonar_token(&self) -> Option<String> {
        self.read().sonar_token.clone()
    }

    pub fn gitee_access_token(&self) -> Option<String> {
        self.read().gitee_access_token.clone()
    }

    pub fn github_token(&self) -> Option<String> {
        self.read().github_token.clone()
    }

    pub fn llm_api_key(&self) -> Option<String> {
        self.read().llm_api_key.clone()
    }

    /// Replace every secret at once. All clones observe the new values.
    pub fn replace(&self, secrets: Secrets) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = secrets;
    }

    /// Re-read the configuration file (plus environment overrides) and swap in
    /// its secrets. Non-secret settings in the file are ignored.
    ///
    /// On error the current secrets are left untouched.
    pub fn reload_from(&self, path: Option<&Path>) -> ConfigResult<()> {
        let config = AgentConfig::load(path)?;
        self.replace(config.secrets);
        info!("Credentials reloaded");
        Ok(())
    }
}
