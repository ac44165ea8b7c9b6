//! Agent configuration parsing.

use crate::credentials::Secrets;
use crate::{ConfigError, ConfigResult};
use kdl::{KdlDocument, KdlNode, KdlValue};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "openchecker.kdl";

/// Agent-wide configuration.
#[derive(Debug, Clone, Default)]
pub struct AgentConfig {
    pub broker: BrokerConfig,
    pub workspace: WorkspaceConfig,
    pub callback: CallbackConfig,
    pub tools: ToolsConfig,
    pub sonarqube: Option<SonarQubeConfig>,
    pub llm: Option<LlmConfig>,
    /// Passwords and tokens, handed to [`crate::Credentials`].
    pub secrets: Secrets,
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub vhost: String,
    pub queue: String,
    pub heartbeat_interval: Duration,
    /// Cool-down between a recoverable connection failure and the next connect.
    pub reconnect_delay: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            username: "guest".to_string(),
            vhost: "/".to_string(),
            queue: "opencheck".to_string(),
            heartbeat_interval: Duration::from_secs(60),
            reconnect_delay: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    /// Directory under which every job gets its own sub-directory.
    pub root: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: std::env::temp_dir().join("openchecker"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CallbackConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Growth factor between consecutive retry delays. At least 1.0.
    pub backoff_multiplier: f64,
    /// Add up to a quarter of each delay as random jitter.
    pub jitter: bool,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            backoff_multiplier: 2.0,
            jitter: true,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolsConfig {
    /// Upper bound on a single external tool invocation. `None` waits forever.
    pub timeout: Option<Duration>,
    pub binary_checker: PathBuf,
    pub oat_jar: PathBuf,
    /// `licensee` executable used to fill in undeclared dependency licenses.
    pub licensee: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            binary_checker: PathBuf::from("./scripts/binary_checker.sh"),
            oat_jar: PathBuf::from("ohos_ossaudittool-2.0.0.jar"),
            licensee: PathBuf::from("licensee"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SonarQubeConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// How long to wait for the server to process an uploaded analysis.
    pub processing_delay: Duration,
}

impl SonarQubeConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub model: String,
}

impl AgentConfig {
    /// Load configuration from `path`, or from `OPENCHECKER_CONFIG`, or from
    /// `openchecker.kdl` in the working directory when present.
    ///
    /// An explicitly named file must exist; the default file is optional.
    /// Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("OPENCHECKER_CONFIG").ok().map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    info!("No configuration file found, using defaults");
                    Self::default()
                }
            }
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Parsing configuration file");
        parse_agent_config(&content)
    }

    /// Apply `OPENCHECKER_*` environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("OPENCHECKER_BROKER_HOST") {
            self.broker.host = host;
        }
        if let Some(port) = std::env::var("OPENCHECKER_BROKER_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
        {
            self.broker.port = port;
        }
        if let Ok(username) = std::env::var("OPENCHECKER_BROKER_USERNAME") {
            self.broker.username = username;
        }
        if let Ok(password) = std::env::var("OPENCHECKER_BROKER_PASSWORD") {
            self.secrets.broker_password = password;
        }
        if let Ok(queue) = std::env::var("OPENCHECKER_QUEUE") {
            self.broker.queue = queue;
        }
        if let Ok(root) = std::env::var("OPENCHECKER_WORKSPACE_ROOT") {
            self.workspace.root = PathBuf::from(root);
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.broker.queue.is_empty() {
            return Err(ConfigError::invalid("broker", "queue", "must not be empty"));
        }
        if self.broker.heartbeat_interval.is_zero() {
            return Err(ConfigError::invalid(
                "broker",
                "heartbeat-interval",
                "must be at least one second",
            ));
        }
        if self.callback.initial_delay > self.callback.max_delay {
            return Err(ConfigError::invalid(
                "callback",
                "initial-delay-ms",
                "must not exceed max-delay-ms",
            ));
        }
        let multiplier = self.callback.backoff_multiplier;
        if multiplier.is_nan() || multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "callback",
                "backoff-multiplier",
                format!("{} is below 1.0", multiplier),
            ));
        }
        Ok(())
    }
}

/// Parse an agent configuration from KDL text. Missing nodes keep their defaults.
pub fn parse_agent_config(kdl: &str) -> ConfigResult<AgentConfig> {
    let doc: KdlDocument = kdl.parse()?;
    let mut config = AgentConfig::default();
    let mut seen = HashSet::new();

    for node in doc.nodes() {
        let section = node.name().value();
        if !seen.insert(section.to_string()) {
            return Err(ConfigError::DuplicateSection(section.to_string()));
        }

        match section {
            "broker" => parse_broker(node, &mut config)?,
            "workspace" => {
                if let Some(root) = child_string(node, "root") {
                    config.workspace.root = PathBuf::from(root);
                }
            }
            "callback" => parse_callback(node, &mut config.callback)?,
            "tools" => parse_tools(node, &mut config.tools)?,
            "sonarqube" => parse_sonarqube(node, &mut config)?,
            "gitee" => {
                config.secrets.gitee_access_token = child_string(node, "access-token");
            }
            "github" => {
                config.secrets.github_token = child_string(node, "token");
            }
            "llm" => parse_llm(node, &mut config)?,
            _ => {} // Ignore unknown nodes
        }
    }

    Ok(config)
}

fn parse_broker(node: &KdlNode, config: &mut AgentConfig) -> ConfigResult<()> {
    let broker = &mut config.broker;
    if let Some(host) = child_string(node, "host") {
        broker.host = host;
    }
    if let Some(port) = child_u64(node, "port")? {
        broker.port = to_port("broker", port)?;
    }
    if let Some(username) = child_string(node, "username") {
        broker.username = username;
    }
    if let Some(password) = child_string(node, "password") {
        config.secrets.broker_password = password;
    }
    if let Some(vhost) = child_string(node, "vhost") {
        broker.vhost = vhost;
    }
    if let Some(queue) = child_string(node, "queue") {
        broker.queue = queue;
    }
    if let Some(secs) = child_u64(node, "heartbeat-interval")? {
        broker.heartbeat_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = child_u64(node, "reconnect-delay")? {
        broker.reconnect_delay = Duration::from_secs(secs);
    }
    Ok(())
}

fn parse_callback(node: &KdlNode, callback: &mut CallbackConfig) -> ConfigResult<()> {
    if let Some(retries) = child_u64(node, "max-retries")? {
        callback.max_retries = u32::try_from(retries).map_err(|_| {
            ConfigError::invalid("callback", "max-retries", format!("{} is too large", retries))
        })?;
    }
    if let Some(ms) = child_u64(node, "initial-delay-ms")? {
        callback.initial_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = child_u64(node, "max-delay-ms")? {
        callback.max_delay = Duration::from_millis(ms);
    }
    if let Some(multiplier) = child_f64(node, "backoff-multiplier")? {
        callback.backoff_multiplier = multiplier;
    }
    if let Some(jitter) = child_bool(node, "jitter")? {
        callback.jitter = jitter;
    }
    if let Some(secs) = child_u64(node, "timeout-secs")? {
        callback.timeout = Duration::from_secs(secs);
    }
    Ok(())
}

fn parse_tools(node: &KdlNode, tools: &mut ToolsConfig) -> ConfigResult<()> {
    if let Some(secs) = child_u64(node, "timeout-secs")? {
        tools.timeout = Some(Duration::from_secs(secs));
    }
    if let Some(path) = child_string(node, "binary-checker") {
        tools.binary_checker = PathBuf::from(path);
    }
    if let Some(path) = child_string(node, "oat-jar") {
        tools.oat_jar = PathBuf::from(path);
    }
    if let Some(path) = child_string(node, "licensee") {
        tools.licensee = PathBuf::from(path);
    }
    Ok(())
}

fn parse_sonarqube(node: &KdlNode, config: &mut AgentConfig) -> ConfigResult<()> {
    let host = child_string(node, "host").ok_or(ConfigError::MissingSetting {
        section: "sonarqube",
        key: "host",
    })?;
    let port = match child_u64(node, "port")? {
        Some(port) => to_port("sonarqube", port)?,
        None => 9000,
    };
    let processing_delay = child_u64(node, "processing-delay")?.unwrap_or(60);

    config.secrets.sonar_password = child_string(node, "password");
    config.secrets.sonar_token = child_string(node, "token");
    config.sonarqube = Some(SonarQubeConfig {
        host,
        port,
        username: child_string(node, "username").unwrap_or_else(|| "admin".to_string()),
        processing_delay: Duration::from_secs(processing_delay),
    });
    Ok(())
}

fn parse_llm(node: &KdlNode, config: &mut AgentConfig) -> ConfigResult<()> {
    let base_url = child_string(node, "base-url").ok_or(ConfigError::MissingSetting {
        section: "llm",
        key: "base-url",
    })?;
    let model = child_string(node, "model").ok_or(ConfigError::MissingSetting {
        section: "llm",
        key: "model",
    })?;

    config.secrets.llm_api_key = child_string(node, "api-key");
    config.llm = Some(LlmConfig {
        base_url: base_url.trim_end_matches('/').to_string(),
        model,
    });
    Ok(())
}

fn to_port(section: &str, value: u64) -> ConfigResult<u16> {
    u16::try_from(value)
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| ConfigError::invalid(section, "port", format!("{} is not a valid port", value)))
}

// Helper functions for extracting values from KDL nodes

fn child<'a>(node: &'a KdlNode, name: &str) -> Option<&'a KdlNode> {
    node.children()?
        .nodes()
        .iter()
        .find(|c| c.name().value() == name)
}

fn child_string(node: &KdlNode, name: &str) -> Option<String> {
    child(node, name).and_then(get_first_string_arg)
}

fn child_value<'a>(node: &'a KdlNode, name: &str) -> Option<&'a KdlValue> {
    child(node, name)?
        .entries()
        .iter()
        .find(|e| e.name().is_none())
        .map(|e| e.value())
}

fn child_u64(node: &KdlNode, name: &str) -> ConfigResult<Option<u64>> {
    if child(node, name).is_none() {
        return Ok(None);
    }
    let section = node.name().value();

    let value = child_value(node, name)
        .and_then(KdlValue::as_integer)
        .ok_or_else(|| ConfigError::invalid(section, name, "expected an integer"))?;

    u64::try_from(value).map(Some).map_err(|_| {
        ConfigError::invalid(section, name, format!("{} is negative or too large", value))
    })
}

/// Floats, with integers accepted as-is (`backoff-multiplier 3`).
fn child_f64(node: &KdlNode, name: &str) -> ConfigResult<Option<f64>> {
    if child(node, name).is_none() {
        return Ok(None);
    }
    let value = child_value(node, name).and_then(|v| {
        v.as_float()
            .or_else(|| v.as_integer().map(|i| i as f64))
    });
    value
        .map(Some)
        .ok_or_else(|| ConfigError::invalid(node.name().value(), name, "expected a number"))
}

fn child_bool(node: &KdlNode, name: &str) -> ConfigResult<Option<bool>> {
    if child(node, name).is_none() {
        return Ok(None);
    }
    child_value(node, name)
        .and_then(KdlValue::as_bool)
        .map(Some)
        .ok_or_else(|| ConfigError::invalid(node.name().value(), name, "expected #true or #false"))
}

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}
