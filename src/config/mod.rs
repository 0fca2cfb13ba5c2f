//! Relay configuration management
//!
//! Configuration is read once at start-up and is read-only afterwards. It can come
//! from a file (TOML, YAML or JSON), from environment variables, or from a file with
//! environment overrides applied on top. The environment variable names match the
//! ones used by the bot deployment (`AZURE_AI_FOUNDRY_*`, `PROJECT_*`, `AZURE_CLIENT_*`).
//!
//! An empty agent identifier is a valid, meaningful value: it routes every question
//! straight to the chat-completion backend.

use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, time::Duration};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable parsing error: {0}")]
    EnvVarParse(String),
    #[error("File parsing error: {0}")]
    FileParse(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RelayConfig {
    /// Chat adapter settings
    #[serde(default)]
    pub bot: BotConfig,
    /// API-key authenticated Foundry resource (REST agent + chat completion)
    #[serde(default)]
    pub foundry: FoundryConfig,
    /// Token authenticated project agents API
    #[serde(default)]
    pub project: ProjectConfig,
    /// Explicit service principal credentials
    #[serde(default)]
    pub credentials: CredentialConfig,
    /// Run polling cadence and budgets
    #[serde(default)]
    pub polling: PollingConfig,
    /// Chat completion request parameters
    #[serde(default)]
    pub completion: CompletionConfig,
    /// Fallback policy between backends
    #[serde(default)]
    pub fallback: FallbackConfig,
    /// Outbound HTTP settings
    #[serde(default)]
    pub http: HttpClientConfig,
}

/// Where the action HTTP surface listens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Foundry resource reached with an `api-key` header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoundryConfig {
    /// Resource endpoint, e.g. `https://my-resource.services.ai.azure.com`
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    /// Deployment used by the chat-completion backend
    #[serde(default = "default_model_name")]
    pub model_name: String,
    /// Agent (assistant) identifier; empty selects chat completion only
    #[serde(default)]
    pub agent_id: String,
    #[serde(default = "default_foundry_api_version")]
    pub api_version: String,
}

/// Project agents API reached with a bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Whether the project backend may be used at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub connection_string: String,
    #[serde(default = "default_project_api_version")]
    pub api_version: String,
}

/// Service principal used when the default credential tier is unavailable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default = "default_authority_host")]
    pub authority_host: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Azure CLI executable used by the default credential tier
    #[serde(default = "default_cli_program")]
    pub cli_program: String,
}

/// Run polling cadence and budgets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Project backend: wait between status checks
    #[serde(with = "duration_seconds", default = "default_project_interval")]
    pub project_interval: Duration,
    /// Project backend: wall-clock ceiling for one run
    #[serde(with = "duration_seconds", default = "default_project_deadline")]
    pub project_deadline: Duration,
    /// REST agent backend: wait between status checks
    #[serde(with = "duration_seconds", default = "default_rest_interval")]
    pub rest_interval: Duration,
    /// REST agent backend: maximum number of status checks
    #[serde(default = "default_rest_max_attempts")]
    pub rest_max_attempts: u32,
}

/// Chat completion request parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

/// Fallback policy between backends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Continue with the REST backends when the project backend fails
    #[serde(default = "default_true")]
    pub on_project_failure: bool,
}

/// Outbound HTTP settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// Per-request timeout for every backend call
    #[serde(with = "duration_seconds", default = "default_request_timeout")]
    pub request_timeout: Duration,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for FoundryConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            model_name: default_model_name(),
            agent_id: String::new(),
            api_version: default_foundry_api_version(),
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: String::new(),
            connection_string: String::new(),
            api_version: default_project_api_version(),
        }
    }
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            tenant_id: String::new(),
            authority_host: default_authority_host(),
            scope: default_scope(),
            cli_program: default_cli_program(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            project_interval: default_project_interval(),
            project_deadline: default_project_deadline(),
            rest_interval: default_rest_interval(),
            rest_max_attempts: default_rest_max_attempts(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            on_project_failure: true,
        }
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
        }
    }
}

impl FoundryConfig {
    /// Endpoint without a trailing slash
    pub fn base_endpoint(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    /// Whether an agent identifier is configured
    pub fn has_agent(&self) -> bool {
        !self.agent_id.is_empty()
    }
}

impl ProjectConfig {
    /// Whether the project backend can be offered to the orchestrator
    pub fn is_available(&self) -> bool {
        self.enabled && !self.endpoint.is_empty()
    }

    /// Endpoint without a trailing slash
    pub fn base_endpoint(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }
}

impl CredentialConfig {
    /// All three service principal values are present
    pub fn has_client_secret(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty() && !self.tenant_id.is_empty()
    }
}

impl RelayConfig {
    /// Load configuration from a file (supports TOML, YAML, JSON)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let extension = path.extension().and_then(|s| s.to_str());

        match extension {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| ConfigError::FileParse(e.to_string()))
            }
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|e| ConfigError::FileParse(e.to_string()))
            }
            Some("json") => {
                serde_json::from_str(&content).map_err(|e| ConfigError::FileParse(e.to_string()))
            }
            _ => Err(ConfigError::FileParse(
                "Unsupported file format. Use .toml, .yaml, .yml, or .json".to_string(),
            )),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().merge_with_env()
    }

    /// Merge configuration with environment variable overrides
    ///
    /// Only variables that are set override the current values.
    pub fn merge_with_env(self) -> Result<Self, ConfigError> {
        self.merge_with_lookup(|var| env::var(var).ok())
    }

    /// Apply overrides from any variable source, e.g. a map in tests
    pub fn merge_with_lookup<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // HTTP surface
        override_string(&lookup, &mut self.bot.host, "FABRIC_RELAY_HOST");
        if let Some(port) = lookup("PORT") {
            self.bot.port = port
                .parse()
                .map_err(|e| ConfigError::EnvVarParse(format!("PORT: {}", e)))?;
        }

        // Foundry resource
        override_string(&lookup, &mut self.foundry.endpoint, "AZURE_AI_FOUNDRY_ENDPOINT");
        override_string(&lookup, &mut self.foundry.api_key, "AZURE_AI_FOUNDRY_API_KEY");
        override_string(&lookup, &mut self.foundry.model_name, "AZURE_AI_FOUNDRY_MODEL_NAME");
        override_string(&lookup, &mut self.foundry.agent_id, "AZURE_AI_FOUNDRY_AGENT_ID");
        override_string(&lookup, &mut self.foundry.api_version, "AZURE_AI_FOUNDRY_API_VERSION");

        // Project agents
        if let Some(enabled) = lookup("FABRIC_RELAY_PROJECT_ENABLED") {
            self.project.enabled = enabled == "true";
        }
        override_string(&lookup, &mut self.project.endpoint, "PROJECT_ENDPOINT");
        override_string(&lookup, &mut self.project.connection_string, "PROJECT_CONNECTION_STRING");
        override_string(&lookup, &mut self.project.api_version, "PROJECT_API_VERSION");

        // Service principal
        override_string(&lookup, &mut self.credentials.client_id, "AZURE_CLIENT_ID");
        override_string(&lookup, &mut self.credentials.client_secret, "AZURE_CLIENT_SECRET");
        override_string(&lookup, &mut self.credentials.tenant_id, "AZURE_TENANT_ID");
        override_string(&lookup, &mut self.credentials.authority_host, "AZURE_AUTHORITY_HOST");

        // Fallback policy
        if let Some(fallback) = lookup("FABRIC_RELAY_FALLBACK_ON_PROJECT_FAILURE") {
            self.fallback.on_project_failure = fallback == "true";
        }

        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.foundry.endpoint.is_empty() {
            return Err(ConfigError::Validation(
                "Foundry endpoint cannot be empty".to_string(),
            ));
        }
        url::Url::parse(&self.foundry.endpoint).map_err(|e| {
            ConfigError::Validation(format!("Foundry endpoint is not a valid URL: {}", e))
        })?;
        if self.foundry.api_key.is_empty() {
            return Err(ConfigError::Validation(
                "Foundry API key cannot be empty".to_string(),
            ));
        }
        if self.foundry.model_name.is_empty() {
            return Err(ConfigError::Validation(
                "Model deployment name cannot be empty".to_string(),
            ));
        }
        if self.project.is_available() {
            url::Url::parse(&self.project.endpoint).map_err(|e| {
                ConfigError::Validation(format!("Project endpoint is not a valid URL: {}", e))
            })?;
        }

        if self.polling.project_interval.is_zero() || self.polling.rest_interval.is_zero() {
            return Err(ConfigError::Validation(
                "Poll intervals must be greater than 0".to_string(),
            ));
        }
        if self.polling.rest_max_attempts == 0 {
            return Err(ConfigError::Validation(
                "REST poll attempts must be greater than 0".to_string(),
            ));
        }

        if self.completion.temperature < 0.0 || self.completion.temperature > 2.0 {
            return Err(ConfigError::Validation(
                "Temperature must be between 0.0 and 2.0".to_string(),
            ));
        }
        if self.completion.max_tokens == 0 {
            return Err(ConfigError::Validation(
                "Max tokens must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn override_string<F>(lookup: &F, target: &mut String, var: &str)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(var) {
        *target = value;
    }
}

/// Custom serialization for Duration as seconds
mod duration_seconds {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Default value functions for serde
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3978
}

fn default_model_name() -> String {
    "gpt-4o".to_string()
}

fn default_foundry_api_version() -> String {
    "2024-02-15-preview".to_string()
}

fn default_project_api_version() -> String {
    "v1".to_string()
}

fn default_authority_host() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_scope() -> String {
    "https://ai.azure.com/.default".to_string()
}

fn default_cli_program() -> String {
    "az".to_string()
}

fn default_project_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_project_deadline() -> Duration {
    Duration::from_secs(60)
}

fn default_rest_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_rest_max_attempts() -> u32 {
    30
}

fn default_max_tokens() -> u32 {
    4800
}

fn default_temperature() -> f32 {
    0.7
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(90)
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    fn valid_config() -> RelayConfig {
        let mut config = RelayConfig::default();
        config.foundry.endpoint = "https://example.services.ai.azure.com/".to_string();
        config.foundry.api_key = "test-key".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.bot.port, 3978);
        assert_eq!(config.foundry.model_name, "gpt-4o");
        assert_eq!(config.foundry.api_version, "2024-02-15-preview");
        assert!(config.foundry.agent_id.is_empty());
        assert_eq!(config.polling.project_deadline, Duration::from_secs(60));
        assert_eq!(config.polling.rest_max_attempts, 30);
        assert_eq!(config.completion.max_tokens, 4800);
        assert!(config.fallback.on_project_failure);
        assert!(!config.project.is_available());
    }

    #[test]
    fn test_config_validation() {
        let mut config = valid_config();
        assert!(config.validate().is_ok());

        config.foundry.api_key = String::new();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.foundry.endpoint = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.polling.rest_max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.completion.temperature = 3.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_endpoint_helpers() {
        let mut config = valid_config();
        assert_eq!(
            config.foundry.base_endpoint(),
            "https://example.services.ai.azure.com"
        );
        assert!(!config.foundry.has_agent());

        config.project.endpoint = "https://example.services.ai.azure.com/api/projects/p1/".into();
        assert!(config.project.is_available());
        assert_eq!(
            config.project.base_endpoint(),
            "https://example.services.ai.azure.com/api/projects/p1"
        );

        config.project.enabled = false;
        assert!(!config.project.is_available());
    }

    #[test]
    fn test_client_secret_requires_all_three() {
        let mut credentials = CredentialConfig::default();
        credentials.client_id = "id".to_string();
        credentials.client_secret = "secret".to_string();
        assert!(!credentials.has_client_secret());

        credentials.tenant_id = "tenant".to_string();
        assert!(credentials.has_client_secret());
    }

    #[test]
    fn test_toml_config_loading() {
        let toml_content = r#"
[foundry]
endpoint = "https://example.services.ai.azure.com"
api_key = "file-key"
agent_id = "asst_123"

[project]
endpoint = "https://example.services.ai.azure.com/api/projects/demo"

[polling]
project_deadline = 30
rest_max_attempts = 10

[fallback]
on_project_failure = false
"#;

        let temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        std::fs::write(temp_file.path(), toml_content).unwrap();

        let config = RelayConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.foundry.agent_id, "asst_123");
        assert_eq!(config.foundry.model_name, "gpt-4o");
        assert!(config.project.is_available());
        assert_eq!(config.polling.project_deadline, Duration::from_secs(30));
        assert_eq!(config.polling.project_interval, Duration::from_secs(1));
        assert_eq!(config.polling.rest_max_attempts, 10);
        assert!(!config.fallback.on_project_failure);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unsupported_extension() {
        let temp_file = NamedTempFile::with_suffix(".ini").unwrap();
        std::fs::write(temp_file.path(), "x=1").unwrap();
        assert!(matches!(
            RelayConfig::from_file(temp_file.path()),
            Err(ConfigError::FileParse(_))
        ));
    }

    #[test]
    fn test_env_var_loading() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("AZURE_AI_FOUNDRY_MODEL_NAME", "gpt-4o-mini"),
            ("AZURE_AI_FOUNDRY_AGENT_ID", "asst_env"),
            ("FABRIC_RELAY_FALLBACK_ON_PROJECT_FAILURE", "false"),
            ("FABRIC_RELAY_HOST", "127.0.0.1"),
            ("PORT", "8080"),
        ]);

        let config = valid_config()
            .merge_with_lookup(|var| vars.get(var).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.foundry.model_name, "gpt-4o-mini");
        assert_eq!(config.foundry.agent_id, "asst_env");
        assert_eq!(config.foundry.api_key, "test-key");
        assert!(!config.fallback.on_project_failure);
        assert_eq!(config.bot.host, "127.0.0.1");
        assert_eq!(config.bot.port, 8080);
    }

    #[test]
    fn test_bad_port_override() {
        let result = RelayConfig::default().merge_with_lookup(|var| {
            (var == "PORT").then(|| "not-a-port".to_string())
        });
        assert!(matches!(result, Err(ConfigError::EnvVarParse(_))));
    }
}
