//! TOML configuration
//!
//! Searched in `./herald.toml`, then `~/.config/herald/herald.toml`,
//! falling back to defaults. Environment variables override file values.
//!
//! ```toml
//! [endpoint]
//! provider = "google"
//! model = "gemini-2.0-flash"
//!
//! [agent]
//! max_tool_rounds = 5
//!
//! [sessions]
//! sweep_interval_secs = 300
//! max_age_secs = 3600
//! ```

use crate::llm::{LlmConfig, LlmProvider};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// File name looked up in the working directory and the user config dir
pub const CONFIG_FILE_NAME: &str = "herald.toml";

/// System instruction installed as the first entry of every session
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful news agent that provides current worldwide news information. \
You have access to news APIs and can retrieve live headlines, breaking news, and news from specific categories or countries. \
Always provide accurate, timely, and relevant news information when requested.";

/// Top-level configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct HeraldConfig {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub sessions: SessionSettings,
}

/// Model service connection
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct EndpointConfig {
    #[serde(default)]
    pub provider: Provider,

    #[serde(default = "default_model")]
    pub model: String,

    /// Overrides the provider's default URL; required for `custom`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Falls back to the provider-specific environment variable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: default_model(),
            base_url: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.7
}

/// Supported model services
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// OpenAI API
    ///
    /// Default URL: https://api.openai.com/v1
    /// Env var: OPENAI_API_KEY
    Openai,

    /// Google Gemini API
    ///
    /// Default URL: https://generativelanguage.googleapis.com
    /// Env var: GOOGLE_API_KEY
    #[default]
    Google,

    /// Ollama (local models), no API key required
    ///
    /// Default URL: http://localhost:11434/v1
    Ollama,

    /// OpenRouter
    ///
    /// Default URL: https://openrouter.ai/api/v1
    /// Env var: OPENROUTER_API_KEY
    Openrouter,

    /// Any OpenAI-compatible endpoint; requires `base_url`
    Custom,
}

impl Provider {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Some(Self::Openai),
            "google" | "gemini" => Some(Self::Google),
            "ollama" => Some(Self::Ollama),
            "openrouter" => Some(Self::Openrouter),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Self::Openai => Some("https://api.openai.com/v1"),
            Self::Google => Some("https://generativelanguage.googleapis.com"),
            Self::Ollama => Some("http://localhost:11434/v1"),
            Self::Openrouter => Some("https://openrouter.ai/api/v1"),
            Self::Custom => None,
        }
    }

    /// Provider-specific API key variable consulted when none is configured
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Self::Openai => Some("OPENAI_API_KEY"),
            Self::Google => Some("GOOGLE_API_KEY"),
            Self::Openrouter => Some("OPENROUTER_API_KEY"),
            Self::Ollama | Self::Custom => None,
        }
    }

    pub fn client_provider(&self) -> LlmProvider {
        match self {
            Self::Google => LlmProvider::GoogleGenerativeAi,
            _ => LlmProvider::OpenAiCompatible,
        }
    }
}

/// Agent behaviour
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct AgentSettings {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Tool-call rounds before the model must answer in text
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_max_tool_rounds() -> usize {
    5
}

/// Session janitor schedule
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SessionSettings {
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,

    /// Also evict sessions idle for longer than `max_age_secs`
    #[serde(default)]
    pub evict_idle: bool,
}

impl SessionSettings {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            max_age_secs: default_max_age_secs(),
            evict_idle: false,
        }
    }
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_max_age_secs() -> u64 {
    3600
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error occurred while reading/writing config file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    /// TOML serialization error
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    /// `custom` provider without a base URL
    #[error("provider '{0:?}' requires endpoint.base_url")]
    MissingBaseUrl(Provider),
    /// A value outside its accepted range
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl HeraldConfig {
    /// Load from the first config file found, or defaults
    ///
    /// Environment overrides are not applied; call
    /// [`apply_env_overrides`](Self::apply_env_overrides) afterwards.
    pub fn load() -> Result<Self, ConfigError> {
        let current_dir_path = Path::new(CONFIG_FILE_NAME);
        if current_dir_path.exists() {
            return Self::load_from(current_dir_path);
        }

        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                return Self::load_from(&user_config_path);
            }
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load from an explicit path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "Loading config");
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Write the configuration as TOML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// `~/.config/herald/herald.toml`
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config").join("herald").join(CONFIG_FILE_NAME))
    }

    /// Apply environment variable overrides
    ///
    /// - `HERALD_PROVIDER` → `endpoint.provider`
    /// - `HERALD_MODEL` → `endpoint.model`
    /// - `HERALD_API_KEY` → `endpoint.api_key`
    /// - `HERALD_BASE_URL` → `endpoint.base_url`
    /// - `HERALD_SYSTEM_PROMPT` → `agent.system_prompt`
    ///
    /// Empty values are ignored; invalid ones are logged and ignored. When no
    /// key is configured afterwards, the provider's own variable is consulted.
    pub fn apply_env_overrides(&mut self) {
        if let Some(provider_str) = non_empty_env("HERALD_PROVIDER") {
            match Provider::parse(&provider_str) {
                Some(provider) => self.endpoint.provider = provider,
                None => warn!(value = %provider_str, "Invalid HERALD_PROVIDER value"),
            }
        }

        if let Some(model) = non_empty_env("HERALD_MODEL") {
            self.endpoint.model = model;
        }

        if let Some(api_key) = non_empty_env("HERALD_API_KEY") {
            self.endpoint.api_key = Some(api_key);
        }

        if let Some(base_url) = non_empty_env("HERALD_BASE_URL") {
            self.endpoint.base_url = Some(base_url);
        }

        if let Some(prompt) = non_empty_env("HERALD_SYSTEM_PROMPT") {
            self.agent.system_prompt = prompt;
        }

        if self.endpoint.api_key.is_none() {
            self.endpoint.api_key = self.endpoint.provider.api_key_env().and_then(non_empty_env);
        }
    }

    /// Build the client configuration for the configured endpoint
    pub fn resolve(&self) -> Result<LlmConfig, ConfigError> {
        let endpoint = &self.endpoint;

        let base_url = match (&endpoint.base_url, endpoint.provider.default_base_url()) {
            (Some(url), _) if !url.trim().is_empty() => url.clone(),
            (_, Some(default)) => default.to_string(),
            _ => return Err(ConfigError::MissingBaseUrl(endpoint.provider)),
        };

        if !(0.0..=2.0).contains(&endpoint.temperature) {
            return Err(ConfigError::InvalidValue {
                key: "endpoint.temperature".to_string(),
                reason: format!("{} is outside 0.0..=2.0", endpoint.temperature),
            });
        }

        let api_key = endpoint
            .api_key
            .as_ref()
            .filter(|key| !key.trim().is_empty())
            .cloned();

        Ok(LlmConfig::new(
            endpoint.provider.client_provider(),
            base_url,
            endpoint.model.clone(),
            api_key,
        )
        .with_max_tokens(endpoint.max_tokens)
        .with_temperature(endpoint.temperature)
        .with_timeout_secs(endpoint.timeout_secs))
    }

    /// Copy safe to print: the API key is masked
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.endpoint.api_key.is_some() {
            copy.endpoint.api_key = Some("********".to_string());
        }
        copy
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that touch process environment
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const HERALD_VARS: [&str; 6] = [
        "HERALD_PROVIDER",
        "HERALD_MODEL",
        "HERALD_API_KEY",
        "HERALD_BASE_URL",
        "HERALD_SYSTEM_PROMPT",
        "OPENROUTER_API_KEY",
    ];

    fn clear_env() {
        for var in HERALD_VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_defaults() {
        let config = HeraldConfig::default();
        assert_eq!(config.endpoint.provider, Provider::Google);
        assert_eq!(config.endpoint.max_tokens, 1000);
        assert_eq!(config.endpoint.temperature, 0.7);
        assert_eq!(config.agent.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(config.agent.max_tool_rounds, 5);
        assert_eq!(config.sessions.sweep_interval(), Duration::from_secs(300));
        assert!(!config.sessions.evict_idle);
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
[endpoint]
provider = "ollama"
model = "llama3"
temperature = 0.2

[sessions]
max_age_secs = 60
evict_idle = true
"#;
        let config: HeraldConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.endpoint.provider, Provider::Ollama);
        assert_eq!(config.endpoint.model, "llama3");
        assert_eq!(config.endpoint.timeout_secs, 30);
        assert_eq!(config.sessions.max_age(), Duration::from_secs(60));
        assert!(config.sessions.evict_idle);
        assert_eq!(config.agent, AgentSettings::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = HeraldConfig::default();
        config.endpoint.provider = Provider::Openrouter;
        config.agent.system_prompt = "You summarise sports news.".to_string();
        config.save(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("provider = \"openrouter\""));

        let loaded = HeraldConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_from_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[endpoint\nprovider = ").unwrap();
        assert!(matches!(
            HeraldConfig::load_from(&path),
            Err(ConfigError::TomlParse(_))
        ));
    }

    #[test]
    fn test_environment_variable_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("HERALD_PROVIDER", "openrouter");
        env::set_var("HERALD_MODEL", "meta-llama/llama-3-8b");
        env::set_var("HERALD_SYSTEM_PROMPT", "Be brief.");
        env::set_var("OPENROUTER_API_KEY", "or-key");

        let mut config = HeraldConfig::default();
        config.apply_env_overrides();

        assert_eq!(config.endpoint.provider, Provider::Openrouter);
        assert_eq!(config.endpoint.model, "meta-llama/llama-3-8b");
        assert_eq!(config.agent.system_prompt, "Be brief.");
        assert_eq!(config.endpoint.api_key.as_deref(), Some("or-key"));

        env::set_var("HERALD_API_KEY", "explicit");
        let mut config = HeraldConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.endpoint.api_key.as_deref(), Some("explicit"));

        clear_env();
    }

    #[test]
    fn test_invalid_and_empty_env_ignored() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("HERALD_PROVIDER", "carrier-pigeon");
        env::set_var("HERALD_MODEL", "");

        let mut config = HeraldConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.endpoint.provider, Provider::Google);
        assert_eq!(config.endpoint.model, default_model());

        clear_env();
    }

    #[test]
    fn test_resolve_uses_provider_defaults() {
        let mut config = HeraldConfig::default();
        config.endpoint.provider = Provider::Ollama;

        let llm = config.resolve().unwrap();
        assert_eq!(llm.provider, LlmProvider::OpenAiCompatible);
        assert_eq!(llm.base_url, "http://localhost:11434/v1");
        assert_eq!(llm.max_tokens, Some(1000));
        assert!(llm.api_key.is_none());

        config.endpoint.provider = Provider::Google;
        config.endpoint.api_key = Some("g-key".to_string());
        let llm = config.resolve().unwrap();
        assert_eq!(llm.provider, LlmProvider::GoogleGenerativeAi);
        assert_eq!(llm.api_key.as_deref(), Some("g-key"));
    }

    #[test]
    fn test_resolve_errors() {
        let mut config = HeraldConfig::default();
        config.endpoint.provider = Provider::Custom;
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::MissingBaseUrl(Provider::Custom))
        ));

        config.endpoint.base_url = Some("http://10.0.0.5:8000/v1".to_string());
        assert!(config.resolve().is_ok());

        config.endpoint.temperature = 3.5;
        assert!(matches!(config.resolve(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_redacted_masks_key() {
        let mut config = HeraldConfig::default();
        config.endpoint.api_key = Some("secret".to_string());
        let shown = toml::to_string_pretty(&config.redacted()).unwrap();
        assert!(!shown.contains("secret"));
        assert_eq!(config.endpoint.api_key.as_deref(), Some("secret"));
    }
}
