//! Application configuration
//!
//! Settings come from an optional JSON file with environment variables layered
//! on top. [`Config`] is what capabilities see; [`RuntimeConfig`] holds the
//! orchestrator knobs and is fixed at startup.

use crate::runtime::CompactionPolicy;
use crate::state_machine::Topology;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:3000/oauth2callback";
const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_MAX_CYCLES: usize = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown LLM provider '{0}' (expected openai, anthropic or google)")]
    UnknownProvider(String),
    #[error("API key for the selected LLM provider ({0}) is missing")]
    MissingApiKey(LlmProvider),
    #[error("invalid value '{value}' for {var}")]
    InvalidValue { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Google,
}

impl LlmProvider {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "google" => Ok(Self::Google),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Anthropic => "claude-3-haiku-20240307",
            Self::Google => "gemini-1.5-flash",
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub google_api_key: Option<String>,
}

impl LlmConfig {
    /// Key for the selected provider, if any
    pub fn api_key(&self) -> Option<&str> {
        match self.provider {
            LlmProvider::OpenAi => self.openai_api_key.as_deref(),
            LlmProvider::Anthropic => self.anthropic_api_key.as_deref(),
            LlmProvider::Google => self.google_api_key.as_deref(),
        }
    }
}

/// External service settings. Capabilities consult these to decide
/// availability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Integrations {
    pub tavily_api_key: Option<String>,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub gmail_redirect_uri: String,
    pub google_token_path: PathBuf,
}

impl Integrations {
    pub fn web_search_enabled(&self) -> bool {
        self.tavily_api_key.is_some()
    }

    pub fn google_configured(&self) -> bool {
        self.google_client_id.is_some() && self.google_client_secret.is_some()
    }

    /// OAuth client configured and a token has been stored
    pub fn google_authenticated(&self) -> bool {
        self.google_configured() && self.google_token_path.exists()
    }
}

/// Configuration visible to capabilities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub llm: LlmConfig,
    pub integrations: Integrations,
    /// Capability identifiers to load; `None` loads every built-in
    pub capabilities: Option<Vec<String>>,
    pub profile_path: PathBuf,
}

/// Shared, replaceable configuration. The orchestrator clones a snapshot at
/// the start of each turn.
pub type SharedConfig = Arc<RwLock<Config>>;

/// On-disk config file (`~/.research-assistant/config.json`)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigFile {
    pub llm_provider: Option<String>,
    pub llm_model: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub tavily_api_key: Option<String>,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub gmail_redirect_uri: Option<String>,
    pub skills: Option<Vec<String>>,
    pub user_profile_path: Option<String>,
}

impl ConfigFile {
    /// Read the file if present. A malformed file is logged and ignored.
    pub fn load(path: &Path) -> Self {
        let Ok(data) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&data) {
            Ok(file) => {
                tracing::info!(path = %path.display(), "Loaded config file");
                file
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to parse config file");
                Self::default()
            }
        }
    }
}

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string()))
}

pub fn data_dir() -> PathBuf {
    home_dir().join(".research-assistant")
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = env_var("RESEARCH_ASSISTANT_CONFIG")
            .map_or_else(|| data_dir().join("config.json"), PathBuf::from);
        Self::resolve(ConfigFile::load(&path), env_var)
    }

    /// Merge `file` with overrides from `env`, then validate.
    pub fn resolve(
        file: ConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let pick = |var: &str, from_file: Option<String>| env(var).or(from_file);

        let file_provider = match file.llm_provider.as_deref() {
            Some(p) => LlmProvider::parse(p)?,
            None => LlmProvider::OpenAi,
        };
        let provider = match env("LLM_PROVIDER") {
            Some(p) => LlmProvider::parse(&p)?,
            None => file_provider,
        };
        // A model named in the file belongs to the file's provider.
        let file_model = file.llm_model.filter(|_| provider == file_provider);
        let model = pick("LLM_MODEL", file_model)
            .unwrap_or_else(|| provider.default_model().to_string());

        let llm = LlmConfig {
            provider,
            model,
            openai_api_key: pick("OPENAI_API_KEY", file.openai_api_key),
            anthropic_api_key: pick("ANTHROPIC_API_KEY", file.anthropic_api_key),
            google_api_key: pick("GOOGLE_API_KEY", file.google_api_key),
        };
        if llm.api_key().is_none() {
            return Err(ConfigError::MissingApiKey(provider));
        }

        let integrations = Integrations {
            tavily_api_key: pick("TAVILY_API_KEY", file.tavily_api_key),
            google_client_id: pick("GOOGLE_CLIENT_ID", file.google_client_id),
            google_client_secret: pick("GOOGLE_CLIENT_SECRET", file.google_client_secret),
            gmail_redirect_uri: pick("GMAIL_REDIRECT_URI", file.gmail_redirect_uri)
                .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
            google_token_path: env("GOOGLE_TOKEN_PATH")
                .map_or_else(|| PathBuf::from(".token.json"), PathBuf::from),
        };

        let capabilities = env("RESEARCH_ASSISTANT_CAPABILITIES")
            .map(|v| split_list(&v))
            .or(file.skills);

        let profile_path = pick("USER_PROFILE_PATH", file.user_profile_path)
            .map_or_else(|| data_dir().join("user_profile.json"), PathBuf::from);

        Ok(Self {
            llm,
            integrations,
            capabilities,
            profile_path,
        })
    }

    pub fn shared(self) -> SharedConfig {
        Arc::new(RwLock::new(self))
    }
}

/// Orchestrator settings
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub turn_timeout: Duration,
    pub topology: Topology,
    /// `None` disables compaction
    pub compaction: Option<CompactionPolicy>,
    pub memory_agent: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            turn_timeout: DEFAULT_TURN_TIMEOUT,
            topology: Topology::Chained {
                max_cycles: DEFAULT_MAX_CYCLES,
            },
            compaction: None,
            memory_agent: false,
        }
    }
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: value.to_string(),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
    })
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(env_var)
    }

    pub fn resolve(env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = env("TURN_TIMEOUT_SECS") {
            let secs: u64 = parse_number("TURN_TIMEOUT_SECS", &v)?;
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    var: "TURN_TIMEOUT_SECS",
                    value: v,
                });
            }
            config.turn_timeout = Duration::from_secs(secs);
        }

        let max_cycles = match env("MAX_ROUTE_CYCLES") {
            Some(v) => parse_number("MAX_ROUTE_CYCLES", &v)?,
            None => DEFAULT_MAX_CYCLES,
        };
        config.topology = match env("TOPOLOGY").as_deref().map(str::trim) {
            None | Some("chained") => Topology::Chained { max_cycles },
            Some("single") => Topology::SinglePass,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    var: "TOPOLOGY",
                    value: other.to_string(),
                })
            }
        };

        if let Some(v) = env("COMPACTION") {
            if parse_flag("COMPACTION", &v)? {
                config.compaction = Some(CompactionPolicy::default());
            }
        }
        if let Some(v) = env("MEMORY_AGENT") {
            config.memory_agent = parse_flag("MEMORY_AGENT", &v)?;
        }

        Ok(config)
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config::resolve(ConfigFile::default(), |k| {
        (k == "OPENAI_API_KEY").then(|| "sk-test".to_string())
    })
    .unwrap()
}
