use crate::error::PathNitiError;
use crate::scoring::ScoringConfig;
use crate::usage_monitor::UsageLimits;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for PathNitiError {
    fn from(err: ConfigError) -> Self {
        PathNitiError::Config(err.to_string())
    }
}

/// Main configuration for PathNiti
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathNitiConfig {
    /// Generative AI provider used for the enhancement pass and counselor
    #[serde(default)]
    pub llm: LLMConfig,

    /// Request budget against the AI provider
    #[serde(default)]
    pub usage: UsageConfig,

    /// Heuristic scoring weights and thresholds
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Reference data source
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Where usage counters, feedback and experiments are kept between runs
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// LLM configuration for recommendation enhancement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// LLM provider: "gemini"
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// Model identifier (e.g., "gemini-1.5-flash")
    #[serde(default = "default_model")]
    pub model: String,

    /// Gemini API key. Absent means heuristic-only recommendations.
    #[serde(default, skip_serializing)]
    pub gemini_api_key: Option<String>,

    /// Gemini REST base URL
    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,

    /// Temperature for generation
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum output tokens, kept low to stay within the free tier
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: usize,

    /// Ask the provider for a JSON response instead of free text
    #[serde(default = "default_structured_output")]
    pub structured_output: bool,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_model(),
            gemini_api_key: None,
            gemini_base_url: default_gemini_base_url(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            structured_output: default_structured_output(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LLMConfig {
    /// True when a non-blank API key is available.
    pub fn has_api_key(&self) -> bool {
        self.gemini_api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageConfig {
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,

    #[serde(default = "default_per_minute_limit")]
    pub per_minute_limit: u32,

    /// Daily usage percentage reported as approaching the limit
    #[serde(default = "default_warn_percent")]
    pub warn_percent: u32,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            daily_limit: default_daily_limit(),
            per_minute_limit: default_per_minute_limit(),
            warn_percent: default_warn_percent(),
        }
    }
}

impl UsageConfig {
    pub fn limits(&self) -> UsageLimits {
        UsageLimits {
            daily_limit: self.daily_limit,
            per_minute_limit: self.per_minute_limit,
            warn_percent: self.warn_percent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CatalogConfig {
    /// JSON file replacing the built-in reference tables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Directory for state files; defaults to `~/.pathniti`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.data_dir
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(".pathniti")))
    }

    /// Persisted request counters
    pub fn usage_file(&self) -> Option<PathBuf> {
        self.data_dir().map(|dir| dir.join("usage.json"))
    }

    pub fn feedback_file(&self) -> Option<PathBuf> {
        self.data_dir().map(|dir| dir.join("feedback.json"))
    }

    pub fn experiments_file(&self) -> Option<PathBuf> {
        self.data_dir().map(|dir| dir.join("ab_tests.json"))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "pretty", "json", "compact"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_llm_provider() -> String {
    "gemini".to_string()
}
fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_output_tokens() -> usize {
    1000
}
fn default_structured_output() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_daily_limit() -> u32 {
    UsageLimits::default().daily_limit
}
fn default_per_minute_limit() -> u32 {
    UsageLimits::default().per_minute_limit
}
fn default_warn_percent() -> u32 {
    UsageLimits::default().warn_percent
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

/// Configuration manager with layered sources
pub struct ConfigManager {
    config: PathNitiConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (.env file)
    /// 2. Config file (.pathniti.toml)
    /// 3. Sensible defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_dotenv();

        let (config, config_path) = Self::load_config_file()?;
        Self::finish(config, config_path)
    }

    /// Load an explicit config file, still honouring environment overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let config = Self::read_toml_file(path)?;
        Self::finish(config, Some(path.to_path_buf()))
    }

    fn finish(config: PathNitiConfig, config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = Self::apply_env_overrides(config);
        Self::validate_config(&config)?;

        info!("Configuration loaded");
        match &config_path {
            Some(path) => info!("   Config file: {}", path.display()),
            None => info!("   Config file: NONE (using defaults)"),
        }
        info!(
            "   AI enhancement: {}",
            if config.llm.has_api_key() {
                "enabled"
            } else {
                "disabled (heuristic only)"
            }
        );
        info!(
            "   Usage budget: {}/day, {}/minute",
            config.usage.daily_limit, config.usage.per_minute_limit
        );

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Load .env file if it exists
    fn load_dotenv() {
        if Path::new(".env").exists() {
            if let Err(e) = dotenv::from_filename(".env") {
                warn!("Failed to load .env file: {}", e);
            }
            return;
        }

        if let Some(home) = dirs::home_dir() {
            let home_env = home.join(".pathniti.env");
            if home_env.exists() {
                if let Err(e) = dotenv::from_path(&home_env) {
                    warn!("Failed to load .pathniti.env: {}", e);
                }
            }
        }
    }

    /// Find and load config file
    /// Search order:
    /// 1. ./.pathniti.toml (current directory)
    /// 2. ~/.pathniti/config.toml (user config)
    /// 3. Use defaults
    fn load_config_file() -> Result<(PathNitiConfig, Option<PathBuf>), ConfigError> {
        let local_config = Path::new(".pathniti.toml");
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(user_config) = Self::user_config_path() {
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        Ok((PathNitiConfig::default(), None))
    }

    /// `~/.pathniti/config.toml`, if a home directory is known
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".pathniti").join("config.toml"))
    }

    fn read_toml_file(path: &Path) -> Result<PathNitiConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut config: PathNitiConfig) -> PathNitiConfig {
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            config.llm.gemini_api_key = Some(key);
        }
        if let Ok(provider) = std::env::var("PATHNITI_LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(model) = std::env::var("PATHNITI_MODEL") {
            config.llm.model = model;
        }
        if let Ok(temp) = std::env::var("PATHNITI_TEMPERATURE") {
            if let Ok(t) = temp.parse() {
                config.llm.temperature = t;
            }
        }

        if let Ok(limit) = std::env::var("PATHNITI_DAILY_LIMIT") {
            if let Ok(n) = limit.parse() {
                config.usage.daily_limit = n;
            }
        }
        if let Ok(limit) = std::env::var("PATHNITI_PER_MINUTE_LIMIT") {
            if let Ok(n) = limit.parse() {
                config.usage.per_minute_limit = n;
            }
        }

        if let Ok(path) = std::env::var("PATHNITI_CATALOG") {
            config.catalog.path = Some(PathBuf::from(path));
        }
        if let Ok(dir) = std::env::var("PATHNITI_DATA_DIR") {
            config.storage.data_dir = Some(PathBuf::from(dir));
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.logging.level = level;
        }

        config
    }

    /// Validate configuration
    pub fn validate_config(config: &PathNitiConfig) -> Result<(), ConfigError> {
        match config.llm.provider.as_str() {
            "gemini" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid LLM provider: {}. Must be one of: gemini",
                    other
                )))
            }
        }

        if !(0.0..=2.0).contains(&config.llm.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                config.llm.temperature
            )));
        }

        if config.usage.daily_limit == 0 || config.usage.per_minute_limit == 0 {
            return Err(ConfigError::ValidationError(
                "usage limits must be greater than zero".to_string(),
            ));
        }

        if config.scoring.confidence_divisor <= 0.0 {
            return Err(ConfigError::ValidationError(
                "scoring.confidence_divisor must be > 0".to_string(),
            ));
        }

        // Any non-empty value is an env-filter directive ("off", "INFO",
        // "pathniti_ai=debug"); the subscriber falls back to warn on a bad one.
        if config.logging.level.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "logging.level must not be empty".to_string(),
            ));
        }

        match config.logging.format.as_str() {
            "pretty" | "json" | "compact" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}. Must be one of: pretty, json, compact",
                    other
                )))
            }
        }

        Ok(())
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &PathNitiConfig {
        &self.config
    }

    /// Get the path to the config file that was loaded, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Create a default config file
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let config = PathNitiConfig::default();
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        }

        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PathNitiConfig::default();
        assert_eq!(config.llm.provider, "gemini");
        assert_eq!(config.llm.model, "gemini-1.5-flash");
        assert_eq!(config.usage.daily_limit, 15);
        assert_eq!(config.usage.per_minute_limit, 1);
        assert!(!config.llm.has_api_key());
    }

    #[test]
    fn test_config_validation() {
        let config = PathNitiConfig::default();
        assert!(ConfigManager::validate_config(&config).is_ok());

        let mut bad_provider = config.clone();
        bad_provider.llm.provider = "invalid".to_string();
        assert!(ConfigManager::validate_config(&bad_provider).is_err());

        let mut bad_limit = config.clone();
        bad_limit.usage.per_minute_limit = 0;
        assert!(ConfigManager::validate_config(&bad_limit).is_err());

        let mut directive = config;
        directive.logging.level = "pathniti_ai=debug".to_string();
        assert!(ConfigManager::validate_config(&directive).is_ok());
    }

    #[test]
    fn test_log_level_accepts_filter_directives() {
        for level in ["off", "INFO", "pathniti_cli", "warn,pathniti_ai=trace"] {
            let mut config = PathNitiConfig::default();
            config.logging.level = level.to_string();
            assert!(
                ConfigManager::validate_config(&config).is_ok(),
                "level {:?} rejected",
                level
            );
        }

        let mut blank = PathNitiConfig::default();
        blank.logging.level = "  ".to_string();
        assert!(ConfigManager::validate_config(&blank).is_err());
    }

    #[test]
    fn test_env_overrides_apply() {
        std::env::set_var("PATHNITI_MODEL", "gemini-1.5-pro");
        std::env::set_var("PATHNITI_DAILY_LIMIT", "40");
        std::env::set_var("PATHNITI_PER_MINUTE_LIMIT", "not-a-number");

        let config = ConfigManager::apply_env_overrides(PathNitiConfig::default());

        std::env::remove_var("PATHNITI_MODEL");
        std::env::remove_var("PATHNITI_DAILY_LIMIT");
        std::env::remove_var("PATHNITI_PER_MINUTE_LIMIT");

        assert_eq!(config.llm.model, "gemini-1.5-pro");
        assert_eq!(config.usage.daily_limit, 40);
        // unparsable values leave the default in place
        assert_eq!(config.usage.per_minute_limit, 1);
    }

    #[test]
    fn test_blank_api_key_is_absent() {
        let mut llm = LLMConfig::default();
        llm.gemini_api_key = Some("   ".to_string());
        assert!(!llm.has_api_key());
    }

    #[test]
    fn test_storage_files_live_in_data_dir() {
        let storage = StorageConfig {
            data_dir: Some(PathBuf::from("/var/lib/pathniti")),
        };
        assert_eq!(
            storage.usage_file(),
            Some(PathBuf::from("/var/lib/pathniti/usage.json"))
        );
        assert_eq!(
            storage.feedback_file(),
            Some(PathBuf::from("/var/lib/pathniti/feedback.json"))
        );
        assert_eq!(
            storage.experiments_file(),
            Some(PathBuf::from("/var/lib/pathniti/ab_tests.json"))
        );
    }
}
