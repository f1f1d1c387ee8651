//! Configuration management for `TourGuide` application
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::TourGuideError;
use crate::models::Coordinate;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable consulted when `llm.api_key` is not configured
pub const API_KEY_ENV_FALLBACK: &str = "OPENAI_API_KEY";

/// Root configuration structure for the `TourGuide` application
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TourGuideConfig {
    /// Chat-completion endpoint configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Location acquisition configuration
    #[serde(default)]
    pub location: LocationConfig,
    /// Speech playback configuration
    #[serde(default)]
    pub speech: SpeechConfig,
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Chat-completion endpoint settings
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Bearer token for the endpoint
    pub api_key: Option<String>,
    /// Base URL; `/chat/completions` is appended
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// Model identifier sent with each request
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Sampling temperature
    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,
    /// Upper bound on generated tokens
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u32,
}

// Keeps the credential out of logs and panic messages.
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Where device location comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationProviderKind {
    /// Approximate location from an IP-geolocation service
    Ip,
    /// Coordinates from `location.fixed`
    Fixed,
    /// No location capability
    None,
}

/// Location acquisition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    #[serde(default = "default_location_provider")]
    pub provider: LocationProviderKind,
    /// IP-geolocation lookup URL
    #[serde(default = "default_ip_lookup_url")]
    pub ip_lookup_url: String,
    /// Upper bound on acquiring a fix, including the permission prompt
    #[serde(default = "default_location_timeout")]
    pub timeout_seconds: u32,
    /// Coordinates used by the `fixed` provider
    #[serde(default)]
    pub fixed: Option<Coordinate>,
}

/// Speech playback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Read tours aloud by default
    #[serde(default)]
    pub enabled: bool,
    /// Text-to-speech program; each sentence is passed as its last argument
    #[serde(default = "default_speech_command")]
    pub command: String,
    /// Extra arguments placed before the sentence
    #[serde(default)]
    pub args: Vec<String>,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Directory served for paths outside `/api`
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_llm_temperature() -> f32 {
    0.7
}

fn default_llm_max_tokens() -> u32 {
    400
}

fn default_llm_timeout() -> u32 {
    30
}

fn default_location_provider() -> LocationProviderKind {
    LocationProviderKind::Ip
}

fn default_ip_lookup_url() -> String {
    "http://ip-api.com/json".to_string()
}

fn default_location_timeout() -> u32 {
    60
}

fn default_speech_command() -> String {
    "espeak".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            temperature: default_llm_temperature(),
            max_tokens: default_llm_max_tokens(),
            timeout_seconds: default_llm_timeout(),
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            provider: default_location_provider(),
            ip_lookup_url: default_ip_lookup_url(),
            timeout_seconds: default_location_timeout(),
            fixed: None,
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: default_speech_command(),
            args: Vec::new(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            static_dir: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LlmConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.into())
    }

    /// The configured credential, or a configuration error when it is absent
    pub fn require_api_key(&self) -> Result<&str, TourGuideError> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(TourGuideError::config(format!(
                "No API key configured. Set llm.api_key, TOURGUIDE_LLM__API_KEY or {API_KEY_ENV_FALLBACK}"
            ))),
        }
    }
}

impl LocationConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.into())
    }
}

impl TourGuideConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // TOURGUIDE_LLM__API_KEY -> llm.api_key
        builder = builder.add_source(
            Environment::with_prefix("TOURGUIDE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: TourGuideConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        if config.llm.api_key.is_none() {
            config.llm.api_key = std::env::var(API_KEY_ENV_FALLBACK).ok();
        }

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tourguide").join("config.toml"))
    }

    /// Apply default values to fields that were explicitly left empty
    pub fn apply_defaults(&mut self) {
        if self.llm.base_url.is_empty() {
            self.llm.base_url = default_llm_base_url();
        }
        if self.llm.model.is_empty() {
            self.llm.model = default_llm_model();
        }
        if self.llm.max_tokens == 0 {
            self.llm.max_tokens = default_llm_max_tokens();
        }
        if self.llm.timeout_seconds == 0 {
            self.llm.timeout_seconds = default_llm_timeout();
        }
        if self.location.ip_lookup_url.is_empty() {
            self.location.ip_lookup_url = default_ip_lookup_url();
        }
        if self.location.timeout_seconds == 0 {
            self.location.timeout_seconds = default_location_timeout();
        }
        if self.speech.command.is_empty() {
            self.speech.command = default_speech_command();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    ///
    /// The credential is not checked here; commands that talk to the
    /// endpoint call [`LlmConfig::require_api_key`] before starting.
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        self.validate_location()?;
        Ok(())
    }

    fn validate_numeric_ranges(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(TourGuideError::config("LLM temperature must be between 0 and 2").into());
        }

        if self.llm.max_tokens > 4096 {
            return Err(TourGuideError::config("LLM max tokens cannot exceed 4096").into());
        }

        if self.llm.timeout_seconds > 300 {
            return Err(TourGuideError::config("LLM timeout cannot exceed 300 seconds").into());
        }

        if self.location.timeout_seconds > 600 {
            return Err(
                TourGuideError::config("Location timeout cannot exceed 600 seconds").into(),
            );
        }

        Ok(())
    }

    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(TourGuideError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(TourGuideError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for (name, url) in [
            ("LLM base URL", &self.llm.base_url),
            ("IP lookup URL", &self.location.ip_lookup_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(TourGuideError::config(format!(
                    "{name} must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }

    fn validate_location(&self) -> Result<()> {
        if self.location.provider == LocationProviderKind::Fixed && self.location.fixed.is_none() {
            return Err(TourGuideError::config(
                "Location provider 'fixed' requires location.fixed.latitude and location.fixed.longitude",
            )
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = TourGuideConfig::default();
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
        assert_eq!(config.llm.model, "gpt-3.5-turbo");
        assert_eq!(config.llm.temperature, 0.7);
        assert_eq!(config.llm.max_tokens, 400);
        assert_eq!(config.location.provider, LocationProviderKind::Ip);
        assert_eq!(config.logging.level, "info");
        assert!(config.llm.api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_require_api_key() {
        let mut config = TourGuideConfig::default();
        let err = config.llm.require_api_key().unwrap_err();
        assert!(matches!(err, TourGuideError::Config { .. }));

        config.llm.api_key = Some("   ".to_string());
        assert!(config.llm.require_api_key().is_err());

        config.llm.api_key = Some("sk-test-123".to_string());
        assert_eq!(config.llm.require_api_key().unwrap(), "sk-test-123");
    }

    #[test]
    fn test_debug_hides_api_key() {
        let mut config = TourGuideConfig::default();
        config.llm.api_key = Some("sk-very-secret".to_string());
        let debug = format!("{:?}", config.llm);
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = TourGuideConfig::default();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_validation_numeric_ranges() {
        let mut config = TourGuideConfig::default();
        config.llm.timeout_seconds = 500;
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("timeout cannot exceed"));

        let mut config = TourGuideConfig::default();
        config.llm.temperature = 3.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_base_url_scheme() {
        let mut config = TourGuideConfig::default();
        config.llm.base_url = "ftp://example.com".to_string();
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("LLM base URL"));
    }

    #[test]
    fn test_fixed_provider_requires_coordinates() {
        let mut config = TourGuideConfig::default();
        config.location.provider = LocationProviderKind::Fixed;
        assert!(config.validate().is_err());

        config.location.fixed = Some(Coordinate::new(40.689247, -74.044502).unwrap());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_apply_defaults_fills_empty_values() {
        let mut config = TourGuideConfig::default();
        config.llm.model = String::new();
        config.logging.format = String::new();
        config.apply_defaults();
        assert_eq!(config.llm.model, "gpt-3.5-turbo");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[llm]
api_key = "sk-from-file"
model = "gpt-4o-mini"
max_tokens = 250

[location]
provider = "fixed"
fixed = {{ latitude = 40.689247, longitude = -74.044502 }}

[server]
port = 9090
"#
        )
        .unwrap();

        let config = TourGuideConfig::load_from_path(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-from-file"));
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.max_tokens, 250);
        assert_eq!(config.llm.temperature, 0.7);
        assert_eq!(config.location.provider, LocationProviderKind::Fixed);
        assert_eq!(
            config.location.fixed,
            Some(Coordinate::new(40.689247, -74.044502).unwrap())
        );
        assert_eq!(config.server.port, 9090);
    }

    #[test]
    fn test_load_rejects_out_of_range_fixed_location() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[location]
provider = "fixed"
fixed = {{ latitude = 95.0, longitude = 0.0 }}
"#
        )
        .unwrap();

        assert!(TourGuideConfig::load_from_path(Some(file.path().to_path_buf())).is_err());
    }

    #[test]
    fn test_config_path_generation() {
        if let Some(path) = TourGuideConfig::get_config_path() {
            assert!(path.to_string_lossy().contains("tourguide"));
            assert!(path.to_string_lossy().contains("config.toml"));
        }
    }
}
