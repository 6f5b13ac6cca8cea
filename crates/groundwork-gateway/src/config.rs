//! Configuration types for the Groundwork gateway.
//!
//! This module provides the configuration that controls the upstream
//! generation API, the circuit breaker cooldown, context budgets, and where
//! extracted document text is loaded from.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "groundwork.json";

/// Default upstream base URL (OpenAI-compatible chat completions).
fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

/// Default upstream model.
fn default_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

/// Default environment variable holding the API key.
fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

/// Default upstream request timeout in seconds.
const fn default_timeout_secs() -> u64 {
    60
}

/// Default circuit breaker cooldown in seconds.
const fn default_cooldown_secs() -> u64 {
    60
}

const fn default_ask_context_chars() -> usize {
    20_000
}

const fn default_generation_context_chars() -> usize {
    30_000
}

const fn default_knowledge_base_chars() -> usize {
    25_000
}

/// Hard ceiling on items per MCQ set or exam.
pub const MAX_ITEMS_CEILING: u32 = 50;

/// Hard ceiling on exam duration in minutes.
pub const MAX_DURATION_CEILING: u32 = 180;

const fn default_max_items() -> u32 {
    MAX_ITEMS_CEILING
}

const fn default_max_duration_minutes() -> u32 {
    MAX_DURATION_CEILING
}

/// Default directory of extracted document text.
fn default_documents_dir() -> String {
    "documents".to_string()
}

/// Default HTTP listen port.
const fn default_port() -> u16 {
    5000
}

/// Main configuration for the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Upstream generation API settings.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Circuit breaker settings.
    #[serde(default)]
    pub circuit: CircuitConfig,

    /// Context budgets and request clamps.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Directory of `*.txt` files holding extracted document text.
    #[serde(default = "default_documents_dir")]
    pub documents_dir: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            upstream: UpstreamConfig::default(),
            circuit: CircuitConfig::default(),
            limits: LimitsConfig::default(),
            server: ServerConfig::default(),
            documents_dir: default_documents_dir(),
        }
    }
}

impl GatewayConfig {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `groundwork.json` in the current directory. If not found,
    /// returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            GatewayError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `groundwork.json` in a specific directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::ConfigParseError` if the file exists but cannot
    /// be read or parsed, and `GatewayError::ConfigValidationError` if the
    /// parsed values are invalid.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(GatewayError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| GatewayError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::ConfigValidationError` if any value is zero or
    /// empty where that makes no sense.
    pub fn validate(&self) -> Result<()> {
        if self.upstream.base_url.trim().is_empty() {
            return Err(GatewayError::config_validation(
                "upstream.baseUrl must not be empty",
                "Set upstream.baseUrl to an OpenAI-compatible API root in your groundwork.json",
            ));
        }

        if self.upstream.model.trim().is_empty() {
            return Err(GatewayError::config_validation(
                "upstream.model must not be empty",
                "Set upstream.model to a supported model in your groundwork.json",
            ));
        }

        if self.upstream.api_key_env.trim().is_empty() {
            return Err(GatewayError::config_validation(
                "upstream.apiKeyEnv must not be empty",
                "Set upstream.apiKeyEnv to the environment variable holding the key in your groundwork.json",
            ));
        }

        if self.upstream.timeout_secs == 0 {
            return Err(GatewayError::config_validation(
                "upstream.timeoutSecs must be greater than 0",
                "Set upstream.timeoutSecs to at least 1 second in your groundwork.json",
            ));
        }

        if self.circuit.cooldown_secs == 0 {
            return Err(GatewayError::config_validation(
                "circuit.cooldownSecs must be greater than 0",
                "Set circuit.cooldownSecs to at least 1 second in your groundwork.json",
            ));
        }

        let limits = &self.limits;
        for (name, value) in [
            ("askContextChars", limits.ask_context_chars),
            ("generationContextChars", limits.generation_context_chars),
            ("knowledgeBaseChars", limits.knowledge_base_chars),
        ] {
            if value == 0 {
                return Err(GatewayError::config_validation(
                    format!("limits.{name} must be greater than 0"),
                    format!("Set limits.{name} to a positive character count in your groundwork.json"),
                ));
            }
        }

        if limits.max_items == 0 || limits.max_items > MAX_ITEMS_CEILING {
            return Err(GatewayError::config_validation(
                format!("limits.maxItems must be between 1 and {MAX_ITEMS_CEILING}"),
                format!("Set limits.maxItems to 1..={MAX_ITEMS_CEILING} in your groundwork.json"),
            ));
        }

        if limits.max_duration_minutes == 0 || limits.max_duration_minutes > MAX_DURATION_CEILING {
            return Err(GatewayError::config_validation(
                format!("limits.maxDurationMinutes must be between 1 and {MAX_DURATION_CEILING}"),
                format!(
                    "Set limits.maxDurationMinutes to 1..={MAX_DURATION_CEILING} in your groundwork.json"
                ),
            ));
        }

        if self.documents_dir.trim().is_empty() {
            return Err(GatewayError::config_validation(
                "documentsDir must not be empty",
                "Provide a valid documents directory in your groundwork.json (use '.' for current directory)",
            ));
        }

        Ok(())
    }
}

/// Upstream generation API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamConfig {
    /// Root of the OpenAI-compatible API; `/chat/completions` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// The single model every request uses.
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable the API key is read from.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl UpstreamConfig {
    /// Returns the request timeout as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Circuit breaker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitConfig {
    /// How long the circuit stays open after any classified failure.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

impl CircuitConfig {
    /// Returns the cooldown as a `Duration`.
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Context budgets and request clamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitsConfig {
    /// Characters of document text sent with a tutor question.
    #[serde(default = "default_ask_context_chars")]
    pub ask_context_chars: usize,

    /// Characters of document text sent for MCQ, exam, and notes generation.
    #[serde(default = "default_generation_context_chars")]
    pub generation_context_chars: usize,

    /// Characters of text sent for knowledge-base extraction.
    #[serde(default = "default_knowledge_base_chars")]
    pub knowledge_base_chars: usize,

    /// Upper bound on requested MCQ and exam item counts.
    #[serde(default = "default_max_items")]
    pub max_items: u32,

    /// Upper bound on exam duration in minutes.
    #[serde(default = "default_max_duration_minutes")]
    pub max_duration_minutes: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            ask_context_chars: default_ask_context_chars(),
            generation_context_chars: default_generation_context_chars(),
            knowledge_base_chars: default_knowledge_base_chars(),
            max_items: default_max_items(),
            max_duration_minutes: default_max_duration_minutes(),
        }
    }
}

impl LimitsConfig {
    /// Returns the effective item cap, never above [`MAX_ITEMS_CEILING`].
    #[must_use]
    pub fn item_cap(&self) -> u32 {
        self.max_items.min(MAX_ITEMS_CEILING)
    }

    /// Returns the effective duration cap, never above [`MAX_DURATION_CEILING`].
    #[must_use]
    pub fn duration_cap(&self) -> u32 {
        self.max_duration_minutes.min(MAX_DURATION_CEILING)
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port the HTTP API listens on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}
