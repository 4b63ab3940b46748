use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Pipeline-level limits and budgets
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Hard byte limit for a single upload
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Maximum number of stored documents rendered into the reference context
    #[serde(default = "default_reference_max_entries")]
    pub reference_max_entries: usize,
    /// Per-reference content preview length (chars)
    #[serde(default = "default_reference_preview_chars")]
    pub reference_preview_chars: usize,
    /// Target-document content budget inside the composed prompt (chars)
    #[serde(default = "default_content_budget_chars")]
    pub content_budget_chars: usize,
}

/// Generation service configuration
///
/// The service is optional: when the API key environment variable is unset
/// the gateway runs in fallback-only mode. That is a supported operating
/// mode, not a startup error.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Upper bound on one generation round trip; on expiry the gateway
    /// falls back. Single attempt, no retry.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// LRU capacity for the reply cache; 0 disables caching
    #[serde(default = "default_reply_cache_capacity")]
    pub reply_cache_capacity: usize,
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_reference_max_entries() -> usize {
    20
}

fn default_reference_preview_chars() -> usize {
    200
}

fn default_content_budget_chars() -> usize {
    8000
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_timeout_secs() -> u64 {
    45
}

fn default_max_output_tokens() -> u32 {
    1024
}

fn default_reply_cache_capacity() -> usize {
    256
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            reference_max_entries: default_reference_max_entries(),
            reference_preview_chars: default_reference_preview_chars(),
            content_budget_chars: default_content_budget_chars(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key_env: default_api_key_env(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            max_output_tokens: default_max_output_tokens(),
            reply_cache_capacity: default_reply_cache_capacity(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading
    /// config. Looks for the config file in this order:
    /// 1. Path specified in ADVISOR_CONFIG environment variable
    /// 2. ./advisor.toml in current directory
    ///
    /// A missing config file is not an error: the pipeline runs on defaults,
    /// which includes fallback-only generation when no API key is set.
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let config_path = std::env::var("ADVISOR_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("advisor.toml"));

        if !config_path.exists() {
            log::info!(
                "No config file at {}; using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.service.max_upload_bytes == 0 {
            anyhow::bail!("service.max_upload_bytes must be greater than 0");
        }

        if self.service.reference_max_entries == 0 {
            anyhow::bail!("service.reference_max_entries must be greater than 0");
        }

        if self.service.reference_preview_chars == 0 {
            anyhow::bail!("service.reference_preview_chars must be greater than 0");
        }

        if self.service.content_budget_chars == 0 {
            anyhow::bail!("service.content_budget_chars must be greater than 0");
        }

        if self.generation.timeout_secs == 0 {
            anyhow::bail!("generation.timeout_secs must be greater than 0");
        }

        url::Url::parse(&self.generation.endpoint).with_context(|| {
            format!(
                "generation.endpoint is not a valid URL: {}",
                self.generation.endpoint
            )
        })?;

        Ok(())
    }
}

impl GenerationConfig {
    /// Read the API key from the configured environment variable.
    ///
    /// Returns None when unset or empty, which puts the gateway in
    /// fallback-only mode.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}
