//! Configuration file parser for ~/.config/gleaner/config.toml.
//!
//! The config file is optional — a missing file yields `Config::default()`.
//! Secrets (provider consumer pair, push API key) may come from the file or
//! from environment variables; env vars take precedence.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
///
/// Custom Debug impl masks secret fields to prevent leakage in logs and
/// error messages.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the timeline provider's API.
    pub provider_api_url: String,

    /// Base URL used for public profile / status links.
    pub provider_web_url: String,

    /// Base URL of the push provider's API.
    pub push_api_url: String,

    /// Directory where feed and outline artifacts are written.
    /// Relative paths are resolved against the config directory.
    pub output_dir: PathBuf,

    /// Base URL under which `output_dir` is externally reachable.
    pub artifact_base_url: String,

    /// Path to the readability extraction program.
    pub extractor_command: PathBuf,

    /// Hard timeout for one link-enrichment job, in seconds.
    pub enrich_timeout_secs: u64,

    /// Per-request timeout for provider API calls, in seconds.
    pub provider_timeout_secs: u64,

    /// Provider application key (GLEANER_CONSUMER_KEY env var overrides).
    pub consumer_key: Option<String>,

    /// Provider application secret (GLEANER_CONSUMER_SECRET env var overrides).
    pub consumer_secret: Option<String>,

    /// Push provider API key (GLEANER_PUSH_API_KEY env var overrides).
    pub push_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider_api_url: "https://api.example.social/1.1".to_string(),
            provider_web_url: "https://example.social".to_string(),
            push_api_url: "https://push.example.net".to_string(),
            output_dir: PathBuf::from("artifacts"),
            artifact_base_url: "http://localhost:8000/static".to_string(),
            extractor_command: PathBuf::from("get_content.js"),
            enrich_timeout_secs: 10,
            provider_timeout_secs: 30,
            consumer_key: None,
            consumer_secret: None,
            push_api_key: None,
        }
    }
}

/// Mask secrets in Debug output.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("provider_api_url", &self.provider_api_url)
            .field("provider_web_url", &self.provider_web_url)
            .field("push_api_url", &self.push_api_url)
            .field("output_dir", &self.output_dir)
            .field("artifact_base_url", &self.artifact_base_url)
            .field("extractor_command", &self.extractor_command)
            .field("enrich_timeout_secs", &self.enrich_timeout_secs)
            .field("provider_timeout_secs", &self.provider_timeout_secs)
            .field("consumer_key", &self.consumer_key.as_ref().map(|_| "[REDACTED]"))
            .field(
                "consumer_secret",
                &self.consumer_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "push_api_key",
                &self.push_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load config from the given path, falling back to defaults when the
    /// file does not exist. Env vars override file-provided secrets.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let meta = std::fs::metadata(path)?;
            if meta.len() > Self::MAX_FILE_SIZE {
                return Err(ConfigError::TooLarge(format!(
                    "{} bytes (max {})",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };

        if let Ok(key) = std::env::var("GLEANER_CONSUMER_KEY") {
            config.consumer_key = Some(key);
        }
        if let Ok(secret) = std::env::var("GLEANER_CONSUMER_SECRET") {
            config.consumer_secret = Some(secret);
        }
        if let Ok(key) = std::env::var("GLEANER_PUSH_API_KEY") {
            config.push_api_key = Some(key);
        }

        Ok(config)
    }

    /// Absolute output directory, resolving relative paths against `base`.
    pub fn resolved_output_dir(&self, base: &Path) -> PathBuf {
        if self.output_dir.is_absolute() {
            self.output_dir.clone()
        } else {
            base.join(&self.output_dir)
        }
    }
}
