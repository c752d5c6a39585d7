use crate::constants::*;
use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Explicit pipeline configuration handed to every component at construction.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub log_dir: PathBuf,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub request_timeout_secs: u64,
    pub download_chunk_bytes: usize,
    /// Serialized size above which output is streamed in batches.
    pub buffer_threshold_bytes: u64,
    /// Records per batch in the streamed write path.
    pub chunk_size: usize,
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub un_url: String,
    pub eu_url: String,
    pub eu_alt_url: Option<String>,
    pub us_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            temp_dir: PathBuf::from(DEFAULT_TEMP_DIR),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            download_chunk_bytes: DEFAULT_DOWNLOAD_CHUNK_BYTES,
            buffer_threshold_bytes: DEFAULT_BUFFER_THRESHOLD_BYTES,
            chunk_size: DEFAULT_CHUNK_SIZE,
            sources: SourcesConfig::default(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            un_url: UN_SANCTIONS_URL.to_string(),
            eu_url: EU_SANCTIONS_URL.to_string(),
            eu_alt_url: Some(EU_SANCTIONS_ALT_URL.to_string()),
            us_url: US_SANCTIONS_URL.to_string(),
        }
    }
}

impl Config {
    /// Load from an optional TOML file, then apply `SANCTIONS_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = std::env::var("SANCTIONS_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SANCTIONS_TEMP_DIR") {
            self.temp_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SANCTIONS_LOG_DIR") {
            self.log_dir = PathBuf::from(v);
        }
        if let Some(v) = parse_env("SANCTIONS_MAX_RETRIES")? {
            self.max_retries = v;
        }
        if let Some(v) = parse_env("SANCTIONS_RETRY_DELAY_SECS")? {
            self.retry_delay_secs = v;
        }
        if let Some(v) = parse_env("SANCTIONS_CHUNK_SIZE")? {
            self.chunk_size = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid("max_retries must be at least 1".into()));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be at least 1".into()));
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { key, value }),
        Err(_) => Ok(None),
    }
}
