//! Relay configuration.
//!
//! Optional TOML file; every field has a default. The upstream API key is
//! never read from the file, only from `OPENAI_API_KEY`.

use std::env;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::RelayError;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Listen address.
    pub bind: String,
    /// Full chat-completions URL.
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Upstream request timeout.
    pub timeout_secs: u64,
    /// Longest player message forwarded, in characters.
    pub max_message_len: usize,
    /// Replaces the built-in persona when set.
    pub persona: Option<String>,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.9,
            max_tokens: 80,
            timeout_secs: 30,
            max_message_len: 500,
            persona: None,
            api_key: None,
        }
    }
}

impl RelayConfig {
    /// Load from `path` (defaults when missing) and take the key from the
    /// environment.
    pub fn load(path: &Path) -> Result<Self, RelayError> {
        let config = match fs::read_to_string(path) {
            Ok(text) => {
                let config = Self::from_toml(&text, path)?;
                info!("Loaded relay config from {}", path.display());
                config
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No relay config at {}, using defaults", path.display());
                Self::default()
            }
            Err(source) => {
                return Err(RelayError::ConfigIo {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Ok(config.with_api_key(env::var(API_KEY_ENV).ok()))
    }

    pub fn from_toml(text: &str, path: &Path) -> Result<Self, RelayError> {
        let config: Self = toml::from_str(text).map_err(|source| RelayError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Set the key; blank keys count as missing.
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn validate(&self) -> Result<(), RelayError> {
        if self.endpoint.trim().is_empty() {
            return Err(RelayError::InvalidConfig("endpoint is empty".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(RelayError::InvalidConfig("model is empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(RelayError::InvalidConfig(format!(
                "temperature {} outside [0, 2]",
                self.temperature
            )));
        }
        if self.max_tokens == 0 || self.timeout_secs == 0 || self.max_message_len == 0 {
            return Err(RelayError::InvalidConfig(
                "max_tokens, timeout_secs and max_message_len must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
