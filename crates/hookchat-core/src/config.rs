use crate::error::{ChatError, Result};
use crate::session::ExchangePolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Endpoint that turns a user message into a reply.
    pub webhook_url: String,
    /// Where conversation state lives; `None` means the platform data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub exchange_policy: ExchangePolicy,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // n8n's local default; point this at your own webhook.
            webhook_url: "http://localhost:5678/webhook/chat".to_string(),
            data_dir: None,
            exchange_policy: ExchangePolicy::default(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

impl Settings {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hookchat")
            .join("config.toml")
    }

    /// Load settings, falling back to defaults if the file is missing or
    /// unreadable.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        if config_path.exists() {
            if let Ok(content) = std::fs::read_to_string(&config_path) {
                match toml::from_str(&content) {
                    Ok(settings) => return settings,
                    Err(e) => tracing::warn!("ignoring malformed config: {}", e),
                }
            }
        }
        Self::default()
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ChatError::Config(e.to_string()))?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }
}
