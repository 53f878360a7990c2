use std::time::Duration;

use anyhow::{bail, Context};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_ANALYSIS_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_STYLE: &str = "Modern, refined style";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub image_model: String,
    pub analysis_model: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            analysis_model: DEFAULT_ANALYSIS_MODEL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini: GeminiConfig,
    pub port: u16,
    pub default_style: String,
}

impl Config {
    /// Reads configuration from the environment. `GEMINI_API_KEY` is the only
    /// required variable.
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY").context("GEMINI_API_KEY must be set")?;
        if api_key.trim().is_empty() {
            bail!("GEMINI_API_KEY is empty");
        }

        let mut gemini = GeminiConfig::new(
            api_key,
            std::env::var("GEMINI_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
        );
        if let Ok(model) = std::env::var("GEMINI_IMAGE_MODEL") {
            gemini.image_model = model;
        }
        if let Ok(model) = std::env::var("GEMINI_ANALYSIS_MODEL") {
            gemini.analysis_model = model;
        }
        if let Ok(secs) = std::env::var("GEMINI_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().context("GEMINI_TIMEOUT_SECS must be a number of seconds")?;
            gemini.timeout = Duration::from_secs(secs);
        }

        let port = match std::env::var("PORT") {
            Ok(v) => v.parse().context("PORT must be a valid port number")?,
            Err(_) => 8080,
        };
        let default_style = std::env::var("DEFAULT_STYLE").unwrap_or_else(|_| DEFAULT_STYLE.to_string());

        Ok(Self { gemini, port, default_style })
    }
}
