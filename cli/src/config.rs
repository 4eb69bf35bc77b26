//! Runtime configuration, read from the environment.
//!
//! A `.env` file in the working directory is honoured for local development.

use std::time::Duration;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:5000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub api_url: Url,
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let api_url = std::env::var("LIBRIS_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let mut config = Self::new(&api_url)
            .map_err(|e| ConfigError::InvalidValue("LIBRIS_API_URL".to_string(), e.to_string()))?;

        if let Ok(raw) = std::env::var("LIBRIS_TIMEOUT_SECS") {
            let secs = raw.parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue(
                    "LIBRIS_TIMEOUT_SECS".to_string(),
                    format!("'{}' is not a number of seconds", raw),
                )
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Builds a config pointing at `api_url` with default settings otherwise.
    pub fn new(api_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            api_url: Url::parse(api_url)?,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    pub fn with_api_url(mut self, api_url: &str) -> Result<Self, url::ParseError> {
        self.api_url = Url::parse(api_url)?;
        Ok(self)
    }
}
