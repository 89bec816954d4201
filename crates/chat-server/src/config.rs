//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;

/// Chat server configuration.
///
/// Gateway settings (API key, base URL, default model) are loaded
/// separately by the openai-gateway crate from its own variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
    /// SQLite database URL.
    pub database_url: String,
    /// Model used for conversation reviews.
    pub review_model: String,
    /// Model used for post-session coaching.
    pub coach_model: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `CHAT_SERVER_ADDR` | Server bind address | `127.0.0.1:8787` |
    /// | `CHAT_DATABASE_URL` | SQLite database URL | `sqlite:clary.db?mode=rwc` |
    /// | `CHAT_REVIEW_MODEL` | Conversation review model | `gpt-4o-mini` |
    /// | `CHAT_COACH_MODEL` | Coaching model | `gpt-4o` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::var("CHAT_SERVER_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8787".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let database_url = env::var("CHAT_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:clary.db?mode=rwc".to_string());

        let review_model =
            env::var("CHAT_REVIEW_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let coach_model = env::var("CHAT_COACH_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

        Ok(Self {
            addr,
            database_url,
            review_model,
            coach_model,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid CHAT_SERVER_ADDR format")]
    InvalidAddr,
}
