//! Application configuration loaded from environment variables.

use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The webhook path secret was not configured.
    ///
    /// The webhook endpoint is a capability URL: the secret path segment is
    /// its only authentication. Starting without one would silently accept
    /// an unguarded endpoint, so absence is fatal rather than defaulted.
    #[error("WEBHOOK_SECRET must be set before the service accepts traffic")]
    MissingWebhookSecret,
}

/// Server configuration.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `WEBHOOK_SECRET` — webhook capability-URL path secret (required)
/// - `PUBLIC_BASE_URL` — externally reachable base URL used to build the
///   fulfiller callback URL (default: `"http://localhost:3000"`)
/// - `DATABASE_URL` — PostgreSQL connection string; the in-memory store is
///   used when unset
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub webhook_secret: String,
    pub public_base_url: String,
    pub database_url: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Fails when `WEBHOOK_SECRET` is absent or empty; all other values
    /// have defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let webhook_secret = std::env::var("WEBHOOK_SECRET")
            .ok()
            .filter(|secret| !secret.is_empty())
            .ok_or(ConfigError::MissingWebhookSecret)?;

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            webhook_secret,
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            database_url: std::env::var("DATABASE_URL").ok(),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the callback URL the fulfiller posts status updates to.
    pub fn callback_url(&self) -> String {
        format!(
            "{}/webhooks/fulfillment/{}",
            self.public_base_url, self.webhook_secret
        )
    }
}
