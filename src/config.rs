use anyhow::Context;
use dotenvy::dotenv;
use std::env;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::services::monitor::{DEFAULT_PAGE_SIZE, DEFAULT_POLL_INTERVAL};
use crate::stellar::gateway::TESTNET_PASSPHRASE;

pub const DEFAULT_HORIZON_URL: &str = "https://horizon-testnet.stellar.org";
pub const DEFAULT_FRIENDBOT_URL: &str = "https://friendbot.stellar.org";
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 168;

#[derive(Clone)]
pub struct Config {
    pub server_port: u16,
    /// Absent means the process keeps everything in memory.
    pub database_url: Option<String>,
    pub stellar_horizon_url: String,
    pub stellar_friendbot_url: String,
    pub stellar_network_passphrase: String,
    pub jwt_secret: String,
    pub wallet_encryption_key: String,
    pub admin_api_key: Option<String>,
    pub session_ttl_hours: i64,
    pub monitor_interval: Duration,
    pub monitor_page_size: u32,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server_port", &self.server_port)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "<redacted>"),
            )
            .field("stellar_horizon_url", &self.stellar_horizon_url)
            .field("stellar_friendbot_url", &self.stellar_friendbot_url)
            .field("stellar_network_passphrase", &self.stellar_network_passphrase)
            .field("jwt_secret", &"<redacted>")
            .field("wallet_encryption_key", &"<redacted>")
            .field(
                "admin_api_key",
                &self.admin_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("session_ttl_hours", &self.session_ttl_hours)
            .field("monitor_interval", &self.monitor_interval)
            .field("monitor_page_size", &self.monitor_page_size)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let config = Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a port number")?,
            database_url: non_empty_var("DATABASE_URL"),
            stellar_horizon_url: env::var("STELLAR_HORIZON_URL")
                .unwrap_or_else(|_| DEFAULT_HORIZON_URL.to_string()),
            stellar_friendbot_url: env::var("STELLAR_FRIENDBOT_URL")
                .unwrap_or_else(|_| DEFAULT_FRIENDBOT_URL.to_string()),
            stellar_network_passphrase: env::var("STELLAR_NETWORK_PASSPHRASE")
                .unwrap_or_else(|_| TESTNET_PASSPHRASE.to_string()),
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            wallet_encryption_key: env::var("WALLET_ENCRYPTION_KEY")
                .context("WALLET_ENCRYPTION_KEY must be set")?,
            admin_api_key: non_empty_var("ADMIN_API_KEY"),
            session_ttl_hours: env::var("SESSION_TTL_HOURS")
                .unwrap_or_else(|_| DEFAULT_SESSION_TTL_HOURS.to_string())
                .parse()
                .context("SESSION_TTL_HOURS must be an integer")?,
            monitor_interval: match env::var("MONITOR_INTERVAL_SECS") {
                Ok(secs) => Duration::from_secs(
                    secs.parse()
                        .context("MONITOR_INTERVAL_SECS must be a number of seconds")?,
                ),
                Err(_) => DEFAULT_POLL_INTERVAL,
            },
            monitor_page_size: match env::var("MONITOR_PAGE_SIZE") {
                Ok(size) => size
                    .parse()
                    .context("MONITOR_PAGE_SIZE must be a positive integer")?,
                Err(_) => DEFAULT_PAGE_SIZE,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        Url::parse(&self.stellar_horizon_url).context("STELLAR_HORIZON_URL is not a valid URL")?;
        Url::parse(&self.stellar_friendbot_url)
            .context("STELLAR_FRIENDBOT_URL is not a valid URL")?;

        if self.jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }
        if self.wallet_encryption_key.trim().is_empty() {
            anyhow::bail!("WALLET_ENCRYPTION_KEY must not be empty");
        }
        if self.session_ttl_hours <= 0 {
            anyhow::bail!("SESSION_TTL_HOURS must be positive");
        }
        if self.monitor_interval.is_zero() {
            anyhow::bail!("MONITOR_INTERVAL_SECS must be at least 1");
        }
        if self.monitor_page_size == 0 || self.monitor_page_size > 200 {
            anyhow::bail!("MONITOR_PAGE_SIZE must be between 1 and 200");
        }

        Ok(())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            server_port: 3000,
            database_url: Some("postgres://user:pw@localhost/paydesk".to_string()),
            stellar_horizon_url: DEFAULT_HORIZON_URL.to_string(),
            stellar_friendbot_url: DEFAULT_FRIENDBOT_URL.to_string(),
            stellar_network_passphrase: TESTNET_PASSPHRASE.to_string(),
            jwt_secret: "jwt-secret-value".to_string(),
            wallet_encryption_key: "wallet-key-value".to_string(),
            admin_api_key: Some("admin-key-value".to_string()),
            session_ttl_hours: 24,
            monitor_interval: Duration::from_secs(10),
            monitor_page_size: 20,
        }
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let printed = format!("{:?}", sample());
        assert!(!printed.contains("jwt-secret-value"));
        assert!(!printed.contains("wallet-key-value"));
        assert!(!printed.contains("admin-key-value"));
        assert!(!printed.contains("user:pw"));
        assert!(printed.contains("horizon-testnet"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(sample().validate().is_ok());

        let mut config = sample();
        config.stellar_horizon_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = sample();
        config.monitor_page_size = 0;
        assert!(config.validate().is_err());

        let mut config = sample();
        config.monitor_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
