//! Configuration for the Tally API service.

use std::time::Duration;

use tally_auth_core::AuthConfig;
use tally_billing_core::BillingConfig;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Tally API configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub port: u16,
    /// Database URL
    pub database_url: String,
    /// Token, invitation and deactivation settings
    pub auth: AuthConfig,
    /// Usage queue settings
    pub billing: BillingConfig,
    /// Period of the maintenance sweep
    pub maintenance_interval: Duration,
    pub request_timeout: Duration,
    pub log_format: LogFormat,
    pub metrics_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let jwt_secret = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let port = parse_or(&lookup, "PORT", 8080)?;
        let token_ttl_secs: u64 = parse_or(&lookup, "JWT_TTL_SECS", 24 * 60 * 60)?;
        let invitation_ttl_days: u64 = parse_or(&lookup, "INVITATION_TTL_DAYS", 7)?;
        let grace_days: u64 = parse_or(&lookup, "DEACTIVATION_GRACE_DAYS", 15)?;
        let queue_capacity = parse_or(
            &lookup,
            "USAGE_QUEUE_CAPACITY",
            BillingConfig::DEFAULT_QUEUE_CAPACITY,
        )?;
        let workers = parse_or(&lookup, "USAGE_WORKERS", BillingConfig::DEFAULT_WORKERS)?;
        let maintenance_secs: u64 = parse_or(&lookup, "MAINTENANCE_INTERVAL_SECS", 60 * 60)?;
        let request_timeout_secs: u64 = parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30)?;

        if maintenance_secs == 0 {
            return Err(ConfigError::Invalid("MAINTENANCE_INTERVAL_SECS"));
        }

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(_) => return Err(ConfigError::Invalid("LOG_FORMAT")),
        };

        let metrics_enabled = lookup("METRICS_ENABLED")
            .and_then(|v| v.parse().ok())
            .unwrap_or(true);

        let mut auth = AuthConfig::new(jwt_secret)
            .map_err(|e| ConfigError::AuthConfig(e.to_string()))?
            .with_token_ttl(Duration::from_secs(token_ttl_secs))
            .with_invitation_ttl(Duration::from_secs(invitation_ttl_days * 24 * 60 * 60))
            .with_deactivation_grace(Duration::from_secs(grace_days * 24 * 60 * 60));
        if let Some(issuer) = lookup("JWT_ISSUER") {
            auth = auth.with_issuer(issuer);
        }

        let billing = BillingConfig::new()
            .with_queue_capacity(queue_capacity)
            .with_workers(workers);

        Ok(Self {
            port,
            database_url,
            auth,
            billing,
            maintenance_interval: Duration::from_secs(maintenance_secs),
            request_timeout: Duration::from_secs(request_timeout_secs),
            log_format,
            metrics_enabled,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Auth config error: {0}")]
    AuthConfig(String),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const SECRET: &str = "config-test-secret-that-is-32-bytes-long";

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/tally"), ("JWT_SECRET", SECRET)])
            .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.auth.issuer, "tally");
        assert_eq!(config.auth.token_ttl, Duration::from_secs(86_400));
        assert_eq!(config.auth.invitation_ttl, Duration::from_secs(7 * 86_400));
        assert_eq!(config.auth.deactivation_grace, Duration::from_secs(15 * 86_400));
        assert_eq!(config.billing, BillingConfig::default());
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/tally"),
            ("JWT_SECRET", SECRET),
            ("JWT_ISSUER", "tally-staging"),
            ("PORT", "9000"),
            ("USAGE_WORKERS", "0"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.auth.issuer, "tally-staging");
        assert_eq!(config.billing.usage_workers, 1);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_missing_and_invalid() {
        assert!(matches!(
            load(&[("JWT_SECRET", SECRET)]),
            Err(ConfigError::Missing("DATABASE_URL"))
        ));
        assert!(matches!(
            load(&[("DATABASE_URL", "postgres://localhost/tally"), ("JWT_SECRET", "short")]),
            Err(ConfigError::AuthConfig(_))
        ));
        assert!(matches!(
            load(&[
                ("DATABASE_URL", "postgres://localhost/tally"),
                ("JWT_SECRET", SECRET),
                ("PORT", "eighty"),
            ]),
            Err(ConfigError::Invalid("PORT"))
        ));
    }
}
