//! Application configuration loaded from environment variables.
//!
//! Fail-fast loading with validation: required variables must be present
//! and valid or startup stops with a clear error. A `.env` file is honored
//! in development.

use std::env;

use thiserror::Error;

use crate::services::name_resolver::MatcherConfig;

/// Configuration errors that can occur during environment loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string.
    pub database_url: String,

    /// Maximum pool connections.
    pub max_connections: u32,

    /// Tracing filter directive (e.g. "info,tabletrack=debug").
    pub rust_log: String,

    /// Name matcher thresholds.
    pub matcher: MatcherConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Required Variables
    ///
    /// - `DATABASE_URL` - PostgreSQL connection string
    ///
    /// # Optional Variables
    ///
    /// - `MAX_CONNECTIONS` - pool size (default: 10)
    /// - `RUST_LOG` - log level filter (default: "info")
    /// - `MATCHER_SIMILARITY_THRESHOLD` - minimum match score (default: 80)
    /// - `MATCHER_EXACT_THRESHOLD` - exact-match score (default: 95)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or any value
    /// is out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (development only)
        let _ = dotenvy::dotenv();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let max_connections = parse_optional("MAX_CONNECTIONS", 10u32)?;
        if max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                var: "MAX_CONNECTIONS".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let defaults = MatcherConfig::default();
        let similarity_threshold =
            parse_optional("MATCHER_SIMILARITY_THRESHOLD", defaults.similarity_threshold)?;
        let exact_match_threshold =
            parse_optional("MATCHER_EXACT_THRESHOLD", defaults.exact_match_threshold)?;

        if similarity_threshold > 100 || exact_match_threshold > 100 {
            return Err(ConfigError::InvalidValue {
                var: "MATCHER_EXACT_THRESHOLD".to_string(),
                message: "Thresholds are scores in 0-100".to_string(),
            });
        }
        if exact_match_threshold < similarity_threshold {
            return Err(ConfigError::InvalidValue {
                var: "MATCHER_EXACT_THRESHOLD".to_string(),
                message: "Must be at least MATCHER_SIMILARITY_THRESHOLD".to_string(),
            });
        }

        Ok(Config {
            database_url,
            max_connections,
            rust_log,
            matcher: MatcherConfig {
                similarity_threshold,
                exact_match_threshold,
            },
        })
    }
}

/// Parse an optional env var, falling back to a default when unset.
fn parse_optional<T: std::str::FromStr>(var: &str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            var: var.to_string(),
            message: format!("Cannot parse '{raw}'"),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingVar("DATABASE_URL".to_string());
        assert_eq!(
            err.to_string(),
            "Missing required environment variable: DATABASE_URL"
        );

        let err = ConfigError::InvalidValue {
            var: "MAX_CONNECTIONS".to_string(),
            message: "Must be at least 1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value for MAX_CONNECTIONS: Must be at least 1"
        );
    }

    // All env-var-dependent scenarios are consolidated into a single test
    // to avoid race conditions when Rust runs tests in parallel.
    #[test]
    fn test_config_from_env() {
        // Scenario 1: missing DATABASE_URL fails
        std::env::remove_var("DATABASE_URL");
        std::env::remove_var("MAX_CONNECTIONS");
        std::env::remove_var("MATCHER_SIMILARITY_THRESHOLD");
        std::env::remove_var("MATCHER_EXACT_THRESHOLD");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::MissingVar(_))
        ));

        // Scenario 2: defaults
        std::env::set_var("DATABASE_URL", "postgres://localhost/tabletrack_test");
        let config = Config::from_env().expect("config should load");
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.matcher.similarity_threshold, 80);
        assert_eq!(config.matcher.exact_match_threshold, 95);

        // Scenario 3: overrides
        std::env::set_var("MAX_CONNECTIONS", "4");
        std::env::set_var("MATCHER_SIMILARITY_THRESHOLD", "70");
        std::env::set_var("MATCHER_EXACT_THRESHOLD", "90");
        let config = Config::from_env().expect("config should load");
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.matcher.similarity_threshold, 70);
        assert_eq!(config.matcher.exact_match_threshold, 90);

        // Scenario 4: exact below similarity is rejected
        std::env::set_var("MATCHER_EXACT_THRESHOLD", "60");
        assert!(Config::from_env().is_err());

        // Scenario 5: unparseable value is rejected
        std::env::set_var("MATCHER_EXACT_THRESHOLD", "95");
        std::env::set_var("MAX_CONNECTIONS", "not_a_number");
        assert!(Config::from_env().is_err());

        // Clean up
        std::env::remove_var("DATABASE_URL");
        std::env::remove_var("MAX_CONNECTIONS");
        std::env::remove_var("MATCHER_SIMILARITY_THRESHOLD");
        std::env::remove_var("MATCHER_EXACT_THRESHOLD");
    }
}
