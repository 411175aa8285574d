//! Database connection management
//!
//! Pool configuration and construction for the Postgres database holding the
//! staging and production schemas, plus identifier quoting for the
//! dynamically named tables and year columns the loader creates.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Database Configuration Constants
// ============================================================================

/// Default maximum connections in the pool. Kept above the default load
/// concurrency so each in-flight table load can hold its own connection.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 8;

/// Default minimum connections kept open.
pub const DEFAULT_MIN_CONNECTIONS: u32 = 1;

/// Default connection acquire timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Database errors with contextual information
#[derive(Error, Debug)]
pub enum DbError {
    /// SQL query or connection error
    #[error("database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Configuration is invalid or missing
    #[error("database configuration error: {0}. Check DATABASE_URL and connection settings.")]
    Config(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

impl DbConfig {
    /// Build a config for `url` with default pool settings
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }

    /// Load from environment variables; `DATABASE_URL` is required.
    pub fn from_env() -> DbResult<Self> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| DbError::Config("DATABASE_URL not set".to_string()))?;

        let mut config = Self::new(url);

        if let Some(max) = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.max_connections = max;
        }

        if let Some(min) = std::env::var("DB_MIN_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.min_connections = min;
        }

        if let Some(timeout) = std::env::var("DB_CONNECT_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.connect_timeout_secs = timeout;
        }

        Ok(config)
    }
}

/// Create a connection pool from the configuration
pub async fn create_pool(config: &DbConfig) -> DbResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect(&config.url)
        .await?;

    Ok(pool)
}

/// Quote an identifier for direct inclusion in a statement, doubling any
/// embedded quotes. Needed because table and year-column names are data
/// here, not compile-time SQL.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Schema-qualified, quoted table reference
pub fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("fossil_fuel_electricity"), "\"fossil_fuel_electricity\"");
        assert_eq!(quote_ident("2019"), "\"2019\"");
        assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
    }

    #[test]
    fn test_new_uses_default_pool_settings() {
        let config = DbConfig::new("postgresql://localhost/sdp");
        assert_eq!(config.url, "postgresql://localhost/sdp");
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.min_connections, DEFAULT_MIN_CONNECTIONS);
        assert_eq!(config.connect_timeout_secs, DEFAULT_CONNECT_TIMEOUT_SECS);
    }

    #[test]
    fn test_qualified() {
        assert_eq!(
            qualified("staging", "renewable_electricity"),
            "\"staging\".\"renewable_electricity\""
        );
    }
}
