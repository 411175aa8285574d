//! Pipeline configuration
//!
//! Environment-driven settings shared by the ingestion and loading stages.

use std::path::PathBuf;

// ============================================================================
// Pipeline Configuration Constants
// ============================================================================

/// Default directory for raw CSV output and loader input.
pub const DEFAULT_DATA_DIR: &str = "./data/raw";

/// Default schema receiving freshly loaded tables.
pub const DEFAULT_STAGING_SCHEMA: &str = "staging";

/// Default schema tables are promoted into.
pub const DEFAULT_PRODUCTION_SCHEMA: &str = "production";

/// Default number of concurrent table loads.
pub const DEFAULT_LOAD_WORKERS: usize = 4;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory holding the raw CSV files
    pub data_dir: PathBuf,

    /// Schema freshly loaded tables are written into
    pub staging_schema: String,

    /// Schema tables are promoted into
    pub production_schema: String,

    /// Number of tables loaded concurrently
    pub load_workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            staging_schema: DEFAULT_STAGING_SCHEMA.to_string(),
            production_schema: DEFAULT_PRODUCTION_SCHEMA.to_string(),
            load_workers: DEFAULT_LOAD_WORKERS,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables, falling back to the
    /// documented defaults.
    ///
    /// - `SDP_DATA_DIR`: raw data directory
    /// - `SDP_STAGING_SCHEMA`: staging schema name
    /// - `SDP_PRODUCTION_SCHEMA`: production schema name
    /// - `SDP_LOAD_WORKERS`: concurrent table loads
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("SDP_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Ok(schema) = std::env::var("SDP_STAGING_SCHEMA") {
            config.staging_schema = schema;
        }

        if let Ok(schema) = std::env::var("SDP_PRODUCTION_SCHEMA") {
            config.production_schema = schema;
        }

        config.load_workers = std::env::var("SDP_LOAD_WORKERS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_LOAD_WORKERS);

        config
    }
}
