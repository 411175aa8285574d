//! SDP Load Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Loads the raw CSV files produced by the ingestion stage into a Postgres
//! staging schema and promotes each table into the production schema with an
//! atomic swap.
//!
//! # Example
//!
//! ```no_run
//! use sdp_common::{sources::world_bank_sources, PipelineConfig};
//! use sdp_load::db::{create_pool, DbConfig};
//! use sdp_load::loader::{LoadError, Loader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), LoadError> {
//!     let config = PipelineConfig::from_env();
//!     let pool = create_pool(&DbConfig::from_env()?).await?;
//!
//!     let loader = Loader::new(pool, &config);
//!     loader.run(&config.data_dir, &world_bank_sources()).await
//! }
//! ```

pub mod db;
pub mod loader;

// Re-export commonly used types
pub use db::{create_pool, DbConfig, DbError};
pub use loader::{LoadError, Loader};
