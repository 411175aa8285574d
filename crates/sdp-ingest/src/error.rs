//! Error types for the ingestion stage
//!
//! [`FetchError`] covers everything that can go wrong while draining a
//! paginated endpoint; [`TransformError`] covers pivot failures (which skip a
//! source rather than abort the run); [`IngestError`] is the job-level
//! rollup.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for fetch operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Errors raised while draining a paginated endpoint
#[derive(Error, Debug)]
pub enum FetchError {
    /// The HTTP client itself could not be constructed
    #[error("failed to build the HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The per-page retry budget ran out
    #[error("max retries ({max_retries}) exceeded on page {page} of {endpoint}. The API may be rate limiting aggressively or unreachable.")]
    MaxRetriesExceeded {
        endpoint: String,
        page: u32,
        max_retries: u32,
    },

    /// The body was not the structured data we expect; never retried
    #[error("malformed response from {endpoint} (page {page}): {detail}")]
    MalformedResponse {
        endpoint: String,
        page: u32,
        detail: String,
    },

    /// Any non-429 HTTP failure status; never retried
    #[error("HTTP {status} returned by {endpoint} (page {page})")]
    Http {
        endpoint: String,
        page: u32,
        status: reqwest::StatusCode,
    },

    /// The configured data key is absent from the response
    #[error("response from {endpoint} is missing the data key '{key}'")]
    MissingKey { endpoint: String, key: String },

    /// A transport failure that is not transient (connect/timeout errors are
    /// retried internally and never surface here)
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The fetch was cancelled before completion
    #[error("fetch cancelled before completion")]
    Cancelled,
}

/// Errors raised while pivoting long records to a wide table.
///
/// These mark a single source as unusable; the batch continues.
#[derive(Error, Debug)]
pub enum TransformError {
    /// Cleaning removed every row
    #[error("no valid observations left after cleaning")]
    NoValidRows,

    /// Two observations share a (country, year) cell
    #[error("duplicate observation for country '{country_code}' in year {year}; cannot pivot")]
    DuplicateObservation { country_code: String, year: String },
}

/// Job-level errors for an ingestion run
#[derive(Error, Debug)]
pub enum IngestError {
    /// A source's fetch failed; aborts the run
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A CSV file could not be written
    #[error(transparent)]
    Table(#[from] sdp_common::TableError),

    /// Output directory management failed
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
