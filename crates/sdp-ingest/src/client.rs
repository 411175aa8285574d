//! Paginated HTTP fetch client
//!
//! Drains an unknown-length paginated endpoint into memory, one page at a
//! time, surviving transient failures. Three independent termination rules
//! are checked on every page, because providers signal the end of their data
//! differently:
//!
//! 1. an empty page,
//! 2. a declared total-page count (envelope metadata or a named field found
//!    anywhere in the body),
//! 3. a partially filled page (`len < per_page`).
//!
//! Retries are scoped to the current page: a transient failure re-requests
//! the same page, and the retry counter resets after every page that
//! succeeds. A fetch therefore never re-downloads pages it has already
//! accumulated.

use crate::envelope::{extract_records, total_pages_hint, Envelope, ExtractError};
use crate::error::{FetchError, FetchResult};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// ============================================================================
// Fetch Client Constants
// ============================================================================

/// Per-request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Default page size when neither the configuration nor the query
/// parameters specify one.
pub const DEFAULT_PER_PAGE: u32 = 100;

/// Default per-page retry budget.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default delay between retries in seconds, used when the server does not
/// send a usable Retry-After header.
pub const DEFAULT_BASE_DELAY_SECS: u64 = 2;

/// Retry policy for transient failures (HTTP 429, connect errors, timeouts).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Consecutive failures tolerated per page
    pub max_retries: u32,

    /// Sleep between retries when the server gives no better hint
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_secs(DEFAULT_BASE_DELAY_SECS),
        }
    }
}

/// How an endpoint paginates.
#[derive(Debug, Clone, Default)]
pub struct PaginationConfig {
    /// Name of the page-number parameter; defaults to `page`
    pub page_param: Option<String>,

    /// Name of the page-size parameter; defaults to `per_page`
    pub per_page_param: Option<String>,

    /// Requested page size; a value in the query parameters overrides this
    pub per_page: Option<u32>,

    /// Field holding the total page count, searched for anywhere in the
    /// body; only consulted for non-metadata envelopes
    pub total_pages_param: Option<String>,

    /// Where the record list lives inside the response body
    pub envelope: Envelope,
}

impl PaginationConfig {
    fn page_param(&self) -> &str {
        self.page_param.as_deref().unwrap_or("page")
    }

    fn per_page_param(&self) -> &str {
        self.per_page_param.as_deref().unwrap_or("per_page")
    }
}

/// One paginated fetch: an endpoint plus everything needed to drain it.
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    /// Endpoint URL without pagination parameters
    pub url: String,

    /// Short label used in log lines; falls back to the URL
    pub description: String,

    /// Base query parameters; the client takes its own copy and never
    /// mutates these
    pub params: BTreeMap<String, String>,

    /// Pagination behavior of the endpoint
    pub pagination: PaginationConfig,

    /// Retry policy for transient failures
    pub retry: RetryPolicy,
}

impl PageRequest {
    /// Build a request with default pagination and retry settings
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    fn label(&self) -> &str {
        if self.description.is_empty() {
            &self.url
        } else {
            &self.description
        }
    }
}

/// HTTP client for paginated statistics APIs.
///
/// One instance per ingestion run; the underlying reqwest client reuses
/// connections across pages and sources.
pub struct ApiClient {
    client: Client,
    cancel: Option<CancellationToken>,
}

impl ApiClient {
    /// Create a new client with the standard request timeout
    pub fn new() -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            cancel: None,
        })
    }

    /// Attach a cancellation token, checked before each page request
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Drain every page of `request.url` and return the concatenated record
    /// list in page order.
    ///
    /// The caller's parameter map is copied, never mutated. A `per_page`
    /// value present in the parameters overrides the configured page size.
    pub async fn fetch_paginated(&self, request: &PageRequest) -> FetchResult<Vec<Value>> {
        let pagination = &request.pagination;
        let retry = &request.retry;

        let mut params = request.params.clone();
        let per_page = params
            .get(pagination.per_page_param())
            .and_then(|v| v.parse::<u32>().ok())
            .or(pagination.per_page)
            .unwrap_or(DEFAULT_PER_PAGE);
        params.insert(pagination.per_page_param().to_string(), per_page.to_string());

        info!(source = request.label(), url = %request.url, "fetching paginated data");

        let mut accumulated: Vec<Value> = Vec::new();
        let mut page: u32 = 1;
        let mut retries: u32 = 0;
        let mut total_pages: Option<u32> = None;

        loop {
            if let Some(token) = &self.cancel {
                if token.is_cancelled() {
                    return Err(FetchError::Cancelled);
                }
            }

            if retries >= retry.max_retries {
                return Err(FetchError::MaxRetriesExceeded {
                    endpoint: request.url.clone(),
                    page,
                    max_retries: retry.max_retries,
                });
            }

            params.insert(pagination.page_param().to_string(), page.to_string());

            match total_pages {
                Some(total) => debug!(source = request.label(), "requesting page {page}/{total}"),
                None => debug!(source = request.label(), "requesting page {page}"),
            }

            let response = match self.client.get(&request.url).query(&params).send().await {
                Ok(response) => response,
                Err(err) if is_transient(&err) => {
                    warn!(
                        source = request.label(),
                        error = %err,
                        "network error on page {page}, retrying in {:?} ({}/{})",
                        retry.base_delay,
                        retries + 1,
                        retry.max_retries,
                    );
                    tokio::time::sleep(retry.base_delay).await;
                    retries += 1;
                    continue;
                },
                Err(err) => {
                    return Err(FetchError::Transport {
                        endpoint: request.url.clone(),
                        source: err,
                    });
                },
            };

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                let delay = retry_after(&response).unwrap_or(retry.base_delay);
                warn!(
                    source = request.label(),
                    "rate limited on page {page}, retrying in {delay:?}"
                );
                tokio::time::sleep(delay).await;
                retries += 1;
                continue;
            }
            if !status.is_success() {
                return Err(FetchError::Http {
                    endpoint: request.url.clone(),
                    page,
                    status,
                });
            }

            let bytes = match response.bytes().await {
                Ok(bytes) => bytes,
                Err(err) if is_transient(&err) => {
                    warn!(
                        source = request.label(),
                        error = %err,
                        "read error on page {page}, retrying in {:?}",
                        retry.base_delay,
                    );
                    tokio::time::sleep(retry.base_delay).await;
                    retries += 1;
                    continue;
                },
                Err(err) => {
                    return Err(FetchError::Transport {
                        endpoint: request.url.clone(),
                        source: err,
                    });
                },
            };

            let body: Value =
                serde_json::from_slice(&bytes).map_err(|err| FetchError::MalformedResponse {
                    endpoint: request.url.clone(),
                    page,
                    detail: err.to_string(),
                })?;

            let records = extract_records(&body, &pagination.envelope).map_err(|err| match err {
                ExtractError::MissingKey(key) => FetchError::MissingKey {
                    endpoint: request.url.clone(),
                    key,
                },
                ExtractError::NotAnArray(_) => FetchError::MalformedResponse {
                    endpoint: request.url.clone(),
                    page,
                    detail: err.to_string(),
                },
            })?;

            if records.is_empty() {
                info!(source = request.label(), "page {page} is empty, stopping");
                break;
            }

            debug!(
                source = request.label(),
                "page {page}: retrieved {} records",
                records.len()
            );
            let page_len = records.len();
            accumulated.extend(records);

            if total_pages.is_none() {
                total_pages = total_pages_hint(
                    &body,
                    &pagination.envelope,
                    pagination.total_pages_param.as_deref(),
                );
                if let Some(total) = total_pages {
                    debug!(source = request.label(), "declared total pages: {total}");
                }
            }

            if let Some(total) = total_pages {
                if page >= total {
                    info!(source = request.label(), "reached last page ({page}/{total})");
                    break;
                }
            }

            if page_len < per_page as usize {
                info!(
                    source = request.label(),
                    "partial page ({page_len} < {per_page}), stopping"
                );
                break;
            }

            page += 1;
            retries = 0;
        }

        info!(
            source = request.label(),
            "fetched {} total records",
            accumulated.len()
        );
        Ok(accumulated)
    }
}

/// Connect failures and timeouts are worth retrying; everything else is a
/// protocol or client bug.
fn is_transient(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

/// Delay requested by a 429 response, when the Retry-After header holds a
/// (possibly fractional) number of seconds.
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        let pagination = PaginationConfig::default();
        assert_eq!(pagination.page_param(), "page");
        assert_eq!(pagination.per_page_param(), "per_page");
        assert_eq!(pagination.envelope, Envelope::MetadataThenData);
    }

    #[test]
    fn test_request_label_falls_back_to_url() {
        let request = PageRequest::new("https://example.org/data");
        assert_eq!(request.label(), "https://example.org/data");

        let described = PageRequest {
            description: "gdp".to_string(),
            ..PageRequest::new("https://example.org/data")
        };
        assert_eq!(described.label(), "gdp");
    }
}
