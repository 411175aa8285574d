//! World Bank ingestion job
//!
//! Drives the full ingestion pass for the configured World Bank sources:
//! clean up stale CSVs, drain each endpoint, project the provider's record
//! shape into long observations, pivot to a wide table, and write one CSV
//! per source.

use crate::client::{ApiClient, PageRequest, PaginationConfig, RetryPolicy};
use crate::envelope::Envelope;
use crate::error::{FetchResult, IngestError};
use crate::transform::{coerce_numeric, pivot_wide, IndicatorObservation};
use indicatif::{ProgressBar, ProgressStyle};
use sdp_common::DataSource;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Page size requested from the World Bank API.
pub const WORLD_BANK_PER_PAGE: u32 = 1000;

/// Ingest configured World Bank sources into raw CSV files.
pub struct WorldBankIngestion {
    client: ApiClient,
    output_dir: PathBuf,
    default_params: BTreeMap<String, String>,
}

impl WorldBankIngestion {
    /// Create a job writing into `output_dir` (created if absent)
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self, IngestError> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir).map_err(|source| IngestError::Io {
            path: output_dir.clone(),
            source,
        })?;

        let default_params = BTreeMap::from([
            ("format".to_string(), "json".to_string()),
            ("per_page".to_string(), WORLD_BANK_PER_PAGE.to_string()),
        ]);

        Ok(Self {
            client: ApiClient::new()?,
            output_dir,
            default_params,
        })
    }

    /// Attach a cancellation token to the underlying fetch client
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.client = self.client.with_cancellation(token);
        self
    }

    /// Run the ingestion pass for `sources`.
    ///
    /// A fetch failure aborts the run; a transform failure only skips its
    /// source.
    pub async fn run(&self, sources: &[DataSource]) -> Result<(), IngestError> {
        info!("starting World Bank ingestion for {} sources", sources.len());

        self.cleanup_existing_files(sources);

        let progress = ProgressBar::new(sources.len() as u64);
        progress.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );

        for source in sources {
            progress.set_message(source.name.clone());
            info!(source = %source.name, "downloading: {}", source.description);

            let records = self.fetch_source(source).await?;

            match pivot_wide(project_observations(&records)) {
                Ok(table) => {
                    let path = self.output_dir.join(format!("{}.csv", source.filename));
                    table.write_csv(&path)?;
                    info!(
                        source = %source.name,
                        "saved {} countries x {} years to {}",
                        table.len(),
                        table.years.len(),
                        path.display()
                    );
                },
                Err(err) => {
                    warn!(source = %source.name, "skipping source: {err}");
                },
            }

            progress.inc(1);
        }

        progress.finish_with_message("ingestion complete");
        info!("World Bank ingestion finished");
        Ok(())
    }

    /// Drain one source's endpoint with the job defaults merged under its
    /// own parameters.
    async fn fetch_source(&self, source: &DataSource) -> FetchResult<Vec<Value>> {
        let mut params = self.default_params.clone();
        params.extend(source.params.clone());

        let request = PageRequest {
            url: source.url.clone(),
            description: source.name.clone(),
            params,
            pagination: PaginationConfig {
                envelope: Envelope::MetadataThenData,
                ..Default::default()
            },
            retry: RetryPolicy::default(),
        };

        self.client.fetch_paginated(&request).await
    }

    /// Remove stale CSVs for the configured sources before downloading
    fn cleanup_existing_files(&self, sources: &[DataSource]) {
        let mut removed = 0usize;
        for source in sources {
            let path = self.output_dir.join(format!("{}.csv", source.filename));
            if path.exists() {
                match std::fs::remove_file(&path) {
                    Ok(()) => {
                        debug!(source = %source.name, "removed stale {}", path.display());
                        removed += 1;
                    },
                    Err(err) => {
                        warn!(source = %source.name, "could not remove {}: {err}", path.display());
                    },
                }
            }
        }
        if removed > 0 {
            info!("cleanup removed {removed} stale CSV files");
        }
    }
}

/// Project raw World Bank records into long observations.
///
/// Only objects carrying a `value` field count as observations; nested
/// country/indicator fields default to empty strings when absent, and the
/// year and value coerce to numbers leniently.
pub fn project_observations(records: &[Value]) -> Vec<IndicatorObservation> {
    records.iter().filter_map(project).collect()
}

fn project(record: &Value) -> Option<IndicatorObservation> {
    let fields = record.as_object()?;
    if !fields.contains_key("value") {
        return None;
    }

    Some(IndicatorObservation {
        country_code: str_field(record, &["countryiso3code"]),
        country_name: str_field(record, &["country", "value"]),
        indicator_code: str_field(record, &["indicator", "id"]),
        indicator_name: str_field(record, &["indicator", "value"]),
        year: fields.get("date").and_then(coerce_numeric),
        value: fields.get("value").and_then(coerce_numeric),
    })
}

/// Walk `path` through nested objects; anything missing or non-string
/// becomes an empty string.
fn str_field(record: &Value, path: &[&str]) -> String {
    let mut current = record;
    for key in path {
        match current.get(key) {
            Some(next) => current = next,
            None => return String::new(),
        }
    }
    current.as_str().unwrap_or_default().to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wb_record(code: &str, date: &str, value: Value) -> Value {
        json!({
            "countryiso3code": code,
            "country": {"id": "FR", "value": "France"},
            "indicator": {"id": "EG.ELC.NUCL.ZS", "value": "Nuclear share"},
            "date": date,
            "value": value,
        })
    }

    #[test]
    fn test_project_full_record() {
        let records = vec![wb_record("FRA", "2019", json!(70.6))];
        let observations = project_observations(&records);

        assert_eq!(observations.len(), 1);
        let o = &observations[0];
        assert_eq!(o.country_code, "FRA");
        assert_eq!(o.country_name, "France");
        assert_eq!(o.indicator_code, "EG.ELC.NUCL.ZS");
        assert_eq!(o.indicator_name, "Nuclear share");
        assert_eq!(o.year, Some(2019.0));
        assert_eq!(o.value, Some(70.6));
    }

    #[test]
    fn test_project_skips_records_without_value_field() {
        let records = vec![
            json!({"countryiso3code": "FRA", "date": "2019"}),
            json!("not an object"),
            json!(42),
        ];
        assert!(project_observations(&records).is_empty());
    }

    #[test]
    fn test_project_null_value_is_kept_as_missing() {
        let records = vec![wb_record("FRA", "2019", json!(null))];
        let observations = project_observations(&records);

        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].value, None);
    }

    #[test]
    fn test_project_defaults_missing_nested_fields() {
        let records = vec![json!({"value": 1.5, "date": "2019"})];
        let observations = project_observations(&records);

        let o = &observations[0];
        assert_eq!(o.country_code, "");
        assert_eq!(o.country_name, "");
        assert_eq!(o.indicator_code, "");
        assert_eq!(o.year, Some(2019.0));
        assert_eq!(o.value, Some(1.5));
    }

    #[test]
    fn test_project_unparseable_year_is_none() {
        let records = vec![wb_record("FRA", "latest", json!(1.0))];
        let observations = project_observations(&records);
        assert_eq!(observations[0].year, None);
    }
}
