//! Data source descriptors
//!
//! Static configuration for the indicator endpoints the pipeline ingests.
//! Each descriptor names one paginated API endpoint and the CSV file its
//! transformed table is written to.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Base URL of the World Bank indicators API.
pub const WORLD_BANK_API: &str = "https://api.worldbank.org/v2";

/// One configured data source: an endpoint plus its output filename.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    /// Short identifier used in logs and as the database table name
    pub name: String,

    /// Endpoint URL (without pagination parameters)
    pub url: String,

    /// Human-readable description
    pub description: String,

    /// Output filename, without the `.csv` extension
    pub filename: String,

    /// Extra query parameters merged over the job defaults
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl DataSource {
    /// Create a descriptor whose filename matches its name
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            filename: name.clone(),
            name,
            url: url.into(),
            description: description.into(),
            params: BTreeMap::new(),
        }
    }
}

/// The default set of World Bank sources: share of electricity production by
/// generation type.
pub fn world_bank_sources() -> Vec<DataSource> {
    vec![
        DataSource::new(
            "fossil_fuel_electricity",
            format!("{}/country/all/indicator/EG.ELC.FOSL.ZS", WORLD_BANK_API),
            "Electricity production from fossil fuels (% of total)",
        ),
        DataSource::new(
            "renewable_electricity",
            format!("{}/country/all/indicator/EG.ELC.RNEW.ZS", WORLD_BANK_API),
            "Electricity production from renewable sources (% of total)",
        ),
        DataSource::new(
            "nuclear_electricity",
            format!("{}/country/all/indicator/EG.ELC.NUCL.ZS", WORLD_BANK_API),
            "Electricity production from nuclear sources (% of total)",
        ),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sources() {
        let sources = world_bank_sources();
        assert_eq!(sources.len(), 3);
        for source in &sources {
            assert!(source.url.starts_with(WORLD_BANK_API));
            assert_eq!(source.name, source.filename);
            assert!(source.params.is_empty());
        }
    }

    #[test]
    fn test_new_defaults_filename_to_name() {
        let source = DataSource::new("gdp", "https://example.org/gdp", "GDP");
        assert_eq!(source.filename, "gdp");
    }
}
