//! Wide indicator table
//!
//! The pivoted form of ingested indicator data: one row per country, one
//! column per observed year. This is the shape written to raw CSV files by
//! the ingestion stage and read back by the database loader, so both the
//! writer and the reader live here.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// The fixed leading columns of every wide table.
pub const KEY_COLUMNS: [&str; 4] = [
    "Country Code",
    "Country Name",
    "Indicator Code",
    "Indicator Name",
];

/// Errors raised while reading or writing wide tables
#[derive(Error, Debug)]
pub enum TableError {
    /// CSV-level read failure
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// CSV-level write failure
    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Plain I/O failure
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Header row does not start with the expected key columns
    #[error("'{path}' does not start with the expected key columns (Country Code, Country Name, Indicator Code, Indicator Name)")]
    MissingKeyColumns { path: PathBuf },

    /// A trailing header column is not a numeric year
    #[error("'{path}' has a non-numeric year column '{column}'")]
    BadYearColumn { path: PathBuf, column: String },

    /// A data cell could not be parsed as a number
    #[error("'{path}' row {row}: cannot parse '{value}' in column '{column}' as a number")]
    BadCell {
        path: PathBuf,
        row: usize,
        column: String,
        value: String,
    },
}

/// One row of a wide table: a country's values across all observed years.
#[derive(Debug, Clone, PartialEq)]
pub struct WideRow {
    pub country_code: String,
    pub country_name: String,
    pub indicator_code: String,
    pub indicator_name: String,

    /// Parallel to [`WideTable::years`]; `None` marks a missing observation
    pub values: Vec<Option<f64>>,
}

/// A pivoted indicator table: one row per country, one column per year.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WideTable {
    /// Distinct observed years, ascending
    pub years: Vec<f64>,

    /// Rows in (country code, country name, indicator code, indicator name)
    /// order
    pub rows: Vec<WideRow>,
}

impl WideTable {
    /// Render a year as a column label; integral years drop the fraction
    /// ("2019", not "2019.0").
    pub fn year_label(year: f64) -> String {
        if year.fract() == 0.0 && year.abs() < 1e15 {
            format!("{}", year as i64)
        } else {
            year.to_string()
        }
    }

    /// Full header row: key columns followed by one label per year
    pub fn headers(&self) -> Vec<String> {
        KEY_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(self.years.iter().map(|y| Self::year_label(*y)))
            .collect()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the table holds no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write the table as UTF-8 CSV with a header row and no index column.
    /// Missing observations are written as empty fields.
    pub fn write_csv(&self, path: &Path) -> Result<(), TableError> {
        let mut writer = csv::Writer::from_path(path).map_err(|source| TableError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        writer
            .write_record(self.headers())
            .map_err(|source| TableError::Write {
                path: path.to_path_buf(),
                source,
            })?;

        for row in &self.rows {
            let record: Vec<String> = [
                row.country_code.clone(),
                row.country_name.clone(),
                row.indicator_code.clone(),
                row.indicator_name.clone(),
            ]
            .into_iter()
            .chain(
                row.values
                    .iter()
                    .map(|v| v.map(|n| n.to_string()).unwrap_or_default()),
            )
            .collect();

            writer
                .write_record(&record)
                .map_err(|source| TableError::Write {
                    path: path.to_path_buf(),
                    source,
                })?;
        }

        writer.flush().map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read a table back from the CSV layout produced by [`write_csv`].
    ///
    /// The first four header columns must be the key columns; every further
    /// header must parse as a numeric year. Empty cells read as `None`.
    ///
    /// [`write_csv`]: WideTable::write_csv
    pub fn read_csv(path: &Path) -> Result<Self, TableError> {
        let mut reader = csv::Reader::from_path(path).map_err(|source| TableError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let headers = reader
            .headers()
            .map_err(|source| TableError::Read {
                path: path.to_path_buf(),
                source,
            })?
            .clone();

        if headers.len() < KEY_COLUMNS.len()
            || !KEY_COLUMNS
                .iter()
                .zip(headers.iter())
                .all(|(expected, actual)| *expected == actual)
        {
            return Err(TableError::MissingKeyColumns {
                path: path.to_path_buf(),
            });
        }

        let mut years = Vec::with_capacity(headers.len() - KEY_COLUMNS.len());
        for column in headers.iter().skip(KEY_COLUMNS.len()) {
            let year = column
                .trim()
                .parse::<f64>()
                .map_err(|_| TableError::BadYearColumn {
                    path: path.to_path_buf(),
                    column: column.to_string(),
                })?;
            years.push(year);
        }

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record.map_err(|source| TableError::Read {
                path: path.to_path_buf(),
                source,
            })?;

            let field = |i: usize| record.get(i).unwrap_or_default().to_string();

            let mut values = Vec::with_capacity(years.len());
            for (offset, year) in years.iter().enumerate() {
                let cell = record.get(KEY_COLUMNS.len() + offset).unwrap_or_default();
                if cell.is_empty() {
                    values.push(None);
                } else {
                    let value = cell.parse::<f64>().map_err(|_| TableError::BadCell {
                        path: path.to_path_buf(),
                        row: index + 1,
                        column: Self::year_label(*year),
                        value: cell.to_string(),
                    })?;
                    values.push(Some(value));
                }
            }

            rows.push(WideRow {
                country_code: field(0),
                country_name: field(1),
                indicator_code: field(2),
                indicator_name: field(3),
                values,
            });
        }

        Ok(Self { years, rows })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_table() -> WideTable {
        WideTable {
            years: vec![2019.0, 2020.0, 2021.0],
            rows: vec![
                WideRow {
                    country_code: "FRA".to_string(),
                    country_name: "France".to_string(),
                    indicator_code: "EG.ELC.NUCL.ZS".to_string(),
                    indicator_name: "Nuclear share".to_string(),
                    values: vec![Some(70.6), None, Some(69.0)],
                },
                WideRow {
                    country_code: "NOR".to_string(),
                    country_name: "Norway".to_string(),
                    indicator_code: "EG.ELC.NUCL.ZS".to_string(),
                    indicator_name: "Nuclear share".to_string(),
                    values: vec![Some(0.0), Some(0.0), None],
                },
            ],
        }
    }

    #[test]
    fn test_year_label() {
        assert_eq!(WideTable::year_label(2019.0), "2019");
        assert_eq!(WideTable::year_label(-5.0), "-5");
        assert_eq!(WideTable::year_label(2019.5), "2019.5");
    }

    #[test]
    fn test_headers() {
        let table = sample_table();
        assert_eq!(
            table.headers(),
            vec![
                "Country Code",
                "Country Name",
                "Indicator Code",
                "Indicator Name",
                "2019",
                "2020",
                "2021"
            ]
        );
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nuclear.csv");

        let table = sample_table();
        table.write_csv(&path).unwrap();

        let restored = WideTable::read_csv(&path).unwrap();
        assert_eq!(restored.years, table.years);
        assert_eq!(restored.len(), table.len());
        assert_eq!(restored, table);
    }

    #[test]
    fn test_missing_cells_read_as_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.csv");

        sample_table().write_csv(&path).unwrap();
        let restored = WideTable::read_csv(&path).unwrap();
        assert_eq!(restored.rows[0].values[1], None);
        assert_eq!(restored.rows[1].values[2], None);
    }

    #[test]
    fn test_rejects_unexpected_key_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "Code,Name,2019\nFRA,France,1.0\n").unwrap();

        let err = WideTable::read_csv(&path).unwrap_err();
        assert!(matches!(err, TableError::MissingKeyColumns { .. }));
    }

    #[test]
    fn test_rejects_non_numeric_year_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad_year.csv");
        std::fs::write(
            &path,
            "Country Code,Country Name,Indicator Code,Indicator Name,latest\nFRA,France,X,Y,1.0\n",
        )
        .unwrap();

        let err = WideTable::read_csv(&path).unwrap_err();
        assert!(matches!(err, TableError::BadYearColumn { .. }));
    }

    #[test]
    fn test_rejects_unparseable_cell() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad_cell.csv");
        std::fs::write(
            &path,
            "Country Code,Country Name,Indicator Code,Indicator Name,2019\nFRA,France,X,Y,n/a\n",
        )
        .unwrap();

        let err = WideTable::read_csv(&path).unwrap_err();
        assert!(matches!(err, TableError::BadCell { row: 1, .. }));
    }
}
