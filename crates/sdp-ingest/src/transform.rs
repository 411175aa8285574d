//! Long-to-wide transform
//!
//! Reshapes cleaned long-form observations (one row per country and year)
//! into a [`WideTable`] (one row per country, one column per year). The
//! cleaning rules are deliberately forgiving: coercion failures become
//! missing values, and rows without a country code or year are dropped
//! rather than rejected.

use crate::error::TransformError;
use sdp_common::{WideRow, WideTable};
use serde_json::Value;
use std::collections::BTreeMap;

/// One long-form observation, before pivoting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorObservation {
    pub country_code: String,
    pub country_name: String,
    pub indicator_code: String,
    pub indicator_name: String,

    /// `None` when the source year did not coerce to a number
    pub year: Option<f64>,

    /// `None` for missing observations or values that did not coerce
    pub value: Option<f64>,
}

/// Coerce a JSON value to a number; unparseable input yields `None`, never
/// an error.
pub fn coerce_numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Pivot long observations into a wide table.
///
/// Rows with an empty country code or a missing year are dropped first; the
/// survivors are stable-sorted by (country code, year). Output rows are keyed
/// by the full (code, name, indicator code, indicator name) tuple in
/// lexicographic order, with one column per distinct year seen in the input.
///
/// Fails with [`TransformError::DuplicateObservation`] when two observations
/// land in the same cell, and [`TransformError::NoValidRows`] when cleaning
/// leaves nothing — both mean the *source* is skipped, not the batch.
pub fn pivot_wide(
    mut observations: Vec<IndicatorObservation>,
) -> Result<WideTable, TransformError> {
    observations.retain(|o| !o.country_code.is_empty() && o.year.is_some());
    if observations.is_empty() {
        return Err(TransformError::NoValidRows);
    }

    observations.sort_by(|a, b| {
        a.country_code.cmp(&b.country_code).then_with(|| {
            a.year
                .unwrap_or_default()
                .total_cmp(&b.year.unwrap_or_default())
        })
    });

    let mut years: Vec<f64> = observations.iter().filter_map(|o| o.year).collect();
    years.sort_by(f64::total_cmp);
    years.dedup();

    type RowKey = (String, String, String, String);
    struct RowAccum {
        values: Vec<Option<f64>>,
        filled: Vec<bool>,
    }

    let mut cells: BTreeMap<RowKey, RowAccum> = BTreeMap::new();

    for observation in &observations {
        let year = observation.year.unwrap_or_default();
        let Ok(index) = years.binary_search_by(|y| y.total_cmp(&year)) else {
            continue;
        };

        let key = (
            observation.country_code.clone(),
            observation.country_name.clone(),
            observation.indicator_code.clone(),
            observation.indicator_name.clone(),
        );

        let accum = cells.entry(key).or_insert_with(|| RowAccum {
            values: vec![None; years.len()],
            filled: vec![false; years.len()],
        });

        if accum.filled[index] {
            return Err(TransformError::DuplicateObservation {
                country_code: observation.country_code.clone(),
                year: WideTable::year_label(year),
            });
        }
        accum.filled[index] = true;
        accum.values[index] = observation.value;
    }

    let rows = cells
        .into_iter()
        .map(|((country_code, country_name, indicator_code, indicator_name), accum)| WideRow {
            country_code,
            country_name,
            indicator_code,
            indicator_name,
            values: accum.values,
        })
        .collect();

    Ok(WideTable { years, rows })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn observation(code: &str, year: f64, value: Option<f64>) -> IndicatorObservation {
        IndicatorObservation {
            country_code: code.to_string(),
            country_name: format!("{code} name"),
            indicator_code: "IND".to_string(),
            indicator_name: "Indicator".to_string(),
            year: Some(year),
            value,
        }
    }

    #[test]
    fn test_coerce_numeric() {
        assert_eq!(coerce_numeric(&json!(42.5)), Some(42.5));
        assert_eq!(coerce_numeric(&json!("2019")), Some(2019.0));
        assert_eq!(coerce_numeric(&json!(" 3.5 ")), Some(3.5));
        assert_eq!(coerce_numeric(&json!("n/a")), None);
        assert_eq!(coerce_numeric(&json!(null)), None);
        assert_eq!(coerce_numeric(&json!({})), None);
    }

    #[test]
    fn test_one_row_per_country_one_column_per_year() {
        let table = pivot_wide(vec![
            observation("FRA", 2020.0, Some(1.0)),
            observation("FRA", 2019.0, Some(2.0)),
            observation("DEU", 2019.0, Some(3.0)),
        ])
        .unwrap();

        assert_eq!(table.years, vec![2019.0, 2020.0]);
        assert_eq!(table.len(), 2);
        // Lexicographic country order
        assert_eq!(table.rows[0].country_code, "DEU");
        assert_eq!(table.rows[1].country_code, "FRA");
        assert_eq!(table.rows[0].values, vec![Some(3.0), None]);
        assert_eq!(table.rows[1].values, vec![Some(2.0), Some(1.0)]);
    }

    #[test]
    fn test_drops_rows_without_country_or_year() {
        let mut missing_code = observation("", 2019.0, Some(1.0));
        missing_code.country_code = String::new();
        let missing_year = IndicatorObservation {
            year: None,
            ..observation("FRA", 0.0, Some(1.0))
        };

        let table = pivot_wide(vec![
            missing_code,
            missing_year,
            observation("FRA", 2019.0, Some(2.0)),
        ])
        .unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0].country_code, "FRA");
    }

    #[test]
    fn test_all_rows_invalid_is_no_valid_rows() {
        let err = pivot_wide(vec![IndicatorObservation::default()]).unwrap_err();
        assert!(matches!(err, TransformError::NoValidRows));

        let err = pivot_wide(Vec::new()).unwrap_err();
        assert!(matches!(err, TransformError::NoValidRows));
    }

    #[test]
    fn test_duplicate_cell_is_rejected() {
        let err = pivot_wide(vec![
            observation("FRA", 2019.0, Some(1.0)),
            observation("FRA", 2019.0, Some(2.0)),
        ])
        .unwrap_err();

        assert!(matches!(
            err,
            TransformError::DuplicateObservation { country_code, year }
                if country_code == "FRA" && year == "2019"
        ));
    }

    #[test]
    fn test_duplicate_detection_covers_missing_values() {
        // Two None values in the same cell are still a duplicate: the pivot
        // key is violated regardless of what the cells hold.
        let err = pivot_wide(vec![
            observation("FRA", 2019.0, None),
            observation("FRA", 2019.0, None),
        ])
        .unwrap_err();

        assert!(matches!(err, TransformError::DuplicateObservation { .. }));
    }

    #[test]
    fn test_same_country_different_indicator_gets_its_own_row() {
        let mut second = observation("FRA", 2019.0, Some(2.0));
        second.indicator_code = "OTHER".to_string();

        let table = pivot_wide(vec![
            observation("FRA", 2019.0, Some(1.0)),
            second,
        ])
        .unwrap();

        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_missing_combinations_are_none() {
        let table = pivot_wide(vec![
            observation("FRA", 2019.0, Some(1.0)),
            observation("DEU", 2020.0, Some(2.0)),
        ])
        .unwrap();

        assert_eq!(table.rows[0].values, vec![None, Some(2.0)]);
        assert_eq!(table.rows[1].values, vec![Some(1.0), None]);
    }
}
