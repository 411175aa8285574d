//! Response envelope handling
//!
//! Paginated statistics APIs wrap their record lists in different envelope
//! shapes. Rather than sniffing the decoded body at runtime, the page client
//! is configured with an explicit [`Envelope`] strategy per source, which
//! keeps the extraction path auditable.

use serde_json::Value;
use thiserror::Error;

/// How to locate the record list inside a decoded response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// The record list sits under a named top-level key
    ExplicitKey(String),

    /// A two-element array: `[metadata-object, records-array]`. The metadata
    /// object's `pages` field declares the total page count. Bodies that do
    /// not match this shape are treated as a bare record list, since some
    /// providers mix both shapes across endpoints.
    MetadataThenData,

    /// The body itself is the record list
    Raw,
}

impl Default for Envelope {
    /// The metadata-then-data convention is the default because the
    /// configured provider (World Bank v2) uses it everywhere.
    fn default() -> Self {
        Envelope::MetadataThenData
    }
}

/// Extraction failures, mapped onto [`FetchError`] by the page client.
///
/// [`FetchError`]: crate::error::FetchError
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("data key '{0}' not found in response")]
    MissingKey(String),

    #[error("expected a JSON array of records, got {0}")]
    NotAnArray(&'static str),
}

/// Pull the record list for one page out of a decoded body.
pub fn extract_records(body: &Value, envelope: &Envelope) -> Result<Vec<Value>, ExtractError> {
    match envelope {
        Envelope::ExplicitKey(key) => {
            let value = body
                .get(key)
                .ok_or_else(|| ExtractError::MissingKey(key.clone()))?;
            as_records(value)
        },
        Envelope::MetadataThenData => match body.as_array() {
            Some(parts) if parts.len() == 2 && parts[1].is_array() => as_records(&parts[1]),
            _ => as_records(body),
        },
        Envelope::Raw => as_records(body),
    }
}

/// Total-page count declared by this page's body, if any.
///
/// For [`Envelope::MetadataThenData`] the count comes from the metadata
/// object's `pages` field, defaulting to 1 when the object has no such field
/// (a metadata object without it means a single-page response). A bare array
/// of record objects is read the same way: its first element counts as the
/// metadata object, so such responses terminate after one page. For the other
/// strategies the named key, when configured, is searched for anywhere in the
/// body via [`find_key`].
pub fn total_pages_hint(
    body: &Value,
    envelope: &Envelope,
    total_pages_key: Option<&str>,
) -> Option<u32> {
    match envelope {
        Envelope::MetadataThenData => {
            let metadata = body.as_array()?.first()?.as_object()?;
            Some(metadata.get("pages").and_then(as_page_count).unwrap_or(1))
        },
        Envelope::ExplicitKey(_) | Envelope::Raw => {
            let key = total_pages_key?;
            as_page_count(find_key(body, key)?)
        },
    }
}

/// Depth-first search for `key` in nested JSON objects.
///
/// Descends into object values only, never into arrays, so a key nested
/// under a list of objects will not be found. When the key occurs under
/// several siblings at the same depth, which match is returned is
/// unspecified; callers should supply keys that are unambiguous in the
/// provider's response shape.
pub fn find_key<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let map = value.as_object()?;
    if let Some(found) = map.get(key) {
        return Some(found);
    }
    map.values().find_map(|child| find_key(child, key))
}

fn as_records(value: &Value) -> Result<Vec<Value>, ExtractError> {
    value
        .as_array()
        .cloned()
        .ok_or_else(|| ExtractError::NotAnArray(json_type_name(value)))
}

/// Page counts arrive as JSON numbers or numeric strings depending on the
/// provider.
fn as_page_count(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_explicit_key_extraction() {
        let body = json!({"meta": {"pages": 3}, "items": [{"id": 1}, {"id": 2}]});
        let records =
            extract_records(&body, &Envelope::ExplicitKey("items".to_string())).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["id"], 1);
    }

    #[test]
    fn test_explicit_key_missing() {
        let body = json!({"data": []});
        let err = extract_records(&body, &Envelope::ExplicitKey("items".to_string())).unwrap_err();
        assert!(matches!(err, ExtractError::MissingKey(key) if key == "items"));
    }

    #[test]
    fn test_explicit_key_non_array_value() {
        let body = json!({"items": {"id": 1}});
        let err = extract_records(&body, &Envelope::ExplicitKey("items".to_string())).unwrap_err();
        assert!(matches!(err, ExtractError::NotAnArray("an object")));
    }

    #[test]
    fn test_metadata_then_data_extraction() {
        let body = json!([{"page": 1, "pages": 7}, [{"v": 1}, {"v": 2}, {"v": 3}]]);
        let records = extract_records(&body, &Envelope::MetadataThenData).unwrap();
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_metadata_then_data_falls_back_to_bare_array() {
        let body = json!([{"v": 1}, {"v": 2}, {"v": 3}]);
        let records = extract_records(&body, &Envelope::MetadataThenData).unwrap();
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_raw_extraction() {
        let body = json!([1, 2, 3]);
        let records = extract_records(&body, &Envelope::Raw).unwrap();
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_raw_rejects_object_body() {
        let body = json!({"rows": []});
        let err = extract_records(&body, &Envelope::Raw).unwrap_err();
        assert!(matches!(err, ExtractError::NotAnArray("an object")));
    }

    #[test]
    fn test_total_pages_from_metadata() {
        let body = json!([{"page": 1, "pages": 12, "total": 1200}, [{}]]);
        assert_eq!(
            total_pages_hint(&body, &Envelope::MetadataThenData, None),
            Some(12)
        );
    }

    #[test]
    fn test_total_pages_metadata_defaults_to_one() {
        let body = json!([{"page": 1}, [{}]]);
        assert_eq!(
            total_pages_hint(&body, &Envelope::MetadataThenData, None),
            Some(1)
        );
    }

    #[test]
    fn test_total_pages_bare_object_array_defaults_to_one() {
        // A bare array of record objects has no metadata; the provider
        // convention treats such responses as single-page.
        let body = json!([{"v": 1}]);
        assert_eq!(
            total_pages_hint(&body, &Envelope::MetadataThenData, None),
            Some(1)
        );
    }

    #[test]
    fn test_total_pages_absent_for_scalar_array() {
        let body = json!([1, 2, 3]);
        assert_eq!(
            total_pages_hint(&body, &Envelope::MetadataThenData, None),
            None
        );
    }

    #[test]
    fn test_total_pages_by_key_search() {
        let body = json!({"pagination": {"total_pages": "9"}, "items": []});
        assert_eq!(
            total_pages_hint(
                &body,
                &Envelope::ExplicitKey("items".to_string()),
                Some("total_pages")
            ),
            Some(9)
        );
    }

    #[test]
    fn test_total_pages_requires_configured_key() {
        let body = json!({"total_pages": 4, "items": []});
        assert_eq!(
            total_pages_hint(&body, &Envelope::ExplicitKey("items".to_string()), None),
            None
        );
    }

    #[test]
    fn test_find_key_top_level() {
        let body = json!({"pages": 5});
        assert_eq!(find_key(&body, "pages"), Some(&json!(5)));
    }

    #[test]
    fn test_find_key_nested() {
        let body = json!({"meta": {"paging": {"pages": 5}}});
        assert_eq!(find_key(&body, "pages"), Some(&json!(5)));
    }

    #[test]
    fn test_find_key_does_not_descend_into_arrays() {
        let body = json!({"results": [{"pages": 5}]});
        assert_eq!(find_key(&body, "pages"), None);
    }

    #[test]
    fn test_find_key_prefers_shallower_match() {
        let body = json!({"pages": 2, "meta": {"pages": 9}});
        assert_eq!(find_key(&body, "pages"), Some(&json!(2)));
    }

    #[test]
    fn test_page_count_coercion() {
        assert_eq!(as_page_count(&json!(7)), Some(7));
        assert_eq!(as_page_count(&json!(7.0)), Some(7));
        assert_eq!(as_page_count(&json!("7")), Some(7));
        assert_eq!(as_page_count(&json!(" 7 ")), Some(7));
        assert_eq!(as_page_count(&json!(null)), None);
        assert_eq!(as_page_count(&json!([7])), None);
    }
}
