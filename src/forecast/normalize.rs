//! Raw sales records → validated [`Series`]
//!
//! Records are `{ds, y}` JSON objects. Dates and values that cannot be parsed
//! become null cells; any row holding a null cell is dropped. The share of null
//! cells over the raw record set is kept for quality scoring.
//!
//! Values beyond [`MAX_ABS_VALUE`] count as null too, so sums and squares taken
//! downstream stay finite.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::ForecastError;
use crate::domain::{Observation, Series};

const DATE_FIELD: &str = "ds";
const VALUE_FIELD: &str = "y";

/// Largest accepted magnitude for demand and factor values
pub const MAX_ABS_VALUE: f64 = 1e100;

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

#[derive(Debug, Clone)]
pub struct NormalizedData {
    pub series: Series,
    /// Raw record index of every observation in `series`
    pub kept_rows: Vec<usize>,
    pub record_count: usize,
    /// Null cells (dates + values) over total cells, before rows were dropped
    pub missing_ratio: f64,
}

pub fn normalize(raw: &Value) -> Result<NormalizedData, ForecastError> {
    let records = raw
        .as_array()
        .ok_or_else(|| ForecastError::validation("sales_data must be an array of records"))?;
    if records.is_empty() {
        return Err(ForecastError::validation("sales_data must not be empty"));
    }

    let mut null_cells = 0usize;
    let mut rows = Vec::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        let fields = record.as_object().ok_or_else(|| {
            ForecastError::validation(format!("sales_data[{index}] is not an object"))
        })?;

        let date = fields.get(DATE_FIELD).and_then(Value::as_str).and_then(parse_date);
        let value = fields.get(VALUE_FIELD).and_then(parse_value);

        null_cells += usize::from(date.is_none()) + usize::from(value.is_none());

        if let (Some(date), Some(value)) = (date, value) {
            rows.push((index, Observation::new(date, value)));
        }
    }

    let record_count = records.len();
    let missing_ratio = null_cells as f64 / (record_count * 2) as f64;
    let (series, kept_rows) = Series::from_indexed(rows);

    if series.len() < record_count {
        tracing::debug!(
            records = record_count,
            kept = series.len(),
            "dropped invalid or duplicate sales records"
        );
    }

    Ok(NormalizedData {
        series,
        kept_rows,
        record_count,
        missing_ratio,
    })
}

/// Calendar date from a plain date, a naive datetime, or an RFC 3339 timestamp
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.date());
        }
    }
    DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive())
}

/// Numeric coercion: numbers and numeric strings, everything else is null
fn parse_value(raw: &Value) -> Option<f64> {
    let value = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    is_usable_value(value).then_some(value)
}

/// Finite and within [`MAX_ABS_VALUE`]
pub fn is_usable_value(value: f64) -> bool {
    value.is_finite() && value.abs() <= MAX_ABS_VALUE
}

/// Serde adapter accepting the same date spellings as sales records
pub fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid date: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("2024-03-05")]
    #[case("2024-03-05 13:45:00")]
    #[case("2024-03-05T13:45:00")]
    #[case("2024-03-05T13:45:00.250")]
    #[case("2024-03-05T13:45:00+02:00")]
    #[case(" 2024-03-05 ")]
    fn test_parse_date_formats(#[case] raw: &str) {
        assert_eq!(parse_date(raw), NaiveDate::from_ymd_opt(2024, 3, 5));
    }

    #[rstest]
    #[case("")]
    #[case("yesterday")]
    #[case("2024-13-01")]
    #[case("05/03/2024")]
    fn test_parse_date_rejects(#[case] raw: &str) {
        assert!(parse_date(raw).is_none());
    }

    #[test]
    fn test_normalize_coerces_and_drops() {
        let raw = json!([
            {"ds": "2024-01-03", "y": "12.5"},
            {"ds": "2024-01-01", "y": 10},
            {"ds": "not a date", "y": 4},
            {"ds": "2024-01-02", "y": "abc"},
            {"ds": "2024-01-04", "y": null},
            {"ds": "2024-01-05"},
        ]);

        let normalized = normalize(&raw).unwrap();
        assert_eq!(normalized.series.len(), 2);
        assert_eq!(normalized.series.values(), vec![10.0, 12.5]);
        assert_eq!(normalized.kept_rows, vec![1, 0]);
        assert_eq!(normalized.record_count, 6);
        // 1 bad date + 3 bad values over 12 cells
        assert!((normalized.missing_ratio - 4.0 / 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_huge_values_count_as_missing() {
        let raw = json!([
            {"ds": "2024-01-01", "y": 1e308},
            {"ds": "2024-01-02", "y": "-1e200"},
            {"ds": "2024-01-03", "y": 1e100},
            {"ds": "2024-01-04", "y": 3},
        ]);
        let normalized = normalize(&raw).unwrap();
        assert_eq!(normalized.series.values(), vec![1e100, 3.0]);
        assert_eq!(normalized.kept_rows, vec![2, 3]);
        assert!((normalized.missing_ratio - 2.0 / 8.0).abs() < 1e-12);
        assert!(normalized.series.values().iter().sum::<f64>().is_finite());
    }

    #[test]
    fn test_normalize_clean_input_has_no_missing() {
        let raw = json!([
            {"ds": "2024-01-01", "y": 1},
            {"ds": "2024-01-02", "y": 2.5},
        ]);
        let normalized = normalize(&raw).unwrap();
        assert_eq!(normalized.missing_ratio, 0.0);
        assert_eq!(normalized.series.len(), 2);
    }

    #[rstest]
    #[case(json!([]))]
    #[case(json!({"ds": "2024-01-01", "y": 1}))]
    #[case(json!("2024-01-01"))]
    #[case(json!([{"ds": "2024-01-01", "y": 1}, 42]))]
    fn test_normalize_rejects_malformed(#[case] raw: Value) {
        assert!(matches!(normalize(&raw), Err(ForecastError::Validation(_))));
    }

    #[test]
    fn test_all_rows_invalid_yields_empty_series() {
        let raw = json!([{"ds": "nope", "y": "nope"}]);
        let normalized = normalize(&raw).unwrap();
        assert!(normalized.series.is_empty());
        assert_eq!(normalized.missing_ratio, 1.0);
    }

    #[test]
    fn test_deserialize_date_adapter() {
        #[derive(Deserialize)]
        struct Row {
            #[serde(deserialize_with = "deserialize_date")]
            date: NaiveDate,
        }
        let row: Row = serde_json::from_value(json!({"date": "2024-06-01T00:00:00"})).unwrap();
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert!(serde_json::from_value::<Row>(json!({"date": "june"})).is_err());
    }
}
