//! Fallbacks applied to raw aggregation rows.
//!
//! Absent group keys become [`UNKNOWN`]; absent or non-numeric aggregates
//! become `0`. Every task reads its rows through these helpers.

use mongodb::bson::{Bson, Document};

/// Label value published for a missing, null or empty group key.
pub const UNKNOWN: &str = "unknown";

/// Numeric field of a row, or 0.
pub fn number(row: &Document, field: &str) -> f64 {
    match row.get(field) {
        Some(Bson::Int32(n)) => f64::from(*n),
        Some(Bson::Int64(n)) => *n as f64,
        Some(Bson::Double(n)) if n.is_finite() => *n,
        _ => 0.0,
    }
}

/// Numeric field of the single row an `_id: null` group produces, or 0 when
/// the collection was empty.
pub fn scalar(rows: &[Document], field: &str) -> f64 {
    rows.first().map_or(0.0, |row| number(row, field))
}

/// Label value for a group key.
pub fn label(key: Option<&Bson>) -> String {
    match key {
        None | Some(Bson::Null | Bson::Undefined) => UNKNOWN.to_string(),
        Some(Bson::String(s)) if s.is_empty() => UNKNOWN.to_string(),
        Some(Bson::String(s)) => s.clone(),
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(other) => other.to_string(),
    }
}

/// `(label, value)` series for rows grouped on `_id`.
///
/// Distinct raw keys can collapse onto the same label (null and missing both
/// become `unknown`); their values are summed so no series is lost.
pub fn grouped(rows: &[Document], field: &str) -> Vec<(Vec<String>, f64)> {
    let mut series: Vec<(Vec<String>, f64)> = Vec::with_capacity(rows.len());
    for row in rows {
        let key = label(row.get("_id"));
        let value = number(row, field);
        match series.iter_mut().find(|(labels, _)| labels[0] == key) {
            Some((_, total)) => *total += value,
            None => series.push((vec![key], value)),
        }
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn missing_keys_become_unknown() {
        assert_eq!(label(None), UNKNOWN);
        assert_eq!(label(Some(&Bson::Null)), UNKNOWN);
        assert_eq!(label(Some(&Bson::String(String::new()))), UNKNOWN);
        assert_eq!(label(Some(&Bson::String("openai".into()))), "openai");
    }

    #[test]
    fn empty_result_is_zero() {
        assert_eq!(scalar(&[], "total"), 0.0);
        assert_eq!(scalar(&[doc! { "avg": Bson::Null }], "avg"), 0.0);
        assert_eq!(scalar(&[doc! { "total": 7_i64 }], "total"), 7.0);
    }

    #[test]
    fn null_and_empty_keys_merge_under_unknown() {
        let rows = vec![
            doc! { "_id": Bson::Null, "count": 2 },
            doc! { "_id": "", "count": 3 },
            doc! { "_id": "local", "count": 1 },
        ];
        assert_eq!(
            grouped(&rows, "count"),
            vec![(vec![UNKNOWN.to_string()], 5.0), (vec!["local".to_string()], 1.0)]
        );
    }
}
