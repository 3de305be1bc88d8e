//! Documents handed to the store
//!
//! A [`Document`] is an insertion-ordered map from field name to value. Field
//! order is part of the contract, so the map keeps declaration order.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// An ordered mapping of field name to value
pub type Document = serde_json::Map<String, Value>;

/// Build a document from `(name, value)` pairs, keeping their order
pub fn doc<I, K>(pairs: I) -> Document
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// The store's native date representation: milliseconds since the Unix epoch
pub fn date_value(timestamp: &DateTime<Utc>) -> Value {
    Value::from(timestamp.timestamp_millis())
}

/// Convert an optional string, using `""` when absent
pub fn string_or_empty(value: Option<&str>) -> Value {
    Value::String(value.unwrap_or_default().to_string())
}

/// Convert an optional string, using null when absent
pub fn string_or_null(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |v| Value::String(v.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_doc_keeps_order() {
        let d = doc([("z", json!(1)), ("a", json!(2)), ("m", json!(3))]);
        let keys: Vec<&str> = d.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_date_value() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(date_value(&ts), json!(1_704_164_645_000i64));
    }

    #[test]
    fn test_optional_strings() {
        assert_eq!(string_or_empty(None), json!(""));
        assert_eq!(string_or_null(None), Value::Null);
        assert_eq!(string_or_null(Some("x")), json!("x"));
    }
}
