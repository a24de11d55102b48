//! Firestore REST document and typed value representation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::IgnoredAny;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A stored document as returned by the REST API.
pub struct Document {
    /// Full resource name, `projects/{p}/databases/{d}/documents/{collection}/{id}`.
    pub name: String,
    /// Top level fields.
    #[serde(default)]
    pub fields: HashMap<String, Value>,
    /// Last write time, changes on every update.
    #[serde(default)]
    pub update_time: Option<String>,
}

impl Document {
    /// Last path segment of the resource name.
    #[must_use]
    pub fn id(&self) -> &str {
        document_id(&self.name)
    }

    /// Look up a top level field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "fractional readings are truncated and range checked by the caller"
)]
fn truncate(number: f64) -> i64 {
    number.trunc() as i64
}

/// Last path segment of a resource name.
#[must_use]
pub fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A typed Firestore value. Exactly one variant key is present in the JSON.
pub enum Value {
    /// `null`.
    NullValue(IgnoredAny),
    /// Boolean.
    BooleanValue(bool),
    /// 64-bit integer, transported as a decimal string.
    IntegerValue(String),
    /// Floating point number.
    DoubleValue(f64),
    /// RFC 3339 timestamp.
    TimestampValue(String),
    /// UTF-8 text.
    StringValue(String),
    /// Base64 encoded bytes.
    BytesValue(String),
    /// Resource name of another document.
    ReferenceValue(String),
    /// Latitude/longitude pair.
    GeoPointValue(IgnoredAny),
    /// Nested list.
    ArrayValue(ArrayValue),
    /// Nested map.
    MapValue(MapValue),
}

#[derive(Debug, Clone, Default, Deserialize)]
/// Contents of an `arrayValue`.
pub struct ArrayValue {
    /// Elements; omitted by the API when empty.
    #[serde(default)]
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
/// Contents of a `mapValue`.
pub struct MapValue {
    /// Entries; omitted by the API when empty.
    #[serde(default)]
    pub fields: HashMap<String, Value>,
}

impl Value {
    /// Short name of the stored type, for error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::NullValue(_) => "null",
            Value::BooleanValue(_) => "boolean",
            Value::IntegerValue(_) => "integer",
            Value::DoubleValue(_) => "double",
            Value::TimestampValue(_) => "timestamp",
            Value::StringValue(_) => "string",
            Value::BytesValue(_) => "bytes",
            Value::ReferenceValue(_) => "reference",
            Value::GeoPointValue(_) => "geo point",
            Value::ArrayValue(_) => "array",
            Value::MapValue(_) => "map",
        }
    }

    /// Whole number view of integer and double values. Doubles are truncated.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::IntegerValue(raw) => raw.parse().ok(),
            Value::DoubleValue(number) if number.is_finite() => Some(truncate(*number)),
            _ => None,
        }
    }

    /// Text view of strings, integers, and references (last path segment).
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::StringValue(text) | Value::IntegerValue(text) => Some(text.clone()),
            Value::ReferenceValue(name) => Some(document_id(name).to_owned()),
            _ => None,
        }
    }

    /// Point in time view of timestamps, RFC 3339 strings, and epoch milliseconds.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::TimestampValue(raw) | Value::StringValue(raw) => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|parsed| parsed.with_timezone(&Utc)),
            Value::IntegerValue(raw) => raw
                .parse()
                .ok()
                .and_then(DateTime::from_timestamp_millis),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn value(json: &str) -> Value {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn decodes_document_with_typed_fields() {
        let document: Document = serde_json::from_str(
            r#"{
                "name": "projects/smart-bins/databases/(default)/documents/notifications/abc",
                "fields": {
                    "trashLevel": {"integerValue": "95"},
                    "bin": {"stringValue": "B1"},
                    "datetime": {"timestampValue": "2025-03-01T08:00:05.123456Z"},
                    "location": {"geoPointValue": {"latitude": 14.6, "longitude": 121.0}},
                    "tags": {"arrayValue": {}},
                    "meta": {"mapValue": {"fields": {"battery": {"doubleValue": 0.8}}}},
                    "note": {"nullValue": null}
                },
                "createTime": "2025-03-01T08:00:06Z",
                "updateTime": "2025-03-01T08:00:06Z"
            }"#,
        )
        .unwrap();

        assert_eq!(document.id(), "abc");
        assert_eq!(document.update_time.as_deref(), Some("2025-03-01T08:00:06Z"));
        assert_eq!(document.field("trashLevel").and_then(Value::as_integer), Some(95));
        assert_eq!(document.field("bin").and_then(Value::as_text).as_deref(), Some("B1"));
        assert!(matches!(document.field("tags"), Some(Value::ArrayValue(array)) if array.values.is_empty()));
        assert_eq!(document.field("note").map(Value::kind), Some("null"));
    }

    #[test]
    fn integers_come_from_integer_and_double_values() {
        assert_eq!(value(r#"{"integerValue": "-3"}"#).as_integer(), Some(-3));
        assert_eq!(value(r#"{"doubleValue": 91.7}"#).as_integer(), Some(91));
        assert_eq!(value(r#"{"stringValue": "91"}"#).as_integer(), None);
        assert_eq!(value(r#"{"integerValue": "x"}"#).as_integer(), None);
    }

    #[test]
    fn text_comes_from_strings_integers_and_references() {
        assert_eq!(value(r#"{"integerValue": "7"}"#).as_text().as_deref(), Some("7"));
        assert_eq!(
            value(r#"{"referenceValue": "projects/p/databases/(default)/documents/bins/B7"}"#)
                .as_text()
                .as_deref(),
            Some("B7")
        );
        assert_eq!(value(r#"{"booleanValue": true}"#).as_text(), None);
    }

    #[test]
    fn timestamps_accept_three_encodings() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 5).unwrap();
        assert_eq!(
            value(r#"{"timestampValue": "2025-03-01T08:00:05Z"}"#).as_timestamp(),
            Some(expected)
        );
        assert_eq!(
            value(r#"{"stringValue": "2025-03-01T16:00:05+08:00"}"#).as_timestamp(),
            Some(expected)
        );
        assert_eq!(
            value(&format!(r#"{{"integerValue": "{}"}}"#, expected.timestamp_millis())).as_timestamp(),
            Some(expected)
        );
        assert_eq!(value(r#"{"stringValue": "yesterday"}"#).as_timestamp(), None);
    }
}
