//! Event payload values and sanitization
//!
//! Callers hand over arbitrary [`RawValue`] trees. At track time they are
//! reduced to [`EventValue`], the bounded shape that is buffered and sent:
//! - leaves are string, finite number, boolean or null
//! - arrays keep at most [`MAX_ARRAY_LEN`] elements
//! - opaque values (callbacks, handles) are dropped
//! - containers nested deeper than [`MAX_NESTING_DEPTH`] are dropped
//!
//! Sanitization never fails.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Arrays are cut to this many elements
pub const MAX_ARRAY_LEN: usize = 10;

/// Deepest container level kept (top-level values are level 1)
pub const MAX_NESTING_DEPTH: usize = 5;

/// Sanitized payload stored on an [`super::Event`]
pub type EventData = BTreeMap<String, EventValue>;

/// Caller-supplied payload, sanitized by [`sanitize`]
pub type RawEventData = BTreeMap<String, RawValue>;

/// A value that can be buffered and serialized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<EventValue>),
    Object(BTreeMap<String, EventValue>),
}

impl EventValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            EventValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EventValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            EventValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[EventValue]> {
        match self {
            EventValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, EventValue::Null)
    }
}

/// Untrusted payload value as handed to `track`
#[derive(Clone)]
pub enum RawValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<RawValue>),
    Object(BTreeMap<String, RawValue>),
    /// A value with no data representation, such as a callback. Never stored.
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl RawValue {
    /// Wrap a non-serializable value (closure, handle, ...)
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        RawValue::Opaque(Arc::new(value))
    }
}

impl fmt::Debug for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Null => write!(f, "Null"),
            RawValue::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            RawValue::Number(n) => f.debug_tuple("Number").field(n).finish(),
            RawValue::String(s) => f.debug_tuple("String").field(s).finish(),
            RawValue::Array(items) => f.debug_tuple("Array").field(items).finish(),
            RawValue::Object(map) => f.debug_tuple("Object").field(map).finish(),
            RawValue::Opaque(_) => write!(f, "Opaque(..)"),
        }
    }
}

impl From<serde_json::Value> for RawValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => RawValue::Null,
            Value::Bool(b) => RawValue::Bool(b),
            Value::Number(n) => n.as_f64().map(RawValue::Number).unwrap_or(RawValue::Null),
            Value::String(s) => RawValue::String(s),
            Value::Array(items) => RawValue::Array(items.into_iter().map(RawValue::from).collect()),
            Value::Object(map) => {
                RawValue::Object(map.into_iter().map(|(k, v)| (k, RawValue::from(v))).collect())
            }
        }
    }
}

impl From<EventValue> for RawValue {
    fn from(value: EventValue) -> Self {
        match value {
            EventValue::Null => RawValue::Null,
            EventValue::Bool(b) => RawValue::Bool(b),
            EventValue::Number(n) => RawValue::Number(n),
            EventValue::String(s) => RawValue::String(s),
            EventValue::Array(items) => RawValue::Array(items.into_iter().map(RawValue::from).collect()),
            EventValue::Object(map) => {
                RawValue::Object(map.into_iter().map(|(k, v)| (k, RawValue::from(v))).collect())
            }
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::String(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::String(value)
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        RawValue::Bool(value)
    }
}

macro_rules! raw_number_from {
    ($($t:ty),*) => {
        $(impl From<$t> for RawValue {
            fn from(value: $t) -> Self {
                RawValue::Number(value as f64)
            }
        })*
    };
}

raw_number_from!(f64, f32, i64, i32, u64, u32, u8, usize);

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RawValue::Null)
    }
}

impl<T: Into<RawValue>> From<Vec<T>> for RawValue {
    fn from(value: Vec<T>) -> Self {
        RawValue::Array(value.into_iter().map(Into::into).collect())
    }
}

/// Build a payload from key/value pairs
pub fn raw_data<K, V, I>(pairs: I) -> RawEventData
where
    K: Into<String>,
    V: Into<RawValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

/// Reduce a caller payload to its storable shape
pub fn sanitize(raw: RawEventData) -> EventData {
    raw.into_iter()
        .filter_map(|(key, value)| sanitize_value(value, 1).map(|v| (key, v)))
        .collect()
}

fn sanitize_value(value: RawValue, depth: usize) -> Option<EventValue> {
    match value {
        RawValue::Null => Some(EventValue::Null),
        RawValue::Bool(b) => Some(EventValue::Bool(b)),
        // JSON has no NaN/Infinity
        RawValue::Number(n) if n.is_finite() => Some(EventValue::Number(n)),
        RawValue::Number(_) => Some(EventValue::Null),
        RawValue::String(s) => Some(EventValue::String(s)),
        RawValue::Opaque(_) => None,
        RawValue::Array(_) | RawValue::Object(_) if depth > MAX_NESTING_DEPTH => None,
        RawValue::Array(items) => Some(EventValue::Array(
            items
                .into_iter()
                .take(MAX_ARRAY_LEN)
                .filter_map(|item| sanitize_value(item, depth + 1))
                .collect(),
        )),
        RawValue::Object(map) => Some(EventValue::Object(
            map.into_iter()
                .filter_map(|(key, v)| sanitize_value(v, depth + 1).map(|v| (key, v)))
                .collect(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_opaque_value_key_is_removed() {
        let raw = raw_data([
            ("lesson", RawValue::from("story-3")),
            ("onComplete", RawValue::opaque(|| println!("done"))),
        ]);

        let data = sanitize(raw);

        assert_eq!(data.len(), 1);
        assert!(!data.contains_key("onComplete"));
        assert_eq!(data["lesson"], EventValue::String("story-3".to_string()));
    }

    #[test]
    fn test_long_array_keeps_first_ten_in_order() {
        let raw = raw_data([("clues", RawValue::from((0..25).collect::<Vec<i32>>()))]);

        let data = sanitize(raw);
        let clues = data["clues"].as_array().expect("array kept");

        assert_eq!(clues.len(), MAX_ARRAY_LEN);
        for (i, clue) in clues.iter().enumerate() {
            assert_eq!(clue.as_f64(), Some(i as f64));
        }
    }

    #[test]
    fn test_short_array_untouched() {
        let data = sanitize(raw_data([("tags", RawValue::from(vec!["a", "b"]))]));
        assert_eq!(data["tags"].as_array().map(|a| a.len()), Some(2));
    }

    #[test]
    fn test_non_finite_numbers_become_null() {
        let data = sanitize(raw_data([("score", f64::NAN), ("speed", f64::INFINITY), ("ok", 1.5)]));
        assert!(data["score"].is_null());
        assert!(data["speed"].is_null());
        assert_eq!(data["ok"].as_f64(), Some(1.5));
    }

    #[test]
    fn test_nested_object_passes_through() {
        let raw = raw_data([(
            "video",
            RawValue::from(json!({"id": "v1", "watched": true, "marks": [1, 2, 3]})),
        )]);

        let data = sanitize(raw);

        let expected: EventValue = serde_json::from_value(json!({
            "id": "v1", "watched": true, "marks": [1.0, 2.0, 3.0]
        }))
        .unwrap();
        assert_eq!(data["video"], expected);
    }

    #[test]
    fn test_deep_nesting_is_cut() {
        // 8 levels of nesting
        let mut value = json!("leaf");
        for _ in 0..8 {
            value = json!({ "inner": value });
        }

        let data = sanitize(raw_data([("deep", RawValue::from(value))]));

        let mut depth = 0;
        let mut cursor = data.get("deep");
        while let Some(EventValue::Object(map)) = cursor {
            depth += 1;
            cursor = map.get("inner");
        }
        assert_eq!(depth, MAX_NESTING_DEPTH);
        assert!(cursor.is_none());
    }

    #[test]
    fn test_opaque_inside_array_is_skipped() {
        let raw = raw_data([(
            "mixed",
            RawValue::Array(vec![RawValue::from(1), RawValue::opaque(42u8), RawValue::from("x")]),
        )]);

        let data = sanitize(raw);
        assert_eq!(data["mixed"].as_array().map(|a| a.len()), Some(2));
    }

    #[test]
    fn test_event_value_serializes_as_plain_json() {
        let data = sanitize(raw_data([
            ("a", RawValue::Null),
            ("b", RawValue::from(true)),
            ("c", RawValue::from("text")),
        ]));
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json, json!({"a": null, "b": true, "c": "text"}));
    }
}
