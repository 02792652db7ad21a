//! Column value packing and type-checked unpacking.
//!
//! # Responsibility
//! - Convert typed field values into SQLite storage values and back.
//! - Store lists and maps as canonical JSON text.
//!
//! # Invariants
//! - Decoded JSON must match the declared shape; mismatches are errors,
//!   never replaced with an empty list or map.
//! - `Null` round-trips as SQL NULL for every declared kind.
//! - Map keys are written in sorted order.

use rusqlite::types::Value;
use serde::Serialize;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CodecResult<T> = Result<T, CodecError>;

/// Logical type a caller declares for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Integer,
    Text,
    /// Stored as integer `0`/`1`.
    Boolean,
    /// JSON array.
    List,
    /// JSON object.
    Map,
}

impl ColumnKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::List => "list",
            Self::Map => "map",
        }
    }

    pub const fn is_structured(self) -> bool {
        matches!(self, Self::List | Self::Map)
    }
}

impl Display for ColumnKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-memory value of one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Text(String),
    Boolean(bool),
    List(Vec<JsonValue>),
    Map(JsonMap<String, JsonValue>),
}

impl FieldValue {
    /// Returns the kind this value naturally packs as; `None` for `Null`.
    pub fn kind(&self) -> Option<ColumnKind> {
        match self {
            Self::Null => None,
            Self::Integer(_) => Some(ColumnKind::Integer),
            Self::Text(_) => Some(ColumnKind::Text),
            Self::Boolean(_) => Some(ColumnKind::Boolean),
            Self::List(_) => Some(ColumnKind::List),
            Self::Map(_) => Some(ColumnKind::Map),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[JsonValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&JsonMap<String, JsonValue>> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<JsonValue>> for FieldValue {
    fn from(value: Vec<JsonValue>) -> Self {
        Self::List(value)
    }
}

impl From<JsonMap<String, JsonValue>> for FieldValue {
    fn from(value: JsonMap<String, JsonValue>) -> Self {
        Self::Map(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Packing or unpacking failure.
#[derive(Debug)]
pub enum CodecError {
    /// Value variant does not fit the declared kind (write side).
    KindMismatch {
        declared: ColumnKind,
        found: ColumnKind,
    },
    /// Stored SQLite value class cannot be read as the declared kind.
    UnexpectedStorage {
        declared: ColumnKind,
        found: &'static str,
    },
    /// Stored structured value is not valid JSON.
    Malformed {
        declared: ColumnKind,
        source: serde_json::Error,
    },
    /// Stored JSON decoded to a different shape than declared.
    ShapeMismatch {
        declared: ColumnKind,
        found: &'static str,
    },
    /// Stored text is not one of the labels its column allows.
    UnknownLabel { value: String },
    /// Structured value could not be serialized.
    Serialize(serde_json::Error),
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KindMismatch { declared, found } => {
                write!(f, "cannot pack {found} value into {declared} column")
            }
            Self::UnexpectedStorage { declared, found } => {
                write!(f, "stored {found} value cannot be read as {declared}")
            }
            Self::Malformed { declared, source } => {
                write!(f, "stored {declared} value is not valid JSON: {source}")
            }
            Self::ShapeMismatch { declared, found } => {
                write!(f, "stored JSON {found} does not match declared {declared}")
            }
            Self::UnknownLabel { value } => write!(f, "unknown label `{value}`"),
            Self::Serialize(err) => write!(f, "failed to serialize structured value: {err}"),
        }
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Malformed { source, .. } => Some(source),
            Self::Serialize(err) => Some(err),
            Self::KindMismatch { .. }
            | Self::UnexpectedStorage { .. }
            | Self::ShapeMismatch { .. }
            | Self::UnknownLabel { .. } => None,
        }
    }
}

/// Converts `value` into its storage form for a column declared as `kind`.
pub fn pack(value: &FieldValue, kind: ColumnKind) -> CodecResult<Value> {
    let packed = match (value, kind) {
        (FieldValue::Null, _) => Value::Null,
        (FieldValue::Integer(v), ColumnKind::Integer) => Value::Integer(*v),
        (FieldValue::Text(v), ColumnKind::Text) => Value::Text(v.clone()),
        (FieldValue::Boolean(v), ColumnKind::Boolean) => Value::Integer(i64::from(*v)),
        (FieldValue::List(items), ColumnKind::List) => {
            Value::Text(serde_json::to_string(items).map_err(CodecError::Serialize)?)
        }
        (FieldValue::Map(entries), ColumnKind::Map) => {
            Value::Text(serde_json::to_string(entries).map_err(CodecError::Serialize)?)
        }
        (other, declared) => {
            return Err(CodecError::KindMismatch {
                declared,
                // Null is handled above, so every remaining variant has a kind.
                found: other.kind().unwrap_or(declared),
            });
        }
    };
    Ok(packed)
}

/// Converts a stored value back into a field value for a column declared as `kind`.
pub fn unpack(value: Value, kind: ColumnKind) -> CodecResult<FieldValue> {
    if matches!(value, Value::Null) {
        return Ok(FieldValue::Null);
    }

    match kind {
        ColumnKind::Integer => match value {
            Value::Integer(v) => Ok(FieldValue::Integer(v)),
            Value::Text(ref text) => text
                .trim()
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| unexpected(kind, &value)),
            other => Err(unexpected(kind, &other)),
        },
        ColumnKind::Text => match value {
            Value::Text(v) => Ok(FieldValue::Text(v)),
            Value::Integer(v) => Ok(FieldValue::Text(v.to_string())),
            Value::Real(v) => Ok(FieldValue::Text(v.to_string())),
            other => Err(unexpected(kind, &other)),
        },
        ColumnKind::Boolean => match value {
            Value::Integer(v) => Ok(FieldValue::Boolean(v != 0)),
            other => Err(unexpected(kind, &other)),
        },
        ColumnKind::List | ColumnKind::Map => {
            let decoded: JsonValue = match value {
                Value::Text(ref text) => serde_json::from_str(text),
                Value::Blob(ref bytes) => serde_json::from_slice(bytes),
                other => return Err(unexpected(kind, &other)),
            }
            .map_err(|source| CodecError::Malformed {
                declared: kind,
                source,
            })?;
            check_shape(decoded, kind)
        }
    }
}

fn check_shape(decoded: JsonValue, kind: ColumnKind) -> CodecResult<FieldValue> {
    match (decoded, kind) {
        (JsonValue::Array(items), ColumnKind::List) => Ok(FieldValue::List(items)),
        (JsonValue::Object(entries), ColumnKind::Map) => Ok(FieldValue::Map(entries)),
        (other, declared) => Err(CodecError::ShapeMismatch {
            declared,
            found: json_type_name(&other),
        }),
    }
}

fn unexpected(declared: ColumnKind, value: &Value) -> CodecError {
    CodecError::UnexpectedStorage {
        declared,
        found: storage_class(value),
    }
}

fn storage_class(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Integer(_) => "integer",
        Value::Real(_) => "real",
        Value::Text(_) => "text",
        Value::Blob(_) => "blob",
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::{pack, unpack, CodecError, ColumnKind, FieldValue};
    use rusqlite::types::Value;
    use serde_json::json;

    fn map_of(value: serde_json::Value) -> FieldValue {
        match value {
            serde_json::Value::Object(entries) => FieldValue::Map(entries),
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn nested_structures_round_trip() {
        let list = FieldValue::List(vec![
            json!("sword"),
            json!(12),
            json!(1.5),
            json!(true),
            json!([1, [2, 3]]),
            json!({"inner": {"flag": false}}),
        ]);
        let packed = pack(&list, ColumnKind::List).unwrap();
        assert_eq!(unpack(packed, ColumnKind::List).unwrap(), list);

        let map = map_of(json!({"x": true, "nested": {"ids": ["a", "b"], "n": -4}}));
        let packed = pack(&map, ColumnKind::Map).unwrap();
        assert_eq!(unpack(packed, ColumnKind::Map).unwrap(), map);
    }

    #[test]
    fn floats_round_trip_bit_exact() {
        let mut state = 0x9E37_79B9_7F4A_7C15_u64;
        let mut checked = 0;
        while checked < 20_000 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let number = f64::from_bits(state);
            if !number.is_finite() {
                continue;
            }
            checked += 1;

            let list = FieldValue::List(vec![json!(number), json!({"f": number})]);
            let packed = pack(&list, ColumnKind::List).unwrap();
            assert_eq!(
                unpack(packed, ColumnKind::List).unwrap(),
                list,
                "{number:e} changed after a round trip"
            );
        }

        for edge in [f64::MIN_POSITIVE, f64::MAX, f64::MIN, 5e-324, 0.1 + 0.2, -0.0] {
            let list = FieldValue::List(vec![json!(edge)]);
            let packed = pack(&list, ColumnKind::List).unwrap();
            assert_eq!(unpack(packed, ColumnKind::List).unwrap(), list);
        }
    }

    #[test]
    fn map_packs_to_sorted_unescaped_json() {
        let map = map_of(json!({"b": 1, "a": "привет"}));
        let packed = pack(&map, ColumnKind::Map).unwrap();
        assert_eq!(packed, Value::Text(r#"{"a":"привет","b":1}"#.to_string()));
    }

    #[test]
    fn map_stored_where_list_declared_fails() {
        let stored = Value::Text(r#"{"x": true}"#.to_string());
        let err = unpack(stored, ColumnKind::List).unwrap_err();
        assert!(matches!(
            err,
            CodecError::ShapeMismatch {
                declared: ColumnKind::List,
                found: "object"
            }
        ));
    }

    #[test]
    fn empty_list_stored_where_map_declared_fails() {
        let err = unpack(Value::Text("[]".to_string()), ColumnKind::Map).unwrap_err();
        assert!(matches!(err, CodecError::ShapeMismatch { found: "array", .. }));
    }

    #[test]
    fn corrupt_json_is_reported_not_defaulted() {
        let err = unpack(Value::Blob(b"{not json".to_vec()), ColumnKind::Map).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Malformed {
                declared: ColumnKind::Map,
                ..
            }
        ));
    }

    #[test]
    fn blob_storage_is_accepted_for_structured_kinds() {
        let stored = Value::Blob(br#"["a", 1]"#.to_vec());
        assert_eq!(
            unpack(stored, ColumnKind::List).unwrap(),
            FieldValue::List(vec![json!("a"), json!(1)])
        );
    }

    #[test]
    fn null_round_trips_for_every_kind() {
        for kind in [
            ColumnKind::Integer,
            ColumnKind::Text,
            ColumnKind::Boolean,
            ColumnKind::List,
            ColumnKind::Map,
        ] {
            assert_eq!(pack(&FieldValue::Null, kind).unwrap(), Value::Null);
            assert_eq!(unpack(Value::Null, kind).unwrap(), FieldValue::Null);
        }
    }

    #[test]
    fn booleans_are_stored_as_integers() {
        assert_eq!(
            pack(&FieldValue::Boolean(true), ColumnKind::Boolean).unwrap(),
            Value::Integer(1)
        );
        assert_eq!(
            unpack(Value::Integer(0), ColumnKind::Boolean).unwrap(),
            FieldValue::Boolean(false)
        );
        assert_eq!(
            unpack(Value::Integer(2), ColumnKind::Boolean).unwrap(),
            FieldValue::Boolean(true)
        );
    }

    #[test]
    fn scalar_casts() {
        assert_eq!(
            unpack(Value::Integer(76561198), ColumnKind::Text).unwrap(),
            FieldValue::Text("76561198".to_string())
        );
        assert_eq!(
            unpack(Value::Text("42".to_string()), ColumnKind::Integer).unwrap(),
            FieldValue::Integer(42)
        );
        assert!(matches!(
            unpack(Value::Text("forty".to_string()), ColumnKind::Integer),
            Err(CodecError::UnexpectedStorage { found: "text", .. })
        ));
    }

    #[test]
    fn pack_rejects_value_of_other_kind() {
        let err = pack(&FieldValue::Text("7".to_string()), ColumnKind::Integer).unwrap_err();
        assert!(matches!(
            err,
            CodecError::KindMismatch {
                declared: ColumnKind::Integer,
                found: ColumnKind::Text
            }
        ));
    }

    #[test]
    fn option_conversion_maps_none_to_null() {
        assert_eq!(FieldValue::from(None::<String>), FieldValue::Null);
        assert_eq!(
            FieldValue::from(Some("steam")),
            FieldValue::Text("steam".to_string())
        );
    }
}
