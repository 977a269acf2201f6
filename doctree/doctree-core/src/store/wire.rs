//! Typed value encoding used by the REST API.
//!
//! Plain JSON is mapped onto the tagged representation
//! (`{"stringValue": "x"}`, `{"mapValue": {"fields": {..}}}`, ...). Values
//! with no plain-JSON counterpart (timestamps, byte strings, references,
//! geo points and non-finite doubles) decode to a two-key object
//! `{"__type": <kind>, "value": <wire value>}` and encode back to the same
//! wire value, so reading and rewriting a document keeps its types.

use super::Fields;
use crate::error::{Error, Result};
use serde_json::{json, Map, Value};

/// Key naming the kind of a special value.
pub const TYPE_KEY: &str = "__type";
/// Key holding the wire payload of a special value.
pub const VALUE_KEY: &str = "value";

/// Wire tags carried through as special values, keyed by their `__type`.
const SPECIAL: [(&str, &str); 5] = [
    ("timestamp", "timestampValue"),
    ("bytes", "bytesValue"),
    ("reference", "referenceValue"),
    ("geopoint", "geoPointValue"),
    ("double", "doubleValue"),
];

fn special(kind: &str, inner: &Value) -> Value {
    let mut map = Map::new();
    map.insert(TYPE_KEY.to_string(), Value::String(kind.to_string()));
    map.insert(VALUE_KEY.to_string(), inner.clone());
    Value::Object(map)
}

/// Wire form of a special value, if `map` is one.
fn encode_special(map: &Map<String, Value>) -> Option<Value> {
    if map.len() != 2 {
        return None;
    }
    let kind = map.get(TYPE_KEY)?.as_str()?;
    let inner = map.get(VALUE_KEY)?;
    let (_, tag) = SPECIAL.iter().find(|(k, _)| *k == kind)?;
    let mut wire = Map::new();
    wire.insert(tag.to_string(), inner.clone());
    Some(Value::Object(wire))
}

pub(crate) fn encode_fields(fields: &Fields) -> Value {
    let encoded: Map<String, Value> = fields
        .iter()
        .map(|(name, value)| (name.clone(), encode_value(value)))
        .collect();
    Value::Object(encoded)
}

pub(crate) fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => encode_special(map)
            .unwrap_or_else(|| json!({ "mapValue": { "fields": encode_fields(map) } })),
    }
}

/// Decode the `fields` object of a REST document; absent means empty.
pub(crate) fn decode_fields(fields: Option<&Value>) -> Result<Fields> {
    let Some(fields) = fields else {
        return Ok(Fields::new());
    };
    let map = fields
        .as_object()
        .ok_or_else(|| malformed("fields", fields))?;
    map.iter()
        .map(|(name, value)| Ok((name.clone(), decode_value(value)?)))
        .collect()
}

pub(crate) fn decode_value(value: &Value) -> Result<Value> {
    let map = value.as_object().ok_or_else(|| malformed("value", value))?;
    let (tag, inner) = map.iter().next().ok_or_else(|| malformed("value", value))?;
    match tag.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| malformed(tag, inner)),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            parsed.map(Value::from).ok_or_else(|| malformed(tag, inner))
        }
        "doubleValue" => match inner {
            Value::Number(n) => n
                .as_f64()
                .map(Value::from)
                .ok_or_else(|| malformed(tag, inner)),
            // NaN and infinities arrive as strings
            Value::String(s) if s.parse::<f64>().is_ok() => Ok(special("double", inner)),
            _ => Err(malformed(tag, inner)),
        },
        "stringValue" => inner
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| malformed(tag, inner)),
        "timestampValue" | "bytesValue" | "referenceValue" if inner.is_string() => {
            Ok(special(kind_of(tag), inner))
        }
        "geoPointValue" if inner.is_object() => Ok(special("geopoint", inner)),
        "arrayValue" => {
            let values = match inner.get("values") {
                Some(Value::Array(items)) => items
                    .iter()
                    .map(decode_value)
                    .collect::<Result<Vec<_>>>()?,
                Some(other) => return Err(malformed(tag, other)),
                None => Vec::new(),
            };
            Ok(Value::Array(values))
        }
        "mapValue" => Ok(Value::Object(decode_fields(inner.get("fields"))?)),
        _ => Err(malformed(tag, inner)),
    }
}

fn kind_of(tag: &str) -> &'static str {
    SPECIAL
        .iter()
        .find(|(_, t)| *t == tag)
        .map(|(kind, _)| *kind)
        .unwrap_or("double")
}

fn malformed(what: &str, value: &Value) -> Error {
    Error::Fault {
        path: String::new(),
        status: 200,
        reason: format!("malformed {what} in response: {value}"),
    }
}
