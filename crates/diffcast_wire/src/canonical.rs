//! Canonical CBOR construction and field access.
//!
//! All wire maps are built through [`MapBuilder`], which sorts keys into
//! RFC 8949 4.2.1 order (shorter keys first, then bytewise) before
//! encoding. Equal logical content therefore always produces identical
//! bytes, which is what lets downstream consumers deduplicate redelivered
//! records by payload.

use crate::error::{WireError, WireResult};
use ciborium::value::{Integer, Value};
use diffcast_model::{EntityId, PropertyMap, PropertyValue};
use std::cmp::Ordering;

/// Compares two map keys in canonical CBOR order.
///
/// Text keys encode as a length header followed by bytes, so the encoded
/// comparison reduces to length first, then bytewise.
pub(crate) fn canonical_key_cmp(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.as_bytes().cmp(b.as_bytes()))
}

/// Builder for canonical CBOR maps with text keys.
pub(crate) struct MapBuilder {
    pairs: Vec<(String, Value)>,
}

impl MapBuilder {
    pub(crate) fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Adds a field.
    pub(crate) fn field(mut self, name: &str, value: Value) -> Self {
        self.pairs.push((name.to_string(), value));
        self
    }

    /// Adds a text field only when the value is present.
    pub(crate) fn optional_text(self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(text) => self.field(name, Value::Text(text.to_string())),
            None => self,
        }
    }

    /// Sorts the fields and produces the map value.
    pub(crate) fn into_value(mut self) -> Value {
        self.pairs.sort_by(|(a, _), (b, _)| canonical_key_cmp(a, b));
        Value::Map(
            self.pairs
                .into_iter()
                .map(|(k, v)| (Value::Text(k), v))
                .collect(),
        )
    }

    /// Sorts, encodes, and returns the map's canonical bytes.
    pub(crate) fn into_bytes(self) -> WireResult<Vec<u8>> {
        encode_value(&self.into_value())
    }
}

/// Encodes a CBOR value to bytes.
pub(crate) fn encode_value(value: &Value) -> WireResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf).map_err(|e| WireError::Cbor(e.to_string()))?;
    Ok(buf)
}

/// Decodes bytes into a CBOR value.
pub(crate) fn decode_value(bytes: &[u8]) -> WireResult<Value> {
    ciborium::de::from_reader(bytes).map_err(|e| WireError::Cbor(e.to_string()))
}

/// Decodes bytes that must be a CBOR map.
pub(crate) fn decode_map(bytes: &[u8]) -> WireResult<Vec<(Value, Value)>> {
    match decode_value(bytes)? {
        Value::Map(pairs) => Ok(pairs),
        other => Err(WireError::malformed(format!(
            "expected map, found {}",
            value_kind(&other)
        ))),
    }
}

/// Looks up a field by name.
fn field<'a>(map: &'a [(Value, Value)], name: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| k.as_text() == Some(name))
        .map(|(_, v)| v)
}

fn req_field<'a>(map: &'a [(Value, Value)], name: &str) -> WireResult<&'a Value> {
    field(map, name).ok_or_else(|| WireError::malformed(format!("missing field {name:?}")))
}

pub(crate) fn req_u64(map: &[(Value, Value)], name: &str) -> WireResult<u64> {
    let value = req_field(map, name)?;
    value
        .as_integer()
        .and_then(|i| u64::try_from(i).ok())
        .ok_or_else(|| WireError::malformed(format!("field {name:?} is not an unsigned integer")))
}

pub(crate) fn req_text<'a>(map: &'a [(Value, Value)], name: &str) -> WireResult<&'a str> {
    req_field(map, name)?
        .as_text()
        .ok_or_else(|| WireError::malformed(format!("field {name:?} is not text")))
}

pub(crate) fn req_bytes<'a>(map: &'a [(Value, Value)], name: &str) -> WireResult<&'a [u8]> {
    req_field(map, name)?
        .as_bytes()
        .map(Vec::as_slice)
        .ok_or_else(|| WireError::malformed(format!("field {name:?} is not bytes")))
}

pub(crate) fn req_array<'a>(map: &'a [(Value, Value)], name: &str) -> WireResult<&'a [Value]> {
    req_field(map, name)?
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| WireError::malformed(format!("field {name:?} is not an array")))
}

pub(crate) fn req_map<'a>(
    map: &'a [(Value, Value)],
    name: &str,
) -> WireResult<&'a [(Value, Value)]> {
    req_field(map, name)?
        .as_map()
        .map(Vec::as_slice)
        .ok_or_else(|| WireError::malformed(format!("field {name:?} is not a map")))
}

pub(crate) fn req_entity_id(map: &[(Value, Value)], name: &str) -> WireResult<EntityId> {
    let bytes = req_bytes(map, name)?;
    EntityId::from_slice(bytes)
        .ok_or_else(|| WireError::malformed(format!("field {name:?} is not a 16-byte id")))
}

pub(crate) fn opt_text<'a>(map: &'a [(Value, Value)], name: &str) -> Option<&'a str> {
    field(map, name).and_then(Value::as_text)
}

pub(crate) fn opt_bool(map: &[(Value, Value)], name: &str, default: bool) -> bool {
    field(map, name).and_then(Value::as_bool).unwrap_or(default)
}

/// Converts a property value into its CBOR form.
pub(crate) fn property_value_to_cbor(value: &PropertyValue) -> Value {
    match value {
        PropertyValue::Null => Value::Null,
        PropertyValue::Bool(b) => Value::Bool(*b),
        PropertyValue::Int(i) => Value::Integer(Integer::from(*i)),
        PropertyValue::Float(f) => Value::Float(*f),
        PropertyValue::Text(s) => Value::Text(s.clone()),
        PropertyValue::Bytes(b) => Value::Bytes(b.clone()),
        PropertyValue::List(items) => {
            Value::Array(items.iter().map(property_value_to_cbor).collect())
        }
    }
}

/// Converts a CBOR value back into a property value.
pub(crate) fn cbor_to_property_value(value: &Value) -> WireResult<PropertyValue> {
    match value {
        Value::Null => Ok(PropertyValue::Null),
        Value::Bool(b) => Ok(PropertyValue::Bool(*b)),
        Value::Integer(i) => i64::try_from(*i)
            .map(PropertyValue::Int)
            .map_err(|_| WireError::malformed("integer property out of i64 range")),
        Value::Float(f) => Ok(PropertyValue::Float(*f)),
        Value::Text(s) => Ok(PropertyValue::Text(s.clone())),
        Value::Bytes(b) => Ok(PropertyValue::Bytes(b.clone())),
        Value::Array(items) => items
            .iter()
            .map(cbor_to_property_value)
            .collect::<WireResult<Vec<_>>>()
            .map(PropertyValue::List),
        other => Err(WireError::malformed(format!(
            "{} is not a valid property value",
            value_kind(other)
        ))),
    }
}

/// Converts a property map into a canonical CBOR map.
pub(crate) fn property_map_to_cbor(map: &PropertyMap) -> Value {
    map.iter()
        .fold(MapBuilder::new(), |builder, (key, value)| {
            builder.field(key, property_value_to_cbor(value))
        })
        .into_value()
}

/// Converts a CBOR map back into a property map.
pub(crate) fn cbor_to_property_map(pairs: &[(Value, Value)]) -> WireResult<PropertyMap> {
    let mut map = PropertyMap::new();
    for (key, value) in pairs {
        let key = key
            .as_text()
            .ok_or_else(|| WireError::malformed("property key is not text"))?;
        map.insert(key.to_string(), cbor_to_property_value(value)?);
    }
    Ok(map)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Integer(_) => "integer",
        Value::Bytes(_) => "bytes",
        Value::Float(_) => "float",
        Value::Text(_) => "text",
        Value::Bool(_) => "bool",
        Value::Null => "null",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        _ => "tagged value",
    }
}
