//! Typed attribute decoding
//!
//! The remote store can return items whose values are wrapped in a single-key
//! type descriptor: `{"S": "text"}`, `{"N": "123"}` or `{"BOOL": true}`.
//! Decoding unwraps those into plain JSON values. It is permissive: a value
//! that is not a recognized wrapper passes through unchanged, so decoding an
//! already-plain record is a no-op.

use serde_json::{Map, Number, Value};

/// String type tag
pub const STRING_TAG: &str = "S";
/// Number type tag (the number itself is carried as a string)
pub const NUMBER_TAG: &str = "N";
/// Boolean type tag
pub const BOOL_TAG: &str = "BOOL";

/// Decode every attribute of a record
pub fn decode_item(item: Map<String, Value>) -> Map<String, Value> {
    item.into_iter()
        .map(|(key, value)| (key, decode_value(value)))
        .collect()
}

/// Decode a single attribute value
pub fn decode_value(value: Value) -> Value {
    let Value::Object(mut wrapper) = value else {
        return value;
    };

    if let Some(s) = wrapper.remove(STRING_TAG) {
        s
    } else if let Some(n) = wrapper.remove(NUMBER_TAG) {
        parse_number(n)
    } else if let Some(b) = wrapper.remove(BOOL_TAG) {
        b
    } else {
        Value::Object(wrapper)
    }
}

/// Numbers arrive as strings; unparseable ones become null
fn parse_number(raw: Value) -> Value {
    let text = match raw {
        Value::Number(_) => return raw,
        Value::String(s) => s,
        _ => return Value::Null,
    };

    let text = text.trim();
    if text.is_empty() {
        return Value::from(0);
    }
    if let Ok(i) = text.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(u) = text.parse::<u64>() {
        return Value::from(u);
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
