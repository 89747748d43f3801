//! Small JSON shaping helpers shared by the translators.

use serde_json::{Map, Value};

/// A list written the JSON-RQL way: one item bare, otherwise an array.
pub fn mini(mut items: Vec<Value>) -> Value {
    if items.len() == 1 {
        items.remove(0)
    } else {
        Value::Array(items)
    }
}

/// A single-key object `{ key: value }`.
pub fn kvo(key: impl Into<String>, value: Value) -> Value {
    let mut object = Map::with_capacity(1);
    object.insert(key.into(), value);
    Value::Object(object)
}

/// The key of a single-key object.
pub fn only_key(value: &Value) -> Option<&str> {
    match value {
        Value::Object(object) if object.len() == 1 => object.keys().next().map(String::as_str),
        _ => None,
    }
}

/// The `?name` token for a variable.
pub fn var(name: &str) -> String {
    format!("?{name}")
}

/// Whether a JSON string is a variable token.
pub fn is_var(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.len() > 1 && s.starts_with('?'))
}

/// Whether any string anywhere in `value` is a variable token.
pub fn mentions_var(value: &Value) -> bool {
    match value {
        Value::String(_) => is_var(value),
        Value::Array(items) => items.iter().any(mentions_var),
        Value::Object(object) => object
            .iter()
            .any(|(key, value)| key != "@value" && (key.starts_with('?') || mentions_var(value))),
        _ => false,
    }
}
