use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Field value carried by a stored message
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    String(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int64(_) => "int64",
            Value::Float64(_) => "float64",
            Value::String(_) => "string",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(v) => Some(*v),
            Value::Int64(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int64(_) | Value::Float64(_))
    }

    /// Infer a field value from a JSON scalar. Arrays and objects become null;
    /// use [`flatten_json`] to keep their contents.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int64(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float64(f)
                } else {
                    Value::Null
                }
            }
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => Value::Null,
        }
    }
}

/// Flatten a JSON object into a map with dot-notation keys
///
/// Example:
/// ```json
/// {"http": {"status": 500, "path": "/login"}, "tags": ["a", "b"]}
/// ```
/// Becomes:
/// - "http.status" -> 500
/// - "http.path" -> "/login"
/// - "tags.0" -> "a"
/// - "tags.1" -> "b"
pub fn flatten_json(json: &serde_json::Map<String, serde_json::Value>) -> HashMap<String, Value> {
    let mut result = HashMap::new();
    flatten_json_recursive(json, "", &mut result);
    result
}

fn flatten_json_recursive(
    obj: &serde_json::Map<String, serde_json::Value>,
    prefix: &str,
    result: &mut HashMap<String, Value>,
) {
    for (key, value) in obj {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        flatten_value(value, full_key, result);
    }
}

fn flatten_value(value: &serde_json::Value, key: String, result: &mut HashMap<String, Value>) {
    match value {
        serde_json::Value::Object(nested) => flatten_json_recursive(nested, &key, result),
        serde_json::Value::Array(arr) => {
            for (idx, item) in arr.iter().enumerate() {
                flatten_value(item, format!("{}.{}", key, idx), result);
            }
        }
        _ => {
            result.insert(key, Value::from_json(value));
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            // Mixed or float numerics compare bitwise after widening
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.to_bits() == b.to_bits(),
                _ => false,
            },
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => std::fmt::Display::fmt(b, f),
            Value::Int64(i) => std::fmt::Display::fmt(i, f),
            Value::Float64(v) => std::fmt::Display::fmt(v, f),
            Value::String(s) => f.write_str(s),
        }
    }
}
