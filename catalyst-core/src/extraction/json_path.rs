//! JSON value access and coercion.
//!
//! Raw records are kept as string-keyed maps of dynamic values. The helpers
//! here resolve paths, coerce numbers and coalesce across candidate keys.

use serde_json::{Map, Value};

/// One raw record from a list endpoint.
pub type RawRecord = Map<String, Value>;

/// Resolve a dot-notation path to a value in JSON.
///
/// # Examples
/// ```
/// use serde_json::json;
/// use catalyst_core::extraction::resolve_json_path;
/// let data = json!({"clientHealth": {"wired": 98}});
/// let value = resolve_json_path(&data, "clientHealth.wired");
/// assert_eq!(value, Some(&json!(98)));
/// ```
pub fn resolve_json_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(data);
    }

    let mut current = data;
    for part in path.split('.') {
        match current {
            Value::Object(obj) => {
                current = obj.get(part)?;
            }
            Value::Array(arr) => {
                let index: usize = part.parse().ok()?;
                current = arr.get(index)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

/// Convert a JSON value to a display string.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}

/// Coerce a JSON value to a 64-bit integer.
///
/// Integers, floats (truncated) and numeric strings are accepted; anything
/// else, including out-of-range floats, coerces to zero.
pub fn value_to_i64(value: &Value) -> i64 {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i
            } else if let Some(u) = n.as_u64() {
                i64::try_from(u).unwrap_or(i64::MAX)
            } else {
                n.as_f64().map(float_to_i64).unwrap_or(0)
            }
        }
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(float_to_i64))
                .unwrap_or(0)
        }
        _ => 0,
    }
}

fn float_to_i64(f: f64) -> i64 {
    if f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        f.trunc() as i64
    } else {
        0
    }
}

/// Tri-state boolean parse: `Some(true)`, `Some(false)` or `None` when the
/// value is not recognisably boolean.
///
/// `true`/`yes`/`1` and `false`/`no`/`0` are accepted case-insensitively.
pub fn parse_boolish(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => parse_boolish_str(s),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub fn parse_boolish_str(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// First candidate key holding a string that is non-empty after trimming.
/// The value is returned as stored.
pub fn first_non_empty_str(record: &RawRecord, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|k| record.get(*k).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_default()
}

/// First candidate key holding a non-zero number.
pub fn first_non_zero_i64(record: &RawRecord, keys: &[&str]) -> i64 {
    keys.iter()
        .filter_map(|k| record.get(*k))
        .filter(|v| v.is_number())
        .map(value_to_i64)
        .find(|n| *n != 0)
        .unwrap_or(0)
}
