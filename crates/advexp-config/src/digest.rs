//! Canonical JSON and SHA-256 fingerprints of resolved configurations.
//!
//! Canonical form:
//! - object keys sorted by UTF-16 code units (RFC 8785 §3.2.3)
//! - integer-valued floats written as integers; NaN/Infinity rejected
//! - compact output, no insignificant whitespace

use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};

use crate::error::{ConfigError, Result};

fn sort_keys_utf16(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| a.encode_utf16().cmp(b.encode_utf16()));

            let mut sorted = Map::new();
            for key in keys {
                if let Some(v) = map.get(key) {
                    sorted.insert(key.clone(), sort_keys_utf16(v));
                }
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys_utf16).collect()),
        other => other.clone(),
    }
}

fn normalize_numbers(path: &str, value: &Value) -> Result<Value> {
    match value {
        Value::Object(map) => {
            let mut normalized = Map::new();
            for (k, v) in map {
                let child = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{path}.{k}")
                };
                normalized.insert(k.clone(), normalize_numbers(&child, v)?);
            }
            Ok(Value::Object(normalized))
        }
        Value::Array(items) => items
            .iter()
            .map(|v| normalize_numbers(path, v))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Number(n) if n.is_f64() => {
            let f = n.as_f64().unwrap_or(f64::NAN);
            if !f.is_finite() {
                return Err(ConfigError::invalid_value(
                    path,
                    "NaN/Infinity cannot be fingerprinted",
                ));
            }
            if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                Ok(Value::Number(Number::from(f as i64)))
            } else {
                Ok(value.clone())
            }
        }
        other => Ok(other.clone()),
    }
}

/// Canonical compact JSON text of `value`.
pub fn canonical_json(value: &Value) -> Result<String> {
    let normalized = normalize_numbers("", value)?;
    let sorted = sort_keys_utf16(&normalized);
    serde_json::to_string(&sorted)
        .map_err(|e| ConfigError::invalid_value("<root>", format!("not serializable: {e}")))
}

/// SHA-256 hex digest of the canonical JSON of `value`.
pub fn fingerprint(value: &Value) -> Result<String> {
    let canonical = canonical_json(value)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorts_keys() {
        let canonical = canonical_json(&json!({ "seed": 1, "attack": "fgsm" })).unwrap();
        assert_eq!(canonical, r#"{"attack":"fgsm","seed":1}"#);
    }

    #[test]
    fn test_integer_valued_float_normalized() {
        let canonical = canonical_json(&json!({ "margin": 5.0, "percentile": 0.01 })).unwrap();
        assert_eq!(canonical, r#"{"margin":5,"percentile":0.01}"#);
    }

    #[test]
    fn test_fingerprint_ignores_key_order() {
        let a = fingerprint(&json!({ "a": 1, "b": { "y": 2, "x": 3 } })).unwrap();
        let b = fingerprint(&json!({ "b": { "x": 3, "y": 2 }, "a": 1 })).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_sensitive_to_values() {
        let a = fingerprint(&json!({ "attack": "fgsm" })).unwrap();
        let b = fingerprint(&json!({ "attack": "pgd" })).unwrap();
        assert_ne!(a, b);
    }
}
