//! Canonical JSON serialization: sorted keys, no whitespace.
//!
//! Checksums and signatures are computed over canonical form so the digest
//! is deterministic regardless of field ordering in storage.

use serde_json::Value;

use crate::error::CryptoError;

/// Canonical JSON serialization of a value.
pub fn canonical_json(value: &Value) -> Result<String, CryptoError> {
    match value {
        Value::Null => Ok("null".to_string()),
        Value::Bool(b) => Ok(if *b { "true" } else { "false" }.to_string()),
        Value::Number(n) => {
            let f = n.as_f64().unwrap_or(f64::NAN);
            if !f.is_finite() {
                return Err(CryptoError::NonFiniteNumber);
            }
            Ok(serde_json::to_string(n).unwrap())
        }
        Value::String(s) => Ok(serde_json::to_string(s).unwrap()),
        Value::Array(arr) => {
            let items: Result<Vec<String>, _> = arr.iter().map(canonical_json).collect();
            Ok(format!("[{}]", items?.join(",")))
        }
        Value::Object(obj) => {
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort();
            let pairs: Result<Vec<String>, _> = keys
                .iter()
                .map(|k| {
                    let v = canonical_json(&obj[*k])?;
                    Ok(format!("{}:{}", serde_json::to_string(*k).unwrap(), v))
                })
                .collect();
            Ok(format!("{{{}}}", pairs?.join(",")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_keys() {
        let v = json!({"b": 1, "a": 2});
        assert_eq!(canonical_json(&v).unwrap(), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn nested_objects_sorted() {
        let v = json!({"z": {"y": 1, "x": 2}, "a": [3, {"c": 1, "b": 2}]});
        assert_eq!(
            canonical_json(&v).unwrap(),
            r#"{"a":[3,{"b":2,"c":1}],"z":{"x":2,"y":1}}"#
        );
    }

    #[test]
    fn no_whitespace() {
        let v = json!({"a": [1, 2, 3], "b": "text"});
        let s = canonical_json(&v).unwrap();
        assert!(!s.contains(' '));
    }

    #[test]
    fn scalars() {
        assert_eq!(canonical_json(&json!(null)).unwrap(), "null");
        assert_eq!(canonical_json(&json!(true)).unwrap(), "true");
        assert_eq!(canonical_json(&json!("x")).unwrap(), r#""x""#);
        assert_eq!(canonical_json(&json!(42)).unwrap(), "42");
    }

    #[test]
    fn deterministic_regardless_of_insertion_order() {
        let mut a = serde_json::Map::new();
        a.insert("first".into(), json!(1));
        a.insert("second".into(), json!(2));
        let mut b = serde_json::Map::new();
        b.insert("second".into(), json!(2));
        b.insert("first".into(), json!(1));
        assert_eq!(
            canonical_json(&Value::Object(a)).unwrap(),
            canonical_json(&Value::Object(b)).unwrap()
        );
    }
}
