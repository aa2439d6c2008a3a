//! Canonical content digest (C1).
//!
//! Produces a digest that is invariant to JSON object key ordering, so two
//! values that are semantically equal always hash the same way regardless
//! of how their fields were constructed.

use serde_json::Value;
use sha2::{Digest, Sha256};

fn canonicalize(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean:{b}"),
        Value::String(s) => format!("string:{s}"),
        Value::Number(n) => {
            let f = n.as_f64().unwrap_or(0.0);
            format!("number:{:x}", f.to_bits())
        }
        Value::Array(items) => {
            let mut parts = vec![format!("array:{}", items.len())];
            for (i, item) in items.iter().enumerate() {
                parts.push(format!("[{i}]"));
                parts.push(canonicalize(item));
            }
            parts.join("|")
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut parts = vec![format!("object:{}", keys.len())];
            for key in keys {
                parts.push(format!("key:{key}"));
                parts.push(canonicalize(map.get(key).expect("key came from map")));
            }
            parts.join("|")
        }
    }
}

/// Computes the canonical content digest of `value`.
///
/// `value` is `None` for the "undefined at the root" case (a key with no
/// stored value yet); that canonicalizes to an empty pre-image rather than
/// the string `"null"`, so an absent value never collides with an explicit
/// JSON `null`.
///
/// `salt`, when present, is mixed in as a trailing pre-image segment. It is
/// used to scope digests per user so two accounts with byte-identical
/// values never compare equal across accounts.
pub fn digest(value: Option<&Value>, salt: Option<&str>) -> String {
    let mut preimage = match value {
        Some(v) => canonicalize(v),
        None => String::new(),
    };
    if let Some(s) = salt {
        preimage.push_str("|salt:");
        preimage.push_str(s);
    }
    let hashed = Sha256::digest(preimage.as_bytes());
    hashed.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn same_value_same_digest() {
        let a = json!({"x": 1, "y": 2});
        let b = json!({"y": 2, "x": 1});
        assert_eq!(digest(Some(&a), None), digest(Some(&b), None));
    }

    #[test]
    fn different_values_different_digest() {
        let a = json!({"x": 1});
        let b = json!({"x": 2});
        assert_ne!(digest(Some(&a), None), digest(Some(&b), None));
    }

    #[test]
    fn null_and_undefined_do_not_collide() {
        let null_digest = digest(Some(&Value::Null), None);
        let undefined_digest = digest(None, None);
        assert_ne!(null_digest, undefined_digest);
    }

    #[test]
    fn salt_scopes_digest_per_user() {
        let v = json!({"k": "v"});
        let d1 = digest(Some(&v), Some("user-a"));
        let d2 = digest(Some(&v), Some("user-b"));
        assert_ne!(d1, d2);
    }

    #[test]
    fn nested_array_key_order_invariant() {
        let a = json!([{"a": 1, "b": 2}, {"c": 3}]);
        let b = json!([{"b": 2, "a": 1}, {"c": 3}]);
        assert_eq!(digest(Some(&a), None), digest(Some(&b), None));
    }

    #[test]
    fn digest_is_stable_length() {
        let d = digest(Some(&json!("hello")), None);
        assert_eq!(d.len(), 16);
    }
}
