//! Payload handling
//!
//! Pure functions over `serde_json::Value`: response envelope unwrapping,
//! completeness-marker coercion, and the incremental merge used for
//! interface translation tables. All independent of the network layer.

use serde_json::Value;

use crate::error::{ContentError, Result};

// =============================================================================
// Envelope unwrapping
// =============================================================================

/// Unwrap a remote response body into a usable content object.
///
/// Precedence order:
/// 1. `{ "data": <payload> }` envelope takes the inner payload
/// 2. otherwise the body itself is the payload
/// 3. a payload that is a JSON-encoded string gets a second decode
///
/// Anything that is not a JSON object after unwrapping is a parse error.
pub fn unwrap_payload(body: &str) -> Result<Value> {
    let outer: Value =
        serde_json::from_str(body).map_err(|e| ContentError::parse(e.to_string(), body))?;

    let inner = match outer {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };

    let payload = match inner {
        // Double-encoded payload: decode once more
        Value::String(s) => {
            serde_json::from_str(&s).map_err(|e| ContentError::parse(e.to_string(), &s))?
        }
        other => other,
    };

    if payload.is_object() {
        Ok(payload)
    } else {
        Err(ContentError::parse("payload is not an object", body))
    }
}

// =============================================================================
// Completeness
// =============================================================================

/// Coerce a boolean-ish marker value: `true`, `1`, `"1"`, `"true"` count as
/// set; `false`, `0`, `""`, null, and anything else do not.
fn boolish(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => matches!(s.as_str(), "1" | "true"),
        _ => false,
    }
}

/// Whether a payload declares itself translation-complete.
///
/// Both legacy marker locations are supported indefinitely: `meta.complete`
/// (with its `meta.translationComplete` alias) and
/// `language.translationComplete`. A true marker in either location counts.
pub fn is_complete(payload: &Value) -> bool {
    let meta_marker = payload
        .get("meta")
        .and_then(|m| m.get("complete").or_else(|| m.get("translationComplete")));
    let language_marker = payload
        .get("language")
        .and_then(|l| l.get("translationComplete"));

    meta_marker.map(boolish).unwrap_or(false)
        || language_marker.map(boolish).unwrap_or(false)
}

// =============================================================================
// Merge with delete
// =============================================================================

/// Recursively merge `update` into `base`.
///
/// Deletion convention: a `null` or empty-string value in `update` removes
/// the key from the result rather than setting it to empty. Nested objects
/// merge recursively; any other value replaces wholesale.
pub fn merge_with_delete(base: &mut Value, update: &Value) {
    let Value::Object(update_map) = update else {
        *base = update.clone();
        return;
    };
    if !base.is_object() {
        *base = update.clone();
        return;
    }
    let Value::Object(base_map) = base else {
        return;
    };

    for (key, incoming) in update_map {
        match incoming {
            Value::Null => {
                base_map.remove(key);
            }
            Value::String(s) if s.is_empty() => {
                base_map.remove(key);
            }
            Value::Object(_) => match base_map.get_mut(key) {
                Some(existing @ Value::Object(_)) => merge_with_delete(existing, incoming),
                _ => {
                    base_map.insert(key.clone(), incoming.clone());
                }
            },
            other => {
                base_map.insert(key.clone(), other.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unwrap_enveloped() {
        let payload = unwrap_payload(r#"{"data": {"content": "X"}}"#).unwrap();
        assert_eq!(payload, json!({"content": "X"}));
    }

    #[test]
    fn test_unwrap_bare() {
        let payload = unwrap_payload(r#"{"content": "X"}"#).unwrap();
        assert_eq!(payload, json!({"content": "X"}));
    }

    #[test]
    fn test_unwrap_double_encoded() {
        let payload = unwrap_payload(r#"{"data": "{\"content\": \"X\"}"}"#).unwrap();
        assert_eq!(payload, json!({"content": "X"}));
    }

    #[test]
    fn test_unwrap_rejects_non_object() {
        assert!(unwrap_payload("[1, 2, 3]").is_err());
        assert!(unwrap_payload(r#""just a string""#).is_err());
        assert!(unwrap_payload("not json at all").is_err());
    }

    #[test]
    fn test_completeness_coercion() {
        for marker in [json!(true), json!(1), json!("1"), json!("true")] {
            assert!(is_complete(&json!({"meta": {"complete": marker}})));
        }
        for marker in [json!(false), json!(0), json!(""), json!(null)] {
            assert!(!is_complete(&json!({"meta": {"complete": marker}})));
        }
        assert!(!is_complete(&json!({"content": "no marker"})));
    }

    #[test]
    fn test_legacy_marker_locations() {
        assert!(is_complete(
            &json!({"meta": {"translationComplete": "true"}})
        ));
        assert!(is_complete(
            &json!({"language": {"translationComplete": 1}})
        ));
        // A true marker in either location wins over a false one in the other
        assert!(is_complete(&json!({
            "meta": {"complete": false},
            "language": {"translationComplete": true}
        })));
    }

    #[test]
    fn test_merge_with_delete() {
        let mut base = json!({"a": {"b": "x", "c": "y"}});
        merge_with_delete(&mut base, &json!({"a": {"b": null, "d": "z"}}));
        assert_eq!(base, json!({"a": {"c": "y", "d": "z"}}));
    }

    #[test]
    fn test_merge_empty_string_deletes() {
        let mut base = json!({"title": "Hello", "subtitle": "World"});
        merge_with_delete(&mut base, &json!({"subtitle": ""}));
        assert_eq!(base, json!({"title": "Hello"}));
    }

    #[test]
    fn test_merge_replaces_scalars_and_adds_nested() {
        let mut base = json!({"menu": {"home": "Home"}});
        merge_with_delete(
            &mut base,
            &json!({"menu": {"home": "Inicio", "about": "Acerca"}, "version": 2}),
        );
        assert_eq!(
            base,
            json!({"menu": {"home": "Inicio", "about": "Acerca"}, "version": 2})
        );
    }
}
