//! Best-effort coercion of declared input schemas into a JSON object.
//!
//! Nothing here returns an error: a schema that cannot be coerced is
//! reported as absent so a single odd tool never breaks a listing.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

/// Normalizes a declared input schema.
///
/// An object is returned unchanged. Any other value is re-encoded and
/// kept only if it comes back as an object; `None` in means `None` out.
pub fn normalize_schema(schema: Option<&Value>) -> Option<Map<String, Value>> {
    match schema? {
        Value::Object(map) => Some(map.clone()),
        other => normalize_serializable(other),
    }
}

/// Re-encodes any serializable value and keeps it if it is a JSON object.
pub fn normalize_serializable<T: Serialize + ?Sized>(value: &T) -> Option<Map<String, Value>> {
    let encoded = match serde_json::to_value(value) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "Schema could not be encoded; treating as absent");
            return None;
        }
    };
    match serde_json::from_value::<Map<String, Value>>(encoded) {
        Ok(map) => Some(map),
        Err(e) => {
            debug!(error = %e, "Schema is not an object; treating as absent");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::{BTreeMap, HashMap};

    #[test]
    fn test_absent_stays_absent() {
        assert!(normalize_schema(None).is_none());
    }

    #[test]
    fn test_object_returned_unchanged() {
        let schema = json!({
            "type": "object",
            "properties": {"msg": {"type": "string"}},
            "required": ["msg"]
        });
        let out = normalize_schema(Some(&schema)).unwrap();
        assert_eq!(Value::Object(out.clone()), schema);

        // Idempotent.
        let again = normalize_schema(Some(&Value::Object(out.clone()))).unwrap();
        assert_eq!(again, out);
    }

    #[test]
    fn test_empty_object_is_not_absent() {
        let out = normalize_schema(Some(&json!({}))).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_non_object_values_become_absent() {
        for value in [json!(null), json!(true), json!(3), json!("object"), json!([1, 2])] {
            assert!(normalize_schema(Some(&value)).is_none(), "{value}");
        }
    }

    #[test]
    fn test_typed_map_is_coerced() {
        let mut typed = BTreeMap::new();
        typed.insert("type", "object");
        let out = normalize_serializable(&typed).unwrap();
        assert_eq!(out["type"], "object");
    }

    #[test]
    fn test_unencodable_value_is_absent_not_error() {
        // Non-string map keys cannot be encoded as a JSON object.
        let mut bad: HashMap<(u8, u8), u8> = HashMap::new();
        bad.insert((1, 2), 3);
        assert!(normalize_serializable(&bad).is_none());
    }
}
