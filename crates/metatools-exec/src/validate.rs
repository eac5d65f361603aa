use metatools_core::{MetatoolsError, MetatoolsResult};
use serde_json::{Map, Value};

/// Checks `args` against the `required` list and the top-level property
/// `type`s of a JSON Schema. Anything else in the schema is not enforced;
/// backends stay responsible for deep validation.
pub fn validate_args(schema: Option<&Value>, args: &Map<String, Value>) -> MetatoolsResult<()> {
    let Some(Value::Object(schema)) = schema else {
        return Ok(());
    };

    if let Some(Value::Array(required)) = schema.get("required") {
        for name in required.iter().filter_map(Value::as_str) {
            if !args.contains_key(name) {
                return Err(MetatoolsError::InvalidRequest(format!(
                    "missing required argument '{name}'"
                )));
            }
        }
    }

    if let Some(Value::Object(properties)) = schema.get("properties") {
        for (name, value) in args {
            let Some(expected) = properties.get(name).and_then(|p| p.get("type")) else {
                continue;
            };
            if !type_matches(expected, value) {
                return Err(MetatoolsError::InvalidRequest(format!(
                    "argument '{name}' should be of type {expected}"
                )));
            }
        }
    }

    Ok(())
}

fn type_matches(expected: &Value, value: &Value) -> bool {
    match expected {
        Value::String(t) => is_type(t, value),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| is_type(t, value)),
        _ => true,
    }
}

fn is_type(t: &str, value: &Value) -> bool {
    match t {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        // Unknown type keywords are not ours to reject.
        _ => true,
    }
}
