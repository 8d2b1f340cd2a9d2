//! Wire field helpers.
//!
//! The server is loose about JSON types: booleans arrive as "1", numbers as
//! strings and vice versa. These helpers read a top-level field and coerce
//! it the way the protocol expects.

use serde_json::{Map, Value};

use crate::error::NetworkError;

/// Convert a JSON value to its wire string representation.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}

/// Wire boolean: `"1"`, `1` or `true`.
pub fn value_is_set(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => s.trim() == "1" || s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Optional field; null and empty strings count as absent.
pub fn optional_string(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .map(value_to_string)
        .filter(|s| !s.is_empty())
}

/// Required field; absence is a bad body.
pub fn required_string(obj: &Map<String, Value>, key: &str) -> Result<String, NetworkError> {
    match obj.get(key) {
        Some(Value::Null) | None => Err(NetworkError::BadBody(format!("missing field {}", key))),
        Some(value) => Ok(value_to_string(value)),
    }
}

/// Boolean flag that is false when absent.
pub fn flag(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).map(value_is_set).unwrap_or(false)
}

/// Parse a body into a JSON object.
pub fn parse_object(body: &str) -> Result<Map<String, Value>, NetworkError> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(obj)) => Ok(obj),
        Ok(_) => Err(NetworkError::BadBody("response is not a JSON object".to_string())),
        Err(e) => Err(NetworkError::BadBody(format!("JSON parse error: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&json!("a")), "a");
        assert_eq!(value_to_string(&json!(12)), "12");
        assert_eq!(value_to_string(&json!(true)), "true");
        assert_eq!(value_to_string(&Value::Null), "");
    }

    #[test]
    fn test_wire_booleans() {
        assert!(value_is_set(&json!("1")));
        assert!(value_is_set(&json!(1)));
        assert!(value_is_set(&json!(true)));
        assert!(!value_is_set(&json!("0")));
        assert!(!value_is_set(&json!("")));
        assert!(!value_is_set(&json!(2)));
    }

    #[test]
    fn test_required_and_optional() {
        let o = obj(json!({"a": "x", "b": null, "c": ""}));
        assert_eq!(required_string(&o, "a").unwrap(), "x");
        assert!(required_string(&o, "b").is_err());
        assert!(required_string(&o, "missing").is_err());
        assert_eq!(required_string(&o, "c").unwrap(), "");
        assert_eq!(optional_string(&o, "c"), None);
        assert_eq!(optional_string(&o, "a").as_deref(), Some("x"));
    }

    #[test]
    fn test_parse_object_rejects_non_objects() {
        assert!(parse_object("[1,2]").is_err());
        assert!(parse_object("nope").is_err());
        assert!(parse_object("{}").unwrap().is_empty());
    }
}
