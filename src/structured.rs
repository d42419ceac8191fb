//! YAML / JSON sidecar parsing into `serde_json::Value`.

use serde_json::{Map, Number, Value};

#[derive(Debug, thiserror::Error)]
pub enum SyntaxError {
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Format of a structured document, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// `.json` is JSON; anything else is parsed as YAML.
    pub fn from_name(name: &str) -> Self {
        if name.to_ascii_lowercase().ends_with(".json") {
            Format::Json
        } else {
            Format::Yaml
        }
    }
}

pub fn parse(text: &str, format: Format) -> Result<Value, SyntaxError> {
    match format {
        Format::Json => Ok(serde_json::from_str(text)?),
        Format::Yaml => {
            let mut value: serde_yaml::Value = serde_yaml::from_str(text)?;
            value.apply_merge()?;
            Ok(yaml_to_json(value))
        }
    }
}

/// Convert YAML to JSON. Non-string mapping keys are stringified, tags are
/// dropped, and non-finite floats become `null`.
pub fn yaml_to_json(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else {
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => {
            Value::Array(items.into_iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::new();
            for (k, v) in mapping {
                map.insert(key_string(k), yaml_to_json(v));
            }
            Value::Object(map)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn key_string(key: serde_yaml::Value) -> String {
    match yaml_to_json(key) {
        Value::String(s) => s,
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Compact JSON with object keys in sorted order.
pub fn canonical_json(value: &Value) -> String {
    // serde_json::Map is a BTreeMap, so keys serialize sorted.
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_and_json_canonicalize_identically() {
        let yaml = "type: object\nproperties:\n  b: {type: string}\n  a: {type: integer}\nrequired: [a]\n";
        let json = r#"{"required":["a"],"properties":{"a":{"type":"integer"},"b":{"type":"string"}},"type":"object"}"#;
        let from_yaml = canonical_json(&parse(yaml, Format::Yaml).unwrap());
        let from_json = canonical_json(&parse(json, Format::Json).unwrap());
        assert_eq!(from_yaml, from_json);
        assert_eq!(
            from_yaml,
            r#"{"properties":{"a":{"type":"integer"},"b":{"type":"string"}},"required":["a"],"type":"object"}"#
        );
    }

    #[test]
    fn test_non_string_keys_stringified() {
        let value = parse("responses:\n  200: ok\n  true: yes\n", Format::Yaml).unwrap();
        assert_eq!(value["responses"]["200"], "ok");
        assert_eq!(value["responses"]["true"], "yes");
    }

    #[test]
    fn test_merge_keys_and_nan() {
        let value = parse(
            "base: &b {x: 1}\nderived:\n  <<: *b\n  y: 2\nodd: .nan\n",
            Format::Yaml,
        )
        .unwrap();
        assert_eq!(value["derived"]["x"], 1);
        assert_eq!(value["derived"]["y"], 2);
        assert!(value["odd"].is_null());
    }

    #[test]
    fn test_format_from_name() {
        assert_eq!(Format::from_name("schema.JSON"), Format::Json);
        assert_eq!(Format::from_name("openapi.yml"), Format::Yaml);
    }

    #[test]
    fn test_malformed_input() {
        assert!(parse("{\"a\": ", Format::Json).is_err());
        assert!(parse("a: [1, 2", Format::Yaml).is_err());
    }
}
