//! JSON schemas for strict structured output, generated from Rust types.
//!
//! ```rust,ignore
//! #[derive(Deserialize, JsonSchema)]
//! struct Links {
//!     relevant_links: Vec<Link>,
//! }
//!
//! let format = ResponseFormat::json_schema::<Links>();
//! ```

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A type the model can be asked to produce.
///
/// Strict mode on the OpenAI API wants every object closed
/// (`additionalProperties: false`), every property listed in `required`
/// (nullable ones included) and no `$ref` indirection.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    fn openai_schema() -> Value {
        let mut value = serde_json::to_value(schema_for!(Self)).unwrap_or_default();

        close_objects(&mut value);

        let definitions = value.get("definitions").cloned();
        if let Some(definitions) = definitions {
            inline_refs(&mut value, &definitions);
        }

        if let Value::Object(map) = &mut value {
            map.remove("definitions");
            map.remove("$schema");
        }

        value
    }

    fn type_name() -> String {
        <Self as JsonSchema>::schema_name()
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

fn close_objects(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if map.get("type").and_then(Value::as_str) == Some("object") {
                map.insert("additionalProperties".into(), Value::Bool(false));

                let required: Option<Vec<Value>> = map
                    .get("properties")
                    .and_then(Value::as_object)
                    .map(|props| props.keys().cloned().map(Value::String).collect());
                if let Some(required) = required {
                    map.insert("required".into(), Value::Array(required));
                }
            }

            for (_, child) in map.iter_mut() {
                close_objects(child);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(close_objects),
        _ => {}
    }
}

fn inline_refs(value: &mut Value, definitions: &Value) {
    match value {
        Value::Object(map) => {
            let target = map
                .get("$ref")
                .and_then(Value::as_str)
                .and_then(|path| path.strip_prefix("#/definitions/"))
                .and_then(|name| definitions.get(name))
                .cloned();

            if let Some(definition) = target {
                *value = definition;
                inline_refs(value, definitions);
                return;
            }

            for (_, child) in map.iter_mut() {
                inline_refs(child, definitions);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                inline_refs(item, definitions);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct Link {
        #[serde(rename = "type")]
        kind: String,
        url: Option<String>,
    }

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct Links {
        links: Vec<Link>,
    }

    fn required_of(schema: &Value) -> Vec<&str> {
        schema["required"]
            .as_array()
            .expect("required array")
            .iter()
            .filter_map(Value::as_str)
            .collect()
    }

    #[test]
    fn test_root_is_closed_and_unwrapped() {
        let schema = Links::openai_schema();
        let obj = schema.as_object().unwrap();

        assert_eq!(obj.get("type"), Some(&Value::String("object".into())));
        assert_eq!(obj.get("additionalProperties"), Some(&Value::Bool(false)));
        assert!(!obj.contains_key("definitions"));
        assert!(!obj.contains_key("$schema"));
    }

    #[test]
    fn test_nested_items_are_inlined() {
        let schema = Links::openai_schema();
        let item = &schema["properties"]["links"]["items"];

        assert!(item.get("$ref").is_none(), "item schema should be inlined: {item}");
        assert_eq!(item["type"], "object");
        assert_eq!(item["additionalProperties"], false);
    }

    #[test]
    fn test_optional_and_renamed_fields_are_required() {
        let schema = Links::openai_schema();
        let item = &schema["properties"]["links"]["items"];
        let required = required_of(item);

        assert!(required.contains(&"type"), "got {required:?}");
        assert!(required.contains(&"url"), "got {required:?}");
    }

    #[test]
    fn test_type_name() {
        assert_eq!(Links::type_name(), "Links");
    }
}
