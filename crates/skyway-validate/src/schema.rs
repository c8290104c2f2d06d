//! Builds one JSON schema per parameter location.

use serde_json::{json, Map, Value};
use skyway_core::{ParamLocation, Parameter};
use tracing::debug;

use crate::collection::CollectionFormat;
use crate::config::AdditionalProperties;

/// Parameter keywords that carry over into the property schema.
pub const VALID_PARAM_KEYS: [&str; 16] = [
    "type",
    "format",
    "default",
    "items",
    "maximum",
    "exclusiveMaximum",
    "minimum",
    "exclusiveMinimum",
    "maxLength",
    "minLength",
    "pattern",
    "maxItems",
    "minItems",
    "uniqueItems",
    "enum",
    "multipleOf",
];

/// Keyword carrying the collection format on array properties.
///
/// The schema engine ignores it; coercion reads it to split raw strings.
pub const COLLECTION_FORMAT_KEY: &str = "collectionFormat";

/// Builds the object schema for the parameters of one location.
///
/// Header names are lowercased. Path parameters are always required.
/// `file` parameters only contribute to `required`. A body parameter's
/// nested schema is merged into the result; with several, the last wins.
///
/// ```rust
/// use serde_json::json;
/// use skyway_core::Parameter;
/// use skyway_validate::{schema_from_params, AdditionalProperties};
///
/// let id = json!({ "name": "id", "in": "path", "type": "integer" });
/// let params = vec![Parameter::from_definition(id.as_object().unwrap()).unwrap()];
///
/// let schema = schema_from_params(&params, AdditionalProperties::Allow);
/// assert_eq!(schema["properties"]["id"], json!({ "type": "integer" }));
/// assert_eq!(schema["required"], json!(["id"]));
/// ```
#[must_use]
pub fn schema_from_params(parameters: &[Parameter], policy: AdditionalProperties) -> Value {
    let mut schema = Map::new();
    if policy == AdditionalProperties::Strip {
        schema.insert("additionalProperties".to_string(), Value::Bool(false));
    }

    let mut properties = Map::new();
    let mut required: Vec<String> = Vec::new();
    let mut has_fields = false;
    let mut body_seen = false;

    for parameter in parameters {
        if parameter.location() == ParamLocation::Body {
            if body_seen {
                debug!(parameter = parameter.name(), "later body parameter overrides earlier one");
            }
            body_seen = true;
            if let Some(Value::Object(body)) = parameter.schema() {
                for (key, value) in body {
                    schema.insert(key.clone(), value.clone());
                }
            }
            continue;
        }

        has_fields = true;
        let name = if parameter.location() == ParamLocation::Header {
            parameter.name().to_ascii_lowercase()
        } else {
            parameter.name().to_string()
        };

        if parameter.is_required() && !required.contains(&name) {
            required.push(name.clone());
        }
        if parameter.param_type() == Some("file") {
            continue;
        }

        properties.insert(name, property_schema(parameter));
    }

    if has_fields {
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), json!(required));
        }
    }

    Value::Object(schema)
}

fn property_schema(parameter: &Parameter) -> Value {
    let definition = parameter.definition();
    let mut property: Map<String, Value> = VALID_PARAM_KEYS
        .iter()
        .filter_map(|key| definition.get(*key).map(|value| ((*key).to_string(), value.clone())))
        .collect();

    if parameter.param_type() == Some("array") {
        let format = parameter
            .collection_format()
            .and_then(CollectionFormat::parse)
            .unwrap_or_default();
        property.insert(COLLECTION_FORMAT_KEY.to_string(), json!(format.as_str()));
    }

    Value::Object(property)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(values: Value) -> Vec<Parameter> {
        values
            .as_array()
            .unwrap()
            .iter()
            .map(|v| Parameter::from_definition(v.as_object().unwrap()).unwrap())
            .collect()
    }

    #[test]
    fn test_headers_are_lowercased() {
        let schema = schema_from_params(
            &params(json!([{ "name": "X-Request-Token", "in": "header", "type": "string", "required": true }])),
            AdditionalProperties::Strip,
        );
        assert_eq!(schema["required"], json!(["x-request-token"]));
        assert!(schema["properties"]["x-request-token"].is_object());
        assert_eq!(schema["additionalProperties"], json!(false));
    }

    #[test]
    fn test_unknown_keys_are_dropped() {
        let schema = schema_from_params(
            &params(json!([{
                "name": "limit", "in": "query", "type": "integer",
                "maximum": 100, "description": "page size", "x-internal": true
            }])),
            AdditionalProperties::Allow,
        );
        assert_eq!(schema["properties"]["limit"], json!({ "type": "integer", "maximum": 100 }));
        assert!(schema.get("required").is_none());
        assert!(schema.get("additionalProperties").is_none());
    }

    #[test]
    fn test_array_gets_collection_format() {
        let schema = schema_from_params(
            &params(json!([
                { "name": "tags", "in": "query", "type": "array", "items": { "type": "string" } },
                { "name": "ids", "in": "query", "type": "array", "collectionFormat": "pipes",
                  "items": { "type": "integer" } }
            ])),
            AdditionalProperties::Allow,
        );
        assert_eq!(schema["properties"]["tags"][COLLECTION_FORMAT_KEY], json!("csv"));
        assert_eq!(schema["properties"]["ids"][COLLECTION_FORMAT_KEY], json!("pipes"));
    }

    #[test]
    fn test_file_only_contributes_required() {
        let schema = schema_from_params(
            &params(json!([{ "name": "upload", "in": "formData", "type": "file", "required": true }])),
            AdditionalProperties::Allow,
        );
        assert_eq!(schema["required"], json!(["upload"]));
        assert!(schema["properties"].get("upload").is_none());
    }

    #[test]
    fn test_last_body_schema_wins() {
        let schema = schema_from_params(
            &params(json!([
                { "name": "a", "in": "body", "schema": { "type": "object", "required": ["first"] } },
                { "name": "b", "in": "body", "schema": { "type": "object", "required": ["second"] } }
            ])),
            AdditionalProperties::Allow,
        );
        assert_eq!(schema["required"], json!(["second"]));
    }

    #[test]
    fn test_no_parameters_accepts_anything() {
        assert_eq!(schema_from_params(&[], AdditionalProperties::Allow), json!({}));
    }
}
