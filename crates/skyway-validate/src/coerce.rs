//! Schema-guided coercion of transport values.
//!
//! Query, path and header values arrive as strings. Before the schema
//! engine runs, values are reshaped toward the declared types: defaults
//! fill absent properties, collection-formatted strings are split, scalars
//! are parsed, and undeclared properties are dropped where the schema sets
//! `additionalProperties: false`. Values that cannot be coerced are left
//! alone so the engine reports the type mismatch.

use serde_json::{Map, Number, Value};

use crate::collection::CollectionFormat;
use crate::schema::COLLECTION_FORMAT_KEY;

/// Reshapes `value` in place according to `schema`.
pub fn prepare(value: &mut Value, schema: &Value) {
    let Some(schema) = schema.as_object() else {
        return;
    };

    if let Some(Value::Array(branches)) = schema.get("allOf") {
        for branch in branches {
            prepare(value, branch);
        }
    }

    match schema.get("type").and_then(Value::as_str) {
        Some("array") => prepare_array(value, schema),
        Some("object") | None => {
            if let Value::Object(map) = value {
                prepare_object(map, schema);
            }
        }
        Some(kind) => coerce_scalar(value, kind),
    }
}

fn prepare_object(map: &mut Map<String, Value>, schema: &Map<String, Value>) {
    let properties = schema.get("properties").and_then(Value::as_object);

    if let Some(properties) = properties {
        for (name, property) in properties {
            match map.get_mut(name) {
                Some(value) => prepare(value, property),
                None => {
                    if let Some(default) = property.get("default") {
                        let mut value = default.clone();
                        prepare(&mut value, property);
                        map.insert(name.clone(), value);
                    }
                }
            }
        }
    }

    if schema.get("additionalProperties") == Some(&Value::Bool(false)) {
        map.retain(|name, _| properties.is_some_and(|declared| declared.contains_key(name)));
    }
}

fn prepare_array(value: &mut Value, schema: &Map<String, Value>) {
    let format = schema
        .get(COLLECTION_FORMAT_KEY)
        .and_then(Value::as_str)
        .and_then(CollectionFormat::parse);

    let splitting = format.filter(|f| *f != CollectionFormat::Multi);
    if let (Value::String(raw), Some(format)) = (&*value, splitting) {
        let items: Vec<Value> = format.split(raw).into_iter().map(Value::String).collect();
        *value = Value::Array(items);
    } else if !matches!(value, Value::Array(_) | Value::Null) {
        let single = value.take();
        *value = Value::Array(vec![single]);
    }

    if let (Value::Array(items), Some(item_schema)) = (value, schema.get("items")) {
        for item in items {
            prepare(item, item_schema);
        }
    }
}

fn coerce_scalar(value: &mut Value, kind: &str) {
    if let Value::Array(items) = value {
        if items.len() == 1 {
            let single = items.remove(0);
            *value = single;
        } else {
            return;
        }
    }

    let coerced = match (kind, &*value) {
        ("integer" | "number", Value::String(raw)) => parse_number(raw).map(Value::Number),
        ("boolean", Value::String(raw)) => match raw.as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        ("string", Value::Number(number)) => Some(Value::String(number.to_string())),
        ("string", Value::Bool(flag)) => Some(Value::String(flag.to_string())),
        ("null", Value::String(raw)) if raw.is_empty() => Some(Value::Null),
        _ => None,
    };

    if let Some(coerced) = coerced {
        *value = coerced;
    }
}

fn parse_number(raw: &str) -> Option<Number> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(integer) = raw.parse::<i64>() {
        return Some(Number::from(integer));
    }
    raw.parse::<f64>()
        .ok()
        .filter(|float| float.is_finite())
        .and_then(Number::from_f64)
}
