//! Raw validator input taken from the request.

use std::borrow::Cow;
use std::string::FromUtf8Error;

use http::HeaderMap;
use serde_json::{Map, Value};

/// Path captures as an object of strings.
pub fn path_object<'a>(params: impl IntoIterator<Item = (&'a str, &'a str)>) -> Value {
    Value::Object(
        params
            .into_iter()
            .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
            .collect(),
    )
}

/// Query string as an object. Repeated keys collect into an array.
///
/// Fails when a percent-decoded key or value is not UTF-8.
pub fn query_object(query: Option<&str>) -> Result<Value, FromUtf8Error> {
    let mut object = Map::new();
    let pairs = query.unwrap_or_default().split('&').filter(|pair| !pair.is_empty());
    for pair in pairs {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        append(&mut object, decode(key)?, decode(value)?);
    }
    Ok(Value::Object(object))
}

fn decode(raw: &str) -> Result<String, FromUtf8Error> {
    urlencoding::decode(&raw.replace('+', " ")).map(Cow::into_owned)
}

/// Headers as an object keyed by lowercase name. Repeated headers are
/// joined with `,` so they split cleanly as `csv`.
pub fn header_object(headers: &HeaderMap) -> Value {
    let mut object = Map::new();
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(",");
        object.insert(name.as_str().to_string(), Value::String(joined));
    }
    Value::Object(object)
}

fn append(object: &mut Map<String, Value>, key: String, value: String) {
    match object.get_mut(&key) {
        Some(Value::Array(values)) => values.push(Value::String(value)),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, Value::String(value)]);
        }
        None => {
            object.insert(key, Value::String(value));
        }
    }
}
