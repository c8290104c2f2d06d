//! Removal of private parts of the document.
//!
//! An object whose `x-private` is `true` is removed together with
//! everything below it. An object whose `x-private` is an array removes the
//! listed paths, relative to itself, and keeps the rest. Each entry is a
//! key, an index, or an array of keys and indices. The marker key itself
//! never survives.
//!
//! Paths are resolved against the unfiltered tree, so removing one array
//! element never shifts the index another entry refers to.

use serde_json::{Map, Value};

/// The vendor extension marking private content.
pub const PRIVATE_MARKER: &str = "x-private";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(key) => Some(Self::Key(key.clone())),
            Value::Number(n) => n.as_u64().and_then(|i| usize::try_from(i).ok()).map(Self::Index),
            _ => None,
        }
    }

    fn matches_key(&self, key: &str) -> bool {
        match self {
            Self::Key(k) => k == key,
            Self::Index(i) => key.parse::<usize>().ok() == Some(*i),
        }
    }

    fn matches_index(&self, index: usize) -> bool {
        match self {
            Self::Index(i) => *i == index,
            Self::Key(k) => k.parse::<usize>().ok() == Some(index),
        }
    }
}

fn hidden_paths(entries: &[Value]) -> Vec<Vec<Segment>> {
    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::Array(parts) => parts.iter().map(Segment::from_value).collect(),
            other => Segment::from_value(other).map(|segment| vec![segment]),
        })
        .filter(|path: &Vec<Segment>| !path.is_empty())
        .collect()
}

/// Returns the document without its private parts, or `None` when the
/// value itself is private.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use skyway_docs::filter_private;
///
/// let doc = json!({
///     "paths": {
///         "/health": { "x-private": true, "get": {} },
///         "/users": { "get": {} }
///     },
///     "x-private": ["securityDefinitions"],
///     "securityDefinitions": { "key": { "type": "apiKey" } }
/// });
///
/// assert_eq!(
///     filter_private(&doc),
///     Some(json!({ "paths": { "/users": { "get": {} } } }))
/// );
/// ```
#[must_use]
pub fn filter_private(value: &Value) -> Option<Value> {
    filter_node(value, &[])
}

fn filter_node(value: &Value, hidden: &[&[Segment]]) -> Option<Value> {
    match value {
        Value::Object(map) => filter_object(map, hidden),
        Value::Array(items) => Some(Value::Array(
            items
                .iter()
                .enumerate()
                .filter_map(|(index, item)| {
                    if hidden.iter().any(|p| p.len() == 1 && p[0].matches_index(index)) {
                        return None;
                    }
                    let nested = descend(hidden, |segment| segment.matches_index(index));
                    filter_node(item, &nested)
                })
                .collect(),
        )),
        other => Some(other.clone()),
    }
}

fn filter_object(map: &Map<String, Value>, hidden: &[&[Segment]]) -> Option<Value> {
    let own = match map.get(PRIVATE_MARKER) {
        Some(Value::Bool(true)) => return None,
        Some(Value::Array(entries)) => hidden_paths(entries),
        _ => Vec::new(),
    };
    let hidden: Vec<&[Segment]> = hidden
        .iter()
        .copied()
        .chain(own.iter().map(Vec::as_slice))
        .collect();

    let mut out = Map::new();
    for (key, child) in map {
        if key == PRIVATE_MARKER
            || hidden.iter().any(|p| p.len() == 1 && p[0].matches_key(key))
        {
            continue;
        }
        let nested = descend(&hidden, |segment| segment.matches_key(key));
        if let Some(child) = filter_node(child, &nested) {
            out.insert(key.clone(), child);
        }
    }
    Some(Value::Object(out))
}

/// Tails of the multi-segment paths whose head matches a child.
fn descend<'p>(hidden: &[&'p [Segment]], head: impl Fn(&Segment) -> bool) -> Vec<&'p [Segment]> {
    hidden
        .iter()
        .filter(|p| p.len() > 1 && head(&p[0]))
        .map(|p| &p[1..])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_private_true_removes_subtree() {
        let doc = json!({ "a": { "x-private": true, "b": 1 }, "c": 2 });
        assert_eq!(filter_private(&doc), Some(json!({ "c": 2 })));
        assert_eq!(filter_private(&json!({ "x-private": true })), None);
    }

    #[test]
    fn test_private_false_only_drops_marker() {
        let doc = json!({ "a": { "x-private": false, "b": 1 } });
        assert_eq!(filter_private(&doc), Some(json!({ "a": { "b": 1 } })));
    }

    #[test]
    fn test_array_elements_are_compacted() {
        let doc = json!({ "tags": [{ "name": "a" }, { "name": "b", "x-private": true }, { "name": "c" }] });
        assert_eq!(
            filter_private(&doc),
            Some(json!({ "tags": [{ "name": "a" }, { "name": "c" }] }))
        );
    }

    #[test]
    fn test_listed_paths_use_unfiltered_indices() {
        let doc = json!({
            "x-private": [["security", 1], ["security", 2], "securityDefinitions"],
            "security": [{ "a": [] }, { "b": [] }, { "c": [] }, { "d": [] }],
            "securityDefinitions": { "a": {} }
        });
        assert_eq!(
            filter_private(&doc),
            Some(json!({ "security": [{ "a": [] }, { "d": [] }] }))
        );
    }

    #[test]
    fn test_listed_deep_paths() {
        let doc = json!({
            "get": {
                "x-private": [["responses", "201"], ["parameters", 0, "description"]],
                "parameters": [{ "name": "id", "description": "internal" }],
                "responses": { "200": {}, "201": {} }
            }
        });
        assert_eq!(
            filter_private(&doc),
            Some(json!({
                "get": {
                    "parameters": [{ "name": "id" }],
                    "responses": { "200": {} }
                }
            }))
        );
    }

    #[test]
    fn test_missing_listed_paths_are_ignored() {
        let doc = json!({ "x-private": ["nope", ["a", "b", "c"], 3, {}], "a": 1 });
        assert_eq!(filter_private(&doc), Some(json!({ "a": 1 })));
    }
}
