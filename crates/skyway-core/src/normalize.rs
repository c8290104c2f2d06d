//! Schema normalization.
//!
//! Turns a raw, dereferenced Swagger 2.0 document into a
//! [`NormalizedDocument`]: a flat, ordered list of operations with merged
//! parameters, inherited `consumes`/`produces`/`security`, and merged
//! vendor extensions.
//!
//! Inheritance rules:
//!
//! | Property | Rule |
//! |---|---|
//! | `securityDefinitions` | document root |
//! | `x-cors-options` | root, path, operation (later overrides) |
//! | `security` | operation, else root, else empty |
//! | `parameters` | path then operation, concatenated |
//! | `consumes` / `produces` | operation, else root, else empty |
//! | `x-*` extensions | root, path, operation (later overrides) |

use std::sync::OnceLock;

use http::Method;
use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::model::{
    ApiKeyLocation, NormalizedDocument, Operation, ParamLocation, Parameter, ParameterGroups,
    PathItem, SchemeKind, SecurityRequirement, SecurityScheme,
};
use crate::schema_error::{SchemaError, SchemaErrorDetail};

/// Vendor extension holding CORS overrides.
pub const CORS_EXTENSION: &str = "x-cors-options";

/// Vendor extension marking private documentation subtrees.
pub const PRIVATE_EXTENSION: &str = "x-private";

/// Method keys recognized inside a path item, in Swagger order.
pub const SWAGGER_METHODS: [&str; 7] = ["get", "put", "post", "delete", "options", "head", "patch"];

/// Maps a path item key to an HTTP method, if it names one.
#[must_use]
pub fn swagger_method(key: &str) -> Option<Method> {
    match key {
        "get" => Some(Method::GET),
        "put" => Some(Method::PUT),
        "post" => Some(Method::POST),
        "delete" => Some(Method::DELETE),
        "options" => Some(Method::OPTIONS),
        "head" => Some(Method::HEAD),
        "patch" => Some(Method::PATCH),
        _ => None,
    }
}

fn template_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([^}]+)\}").expect("static pattern"))
}

/// Converts `/users/{id}` to `/users/:id`.
///
/// Names with characters other than letters, digits and `_` keep their
/// braces so the router captures them whole: `{user-id}` becomes
/// `:{user-id}`.
#[must_use]
pub fn to_router_path(template: &str) -> String {
    template_pattern()
        .replace_all(template, |captures: &regex::Captures<'_>| {
            let name = &captures[1];
            if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                format!(":{name}")
            } else {
                format!(":{{{name}}}")
            }
        })
        .into_owned()
}

/// Picks `x-` keys other than `x-private`.
fn extensions_of(object: &Map<String, Value>) -> Map<String, Value> {
    object
        .iter()
        .filter(|(key, _)| key.starts_with("x-") && key.as_str() != PRIVATE_EXTENSION)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    value.and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(ToString::to_string)
            .collect()
    })
}

fn security_list(value: Option<&Value>) -> Option<Vec<SecurityRequirement>> {
    let items = value?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(Value::as_object)
            .map(|requirement| {
                requirement
                    .iter()
                    .map(|(scheme, scopes)| {
                        (scheme.clone(), string_list(Some(scopes)).unwrap_or_default())
                    })
                    .collect::<SecurityRequirement>()
            })
            .collect(),
    )
}

/// Runs the structural checks the rest of the pipeline relies on.
///
/// This is not a full Swagger validator; it rejects the shapes that would
/// otherwise make normalization or routing meaningless.
pub fn check_structure(document: &Value) -> Result<(), SchemaError> {
    let Some(root) = document.as_object() else {
        return Err(SchemaError::new(
            "API document is not a valid Swagger API definition",
        ));
    };
    if root.get("swagger").and_then(Value::as_str) != Some("2.0") {
        return Err(SchemaError::new(format!(
            "{} is not a valid Swagger API definition",
            root.get("info")
                .and_then(|info| info.get("title"))
                .and_then(Value::as_str)
                .unwrap_or("API document")
        )));
    }

    let mut details = Vec::new();
    match root.get("info").and_then(Value::as_object) {
        None => details.push(SchemaErrorDetail::new(["info"], "Missing required property: info")),
        Some(info) => {
            for key in ["title", "version"] {
                if !info.contains_key(key) {
                    details.push(SchemaErrorDetail::new(
                        ["info"],
                        format!("Missing required property: {key}"),
                    ));
                }
            }
        }
    }

    match root.get("paths").and_then(Value::as_object) {
        None => details.push(SchemaErrorDetail::new(["paths"], "Missing required property: paths")),
        Some(paths) => {
            for (path, item) in paths.iter().filter(|(key, _)| key.starts_with('/')) {
                let Some(item) = item.as_object() else {
                    details.push(SchemaErrorDetail::new(["paths", path.as_str()], "Expected type object"));
                    continue;
                };
                check_parameters(item.get("parameters"), &["paths", path.as_str(), "parameters"], &mut details);
                for method in SWAGGER_METHODS {
                    if let Some(operation) = item.get(method) {
                        check_parameters(
                            operation.get("parameters"),
                            &["paths", path.as_str(), method, "parameters"],
                            &mut details,
                        );
                    }
                }
            }
        }
    }

    if details.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::with_details("Swagger schema validation failed.", details))
    }
}

fn check_parameters(parameters: Option<&Value>, base: &[&str], details: &mut Vec<SchemaErrorDetail>) {
    let Some(parameters) = parameters.and_then(Value::as_array) else {
        return;
    };
    for (index, parameter) in parameters.iter().enumerate() {
        let index = index.to_string();
        let path: Vec<&str> = base.iter().copied().chain([index.as_str()]).collect();
        let Some(parameter) = parameter.as_object() else {
            details.push(SchemaErrorDetail::new(path, "Expected type object"));
            continue;
        };
        if !parameter.get("name").is_some_and(Value::is_string) {
            details.push(SchemaErrorDetail::new(path.clone(), "Missing required property: name"));
        }
        match parameter.get("in").and_then(Value::as_str) {
            None => details.push(SchemaErrorDetail::new(path, "Missing required property: in")),
            Some(location) => match ParamLocation::parse(location) {
                None => details.push(SchemaErrorDetail::new(
                    path,
                    format!("No enum match for: \"{location}\""),
                )),
                Some(ParamLocation::Body) if !parameter.contains_key("schema") => details.push(
                    SchemaErrorDetail::new(path, "Missing required property: schema"),
                ),
                Some(_) => {}
            },
        }
    }
}

fn parse_parameters(value: Option<&Value>) -> Vec<Parameter> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .filter_map(Parameter::from_definition)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_security_definitions(
    root: &Map<String, Value>,
) -> Result<IndexMap<String, SecurityScheme>, SchemaError> {
    let Some(definitions) = root.get("securityDefinitions").and_then(Value::as_object) else {
        return Ok(IndexMap::new());
    };

    let mut schemes = IndexMap::with_capacity(definitions.len());
    for (name, definition) in definitions {
        let kind = match definition.get("type").and_then(Value::as_str) {
            Some("basic") => SchemeKind::Basic,
            Some("oauth2") => SchemeKind::OAuth2,
            Some("apiKey") => {
                let key_name = definition.get("name").and_then(Value::as_str);
                let location = match definition.get("in").and_then(Value::as_str) {
                    Some("query") => Some(ApiKeyLocation::Query),
                    Some("header") => Some(ApiKeyLocation::Header),
                    _ => None,
                };
                match (key_name, location) {
                    (Some(key_name), Some(location)) => SchemeKind::ApiKey {
                        name: key_name.to_string(),
                        location,
                    },
                    _ => {
                        return Err(SchemaError::with_details(
                            "Swagger schema validation failed.",
                            vec![SchemaErrorDetail::new(
                                ["securityDefinitions", name.as_str()],
                                "apiKey scheme requires `name` and `in` (query or header)",
                            )],
                        ))
                    }
                }
            }
            other => {
                return Err(SchemaError::with_details(
                    "Swagger schema validation failed.",
                    vec![SchemaErrorDetail::new(
                        ["securityDefinitions", name.as_str(), "type"],
                        format!("No enum match for: {}", other.map_or_else(|| "null".to_string(), |t| format!("\"{t}\""))),
                    )],
                ))
            }
        };
        schemes.insert(name.clone(), SecurityScheme::new(name, kind, definition.clone()));
    }
    Ok(schemes)
}

/// Normalizes a structurally valid document.
///
/// Only keys beginning with `/` under `paths` are treated as paths, and only
/// the seven Swagger method keys are treated as operations.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use skyway_core::normalize::normalize;
///
/// let document = json!({
///     "swagger": "2.0",
///     "info": { "title": "Users", "version": "1.0.0" },
///     "basePath": "/api",
///     "paths": {
///         "/users/{id}": {
///             "get": { "responses": { "200": { "description": "ok" } } }
///         }
///     }
/// });
///
/// let normalized = normalize(&document).unwrap();
/// let operation = normalized.operations().next().unwrap();
/// assert_eq!(operation.router_path, "/api/users/:id");
/// ```
pub fn normalize(document: &Value) -> Result<NormalizedDocument, SchemaError> {
    let root = document
        .as_object()
        .ok_or_else(|| SchemaError::new("API document is not a valid Swagger API definition"))?;

    let base_path = root
        .get("basePath")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim_end_matches('/')
        .to_string();
    let root_consumes = string_list(root.get("consumes")).unwrap_or_default();
    let root_produces = string_list(root.get("produces")).unwrap_or_default();
    let root_security = security_list(root.get("security")).unwrap_or_default();
    let root_extensions = extensions_of(root);
    let security_definitions = parse_security_definitions(root)?;

    let empty = Map::new();
    let paths_object = root.get("paths").and_then(Value::as_object).unwrap_or(&empty);
    // Extensions declared directly on the paths object apply to every path.
    let paths_extensions = extensions_of(paths_object);

    let mut paths = Vec::new();
    for (template, item) in paths_object.iter().filter(|(key, _)| key.starts_with('/')) {
        let Some(item) = item.as_object() else {
            continue;
        };
        let router_path = format!("{base_path}{}", to_router_path(template));
        let path_parameters = parse_parameters(item.get("parameters"));
        let mut path_extensions = paths_extensions.clone();
        path_extensions.extend(extensions_of(item));

        let mut operations = Vec::new();
        for (key, meta) in item {
            let Some(method) = swagger_method(key) else {
                continue;
            };
            let Some(meta) = meta.as_object() else {
                continue;
            };

            let mut parameters = ParameterGroups::new();
            for parameter in path_parameters
                .iter()
                .cloned()
                .chain(parse_parameters(meta.get("parameters")))
            {
                parameters.push(parameter);
            }
            if parameters.get(ParamLocation::Body).len() > 1 {
                debug!(
                    path = %template,
                    method = %method,
                    "multiple body parameters declared, the last one wins"
                );
            }

            let mut extensions = root_extensions.clone();
            extensions.extend(path_extensions.clone());
            extensions.extend(extensions_of(meta));

            operations.push(Operation {
                method,
                path: template.clone(),
                router_path: router_path.clone(),
                operation_id: meta
                    .get("operationId")
                    .and_then(Value::as_str)
                    .map(ToString::to_string),
                parameters,
                consumes: string_list(meta.get("consumes")).unwrap_or_else(|| root_consumes.clone()),
                produces: string_list(meta.get("produces")).unwrap_or_else(|| root_produces.clone()),
                security: security_list(meta.get("security")).unwrap_or_else(|| root_security.clone()),
                extensions,
                cors: meta.get(CORS_EXTENSION).cloned(),
                responses: meta.get("responses").cloned(),
            });
        }

        paths.push(PathItem {
            path: template.clone(),
            router_path,
            cors: item.get(CORS_EXTENSION).cloned(),
            operations,
        });
    }

    let normalized = NormalizedDocument {
        base_path,
        security_definitions,
        cors: root.get(CORS_EXTENSION).cloned(),
        paths,
    };
    debug!(
        paths = normalized.paths.len(),
        operations = normalized.operations().count(),
        "document normalized"
    );
    Ok(normalized)
}
