//! Configuration sections.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Route mounting behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutesConfig {
    /// Answer 501 when an operation has no handler, instead of falling
    /// through to 404.
    #[serde(default)]
    pub fail_on_missing_handler: bool,

    /// Path serving the filtered API document. Empty disables it.
    #[serde(default = "default_docs_path")]
    pub docs_path: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            fail_on_missing_handler: false,
            docs_path: default_docs_path(),
        }
    }
}

fn default_docs_path() -> String {
    "/docs".to_string()
}

/// Root CORS defaults.
///
/// Written in snake case here; [`CorsConfig::to_layer`] produces the
/// camel-case object that `x-cors-options` layers are merged onto. Only
/// the keys that are set end up in the layer.
///
/// ```toml
/// [cors]
/// origin = ["https://app.example.com"]
/// allowed_headers = ["content-type", "x-api-key"]
/// credentials = true
/// max_age = 600
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    /// `"*"`, `true`, `false`, one origin or a list of origins.
    #[serde(default)]
    pub origin: Option<Value>,

    /// Headers a preflight allows.
    #[serde(default)]
    pub allowed_headers: Option<Vec<String>>,

    /// Headers exposed to scripts.
    #[serde(default)]
    pub exposed_headers: Option<Vec<String>>,

    /// Allow credentials.
    #[serde(default)]
    pub credentials: Option<bool>,

    /// Preflight cache lifetime in seconds.
    #[serde(default)]
    pub max_age: Option<u64>,
}

impl CorsConfig {
    /// The root CORS options layer.
    #[must_use]
    pub fn to_layer(&self) -> Value {
        let mut layer = Map::new();
        if let Some(origin) = &self.origin {
            layer.insert("origin".to_string(), origin.clone());
        }
        if let Some(headers) = &self.allowed_headers {
            layer.insert("allowedHeaders".to_string(), Value::from(headers.clone()));
        }
        if let Some(headers) = &self.exposed_headers {
            layer.insert("exposedHeaders".to_string(), Value::from(headers.clone()));
        }
        if let Some(credentials) = self.credentials {
            layer.insert("credentials".to_string(), Value::Bool(credentials));
        }
        if let Some(max_age) = self.max_age {
            layer.insert("maxAge".to_string(), Value::from(max_age));
        }
        Value::Object(layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_routes_defaults() {
        let routes: RoutesConfig = toml::from_str("").unwrap();
        assert!(!routes.fail_on_missing_handler);
        assert_eq!(routes.docs_path, "/docs");
    }

    #[test]
    fn test_cors_layer_only_has_set_keys() {
        let cors = CorsConfig {
            origin: Some(json!(true)),
            max_age: Some(600),
            ..CorsConfig::default()
        };
        assert_eq!(cors.to_layer(), json!({ "origin": true, "maxAge": 600 }));
        assert_eq!(CorsConfig::default().to_layer(), json!({}));
    }

    #[test]
    fn test_cors_from_toml() {
        let cors: CorsConfig = toml::from_str(
            r#"
            origin = ["https://a.example", "https://b.example"]
            allowed_headers = ["content-type"]
            credentials = true
            "#,
        )
        .unwrap();
        assert_eq!(
            cors.to_layer(),
            json!({
                "origin": ["https://a.example", "https://b.example"],
                "allowedHeaders": ["content-type"],
                "credentials": true
            })
        );
    }

    #[test]
    fn test_cors_rejects_camel_case() {
        let result: Result<CorsConfig, _> = toml::from_str("allowedHeaders = [\"a\"]");
        assert!(result.is_err());
    }
}
