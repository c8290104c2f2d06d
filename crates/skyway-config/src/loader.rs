//! Layered configuration loading.
//!
//! Layers apply in order, later ones overriding earlier ones key by key:
//! 1. defaults (or a preset)
//! 2. files and strings, TOML or JSON
//! 3. environment variables, when a prefix is set

use std::env;
use std::fs;
use std::path::Path;

use serde_json::Value;
use skyway_validate::AdditionalProperties;
use tracing::{debug, warn};

use crate::schema::CorsConfig;
use crate::{ConfigError, SkywayConfig};

/// Builds a [`SkywayConfig`] from layered sources.
///
/// # Example
///
/// ```no_run
/// use skyway_config::ConfigLoader;
///
/// # fn main() -> Result<(), skyway_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_optional_file("skyway.toml")?
///     .with_dotenv()?
///     .with_env_prefix("SKYWAY")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: SkywayConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader starting from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: SkywayConfig::default(),
            env_prefix: None,
        }
    }

    /// Resets to the default values.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = SkywayConfig::default();
        self
    }

    /// Resets to the development preset.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = SkywayConfig::development();
        self
    }

    /// Resets to the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = SkywayConfig::production();
        self
    }

    /// Applies a `.toml` or `.json` file.
    ///
    /// # Errors
    ///
    /// Fails when the file is missing, unreadable, malformed, has an
    /// unknown extension or contains unknown keys.
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| ConfigError::unsupported_format(path.display().to_string()))?;

        debug!(path = %path.display(), "loading configuration file");
        self.with_string(&content, &format)
    }

    /// Applies a file when it exists.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Applies configuration text; `format` is `"toml"` or `"json"`.
    ///
    /// ```
    /// use skyway_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[routes]\nfail_on_missing_handler = true", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert!(config.routes.fail_on_missing_handler);
    /// assert_eq!(config.routes.docs_path, "/docs");
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        let layer: Value = match format.to_lowercase().as_str() {
            "toml" => {
                // Typed parse first so unknown keys report against the file.
                toml::from_str::<SkywayConfig>(content)?;
                serde_json::to_value(toml::from_str::<toml::Table>(content)?)?
            }
            "json" => {
                serde_json::from_str::<SkywayConfig>(content)?;
                serde_json::from_str(content)?
            }
            other => return Err(ConfigError::unsupported_format(other)),
        };

        self.merge_layer(layer)?;
        Ok(self)
    }

    /// Reads overrides from `PREFIX__SECTION__KEY` variables at load time.
    ///
    /// For example, with prefix `SKYWAY`:
    /// - `SKYWAY__ROUTES__FAIL_ON_MISSING_HANDLER=true`
    /// - `SKYWAY__VALIDATION__QUERY=strip`
    /// - `SKYWAY__LOGGING__LEVEL=debug`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Loads `.env` from the current directory or its parents, if any.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }
        Ok(self)
    }

    /// Loads variables from a specific env file.
    pub fn with_dotenv_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        dotenvy::from_path(path.as_ref())?;
        Ok(self)
    }

    /// Applies environment overrides and validates the result.
    pub fn load(mut self) -> Result<SkywayConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }
        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the configuration without env overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> SkywayConfig {
        self.config
    }

    fn merge_layer(&mut self, layer: Value) -> Result<(), ConfigError> {
        let mut merged = serde_json::to_value(&self.config)?;
        merge_values(&mut merged, layer);
        self.config = serde_json::from_value(merged)?;
        Ok(())
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let mut vars: Vec<(String, String)> = env::vars()
            .filter(|(key, _)| key.starts_with(prefix))
            .collect();
        vars.sort();

        for (key, value) in vars {
            self.apply_env_var(&key, &value, prefix)?;
        }
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(rest) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__")) else {
            return Ok(());
        };
        let parts: Vec<&str> = rest.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            ["ROUTES", "FAIL_ON_MISSING_HANDLER"] => {
                config.routes.fail_on_missing_handler = env_bool(key, value)?;
            }
            ["ROUTES", "DOCS_PATH"] => config.routes.docs_path = value.to_string(),

            ["CORS", field] => {
                let cors = config.cors.get_or_insert_with(CorsConfig::default);
                match *field {
                    "ORIGIN" => {
                        cors.origin = Some(match parse_bool(value) {
                            Some(flag) => Value::Bool(flag),
                            None if value.contains(',') => Value::from(split_list(value)),
                            None => Value::String(value.to_string()),
                        });
                    }
                    "ALLOWED_HEADERS" => cors.allowed_headers = Some(split_list(value)),
                    "EXPOSED_HEADERS" => cors.exposed_headers = Some(split_list(value)),
                    "CREDENTIALS" => cors.credentials = Some(env_bool(key, value)?),
                    "MAX_AGE" => {
                        cors.max_age = Some(
                            value
                                .parse()
                                .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))?,
                        );
                    }
                    _ => warn!(var = %key, "unknown configuration variable"),
                }
            }

            ["VALIDATION", "PATH"] => config.validation.path = env_policy(key, value)?,
            ["VALIDATION", "QUERY"] => config.validation.query = env_policy(key, value)?,
            ["VALIDATION", "HEADER"] => config.validation.header = env_policy(key, value)?,
            ["VALIDATION", "BODY"] => config.validation.body = env_policy(key, value)?,

            ["LOGGING", "ENABLED"] => config.logging.enabled = env_bool(key, value)?,
            ["LOGGING", "LEVEL"] => config.logging.level = value.to_string(),
            ["LOGGING", "JSON_FORMAT"] => config.logging.json_format = env_bool(key, value)?,
            ["LOGGING", "SPAN_EVENTS"] => config.logging.span_events = env_bool(key, value)?,
            ["LOGGING", "FILE_LINE_INFO"] => config.logging.file_line_info = env_bool(key, value)?,
            ["LOGGING", "THREAD_IDS"] => config.logging.thread_ids = env_bool(key, value)?,
            ["LOGGING", "INCLUDE_TARGET"] => config.logging.include_target = env_bool(key, value)?,
            ["LOGGING", "SERVICE_NAME"] => config.logging.service_name = value.to_string(),

            _ => warn!(var = %key, "unknown configuration variable"),
        }

        Ok(())
    }
}

/// Objects merge key by key; anything else is replaced.
fn merge_values(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, layer) => *base = layer,
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

fn env_policy(key: &str, value: &str) -> Result<AdditionalProperties, ConfigError> {
    match value.to_lowercase().as_str() {
        "strip" => Ok(AdditionalProperties::Strip),
        "allow" => Ok(AdditionalProperties::Allow),
        _ => Err(ConfigError::env_parse_error(key, "expected 'strip' or 'allow'")),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}
