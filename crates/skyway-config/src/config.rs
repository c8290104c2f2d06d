//! The root configuration.

use serde::{Deserialize, Serialize};
use skyway_telemetry::LogConfig;
use skyway_validate::ValidationConfig;

use crate::schema::{CorsConfig, RoutesConfig};
use crate::ConfigError;

/// Complete Skyway configuration.
///
/// Every section is optional in a file; missing keys keep their defaults
/// and unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SkywayConfig {
    /// Route mounting behaviour.
    #[serde(default)]
    pub routes: RoutesConfig,

    /// Root CORS defaults. CORS stays off unless this section or an
    /// `x-cors-options` extension is present.
    #[serde(default)]
    pub cors: Option<CorsConfig>,

    /// Undeclared-property policy per parameter location.
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Log output.
    #[serde(default)]
    pub logging: LogConfig,
}

impl SkywayConfig {
    /// Readable logs at debug level, missing handlers reported as 501.
    #[must_use]
    pub fn development() -> Self {
        Self {
            routes: RoutesConfig {
                fail_on_missing_handler: true,
                ..RoutesConfig::default()
            },
            logging: LogConfig::development(),
            ..Self::default()
        }
    }

    /// JSON logs at info level.
    #[must_use]
    pub fn production() -> Self {
        Self {
            logging: LogConfig::production(),
            ..Self::default()
        }
    }

    /// Checks values serde cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let docs_path = &self.routes.docs_path;
        if !docs_path.is_empty() && !docs_path.starts_with('/') {
            return Err(ConfigError::invalid_value(
                "routes.docs_path",
                "must be empty or start with '/'",
            ));
        }

        if self.logging.enabled {
            self.logging
                .filter()
                .map_err(|e| ConfigError::invalid_value("logging.level", e.to_string()))?;
        }

        if let Some(origin) = self.cors.as_ref().and_then(|cors| cors.origin.as_ref()) {
            let valid = match origin {
                serde_json::Value::Bool(_) | serde_json::Value::String(_) => true,
                serde_json::Value::Array(items) => items.iter().all(serde_json::Value::is_string),
                _ => false,
            };
            if !valid {
                return Err(ConfigError::invalid_value(
                    "cors.origin",
                    "expected a boolean, a string or a list of strings",
                ));
            }
        }

        Ok(())
    }
}
