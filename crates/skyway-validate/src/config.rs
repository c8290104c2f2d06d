//! Validation policy.

use serde::{Deserialize, Serialize};
use skyway_core::ParamLocation;

/// What happens to properties a location does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdditionalProperties {
    /// Undeclared properties are removed from the validated view.
    Strip,
    /// Undeclared properties pass through untouched.
    Allow,
}

/// Additional-property policy per parameter location.
///
/// The default strips undeclared headers and lets everything else through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationConfig {
    /// Policy for path parameters.
    #[serde(default = "allow")]
    pub path: AdditionalProperties,
    /// Policy for the query string.
    #[serde(default = "allow")]
    pub query: AdditionalProperties,
    /// Policy for headers.
    #[serde(default = "strip")]
    pub header: AdditionalProperties,
    /// Policy for body and form fields.
    #[serde(default = "allow")]
    pub body: AdditionalProperties,
}

fn allow() -> AdditionalProperties {
    AdditionalProperties::Allow
}

fn strip() -> AdditionalProperties {
    AdditionalProperties::Strip
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            path: allow(),
            query: allow(),
            header: strip(),
            body: allow(),
        }
    }
}

impl ValidationConfig {
    /// Strips undeclared properties everywhere.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            path: strip(),
            query: strip(),
            header: strip(),
            body: strip(),
        }
    }

    /// Policy for a location. Form fields follow the body policy.
    #[must_use]
    pub fn policy(&self, location: ParamLocation) -> AdditionalProperties {
        match location {
            ParamLocation::Path => self.path,
            ParamLocation::Query => self.query,
            ParamLocation::Header => self.header,
            ParamLocation::Body | ParamLocation::FormData => self.body,
        }
    }
}
