//! Error types for Skyway.
//!
//! This module provides the [`SkywayError`] type, the single error type every
//! middleware stage fails with. Each variant maps to an [`ErrorCategory`],
//! which in turn maps to an HTTP status code.
//!
//! | `ErrorCategory` | Status |
//! |---|---|
//! | `Schema` | 500 |
//! | `Validation` | 400 |
//! | `Authentication` | 401 |
//! | `NotFound` | 404 |
//! | `MethodNotAllowed` | 405 |
//! | `UnsupportedMediaType` | 415 |
//! | `Internal` | 500 |
//! | `NotImplemented` | 501 |

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema_error::SchemaError;

/// Result type alias using [`SkywayError`].
pub type SkywayResult<T> = Result<T, SkywayError>;

/// Categories of errors for classification and handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The API document could not be loaded.
    Schema,
    /// Request parameters or body failed validation.
    Validation,
    /// Security evaluation exhausted every group.
    Authentication,
    /// No operation is mounted at the requested path.
    NotFound,
    /// The path exists but not for the requested method.
    MethodNotAllowed,
    /// The request content type is not in the operation's `consumes`.
    UnsupportedMediaType,
    /// Caller-supplied code failed, or an unexpected internal failure.
    Internal,
    /// A configuration gap: missing parser, scheme, or handler.
    NotImplemented,
}

impl ErrorCategory {
    /// Returns the default HTTP status code for this error category.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::Schema | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::NotImplemented => StatusCode::NOT_IMPLEMENTED,
        }
    }
}

/// A single failed check reported by a compiled validator.
///
/// Serializes with the field names callers of the JSON error envelope
/// expect: `dataPath`, `keyword`, `message`, `params`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldFailure {
    /// Location of the offending value, e.g. `.id` or `.items[2]`.
    pub data_path: String,
    /// The JSON-schema keyword that failed, e.g. `type` or `required`.
    pub keyword: String,
    /// Human-readable description of the failure.
    pub message: String,
    /// Offending value and keyword parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

impl FieldFailure {
    /// Creates a new field failure.
    #[must_use]
    pub fn new(
        data_path: impl Into<String>,
        keyword: impl Into<String>,
        message: impl Into<String>,
        params: serde_json::Value,
    ) -> Self {
        Self {
            data_path: data_path.into(),
            keyword: keyword.into(),
            message: message.into(),
            params,
        }
    }
}

/// Standard error type for Skyway.
///
/// Stages never recover locally: they return a `SkywayError` and the
/// composed chain hands it to the single terminal error handler.
///
/// # Example
///
/// ```
/// use skyway_core::{ErrorCategory, SkywayError};
///
/// let error = SkywayError::unauthorized("Invalid Credentials");
/// assert_eq!(error.category(), ErrorCategory::Authentication);
/// assert_eq!(error.status_code().as_u16(), 401);
/// ```
#[derive(Error, Debug)]
pub enum SkywayError {
    /// The API document failed to load; replayed for every request.
    #[error("{0}")]
    Schema(#[from] SchemaError),

    /// Head or body validation failed.
    #[error("{message}")]
    Validation {
        /// Summary message.
        message: String,
        /// Ordered per-field failures.
        failures: Vec<FieldFailure>,
    },

    /// Security evaluation failed without a hard error.
    #[error("{message}")]
    Unauthorized {
        /// Deliberately generic message.
        message: String,
    },

    /// No route matched the request path.
    #[error("Not Found")]
    NotFound,

    /// The path is known but the method is not declared for it.
    #[error("Method Not Allowed")]
    MethodNotAllowed {
        /// Comma separated methods for the `Allow` header.
        allow: String,
    },

    /// Request content type is not declared in `consumes`.
    #[error("Unsupported Media Type")]
    UnsupportedMediaType {
        /// The content type the request carried, if any.
        content_type: Option<String>,
    },

    /// A security requirement references a scheme missing from `securityDefinitions`.
    #[error("Authentication scheme is not defined in schema")]
    SchemeNotDefined {
        /// The referenced scheme name.
        scheme: String,
    },

    /// A configuration gap: no parser, security handler, or operation handler.
    #[error("{message}")]
    NotImplemented {
        /// What is missing.
        message: String,
    },

    /// A caller-supplied handler, parser, or security function failed.
    #[error("{message}")]
    Handler {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        #[source]
        source: anyhow::Error,
    },

    /// Internal failure not attributable to the request.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
    },
}

impl SkywayError {
    /// Creates a validation error from per-field failures.
    #[must_use]
    pub fn validation(message: impl Into<String>, failures: Vec<FieldFailure>) -> Self {
        Self::Validation {
            message: message.into(),
            failures,
        }
    }

    /// Creates an authentication failure.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a 405 error carrying the `Allow` header value.
    #[must_use]
    pub fn method_not_allowed(allow: impl Into<String>) -> Self {
        Self::MethodNotAllowed {
            allow: allow.into(),
        }
    }

    /// Creates an unsupported media type error.
    #[must_use]
    pub fn unsupported_media_type(content_type: Option<&str>) -> Self {
        Self::UnsupportedMediaType {
            content_type: content_type.map(ToString::to_string),
        }
    }

    /// Creates a "not defined" error for an unknown security scheme.
    #[must_use]
    pub fn scheme_not_defined(scheme: impl Into<String>) -> Self {
        Self::SchemeNotDefined {
            scheme: scheme.into(),
        }
    }

    /// Creates a not-implemented error.
    #[must_use]
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::NotImplemented {
            message: message.into(),
        }
    }

    /// Wraps a failure raised by caller-supplied code.
    pub fn handler(source: impl Into<anyhow::Error>) -> Self {
        let source = source.into();
        Self::Handler {
            message: source.to_string(),
            source,
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Schema(_) => ErrorCategory::Schema,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Unauthorized { .. } => ErrorCategory::Authentication,
            Self::NotFound => ErrorCategory::NotFound,
            Self::MethodNotAllowed { .. } => ErrorCategory::MethodNotAllowed,
            Self::UnsupportedMediaType { .. } => ErrorCategory::UnsupportedMediaType,
            Self::SchemeNotDefined { .. } | Self::NotImplemented { .. } => {
                ErrorCategory::NotImplemented
            }
            Self::Handler { .. } | Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.category().default_status_code()
    }

    /// Returns the per-field failures of a validation error.
    #[must_use]
    pub fn failures(&self) -> &[FieldFailure] {
        match self {
            Self::Validation { failures, .. } => failures,
            _ => &[],
        }
    }

    /// Converts this error to a serializable error envelope.
    #[must_use]
    pub fn to_envelope(&self, request_id: Option<&str>) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
                category: self.category(),
                details: self.error_details(),
            },
            request_id: request_id.map(ToString::to_string),
        }
    }

    /// Returns a machine-readable error code.
    fn error_code(&self) -> &'static str {
        match self {
            Self::Schema(_) => "SCHEMA_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::NotFound => "NOT_FOUND",
            Self::MethodNotAllowed { .. } => "METHOD_NOT_ALLOWED",
            Self::UnsupportedMediaType { .. } => "UNSUPPORTED_MEDIA_TYPE",
            Self::SchemeNotDefined { .. } => "SCHEME_NOT_DEFINED",
            Self::NotImplemented { .. } => "NOT_IMPLEMENTED",
            Self::Handler { .. } => "HANDLER_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    fn error_details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Validation { failures, .. } => serde_json::to_value(failures).ok(),
            Self::MethodNotAllowed { allow } => Some(serde_json::json!({ "allow": allow })),
            Self::UnsupportedMediaType {
                content_type: Some(ct),
            } => Some(serde_json::json!({ "content_type": ct })),
            Self::SchemeNotDefined { scheme } => Some(serde_json::json!({ "scheme": scheme })),
            _ => None,
        }
    }
}

/// Serializable error envelope for HTTP responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error details.
    pub error: ErrorDetail,
    /// The request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error detail within an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Error category.
    pub category: ErrorCategory,
    /// Additional error details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_carries_failures() {
        let failure = FieldFailure::new(
            ".id",
            "type",
            "\"abc\" is not of type \"integer\"",
            serde_json::json!({ "type": "integer" }),
        );
        let error = SkywayError::validation("Validation failed", vec![failure.clone()]);

        assert_eq!(error.category(), ErrorCategory::Validation);
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.failures(), &[failure]);
    }

    #[test]
    fn test_not_defined_is_distinct_from_not_implemented_message() {
        let not_defined = SkywayError::scheme_not_defined("petstore_auth");
        let not_implemented = SkywayError::not_implemented("Authentication scheme not implemented");

        assert_eq!(not_defined.status_code(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(not_implemented.status_code(), StatusCode::NOT_IMPLEMENTED);
        assert_ne!(not_defined.to_string(), not_implemented.to_string());
        assert_eq!(
            not_defined.to_string(),
            "Authentication scheme is not defined in schema"
        );
    }

    #[test]
    fn test_handler_error_keeps_source_message() {
        let error = SkywayError::handler(anyhow::anyhow!("database unavailable"));
        assert_eq!(error.category(), ErrorCategory::Internal);
        assert_eq!(error.to_string(), "database unavailable");
    }

    #[test]
    fn test_envelope_serialization() {
        let failure = FieldFailure::new("", "required", "\"username\" is a required property", serde_json::Value::Null);
        let error = SkywayError::validation("Validation failed", vec![failure]);
        let envelope = error.to_envelope(Some("req-456"));

        let json = serde_json::to_string(&envelope).expect("serialization should work");
        assert!(json.contains("\"code\":\"VALIDATION_ERROR\""));
        assert!(json.contains("\"request_id\":\"req-456\""));
        assert!(json.contains("\"category\":\"validation\""));
        assert!(json.contains("\"dataPath\""));
        assert!(json.contains("\"keyword\":\"required\""));
    }

    #[test]
    fn test_method_not_allowed_details() {
        let error = SkywayError::method_not_allowed("GET,OPTIONS");
        let envelope = error.to_envelope(None);
        assert_eq!(envelope.error.details.unwrap()["allow"], "GET,OPTIONS");
        assert_eq!(error.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_all_error_categories_have_status_codes() {
        let categories = [
            ErrorCategory::Schema,
            ErrorCategory::Validation,
            ErrorCategory::Authentication,
            ErrorCategory::NotFound,
            ErrorCategory::MethodNotAllowed,
            ErrorCategory::UnsupportedMediaType,
            ErrorCategory::Internal,
            ErrorCategory::NotImplemented,
        ];

        for category in categories {
            let status = category.default_status_code();
            assert!(
                status.is_client_error() || status.is_server_error(),
                "Category {:?} should map to error status code, got {}",
                category,
                status
            );
        }
    }
}
