//! Schema-load errors and their cleaning.
//!
//! A [`SchemaError`] is produced once, when the API document fails to load,
//! and is replayed to every request afterwards. Before it is exposed it is
//! cleaned: messages that could leak filesystem paths are replaced, and each
//! detail is annotated with a readable pointer into the document plus a link
//! to the matching section of the Swagger 2.0 specification.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Base URL of the Swagger 2.0 specification.
pub const SWAGGER_SPEC_URL: &str = "http://swagger.io/specification/";

const INVALID_SWAGGER_MARKER: &str = "not a valid Swagger API definition";

/// One structural problem found in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaErrorDetail {
    /// Path of the offending node, as object keys and array indices.
    pub path: Vec<String>,
    /// Description of the problem.
    pub message: String,
}

impl SchemaErrorDetail {
    /// Creates a detail from path segments and a message.
    pub fn new<I, S>(path: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            message: message.into(),
        }
    }
}

/// The API document could not be loaded or normalized.
///
/// # Example
///
/// ```
/// use skyway_core::{SchemaError, SchemaErrorDetail};
///
/// let error = SchemaError::with_details(
///     "Swagger schema validation failed.",
///     vec![SchemaErrorDetail::new(["info", "title"], "Missing required property")],
/// )
/// .clean();
///
/// assert_eq!(
///     error.message(),
///     "Missing required property at swagger.info.title: http://swagger.io/specification/#infoObject"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct SchemaError {
    message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    details: Vec<SchemaErrorDetail>,
}

impl SchemaError {
    /// Creates a schema error with a message and no details.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Creates a schema error carrying structural details.
    #[must_use]
    pub fn with_details(message: impl Into<String>, details: Vec<SchemaErrorDetail>) -> Self {
        Self {
            message: message.into(),
            details,
        }
    }

    /// Returns the (possibly cleaned) message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the structural details.
    #[must_use]
    pub fn details(&self) -> &[SchemaErrorDetail] {
        &self.details
    }

    /// Sanitizes and annotates the error for exposure to callers.
    #[must_use]
    pub fn clean(mut self) -> Self {
        if self.message.contains(INVALID_SWAGGER_MARKER) {
            self.message = format!("Invalid Swagger Schema: {SWAGGER_SPEC_URL}");
        }
        if !self.details.is_empty() {
            self.message = self
                .details
                .iter()
                .map(|detail| {
                    format!(
                        "{} at {}: {}",
                        detail.message,
                        pointer_path(&detail.path),
                        docs_url(&detail.path)
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
        }
        self
    }
}

fn variable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^[$_a-z][a-z0-9$_]*$").expect("static pattern"))
}

/// Renders a document path as `swagger.paths['/users'].get.parameters[0]`.
#[must_use]
pub fn pointer_path(path: &[String]) -> String {
    path.iter().fold(String::from("swagger"), |mut out, part| {
        if variable_pattern().is_match(part) {
            out.push('.');
            out.push_str(part);
        } else if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) {
            out.push('[');
            out.push_str(part);
            out.push(']');
        } else {
            out.push_str("['");
            out.push_str(part);
            out.push_str("']");
        }
        out
    })
}

/// Returns the specification link for the object a path points into.
#[must_use]
pub fn docs_url(path: &[String]) -> String {
    let node = path
        .iter()
        .fold(DocNode::Swagger, |node, part| node.child(part));
    format!("{SWAGGER_SPEC_URL}#{}", node.anchor())
}

/// Object kinds of the Swagger 2.0 document model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocNode {
    Swagger,
    Info,
    Contact,
    License,
    Paths,
    PathItem,
    Operation,
    ExternalDocs,
    Parameters,
    Parameter,
    Items,
    Responses,
    Response,
    Headers,
    Header,
    Example,
    Tags,
    Tag,
    Schema,
    Definitions,
    SecurityDefinitions,
    SecurityScheme,
    Scopes,
    Security,
}

impl DocNode {
    /// Follows one path segment. Unknown segments stay on the current node.
    fn child(self, segment: &str) -> Self {
        match (self, segment) {
            (Self::Swagger, "info") => Self::Info,
            (Self::Swagger, "paths") => Self::Paths,
            (Self::Swagger, "definitions") => Self::Definitions,
            (Self::Swagger | Self::PathItem | Self::Operation, "parameters") => Self::Parameters,
            (Self::Swagger | Self::Operation, "responses") => Self::Responses,
            (Self::Swagger, "securityDefinitions") => Self::SecurityDefinitions,
            (Self::Swagger | Self::Operation, "security") => Self::Security,
            (Self::Swagger, "tags") => Self::Tags,
            (Self::Swagger | Self::Operation | Self::Tag, "externalDocs") => Self::ExternalDocs,
            (Self::Info, "contact") => Self::Contact,
            (Self::Info, "license") => Self::License,
            (Self::Parameter | Self::Response, "schema") => Self::Schema,
            (Self::Parameter | Self::Items | Self::Header, "items") => Self::Items,
            (Self::Response, "headers") => Self::Headers,
            (Self::Response, "examples") => Self::Example,
            (Self::SecurityScheme, "scopes") => Self::Scopes,
            (Self::Paths, _) => Self::PathItem,
            (Self::PathItem, _) => Self::Operation,
            (Self::Parameters, _) => Self::Parameter,
            (Self::Responses, _) => Self::Response,
            (Self::Headers, _) => Self::Header,
            (Self::Tags, _) => Self::Tag,
            (Self::Definitions, _) => Self::Schema,
            (Self::SecurityDefinitions, _) => Self::SecurityScheme,
            (node, _) => node,
        }
    }

    const fn anchor(self) -> &'static str {
        match self {
            Self::Swagger => "swaggerObject",
            Self::Info => "infoObject",
            Self::Contact => "contactObject",
            Self::License => "licenseObject",
            Self::Paths => "pathsObject",
            Self::PathItem => "pathItemObject",
            Self::Operation => "operationObject",
            Self::ExternalDocs => "externalDocumentationObject",
            Self::Parameters => "parametersDefinitionsObject",
            Self::Parameter => "parameterObject",
            Self::Items => "itemsObject",
            Self::Responses => "responsesDefinitionsObject",
            Self::Response => "responseObject",
            Self::Headers => "headersObject",
            Self::Header => "headerObject",
            Self::Example => "exampleObject",
            Self::Tags => "",
            Self::Tag => "tagObject",
            Self::Schema => "schemaObject",
            Self::Definitions => "definitionsObject",
            Self::SecurityDefinitions => "securityDefinitionsObject",
            Self::SecurityScheme => "securitySchemeObject",
            Self::Scopes => "scopesObject",
            Self::Security => "securityRequirementObject",
        }
    }
}
