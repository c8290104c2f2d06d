//! The normalized operation model.
//!
//! These types are derived from a raw API document by
//! [`normalize`](crate::normalize::normalize) and are read-only afterwards.
//! They are shared across every in-flight request without locking.

use http::Method;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Where a parameter is transported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamLocation {
    /// Templated path segment.
    Path,
    /// Query string.
    Query,
    /// Request header.
    Header,
    /// Whole request body, described by a nested schema.
    Body,
    /// Form field of an urlencoded or multipart body.
    FormData,
}

impl ParamLocation {
    /// All locations, in compile order.
    pub const ALL: [Self; 5] = [
        Self::Path,
        Self::Query,
        Self::Header,
        Self::Body,
        Self::FormData,
    ];

    /// Returns the document spelling of this location.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Body => "body",
            Self::FormData => "formData",
        }
    }

    /// Parses the document spelling of a location.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "path" => Some(Self::Path),
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            "body" => Some(Self::Body),
            "formData" => Some(Self::FormData),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParamLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared parameter.
///
/// The raw definition is kept so the validator compiler can pick the
/// JSON-schema keywords it understands.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    location: ParamLocation,
    required: bool,
    definition: Map<String, Value>,
}

impl Parameter {
    /// Builds a parameter from its document definition.
    ///
    /// Returns `None` when `name` or `in` is missing or invalid.
    #[must_use]
    pub fn from_definition(definition: &Map<String, Value>) -> Option<Self> {
        let name = definition.get("name")?.as_str()?.to_string();
        let location = ParamLocation::parse(definition.get("in")?.as_str()?)?;
        let required = definition
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Some(Self {
            name,
            location,
            required,
            definition: definition.clone(),
        })
    }

    /// Parameter name as declared.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transport location.
    #[must_use]
    pub fn location(&self) -> ParamLocation {
        self.location
    }

    /// Whether the parameter must be present. Path parameters always are.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required || self.location == ParamLocation::Path
    }

    /// Declared `type`, if any.
    #[must_use]
    pub fn param_type(&self) -> Option<&str> {
        self.definition.get("type").and_then(Value::as_str)
    }

    /// Declared `collectionFormat`, if any.
    #[must_use]
    pub fn collection_format(&self) -> Option<&str> {
        self.definition.get("collectionFormat").and_then(Value::as_str)
    }

    /// Nested body schema, for `in: body` parameters.
    #[must_use]
    pub fn schema(&self) -> Option<&Value> {
        self.definition.get("schema")
    }

    /// The raw definition.
    #[must_use]
    pub fn definition(&self) -> &Map<String, Value> {
        &self.definition
    }
}

/// Parameters of one operation grouped by location, declaration order kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterGroups {
    path: Vec<Parameter>,
    query: Vec<Parameter>,
    header: Vec<Parameter>,
    body: Vec<Parameter>,
    form_data: Vec<Parameter>,
}

impl ParameterGroups {
    /// Creates empty groups.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter to its location group.
    pub fn push(&mut self, parameter: Parameter) {
        self.group_mut(parameter.location()).push(parameter);
    }

    /// Returns the parameters declared for a location.
    #[must_use]
    pub fn get(&self, location: ParamLocation) -> &[Parameter] {
        match location {
            ParamLocation::Path => &self.path,
            ParamLocation::Query => &self.query,
            ParamLocation::Header => &self.header,
            ParamLocation::Body => &self.body,
            ParamLocation::FormData => &self.form_data,
        }
    }

    fn group_mut(&mut self, location: ParamLocation) -> &mut Vec<Parameter> {
        match location {
            ParamLocation::Path => &mut self.path,
            ParamLocation::Query => &mut self.query,
            ParamLocation::Header => &mut self.header,
            ParamLocation::Body => &mut self.body,
            ParamLocation::FormData => &mut self.form_data,
        }
    }

    /// Whether the operation expects a request body.
    #[must_use]
    pub fn has_body(&self) -> bool {
        !self.body.is_empty() || !self.form_data.is_empty()
    }

    /// Body parameters when present, form fields otherwise.
    #[must_use]
    pub fn body_parameters(&self) -> (ParamLocation, &[Parameter]) {
        if self.body.is_empty() {
            (ParamLocation::FormData, &self.form_data)
        } else {
            (ParamLocation::Body, &self.body)
        }
    }

    /// Total number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        ParamLocation::ALL.iter().map(|l| self.get(*l).len()).sum()
    }

    /// Whether no parameters are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One entry of a `security` list: scheme name to required scopes.
///
/// Schemes within a requirement must all succeed.
pub type SecurityRequirement = IndexMap<String, Vec<String>>;

/// Where an API key is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    /// Query string parameter.
    Query,
    /// Request header.
    Header,
}

/// The closed set of supported authentication schemes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemeKind {
    /// HTTP basic authentication.
    Basic,
    /// API key in a query parameter or header.
    ApiKey {
        /// Parameter or header name.
        name: String,
        /// Where the key is read from.
        location: ApiKeyLocation,
    },
    /// OAuth2; token checks are left entirely to the caller.
    OAuth2,
}

/// A named entry of `securityDefinitions`.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityScheme {
    name: String,
    kind: SchemeKind,
    definition: Value,
}

impl SecurityScheme {
    /// Creates a scheme.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: SchemeKind, definition: Value) -> Self {
        Self {
            name: name.into(),
            kind,
            definition,
        }
    }

    /// Name under `securityDefinitions`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved scheme kind.
    #[must_use]
    pub fn kind(&self) -> &SchemeKind {
        &self.kind
    }

    /// The raw definition, handed to caller security handlers.
    #[must_use]
    pub fn definition(&self) -> &Value {
        &self.definition
    }
}

/// One (path, method) pair with everything needed to serve it.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// HTTP method.
    pub method: Method,
    /// Path template as written in the document, e.g. `/users/{id}`.
    pub path: String,
    /// Mount path: base path plus the template in `:name` syntax.
    pub router_path: String,
    /// `operationId`, if declared.
    pub operation_id: Option<String>,
    /// Path-level then operation-level parameters, grouped by location.
    pub parameters: ParameterGroups,
    /// Accepted request media types.
    pub consumes: Vec<String>,
    /// Produced response media types.
    pub produces: Vec<String>,
    /// Security requirements; OR across entries, AND within one.
    pub security: Vec<SecurityRequirement>,
    /// `x-` extensions merged root, path, then operation.
    pub extensions: Map<String, Value>,
    /// Operation-level `x-cors-options`.
    pub cors: Option<Value>,
    /// Declared responses.
    pub responses: Option<Value>,
}

impl Operation {
    /// Stable key used for routing and logging, e.g. `GET /users/{id}`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// Lowercase method name as used in the document.
    #[must_use]
    pub fn method_name(&self) -> String {
        self.method.as_str().to_ascii_lowercase()
    }
}

/// A path template and the operations declared under it.
#[derive(Debug, Clone, PartialEq)]
pub struct PathItem {
    /// Path template as written in the document.
    pub path: String,
    /// Mount path in `:name` syntax, base path included.
    pub router_path: String,
    /// Path-level `x-cors-options`.
    pub cors: Option<Value>,
    /// Operations in document order.
    pub operations: Vec<Operation>,
}

impl PathItem {
    /// Declared methods.
    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.operations.iter().map(|op| &op.method)
    }

    /// Value for the `Allow` header: declared methods plus `OPTIONS`, deduplicated.
    #[must_use]
    pub fn allow_header(&self) -> String {
        let mut methods: Vec<&str> = Vec::with_capacity(self.operations.len() + 1);
        for method in self.methods().map(Method::as_str).chain(["OPTIONS"]) {
            if !methods.contains(&method) {
                methods.push(method);
            }
        }
        methods.join(",")
    }
}

/// The normalized API document.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedDocument {
    /// `basePath` without a trailing slash.
    pub base_path: String,
    /// Security schemes by name.
    pub security_definitions: IndexMap<String, SecurityScheme>,
    /// Document-level `x-cors-options`.
    pub cors: Option<Value>,
    /// Paths in document order.
    pub paths: Vec<PathItem>,
}

impl NormalizedDocument {
    /// All operations in document order.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.paths.iter().flat_map(|item| item.operations.iter())
    }
}
