//! Compiled per-location validators.

use jsonschema::{Draft, JSONSchema};
use serde_json::{json, Map, Value};
use skyway_core::{FieldFailure, Operation, ParamLocation, Parameter, SchemaError, SkywayError};
use tracing::debug;

use crate::coerce::prepare;
use crate::config::ValidationConfig;
use crate::formats::{accept_any, is_binary, is_byte, POINTLESS_FORMATS};
use crate::schema::schema_from_params;

/// Validator for the parameters of one location.
///
/// Compiled once per operation and shared by every request.
pub struct CompiledValidator {
    location: ParamLocation,
    schema: Value,
    compiled: JSONSchema,
}

impl std::fmt::Debug for CompiledValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledValidator")
            .field("location", &self.location)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl CompiledValidator {
    /// Compiles the validator for `parameters` declared at `location`.
    pub fn compile(
        parameters: &[Parameter],
        location: ParamLocation,
        config: &ValidationConfig,
    ) -> Result<Self, SchemaError> {
        let schema = schema_from_params(parameters, config.policy(location));
        Self::from_schema(schema, location)
    }

    /// Compiles a validator from a ready-made schema.
    pub fn from_schema(schema: Value, location: ParamLocation) -> Result<Self, SchemaError> {
        let mut options = JSONSchema::options();
        options
            .with_draft(Draft::Draft4)
            .with_format("byte", is_byte)
            .with_format("binary", is_binary);
        for format in POINTLESS_FORMATS {
            options.with_format(format, accept_any);
        }
        let compiled = options.compile(&schema).map_err(|error| {
            SchemaError::new(format!("Invalid {location} parameter schema: {error}"))
        })?;
        Ok(Self {
            location,
            schema,
            compiled,
        })
    }

    /// Location this validator covers.
    #[must_use]
    pub fn location(&self) -> ParamLocation {
        self.location
    }

    /// The generated schema.
    #[must_use]
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Coerces and validates `input`, returning the coerced value.
    ///
    /// All failures are reported together, in engine order.
    pub fn validate(&self, mut input: Value) -> Result<Value, SkywayError> {
        prepare(&mut input, &self.schema);

        let failures: Vec<FieldFailure> = match self.compiled.validate(&input) {
            Ok(()) => Vec::new(),
            Err(errors) => errors.map(|error| self.failure(&error)).collect(),
        };
        if failures.is_empty() {
            return Ok(input);
        }

        debug!(
            location = %self.location,
            failures = failures.len(),
            "parameter validation failed"
        );
        Err(SkywayError::validation(
            format!("Request {} validation failed", self.location),
            failures,
        ))
    }

    fn failure(&self, error: &jsonschema::ValidationError<'_>) -> FieldFailure {
        let schema_path = error.schema_path.to_string();
        let keyword = pointer_segments(&schema_path)
            .last()
            .cloned()
            .unwrap_or_default();
        let data_path = data_path(&pointer_segments(&error.instance_path.to_string()));
        let params = self.failure_params(error, &schema_path, &keyword);
        FieldFailure::new(data_path, keyword, error.to_string(), params)
    }

    fn failure_params(
        &self,
        error: &jsonschema::ValidationError<'_>,
        schema_path: &str,
        keyword: &str,
    ) -> Value {
        use jsonschema::error::ValidationErrorKind;

        match &error.kind {
            ValidationErrorKind::Required { property } => json!({ "missingProperty": property }),
            ValidationErrorKind::AdditionalProperties { unexpected } => {
                json!({ "additionalProperty": unexpected })
            }
            _ => {
                let mut params = Map::new();
                if let Some(expected) = self.schema.pointer(schema_path) {
                    params.insert(keyword.to_string(), expected.clone());
                }
                params.insert("value".to_string(), error.instance.clone().into_owned());
                Value::Object(params)
            }
        }
    }
}

/// Splits a JSON pointer into unescaped segments.
fn pointer_segments(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect()
}

/// Renders segments as `.name`, `[0]` or `['odd-name']`.
fn data_path(segments: &[String]) -> String {
    segments.iter().fold(String::new(), |mut out, segment| {
        let identifier = segment
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
        if identifier {
            out.push('.');
            out.push_str(segment);
        } else if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            out.push('[');
            out.push_str(segment);
            out.push(']');
        } else {
            out.push_str("['");
            out.push_str(segment);
            out.push_str("']");
        }
        out
    })
}

/// The compiled validators of one operation.
#[derive(Debug)]
pub struct OperationValidators {
    /// Path parameters.
    pub path: CompiledValidator,
    /// Query string.
    pub query: CompiledValidator,
    /// Headers.
    pub header: CompiledValidator,
    /// Body or form fields; `None` when the operation takes no body.
    pub body: Option<CompiledValidator>,
    /// Name of the `body` parameter when it is required.
    pub required_body: Option<String>,
}

impl OperationValidators {
    /// Compiles every location of an operation.
    pub fn compile(operation: &Operation, config: &ValidationConfig) -> Result<Self, SchemaError> {
        let groups = &operation.parameters;
        let compile = |location| CompiledValidator::compile(groups.get(location), location, config);

        let body = if groups.has_body() {
            let (location, parameters) = groups.body_parameters();
            Some(CompiledValidator::compile(parameters, location, config)?)
        } else {
            None
        };

        let required_body = groups
            .get(ParamLocation::Body)
            .last()
            .filter(|parameter| parameter.is_required())
            .map(|parameter| parameter.name().to_string());

        Ok(Self {
            path: compile(ParamLocation::Path)?,
            query: compile(ParamLocation::Query)?,
            header: compile(ParamLocation::Header)?,
            body,
            required_body,
        })
    }

    /// Validates a parsed body. `Null` stands for an absent body: it fails
    /// when the body parameter is required and yields `None` otherwise.
    pub fn validate_body(&self, body: Value) -> Result<Option<Value>, SkywayError> {
        let Some(validator) = &self.body else {
            return Ok(Some(body));
        };
        if !body.is_null() {
            return validator.validate(body).map(Some);
        }
        match &self.required_body {
            None => Ok(None),
            Some(name) => {
                let message = format!("Missing required body parameter: {name}");
                Err(SkywayError::validation(
                    "Request body validation failed",
                    vec![FieldFailure::new(
                        "",
                        "required",
                        message,
                        json!({ "missingProperty": name }),
                    )],
                ))
            }
        }
    }
}
