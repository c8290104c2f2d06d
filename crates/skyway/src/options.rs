//! Options for mounting an API.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use skyway_config::SkywayConfig;
use skyway_middleware::{
    BodyParser, BoxedHandler, Handler, ParserRegistry, SecurityHandler, SecurityHandlers,
};
use skyway_validate::ValidationConfig;

use crate::error_handler::{DefaultErrorHandler, ErrorHandler};

/// Handlers, parsers, security checks and policies for [`Routes`](crate::Routes).
///
/// ```
/// use http::StatusCode;
/// use skyway::{ApiRequest, ParserRegistry, Response, ResponseExt, SkywayOptions};
/// use skyway_core::SkywayError;
///
/// let options = SkywayOptions::new()
///     .parsers(ParserRegistry::with_defaults())
///     .handler("/users/{id}", "get", |request: ApiRequest| async move {
///         Ok::<_, SkywayError>(Response::json(StatusCode::OK, &request.params))
///     })
///     .fail_on_missing_handler(true);
///
/// assert!(options.has_handler("/users/{id}", "GET"));
/// ```
#[derive(Clone)]
pub struct SkywayOptions {
    pub(crate) handlers: HashMap<(String, String), BoxedHandler>,
    pub(crate) parsers: ParserRegistry,
    pub(crate) security: SecurityHandlers,
    pub(crate) cors: Option<Value>,
    pub(crate) fail_on_missing_handler: bool,
    pub(crate) docs_path: Option<String>,
    pub(crate) validation: ValidationConfig,
    pub(crate) error_handler: Arc<dyn ErrorHandler>,
}

impl std::fmt::Debug for SkywayOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkywayOptions")
            .field("handlers", &self.handlers.len())
            .field("parsers", &self.parsers.len())
            .field("security", &self.security.keys().collect::<Vec<_>>())
            .field("cors", &self.cors)
            .field("fail_on_missing_handler", &self.fail_on_missing_handler)
            .field("docs_path", &self.docs_path)
            .field("validation", &self.validation)
            .finish_non_exhaustive()
    }
}

impl Default for SkywayOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SkywayOptions {
    /// No handlers, no parsers, no CORS, no docs route.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            parsers: ParserRegistry::new(),
            security: SecurityHandlers::new(),
            cors: None,
            fail_on_missing_handler: false,
            docs_path: None,
            validation: ValidationConfig::default(),
            error_handler: Arc::new(DefaultErrorHandler),
        }
    }

    /// Takes the routing, CORS and validation sections of a loaded
    /// configuration.
    #[must_use]
    pub fn from_config(config: &SkywayConfig) -> Self {
        let docs_path = Some(config.routes.docs_path.clone()).filter(|path| !path.is_empty());
        Self {
            cors: config.cors.as_ref().map(skyway_config::CorsConfig::to_layer),
            fail_on_missing_handler: config.routes.fail_on_missing_handler,
            docs_path,
            validation: config.validation,
            ..Self::new()
        }
    }

    /// Registers the handler for a path template and method, e.g.
    /// `("/users/{id}", "get")`.
    #[must_use]
    pub fn handler<H: Handler>(mut self, path: impl Into<String>, method: &str, handler: H) -> Self {
        self.handlers
            .insert((path.into(), method.to_ascii_lowercase()), Arc::new(handler));
        self
    }

    /// Whether a handler is registered for a path template and method.
    #[must_use]
    pub fn has_handler(&self, path: &str, method: &str) -> bool {
        self.handlers
            .contains_key(&(path.to_string(), method.to_ascii_lowercase()))
    }

    pub(crate) fn handler_for(&self, path: &str, method: &str) -> Option<BoxedHandler> {
        self.handlers
            .get(&(path.to_string(), method.to_string()))
            .cloned()
    }

    /// Registers a body parser for a media type.
    #[must_use]
    pub fn parser<P: BodyParser>(mut self, media_type: &str, parser: P) -> Self {
        self.parsers.register(media_type, parser);
        self
    }

    /// Replaces the parser registry.
    #[must_use]
    pub fn parsers(mut self, parsers: ParserRegistry) -> Self {
        self.parsers = parsers;
        self
    }

    /// Registers the check for a security scheme.
    #[must_use]
    pub fn security<S: SecurityHandler>(mut self, scheme: impl Into<String>, handler: S) -> Self {
        self.security.insert(scheme.into(), Arc::new(handler));
        self
    }

    /// Root CORS options, merged under every `x-cors-options` layer.
    /// Setting them enables CORS.
    #[must_use]
    pub fn cors(mut self, options: Value) -> Self {
        self.cors = Some(options);
        self
    }

    /// Answer 501 instead of 404 for operations without a handler.
    #[must_use]
    pub fn fail_on_missing_handler(mut self, strict: bool) -> Self {
        self.fail_on_missing_handler = strict;
        self
    }

    /// Serves the filtered document at `path` from the routes too.
    #[must_use]
    pub fn docs_path(mut self, path: impl Into<String>) -> Self {
        self.docs_path = Some(path.into());
        self
    }

    /// Sets the undeclared-property policy.
    #[must_use]
    pub fn validation(mut self, validation: ValidationConfig) -> Self {
        self.validation = validation;
        self
    }

    /// Replaces the terminal error handler.
    #[must_use]
    pub fn error_handler<E: ErrorHandler>(mut self, handler: E) -> Self {
        self.error_handler = Arc::new(handler);
        self
    }
}
