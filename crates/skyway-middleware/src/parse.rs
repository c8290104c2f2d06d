//! Body parser selection and the parse stage.
//!
//! Parsing is skipped outright for operations without body or formData
//! parameters, and for operations that declare no `consumes`. Otherwise the
//! request `Content-Type` is negotiated against `consumes` and the parser
//! registered for the matching entry decodes the body.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use http::{header, HeaderMap, Method};
use http_body_util::{BodyExt, Full};
use indexmap::IndexMap;
use mime::Mime;
use serde_json::Value;
use skyway_core::{Operation, SkywayError, SkywayResult};
use skyway_validate::input::query_object;
use tracing::{debug, warn};

use crate::context::{MiddlewareContext, ParsedBody};
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};

/// What a parser is handed.
#[derive(Debug, Clone)]
pub struct ParseInput {
    /// The collected body.
    pub body: Bytes,
    /// The request `Content-Type`, verbatim.
    pub content_type: String,
    /// Request headers.
    pub headers: HeaderMap,
}

/// Decodes a request body into a JSON value.
pub trait BodyParser: Send + Sync + 'static {
    /// Parses the body. Failures pass through to the error handler unchanged.
    fn parse(&self, input: ParseInput) -> BoxFuture<'static, SkywayResult<Value>>;
}

impl<F, Fut> BodyParser for F
where
    F: Fn(ParseInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SkywayResult<Value>> + Send + 'static,
{
    fn parse(&self, input: ParseInput) -> BoxFuture<'static, SkywayResult<Value>> {
        Box::pin(self(input))
    }
}

/// `application/json` bodies. An empty body parses to `null`, which the
/// body validation stage treats as no body.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl BodyParser for JsonParser {
    fn parse(&self, input: ParseInput) -> BoxFuture<'static, SkywayResult<Value>> {
        Box::pin(async move {
            if input.body.iter().all(u8::is_ascii_whitespace) {
                return Ok(Value::Null);
            }
            serde_json::from_slice(&input.body).map_err(|e| {
                SkywayError::validation(format!("Invalid JSON body: {e}"), Vec::new())
            })
        })
    }
}

/// `application/x-www-form-urlencoded` bodies. Repeated fields become arrays.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormParser;

impl BodyParser for FormParser {
    fn parse(&self, input: ParseInput) -> BoxFuture<'static, SkywayResult<Value>> {
        Box::pin(async move {
            let text = std::str::from_utf8(&input.body).map_err(|e| {
                SkywayError::validation(format!("Invalid form body: {e}"), Vec::new())
            })?;
            query_object(Some(text)).map_err(|e| {
                SkywayError::validation(format!("Invalid form body: {e}"), Vec::new())
            })
        })
    }
}

/// Parsers by media type.
///
/// Keys are lowercase media types without parameters, e.g. `application/json`.
#[derive(Clone, Default)]
pub struct ParserRegistry {
    parsers: IndexMap<String, Arc<dyn BodyParser>>,
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.parsers.keys()).finish()
    }
}

impl ParserRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with [`JsonParser`] and [`FormParser`].
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new()
            .with(mime::APPLICATION_JSON.essence_str(), JsonParser)
            .with(mime::APPLICATION_WWW_FORM_URLENCODED.essence_str(), FormParser)
    }

    /// Registers `parser` for `media_type`, replacing any previous one.
    #[must_use]
    pub fn with<P: BodyParser>(mut self, media_type: &str, parser: P) -> Self {
        self.register(media_type, parser);
        self
    }

    /// Registers `parser` for `media_type`, replacing any previous one.
    pub fn register<P: BodyParser>(&mut self, media_type: &str, parser: P) {
        self.parsers.insert(media_key(media_type), Arc::new(parser));
    }

    /// The parser for a media type, parameters ignored.
    #[must_use]
    pub fn get(&self, media_type: &str) -> Option<&Arc<dyn BodyParser>> {
        self.parsers.get(&media_key(media_type))
    }

    /// Number of registered parsers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    /// Whether no parser is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

fn media_key(media_type: &str) -> String {
    media_type
        .parse::<Mime>()
        .map(|parsed| parsed.essence_str().to_ascii_lowercase())
        .unwrap_or_else(|_| media_type.trim().to_ascii_lowercase())
}

/// One `consumes` entry and the parser registered for it.
#[derive(Clone)]
struct Consumable {
    media_type: String,
    pattern: Mime,
    parser: Option<Arc<dyn BodyParser>>,
}

/// Per-operation parser selection, resolved once at compose time.
#[derive(Clone)]
pub struct ParserDispatcher {
    consumes: Vec<Consumable>,
}

impl std::fmt::Debug for ParserDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.consumes.iter().map(|c| (&c.media_type, c.parser.is_some())))
            .finish()
    }
}

impl ParserDispatcher {
    /// Resolves the operation's `consumes` against the registry.
    ///
    /// Returns `None` when the operation takes no body or declares no
    /// `consumes`, in which case parsing never runs.
    #[must_use]
    pub fn build(operation: &Operation, registry: &ParserRegistry) -> Option<Self> {
        if !operation.parameters.has_body() || operation.consumes.is_empty() {
            return None;
        }
        let consumes = operation
            .consumes
            .iter()
            .filter_map(|media_type| match media_type.parse::<Mime>() {
                Ok(pattern) => Some(Consumable {
                    media_type: media_type.clone(),
                    parser: registry.get(media_type).cloned(),
                    pattern,
                }),
                Err(e) => {
                    warn!(operation = %operation.key(), media_type = %media_type, error = %e, "ignoring unparseable consumes entry");
                    None
                }
            })
            .collect();
        Some(Self { consumes })
    }

    /// Picks the parser for a request content type.
    pub fn select(&self, content_type: Option<&str>) -> SkywayResult<Arc<dyn BodyParser>> {
        let requested = content_type
            .and_then(|raw| raw.parse::<Mime>().ok())
            .ok_or_else(|| SkywayError::unsupported_media_type(content_type))?;

        let entry = self
            .consumes
            .iter()
            .find(|entry| media_matches(&entry.pattern, &requested))
            .ok_or_else(|| SkywayError::unsupported_media_type(content_type))?;

        entry.parser.clone().ok_or_else(|| {
            SkywayError::not_implemented(format!("No parser implemented for {}", entry.media_type))
        })
    }
}

/// Whether `requested` satisfies a `consumes` pattern.
///
/// Parameters are ignored. The pattern may use `*` for the type or subtype,
/// or `*+suffix` to accept any subtype with that structured suffix.
#[must_use]
pub fn media_matches(pattern: &Mime, requested: &Mime) -> bool {
    let type_ok = pattern.type_() == mime::STAR || pattern.type_() == requested.type_();
    if !type_ok {
        return false;
    }
    let subtype = pattern.subtype();
    (subtype == mime::STAR || subtype == requested.subtype())
        && (pattern.suffix().is_none() || pattern.suffix() == requested.suffix())
}

/// Chain stage decoding the body into a [`ParsedBody`].
#[derive(Debug, Clone)]
pub struct ParseStage {
    dispatcher: ParserDispatcher,
}

impl ParseStage {
    /// Wraps a dispatcher.
    #[must_use]
    pub fn new(dispatcher: ParserDispatcher) -> Self {
        Self { dispatcher }
    }
}

impl Middleware for ParseStage {
    fn name(&self) -> &'static str {
        "parse_body"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, SkywayResult<Response>> {
        Box::pin(async move {
            if matches!(
                *request.method(),
                Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
            ) {
                return next.run(ctx, request).await;
            }

            let content_type = request
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(ToString::to_string);
            let parser = self.dispatcher.select(content_type.as_deref())?;

            let (parts, body) = request.into_parts();
            let bytes = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(never) => match never {},
            };

            let value = parser
                .parse(ParseInput {
                    body: bytes.clone(),
                    content_type: content_type.unwrap_or_default(),
                    headers: parts.headers.clone(),
                })
                .await?;
            debug!(request_id = %ctx.request_id(), bytes = bytes.len(), "request body parsed");
            ctx.set_extension(ParsedBody(value));

            next.run(ctx, Request::from_parts(parts, Full::new(bytes))).await
        })
    }
}
