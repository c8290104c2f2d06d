//! Mounted routes: the request entry point.
//!
//! For every request, in order:
//!
//! 1. the documentation route, when configured, is answered directly
//! 2. the request waits for the document; a failed load fails it
//! 3. the router resolves method and path:
//!    - unknown path: 404
//!    - `OPTIONS` with CORS enabled, or with no declared `options`
//!      operation: 204 with `Allow` (and preflight headers)
//!    - undeclared method: 405 with `Allow`
//!    - otherwise the operation chain runs
//! 4. failures go to the error handler; CORS headers owed to the request
//!    are added to its response

use std::collections::HashMap;
use std::sync::Arc;

use http::{header, HeaderValue, Method, StatusCode};
use serde_json::Value;
use skyway_core::{NormalizedDocument, SchemaError, SchemaErrorDetail, SkywayError, SkywayResult};
use skyway_docs::DocsEndpoint;
use skyway_middleware::{
    apply_headers, CorsHeaders, CorsOptions, CorsPolicy, MiddlewareContext, OperationChain,
    ParserDispatcher, Request, Response, ResponseExt, RouteParams, SecurityEvaluator,
};
use skyway_router::{Lookup, MethodRouter, Router};
use skyway_validate::OperationValidators;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::api::Skyway;
use crate::error_handler::ErrorContext;
use crate::options::SkywayOptions;

/// Per path template: the `Allow` value and the preflight policy.
#[derive(Debug)]
struct PathEntry {
    allow: String,
    preflight: Option<CorsPolicy>,
}

/// Everything compiled from the normalized document.
#[derive(Debug)]
struct Mounted {
    router: Router,
    chains: HashMap<String, OperationChain>,
    paths: HashMap<String, PathEntry>,
}

impl Mounted {
    fn build(document: &NormalizedDocument, options: &SkywayOptions) -> Result<Self, SchemaError> {
        let cors_enabled = options.cors.is_some()
            || document.cors.is_some()
            || document
                .paths
                .iter()
                .any(|item| item.cors.is_some() || item.operations.iter().any(|op| op.cors.is_some()));

        let mut router = Router::new();
        let mut chains = HashMap::new();
        let mut paths = HashMap::new();

        for item in &document.paths {
            let allow = item.allow_header();
            let layers: Vec<&Value> = options
                .cors
                .iter()
                .chain(document.cors.as_ref())
                .chain(item.cors.as_ref())
                .collect();

            let preflight = if cors_enabled {
                let at = ["paths", item.path.as_str(), "x-cors-options"];
                Some(CorsPolicy::new(cors_options(layers.iter().copied(), &at)?, allow.clone()))
            } else {
                None
            };

            let mut methods = MethodRouter::new();
            for operation in &item.operations {
                let key = operation.key();
                let method_name = operation.method_name();

                let cors = if cors_enabled {
                    let at = ["paths", item.path.as_str(), method_name.as_str(), "x-cors-options"];
                    let layers = layers.iter().copied().chain(operation.cors.as_ref());
                    Some(CorsPolicy::new(cors_options(layers, &at)?, allow.clone()))
                } else {
                    None
                };

                let handler = options.handler_for(&operation.path, &method_name);
                if handler.is_none() {
                    debug!(operation = %key, "no handler registered");
                }

                let chain = OperationChain::builder(
                    Arc::new(operation.clone()),
                    OperationValidators::compile(operation, &options.validation)?,
                )
                .cors(cors)
                .security(SecurityEvaluator::build(
                    &operation.security,
                    &document.security_definitions,
                    &options.security,
                ))
                .parser(ParserDispatcher::build(operation, &options.parsers))
                .handler(handler)
                .fail_on_missing_handler(options.fail_on_missing_handler)
                .build();

                debug!(operation = %key, mount = %operation.router_path, stages = ?chain.stage_names(), "operation mounted");
                methods = methods.on(&operation.method, key.clone());
                chains.insert(key, chain);
            }

            router.insert(&item.router_path, methods);
            paths.insert(item.path.clone(), PathEntry { allow, preflight });
        }

        info!(operations = chains.len(), cors = cors_enabled, "routes mounted");
        Ok(Self { router, chains, paths })
    }

    /// The path entry behind a method table, found through any of its
    /// operations.
    fn entry(&self, methods: &MethodRouter) -> Option<&PathEntry> {
        let key = methods.methods().find_map(|method| methods.operation(method))?;
        let chain = self.chains.get(key)?;
        self.paths.get(&chain.operation().path)
    }
}

fn cors_options<'v>(
    layers: impl IntoIterator<Item = &'v Value>,
    at: &[&str],
) -> Result<CorsOptions, SchemaError> {
    CorsOptions::from_layers(layers).map_err(|e| {
        SchemaError::with_details(
            "Invalid CORS options",
            vec![SchemaErrorDetail::new(at.iter().copied(), e.to_string())],
        )
    })
}

fn allow_only(allow: &str) -> Response {
    let mut response = Response::empty(StatusCode::NO_CONTENT);
    if let Ok(value) = HeaderValue::from_str(allow) {
        response.headers_mut().insert(header::ALLOW, value);
    }
    response
}

/// The mounted operations of one [`Skyway`] API.
///
/// Cheap to clone; clones share the compiled chains.
///
/// ```
/// use http::StatusCode;
/// use serde_json::json;
/// use skyway::{ApiRequest, Response, ResponseExt, Skyway, SkywayOptions};
/// use skyway::SkywayError;
///
/// # tokio_test::block_on(async {
/// let api = Skyway::from_value(json!({
///     "swagger": "2.0",
///     "info": { "title": "Pets", "version": "1.0.0" },
///     "basePath": "/v1",
///     "paths": { "/pets": { "get": { "responses": {} } } }
/// }));
/// let routes = api.routes(SkywayOptions::new().handler("/pets", "get", |_r: ApiRequest| async {
///     Ok::<_, SkywayError>(Response::json(StatusCode::OK, &json!([])))
/// }));
///
/// let request = http::Request::get("/v1/pets").body(Default::default()).unwrap();
/// assert_eq!(routes.handle(request).await.status(), StatusCode::OK);
///
/// let request = http::Request::delete("/v1/pets").body(Default::default()).unwrap();
/// let response = routes.handle(request).await;
/// assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
/// assert_eq!(response.headers()["allow"], "GET,OPTIONS");
/// # });
/// ```
#[derive(Clone)]
pub struct Routes {
    api: Skyway,
    options: Arc<SkywayOptions>,
    mounted: Arc<OnceCell<Result<Arc<Mounted>, SchemaError>>>,
    docs: DocsEndpoint,
}

impl std::fmt::Debug for Routes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Routes")
            .field("api", &self.api)
            .field("options", &self.options)
            .field("mounted", &self.mounted.initialized())
            .finish()
    }
}

impl Routes {
    pub(crate) fn new(api: Skyway, options: SkywayOptions) -> Self {
        let docs = api.docs();
        Self {
            api,
            options: Arc::new(options),
            mounted: Arc::new(OnceCell::new()),
            docs,
        }
    }

    /// Waits for the document and compiles every operation chain.
    ///
    /// Requests do this implicitly; calling it up front surfaces a bad
    /// document at startup.
    pub async fn ready(&self) -> Result<(), SchemaError> {
        self.mounted().await.map(|_| ())
    }

    async fn mounted(&self) -> Result<Arc<Mounted>, SchemaError> {
        self.mounted
            .get_or_init(|| async {
                let document = self.api.ready().await?;
                Mounted::build(&document, &self.options)
                    .map(Arc::new)
                    .map_err(|e| {
                        let e = e.clean();
                        error!(error = %e, "failed to mount routes");
                        e
                    })
            })
            .await
            .clone()
    }

    /// Serves one request. Never fails: errors become responses through
    /// the error handler.
    pub async fn handle(&self, request: Request) -> Response {
        let mut ctx = MiddlewareContext::new();
        let method = request.method().clone();
        let uri = request.uri().clone();

        match self.dispatch(&mut ctx, request).await {
            Ok(response) => {
                debug!(request_id = %ctx.request_id(), method = %method, path = %uri.path(), status = response.status().as_u16(), elapsed = ?ctx.elapsed(), "request served");
                response
            }
            Err(error) => self.fail(&mut ctx, error, method, uri),
        }
    }

    async fn dispatch(&self, ctx: &mut MiddlewareContext, request: Request) -> SkywayResult<Response> {
        if let Some(docs_path) = &self.options.docs_path {
            if request.method() == Method::GET && request.uri().path() == docs_path {
                return Ok(self.docs.handle().await);
            }
        }

        let mounted = self.mounted().await?;

        match mounted.router.lookup(request.method(), request.uri().path()) {
            Lookup::NotFound => Err(SkywayError::NotFound),

            Lookup::Matched(found) => {
                let chain = mounted.chains.get(found.operation).ok_or(SkywayError::NotFound)?;
                if request.method() == Method::OPTIONS {
                    if let Some(entry) = mounted.paths.get(&chain.operation().path) {
                        if let Some(policy) = &entry.preflight {
                            return Ok(policy.preflight_response(request.headers(), &entry.allow));
                        }
                    }
                }
                ctx.set_extension(RouteParams(found.params));
                chain.run(ctx, request).await
            }

            Lookup::MethodNotAllowed { methods, .. } => {
                let entry = mounted.entry(methods);
                let allow = entry.map_or("OPTIONS", |e| e.allow.as_str());
                let preflight = entry.and_then(|e| e.preflight.as_ref());

                if request.method() == Method::OPTIONS {
                    return Ok(match preflight {
                        Some(policy) => policy.preflight_response(request.headers(), allow),
                        None => allow_only(allow),
                    });
                }
                if let Some(policy) = preflight {
                    ctx.set_extension(CorsHeaders(policy.response_headers(request.headers())));
                }
                Err(SkywayError::method_not_allowed(allow))
            }
        }
    }

    fn fail(&self, ctx: &mut MiddlewareContext, error: SkywayError, method: Method, uri: http::Uri) -> Response {
        let status = error.status_code();
        if status.is_server_error() {
            error!(request_id = %ctx.request_id(), method = %method, path = %uri.path(), status = status.as_u16(), error = %error, "request failed");
        } else if status == StatusCode::NOT_FOUND {
            debug!(request_id = %ctx.request_id(), method = %method, path = %uri.path(), "no route");
        } else {
            warn!(request_id = %ctx.request_id(), method = %method, path = %uri.path(), status = status.as_u16(), error = %error, "request rejected");
        }

        let cors = ctx.remove_extension::<CorsHeaders>();
        let context = ErrorContext {
            request_id: ctx.request_id(),
            method,
            uri,
            operation: ctx.operation().cloned(),
        };
        let mut response = self.options.error_handler.handle(error, &context);
        if let Some(CorsHeaders(cors)) = cors {
            apply_headers(&cors, response.headers_mut());
        }
        response
    }
}
