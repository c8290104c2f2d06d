//! Per-operation chain composition.
//!
//! Stage order is fixed:
//!
//! 1. CORS headers, when enabled
//! 2. security evaluation, when the operation has requirements
//! 3. head validation (path, query, headers)
//! 4. body parsing, when the operation takes a body and declares `consumes`
//! 5. body validation, when the operation takes a body
//! 6. the handler
//!
//! Each stage may abort the chain by returning an error. Waiting for the
//! document to load happens before a chain is looked up, in the facade.

use std::sync::Arc;

use skyway_core::{Operation, SkywayError, SkywayResult};
use skyway_validate::OperationValidators;
use tracing::{debug, warn};

use crate::context::MiddlewareContext;
use crate::cors::{CorsPolicy, CorsStage};
use crate::handler::{ApiRequest, BoxedHandler};
use crate::middleware::BoxFuture;
use crate::parse::{ParseStage, ParserDispatcher};
use crate::pipeline::Pipeline;
use crate::security::{SecurityEvaluator, SecurityStage};
use crate::types::{Request, Response};
use crate::validate::{ValidateBodyStage, ValidateHeadStage};

/// The composed chain of one operation.
#[derive(Clone)]
pub struct OperationChain {
    operation: Arc<Operation>,
    pipeline: Pipeline,
    handler: Option<BoxedHandler>,
    fail_on_missing_handler: bool,
}

impl std::fmt::Debug for OperationChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationChain")
            .field("operation", &self.operation.key())
            .field("pipeline", &self.pipeline)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

impl OperationChain {
    /// Starts composing a chain for `operation`.
    #[must_use]
    pub fn builder(operation: Arc<Operation>, validators: OperationValidators) -> ChainBuilder {
        ChainBuilder {
            operation,
            validators: Arc::new(validators),
            cors: None,
            security: SecurityEvaluator::default(),
            parser: None,
            handler: None,
            fail_on_missing_handler: false,
        }
    }

    /// The operation served.
    #[must_use]
    pub fn operation(&self) -> &Arc<Operation> {
        &self.operation
    }

    /// Stage names in execution order, handler excluded.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.pipeline.stage_names()
    }

    /// Runs the chain for one request.
    ///
    /// Fails with `NotFound` when a chain already ran for this context.
    pub async fn run(&self, ctx: &mut MiddlewareContext, request: Request) -> SkywayResult<Response> {
        if !ctx.begin_chain() {
            debug!(request_id = %ctx.request_id(), operation = %self.operation.key(), "chain already ran for request");
            return Err(SkywayError::NotFound);
        }
        ctx.set_operation(Arc::clone(&self.operation));
        debug!(request_id = %ctx.request_id(), operation = %self.operation.key(), "running operation chain");

        let operation = Arc::clone(&self.operation);
        let handler = self.handler.clone();
        let strict = self.fail_on_missing_handler;
        self.pipeline
            .process(ctx, request, move |ctx, request| {
                terminal(ctx, request, operation, handler, strict)
            })
            .await
    }
}

fn terminal(
    ctx: &mut MiddlewareContext,
    request: Request,
    operation: Arc<Operation>,
    handler: Option<BoxedHandler>,
    strict: bool,
) -> BoxFuture<'static, SkywayResult<Response>> {
    let Some(handler) = handler else {
        warn!(request_id = %ctx.request_id(), operation = %operation.key(), "no handler registered");
        let error = if strict {
            SkywayError::not_implemented("Not Implemented")
        } else {
            SkywayError::NotFound
        };
        return Box::pin(async move { Err(error) });
    };
    handler.call(ApiRequest::from_context(ctx, operation, request))
}

/// Builder for [`OperationChain`].
pub struct ChainBuilder {
    operation: Arc<Operation>,
    validators: Arc<OperationValidators>,
    cors: Option<CorsPolicy>,
    security: SecurityEvaluator,
    parser: Option<ParserDispatcher>,
    handler: Option<BoxedHandler>,
    fail_on_missing_handler: bool,
}

impl ChainBuilder {
    /// Enables CORS with the operation's merged policy.
    #[must_use]
    pub fn cors(mut self, policy: Option<CorsPolicy>) -> Self {
        self.cors = policy;
        self
    }

    /// Sets the security evaluator.
    #[must_use]
    pub fn security(mut self, evaluator: SecurityEvaluator) -> Self {
        self.security = evaluator;
        self
    }

    /// Sets the body parser dispatcher; `None` skips parsing.
    #[must_use]
    pub fn parser(mut self, dispatcher: Option<ParserDispatcher>) -> Self {
        self.parser = dispatcher;
        self
    }

    /// Sets the handler.
    #[must_use]
    pub fn handler(mut self, handler: Option<BoxedHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Answer 501 instead of 404 when no handler is registered.
    #[must_use]
    pub fn fail_on_missing_handler(mut self, strict: bool) -> Self {
        self.fail_on_missing_handler = strict;
        self
    }

    /// Freezes the chain.
    #[must_use]
    pub fn build(self) -> OperationChain {
        let pipeline = Pipeline::builder()
            .optional_stage(self.cors.map(CorsStage::new))
            .optional_stage(SecurityStage::new(self.security))
            .stage(ValidateHeadStage::new(Arc::clone(&self.validators)))
            .optional_stage(self.parser.map(ParseStage::new))
            .optional_stage(ValidateBodyStage::new(Arc::clone(&self.validators)))
            .build();

        OperationChain {
            operation: self.operation,
            pipeline,
            handler: self.handler,
            fail_on_missing_handler: self.fail_on_missing_handler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cors::CorsOptions;
    use crate::parse::ParserRegistry;
    use crate::security::{AuthContext, SecurityHandlers};
    use crate::types::ResponseExt;
    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::Full;
    use serde_json::json;
    use skyway_core::normalize::normalize;
    use skyway_validate::ValidationConfig;

    fn document() -> skyway_core::NormalizedDocument {
        normalize(&json!({
            "swagger": "2.0",
            "info": { "title": "t", "version": "1" },
            "consumes": ["application/json"],
            "securityDefinitions": { "key": { "type": "apiKey", "name": "x-api-key", "in": "header" } },
            "paths": {
                "/users": {
                    "get": { "responses": {} },
                    "post": {
                        "security": [{ "key": [] }],
                        "parameters": [{ "name": "user", "in": "body", "schema": { "type": "object" } }],
                        "responses": {}
                    }
                }
            }
        }))
        .unwrap()
    }

    fn chain(method: &str, handler: Option<BoxedHandler>, strict: bool) -> OperationChain {
        let document = document();
        let operation = document
            .operations()
            .find(|op| op.method == method)
            .unwrap()
            .clone();
        let validators = OperationValidators::compile(&operation, &ValidationConfig::default()).unwrap();
        let mut handlers = SecurityHandlers::new();
        handlers.insert(
            "key".to_string(),
            Arc::new(|auth: AuthContext| async move {
                Ok::<_, SkywayError>(matches!(auth.credentials, crate::security::Credentials::ApiKey(ref k) if k == "secret"))
            }),
        );
        let security = SecurityEvaluator::build(&operation.security, &document.security_definitions, &handlers);
        let parser = ParserDispatcher::build(&operation, &ParserRegistry::with_defaults());
        let cors = CorsPolicy::new(CorsOptions::default(), "GET,POST,OPTIONS");

        OperationChain::builder(Arc::new(operation), validators)
            .cors(Some(cors))
            .security(security)
            .parser(parser)
            .handler(handler)
            .fail_on_missing_handler(strict)
            .build()
    }

    fn ok_handler() -> Option<BoxedHandler> {
        Some(Arc::new(|request: ApiRequest| async move {
            Ok::<_, SkywayError>(Response::json(
                StatusCode::OK,
                &json!({ "body": request.body, "auth": request.authenticated }),
            ))
        }))
    }

    fn request(method: &str, headers: &[(&str, &str)], body: &'static str) -> Request {
        let mut builder = http::Request::builder().method(method).uri("/users");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Full::new(Bytes::from_static(body.as_bytes()))).unwrap()
    }

    #[test]
    fn test_stage_order() {
        assert_eq!(
            chain("POST", None, false).stage_names(),
            vec!["cors", "security", "validate_head", "parse_body", "validate_body"]
        );
        assert_eq!(chain("GET", None, false).stage_names(), vec!["cors", "validate_head"]);
    }

    #[tokio::test]
    async fn test_full_chain_reaches_handler() {
        let chain = chain("POST", ok_handler(), false);
        let mut ctx = MiddlewareContext::new();
        let response = chain
            .run(
                &mut ctx,
                request(
                    "POST",
                    &[("x-api-key", "secret"), ("content-type", "application/json")],
                    r#"{"name":"ada"}"#,
                ),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert_eq!(ctx.operation().unwrap().key(), "POST /users");
    }

    #[tokio::test]
    async fn test_security_runs_before_parsing() {
        let chain = chain("POST", ok_handler(), false);
        let mut ctx = MiddlewareContext::new();
        let error = chain
            .run(&mut ctx, request("POST", &[("content-type", "application/xml")], "<x/>"))
            .await
            .unwrap_err();
        assert!(matches!(error, SkywayError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_chain_runs_once_per_request() {
        let chain = chain("GET", ok_handler(), false);
        let mut ctx = MiddlewareContext::new();
        assert!(chain.run(&mut ctx, request("GET", &[], "")).await.is_ok());
        let error = chain.run(&mut ctx, request("GET", &[], "")).await.unwrap_err();
        assert!(matches!(error, SkywayError::NotFound));
    }

    #[tokio::test]
    async fn test_missing_handler() {
        let lenient = chain("GET", None, false);
        let error = lenient
            .run(&mut MiddlewareContext::new(), request("GET", &[], ""))
            .await
            .unwrap_err();
        assert!(matches!(error, SkywayError::NotFound));

        let strict = chain("GET", None, true);
        let error = strict
            .run(&mut MiddlewareContext::new(), request("GET", &[], ""))
            .await
            .unwrap_err();
        assert_eq!(error.status_code(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(error.to_string(), "Not Implemented");
    }
}
