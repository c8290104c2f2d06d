//! End-to-end operation chain tests.
//!
//! Each test normalizes a small document, composes the chain for one
//! operation the way the facade does, and drives requests through it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use serde_json::{json, Value};
use skyway_core::normalize::normalize;
use skyway_core::{NormalizedDocument, SkywayError};
use skyway_middleware::{
    ApiRequest, AuthContext, BoxedHandler, MiddlewareContext, OperationChain, ParseInput,
    ParserDispatcher, ParserRegistry, Request, Response, ResponseExt, RouteParams, SecurityEvaluator,
    SecurityHandlers,
};
use skyway_router::Params;
use skyway_validate::{OperationValidators, ValidationConfig};

fn users_document() -> NormalizedDocument {
    normalize(&json!({
        "swagger": "2.0",
        "info": { "title": "Users", "version": "1.0.0" },
        "basePath": "/api",
        "securityDefinitions": {
            "key": { "type": "apiKey", "name": "x-api-key", "in": "header" }
        },
        "paths": {
            "/users/{id}": {
                "get": {
                    "parameters": [
                        { "name": "id", "in": "path", "required": true, "type": "integer" }
                    ],
                    "responses": { "200": { "description": "a user" } }
                }
            },
            "/users": {
                "post": {
                    "consumes": ["application/json"],
                    "parameters": [{
                        "name": "user",
                        "in": "body",
                        "schema": {
                            "type": "object",
                            "required": ["username"],
                            "properties": { "username": { "type": "string" } }
                        }
                    }],
                    "responses": { "201": { "description": "created" } }
                },
                "put": {
                    "consumes": ["application/json"],
                    "parameters": [{
                        "name": "user",
                        "in": "body",
                        "required": true,
                        "schema": { "type": "object" }
                    }],
                    "responses": { "200": { "description": "replaced" } }
                },
                "options": {
                    "consumes": ["application/json"],
                    "parameters": [{
                        "name": "filter",
                        "in": "body",
                        "schema": { "type": "object" }
                    }],
                    "responses": { "200": { "description": "options" } }
                }
            }
        }
    }))
    .unwrap()
}

struct Fixture {
    chain: OperationChain,
    auth_calls: Arc<AtomicUsize>,
}

fn compose(method: &str, path: &str, parsers: &ParserRegistry) -> Fixture {
    let document = users_document();
    let operation = document
        .operations()
        .find(|op| op.method == method && op.path == path)
        .unwrap()
        .clone();

    let auth_calls = Arc::new(AtomicUsize::new(0));
    let mut handlers = SecurityHandlers::new();
    let calls = Arc::clone(&auth_calls);
    handlers.insert(
        "key".to_string(),
        Arc::new(move |_auth: AuthContext| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, SkywayError>(true) }
        }),
    );

    let handler: BoxedHandler = Arc::new(|request: ApiRequest| async move {
        Ok::<_, SkywayError>(Response::json(
            StatusCode::OK,
            &json!({ "params": request.params, "body": request.body }),
        ))
    });

    let validators = OperationValidators::compile(&operation, &ValidationConfig::default()).unwrap();
    let chain = OperationChain::builder(Arc::new(operation.clone()), validators)
        .security(SecurityEvaluator::build(
            &operation.security,
            &document.security_definitions,
            &handlers,
        ))
        .parser(ParserDispatcher::build(&operation, parsers))
        .handler(Some(handler))
        .build();

    Fixture { chain, auth_calls }
}

fn request(method: &str, uri: &str, content_type: Option<&str>, body: &'static str) -> Request {
    let mut builder = http::Request::builder().method(method).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    builder.body(Full::new(Bytes::from_static(body.as_bytes()))).unwrap()
}

fn context_with(params: &[(&str, &str)]) -> MiddlewareContext {
    let mut ctx = MiddlewareContext::new();
    ctx.set_extension(RouteParams(params.iter().copied().collect::<Params>()));
    ctx
}

async fn json_body(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_path_parameter_is_coerced_to_integer() {
    let fixture = compose("GET", "/users/{id}", &ParserRegistry::new());

    let error = fixture
        .chain
        .run(&mut context_with(&[("id", "abc")]), request("GET", "/api/users/abc", None, ""))
        .await
        .unwrap_err();
    assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    let failure = &error.failures()[0];
    assert_eq!(failure.keyword, "type");
    assert!(failure.message.contains("integer"));

    let response = fixture
        .chain
        .run(&mut context_with(&[("id", "123")]), request("GET", "/api/users/123", None, ""))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["params"]["id"], json!(123));
}

#[tokio::test]
async fn test_operation_without_security_never_calls_handlers() {
    let fixture = compose("GET", "/users/{id}", &ParserRegistry::new());
    fixture
        .chain
        .run(&mut context_with(&[("id", "7")]), request("GET", "/api/users/7", None, ""))
        .await
        .unwrap();
    assert_eq!(fixture.auth_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_wrong_content_type_is_rejected_before_parsing() {
    let parsed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&parsed);
    let registry = ParserRegistry::new().with("application/json", move |_input: ParseInput| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Ok::<_, SkywayError>(json!({})) }
    });
    let fixture = compose("POST", "/users", &registry);

    let error = fixture
        .chain
        .run(
            &mut MiddlewareContext::new(),
            request("POST", "/api/users", Some("application/xml"), "<user/>"),
        )
        .await
        .unwrap_err();
    assert_eq!(error.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(parsed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_parser_is_not_implemented() {
    let fixture = compose("POST", "/users", &ParserRegistry::new());
    let error = fixture
        .chain
        .run(
            &mut MiddlewareContext::new(),
            request("POST", "/api/users", Some("application/json"), "{}"),
        )
        .await
        .unwrap_err();
    assert_eq!(error.status_code(), StatusCode::NOT_IMPLEMENTED);
    assert!(error.to_string().contains("application/json"));
}

#[tokio::test]
async fn test_body_missing_required_property() {
    let fixture = compose("POST", "/users", &ParserRegistry::with_defaults());

    let error = fixture
        .chain
        .run(
            &mut MiddlewareContext::new(),
            request("POST", "/api/users", Some("application/json"), r#"{"name":"ada"}"#),
        )
        .await
        .unwrap_err();
    assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    let failure = &error.failures()[0];
    assert_eq!(failure.keyword, "required");
    assert!(failure.message.contains("username"));

    let response = fixture
        .chain
        .run(
            &mut MiddlewareContext::new(),
            request(
                "POST",
                "/api/users",
                Some("application/json; charset=utf-8"),
                r#"{"username":"ada"}"#,
            ),
        )
        .await
        .unwrap();
    assert_eq!(json_body(response).await["body"], json!({ "username": "ada" }));
}

#[tokio::test]
async fn test_empty_json_body_is_absent() {
    let fixture = compose("POST", "/users", &ParserRegistry::with_defaults());
    let response = fixture
        .chain
        .run(
            &mut MiddlewareContext::new(),
            request("POST", "/api/users", Some("application/json"), ""),
        )
        .await
        .unwrap();
    assert_eq!(json_body(response).await["body"], Value::Null);

    let fixture = compose("PUT", "/users", &ParserRegistry::with_defaults());
    let error = fixture
        .chain
        .run(
            &mut MiddlewareContext::new(),
            request("PUT", "/api/users", Some("application/json"), " \n"),
        )
        .await
        .unwrap_err();
    assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    let failure = &error.failures()[0];
    assert_eq!(failure.keyword, "required");
    assert_eq!(failure.params["missingProperty"], json!("user"));

    let response = fixture
        .chain
        .run(
            &mut MiddlewareContext::new(),
            request("PUT", "/api/users", Some("application/json"), "{}"),
        )
        .await
        .unwrap();
    assert_eq!(json_body(response).await["body"], json!({}));
}

#[tokio::test]
async fn test_options_request_skips_body_parsing() {
    let fixture = compose("OPTIONS", "/users", &ParserRegistry::with_defaults());
    let response = fixture
        .chain
        .run(&mut MiddlewareContext::new(), request("OPTIONS", "/api/users", None, ""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["body"], Value::Null);
}

#[tokio::test]
async fn test_undecodable_query_is_rejected() {
    let fixture = compose("GET", "/users/{id}", &ParserRegistry::new());
    let error = fixture
        .chain
        .run(
            &mut context_with(&[("id", "7")]),
            request("GET", "/api/users/7?name=%FF", None, ""),
        )
        .await
        .unwrap_err();
    assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    assert!(error.to_string().starts_with("Invalid query string"));
}
