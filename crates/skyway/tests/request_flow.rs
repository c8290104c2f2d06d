//! End-to-end request tests through mounted routes.
//!
//! Requests go in as `http::Request`s and come out as the responses a host
//! server would write, error handler included.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use serde_json::{json, Value};
use skyway::prelude::*;
use skyway::middleware::BodyParser;
use skyway::{Credentials, JsonParser};

fn users_api() -> Value {
    json!({
        "swagger": "2.0",
        "info": { "title": "Users", "version": "1.0.0" },
        "basePath": "/api",
        "securityDefinitions": {
            "basic": { "type": "basic" },
            "key": { "type": "apiKey", "name": "x-api-key", "in": "header" },
            "token": { "type": "apiKey", "name": "token", "in": "query" }
        },
        "paths": {
            "/users/{id}": {
                "get": {
                    "parameters": [
                        { "name": "id", "in": "path", "required": true, "type": "integer" }
                    ],
                    "responses": { "200": { "description": "a user" } }
                },
                "delete": {
                    "security": [{ "basic": [], "key": [] }],
                    "parameters": [
                        { "name": "id", "in": "path", "required": true, "type": "integer" }
                    ],
                    "responses": { "204": { "description": "deleted" } }
                }
            },
            "/users": {
                "post": {
                    "consumes": ["application/json"],
                    "security": [{ "basic": [] }, { "token": [] }],
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
                }
            },
            "/health": {
                "x-private": true,
                "get": { "responses": { "200": { "description": "ok" } } }
            }
        }
    })
}

struct Fixture {
    routes: Routes,
    parsed: Arc<AtomicUsize>,
    auth_calls: Arc<AtomicUsize>,
}

fn fixture(options: SkywayOptions) -> Fixture {
    let parsed = Arc::new(AtomicUsize::new(0));
    let auth_calls = Arc::new(AtomicUsize::new(0));

    let parse_counter = Arc::clone(&parsed);
    let basic_calls = Arc::clone(&auth_calls);
    let key_calls = Arc::clone(&auth_calls);
    let token_calls = Arc::clone(&auth_calls);

    let options = options
        .parser("application/json", move |input: skyway::ParseInput| {
            parse_counter.fetch_add(1, Ordering::SeqCst);
            JsonParser.parse(input)
        })
        .security("basic", move |auth: AuthContext| {
            basic_calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok::<_, SkywayError>(matches!(
                    auth.credentials,
                    Credentials::Basic { ref username, ref password } if username == "ada" && password == "lovelace"
                ))
            }
        })
        .security("key", move |auth: AuthContext| {
            key_calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok::<_, SkywayError>(matches!(auth.credentials, Credentials::ApiKey(ref k) if k == "secret"))
            }
        })
        .security("token", move |auth: AuthContext| {
            token_calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok::<_, SkywayError>(matches!(auth.credentials, Credentials::ApiKey(ref k) if k == "t0k3n"))
            }
        })
        .handler("/users/{id}", "get", |request: ApiRequest| async move {
            Ok::<_, SkywayError>(Response::json(StatusCode::OK, &json!({ "params": request.params })))
        })
        .handler("/users/{id}", "delete", |_request: ApiRequest| async {
            Ok::<_, SkywayError>(Response::empty(StatusCode::NO_CONTENT))
        })
        .handler("/users", "post", |request: ApiRequest| async move {
            Ok::<_, SkywayError>(Response::json(
                StatusCode::CREATED,
                &json!({ "body": request.body, "authenticated": request.authenticated }),
            ))
        });

    Fixture {
        routes: Skyway::from_value(users_api()).routes(options),
        parsed,
        auth_calls,
    }
}

fn request(method: Method, uri: &str, headers: &[(&str, &str)], body: &'static str) -> http::Request<Full<Bytes>> {
    let mut builder = http::Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Full::new(Bytes::from_static(body.as_bytes()))).unwrap()
}

fn basic(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
}

async fn json_body(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_path_parameter_must_be_an_integer() {
    let f = fixture(SkywayOptions::new());

    let response = f.routes.handle(request(Method::GET, "/api/users/abc", &[], "")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["details"].to_string().contains("integer"));

    let response = f.routes.handle(request(Method::GET, "/api/users/123", &[], "")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["params"]["id"], json!(123));
}

#[tokio::test]
async fn test_unconsumed_content_type_is_rejected_unparsed() {
    let f = fixture(SkywayOptions::new());
    let response = f
        .routes
        .handle(request(
            Method::POST,
            "/api/users",
            &[("authorization", basic("ada", "lovelace").as_str()), ("content-type", "application/xml")],
            "<user/>",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(f.parsed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_parser_is_not_implemented() {
    let routes = Skyway::from_value(users_api()).routes(
        SkywayOptions::new().security("basic", |_auth: AuthContext| async { Ok::<_, SkywayError>(true) }),
    );
    let response = routes
        .handle(request(
            Method::POST,
            "/api/users",
            &[("authorization", basic("a", "b").as_str()), ("content-type", "application/json")],
            "{}",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_body_is_validated_after_parsing() {
    let f = fixture(SkywayOptions::new());
    let auth = basic("ada", "lovelace");

    let response = f
        .routes
        .handle(request(
            Method::POST,
            "/api/users",
            &[("authorization", auth.as_str()), ("content-type", "application/json")],
            r#"{"name":"ada"}"#,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["details"][0]["keyword"], "required");
    assert_eq!(f.parsed.load(Ordering::SeqCst), 1);

    let response = f
        .routes
        .handle(request(
            Method::POST,
            "/api/users",
            &[("authorization", auth.as_str()), ("content-type", "application/json")],
            r#"{"username":"ada"}"#,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["body"], json!({ "username": "ada" }));
    assert_eq!(body["authenticated"], json!(["basic"]));
}

#[tokio::test]
async fn test_operation_without_security_skips_handlers() {
    let f = fixture(SkywayOptions::new());
    let response = f.routes.handle(request(Method::GET, "/api/users/1", &[], "")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(f.auth_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_security_group_needs_every_scheme() {
    let f = fixture(SkywayOptions::new());
    let auth = basic("ada", "lovelace");

    let only_basic = f
        .routes
        .handle(request(Method::DELETE, "/api/users/1", &[("authorization", auth.as_str())], ""))
        .await;
    assert_eq!(only_basic.status(), StatusCode::UNAUTHORIZED);

    let both = f
        .routes
        .handle(request(
            Method::DELETE,
            "/api/users/1",
            &[("authorization", auth.as_str()), ("x-api-key", "secret")],
            "",
        ))
        .await;
    assert_eq!(both.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_any_security_group_may_admit() {
    let f = fixture(SkywayOptions::new());
    let response = f
        .routes
        .handle(request(
            Method::POST,
            "/api/users?token=t0k3n",
            &[("authorization", basic("ada", "wrong").as_str()), ("content-type", "application/json")],
            r#"{"username":"ada"}"#,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(json_body(response).await["authenticated"], json!(["token"]));
}

#[tokio::test]
async fn test_unknown_path_and_method() {
    let f = fixture(SkywayOptions::new());

    let response = f.routes.handle(request(Method::GET, "/api/nope", &[], "")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = f.routes.handle(request(Method::PUT, "/api/users/1", &[], "")).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()["allow"], "GET,DELETE,OPTIONS");

    let response = f.routes.handle(request(Method::OPTIONS, "/api/users/1", &[], "")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers()["allow"], "GET,DELETE,OPTIONS");
    assert!(response.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn test_missing_handler() {
    let document = json!({
        "swagger": "2.0",
        "info": { "title": "t", "version": "1" },
        "paths": { "/orphan": { "get": { "responses": {} } } }
    });

    let lenient = Skyway::from_value(document.clone()).routes(SkywayOptions::new());
    let response = lenient.handle(request(Method::GET, "/orphan", &[], "")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let strict = Skyway::from_value(document).routes(SkywayOptions::new().fail_on_missing_handler(true));
    let response = strict.handle(request(Method::GET, "/orphan", &[], "")).await;
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    assert_eq!(json_body(response).await["error"]["message"], "Not Implemented");
}

#[tokio::test]
async fn test_docs_hide_private_paths() {
    let f = fixture(SkywayOptions::new().docs_path("/docs"));
    let response = f.routes.handle(request(Method::GET, "/docs", &[], "")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let docs = json_body(response).await;
    assert!(docs["paths"].get("/health").is_none());
    assert_eq!(docs["paths"]["/users"], users_api()["paths"]["/users"]);
    assert_eq!(docs["paths"]["/users/{id}"], users_api()["paths"]["/users/{id}"]);
}

#[tokio::test]
async fn test_custom_error_handler() {
    let f = fixture(SkywayOptions::new().error_handler(|error: SkywayError, ctx: &ErrorContext| {
        Response::json(
            error.status_code(),
            &json!({
                "message": error.to_string(),
                "path": ctx.uri.path(),
                "operation": ctx.operation.as_ref().map(|op| op.key()),
            }),
        )
    }));

    let response = f.routes.handle(request(Method::GET, "/api/users/x", &[], "")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["path"], "/api/users/x");
    assert_eq!(body["operation"], "GET /users/{id}");

    let response = f.routes.handle(request(Method::GET, "/elsewhere", &[], "")).await;
    assert_eq!(json_body(response).await["operation"], Value::Null);
}

#[tokio::test]
async fn test_handler_failure_reaches_error_handler() {
    let routes = Skyway::from_value(users_api()).routes(SkywayOptions::new().handler(
        "/users/{id}",
        "get",
        |_request: ApiRequest| async {
            Err::<Response, _>(SkywayError::handler(anyhow::anyhow!("database unavailable")))
        },
    ));

    let response = routes.handle(request(Method::GET, "/api/users/9", &[], "")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "HANDLER_ERROR");
    assert_eq!(body["error"]["message"], "database unavailable");
    assert!(body["request_id"].is_string());
}

#[tokio::test]
async fn test_hyphenated_path_parameter() {
    let routes = Skyway::from_value(json!({
        "swagger": "2.0",
        "info": { "title": "Accounts", "version": "1.0.0" },
        "paths": {
            "/accounts/{account-id}": {
                "get": {
                    "parameters": [
                        { "name": "account-id", "in": "path", "required": true, "type": "string" }
                    ],
                    "responses": { "200": { "description": "an account" } }
                }
            }
        }
    }))
    .routes(SkywayOptions::new().handler("/accounts/{account-id}", "get", |request: ApiRequest| async move {
        Ok::<_, SkywayError>(Response::json(StatusCode::OK, &request.params))
    }));

    let response = routes.handle(request(Method::GET, "/accounts/abc", &[], "")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "account-id": "abc" }));
}
