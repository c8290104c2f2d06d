//! # Skyway
//!
//! **Swagger 2.0 driven request handling.**
//!
//! Skyway turns a Swagger 2.0 document into a set of mounted routes. Each
//! declared operation gets its own middleware chain, so a request reaches
//! its handler only after it has been:
//!
//! - routed by path template and method (`404` and `405` otherwise)
//! - answered for CORS, including preflight, when enabled
//! - authenticated against the operation's security requirements
//! - validated and coerced: path, query, headers, body
//!
//! The private parts of the document (`x-private`) are stripped and the
//! rest is served as documentation.
//!
//! ## Quick Start
//!
//! ```
//! use http::StatusCode;
//! use serde_json::json;
//! use skyway::prelude::*;
//!
//! # tokio_test::block_on(async {
//! let api = Skyway::from_value(json!({
//!     "swagger": "2.0",
//!     "info": { "title": "Users", "version": "1.0.0" },
//!     "basePath": "/api",
//!     "paths": {
//!         "/users/{id}": {
//!             "get": {
//!                 "parameters": [{ "name": "id", "in": "path", "type": "integer" }],
//!                 "responses": { "200": { "description": "a user" } }
//!             }
//!         }
//!     }
//! }));
//!
//! let routes = api.routes(
//!     SkywayOptions::new()
//!         .docs_path("/docs")
//!         .handler("/users/{id}", "get", |request: ApiRequest| async move {
//!             Ok::<_, SkywayError>(Response::json(StatusCode::OK, &request.params))
//!         }),
//! );
//! routes.ready().await.unwrap();
//!
//! let request = http::Request::get("/api/users/7").body(Default::default()).unwrap();
//! assert_eq!(routes.handle(request).await.status(), StatusCode::OK);
//!
//! let request = http::Request::get("/api/users/seven").body(Default::default()).unwrap();
//! assert_eq!(routes.handle(request).await.status(), StatusCode::BAD_REQUEST);
//! # });
//! ```
//!
//! ## Request flow
//!
//! ```text
//! Request → Docs? → Wait for document → Route → CORS → Security
//!         → Head validation → Body parsing → Body validation → Handler
//!                                                                ↓
//! Response ←──────────── Error handler (on any failure) ←────────┘
//! ```

#![doc(html_root_url = "https://docs.rs/skyway/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod api;
mod error_handler;
mod options;
mod routes;

pub use api::Skyway;
pub use error_handler::{DefaultErrorHandler, ErrorContext, ErrorHandler};
pub use options::SkywayOptions;
pub use routes::Routes;

pub use skyway_config::{ConfigError, ConfigLoader, SkywayConfig};
pub use skyway_core::{RequestId, SchemaError, SkywayError, SkywayResult};
pub use skyway_docs::DocsEndpoint;
pub use skyway_middleware::{
    ApiRequest, AuthContext, Credentials, FormParser, JsonParser, ParseInput, ParserRegistry,
    Request, Response, ResponseExt,
};
pub use skyway_telemetry::{init_logging, LogConfig};
pub use skyway_validate::{AdditionalProperties, ValidationConfig};

// Component crates
pub use skyway_config as config;
pub use skyway_core as core;
pub use skyway_docs as docs;
pub use skyway_middleware as middleware;
pub use skyway_router as router;
pub use skyway_telemetry as telemetry;
pub use skyway_validate as validate;

/// Prelude module for convenient imports.
///
/// ```
/// use skyway::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        ApiRequest, AuthContext, Credentials, ErrorContext, ParserRegistry, Response, ResponseExt,
        Routes, SchemaError, Skyway, SkywayError, SkywayOptions,
    };
}
