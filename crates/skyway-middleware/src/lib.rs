//! # Skyway Middleware
//!
//! Per-operation middleware chains for Skyway.
//!
//! Every operation of the API document gets one [`OperationChain`],
//! composed once after the document is normalized and shared by every
//! request it serves. The stage order is fixed:
//!
//! ```text
//! Request → CORS → Security → Head validation → Body parsing → Body validation → Handler
//! ```
//!
//! | Stage | Present when |
//! |-------|--------------|
//! | CORS | root options or any `x-cors-options` layer is set |
//! | Security | the operation has security requirements |
//! | Head validation | always |
//! | Body parsing | the operation takes a body and declares `consumes` |
//! | Body validation | the operation takes a body |
//!
//! A stage fails by returning a [`SkywayError`](skyway_core::SkywayError);
//! the rest of the chain is skipped and the error travels to the host's
//! error handler.
//!
//! ## Example
//!
//! ```
//! use skyway_middleware::{MiddlewareContext, Pipeline, Request, Response, ResponseExt};
//! use http::StatusCode;
//!
//! # tokio_test::block_on(async {
//! let pipeline = Pipeline::builder().build();
//! let mut ctx = MiddlewareContext::new();
//! let request = Request::new(http_body_util::Full::new(bytes::Bytes::new()));
//!
//! let response = pipeline
//!     .process(&mut ctx, request, |_ctx, _req| {
//!         Box::pin(async { Ok(Response::empty(StatusCode::NO_CONTENT)) })
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(response.status(), StatusCode::NO_CONTENT);
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/skyway-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod composer;
pub mod context;
pub mod cors;
pub mod handler;
pub mod middleware;
pub mod parse;
pub mod pipeline;
pub mod security;
pub mod types;
pub mod validate;

pub use composer::{ChainBuilder, OperationChain};
pub use context::{
    Authenticated, CorsHeaders, HeaderParams, MiddlewareContext, ParsedBody, PathParams,
    QueryParams, RouteParams,
};
pub use cors::{apply_headers, CorsOptions, CorsOrigin, CorsPolicy, CorsStage, HeaderList};
pub use handler::{ApiRequest, BoxedHandler, Handler};
pub use middleware::{BoxFuture, Middleware, Next};
pub use parse::{
    media_matches, BodyParser, FormParser, JsonParser, ParseInput, ParseStage, ParserDispatcher,
    ParserRegistry,
};
pub use pipeline::{BoxedMiddleware, Pipeline, PipelineBuilder};
pub use security::{
    AuthContext, Credentials, SchemeCheck, SecurityEvaluator, SecurityHandler, SecurityHandlers,
    SecurityStage,
};
pub use types::{Request, Response, ResponseExt};
pub use validate::{ValidateBodyStage, ValidateHeadStage};
