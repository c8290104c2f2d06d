//! The terminal error handler.
//!
//! Every failure of a request, from routing to the operation handler,
//! ends up in exactly one [`ErrorHandler`]. The default renders the JSON
//! error envelope.

use std::sync::Arc;

use http::{header, HeaderValue, Method, Uri};
use skyway_core::{Operation, RequestId, SkywayError};
use skyway_middleware::{Response, ResponseExt};

/// What is known about the failed request.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Request id, also written into the envelope.
    pub request_id: RequestId,
    /// Request method.
    pub method: Method,
    /// Request URI.
    pub uri: Uri,
    /// The operation, when routing got that far.
    pub operation: Option<Arc<Operation>>,
}

/// Turns a failure into a response.
///
/// CORS headers owed to the request are added to whatever this returns.
pub trait ErrorHandler: Send + Sync + 'static {
    /// Renders `error`.
    fn handle(&self, error: SkywayError, ctx: &ErrorContext) -> Response;
}

impl<F> ErrorHandler for F
where
    F: Fn(SkywayError, &ErrorContext) -> Response + Send + Sync + 'static,
{
    fn handle(&self, error: SkywayError, ctx: &ErrorContext) -> Response {
        self(error, ctx)
    }
}

/// Renders `{"error": {...}, "request_id": ...}` with the error's status.
///
/// A 405 also carries the `Allow` header.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorHandler;

impl ErrorHandler for DefaultErrorHandler {
    fn handle(&self, error: SkywayError, ctx: &ErrorContext) -> Response {
        let request_id = ctx.request_id.to_string();
        let mut response = Response::json(error.status_code(), &error.to_envelope(Some(&request_id)));
        if let SkywayError::MethodNotAllowed { allow } = &error {
            if let Ok(value) = HeaderValue::from_str(allow) {
                response.headers_mut().insert(header::ALLOW, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use http_body_util::BodyExt;

    fn context(method: Method, uri: &'static str) -> ErrorContext {
        ErrorContext {
            request_id: RequestId::new(),
            method,
            uri: Uri::from_static(uri),
            operation: None,
        }
    }

    #[tokio::test]
    async fn test_default_envelope() {
        let ctx = context(Method::GET, "/missing");
        let response = DefaultErrorHandler.handle(SkywayError::NotFound, &ctx);

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let envelope: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(envelope["error"]["code"], "NOT_FOUND");
        assert_eq!(envelope["request_id"], ctx.request_id.to_string());
    }

    #[test]
    fn test_method_not_allowed_sets_allow() {
        let response = DefaultErrorHandler.handle(
            SkywayError::method_not_allowed("GET,POST,OPTIONS"),
            &context(Method::DELETE, "/users"),
        );
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "GET,POST,OPTIONS");
    }

    #[test]
    fn test_closure_handler() {
        let handler = |error: SkywayError, _ctx: &ErrorContext| {
            Response::empty(error.status_code())
        };
        let response = handler.handle(SkywayError::unauthorized("Unauthorized"), &context(Method::GET, "/"));
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
