//! Caller-supplied operation handlers.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use skyway_core::{Operation, RequestId, SkywayResult};

use crate::context::{Authenticated, HeaderParams, MiddlewareContext, ParsedBody, PathParams, QueryParams};
use crate::middleware::BoxFuture;
use crate::types::{Request, Response};

/// A request that made it through every stage of its operation chain.
///
/// Parameters are the coerced values, so a path parameter declared as
/// `integer` is a JSON number here.
#[derive(Debug)]
pub struct ApiRequest {
    /// The underlying request, body included.
    pub request: Request,
    /// Request id for correlation.
    pub request_id: RequestId,
    /// The operation being served.
    pub operation: Arc<Operation>,
    /// Coerced path parameters.
    pub params: Value,
    /// Coerced query parameters.
    pub query: Value,
    /// Validated headers keyed by lowercase name.
    pub headers: Value,
    /// Parsed and validated body, when the operation takes one.
    pub body: Option<Value>,
    /// Schemes of the security group that admitted the request.
    pub authenticated: Vec<String>,
}

impl ApiRequest {
    /// Collects what the stages stored in `ctx`.
    pub(crate) fn from_context(
        ctx: &mut MiddlewareContext,
        operation: Arc<Operation>,
        request: Request,
    ) -> Self {
        let empty = || Value::Object(serde_json::Map::new());
        Self {
            request,
            request_id: ctx.request_id(),
            operation,
            params: ctx
                .remove_extension::<PathParams>()
                .map_or_else(empty, |p| p.0),
            query: ctx
                .remove_extension::<QueryParams>()
                .map_or_else(empty, |p| p.0),
            headers: ctx
                .remove_extension::<HeaderParams>()
                .map_or_else(empty, |p| p.0),
            body: ctx.remove_extension::<ParsedBody>().map(|p| p.0),
            authenticated: ctx
                .get_extension::<Authenticated>()
                .map(|a| a.0.clone())
                .unwrap_or_default(),
        }
    }

    /// A coerced path parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// A coerced query parameter.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&Value> {
        self.query.get(name)
    }
}

/// Serves one operation.
pub trait Handler: Send + Sync + 'static {
    /// Produces the response.
    fn call(&self, request: ApiRequest) -> BoxFuture<'static, SkywayResult<Response>>;
}

impl<F, Fut> Handler for F
where
    F: Fn(ApiRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SkywayResult<Response>> + Send + 'static,
{
    fn call(&self, request: ApiRequest) -> BoxFuture<'static, SkywayResult<Response>> {
        Box::pin(self(request))
    }
}

/// A shared handler.
pub type BoxedHandler = Arc<dyn Handler>;
