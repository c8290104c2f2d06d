//! Per-request state carried through a chain.
//!
//! Stages communicate through typed extensions: the router stores the raw
//! [`RouteParams`], head validation replaces them with coerced
//! [`PathParams`], parsing stores a [`ParsedBody`] and so on. The context
//! is request-local and never shared between requests.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use http::HeaderMap;
use serde_json::Value;
use skyway_core::{Operation, RequestId};
use skyway_router::Params;

/// Raw path captures from the router.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams(pub Params);

/// Coerced path parameters, set once head validation succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct PathParams(pub Value);

/// Coerced query parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParams(pub Value);

/// Validated header view keyed by lowercase name.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderParams(pub Value);

/// Decoded request body. Replaced by its coerced form after body validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBody(pub Value);

/// Schemes of the security group that admitted the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Authenticated(pub Vec<String>);

/// CORS headers owed to the response, applied to error responses too.
#[derive(Debug, Clone, Default)]
pub struct CorsHeaders(pub HeaderMap);

/// Context that flows through a composed chain.
#[derive(Debug)]
pub struct MiddlewareContext {
    request_id: RequestId,
    operation: Option<Arc<Operation>>,
    chain_started: bool,
    started_at: Instant,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl MiddlewareContext {
    /// Creates a context with a fresh request id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_id(RequestId::new())
    }

    /// Creates a context with a known request id.
    #[must_use]
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            operation: None,
            chain_started: false,
            started_at: Instant::now(),
            extensions: HashMap::new(),
        }
    }

    /// The request id.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// The operation being served, once routing resolved it.
    #[must_use]
    pub fn operation(&self) -> Option<&Arc<Operation>> {
        self.operation.as_ref()
    }

    /// Records the operation being served.
    pub fn set_operation(&mut self, operation: Arc<Operation>) {
        self.operation = Some(operation);
    }

    /// Marks the request as having entered an operation chain.
    ///
    /// Returns `false` when a chain already ran for this request.
    pub fn begin_chain(&mut self) -> bool {
        !std::mem::replace(&mut self.chain_started, true)
    }

    /// Time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Stores a typed extension, replacing any previous value of that type.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Reads a typed extension.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref())
    }

    /// Removes and returns a typed extension.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast().ok())
            .map(|boxed| *boxed)
    }

    /// Whether an extension of type `T` is stored.
    #[must_use]
    pub fn has_extension<T: Send + Sync + 'static>(&self) -> bool {
        self.extensions.contains_key(&TypeId::of::<T>())
    }
}

impl Default for MiddlewareContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extensions_round_trip() {
        let mut ctx = MiddlewareContext::new();
        assert!(!ctx.has_extension::<PathParams>());

        ctx.set_extension(PathParams(json!({ "id": 1 })));
        assert_eq!(ctx.get_extension::<PathParams>(), Some(&PathParams(json!({ "id": 1 }))));

        ctx.set_extension(PathParams(json!({ "id": 2 })));
        assert_eq!(
            ctx.remove_extension::<PathParams>(),
            Some(PathParams(json!({ "id": 2 })))
        );
        assert!(!ctx.has_extension::<PathParams>());
    }

    #[test]
    fn test_chain_guard_fires_once() {
        let mut ctx = MiddlewareContext::new();
        assert!(ctx.begin_chain());
        assert!(!ctx.begin_chain());
    }

    #[test]
    fn test_request_id_is_kept() {
        let id = RequestId::new();
        assert_eq!(MiddlewareContext::with_request_id(id).request_id(), id);
    }
}
