//! Path router for Skyway.
//!
//! Operations are mounted under `basePath` with their Swagger `{name}`
//! placeholders rewritten to `:name` captures. The router resolves a
//! request method and path to the key of the operation that serves it,
//! distinguishing an unknown path from a known path with an undeclared
//! method so the caller can answer 404 or 405.
//!
//! ```rust
//! use http::Method;
//! use skyway_router::{Lookup, MethodRouter, Router};
//!
//! let mut router = Router::new();
//! router.insert(
//!     "/users/:id",
//!     MethodRouter::new()
//!         .on(&Method::GET, "GET /users/{id}")
//!         .on(&Method::PUT, "PUT /users/{id}"),
//! );
//!
//! assert!(matches!(router.lookup(&Method::GET, "/users/1"), Lookup::Matched(_)));
//! assert!(matches!(
//!     router.lookup(&Method::POST, "/users/1"),
//!     Lookup::MethodNotAllowed { .. }
//! ));
//! assert_eq!(router.lookup(&Method::GET, "/teams"), Lookup::NotFound);
//! ```

mod method_router;
mod node;
mod params;
mod router;

pub use method_router::MethodRouter;
pub use node::{Node, SegmentKind};
pub use params::Params;
pub use router::{Lookup, Router};

/// A resolved operation and the raw captures from its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    /// Key of the matched operation.
    pub operation: &'a str,
    /// Captured path parameters, percent-decoded.
    pub params: Params,
}
