//! Router facade over the radix tree.

use http::Method;

use crate::method_router::MethodRouter;
use crate::node::Node;
use crate::params::Params;
use crate::RouteMatch;

/// Outcome of looking up a method and path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<'a> {
    /// The path and the method are both declared.
    Matched(RouteMatch<'a>),
    /// The path exists but the method is not declared on it.
    MethodNotAllowed {
        /// Methods declared on the matched path.
        methods: &'a MethodRouter,
        /// Captures from the matched path.
        params: Params,
    },
    /// No template matches the path.
    NotFound,
}

/// Radix tree router over `:name` path templates.
///
/// Literal segments take priority over captures, so `/users/me` is
/// preferred to `/users/:id` for the path `/users/me`.
///
/// ```rust
/// use http::Method;
/// use skyway_router::{Lookup, Router};
///
/// let mut router = Router::new();
/// router.route(&Method::GET, "/v1/users/:id", "GET /users/{id}");
///
/// match router.lookup(&Method::GET, "/v1/users/7") {
///     Lookup::Matched(found) => {
///         assert_eq!(found.operation, "GET /users/{id}");
///         assert_eq!(found.params.get("id"), Some("7"));
///     }
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Router {
    root: Node,
    templates: usize,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Node::root(),
            templates: 0,
        }
    }

    /// Registers a method table for a template.
    pub fn insert(&mut self, template: &str, methods: MethodRouter) {
        self.root.insert(template, methods);
        self.templates += 1;
    }

    /// Registers a single operation.
    pub fn route(&mut self, method: &Method, template: &str, operation: impl Into<String>) {
        self.insert(template, MethodRouter::new().on(method, operation));
    }

    /// Finds the method table for a path.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<(&MethodRouter, Params)> {
        self.root.match_path(path)
    }

    /// Resolves a request to an operation.
    #[must_use]
    pub fn lookup(&self, method: &Method, path: &str) -> Lookup<'_> {
        let Some((methods, params)) = self.match_path(path) else {
            return Lookup::NotFound;
        };
        match methods.operation(method) {
            Some(operation) => Lookup::Matched(RouteMatch { operation, params }),
            None => Lookup::MethodNotAllowed { methods, params },
        }
    }

    /// Number of `insert` calls made.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates
    }

    /// True when nothing was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates == 0
    }
}
