//! Per-path method table.

use http::Method;

/// Methods a Swagger 2.0 path item can declare, in document order.
const SLOTS: [Method; 7] = [
    Method::GET,
    Method::PUT,
    Method::POST,
    Method::DELETE,
    Method::OPTIONS,
    Method::HEAD,
    Method::PATCH,
];

fn slot(method: &Method) -> Option<usize> {
    SLOTS.iter().position(|candidate| candidate == method)
}

/// Maps the methods declared on one path to their operation keys.
///
/// Only the seven methods a Swagger path item can hold are accepted;
/// anything else is ignored on insert and never matches.
///
/// ```rust
/// use http::Method;
/// use skyway_router::MethodRouter;
///
/// let methods = MethodRouter::new()
///     .on(&Method::GET, "GET /users")
///     .on(&Method::POST, "POST /users");
///
/// assert_eq!(methods.operation(&Method::GET), Some("GET /users"));
/// assert_eq!(methods.operation(&Method::DELETE), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodRouter {
    slots: [Option<String>; 7],
}

impl MethodRouter {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an operation for a method.
    #[must_use]
    pub fn on(mut self, method: &Method, operation: impl Into<String>) -> Self {
        if let Some(index) = slot(method) {
            self.slots[index] = Some(operation.into());
        }
        self
    }

    /// Returns the operation registered for a method.
    #[must_use]
    pub fn operation(&self, method: &Method) -> Option<&str> {
        slot(method).and_then(|index| self.slots[index].as_deref())
    }

    /// Iterates the declared methods in document order.
    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        SLOTS
            .iter()
            .zip(&self.slots)
            .filter(|(_, operation)| operation.is_some())
            .map(|(method, _)| method)
    }

    /// True when no method is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Fills empty slots from `other`. Existing registrations win.
    pub fn merge(&mut self, other: MethodRouter) {
        for (mine, theirs) in self.slots.iter_mut().zip(other.slots) {
            if mine.is_none() {
                *mine = theirs;
            }
        }
    }
}
