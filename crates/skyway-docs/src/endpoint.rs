//! The documentation endpoint.

use std::future::Future;
use std::sync::Arc;

use http::StatusCode;
use serde_json::{json, Map, Value};
use skyway_core::SchemaError;
use skyway_middleware::{BoxFuture, Response, ResponseExt};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::private::filter_private;

type DocumentSource = Arc<dyn Fn() -> BoxFuture<'static, Result<Arc<Value>, SchemaError>> + Send + Sync>;

/// Serves the API document as JSON with private parts removed.
///
/// The document is filtered on the first request and cached; later
/// requests reuse the result. A document that failed to load is answered
/// with `{"error":"Invalid Schema"}`.
#[derive(Clone)]
pub struct DocsEndpoint {
    source: DocumentSource,
    filtered: Arc<OnceCell<Value>>,
}

impl std::fmt::Debug for DocsEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocsEndpoint")
            .field("cached", &self.filtered.initialized())
            .finish()
    }
}

impl DocsEndpoint {
    /// Creates an endpoint reading the raw document from `source`.
    pub fn new<F, Fut>(source: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<Value>, SchemaError>> + Send + 'static,
    {
        Self {
            source: Arc::new(move || -> BoxFuture<'static, _> { Box::pin(source()) }),
            filtered: Arc::new(OnceCell::new()),
        }
    }

    /// Creates an endpoint for a document that is already loaded.
    #[must_use]
    pub fn from_document(document: Value) -> Self {
        let document = Arc::new(document);
        Self::new(move || {
            let document = Arc::clone(&document);
            async move { Ok::<_, SchemaError>(document) }
        })
    }

    /// The filtered document, computing it on first use.
    pub async fn document(&self) -> &Value {
        self.filtered
            .get_or_init(|| async {
                match (self.source)().await {
                    Ok(document) => {
                        filter_private(&document).unwrap_or_else(|| Value::Object(Map::new()))
                    }
                    Err(error) => {
                        debug!(error = %error, "Invalid Schema");
                        json!({ "error": "Invalid Schema" })
                    }
                }
            })
            .await
    }

    /// Answers a documentation request.
    pub async fn handle(&self) -> Response {
        Response::json(StatusCode::OK, self.document().await)
    }
}
