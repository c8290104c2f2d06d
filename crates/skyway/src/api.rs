//! The API instance and its one-shot document loading.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use skyway_core::normalize::{check_structure, normalize};
use skyway_core::{NormalizedDocument, SchemaError};
use skyway_docs::DocsEndpoint;
use skyway_middleware::BoxFuture;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, error, info};

use crate::options::SkywayOptions;
use crate::routes::Routes;

type DocumentSource = BoxFuture<'static, Result<Value, SchemaError>>;

struct Inner {
    source: Mutex<Option<DocumentSource>>,
    document: OnceCell<Result<Arc<Value>, SchemaError>>,
    normalized: OnceCell<Result<Arc<NormalizedDocument>, SchemaError>>,
}

impl Inner {
    /// The raw document once it loaded and passed the structural checks.
    async fn document(&self) -> Result<Arc<Value>, SchemaError> {
        self.document
            .get_or_init(|| async {
                let loaded = {
                    let mut source = self.source.lock().await;
                    match &mut *source {
                        Some(pending) => {
                            let loaded = pending.await;
                            *source = None;
                            loaded
                        }
                        None => Err(SchemaError::new("API document source already consumed")),
                    }
                };

                let result = loaded
                    .and_then(|document| {
                        check_structure(&document)?;
                        Ok(Arc::new(document))
                    })
                    .map_err(SchemaError::clean);
                if let Err(e) = &result {
                    error!(error = %e, "Invalid Schema");
                }
                result
            })
            .await
            .clone()
    }

    async fn normalized(&self) -> Result<Arc<NormalizedDocument>, SchemaError> {
        self.normalized
            .get_or_init(|| async {
                let document = self.document().await?;
                match normalize(&document) {
                    Ok(normalized) => {
                        info!(
                            paths = normalized.paths.len(),
                            operations = normalized.operations().count(),
                            "API document normalized"
                        );
                        Ok(Arc::new(normalized))
                    }
                    Err(e) => {
                        let e = e.clean();
                        error!(error = %e, "Invalid Schema");
                        Err(e)
                    }
                }
            })
            .await
            .clone()
    }
}

/// One API described by one Swagger 2.0 document.
///
/// The document is loaded at most once, on first use, and the outcome is
/// cached: every request, documentation read and [`ready`](Self::ready)
/// call sees the same normalized document or the same cleaned error.
/// Clones share that state.
///
/// ```
/// use serde_json::json;
/// use skyway::Skyway;
///
/// # tokio_test::block_on(async {
/// let api = Skyway::from_value(json!({
///     "swagger": "2.0",
///     "info": { "title": "Pets", "version": "1.0.0" },
///     "paths": { "/pets": { "get": { "responses": {} } } }
/// }));
///
/// let document = api.ready().await.unwrap();
/// assert_eq!(document.operations().count(), 1);
/// # });
/// ```
#[derive(Clone)]
pub struct Skyway {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Skyway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Skyway")
            .field("loaded", &self.inner.document.initialized())
            .field("normalized", &self.inner.normalized.initialized())
            .finish()
    }
}

impl Skyway {
    /// Uses a document that is already in memory.
    #[must_use]
    pub fn from_value(document: Value) -> Self {
        Self::from_future(async move { Ok(document) })
    }

    /// Reads a JSON document from disk on first use.
    ///
    /// Read and parse failures are reported without the file path.
    #[must_use]
    pub fn from_json_file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self::from_future(async move {
            let bytes = tokio::fs::read(&path).await.map_err(|e| {
                debug!(path = %path.display(), error = %e, "failed to read API document");
                SchemaError::new(format!("Unable to read API document: {}", e.kind()))
            })?;
            serde_json::from_slice(&bytes)
                .map_err(|e| SchemaError::new(format!("API document is not valid JSON: {e}")))
        })
    }

    /// Uses a document produced by an arbitrary loader, e.g. one that
    /// fetches and dereferences it.
    #[must_use]
    pub fn from_future<F>(source: F) -> Self
    where
        F: Future<Output = Result<Value, SchemaError>> + Send + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                source: Mutex::new(Some(Box::pin(source))),
                document: OnceCell::new(),
                normalized: OnceCell::new(),
            }),
        }
    }

    /// Resolves with the normalized document, or the cleaned load error.
    pub async fn ready(&self) -> Result<Arc<NormalizedDocument>, SchemaError> {
        self.inner.normalized().await
    }

    /// The raw document as loaded.
    pub async fn document(&self) -> Result<Arc<Value>, SchemaError> {
        self.inner.document().await
    }

    /// The documentation endpoint for this API.
    #[must_use]
    pub fn docs(&self) -> DocsEndpoint {
        let inner = Arc::clone(&self.inner);
        DocsEndpoint::new(move || {
            let inner = Arc::clone(&inner);
            async move { inner.document().await }
        })
    }

    /// Mounts the operations of this API with `options`.
    ///
    /// Nothing is compiled until the first request, which waits for the
    /// document like every request after it.
    #[must_use]
    pub fn routes(&self, options: SkywayOptions) -> Routes {
        Routes::new(self.clone(), options)
    }
}
