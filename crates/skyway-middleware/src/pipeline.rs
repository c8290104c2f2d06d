//! Ordered stage lists.

use std::sync::Arc;

use skyway_core::SkywayResult;

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};

/// A shared stage.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// An ordered, immutable list of stages ending in a terminal step.
///
/// Built once per operation and shared by every request it serves.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<BoxedMiddleware>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl Pipeline {
    /// Starts an empty builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Runs every stage in order, then `terminal`.
    pub async fn process<T>(
        &self,
        ctx: &mut MiddlewareContext,
        request: Request,
        terminal: T,
    ) -> SkywayResult<Response>
    where
        T: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, SkywayResult<Response>>
            + Send,
    {
        let next = self
            .stages
            .iter()
            .rev()
            .fold(Next::terminal(terminal), |next, stage| {
                Next::new(stage.as_ref(), next)
            });
        next.run(ctx, request).await
    }

    /// Stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the pipeline has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<BoxedMiddleware>,
}

impl PipelineBuilder {
    /// Appends a stage.
    #[must_use]
    pub fn stage<M: Middleware>(mut self, middleware: M) -> Self {
        self.stages.push(Arc::new(middleware));
        self
    }

    /// Appends a stage when one is given.
    #[must_use]
    pub fn optional_stage<M: Middleware>(self, middleware: Option<M>) -> Self {
        match middleware {
            Some(middleware) => self.stage(middleware),
            None => self,
        }
    }

    /// Freezes the stage order.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages,
        }
    }
}
