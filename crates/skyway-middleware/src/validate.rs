//! Head and body validation stages.

use std::sync::Arc;

use serde_json::{Map, Value};
use skyway_core::{SkywayError, SkywayResult};
use skyway_validate::input::{header_object, path_object, query_object};
use skyway_validate::OperationValidators;
use tracing::debug;

use crate::context::{HeaderParams, MiddlewareContext, ParsedBody, PathParams, QueryParams, RouteParams};
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};

/// Validates path, query and headers before any body is read.
///
/// On success the raw [`RouteParams`] are replaced by coerced
/// [`PathParams`], and [`QueryParams`] and [`HeaderParams`] are stored.
#[derive(Debug, Clone)]
pub struct ValidateHeadStage {
    validators: Arc<OperationValidators>,
}

impl ValidateHeadStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(validators: Arc<OperationValidators>) -> Self {
        Self { validators }
    }
}

impl Middleware for ValidateHeadStage {
    fn name(&self) -> &'static str {
        "validate_head"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, SkywayResult<Response>> {
        Box::pin(async move {
            let raw_path = match ctx.get_extension::<RouteParams>() {
                Some(RouteParams(params)) => path_object(params.iter()),
                None => Value::Object(Map::new()),
            };

            let path = self.validators.path.validate(raw_path)?;
            let raw_query = query_object(request.uri().query()).map_err(|e| {
                SkywayError::validation(format!("Invalid query string: {e}"), Vec::new())
            })?;
            let query = self.validators.query.validate(raw_query)?;
            let headers = self
                .validators
                .header
                .validate(header_object(request.headers()))?;

            debug!(request_id = %ctx.request_id(), "head validated");
            ctx.remove_extension::<RouteParams>();
            ctx.set_extension(PathParams(path));
            ctx.set_extension(QueryParams(query));
            ctx.set_extension(HeaderParams(headers));

            next.run(ctx, request).await
        })
    }
}

/// Validates the parsed body. Does nothing when parsing did not run; a
/// `null` body counts as absent and fails only when the body is required.
#[derive(Debug, Clone)]
pub struct ValidateBodyStage {
    validators: Arc<OperationValidators>,
}

impl ValidateBodyStage {
    /// Creates the stage, or `None` when the operation takes no body.
    #[must_use]
    pub fn new(validators: Arc<OperationValidators>) -> Option<Self> {
        validators.body.is_some().then_some(Self { validators })
    }
}

impl Middleware for ValidateBodyStage {
    fn name(&self) -> &'static str {
        "validate_body"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, SkywayResult<Response>> {
        Box::pin(async move {
            if let Some(ParsedBody(body)) = ctx.remove_extension::<ParsedBody>() {
                match self.validators.validate_body(body)? {
                    Some(body) => {
                        debug!(request_id = %ctx.request_id(), "body validated");
                        ctx.set_extension(ParsedBody(body));
                    }
                    None => debug!(request_id = %ctx.request_id(), "no request body"),
                }
            }
            next.run(ctx, request).await
        })
    }
}
