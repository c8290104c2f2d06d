//! The stage trait and chain continuation.
//!
//! A stage either returns an error, which aborts the rest of the chain, or
//! calls [`Next::run`] exactly once to hand the request on. Errors travel
//! back out through `?` to the single error handler installed by the host;
//! no stage recovers locally.

use std::future::Future;
use std::pin::Pin;

use skyway_core::SkywayResult;

use crate::context::MiddlewareContext;
use crate::types::{Request, Response};

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Terminal step of a chain.
type Terminal<'a> = Box<
    dyn FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, SkywayResult<Response>>
        + Send
        + 'a,
>;

/// One stage of an operation chain.
pub trait Middleware: Send + Sync + 'static {
    /// Stage name used in logs.
    fn name(&self) -> &'static str;

    /// Processes the request, usually by calling `next.run` once.
    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, SkywayResult<Response>>;
}

/// The rest of the chain.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    Terminal(Terminal<'a>),
}

impl<'a> Next<'a> {
    /// Continues with `middleware`, then `next`.
    pub fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Ends the chain with `terminal`.
    pub fn terminal<F>(terminal: F) -> Self
    where
        F: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, SkywayResult<Response>>
            + Send
            + 'a,
    {
        Self {
            inner: NextInner::Terminal(Box::new(terminal)),
        }
    }

    /// Runs the remaining chain. Consumes `self`, so it runs at most once.
    pub async fn run(self, ctx: &mut MiddlewareContext, request: Request) -> SkywayResult<Response> {
        match self.inner {
            NextInner::Chain { middleware, next } => {
                middleware.process(ctx, request, *next).await
            }
            NextInner::Terminal(terminal) => terminal(ctx, request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResponseExt;
    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::Full;
    use skyway_core::SkywayError;

    #[derive(Debug, PartialEq)]
    struct Visited(Vec<&'static str>);

    struct Record(&'static str);

    impl Middleware for Record {
        fn name(&self) -> &'static str {
            self.0
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut MiddlewareContext,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, SkywayResult<Response>> {
            Box::pin(async move {
                let mut visited = ctx.remove_extension::<Visited>().unwrap_or(Visited(Vec::new()));
                visited.0.push(self.0);
                ctx.set_extension(visited);
                next.run(ctx, request).await
            })
        }
    }

    struct Reject;

    impl Middleware for Reject {
        fn name(&self) -> &'static str {
            "reject"
        }

        fn process<'a>(
            &'a self,
            _ctx: &'a mut MiddlewareContext,
            _request: Request,
            _next: Next<'a>,
        ) -> BoxFuture<'a, SkywayResult<Response>> {
            Box::pin(async { Err(SkywayError::unauthorized("no")) })
        }
    }

    fn request() -> Request {
        http::Request::builder()
            .uri("/test")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    fn ok_terminal<'a>() -> Next<'a> {
        Next::terminal(|_ctx, _req| Box::pin(async { Ok(Response::empty(StatusCode::OK)) }))
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let first = Record("first");
        let second = Record("second");
        let mut ctx = MiddlewareContext::new();

        let next = Next::new(&first, Next::new(&second, ok_terminal()));
        let response = next.run(&mut ctx, request()).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            ctx.get_extension::<Visited>(),
            Some(&Visited(vec!["first", "second"]))
        );
    }

    #[tokio::test]
    async fn test_error_skips_remaining_stages() {
        let reject = Reject;
        let after = Record("after");
        let mut ctx = MiddlewareContext::new();

        let next = Next::new(&reject, Next::new(&after, ok_terminal()));
        let error = next.run(&mut ctx, request()).await.unwrap_err();

        assert!(matches!(error, SkywayError::Unauthorized { .. }));
        assert!(ctx.get_extension::<Visited>().is_none());
    }
}
