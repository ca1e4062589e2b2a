//! Named async middleware and the sequential chain runner.
//! Each middleware either passes the request on, finishes the response, or fails the chain.

use crate::context::RequestContext;
use crate::error::AppError;
use axum::response::{IntoResponse, Response};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// What a middleware decided.
pub enum Flow {
    /// Continue with the next middleware in the chain.
    Next(RequestContext),
    /// Response is complete; stop the chain.
    Done(Response),
    /// Forward an error to the chain owner, which terminates the request.
    Fail(RequestContext, AppError),
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flow::Next(_) => f.write_str("Next"),
            Flow::Done(r) => write!(f, "Done({})", r.status()),
            Flow::Fail(_, e) => write!(f, "Fail({})", e),
        }
    }
}

type Handler = dyn Fn(RequestContext) -> BoxFuture<Flow> + Send + Sync;

/// A request handler with a name. Clones share identity, so overrides can be checked with [`Middleware::ptr_eq`].
#[derive(Clone)]
pub struct Middleware {
    name: Arc<str>,
    handler: Arc<Handler>,
}

impl Middleware {
    pub fn new<F, Fut>(name: &str, f: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Flow> + Send + 'static,
    {
        Middleware {
            name: Arc::from(name),
            handler: Arc::new(move |ctx| -> BoxFuture<Flow> { Box::pin(f(ctx)) }),
        }
    }

    /// Synchronous request mutation that always continues.
    pub fn mutate<F>(name: &str, f: F) -> Self
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Middleware::new(name, move |mut ctx| {
            let f = f.clone();
            async move {
                f(&mut ctx);
                Flow::Next(ctx)
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn call(&self, ctx: RequestContext) -> Flow {
        (self.handler)(ctx).await
    }

    pub fn ptr_eq(a: &Middleware, b: &Middleware) -> bool {
        Arc::ptr_eq(&a.handler, &b.handler)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Middleware").field(&self.name).finish()
    }
}

/// Run `chain` in order until a middleware finishes or fails.
/// A failure becomes the error's HTTP response; falling off the end is a 404.
pub async fn run_chain(chain: &[Middleware], mut ctx: RequestContext) -> Response {
    for mw in chain {
        match mw.call(ctx).await {
            Flow::Next(next) => ctx = next,
            Flow::Done(response) => return response,
            Flow::Fail(failed, err) => {
                tracing::debug!(middleware = mw.name(), path = %failed.uri.path(), error = %err, "chain failed");
                return err.into_response();
            }
        }
    }
    AppError::NotFound(ctx.uri.path().to_string()).into_response()
}
