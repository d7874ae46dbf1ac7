//! Middleware layer.
//!
//! A [`Middleware`] turns one handler into another. Chains are composed once,
//! when a route is registered, by [`compose`]: the first middleware in the
//! chain ends up outermost, so it sees the request first and the response
//! last.
//!
//! ```text
//! chain [A, B], handler H
//!
//!   request ──► A ──► B ──► H
//!   response ◄── A ◄── B ◄──┘
//! ```
//!
//! Middleware may answer without calling [`Next::run`]. That is how
//! authorization, rate limiting and similar gates reject a request.
//!
//! Built in:
//! - [`logger`]: one `tracing` event per request with method, path, status, latency
//! - [`rate_limit`]: fixed-window request counter per peer address

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, HandlerResult, IntoHandlerResult};
use crate::request::Request;

mod logger;
mod rate_limit;

pub use logger::logger;
pub use rate_limit::{rate_limit, RateLimiter};

type WrapFn = dyn Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static;

/// A named handler → handler transformation.
///
/// Cheap to clone; clones share the same function and whatever state it
/// captured.
#[derive(Clone)]
pub struct Middleware {
    name: Arc<str>,
    wrap: Arc<WrapFn>,
}

impl Middleware {
    /// Builds a middleware from a raw wrapping function.
    pub fn new<F>(name: &str, wrap: F) -> Self
    where
        F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
    {
        Self { name: Arc::from(name), wrap: Arc::new(wrap) }
    }

    /// Builds a middleware from an async function that receives the request
    /// and the rest of the chain.
    ///
    /// ```rust
    /// use strata::{Middleware, Next, Request};
    ///
    /// let timing = Middleware::from_fn("timing", |req: Request, next: Next| async move {
    ///     let start = std::time::Instant::now();
    ///     let res = next.run(req).await;
    ///     tracing::debug!(elapsed = ?start.elapsed());
    ///     res
    /// });
    /// ```
    pub fn from_fn<F, Fut, R>(name: &str, f: F) -> Self
    where
        F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoHandlerResult + Send + 'static,
    {
        let f = Arc::new(f);
        Self::new(name, move |next: BoxedHandler| -> BoxedHandler {
            Arc::new(FromFn { f: Arc::clone(&f), next })
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wraps `next`.
    pub fn apply(&self, next: BoxedHandler) -> BoxedHandler {
        (self.wrap)(next)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Middleware").field(&self.name).finish()
    }
}

/// Wraps `handler` in `chain`, `chain[0]` outermost.
///
/// An explicit reverse fold: the last middleware wraps the handler first.
pub fn compose(chain: &[Middleware], handler: BoxedHandler) -> BoxedHandler {
    chain.iter().rev().fold(handler, |next, mw| mw.apply(next))
}

/// The remainder of the chain, handed to a [`Middleware::from_fn`] function.
pub struct Next(BoxedHandler);

impl Next {
    /// Calls the next middleware, or the handler if this was the last one.
    pub async fn run(self, req: Request) -> HandlerResult {
        self.0.call(req).await
    }
}

struct FromFn<F> {
    f: Arc<F>,
    next: BoxedHandler,
}

impl<F, Fut, R> ErasedHandler for FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoHandlerResult + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.f)(req, Next(Arc::clone(&self.next)));
        Box::pin(async move { fut.await.into_handler_result() })
    }
}
