//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! The trie holds handlers of *different* types in one tree, so each one is
//! hidden behind a trait object (`dyn ErasedHandler`). Middleware works on the
//! same erased form: it takes a [`BoxedHandler`] and returns another one,
//! which is what lets a chain be composed once at registration time.
//!
//! ```text
//! async fn hello(req: Request) -> Response { … }   ← user writes this
//!        ↓ cluster.get("/", hello)
//! hello.into_boxed_handler()                       ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(hello))                       ← BoxedHandler
//!        ↓ middleware fold, outermost last
//! logger(rate_limit(FnHandler(hello)))             ← stored in the trie
//!        ↓
//! handler.call(req)  at request time               ← one vtable dispatch per layer
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::StatusCode;

use crate::error::BoxError;
use crate::request::Request;
use crate::response::{Envelope, IntoResponse, Response};

/// What every handler, wrapped or not, eventually produces.
///
/// `Err` is the handler's failure signal; the dispatcher turns it into a
/// 500 envelope. A middleware that rejects a request without failing
/// (401, 429, …) returns `Ok` with that response instead.
pub type HandlerResult = Result<Response, BoxError>;

/// A heap-allocated, type-erased future that resolves to a [`HandlerResult`].
///
/// `Pin<Box<…>>` because the runtime polls the future in place and it must
/// not move after the first poll. `Send + 'static` lets tokio run it on any
/// worker thread.
pub type BoxFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send + 'static>>;

/// Dispatch interface shared by plain handlers and middleware-wrapped ones.
///
/// Public because middleware written by hand receives and returns
/// [`BoxedHandler`]s and calls them through this trait.
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
///
/// Cloning is one atomic increment.
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Handler output ────────────────────────────────────────────────────────────

/// Conversion of a handler's return value into a [`HandlerResult`].
///
/// Anything that is [`IntoResponse`] succeeds. `Result<T, E>` fails with `E`.
pub trait IntoHandlerResult {
    fn into_handler_result(self) -> HandlerResult;
}

impl<T, E> IntoHandlerResult for Result<T, E>
where
    T: IntoResponse,
    E: Into<BoxError>,
{
    fn into_handler_result(self) -> HandlerResult {
        self.map(IntoResponse::into_response).map_err(Into::into)
    }
}

impl IntoHandlerResult for Response {
    fn into_handler_result(self) -> HandlerResult { Ok(self) }
}

impl IntoHandlerResult for &'static str {
    fn into_handler_result(self) -> HandlerResult { Ok(self.into_response()) }
}

impl IntoHandlerResult for String {
    fn into_handler_result(self) -> HandlerResult { Ok(self.into_response()) }
}

impl IntoHandlerResult for StatusCode {
    fn into_handler_result(self) -> HandlerResult { Ok(self.into_response()) }
}

impl<T: serde::Serialize> IntoHandlerResult for Envelope<T> {
    fn into_handler_result(self) -> HandlerResult { Ok(self.into_response()) }
}

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is satisfied by any `async fn` or
/// closure with the shape:
///
/// ```text
/// async fn name(req: Request) -> impl IntoHandlerResult
/// ```
///
/// The trait is **sealed**: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    fn into_boxed_handler(self) -> BoxedHandler;
}

// `Sealed` is unnameable outside this module, so no other crate can
// implement `Handler` for its own types.
mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoHandlerResult + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoHandlerResult + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Boxes any handler. Handy when writing a [`Middleware`](crate::Middleware)
/// by hand.
pub fn boxed(handler: impl Handler) -> BoxedHandler {
    handler.into_boxed_handler()
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Newtype bridging a concrete handler `F` to [`ErasedHandler`].
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoHandlerResult + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        // Calling the function only builds its future. The work happens when
        // the boxed future below is polled.
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_handler_result() })
    }
}
