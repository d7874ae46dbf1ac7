//! Request dispatch: the one place a lookup result or a handler failure
//! becomes a boundary-visible outcome.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use http::StatusCode;
use tracing::{debug, error};

use crate::error::DispatchError;
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::router::Router;
use crate::trie::Matched;

/// How a dispatched request ended.
#[derive(Debug)]
pub enum Outcome {
    /// A handler answered. Middleware rejections (401, 429, …) land here too.
    Matched(Response),
    /// Nothing is registered for the request method.
    MethodNotAllowed,
    /// The method is known but no route matches the path.
    NotFound,
    /// The handler failed or panicked. Holds a
    /// [`DispatchError::HandlerFailure`] or [`DispatchError::HandlerFault`].
    InternalError(DispatchError),
}

impl Outcome {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Matched(res) => res.status_code(),
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::InternalError(e) => e.status(),
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched(_))
    }
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        match self {
            Self::Matched(res) => res,
            Self::MethodNotAllowed => {
                Response::envelope(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
            }
            Self::NotFound => Response::envelope(StatusCode::NOT_FOUND, "Not Found"),
            Self::InternalError(e) => Response::envelope(e.status(), e.to_string()),
        }
    }
}

impl Router {
    /// Routes `req` and runs the matched handler.
    ///
    /// Middleware is already part of the stored handler; nothing is applied
    /// here. A panic anywhere in the handler chain is caught and reported as
    /// [`Outcome::InternalError`], so one bad request cannot take the
    /// serving task down. Nothing is retried.
    pub async fn dispatch(&self, mut req: Request) -> Outcome {
        let Matched { handler, params } = match self.lookup(&req.method, &req.path) {
            Ok(matched) => matched,
            Err(DispatchError::MethodNotAllowed) => {
                debug!(method = %req.method, path = %req.path, "method not allowed");
                return Outcome::MethodNotAllowed;
            }
            Err(_) => {
                debug!(method = %req.method, path = %req.path, "route not found");
                return Outcome::NotFound;
            }
        };

        let method = req.method.clone();
        let path = req.path.clone();
        req.set_params(params);

        let call = AssertUnwindSafe(async move { handler.call(req).await });
        match call.catch_unwind().await {
            Ok(Ok(res)) => Outcome::Matched(res),
            Ok(Err(e)) => {
                error!(%method, %path, error = %e, "handler failed");
                Outcome::InternalError(DispatchError::HandlerFailure(e))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(%method, %path, panic = %message, "handler panicked");
                Outcome::InternalError(DispatchError::HandlerFault(message))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
