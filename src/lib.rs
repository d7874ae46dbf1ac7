//! # strata
//!
//! Trie routing and scoped middleware for hyper services.
//!
//! ## The model
//!
//! Routes live in a segment trie, one tree per HTTP method. At every depth a
//! literal segment beats a `:param`, which beats a trailing `*`, and a failed
//! branch falls back to the next option.
//!
//! Middleware is scoped. A [`Cluster`] is a path prefix with its own
//! middleware list; nested groups inherit their ancestors' middleware and add
//! their own. The chain is composed once, when a route is registered, so
//! dispatch is a trie walk and one call.
//!
//! What's here:
//!
//! - Segment-trie routing with backtracking: [`Router`], [`trie`]
//! - Prefix scopes with inherited middleware: [`Cluster`], [`middleware`]
//! - One dispatch point that maps misses and failures to 404/405/500: [`Outcome`]
//! - A hyper server with graceful shutdown: [`Server`]
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use strata::{Cluster, Request, Response, Router, Server, StatusCode, middleware};
//!
//! #[tokio::main]
//! async fn main() {
//!     let api = Cluster::new("/api").wrap(middleware::logger());
//!     api.group("/users", |users| {
//!         users.get("/:id", get_user).post("/", create_user);
//!     });
//!
//!     let app = Router::new().mount(&api);
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":"{id}"}}"#))
//! }
//!
//! async fn create_user(req: Request) -> Response {
//!     if req.body().is_empty() {
//!         return Response::status(StatusCode::BAD_REQUEST);
//!     }
//!     Response::builder()
//!         .status(StatusCode::CREATED)
//!         .header("location", "/api/users/99")
//!         .json(r#"{"id":"99"}"#)
//! }
//! ```

mod cluster;
mod config;
mod dispatch;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;
pub mod path;
pub mod trie;

pub use cluster::Cluster;
pub use config::ServerConfig;
pub use dispatch::Outcome;
pub use error::{BoxError, DispatchError, Error, RouteError};
pub use handler::{boxed, BoxFuture, BoxedHandler, ErasedHandler, Handler, HandlerResult, IntoHandlerResult};
pub use http::{Method, StatusCode};
pub use middleware::{Middleware, Next};
pub use request::Request;
pub use response::{Envelope, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
