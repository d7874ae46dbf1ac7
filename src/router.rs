//! The serving router.
//!
//! One segment trie per HTTP method. Routes come in two ways: registered
//! directly with [`Router::on`] and friends (no middleware), or built in a
//! [`Cluster`] tree and mounted, with their middleware already composed.
//! Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).

use http::Method;
use tracing::debug;

use crate::cluster::Cluster;
use crate::error::{DispatchError, RouteError};
use crate::handler::Handler;
use crate::trie::{Matched, RouteTrie};

/// The application router.
///
/// Every registration method returns `self` so calls chain naturally.
/// Immutable once built, and `Send + Sync`: the server shares one instance
/// across every connection.
#[derive(Default)]
pub struct Router {
    trie: RouteTrie,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `:name` syntax and a final `*` captures the rest
    /// of the path; `req.param(…)` retrieves both:
    ///
    /// ```rust
    /// # use strata::{Method, Request, Response, Router};
    /// # async fn get_user(_: Request) -> Response { Response::text("") }
    /// # async fn create_user(_: Request) -> Response { Response::text("") }
    /// # async fn asset(_: Request) -> Response { Response::text("") }
    /// Router::new()
    ///     .on(Method::GET,  "/users/:id", get_user)
    ///     .on(Method::POST, "/users",     create_user)
    ///     .on(Method::GET,  "/assets/*",  asset);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if the route is rejected by the trie (`:` with no name, `*`
    /// before the last segment, a parameter renamed at an existing position).
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.route(method.as_str(), path, handler)
    }

    /// Like [`Router::on`] with a method given as a string. The method is
    /// upper-cased, so `"get"` and `"GET"` are the same route.
    pub fn route(mut self, method: &str, path: &str, handler: impl Handler) -> Self {
        self.trie
            .insert(method, path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PATCH, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    pub fn head(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::HEAD, path, handler)
    }

    pub fn options(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::OPTIONS, path, handler)
    }

    pub fn trace(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::TRACE, path, handler)
    }

    /// Builds a scope tree rooted at `prefix` and mounts it.
    ///
    /// ```rust
    /// # use strata::{Request, Router};
    /// # async fn info(_: Request) -> &'static str { "" }
    /// let router = Router::new().cluster("/public", |public| {
    ///     public.get("/info", info);
    /// });
    /// assert_eq!(router.routes(), [("GET".to_owned(), "/public/info".to_owned())]);
    /// ```
    pub fn cluster(self, prefix: &str, build: impl FnOnce(&Cluster)) -> Self {
        let cluster = Cluster::new(prefix);
        build(&cluster);
        self.mount(&cluster)
    }

    /// Copies every route of `cluster`'s tree into this router at the same
    /// absolute path, keeping the middleware each handler was wrapped in.
    ///
    /// # Panics
    ///
    /// Panics if a mounted route renames a parameter this router already has
    /// at the same position; see [`Router::try_mount`].
    pub fn mount(self, cluster: &Cluster) -> Self {
        self.try_mount(cluster)
            .unwrap_or_else(|e| panic!("cannot mount `{}`: {e}", cluster.prefix()))
    }

    /// Mounts `cluster`, reporting a conflicting route instead of panicking.
    pub fn try_mount(mut self, cluster: &Cluster) -> Result<Self, RouteError> {
        let count = cluster.with_trie(|trie| self.trie.merge(trie))?;
        debug!(prefix = %cluster.prefix(), routes = count, "cluster mounted");
        Ok(self)
    }

    /// `(method, path)` of every registered route, sorted.
    pub fn routes(&self) -> Vec<(String, String)> {
        self.trie
            .routes()
            .into_iter()
            .map(|(method, path, _)| (method, path))
            .collect()
    }

    pub(crate) fn lookup(&self, method: &str, path: &str) -> Result<Matched, DispatchError> {
        self.trie.lookup(method, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;

    async fn ok(_req: Request) -> &'static str {
        "ok"
    }

    #[test]
    fn verbs_register_under_their_method() {
        let router = Router::new()
            .get("/r", ok)
            .post("/r", ok)
            .put("/r", ok)
            .patch("/r", ok)
            .delete("/r", ok)
            .head("/r", ok)
            .options("/r", ok)
            .trace("/r", ok)
            .route("purge", "/r", ok);

        let methods: Vec<_> = router.routes().into_iter().map(|(m, _)| m).collect();
        assert_eq!(
            methods,
            ["DELETE", "GET", "HEAD", "OPTIONS", "PATCH", "POST", "PURGE", "PUT", "TRACE"]
        );
    }

    #[test]
    fn mount_keeps_absolute_paths() {
        let auth = Cluster::new("/auth");
        auth.group("/admin", |admin| {
            admin.get("/info", ok);
        });
        let router = Router::new().get("/", ok).mount(&auth);

        assert_eq!(
            router.routes(),
            [
                ("GET".to_owned(), "/".to_owned()),
                ("GET".to_owned(), "/auth/admin/info".to_owned()),
            ]
        );
        assert!(router.lookup("GET", "/auth/admin/info").is_ok());
    }

    #[test]
    fn conflicting_mount_is_reported() {
        let other = Cluster::new("/");
        other.get("/users/:name", ok);

        let result = Router::new().get("/users/:id", ok).try_mount(&other);
        assert!(matches!(result, Err(RouteError::ParamConflict { .. })));
    }

    #[test]
    #[should_panic(expected = "invalid route `/a/*/b`")]
    fn invalid_route_panics() {
        let _ = Router::new().get("/a/*/b", ok);
    }
}
