//! Prefix scopes with inherited middleware.
//!
//! A [`Cluster`] is a handle to one scope in a tree of scopes. Every scope
//! has a normalized path prefix and its own middleware list. A route
//! registered on a scope is wrapped in the middleware of every scope from the
//! root down to that one, root-most outermost, and stored in the trie the
//! whole tree shares.
//!
//! ```rust
//! use strata::{Cluster, Request, Router, middleware};
//!
//! async fn me(_req: Request) -> &'static str { "me" }
//! async fn ban(_req: Request) -> &'static str { "banned" }
//!
//! let api = Cluster::new("/api").wrap(middleware::logger());
//! api.group("/v1", |v1| {
//!     v1.get("/me", me);
//!     v1.group("/admin", |admin| {
//!         admin.post("/users/:id/ban", ban);
//!     });
//! });
//!
//! let router = Router::new().mount(&api);
//! assert_eq!(router.routes().len(), 2);
//! ```
//!
//! Scopes live in one arena owned by the tree. A child refers to its parent by
//! index, and only to walk upward when it composes a chain. Handles are `Rc`
//! based and therefore not `Send`: the tree is built on one thread, then
//! mounted into a [`Router`](crate::Router) that is.

use std::cell::RefCell;
use std::rc::Rc;

use http::Method;
use tracing::debug;

use crate::error::RouteError;
use crate::handler::Handler;
use crate::middleware::{compose, Middleware};
use crate::path;
use crate::trie::RouteTrie;

type ScopeId = usize;

struct Scope {
    prefix: String,
    middleware: Vec<Middleware>,
    parent: Option<ScopeId>,
}

struct Tree {
    scopes: Vec<Scope>,
    trie: RouteTrie,
}

impl Tree {
    /// Middleware of every scope from the root down to `id`, root first.
    fn chain(&self, id: ScopeId) -> Vec<Middleware> {
        let mut levels = Vec::new();
        let mut current = Some(id);
        while let Some(i) = current {
            let scope = &self.scopes[i];
            levels.push(&scope.middleware);
            current = scope.parent;
        }
        levels.into_iter().rev().flatten().cloned().collect()
    }
}

/// A handle to one scope of a scope tree.
///
/// Cloning the handle does not copy the scope.
#[derive(Clone)]
pub struct Cluster {
    tree: Rc<RefCell<Tree>>,
    id: ScopeId,
}

impl Cluster {
    /// Creates the root scope of a new tree, with an empty trie.
    pub fn new(prefix: &str) -> Self {
        Self::with_middleware(prefix, Vec::new())
    }

    /// Creates the root scope of a new tree with initial middleware.
    pub fn with_middleware(prefix: &str, middleware: impl IntoIterator<Item = Middleware>) -> Self {
        let root = Scope {
            prefix: path::normalize(prefix),
            middleware: middleware.into_iter().collect(),
            parent: None,
        };
        let tree = Tree { scopes: vec![root], trie: RouteTrie::new() };
        Self { tree: Rc::new(RefCell::new(tree)), id: 0 }
    }

    /// Appends `mw` to this scope. Affects routes registered afterwards, on
    /// this scope or any scope below it.
    pub fn wrap(self, mw: Middleware) -> Self {
        self.use_middleware(mw);
        self
    }

    /// Appends `mw` to this scope through a borrowed handle.
    pub fn use_middleware(&self, mw: Middleware) -> &Self {
        self.tree.borrow_mut().scopes[self.id].middleware.push(mw);
        self
    }

    /// Creates a child scope at `sub_prefix` below this one, lets `build`
    /// populate it, and returns it.
    ///
    /// The child starts with an empty middleware list of its own and
    /// inherits this scope's chain when it registers routes. Middleware added
    /// to the child never shows up in the parent or in a sibling.
    pub fn group(&self, sub_prefix: &str, build: impl FnOnce(&Cluster)) -> Cluster {
        let child = {
            let mut tree = self.tree.borrow_mut();
            let prefix = path::join(&tree.scopes[self.id].prefix, sub_prefix);
            tree.scopes.push(Scope { prefix, middleware: Vec::new(), parent: Some(self.id) });
            Cluster { tree: Rc::clone(&self.tree), id: tree.scopes.len() - 1 }
        };
        build(&child);
        child
    }

    /// This scope's absolute prefix.
    pub fn prefix(&self) -> String {
        self.tree.borrow().scopes[self.id].prefix.clone()
    }

    /// Names of the middleware a route registered here would be wrapped in,
    /// outermost first.
    pub fn effective_middleware(&self) -> Vec<String> {
        self.tree
            .borrow()
            .chain(self.id)
            .iter()
            .map(|mw| mw.name().to_owned())
            .collect()
    }

    /// Registers `handler` for `method` at this scope's prefix plus `path`.
    ///
    /// # Panics
    ///
    /// Panics if the route is rejected by the trie; see [`Cluster::try_route`].
    pub fn route(&self, method: &str, path: &str, handler: impl Handler) -> &Self {
        if let Err(e) = self.try_route(method, path, handler) {
            panic!("invalid route `{path}`: {e}");
        }
        self
    }

    /// Registers `handler`, reporting a rejected route instead of panicking.
    pub fn try_route(
        &self,
        method: &str,
        path: &str,
        handler: impl Handler,
    ) -> Result<(), RouteError> {
        let (full_path, chain) = {
            let tree = self.tree.borrow();
            (path::join(&tree.scopes[self.id].prefix, path), tree.chain(self.id))
        };

        let wrapped = compose(&chain, handler.into_boxed_handler());
        self.tree.borrow_mut().trie.insert(method, &full_path, wrapped)?;

        debug!(%method, path = %full_path, middleware = chain.len(), "route registered");
        Ok(())
    }

    pub fn get(&self, path: &str, handler: impl Handler) -> &Self {
        self.route(Method::GET.as_str(), path, handler)
    }

    pub fn post(&self, path: &str, handler: impl Handler) -> &Self {
        self.route(Method::POST.as_str(), path, handler)
    }

    pub fn put(&self, path: &str, handler: impl Handler) -> &Self {
        self.route(Method::PUT.as_str(), path, handler)
    }

    pub fn patch(&self, path: &str, handler: impl Handler) -> &Self {
        self.route(Method::PATCH.as_str(), path, handler)
    }

    pub fn delete(&self, path: &str, handler: impl Handler) -> &Self {
        self.route(Method::DELETE.as_str(), path, handler)
    }

    pub fn head(&self, path: &str, handler: impl Handler) -> &Self {
        self.route(Method::HEAD.as_str(), path, handler)
    }

    pub fn options(&self, path: &str, handler: impl Handler) -> &Self {
        self.route(Method::OPTIONS.as_str(), path, handler)
    }

    pub fn trace(&self, path: &str, handler: impl Handler) -> &Self {
        self.route(Method::TRACE.as_str(), path, handler)
    }

    /// `(method, path)` of every route in the whole tree.
    pub fn routes(&self) -> Vec<(String, String)> {
        self.tree
            .borrow()
            .trie
            .routes()
            .into_iter()
            .map(|(method, path, _)| (method, path))
            .collect()
    }

    /// Runs `f` against the tree's trie.
    pub(crate) fn with_trie<R>(&self, f: impl FnOnce(&RouteTrie) -> R) -> R {
        f(&self.tree.borrow().trie)
    }
}
