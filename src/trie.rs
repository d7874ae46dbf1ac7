//! Segment trie, one tree per HTTP method.
//!
//! Each node matches one path segment. A node has literal children keyed by
//! their text, at most one `:param` child and at most one `*` child.
//! Matching tries them in that order at every depth and backtracks when a
//! branch runs dry, so `/users/active` beats `/users/:id` beats `/users/*`.
//!
//! The tree is append-only. After the build phase it is only read, which is
//! why lookups take `&self` and need no lock.

use std::borrow::Cow;
use std::collections::HashMap;

use crate::error::{DispatchError, RouteError};
use crate::handler::BoxedHandler;
use crate::path;

/// Parameter name under which a trailing `*` stores the rest of the path.
pub const WILDCARD_PARAM: &str = "wildcard";

const PARAM_MARKER: char = ':';
const WILDCARD_SEGMENT: &str = "*";

/// One trie node.
#[derive(Clone, Default)]
pub struct RouteNode {
    segment: String,
    handler: Option<BoxedHandler>,
    static_children: HashMap<String, RouteNode>,
    param_child: Option<Box<RouteNode>>,
    wildcard_child: Option<Box<RouteNode>>,
}

impl RouteNode {
    fn with_segment(segment: &str) -> Self {
        Self { segment: segment.to_owned(), ..Self::default() }
    }

    /// Name bound by a param node (`id` for `:id`).
    fn param_name(&self) -> &str {
        self.segment.strip_prefix(PARAM_MARKER).unwrap_or(&self.segment)
    }
}

/// A successful lookup.
pub struct Matched {
    pub handler: BoxedHandler,
    pub params: HashMap<String, String>,
}

/// Method name → root node.
#[derive(Clone, Default)]
pub struct RouteTrie {
    methods: HashMap<String, RouteNode>,
}

impl RouteTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `handler` under `method` and `path`.
    ///
    /// Registering the same method and path again replaces the handler.
    /// Nothing is written when an error is returned.
    pub fn insert(
        &mut self,
        method: &str,
        path: &str,
        handler: BoxedHandler,
    ) -> Result<(), RouteError> {
        let method = canonical(method);
        let segments = path::segments(path);
        self.check(&method, &segments)?;

        let mut node = self.methods.entry(method.into_owned()).or_default();
        for segment in segments {
            node = if segment.starts_with(PARAM_MARKER) {
                node.param_child
                    .get_or_insert_with(|| Box::new(RouteNode::with_segment(segment)))
                    .as_mut()
            } else if segment == WILDCARD_SEGMENT {
                node.wildcard_child
                    .get_or_insert_with(|| Box::new(RouteNode::with_segment(segment)))
                    .as_mut()
            } else {
                node.static_children
                    .entry(segment.to_owned())
                    .or_insert_with(|| RouteNode::with_segment(segment))
            };
        }
        node.handler = Some(handler);
        Ok(())
    }

    /// Rejects malformed segments and a parameter renamed at an existing
    /// position, before anything is created.
    fn check(&self, method: &str, segments: &[&str]) -> Result<(), RouteError> {
        for (i, segment) in segments.iter().enumerate() {
            if *segment == WILDCARD_SEGMENT && i + 1 != segments.len() {
                return Err(RouteError::WildcardNotLast);
            }
            if *segment == ":" {
                return Err(RouteError::EmptyParamName);
            }
        }

        let mut node = self.methods.get(method);
        for segment in segments {
            let Some(current) = node else { break };
            node = if segment.starts_with(PARAM_MARKER) {
                if let Some(param) = &current.param_child {
                    if param.segment != *segment {
                        return Err(RouteError::ParamConflict {
                            existing: param.param_name().to_owned(),
                            requested: segment[1..].to_owned(),
                        });
                    }
                }
                current.param_child.as_deref()
            } else if *segment == WILDCARD_SEGMENT {
                current.wildcard_child.as_deref()
            } else {
                current.static_children.get(*segment)
            };
        }
        Ok(())
    }

    /// Resolves `method` and `path` to a handler and its parameters.
    pub fn lookup(&self, method: &str, path: &str) -> Result<Matched, DispatchError> {
        let root = self
            .methods
            .get(canonical(method).as_ref())
            .ok_or(DispatchError::MethodNotAllowed)?;

        let segments = path::segments(path);
        let mut params = Vec::new();
        let handler = find(root, &segments, &mut params).ok_or(DispatchError::RouteNotFound)?;

        Ok(Matched {
            handler: handler.clone(),
            params: params.into_iter().collect(),
        })
    }

    /// Whether any route was ever registered for `method`.
    pub fn has_method(&self, method: &str) -> bool {
        self.methods.contains_key(canonical(method).as_ref())
    }

    /// Every registered route as `(method, path, handler)`, sorted by method
    /// then path. Paths are rebuilt in registration syntax (`/users/:id`).
    pub fn routes(&self) -> Vec<(String, String, BoxedHandler)> {
        let mut out = Vec::new();
        for (method, root) in &self.methods {
            collect(method, root, &mut Vec::new(), &mut out);
        }
        out.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
        out
    }

    pub fn len(&self) -> usize {
        self.routes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Copies every route of `other` into `self` under the same method and
    /// path. Handlers are shared, not rebuilt, so whatever middleware they
    /// were wrapped in stays as it was. Returns the number of routes copied.
    ///
    /// The routes go into a copy of `self` first, so a conflict anywhere in
    /// `other` leaves `self` untouched.
    pub fn merge(&mut self, other: &RouteTrie) -> Result<usize, RouteError> {
        let routes = other.routes();
        let mut staged = self.clone();
        for (method, path, handler) in &routes {
            staged.insert(method, path, handler.clone())?;
        }
        *self = staged;
        Ok(routes.len())
    }
}

/// Static, then param, then wildcard. A failed branch drops the params it
/// bound before the next one is tried.
fn find<'n>(
    node: &'n RouteNode,
    segments: &[&str],
    params: &mut Vec<(String, String)>,
) -> Option<&'n BoxedHandler> {
    let Some((first, rest)) = segments.split_first() else {
        return node.handler.as_ref();
    };

    if let Some(child) = node.static_children.get(*first) {
        if let Some(handler) = find(child, rest, params) {
            return Some(handler);
        }
    }

    if let Some(child) = &node.param_child {
        let mark = params.len();
        params.push((child.param_name().to_owned(), (*first).to_owned()));
        if let Some(handler) = find(child, rest, params) {
            return Some(handler);
        }
        params.truncate(mark);
    }

    // A wildcard ends the match: its own handler or nothing.
    let handler = node.wildcard_child.as_ref()?.handler.as_ref()?;
    params.push((WILDCARD_PARAM.to_owned(), segments.join("/")));
    Some(handler)
}

fn collect<'n>(
    method: &str,
    node: &'n RouteNode,
    prefix: &mut Vec<&'n str>,
    out: &mut Vec<(String, String, BoxedHandler)>,
) {
    if let Some(handler) = &node.handler {
        out.push((method.to_owned(), format!("/{}", prefix.join("/")), handler.clone()));
    }
    let children = node
        .static_children
        .values()
        .chain(node.param_child.as_deref())
        .chain(node.wildcard_child.as_deref());
    for child in children {
        prefix.push(&child.segment);
        collect(method, child, prefix, out);
        prefix.pop();
    }
}

fn canonical(method: &str) -> Cow<'_, str> {
    if method.bytes().any(|b| b.is_ascii_lowercase()) {
        Cow::Owned(method.to_ascii_uppercase())
    } else {
        Cow::Borrowed(method)
    }
}
