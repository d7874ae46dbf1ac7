use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use http::StatusCode;

use super::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// Counters are pruned once the table holds this many peers.
const PRUNE_THRESHOLD: usize = 4096;

/// Fixed-window request counter keyed by peer IP.
///
/// The counters belong to this value. Two limiters never share state, so
/// separate scopes can carry separate budgets.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    counters: Mutex<HashMap<Option<IpAddr>, Window>>,
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window, counters: Mutex::new(HashMap::new()) }
    }

    /// Counts one request from `peer` at `now`. Returns `false` once the
    /// peer has exceeded the limit for the current window.
    ///
    /// Requests with no known peer share one counter.
    pub fn check(&self, peer: Option<IpAddr>, now: Instant) -> bool {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);

        if counters.len() >= PRUNE_THRESHOLD {
            counters.retain(|_, w| now.duration_since(w.started) < self.window);
        }

        let window = counters.entry(peer).or_insert(Window { started: now, count: 0 });
        if now.duration_since(window.started) >= self.window {
            window.started = now;
            window.count = 0;
        }
        window.count = window.count.saturating_add(1);
        window.count <= self.limit
    }

    /// Wraps this limiter as a middleware. Over-limit requests get a `429`
    /// envelope and never reach the handler.
    pub fn into_middleware(self: Arc<Self>) -> Middleware {
        Middleware::from_fn("rate_limit", move |req: Request, next: Next| {
            let limiter = Arc::clone(&self);
            async move {
                let peer = req.remote_addr().map(|addr| addr.ip());
                if !limiter.check(peer, Instant::now()) {
                    tracing::debug!(?peer, path = req.path(), "rate limit exceeded");
                    return Ok(Response::envelope(
                        StatusCode::TOO_MANY_REQUESTS,
                        "Too Many Requests",
                    ));
                }
                next.run(req).await
            }
        })
    }
}

/// At most `limit` requests per peer in each `window`.
pub fn rate_limit(limit: u32, window: Duration) -> Middleware {
    Arc::new(RateLimiter::new(limit, window)).into_middleware()
}
