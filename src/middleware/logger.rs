use std::time::Instant;

use tracing::{info, warn};

use super::{Middleware, Next};
use crate::request::Request;

/// Logs one event per request once the rest of the chain has answered.
///
/// Server errors (5xx responses and handler failures) log at `warn`,
/// everything else at `info`.
///
/// Place it first in a scope so the latency covers every inner middleware.
pub fn logger() -> Middleware {
    Middleware::from_fn("logger", |req: Request, next: Next| async move {
        let start = Instant::now();
        let method = req.method().to_owned();
        let path = req.path().to_owned();
        let peer = req.remote_addr();

        let result = next.run(req).await;
        let latency = start.elapsed();

        match &result {
            Ok(res) if res.status_code().is_server_error() => warn!(
                %method, %path, ?peer, ?latency,
                status = res.status_code().as_u16(),
                "request"
            ),
            Ok(res) => info!(
                %method, %path, ?peer, ?latency,
                status = res.status_code().as_u16(),
                "request"
            ),
            Err(e) => warn!(%method, %path, ?peer, ?latency, error = %e, "request failed"),
        }
        result
    })
}
