//! HTTP server and graceful shutdown.
//!
//! The server is transport glue: it turns each hyper request into a
//! [`Request`], hands it to [`Router::dispatch`], and writes back whatever
//! [`Outcome`](crate::Outcome) comes out.
//!
//! # Graceful shutdown
//!
//! On SIGTERM or Ctrl-C the server:
//! 1. Immediately stops `listener.accept()`, so no new connections are made.
//! 2. Lets in-flight connection tasks run for up to
//!    [`ServerConfig::shutdown_grace`].
//! 3. Aborts whatever is still running and returns from [`Server::serve`].

use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::Error;
use crate::path;
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::router::Router;

/// The HTTP server.
pub struct Server {
    addr: String,
    config: ServerConfig,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called. The address is parsed then.
    ///
    /// ```rust,no_run
    /// use strata::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: &str) -> Self {
        Self { addr: addr.to_owned(), config: ServerConfig::default() }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns after SIGTERM or Ctrl-C, once in-flight requests have
    /// finished or the grace period has run out.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve), but stops when `signal` resolves.
    pub async fn serve_with_shutdown(
        self,
        router: Router,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let addr: SocketAddr = self.addr.parse().map_err(|source| Error::InvalidAddr {
            addr: self.addr.clone(),
            source,
        })?;
        let listener = TcpListener::bind(addr).await?;
        run(listener, router, self.config, signal).await
    }
}

async fn run(
    listener: TcpListener,
    router: Router,
    config: ServerConfig,
    signal: impl Future<Output = ()>,
) -> Result<(), Error> {
    let addr = listener.local_addr()?;
    // Every connection task reads the same routing table. The Arc shares it
    // instead of copying it per connection.
    let router = Arc::new(router);
    let max_body = config.max_body_size;

    // `auto::Builder` speaks HTTP/1.1 and HTTP/2, whichever the client
    // negotiates. The timer is what lets hyper enforce the header timeout.
    let mut builder = ConnBuilder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .keep_alive(config.keep_alive)
        .header_read_timeout(config.header_read_timeout);
    let builder = Arc::new(builder);

    info!(%addr, routes = router.routes().len(), "strata listening");

    // JoinSet owns every connection task, so shutdown can wait on them and
    // abort the stragglers.
    let mut tasks = JoinSet::new();

    // The signal is polled again on every loop turn, so it must stay put in
    // memory between polls. `tokio::pin!` pins it on the stack.
    tokio::pin!(signal);

    loop {
        tokio::select! {
            // `biased` polls the arms top to bottom instead of at random.
            // Shutdown comes first, so a signal stops accepting even while
            // connections are still queued.
            biased;

            () = &mut signal => {
                info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                break;
            }

            res = listener.accept() => {
                let (stream, remote_addr) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };

                let router = Arc::clone(&router);
                let builder = Arc::clone(&builder);
                // TokioIo adapts tokio's AsyncRead/AsyncWrite to hyper's IO traits.
                let io = TokioIo::new(stream);

                tasks.spawn(async move {
                    // `service_fn` turns the closure into a hyper `Service`.
                    // It runs once per request on the connection, not once
                    // per connection.
                    let svc = service_fn(move |req| {
                        let router = Arc::clone(&router);
                        async move { handle(router, req, remote_addr, max_body).await }
                    });

                    if let Err(e) = builder.serve_connection(io, svc).await {
                        debug!(peer = %remote_addr, "connection error: {e}");
                    }
                });
            }

            // Reap finished connection tasks so the set stays small.
            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    // Drain: in-flight connections get the grace period to finish. Whatever
    // is still running after that is aborted, which closes its socket.
    let drain = async { while tasks.join_next().await.is_some() {} };
    if tokio::time::timeout(config.shutdown_grace, drain).await.is_err() {
        warn!(remaining = tasks.len(), "shutdown grace elapsed, aborting connections");
        tasks.abort_all();
    }

    info!("strata stopped");
    Ok(())
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Routes one hyper request and produces one hyper response.
///
/// Infallible: every failure is already an HTTP response by the time it
/// gets here.
async fn handle(
    router: Arc<Router>,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
    max_body: usize,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();

    let body = match Limited::new(body, max_body).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            return Ok(Response::envelope(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large")
                .into_inner());
        }
        Err(e) => {
            debug!(peer = %remote_addr, "body read error: {e}");
            return Ok(Response::envelope(StatusCode::BAD_REQUEST, "Bad Request").into_inner());
        }
    };

    let headers = parts
        .headers
        .iter()
        // Header values are not required to be UTF-8. Lossy conversion keeps
        // the request instead of failing it.
        .map(|(name, value)| {
            (name.as_str().to_owned(), String::from_utf8_lossy(value.as_bytes()).into_owned())
        })
        .collect();

    let request = Request {
        method: parts.method.as_str().to_owned(),
        path: path::decode(parts.uri.path()).into_owned(),
        headers,
        body,
        params: HashMap::new(),
        remote_addr: Some(remote_addr),
    };

    Ok(router.dispatch(request).await.into_response().into_inner())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT** (Ctrl-C).
/// On Windows only Ctrl-C is available. A signal that cannot be installed is
/// logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("cannot install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("cannot install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    // On other platforms the SIGTERM arm never resolves.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::{oneshot, Notify};

    use super::*;
    use crate::cluster::Cluster;
    use crate::middleware;

    async fn echo(req: Request) -> String {
        format!("{}:{}", req.param("id").unwrap_or("-"), req.body().len())
    }

    async fn roundtrip(addr: SocketAddr, raw: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn serves_dispatch_outcomes_over_tcp() {
        let api = Cluster::new("/api").wrap(middleware::logger());
        api.post("/items/:id", echo);
        let router = Router::new().mount(&api);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let config = ServerConfig::default().with_max_body_size(8);
        let server = tokio::spawn(run(listener, router, config, async {
            let _ = stop_rx.await;
        }));

        let ok = roundtrip(
            addr,
            "POST /api/items/7 HTTP/1.1\r\nhost: t\r\nconnection: close\r\ncontent-length: 3\r\n\r\nabc",
        )
        .await;
        assert!(ok.starts_with("HTTP/1.1 200 OK"), "{ok}");
        assert!(ok.ends_with("7:3"), "{ok}");

        let missing = roundtrip(addr, "POST /api/nothing HTTP/1.1\r\nhost: t\r\nconnection: close\r\n\r\n").await;
        assert!(missing.starts_with("HTTP/1.1 404"), "{missing}");
        assert!(missing.ends_with(r#"{"status":404,"message":"Not Found"}"#), "{missing}");

        let wrong = roundtrip(addr, "GET /api/items/7 HTTP/1.1\r\nhost: t\r\nconnection: close\r\n\r\n").await;
        assert!(wrong.starts_with("HTTP/1.1 405"), "{wrong}");

        let encoded = roundtrip(
            addr,
            "POST /api/items/a%20b HTTP/1.1\r\nhost: t\r\nconnection: close\r\ncontent-length: 0\r\n\r\n",
        )
        .await;
        assert!(encoded.ends_with("a b:0"), "{encoded}");

        let big = roundtrip(
            addr,
            "POST /api/items/7 HTTP/1.1\r\nhost: t\r\nconnection: close\r\ncontent-length: 16\r\n\r\n0123456789abcdef",
        )
        .await;
        assert!(big.starts_with("HTTP/1.1 413"), "{big}");

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn shutdown_aborts_connections_after_grace() {
        let entered = Arc::new(Notify::new());
        let signal_entry = Arc::clone(&entered);
        let router = Router::new().get("/slow", move |_req: Request| {
            let signal_entry = Arc::clone(&signal_entry);
            async move {
                signal_entry.notify_one();
                tokio::time::sleep(Duration::from_secs(30)).await;
                "too late"
            }
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let config = ServerConfig::default().with_shutdown_grace(Duration::from_millis(100));
        let server = tokio::spawn(run(listener, router, config, async {
            let _ = stop_rx.await;
        }));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"GET /slow HTTP/1.1\r\nhost: t\r\n\r\n").await.unwrap();
        entered.notified().await;

        let stopping = Instant::now();
        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server kept running past the grace period")
            .unwrap()
            .unwrap();
        assert!(stopping.elapsed() < Duration::from_secs(2), "{:?}", stopping.elapsed());

        // The aborted connection closes without a response.
        let mut out = Vec::new();
        let read = client.read_to_end(&mut out).await.unwrap_or(0);
        assert_eq!(read, 0, "{}", String::from_utf8_lossy(&out));
    }

    #[tokio::test]
    async fn bad_address_is_an_error() {
        let err = Server::bind("not an address")
            .serve_with_shutdown(Router::new(), async {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAddr { .. }));
    }
}
