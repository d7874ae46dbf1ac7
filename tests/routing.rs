//! End-to-end routing behavior through `Router::dispatch`, no sockets.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use strata::{
    middleware, BoxError, Cluster, DispatchError, Middleware, Next, Outcome, Request, Response,
    Router, StatusCode,
};

type Probe = Arc<Mutex<Vec<String>>>;

fn probe(name: &'static str, log: &Probe) -> Middleware {
    let log = Arc::clone(log);
    Middleware::from_fn(name, move |req: Request, next: Next| {
        let log = Arc::clone(&log);
        async move {
            log.lock().unwrap().push(format!("{name}-before"));
            let res = next.run(req).await;
            log.lock().unwrap().push(format!("{name}-after"));
            res
        }
    })
}

fn tagged(tag: &'static str) -> impl Fn(Request) -> std::future::Ready<&'static str> + Send + Sync + 'static {
    move |_req| std::future::ready(tag)
}

async fn body(router: &Router, method: &str, path: &str) -> String {
    match router.dispatch(Request::new(method, path)).await {
        Outcome::Matched(res) => String::from_utf8(res.body().to_vec()).unwrap(),
        other => panic!("{method} {path}: expected a match, got {other:?}"),
    }
}

async fn params(req: Request) -> String {
    let mut pairs: Vec<_> = req.params().iter().map(|(k, v)| format!("{k}={v}")).collect();
    pairs.sort();
    pairs.join("&")
}

#[tokio::test]
async fn literal_routes_match_exactly() {
    let router = Router::new()
        .get("/", tagged("root"))
        .get("/health", tagged("health"))
        .get("/health/deep", tagged("deep"));

    assert_eq!(body(&router, "GET", "/").await, "root");
    assert_eq!(body(&router, "GET", "/health").await, "health");
    assert_eq!(body(&router, "GET", "/health/").await, "health");
    assert_eq!(body(&router, "GET", "/health/deep").await, "deep");
    assert!(matches!(
        router.dispatch(Request::new("GET", "/Health")).await,
        Outcome::NotFound
    ));
}

#[tokio::test]
async fn params_and_wildcard_are_extracted() {
    let router = Router::new()
        .get("/users/:id", params)
        .get("/orgs/:org/repos/:repo", params)
        .get("/files/*", params);

    assert_eq!(body(&router, "GET", "/users/42").await, "id=42");
    assert_eq!(body(&router, "GET", "/orgs/acme/repos/web").await, "org=acme&repo=web");
    assert_eq!(body(&router, "GET", "/files/a/b/c").await, "wildcard=a/b/c");
}

#[tokio::test]
async fn static_beats_param_beats_wildcard() {
    let router = Router::new()
        .get("/users/:id", tagged("param"))
        .get("/users/active", tagged("static"))
        .get("/users/*", tagged("wildcard"));

    assert_eq!(body(&router, "GET", "/users/active").await, "static");
    assert_eq!(body(&router, "GET", "/users/17").await, "param");
    assert_eq!(body(&router, "GET", "/users/17/posts").await, "wildcard");
}

#[tokio::test]
async fn method_and_path_misses_are_distinct() {
    let router = Router::new().get("/a", tagged("a"));

    let outcome = router.dispatch(Request::new("PUT", "/a")).await;
    assert!(matches!(outcome, Outcome::MethodNotAllowed));
    assert_eq!(outcome.status(), StatusCode::METHOD_NOT_ALLOWED);

    let outcome = router.dispatch(Request::new("GET", "/b")).await;
    assert!(matches!(outcome, Outcome::NotFound));
    assert_eq!(outcome.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn nested_group_middleware_wraps_in_order() {
    let log = Probe::default();
    let root = Cluster::new("/").wrap(probe("A", &log));
    let inner = Arc::clone(&log);
    root.group("/g", |g| {
        g.use_middleware(probe("B", &log));
        g.get("/h", move |_req: Request| {
            let log = Arc::clone(&inner);
            async move {
                log.lock().unwrap().push("H".to_owned());
                "h"
            }
        });
    });

    let router = Router::new().mount(&root);
    assert_eq!(body(&router, "GET", "/g/h").await, "h");
    assert_eq!(
        *log.lock().unwrap(),
        ["A-before", "B-before", "H", "B-after", "A-after"]
    );
}

#[tokio::test]
async fn sibling_groups_do_not_share_middleware() {
    let log = Probe::default();
    let root = Cluster::new("/api").wrap(probe("root", &log));
    let admin = root.group("/admin", |admin| {
        admin.use_middleware(probe("admin", &log));
        admin.get("/stats", tagged("stats"));
    });
    let public = root.group("/public", |public| {
        public.get("/info", tagged("info"));
    });

    assert_eq!(root.effective_middleware(), ["root"]);
    assert_eq!(admin.effective_middleware(), ["root", "admin"]);
    assert_eq!(public.effective_middleware(), ["root"]);

    let router = Router::new().mount(&root);
    body(&router, "GET", "/api/public/info").await;
    assert_eq!(*log.lock().unwrap(), ["root-before", "root-after"]);
}

#[tokio::test]
async fn re_registration_replaces_the_handler() {
    let router = Router::new()
        .get("/a", tagged("first"))
        .get("/a", tagged("second"));
    assert_eq!(body(&router, "GET", "/a").await, "second");

    let c = Cluster::new("/c");
    c.get("/x", tagged("one")).get("/x", tagged("two"));
    let router = Router::new().mount(&c);
    assert_eq!(body(&router, "GET", "/c/x").await, "two");
}

#[tokio::test]
async fn mount_preserves_paths_and_chains() {
    let log = Probe::default();
    let auth = Cluster::with_middleware("/auth", [probe("auth", &log)]);
    auth.group("/admin", |admin| {
        admin.get("/info", tagged("admin-info"));
        admin.get("/users/:id", params);
    });
    let main = Cluster::new("/");
    main.group("/public", |public| {
        public.get("/info", tagged("public-info"));
    });

    let router = Router::new().mount(&main).mount(&auth);

    let mut expected = auth.routes();
    expected.extend(main.routes());
    expected.sort();
    assert_eq!(router.routes(), expected);

    assert_eq!(body(&router, "GET", "/public/info").await, "public-info");
    assert!(log.lock().unwrap().is_empty());

    assert_eq!(body(&router, "GET", "/auth/admin/info").await, "admin-info");
    assert_eq!(body(&router, "GET", "/auth/admin/users/9").await, "id=9");
    assert_eq!(log.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn failures_and_panics_become_internal_errors() {
    async fn fails(_req: Request) -> Result<Response, BoxError> {
        Err("no such table".into())
    }
    async fn panics(_req: Request) -> &'static str {
        panic!("index out of range")
    }

    let router = Router::new().get("/fails", fails).get("/panics", panics);

    match router.dispatch(Request::new("GET", "/fails")).await {
        Outcome::InternalError(DispatchError::HandlerFailure(e)) => {
            assert_eq!(e.to_string(), "no such table")
        }
        other => panic!("unexpected {other:?}"),
    }
    match router.dispatch(Request::new("GET", "/panics")).await {
        Outcome::InternalError(DispatchError::HandlerFault(msg)) => {
            assert_eq!(msg, "index out of range")
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn short_circuiting_middleware_is_a_match() {
    let guarded = Cluster::new("/private").wrap(Middleware::from_fn(
        "deny",
        |req: Request, next: Next| async move {
            if req.header("authorization").is_none() {
                return Ok(Response::envelope(StatusCode::UNAUTHORIZED, "Unauthorized"));
            }
            next.run(req).await
        },
    ));
    guarded.get("/data", tagged("secret"));
    let router = Router::new().mount(&guarded);

    let denied = router.dispatch(Request::new("GET", "/private/data")).await;
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
    assert!(denied.is_matched());

    let allowed = Request::new("GET", "/private/data").with_header("Authorization", "token");
    let Outcome::Matched(res) = router.dispatch(allowed).await else {
        panic!("expected a match");
    };
    assert_eq!(res.body(), b"secret");
}

#[tokio::test]
async fn rate_limit_scope_rejects_excess_requests() {
    let api = Cluster::new("/api").wrap(middleware::rate_limit(2, Duration::from_secs(60)));
    api.get("/ping", tagged("pong"));
    let router = Router::new().mount(&api);

    let peer = "192.0.2.1:4000".parse().unwrap();
    let statuses: Vec<_> = statuses_for(&router, peer, 3).await;
    assert_eq!(statuses, [StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]);
}

async fn statuses_for(router: &Router, peer: std::net::SocketAddr, n: usize) -> Vec<StatusCode> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let req = Request::new("GET", "/api/ping").with_remote_addr(peer);
        out.push(router.dispatch(req).await.status());
    }
    out
}

#[test]
fn router_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Router>();
}
