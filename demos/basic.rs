//! Scoped groups with inherited middleware, mounted into one router.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/public/info
//!   curl http://localhost:3000/api/v1/users/42
//!   curl -X POST http://localhost:3000/api/v1/users -d '{"name":"alice"}'
//!   curl http://localhost:3000/api/v1/files/a/b/c.txt
//!   curl -X DELETE http://localhost:3000/public/info      → 405
//!   curl http://localhost:3000/nowhere                    → 404

use std::time::Duration;

use strata::{
    BoxError, Cluster, Envelope, Request, Response, Router, Server, ServerConfig, StatusCode,
    middleware,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let public = Cluster::new("/public");
    public.get("/info", info);

    // Every route under /api is logged; /api/v1 is also rate limited.
    let api = Cluster::new("/api").wrap(middleware::logger());
    api.group("/v1", |v1| {
        v1.use_middleware(middleware::rate_limit(100, Duration::from_secs(60)));
        v1.group("/users", |users| {
            users
                .get("/:id", get_user)
                .post("/", create_user)
                .delete("/:id", delete_user);
        });
        v1.get("/files/*", file);
    });

    let app = Router::new().mount(&public).mount(&api);
    for (method, path) in app.routes() {
        tracing::info!(%method, %path, "route");
    }

    let config = ServerConfig::default().with_shutdown_grace(Duration::from_secs(5));
    Server::bind("0.0.0.0:3000")
        .config(config)
        .serve(app)
        .await
        .expect("server error");
}

// GET /public/info
async fn info(_req: Request) -> Envelope<&'static str> {
    Envelope::new(StatusCode::ACCEPTED, "info").data("strata demo")
}

// GET /api/v1/users/:id
async fn get_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#))
}

// POST /api/v1/users
//
// An empty body is a handler failure: the dispatcher answers 500 with the
// error message in the envelope.
async fn create_user(req: Request) -> Result<Response, BoxError> {
    if req.body().is_empty() {
        return Err("empty body".into());
    }
    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .header("location", "/api/v1/users/99")
        .json(r#"{"id":"99","name":"new_user"}"#))
}

// DELETE /api/v1/users/:id → 204 No Content
async fn delete_user(_req: Request) -> StatusCode {
    StatusCode::NO_CONTENT
}

// GET /api/v1/files/*
async fn file(req: Request) -> String {
    format!("file: {}", req.param("wildcard").unwrap_or(""))
}
