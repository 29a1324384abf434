//! # cab-api — HTTP Broker for Content-Addressed Artifacts
//!
//! Clients submit jobs, poll them, then fetch the result through the
//! track index. Job execution happens on the [`cab_queue::JobQueue`]
//! worker pool; handlers never wait for a runner.
//!
//! ## API Surface
//!
//! | Route                                       | Module                  |
//! |---------------------------------------------|-------------------------|
//! | `POST /echo/jobs`                           | [`routes::jobs`]        |
//! | `GET /echo/jobs/{job_id}`                   | [`routes::jobs`]        |
//! | `GET /echo/index/{track_id}.json`           | [`routes::index`]       |
//! | `GET /echo/{config_hash}/{source_hash}/{f}` | [`routes::artifacts`]   |
//! | `GET /health/liveness`, `/health/readiness` | this module             |
//!
//! ## Errors
//!
//! Every failure is `{"error": {"code", "message"}}`, see [`error::AppError`].

pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assemble the full application router.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::jobs::router())
        .merge(routes::index::router())
        .merge(routes::artifacts::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let health = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    Router::new().merge(health).merge(api)
}

/// Liveness probe — always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe — the queue is started before the router exists.
async fn readiness() -> &'static str {
    "ready"
}
