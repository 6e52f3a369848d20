use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::infrastructure::observability::request_id_middleware;
use crate::presentation::handlers::{
    backlog_handler, complete_review_handler, create_job_handler, delete_job_handler,
    get_job_handler, health_handler, job_artifacts_handler, job_events_handler,
    start_job_handler, upload_handler,
};
use crate::presentation::state::AppState;

/// Cap on a single upload body.
const MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024 * 1024;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/streams/backlog", get(backlog_handler))
        .route(
            "/api/v1/uploads",
            post(upload_handler).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/v1/jobs", post(create_job_handler))
        .route(
            "/api/v1/jobs/{job_id}",
            get(get_job_handler).delete(delete_job_handler),
        )
        .route("/api/v1/jobs/{job_id}/start", post(start_job_handler))
        .route("/api/v1/jobs/{job_id}/events", get(job_events_handler))
        .route("/api/v1/jobs/{job_id}/artifacts", get(job_artifacts_handler))
        .route("/api/v1/jobs/{job_id}/review", post(complete_review_handler))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}
