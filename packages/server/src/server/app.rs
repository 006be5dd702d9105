//! Application setup: shared state and the axum router.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, Method},
    routing::{get, patch, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::kernel::ServerDeps;
use crate::server::routes::{calendars, health_handler, jobs, scheduled_posts, series, videos};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub deps: Arc<ServerDeps>,
    /// `None` when running on the in-memory store.
    pub db_pool: Option<PgPool>,
}

impl AppState {
    pub fn new(deps: Arc<ServerDeps>, db_pool: Option<PgPool>) -> Self {
        Self { deps, db_pool }
    }
}

/// Build the Axum application router
pub fn build_app(state: AppState) -> Router {
    // CORS configuration - allow any origin for development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([CONTENT_TYPE]);

    let job_routes = Router::new()
        .route("/jobs", post(jobs::enqueue_job))
        .route("/jobs/:id", get(jobs::get_job).delete(jobs::cancel_job));

    let video_routes = Router::new()
        .route("/videos", post(videos::create))
        .route("/videos/:id", get(videos::get).delete(videos::delete))
        .route("/videos/:id/generate", post(videos::generate))
        .route("/videos/:id/render", post(videos::render))
        .route("/videos/:id/schedule", post(videos::schedule))
        .route("/videos/:id/publish", post(videos::publish))
        .route("/videos/:id/optimize", post(videos::optimize))
        .route("/videos/:id/retry", post(videos::retry));

    let series_routes = Router::new()
        .route("/series", post(series::create))
        .route("/series/batch-generate", post(series::batch_generate))
        .route("/series/:id", get(series::get).delete(series::delete))
        .route("/series/:id/videos", get(series::videos))
        .route("/series/:id/generate-next", post(series::generate_next));

    let scheduling_routes = Router::new()
        .route(
            "/scheduled-posts",
            post(scheduled_posts::create).get(scheduled_posts::list),
        )
        .route("/scheduled-posts/due", get(scheduled_posts::due))
        .route("/scheduled-posts/bulk-plan", post(scheduled_posts::bulk_plan))
        .route("/scheduled-posts/bulk", post(scheduled_posts::bulk_create))
        .route("/scheduled-posts/analytics", get(scheduled_posts::analytics))
        .route(
            "/scheduled-posts/:id",
            patch(scheduled_posts::update).delete(scheduled_posts::cancel),
        )
        .route("/calendars", post(calendars::create).get(calendars::list))
        .route(
            "/calendars/:id",
            patch(calendars::update).delete(calendars::delete),
        );

    Router::new()
        .route("/health", get(health_handler))
        .merge(job_routes)
        .merge(video_routes)
        .merge(series_routes)
        .merge(scheduling_routes)
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(Extension(state))
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
