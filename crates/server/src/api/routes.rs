use axum::{
    middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::{handlers, jobs, middleware::metrics_middleware, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Artifacts written by the filesystem blob store
    let files = ServeDir::new(&state.config().storage.root);

    // API routes
    let api_routes = Router::new()
        // Health, version and config
        .route("/health", get(handlers::health))
        .route("/version", get(handlers::version))
        .route("/config", get(handlers::get_config))
        // Jobs
        .route("/enqueue", get(jobs::enqueue).post(jobs::enqueue))
        .route("/terminate", get(jobs::terminate).post(jobs::terminate))
        .route("/list", get(jobs::list))
        // Notifications
        .route("/ws", get(ws::ws_handler))
        .with_state(Arc::clone(&state));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .nest_service("/files", files)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
