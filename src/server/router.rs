use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::server::handlers;
use crate::state::AppState;

/// Creates the application router.
///
/// API routes are `/init`, `/search` and `/health`. When the state carries a
/// static directory, every other path is served from it.
pub fn router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/init", post(handlers::init))
        .route("/search", post(handlers::search))
        .route("/health", get(handlers::health));

    if let Some(dir) = &state.static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
