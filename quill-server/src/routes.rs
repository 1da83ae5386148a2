//! Route table

use std::path::Path;

use axum::{
    routing::{get, post},
    Router,
};
use quill::{health::health, middleware, state::AppState};
use tower_http::services::ServeDir;

use crate::handlers;

/// Build the application: routes, static files and the middleware chain.
pub fn build(state: AppState, static_dir: &Path) -> Router {
    let routes = Router::new()
        .route("/", get(handlers::home))
        .route("/about", get(handlers::about))
        .route("/coffee", post(handlers::buy_coffee))
        .route("/health", get(health))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state.clone());

    middleware::apply(routes, &state)
}
