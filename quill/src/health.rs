//! Health check handler

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service name
    pub service: String,

    /// Version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Number of page templates in the startup cache, absent in dynamic mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub templates: Option<usize>,
}

/// Liveness probe
///
/// Always returns 200 OK if the service is running.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let templates = match state.renderer().strategy() {
        crate::templates::CacheStrategy::Static(cache) => Some(cache.len()),
        crate::templates::CacheStrategy::Dynamic(_) => None,
    };

    let response = HealthResponse {
        status: "healthy".to_string(),
        service: state.config().service.name.clone(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
        templates,
    };

    (StatusCode::OK, Json(response))
}
