//! Cache Routes
//!
//! - DELETE /api/v1/cache - Drop every cached result

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::dto::ClearCacheResponse;
use crate::api::state::AppState;

/// DELETE /api/v1/cache
pub async fn clear_cache(State(state): State<Arc<AppState>>) -> Json<ClearCacheResponse> {
    let cleared = state.service.clear_cache().await;

    Json(ClearCacheResponse {
        status: "ok".to_string(),
        cleared,
    })
}
