//! Statistics Routes
//!
//! - GET /api/v1/regions/:id/statistics?date=YYYY-MM-DD[&parameters=B00300S,...]
//! - GET /api/v1/regions/:id/changes?from=YYYY-MM-DD&to=YYYY-MM-DD

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::future::Future;
use std::sync::Arc;

use crate::api::dto::{ChangesQuery, StatisticsQuery};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::query::{AggregationResult, Comparison, StatsResult};

/// Run a computation under the configured request deadline
async fn with_deadline<T>(
    state: &AppState,
    fut: impl Future<Output = StatsResult<T>>,
) -> ApiResult<T> {
    let timeout = state.request_timeout();
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ApiError::ServiceUnavailable(format!(
            "computation exceeded {}s",
            timeout.as_secs()
        ))),
    }
}

/// GET /api/v1/regions/:id/statistics
pub async fn get_statistics(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<StatisticsQuery>,
) -> ApiResult<Json<AggregationResult>> {
    let date = query.date()?;
    let parameters = query.parameters()?;

    let result = with_deadline(&state, state.service.compute_for(&id, date, &parameters)).await?;

    Ok(Json(result.as_ref().clone()))
}

/// GET /api/v1/regions/:id/changes
pub async fn get_changes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ChangesQuery>,
) -> ApiResult<Json<Comparison>> {
    let (from, to) = query.dates()?;

    let comparison = with_deadline(&state, state.service.compare(&id, from, to)).await?;

    Ok(Json(comparison))
}
