//! Region Routes
//!
//! - GET /api/v1/regions?level=&parent= - List provinces and counties
//! - GET /api/v1/regions/:id - One region (id or name) with its stations

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::{
    RegionDetailResponse, RegionListQuery, RegionListResponse, RegionResponse, StationResponse,
};
use crate::api::error::ApiResult;
use crate::api::state::AppState;

/// GET /api/v1/regions
pub async fn list_regions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RegionListQuery>,
) -> ApiResult<Json<RegionListResponse>> {
    let level = query.level()?;

    let mut units = match query.parent.as_deref() {
        Some(parent) => state.service.subregions(parent)?,
        None => state.service.regions(level),
    };
    if let Some(level) = level {
        units.retain(|u| u.level == level);
    }

    let regions: Vec<RegionResponse> = units.iter().map(RegionResponse::from).collect();

    Ok(Json(RegionListResponse {
        total: regions.len(),
        regions,
    }))
}

/// GET /api/v1/regions/:id
pub async fn get_region(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<RegionDetailResponse>> {
    let unit = state.service.region(&id)?;
    let stations: Vec<StationResponse> = state
        .service
        .stations(&unit.id)?
        .into_iter()
        .map(StationResponse::from)
        .collect();

    Ok(Json(RegionDetailResponse {
        region: RegionResponse::from(&unit),
        station_count: stations.len(),
        stations,
    }))
}
