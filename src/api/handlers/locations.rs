//! Location lookups and poin types used by the registration form. No session
//! is required.

use axum::{
    extract::{Extension, Path},
    response::Json,
};
use serde_json::Value;
use std::sync::Arc;

use crate::{
    api::{ApiError, AppState},
    backend::Credentials,
};

async fn lookup(state: &AppState, path: &str) -> Result<Json<Value>, ApiError> {
    let body = state
        .backend
        .get_json(path, &[], &Credentials::anonymous())
        .await?;
    Ok(Json(body))
}

#[utoipa::path(
    get,
    path = "/api/locations/areas",
    responses((status = 200, description = "All areas")),
    tag = "locations"
)]
pub async fn areas(state: Extension<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    lookup(&state, "api/locations/areas/").await
}

#[utoipa::path(
    get,
    path = "/api/locations/regions/{area_id}",
    params(("area_id" = i64, Path, description = "Area id")),
    responses((status = 200, description = "Regions of the area")),
    tag = "locations"
)]
pub async fn regions(
    state: Extension<Arc<AppState>>,
    Path(area_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    lookup(&state, &format!("api/locations/regions/{area_id}/")).await
}

#[utoipa::path(
    get,
    path = "/api/locations/branches/{region_id}",
    params(("region_id" = i64, Path, description = "Region id")),
    responses((status = 200, description = "Branches of the region")),
    tag = "locations"
)]
pub async fn branches(
    state: Extension<Arc<AppState>>,
    Path(region_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    lookup(&state, &format!("api/locations/branches/{region_id}/")).await
}

#[utoipa::path(
    get,
    path = "/api/locations/clusters/{branch_id}",
    params(("branch_id" = i64, Path, description = "Branch id")),
    responses((status = 200, description = "Clusters of the branch")),
    tag = "locations"
)]
pub async fn clusters(
    state: Extension<Arc<AppState>>,
    Path(branch_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    lookup(&state, &format!("api/locations/clusters/{branch_id}/")).await
}

#[utoipa::path(
    get,
    path = "/api/poin-types",
    responses((status = 200, description = "Spending categories")),
    tag = "locations"
)]
pub async fn poin_types(state: Extension<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    lookup(&state, "api/poin-types/").await
}
