use axum::{
    extract::{Extension, Path, Query},
    http::HeaderMap,
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

use super::{require_area_admin, Period, PeriodQuery};
use crate::{
    api::{ApiError, AppState},
    backend::Credentials,
    budget::month_number,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRecommendation {
    pub cluster_id: i64,
    pub poin_id: i64,
    pub recommend: f64,
    /// Month name (Indonesian or English) or number 1-12.
    pub month: String,
    pub year: Option<i32>,
}

/// Body forwarded to the backend, month normalized to its Indonesian name.
#[derive(Debug, PartialEq, Serialize)]
struct BackendRecommendation {
    cluster_id: i64,
    poin_id: i64,
    recommend: f64,
    month: &'static str,
    year: i32,
}

impl CreateRecommendation {
    fn validate(&self) -> Result<BackendRecommendation, ApiError> {
        if !self.recommend.is_finite() || self.recommend < 0.0 {
            return Err(ApiError::BadRequest(
                "recommend must be a non-negative number".to_string(),
            ));
        }
        let year = self
            .year
            .ok_or_else(|| ApiError::BadRequest("year is required".to_string()))?;
        let month = month_number(&self.month)
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid month: {}", self.month)))?;
        Ok(BackendRecommendation {
            cluster_id: self.cluster_id,
            poin_id: self.poin_id,
            recommend: self.recommend,
            month: Period { month, year }.month_label(),
            year,
        })
    }
}

#[utoipa::path(
    get,
    path = "/api/recommendations/{cluster_id}/{poin_id}",
    params(
        ("cluster_id" = i64, Path, description = "Cluster id"),
        ("poin_id" = i64, Path, description = "Poin id"),
        PeriodQuery
    ),
    responses(
        (status = 200, description = "Recommendation for the cluster, poin and month"),
        (status = 400, description = "Invalid month"),
        (status = 401, description = "No session")
    ),
    tag = "recommendations"
)]
#[instrument(skip_all)]
pub async fn get(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path((cluster_id, poin_id)): Path<(i64, i64)>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Value>, ApiError> {
    let session = state.require_session(&headers)?;
    let period = Period::resolve(query.month.as_deref(), query.year)?;
    let credentials = Credentials::for_request(Some(&session), &headers);
    let body = state
        .backend
        .get_json(
            &format!("api/recommendations/{cluster_id}/{poin_id}"),
            &period.named_query(),
            &credentials,
        )
        .await?;
    Ok(Json(body))
}

#[utoipa::path(
    post,
    path = "/api/recommendations/create",
    request_body = CreateRecommendation,
    responses(
        (status = 200, description = "Recommendation stored"),
        (status = 400, description = "Invalid recommendation"),
        (status = 401, description = "No session"),
        (status = 403, description = "Caller is not admin_area")
    ),
    tag = "recommendations"
)]
#[instrument(skip_all)]
pub async fn create(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CreateRecommendation>,
) -> Result<Json<Value>, ApiError> {
    let session = state.require_session(&headers)?;
    require_area_admin(&session, "set recommendations")?;
    let body = request.validate()?;

    let credentials = Credentials::for_request(Some(&session), &headers);
    let response = state
        .backend
        .post_json("api/recommendations/create", &body, &credentials)
        .await?;
    info!(
        cluster_id = body.cluster_id,
        poin_id = body.poin_id,
        month = body.month,
        year = body.year,
        "recommendation set"
    );
    Ok(Json(response))
}
