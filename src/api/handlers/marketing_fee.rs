//! Marketing fee: the budget ceiling of a cluster for one month.

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

use super::{may_read_user, require_area_admin, Period, PeriodQuery};
use crate::{
    api::{ApiError, AppState},
    backend::Credentials,
    budget::month_number,
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitMarketingFee {
    pub cluster_id: i64,
    pub amount: f64,
    /// Month name (Indonesian or English) or number 1-12.
    pub month: String,
    pub year: Option<i32>,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct BackendMarketingFee {
    cluster_id: i64,
    amount: f64,
    month: &'static str,
    year: i32,
}

impl SubmitMarketingFee {
    fn validate(&self) -> Result<BackendMarketingFee, ApiError> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(ApiError::BadRequest(
                "amount must be a positive number".to_string(),
            ));
        }
        let year = self
            .year
            .ok_or_else(|| ApiError::BadRequest("year is required".to_string()))?;
        let month = month_number(&self.month)
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid month: {}", self.month)))?;
        Ok(BackendMarketingFee {
            cluster_id: self.cluster_id,
            amount: self.amount,
            month: Period { month, year }.month_label(),
            year,
        })
    }
}

#[utoipa::path(
    get,
    path = "/api/marketing-fee/{user_id}",
    params(
        ("user_id" = i64, Path, description = "User whose spending is totalled"),
        PeriodQuery
    ),
    responses(
        (status = 200, description = "Total spent by the user in the month"),
        (status = 400, description = "Invalid month"),
        (status = 401, description = "No session"),
        (status = 403, description = "Another user's total, caller is not an admin")
    ),
    tag = "marketing-fee"
)]
#[instrument(skip_all)]
pub async fn get(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Value>, ApiError> {
    let session = state.require_session(&headers)?;
    if !may_read_user(&session, user_id) {
        return Err(ApiError::Forbidden(
            "Cannot read another user's marketing fee".to_string(),
        ));
    }
    let period = Period::resolve(query.month.as_deref(), query.year)?;
    let credentials = Credentials::for_request(Some(&session), &headers);
    let body = state
        .backend
        .get_json(
            &format!("api/marketing-fee/{user_id}/"),
            &period.named_query(),
            &credentials,
        )
        .await?;
    Ok(Json(body))
}

#[utoipa::path(
    put,
    path = "/api/marketing-fee/submit",
    request_body = SubmitMarketingFee,
    responses(
        (status = 200, description = "Marketing fee stored for the cluster and month"),
        (status = 400, description = "Invalid amount, month or year"),
        (status = 401, description = "No session"),
        (status = 403, description = "Caller is not admin_area")
    ),
    tag = "marketing-fee"
)]
#[instrument(skip_all)]
pub async fn submit(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<SubmitMarketingFee>,
) -> Result<Json<Value>, ApiError> {
    let session = state.require_session(&headers)?;
    require_area_admin(&session, "set the marketing fee")?;
    let body = request.validate()?;

    let credentials = Credentials::for_request(Some(&session), &headers);
    let response = state
        .backend
        .put_json("api/marketing-fee/submit", &body, &credentials)
        .await?;
    info!(
        cluster_id = body.cluster_id,
        month = body.month,
        year = body.year,
        "marketing fee set"
    );
    Ok(Json(response))
}
