//! Role-scoped dashboard aggregates.

use axum::{
    extract::{Extension, Path, Query},
    http::HeaderMap,
    response::Json,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;

use super::{Period, PeriodQuery};
use crate::{
    api::{ApiError, AppState},
    auth::{can_navigate, user::parse_org_id, OrgLevel, OrgRef, User},
    backend::Credentials,
    budget::UsageSummary,
};

/// Backend view serving the aggregate for one unit.
#[must_use]
pub fn dashboard_path(target: OrgRef) -> String {
    let id = target.id;
    match target.level {
        OrgLevel::Area => format!("api/admin/area/{id}/dashboard/"),
        OrgLevel::Region => format!("api/admin/regions/{id}/dashboard/"),
        OrgLevel::Branch => format!("api/admin/branches/{id}/dashboard/"),
        OrgLevel::Cluster => format!("api/admin/clusters/{id}/dashboard/"),
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ScopeRef {
    pub level: OrgLevel,
    pub id: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardSummary {
    /// Unit summarized; `null` for a user's personal dashboard.
    pub scope: Option<ScopeRef>,
    pub month: String,
    pub year: i32,
    pub summary: UsageSummary,
}

/// Backend path for the caller's own dashboard.
fn own_dashboard_path(user: &User) -> (Option<OrgRef>, String) {
    match user.scope_ref() {
        Some(target) => (Some(target), dashboard_path(target)),
        None => (None, format!("api/user-dashboard/{}/", user.id)),
    }
}

#[utoipa::path(
    get,
    path = "/api/dashboard/{level}/{id}",
    params(
        ("level" = String, Path, description = "area, region, branch or cluster"),
        ("id" = i64, Path, description = "Unit id"),
        PeriodQuery
    ),
    responses(
        (status = 200, description = "Backend aggregate for the unit"),
        (status = 400, description = "Unknown level, id or month"),
        (status = 401, description = "No session"),
        (status = 403, description = "Unit outside the caller's scope")
    ),
    tag = "dashboard"
)]
#[instrument(skip_all)]
pub async fn scoped(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path((level, id)): Path<(String, String)>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Value>, ApiError> {
    let session = state.require_session(&headers)?;
    let level: OrgLevel = level.parse().map_err(ApiError::BadRequest)?;
    let id = parse_org_id(&id).ok_or_else(|| ApiError::BadRequest(format!("Invalid id: {id}")))?;
    let target = OrgRef::new(level, id);

    if !can_navigate(&session.user, target) {
        return Err(ApiError::Forbidden(format!(
            "{level} {id} is outside your scope"
        )));
    }

    let period = Period::resolve(query.month.as_deref(), query.year)?;
    let credentials = Credentials::for_request(Some(&session), &headers);
    let body = state
        .backend
        .get_json(&dashboard_path(target), &period.named_query(), &credentials)
        .await?;
    debug!(%level, id, "dashboard fetched");
    Ok(Json(body))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/summary",
    params(PeriodQuery),
    responses(
        (status = 200, description = "Usage summary for the caller's own scope", body = DashboardSummary),
        (status = 400, description = "Invalid month"),
        (status = 401, description = "No session")
    ),
    tag = "dashboard"
)]
#[instrument(skip_all)]
pub async fn summary(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<DashboardSummary>, ApiError> {
    let session = state.require_session(&headers)?;
    let period = Period::resolve(query.month.as_deref(), query.year)?;
    let (scope, path) = own_dashboard_path(&session.user);

    let credentials = Credentials::for_request(Some(&session), &headers);
    let body = state
        .backend
        .get_json(&path, &period.named_query(), &credentials)
        .await?;

    Ok(Json(DashboardSummary {
        scope: scope.map(|target| ScopeRef {
            level: target.level,
            id: target.id,
        }),
        month: period.month_label().to_string(),
        year: period.year,
        summary: UsageSummary::from_dashboard(&body),
    }))
}
