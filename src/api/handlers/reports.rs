//! Expense evidence ("reports"): listing per user or per cluster, submission
//! and deletion.

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};

use super::{may_read_user, Period};
use crate::{
    api::{ApiError, AppState},
    auth::{can_navigate, OrgLevel, OrgRef, Session},
    backend::{BackendError, Credentials},
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ReportQuery {
    pub user_id: Option<i64>,
    pub cluster_id: Option<i64>,
    pub poin_id: Option<i64>,
    pub month: Option<String>,
    pub year: Option<i32>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateReport {
    pub description: String,
    pub amount_used: f64,
    pub image_url: String,
    pub id_user: i64,
    pub id_poin: i64,
    /// Expense date, as sent by the client.
    pub time: String,
    #[serde(default)]
    pub status: bool,
}

/// The single user account that reports for a cluster.
#[derive(Debug, Deserialize)]
struct ClusterUser {
    id_user: i64,
    username: String,
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value)
        .map_err(|err| ApiError::Backend(BackendError::Decode(err.to_string())))
}

/// Evidence rows tagged with the cluster's username, in the shape the admin
/// detail views read.
fn tag_cluster_reports(data: Value, username: &str) -> Value {
    if data.get("status").and_then(Value::as_str) != Some("success") {
        return data;
    }
    let reports: Vec<Value> = data
        .get("data_report")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .map(|row| {
                    let mut row = row.clone();
                    let id = row.get("id").or_else(|| row.get("id_report")).cloned();
                    if let Some(object) = row.as_object_mut() {
                        object.insert("id_report".to_string(), id.unwrap_or(Value::Null));
                        object.insert("User".to_string(), json!({ "username": username }));
                    }
                    row
                })
                .collect()
        })
        .unwrap_or_default();

    json!({
        "reports": reports,
        "total_amount": data.get("total_amount").cloned().unwrap_or_else(|| json!([])),
        "data_recommendation": data.get("data_recommendation").cloned().unwrap_or_else(|| json!([])),
        "status": "success",
    })
}

/// Evidence list for `query`: a cluster's (tagged with its username) or a
/// single user's, after the same scope checks for every caller.
async fn load_evidence(
    state: &AppState,
    session: &Session,
    headers: &HeaderMap,
    query: &ReportQuery,
) -> Result<Value, ApiError> {
    let poin_id = query
        .poin_id
        .ok_or_else(|| ApiError::BadRequest("poinId is required".to_string()))?;
    let period = Period::resolve(query.month.as_deref(), query.year)?;
    let credentials = Credentials::for_request(Some(session), headers);

    if let Some(cluster_id) = query.cluster_id {
        if !can_navigate(&session.user, OrgRef::new(OrgLevel::Cluster, cluster_id)) {
            return Err(ApiError::Forbidden(
                "Cluster is outside your scope".to_string(),
            ));
        }
        let cluster_user: ClusterUser = decode(
            state
                .backend
                .get_json(
                    &format!("api/admin/cluster-user/{cluster_id}"),
                    &[],
                    &credentials,
                )
                .await?,
        )?;
        debug!(cluster_id, id_user = cluster_user.id_user, "resolved cluster user");

        let data = state
            .backend
            .get_json(
                &format!("api/user-evidence/{}/{poin_id}/", cluster_user.id_user),
                &period.numeric_query(),
                &credentials,
            )
            .await?;
        return Ok(tag_cluster_reports(data, &cluster_user.username));
    }

    if let Some(user_id) = query.user_id {
        if !may_read_user(session, user_id) {
            return Err(ApiError::Forbidden(
                "Cannot read another user's reports".to_string(),
            ));
        }
        return state
            .backend
            .get_json(
                &format!("api/user-evidence/{user_id}/{poin_id}/"),
                &period.numeric_query(),
                &credentials,
            )
            .await
            .map_err(ApiError::from);
    }

    Err(ApiError::BadRequest(
        "Missing required parameters".to_string(),
    ))
}

/// Report ids present in an evidence list, tagged (`reports`) or raw (`data_report`).
fn listed_report_ids(evidence: &Value) -> Vec<i64> {
    ["reports", "data_report"]
        .iter()
        .filter_map(|key| evidence.get(*key).and_then(Value::as_array))
        .flatten()
        .filter_map(|row| {
            row.get("id_report")
                .or_else(|| row.get("id"))
                .and_then(Value::as_i64)
        })
        .collect()
}

#[utoipa::path(
    get,
    path = "/api/reports",
    params(ReportQuery),
    responses(
        (status = 200, description = "Evidence for the user or cluster"),
        (status = 400, description = "Missing userId/clusterId or poinId"),
        (status = 401, description = "No session"),
        (status = 403, description = "Outside the caller's scope")
    ),
    tag = "reports"
)]
#[instrument(skip_all)]
pub async fn list(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Value>, ApiError> {
    let session = state.require_session(&headers)?;
    let evidence = load_evidence(&state, &session, &headers, &query).await?;
    Ok(Json(evidence))
}

fn validate_report(session: &Session, report: &CreateReport) -> Result<(), ApiError> {
    if report.id_user != session.user.id {
        return Err(ApiError::Forbidden(
            "Reports can only be submitted for yourself".to_string(),
        ));
    }
    if !report.amount_used.is_finite() || report.amount_used < 0.0 {
        return Err(ApiError::BadRequest(
            "amount_used must be a non-negative number".to_string(),
        ));
    }
    super::required("description", &report.description)?;
    super::required("time", &report.time)?;
    if crate::budget::poin_name(u32::try_from(report.id_poin).unwrap_or(0)).is_none() {
        return Err(ApiError::BadRequest(format!(
            "Unknown poin: {}",
            report.id_poin
        )));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/reports/create",
    request_body = CreateReport,
    responses(
        (status = 201, description = "Report stored by the backend"),
        (status = 400, description = "Invalid report"),
        (status = 401, description = "No session"),
        (status = 403, description = "Report for another user")
    ),
    tag = "reports"
)]
#[instrument(skip_all)]
pub async fn create(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Json(report): Json<CreateReport>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.require_session(&headers)?;
    validate_report(&session, &report)?;

    let credentials = Credentials::for_request(Some(&session), &headers);
    let body = state
        .backend
        .post_json("api/report/create/", &report, &credentials)
        .await?;
    info!(user_id = report.id_user, id_poin = report.id_poin, "report created");
    Ok((StatusCode::CREATED, Json(body)))
}

#[utoipa::path(
    delete,
    path = "/api/reports/delete/{report_id}",
    params(
        ("report_id" = i64, Path, description = "Report id"),
        ReportQuery
    ),
    responses(
        (status = 200, description = "Report deleted"),
        (status = 400, description = "Missing userId/clusterId or poinId"),
        (status = 401, description = "No session"),
        (status = 403, description = "Report is not in an evidence list the caller may read"),
        (status = 404, description = "Unknown report")
    ),
    tag = "reports"
)]
#[instrument(skip_all)]
pub async fn remove(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(report_id): Path<i64>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Value>, ApiError> {
    let session = state.require_session(&headers)?;
    // The backend deletes any id it is given; ownership is proven by the
    // report showing up in a list this caller is allowed to read.
    let evidence = load_evidence(&state, &session, &headers, &query).await?;
    if !listed_report_ids(&evidence).contains(&report_id) {
        warn!(report_id, user_id = session.user.id, "delete outside readable evidence");
        return Err(ApiError::Forbidden(format!(
            "Report {report_id} is not in the selected evidence list"
        )));
    }

    let credentials = Credentials::for_request(Some(&session), &headers);
    state
        .backend
        .delete(&format!("api/report/delete/{report_id}/"), &credentials)
        .await?;
    info!(report_id, user_id = session.user.id, "report deleted");
    Ok(Json(json!({ "success": true })))
}
