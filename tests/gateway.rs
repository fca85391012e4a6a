//! End-to-end tests for the gateway router.
//!
//! A mock budget backend runs in-process on an ephemeral port; the gateway
//! router is driven with `tower::ServiceExt::oneshot`, so the guard, the
//! handlers and the real `reqwest` client are all exercised.

use anggaran::{
    api::{self, AppState, SessionSettings},
    auth::{Role, Session, SessionCodec, User},
    backend::Backend,
};
use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    extract::{Path, Query},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
        HeaderMap, Request, StatusCode,
    },
    response::{IntoResponse, Json},
    routing::{delete, get, post, put},
    Router,
};
use chrono::{Duration, Utc};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceExt;

const SECRET: &str = "integration-secret-0123456789abcdef";
const BRANCH_TOKEN: &str = "upstream-branch-token";

async fn mock_login(Json(body): Json<Value>) -> impl IntoResponse {
    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    if username == "mcot" && password == "secret" {
        (
            StatusCode::OK,
            Json(json!({
                "user": {
                    "id_user": "4125",
                    "username": "mcot",
                    "role": "admin_area",
                    "id_cluster": 40,
                    "id_branch": 30,
                    "id_region": 20,
                    "id_area": 10
                },
                "token": "upstream-mcot-token"
            })),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid credentials" })),
        )
    }
}

// Cluster 41 belongs to branch 30, 42 does not, anything else fails upstream.
async fn mock_check_access(
    Path((branch_id, cluster_id)): Path<(i64, i64)>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if bearer != format!("Bearer {BRANCH_TOKEN}") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "missing token" })),
        );
    }
    match (branch_id, cluster_id) {
        (30, 41) => (StatusCode::OK, Json(json!({ "hasAccess": true }))),
        (30, 42) => (StatusCode::OK, Json(json!({ "hasAccess": false }))),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "boom" })),
        ),
    }
}

async fn mock_cluster_user(Path(cluster_id): Path<i64>) -> Json<Value> {
    Json(json!({ "id_user": 6000 + cluster_id, "username": format!("cluster-{cluster_id}") }))
}

async fn mock_evidence(
    Path((user_id, poin_id)): Path<(i64, i64)>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    Json(json!({
        "status": "success",
        "data_report": [{ "id": 7, "id_user": user_id, "id_poin": poin_id }],
        "total_amount": [{ "month": query.get("month"), "year": query.get("year") }]
    }))
}

async fn mock_recommendation(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({ "status": "success", "received": body }))
}

async fn mock_marketing_fee(
    Path(user_id): Path<i64>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    Json(json!({
        "id_user": user_id,
        "total": 250_000,
        "month": query.get("month"),
        "year": query.get("year")
    }))
}

// Only report 7 exists upstream; the mock deletes it whatever the caller.
async fn mock_delete_report(Path(report_id): Path<i64>) -> impl IntoResponse {
    if report_id == 7 {
        (StatusCode::OK, Json(json!({ "message": "deleted" })))
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Report not found" })),
        )
    }
}

async fn mock_branch_dashboard(
    Path(branch_id): Path<i64>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    Json(json!({
        "branch": branch_id,
        "month": query.get("month"),
        "marketing_fee": 1000,
        "usage_details": [
            { "id_poin": 1, "type": "AKUISISI", "total_amount": 250, "recommendation": 500 }
        ]
    }))
}

async fn spawn_backend() -> Result<String> {
    let router = Router::new()
        .route("/api/user-login/", post(mock_login))
        .route(
            "/api/admin/branch/:branch_id/clusters/check-access/:cluster_id/",
            get(mock_check_access),
        )
        .route("/api/admin/cluster-user/:cluster_id", get(mock_cluster_user))
        .route("/api/user-evidence/:user_id/:poin_id/", get(mock_evidence))
        .route("/api/recommendations/create", post(mock_recommendation))
        .route("/api/report/delete/:report_id/", delete(mock_delete_report))
        .route("/api/marketing-fee/submit", put(mock_recommendation))
        .route("/api/marketing-fee/:user_id/", get(mock_marketing_fee))
        .route(
            "/api/admin/branches/:branch_id/dashboard/",
            get(mock_branch_dashboard),
        )
        .route(
            "/api/poin-types/",
            get(|| async { Json(json!([{ "id_poin": 1, "type": "AKUISISI" }])) }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router.into_make_service()).await;
    });
    Ok(format!("http://{addr}"))
}

async fn gateway() -> Result<(Router, Arc<AppState>)> {
    let backend_url = spawn_backend().await?;
    let codec = SessionCodec::new(SecretString::from(SECRET.to_string()))?;
    let backend = Backend::new(&backend_url, std::time::Duration::from_secs(5))?;
    let state = Arc::new(AppState::new(codec, backend, SessionSettings::default()));
    Ok((api::app(state.clone()), state))
}

fn user(id: i64) -> User {
    User {
        id,
        username: format!("user-{id}"),
        email: None,
        phone: None,
        role: Role::from_user_id(id),
        cluster: Some(40),
        branch: Some(30),
        region: Some(20),
        area: Some(10),
    }
}

fn cookie_for(state: &AppState, session: &Session) -> Result<String> {
    Ok(format!("session={}", state.codec.encode(session)?))
}

fn session_for(id: i64) -> Session {
    Session::new(user(id), Duration::hours(1), Utc::now())
}

async fn get_page(app: &Router, path: &str, cookie: Option<&str>) -> Result<axum::response::Response> {
    let mut request = Request::builder().method("GET").uri(path);
    if let Some(cookie) = cookie {
        request = request.header(COOKIE, cookie);
    }
    Ok(app.clone().oneshot(request.body(Body::empty())?).await?)
}

fn location(response: &axum::response::Response) -> Option<&str> {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
}

async fn json_body(response: axum::response::Response) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::test]
async fn login_issues_signed_session_with_resolved_role() -> Result<()> {
    let (app, state) = gateway().await?;
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "username": "mcot", "password": "secret" }).to_string(),
                ))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .context("missing Set-Cookie")?
        .to_string();
    assert!(set_cookie.starts_with("session="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Max-Age=86400"));

    let body = json_body(response).await?;
    assert_eq!(body["user"]["role"], json!("admin_cluster_mcot"));
    assert_eq!(body["home"], json!("/dashboard/admin/cluster"));
    assert!(body["expiresAt"].is_string());

    let value = set_cookie
        .trim_start_matches("session=")
        .split(';')
        .next()
        .unwrap_or_default();
    let session = state.codec.open(value, Utc::now()).context("cookie must open")?;
    assert_eq!(session.user.id, 4125);
    assert_eq!(session.user.cluster, Some(40));
    assert_eq!(session.upstream_token.as_deref(), Some("upstream-mcot-token"));
    Ok(())
}

#[tokio::test]
async fn login_failure_passes_backend_status_through() -> Result<()> {
    let (app, _) = gateway().await?;
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "username": "mcot", "password": "wrong" }).to_string(),
                ))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await?;
    assert_eq!(body["error"], json!("Invalid credentials"));
    Ok(())
}

#[tokio::test]
async fn session_endpoint_never_errors() -> Result<()> {
    let (app, state) = gateway().await?;

    let response = get_page(&app, "/api/auth/session", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await?["user"], Value::Null);

    let response = get_page(&app, "/api/auth/session", Some("session=garbage")).await?;
    assert_eq!(json_body(response).await?["user"], Value::Null);

    let cookie = cookie_for(&state, &session_for(2001))?;
    let response = get_page(&app, "/api/auth/session", Some(&cookie)).await?;
    assert_eq!(json_body(response).await?["user"]["role"], json!("admin_region"));
    Ok(())
}

#[tokio::test]
async fn guard_redirects_anonymous_and_expired_sessions_to_login() -> Result<()> {
    let (app, state) = gateway().await?;

    let response = get_page(&app, "/dashboard/user", None).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/auth/login"));

    let mut expired = session_for(6001);
    expired.expires_at = Utc::now() - Duration::seconds(1);
    let cookie = cookie_for(&state, &expired)?;
    let response = get_page(&app, "/dashboard/user", Some(&cookie)).await?;
    assert_eq!(location(&response), Some("/auth/login"));

    let response = get_page(&app, "/auth/login", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn guard_sends_signed_in_users_home_from_auth_pages() -> Result<()> {
    let (app, state) = gateway().await?;
    let cookie = cookie_for(&state, &session_for(3001))?;
    let response = get_page(&app, "/auth/login", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/dashboard/admin/branch"));
    Ok(())
}

#[tokio::test]
async fn allowed_page_carries_session_context() -> Result<()> {
    let (app, state) = gateway().await?;
    let cookie = cookie_for(&state, &session_for(2001))?;
    let response = get_page(&app, "/dashboard/admin/region/20", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["path"], json!("/dashboard/admin/region/20"));
    assert_eq!(body["role"], json!("admin_region"));
    assert_eq!(body["home"], json!("/dashboard/admin/region"));

    let response = get_page(&app, "/dashboard/admin/region/21", Some(&cookie)).await?;
    assert_eq!(location(&response), Some("/dashboard/error"));
    Ok(())
}

#[tokio::test]
async fn branch_admin_cluster_access_uses_upstream_check() -> Result<()> {
    let (app, state) = gateway().await?;
    let session = session_for(3001).with_upstream_token(Some(BRANCH_TOKEN.to_string()));
    let cookie = cookie_for(&state, &session)?;

    let response = get_page(&app, "/dashboard/admin/cluster/41", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get_page(&app, "/dashboard/admin/cluster/42", Some(&cookie)).await?;
    assert_eq!(location(&response), Some("/dashboard/error"));

    // upstream failure is a denial, never an allow
    let response = get_page(&app, "/dashboard/admin/cluster/99", Some(&cookie)).await?;
    assert_eq!(location(&response), Some("/dashboard/error"));

    // without the upstream token the backend refuses, which is also a denial
    let cookie = cookie_for(&state, &session_for(3001))?;
    let response = get_page(&app, "/dashboard/admin/cluster/41", Some(&cookie)).await?;
    assert_eq!(location(&response), Some("/dashboard/error"));
    Ok(())
}

#[tokio::test]
async fn file_like_paths_stay_guarded() -> Result<()> {
    let (app, state) = gateway().await?;

    for path in ["/dashboard/report.pdf", "/dashboard/admin/cluster/17.json"] {
        let response = get_page(&app, path, None).await?;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(location(&response), Some("/auth/login"), "{path}");
    }

    let cookie = cookie_for(&state, &session_for(3001))?;
    let response = get_page(&app, "/dashboard/admin/cluster/17.json", Some(&cookie)).await?;
    assert_eq!(location(&response), Some("/dashboard/error"));

    let response = get_page(&app, "/auth/login.html", Some(&cookie)).await?;
    assert_eq!(location(&response), Some("/dashboard/admin/branch"));
    Ok(())
}

#[tokio::test]
async fn bearer_transport_is_accepted() -> Result<()> {
    let (app, state) = gateway().await?;
    let token = state.codec.encode(&session_for(1001))?;
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/dashboard/admin/cluster/77")
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn cluster_reports_are_tagged_with_cluster_username() -> Result<()> {
    let (app, state) = gateway().await?;
    let cookie = cookie_for(&state, &session_for(1001))?;
    let response = get_page(
        &app,
        "/api/reports?clusterId=40&poinId=2&month=Maret&year=2024",
        Some(&cookie),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["reports"][0]["id_report"], json!(7));
    assert_eq!(body["reports"][0]["id_user"], json!(6040));
    assert_eq!(body["reports"][0]["User"]["username"], json!("cluster-40"));
    assert_eq!(body["total_amount"][0]["month"], json!("3"));
    Ok(())
}

#[tokio::test]
async fn reports_require_an_id_and_a_session() -> Result<()> {
    let (app, state) = gateway().await?;

    let response = get_page(&app, "/api/reports?poinId=1", None).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let cookie = cookie_for(&state, &session_for(6001))?;
    let response = get_page(&app, "/api/reports?poinId=1", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = get_page(&app, "/api/reports?userId=6002&poinId=1", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    Ok(())
}

async fn delete_report(app: &Router, path: &str, cookie: &str) -> Result<axum::response::Response> {
    Ok(app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(path)
                .header(COOKIE, cookie)
                .body(Body::empty())?,
        )
        .await?)
}

#[tokio::test]
async fn reports_are_deleted_only_from_readable_evidence() -> Result<()> {
    let (app, state) = gateway().await?;
    let cookie = cookie_for(&state, &session_for(6001))?;

    let response = delete_report(&app, "/api/reports/delete/7?userId=6001&poinId=2", &cookie).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await?["success"], json!(true));

    // report 8 is not in the caller's list, even though the backend would take it
    let response = delete_report(&app, "/api/reports/delete/8?userId=6001&poinId=2", &cookie).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = delete_report(&app, "/api/reports/delete/7?userId=6002&poinId=2", &cookie).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = delete_report(&app, "/api/reports/delete/7", &cookie).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // an area admin deletes through the cluster's list
    let cookie = cookie_for(&state, &session_for(1001))?;
    let response = delete_report(&app, "/api/reports/delete/7?clusterId=40&poinId=2", &cookie).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn marketing_fee_reads_are_scoped_to_the_caller() -> Result<()> {
    let (app, state) = gateway().await?;
    let cookie = cookie_for(&state, &session_for(6001))?;

    let response = get_page(&app, "/api/marketing-fee/6001?month=5&year=2024", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["total"], json!(250_000));
    assert_eq!(body["month"], json!("Mei"));
    assert_eq!(body["year"], json!("2024"));

    let response = get_page(&app, "/api/marketing-fee/6002?month=5&year=2024", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let admin = cookie_for(&state, &session_for(2001))?;
    let response = get_page(&app, "/api/marketing-fee/6002?month=5&year=2024", Some(&admin)).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get_page(&app, "/api/marketing-fee/6001", None).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

async fn submit_marketing_fee(
    app: &Router,
    cookie: &str,
    payload: &Value,
) -> Result<axum::response::Response> {
    Ok(app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/marketing-fee/submit")
                .header(COOKIE, cookie)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))?,
        )
        .await?)
}

#[tokio::test]
async fn only_area_admin_sets_the_marketing_fee() -> Result<()> {
    let (app, state) = gateway().await?;
    let payload = json!({ "clusterId": 40, "amount": 5_000_000, "month": "may", "year": 2024 });

    let region = cookie_for(&state, &session_for(2001))?;
    let response = submit_marketing_fee(&app, &region, &payload).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let area = cookie_for(&state, &session_for(1001))?;
    let response = submit_marketing_fee(&app, &area, &payload).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["received"]["clusterId"], json!(40));
    assert_eq!(body["received"]["month"], json!("Mei"));
    assert_eq!(body["received"]["year"], json!(2024));

    let zero = json!({ "clusterId": 40, "amount": 0, "month": "Mei", "year": 2024 });
    let response = submit_marketing_fee(&app, &area, &zero).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn only_area_admin_creates_recommendations() -> Result<()> {
    let (app, state) = gateway().await?;
    let payload = json!({
        "cluster_id": 40,
        "poin_id": 1,
        "recommend": 500000,
        "month": "march",
        "year": 2024
    });

    for (id, expected) in [(2001, StatusCode::FORBIDDEN), (1001, StatusCode::OK)] {
        let cookie = cookie_for(&state, &session_for(id))?;
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/recommendations/create")
                    .header(COOKIE, cookie)
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))?,
            )
            .await?;
        assert_eq!(response.status(), expected, "user {id}");
        if expected == StatusCode::OK {
            let body = json_body(response).await?;
            assert_eq!(body["received"]["month"], json!("Maret"));
        }
    }
    Ok(())
}

#[tokio::test]
async fn dashboard_summary_adds_percentages() -> Result<()> {
    let (app, state) = gateway().await?;
    let cookie = cookie_for(&state, &session_for(3001))?;
    let response = get_page(
        &app,
        "/api/dashboard/summary?month=5&year=2024",
        Some(&cookie),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["scope"]["level"], json!("branch"));
    assert_eq!(body["month"], json!("Mei"));
    assert_eq!(body["summary"]["sectors"][0]["percentage"], json!(50.0));
    assert_eq!(body["summary"]["usage_percentage"], json!(25.0));

    let response = get_page(&app, "/api/dashboard/region/20", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn health_reports_backend_status() -> Result<()> {
    let (app, _) = gateway().await?;
    let response = get_page(&app, "/health", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-app"));
    let body = json_body(response).await?;
    assert_eq!(body["backend"], json!("ok"));
    assert_eq!(body["name"], json!("anggaran"));
    Ok(())
}
