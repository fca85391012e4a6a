//! Login, registration, session introspection and logout.

use axum::{
    extract::Extension,
    http::{
        header::{HeaderName, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

use super::{required, valid_email};
use crate::{
    api::{ApiError, AppState},
    auth::{
        session::{clear_session_cookie, session_cookie},
        Permissions, Role, Session, User,
    },
    backend::{BackendError, RegisterRequest},
};

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: User,
    pub role: Role,
    pub permissions: Permissions,
    pub home: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in; session cookie set", body = LoginResponse),
        (status = 400, description = "Missing username or password"),
        (status = 401, description = "Invalid credentials"),
        (status = 502, description = "Backend unavailable")
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    state: Extension<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = required("username", &request.username)?;
    if request.password.is_empty() {
        return Err(ApiError::BadRequest("password is required".to_string()));
    }

    let upstream = state.backend.login(username, &request.password).await?;
    let user = User::from_backend(upstream.user)
        .map_err(|err| ApiError::Backend(BackendError::Decode(err.to_string())))?;

    let session = Session::new(user, state.session.ttl, Utc::now())
        .with_upstream_token(upstream.token);
    let value = state
        .codec
        .encode(&session)
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    let cookie = session_cookie(
        &value,
        state.session.ttl.num_seconds(),
        state.session.cookie_secure,
    )
    .map_err(|err| ApiError::Internal(err.to_string()))?;

    let role = session.user.role;
    info!(user_id = session.user.id, %username, %role, "login succeeded");

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);

    let body = LoginResponse {
        role,
        permissions: role.permissions(),
        home: role.home_path().to_string(),
        expires_at: session.expires_at,
        created_at: session.created_at,
        user: session.user,
    };
    Ok((StatusCode::OK, headers, Json(body)))
}

/// Field-level checks done before the backend sees a registration.
fn validate_registration(request: &RegisterRequest) -> Result<(), ApiError> {
    let fields = [
        ("username", &request.username),
        ("email", &request.email),
        ("password", &request.password),
        ("confirm_password", &request.confirm_password),
        ("no_telp", &request.no_telp),
        ("area", &request.area),
        ("region", &request.region),
        ("branch", &request.branch),
        ("cluster", &request.cluster),
    ];
    for (field, value) in fields {
        required(field, value)?;
    }
    if request.password != request.confirm_password {
        return Err(ApiError::BadRequest("Passwords do not match".to_string()));
    }
    if !valid_email(request.email.trim()) {
        return Err(ApiError::BadRequest("Invalid email format".to_string()));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registration accepted by the backend"),
        (status = 400, description = "Invalid registration"),
        (status = 502, description = "Backend unavailable")
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn register(
    state: Extension<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_registration(&request)?;
    let body = state.backend.register(&request).await?;
    info!(username = %request.username, "registration forwarded");
    Ok((StatusCode::CREATED, Json(body)))
}

#[utoipa::path(
    get,
    path = "/api/auth/session",
    responses(
        (status = 200, description = "Current user, or null without a valid session", body = SessionResponse)
    ),
    tag = "auth"
)]
pub async fn session(state: Extension<Arc<AppState>>, headers: HeaderMap) -> Json<SessionResponse> {
    let session = state.codec.from_headers(&headers, Utc::now());
    Json(SessionResponse {
        expires_at: session.as_ref().map(|session| session.expires_at),
        user: session.map(|session| session.user),
    })
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Session cookie cleared")
    ),
    tag = "auth"
)]
pub async fn logout(state: Extension<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let cookie = clear_session_cookie(state.session.cookie_secure)
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    headers.insert(
        HeaderName::from_static("clear-site-data"),
        HeaderValue::from_static("\"cookies\", \"storage\""),
    );
    Ok((
        StatusCode::OK,
        headers,
        Json(json!({ "message": "Logged out successfully" })),
    ))
}
