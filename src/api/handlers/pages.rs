//! Page context for the rendering layer. The guard has already run by the time
//! these handlers see a request, so a session extension means "allowed".

use axum::{
    extract::Extension,
    http::{StatusCode, Uri},
    response::{IntoResponse, Json},
};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::auth::{Permissions, Role, Session, User};

#[derive(Debug, Serialize, ToSchema)]
pub struct PageContext {
    pub path: String,
    pub user: Option<User>,
    pub role: Option<Role>,
    pub home: Option<String>,
    pub permissions: Option<Permissions>,
}

impl PageContext {
    #[must_use]
    pub fn new(path: &str, session: Option<Session>) -> Self {
        let role = session.as_ref().map(|session| session.user.role);
        Self {
            path: path.to_string(),
            user: session.map(|session| session.user),
            role,
            home: role.map(|role| role.home_path().to_string()),
            permissions: role.map(Role::permissions),
        }
    }
}

pub async fn page(uri: Uri, session: Option<Extension<Session>>) -> Json<PageContext> {
    Json(PageContext::new(
        uri.path(),
        session.map(|Extension(session)| session),
    ))
}

pub async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("No route for {}", uri.path()) })),
    )
}
