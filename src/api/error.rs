use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::error;

use crate::backend::BackendError;

/// Handler error rendered as `{ "error": message }`.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Forbidden(String),
    BadRequest(String),
    Backend(BackendError),
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Backend(err) => err.status(),
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Unauthorized => "Unauthorized".to_string(),
            Self::Forbidden(message) | Self::BadRequest(message) => message.clone(),
            Self::Backend(BackendError::Status { message, .. }) => message.clone(),
            Self::Backend(_) => "Backend unavailable".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        Self::Backend(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Backend(err) => error!("Backend call failed: {err}"),
            Self::Internal(detail) => error!("Internal error: {detail}"),
            _ => {}
        }
        (self.status(), Json(json!({ "error": self.message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_and_message_mapping() {
        let err = ApiError::from(BackendError::Status {
            status: StatusCode::UNAUTHORIZED,
            message: "Invalid credentials".to_string(),
        });
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.message(), "Invalid credentials");

        let err = ApiError::from(BackendError::Decode("garbage".to_string()));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.message(), "Backend unavailable");

        let err = ApiError::Internal("codec exploded".to_string());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message().contains("codec"));
    }

    #[test]
    fn renders_json_error_body() {
        let response = ApiError::Forbidden("Only admin_area may do that".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
