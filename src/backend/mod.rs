//! HTTP client for the budget backend.
//!
//! Every call builds its headers from an explicit [`Credentials`] value; the
//! client itself carries no per-user state and can be shared across requests.

mod types;

pub use types::{LoginResponse, RegisterRequest};

use axum::http::{header::COOKIE, HeaderMap, StatusCode};
use reqwest::{
    header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, RequestBuilder, Response,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, instrument};
use url::Url;

use crate::auth::Session;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid backend url: {0}")]
    Url(#[from] url::ParseError),
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend responded with {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("unexpected backend response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Status to hand back to our own caller.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Status { status, .. } => *status,
            Self::Url(_) | Self::Transport(_) | Self::Decode(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Credentials attached to one backend call.
#[derive(Clone, Default)]
pub struct Credentials {
    bearer: Option<SecretString>,
    cookie: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("bearer", &self.bearer.as_ref().map(|_| "***"))
            .field("cookie", &self.cookie.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Credentials {
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Credentials for a caller: the backend token stored in its session plus
    /// the cookies it sent us, so cookie-authenticated backend views keep working.
    #[must_use]
    pub fn for_request(session: Option<&Session>, headers: &HeaderMap) -> Self {
        Self {
            bearer: session
                .and_then(|session| session.upstream_token.clone())
                .map(SecretString::from),
            cookie: headers
                .get(COOKIE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
                .filter(|value| !value.is_empty()),
        }
    }

    #[must_use]
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(SecretString::from(token.into()));
        self
    }

    #[must_use]
    pub fn has_bearer(&self) -> bool {
        self.bearer.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct Backend {
    client: Client,
    base_url: Url,
}

impl Backend {
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, BackendError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        credentials: &Credentials,
    ) -> Result<RequestBuilder, BackendError> {
        let url = self.url(path)?;
        let mut builder = self
            .client
            .request(method, url)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = &credentials.bearer {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token.expose_secret()));
        }
        if let Some(cookie) = &credentials.cookie {
            builder = builder.header(reqwest::header::COOKIE, cookie.as_str());
        }
        Ok(builder)
    }

    #[instrument(skip(self, credentials))]
    pub async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
        credentials: &Credentials,
    ) -> Result<Value, BackendError> {
        let response = self
            .request(Method::GET, path, credentials)?
            .query(query)
            .send()
            .await?;
        read_json(response).await
    }

    #[instrument(skip(self, body, credentials))]
    pub async fn post_json<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
        credentials: &Credentials,
    ) -> Result<Value, BackendError> {
        let response = self
            .request(Method::POST, path, credentials)?
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }

    #[instrument(skip(self, body, credentials))]
    pub async fn put_json<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
        credentials: &Credentials,
    ) -> Result<Value, BackendError> {
        let response = self
            .request(Method::PUT, path, credentials)?
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }

    #[instrument(skip(self, credentials))]
    pub async fn delete(&self, path: &str, credentials: &Credentials) -> Result<Value, BackendError> {
        let response = self
            .request(Method::DELETE, path, credentials)?
            .send()
            .await?;
        read_json(response).await
    }

    /// Verify a username/password pair against the backend.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, BackendError> {
        let body = serde_json::json!({ "username": username, "password": password });
        let value = self
            .post_json("api/user-login/", &body, &Credentials::anonymous())
            .await?;
        decode(value)
    }

    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register(&self, request: &RegisterRequest) -> Result<Value, BackendError> {
        self.post_json("api/user-register/", request, &Credentials::anonymous())
            .await
    }

    /// Ask the backend whether `cluster_id` belongs to `branch_id`.
    #[instrument(skip(self, credentials))]
    pub async fn check_cluster_access(
        &self,
        branch_id: i64,
        cluster_id: i64,
        credentials: &Credentials,
    ) -> Result<bool, BackendError> {
        let path = format!("api/admin/branch/{branch_id}/clusters/check-access/{cluster_id}/");
        let value = self.get_json(&path, &[], credentials).await?;
        value
            .get("hasAccess")
            .and_then(Value::as_bool)
            .ok_or_else(|| BackendError::Decode("missing hasAccess flag".to_string()))
    }
}

async fn read_json(response: Response) -> Result<Value, BackendError> {
    let status = StatusCode::from_u16(response.status().as_u16())
        .unwrap_or(StatusCode::BAD_GATEWAY);
    let bytes = response.bytes().await?;
    let body: Option<Value> = if bytes.is_empty() {
        None
    } else {
        serde_json::from_slice(&bytes).ok()
    };

    if status.is_success() {
        debug!(%status, "backend call succeeded");
        return body.map_or_else(
            || {
                if bytes.is_empty() {
                    Ok(Value::Null)
                } else {
                    Err(BackendError::Decode("response is not JSON".to_string()))
                }
            },
            Ok,
        );
    }

    let message = body
        .as_ref()
        .and_then(|value| {
            value
                .get("error")
                .or_else(|| value.get("message"))
                .and_then(Value::as_str)
        })
        .map_or_else(
            || status.canonical_reason().unwrap_or("backend error").to_string(),
            str::to_string,
        );
    error!(%status, %message, "backend call failed");
    Err(BackendError::Status { status, message })
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, BackendError> {
    serde_json::from_value(value).map_err(|err| BackendError::Decode(err.to_string()))
}
