//! Signed session cookie codec.
//!
//! Wire format: `base64url(json) "." base64url(hmac_sha256(secret, base64url(json)))`,
//! both parts unpadded. The JSON is readable by the client; the tag makes it
//! tamper-evident. Expiry lives inside the signed payload, so a client cannot
//! extend its own session.

use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

use super::user::User;

pub const SESSION_COOKIE_NAME: &str = "session";

/// Shortest accepted signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Longest accepted session lifetime: one year.
pub const MAX_SESSION_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session secret must be at least {MIN_SECRET_LEN} bytes")]
    WeakSecret,
    #[error("invalid session format")]
    Format,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid session signature")]
    Signature,
    #[error("invalid session json")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: User,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Backend token issued at login, replayed on proxied calls for this user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_token: Option<String>,
}

impl Session {
    #[must_use]
    pub fn new(user: User, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            user,
            expires_at: now
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            created_at: now,
            upstream_token: None,
        }
    }

    #[must_use]
    pub fn with_upstream_token(mut self, token: Option<String>) -> Self {
        self.upstream_token = token.filter(|token| !token.trim().is_empty());
        self
    }

    /// A session is expired once `now` reaches `expires_at`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Encodes and verifies session values with a shared HMAC key.
#[derive(Clone)]
pub struct SessionCodec {
    mac: HmacSha256,
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec").field("mac", &"***").finish()
    }
}

impl SessionCodec {
    /// # Errors
    /// Returns `SessionError::WeakSecret` when the secret is shorter than
    /// `MIN_SECRET_LEN` bytes.
    pub fn new(secret: SecretString) -> Result<Self, SessionError> {
        let key = secret.expose_secret().as_bytes();
        if key.len() < MIN_SECRET_LEN {
            return Err(SessionError::WeakSecret);
        }
        let mac = <HmacSha256 as Mac>::new_from_slice(key).map_err(|_| SessionError::WeakSecret)?;
        Ok(Self { mac })
    }

    /// Serialize and sign a session.
    ///
    /// # Errors
    /// Returns an error if the session cannot be serialized.
    pub fn encode(&self, session: &Session) -> Result<String, SessionError> {
        let json = serde_json::to_vec(session)?;
        let payload = Base64UrlUnpadded::encode_string(&json);
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        let tag = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());
        Ok(format!("{payload}.{tag}"))
    }

    /// Verify and deserialize a session value. Expiry is not checked here.
    ///
    /// # Errors
    /// Returns an error for malformed values, bad signatures, or invalid JSON.
    pub fn decode(&self, value: &str) -> Result<Session, SessionError> {
        let (payload, tag) = value.trim().rsplit_once('.').ok_or(SessionError::Format)?;
        if payload.is_empty() || tag.is_empty() {
            return Err(SessionError::Format);
        }
        let tag = Base64UrlUnpadded::decode_vec(tag).map_err(|_| SessionError::Base64)?;
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.verify_slice(&tag).map_err(|_| SessionError::Signature)?;
        let json = Base64UrlUnpadded::decode_vec(payload).map_err(|_| SessionError::Base64)?;
        Ok(serde_json::from_slice(&json)?)
    }

    /// Resolve a raw value into a live session. Every failure, expiry included,
    /// means "no session".
    #[must_use]
    pub fn open(&self, value: &str, now: DateTime<Utc>) -> Option<Session> {
        match self.decode(value) {
            Ok(session) if session.is_expired(now) => {
                debug!(user_id = session.user.id, "session expired");
                None
            }
            Ok(session) => Some(session),
            Err(err) => {
                debug!("rejected session value: {err}");
                None
            }
        }
    }

    /// Extract the session value from the request and open it.
    #[must_use]
    pub fn from_headers(&self, headers: &HeaderMap, now: DateTime<Utc>) -> Option<Session> {
        let token = extract_session_token(headers)?;
        self.open(&token, now)
    }
}

/// Build the `Set-Cookie` value carrying a signed session.
///
/// # Errors
/// Returns an error if the value contains bytes not allowed in a header.
pub fn session_cookie(
    value: &str,
    ttl_seconds: i64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Build the `Set-Cookie` value that removes the session cookie.
///
/// # Errors
/// Returns an error if the header value cannot be built.
pub fn clear_session_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Session value from `Authorization: Bearer` or, failing that, the `session` cookie.
#[must_use]
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let Some((key, val)) = pair.trim().split_once('=') else {
                continue;
            };
            if key.trim() == SESSION_COOKIE_NAME && !val.trim().is_empty() {
                return Some(val.trim().to_string());
            }
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
