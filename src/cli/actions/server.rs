use crate::{
    api::{self, AppState, SessionSettings},
    auth::{session::MAX_SESSION_TTL_SECONDS, SessionCodec},
    backend::Backend,
    cli::telemetry,
};
use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;
use std::time::Duration;
use tracing::{debug, info};

pub struct Args {
    pub port: u16,
    pub backend_url: String,
    pub backend_timeout_seconds: u64,
    pub session_secret: SecretString,
    pub session_ttl_seconds: i64,
    pub session_cookie_secure: bool,
    pub frontend_url: Option<String>,
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("port", &self.port)
            .field("backend_url", &self.backend_url)
            .field("backend_timeout_seconds", &self.backend_timeout_seconds)
            .field("session_secret", &"***")
            .field("session_ttl_seconds", &self.session_ttl_seconds)
            .field("session_cookie_secure", &self.session_cookie_secure)
            .field("frontend_url", &self.frontend_url)
            .finish()
    }
}

/// Build the shared state the router runs on.
///
/// # Errors
/// Returns an error if the session secret is too weak, the session TTL is out
/// of range or the backend URL is invalid.
pub fn build_state(args: &Args) -> Result<AppState> {
    if !(1..=MAX_SESSION_TTL_SECONDS).contains(&args.session_ttl_seconds) {
        return Err(anyhow!(
            "session TTL must be between 1 and {MAX_SESSION_TTL_SECONDS} seconds, got {}",
            args.session_ttl_seconds
        ));
    }
    let ttl = chrono::Duration::try_seconds(args.session_ttl_seconds)
        .context("Invalid session TTL")?;
    let codec = SessionCodec::new(args.session_secret.clone()).context("Invalid session secret")?;
    let backend = Backend::new(
        &args.backend_url,
        Duration::from_secs(args.backend_timeout_seconds),
    )
    .context("Failed to build backend client")?;
    let session = SessionSettings {
        ttl,
        cookie_secure: args.session_cookie_secure,
    };
    Ok(AppState::new(codec, backend, session))
}

/// Execute the server action.
/// # Errors
/// Returns an error if the state cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("startup args: {:?}", args);
    let state = build_state(&args)?;
    info!(backend = %state.backend.base_url(), "Backend configured");

    let result = api::new(args.port, state, args.frontend_url.as_deref()).await;

    telemetry::shutdown_tracer();

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(secret: &str, backend_url: &str) -> Args {
        Args {
            port: 8080,
            backend_url: backend_url.to_string(),
            backend_timeout_seconds: 5,
            session_secret: SecretString::from(secret.to_string()),
            session_ttl_seconds: 3600,
            session_cookie_secure: true,
            frontend_url: None,
        }
    }

    #[test]
    fn builds_state_from_args() {
        let state = build_state(&args(
            "0123456789abcdef0123456789abcdef",
            "http://backend:8000",
        ));
        assert!(state.is_ok());
        if let Ok(state) = state {
            assert_eq!(state.session.ttl.num_seconds(), 3600);
            assert!(state.session.cookie_secure);
            assert_eq!(state.backend.base_url().as_str(), "http://backend:8000/");
        }
    }

    #[test]
    fn rejects_bad_inputs() {
        assert!(build_state(&args("short", "http://backend:8000")).is_err());
        assert!(build_state(&args("0123456789abcdef0123456789abcdef", "nope")).is_err());
    }

    #[test]
    fn rejects_ttl_beyond_one_year() {
        let mut too_long = args("0123456789abcdef0123456789abcdef", "http://backend:8000");
        too_long.session_ttl_seconds = 10_000_000_000_000;
        assert!(matches!(
            build_state(&too_long),
            Err(ref err) if err.to_string().contains("session TTL")
        ));

        too_long.session_ttl_seconds = MAX_SESSION_TTL_SECONDS;
        assert!(build_state(&too_long).is_ok());
    }
}
