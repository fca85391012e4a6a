use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderMap, HeaderName, HeaderValue, Method, Request,
    },
    middleware,
    routing::{delete, get, post, put},
    Extension, Router,
};
use chrono::Utc;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;

use crate::{
    auth::{Session, SessionCodec},
    backend::Backend,
};

pub mod error;
pub mod guard;
pub mod handlers;
pub mod openapi;
pub mod routes;

pub use error::ApiError;

/// Session cookie settings shared by the auth handlers.
#[derive(Clone, Copy, Debug)]
pub struct SessionSettings {
    pub ttl: chrono::Duration,
    pub cookie_secure: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl: chrono::Duration::hours(24),
            cookie_secure: false,
        }
    }
}

/// Immutable state shared by every request.
#[derive(Debug)]
pub struct AppState {
    pub codec: SessionCodec,
    pub backend: Backend,
    pub session: SessionSettings,
}

impl AppState {
    #[must_use]
    pub fn new(codec: SessionCodec, backend: Backend, session: SessionSettings) -> Self {
        Self {
            codec,
            backend,
            session,
        }
    }

    /// The caller's session, or `401`.
    ///
    /// # Errors
    /// Returns [`ApiError::Unauthorized`] when no valid, unexpired session is presented.
    pub fn require_session(&self, headers: &HeaderMap) -> Result<Session, ApiError> {
        self.codec
            .from_headers(headers, Utc::now())
            .ok_or(ApiError::Unauthorized)
    }
}

/// Build the gateway router: JSON API, page routes and the guard in front of them.
pub fn app(state: Arc<AppState>) -> Router {
    use handlers::{
        auth, dashboards, health, locations, marketing_fee, pages, recommendations, reports,
    };

    Router::new()
        .route("/health", get(health::health).options(health::health))
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/session", get(auth::session))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/reports", get(reports::list))
        .route("/api/reports/create", post(reports::create))
        .route("/api/reports/delete/:report_id", delete(reports::remove))
        .route("/api/recommendations/create", post(recommendations::create))
        .route(
            "/api/recommendations/:cluster_id/:poin_id",
            get(recommendations::get),
        )
        .route("/api/marketing-fee/submit", put(marketing_fee::submit))
        .route("/api/marketing-fee/:user_id", get(marketing_fee::get))
        .route("/api/dashboard/summary", get(dashboards::summary))
        .route("/api/dashboard/:level/:id", get(dashboards::scoped))
        .route("/api/locations/areas", get(locations::areas))
        .route("/api/locations/regions/:area_id", get(locations::regions))
        .route("/api/locations/branches/:region_id", get(locations::branches))
        .route("/api/locations/clusters/:branch_id", get(locations::clusters))
        .route("/api/poin-types", get(locations::poin_types))
        .route("/auth", get(pages::page))
        .route("/auth/*rest", get(pages::page))
        .route("/dashboard", get(pages::page))
        .route("/dashboard/*rest", get(pages::page))
        .fallback(pages::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), guard::guard))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, state: AppState, frontend_url: Option<&str>) -> Result<()> {
    let state = Arc::new(state);
    let mut app = app(state);

    if let Some(frontend_url) = frontend_url {
        let cors = CorsLayer::new()
            .allow_headers([CONTENT_TYPE, AUTHORIZATION])
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_origin(AllowOrigin::exact(frontend_origin(frontend_url)?))
            .allow_credentials(true);
        app = app.layer(cors);
    }

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Gracefully shutdown");
            }
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_url: &str) -> Result<HeaderValue> {
    let parsed =
        Url::parse(frontend_url).with_context(|| format!("Invalid frontend URL: {frontend_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Frontend URL must include a valid host: {frontend_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}
