use axum::response::Json;
use utoipa::OpenApi;

use super::handlers::{
    auth, dashboards, health, locations, marketing_fee, pages, recommendations, reports,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::login,
        auth::register,
        auth::session,
        auth::logout,
        reports::list,
        reports::create,
        reports::remove,
        recommendations::get,
        recommendations::create,
        marketing_fee::get,
        marketing_fee::submit,
        dashboards::scoped,
        dashboards::summary,
        locations::areas,
        locations::regions,
        locations::branches,
        locations::clusters,
        locations::poin_types,
    ),
    components(
        schemas(
            health::Health,
            auth::LoginRequest,
            auth::LoginResponse,
            auth::SessionResponse,
            crate::backend::RegisterRequest,
            reports::CreateReport,
            recommendations::CreateRecommendation,
            marketing_fee::SubmitMarketingFee,
            dashboards::DashboardSummary,
            dashboards::ScopeRef,
            pages::PageContext,
            crate::budget::UsageSummary,
            crate::budget::SectorUsage,
        )
    ),
    tags(
        (name = "health", description = "Liveness and backend reachability"),
        (name = "auth", description = "Login, registration and the signed session"),
        (name = "reports", description = "Expense evidence"),
        (name = "recommendations", description = "Recommended budget per cluster, poin and month"),
        (name = "marketing-fee", description = "Monthly budget ceiling per cluster"),
        (name = "dashboard", description = "Role-scoped usage aggregates"),
        (name = "locations", description = "Organizational lookups for registration"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi())
}
