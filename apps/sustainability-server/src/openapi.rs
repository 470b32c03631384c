use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Sustainability Dashboard API",
        description = "Meter readings, KPI summaries and insights for the sustainability dashboard."
    ),
    paths(
        crate::routes::health::healthz_handler,
        crate::routes::auth::login,
        crate::routes::auth::profile,
        crate::routes::auth::update_profile,
        crate::routes::auth::change_password,
        crate::routes::users::register,
        crate::routes::users::list_users,
        crate::routes::kpi::summary,
        crate::routes::kpi::export_summary,
        crate::routes::kpi::insights,
    ),
    components(schemas(
        crate::routes::health::HealthResponse,
        crate::routes::auth::LoginRequest,
        crate::routes::auth::LoginResponse,
        crate::routes::auth::ProfileUpdateRequest,
        crate::routes::auth::ChangePasswordRequest,
        crate::routes::users::RegisterRequest,
        crate::routes::kpi::SummaryResponse,
        crate::routes::kpi::InsightsResponse,
        crate::routes::kpi::AppliedFilters,
        crate::routes::kpi::TimeSeriesPoint,
        crate::routes::kpi::Hotspots,
        crate::models::UserResponse,
        crate::models::UserRole,
        crate::models::MetricType,
        crate::models::QualityFlag,
        crate::models::TrendDirection,
        crate::services::kpi::KpiSummary,
        crate::services::kpi::HotspotData,
        crate::services::kpi::AnomalyData,
        crate::services::kpi::BucketInterval,
        crate::time::DateRangeKind,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Login and account self-service"),
        (name = "users", description = "User administration"),
        (name = "kpi", description = "KPI summaries and insights")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "HTTPBearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn openapi_json() -> serde_json::Value {
    serde_json::to_value(ApiDoc::openapi()).unwrap_or_else(|err| {
        tracing::error!(error = %err, "failed to serialize openapi document");
        serde_json::Value::Null
    })
}

async fn openapi_handler() -> Json<serde_json::Value> {
    Json(openapi_json())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_handler))
}
