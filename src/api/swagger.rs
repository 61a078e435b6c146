use utoipa::OpenApi;
use utoipa::openapi::security::{SecurityScheme, HttpAuthScheme, HttpBuilder};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ITBI Search Service API",
        version = "1.0.0",
        description = "Consulta de transações imobiliárias (ITBI) de São Paulo.\n\n**Authentication:** search and profile endpoints require the session JWT issued by `/api/v1/auth/login` or the OAuth callback.\n\n**Features:**\n- Email/password and Google sign-in\n- Street / postal code / year search capped at 1000 rows\n- Secondary filter over the last result set\n- Monthly quota for the free plan\n- Health monitoring and metrics"
    ),
    paths(
        // Auth endpoints
        crate::api::auth::login,
        crate::api::auth::register,
        crate::api::auth::logout,
        crate::api::auth::oauth_start,
        crate::api::auth::callback,
        crate::api::auth::session,
        crate::api::auth::get_me,

        // Search
        crate::api::search::search,
        crate::api::search::refine,
        crate::api::search::get_years,

        // Health & Metrics
        crate::api::health::health_check,
        crate::api::metrics::get_metrics,
    ),
    components(
        schemas(
            // Auth
            crate::services::auth_service::LoginRequest,
            crate::services::auth_service::RegisterRequest,
            crate::services::auth_service::AuthResponse,
            crate::services::auth_service::OAuthUrlResponse,
            crate::services::auth_service::MeResponse,
            crate::api::auth::SessionResponse,
            crate::models::SessionIdentity,

            // Search
            crate::models::SearchRequest,
            crate::models::SearchResponse,
            crate::models::RefineRequest,
            crate::models::RefineResponse,
            crate::models::YearsResponse,

            // Health & Metrics
            crate::api::health::HealthResponse,
            crate::api::metrics::MetricsResponse,
        )
    ),
    tags(
        (name = "Auth", description = "Sign-in, registration, OAuth (PKCE) and session resolution."),
        (name = "Search", description = "ITBI transaction search, secondary filter and available years."),
        (name = "Health", description = "Health check and system metrics endpoints for monitoring service status."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Session token from /api/v1/auth/login"))
                        .build()
                ),
            );
        }
    }
}
