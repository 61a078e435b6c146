use actix_web::{web, HttpResponse, ResponseError};

use crate::middleware::auth::Claims;
use crate::models::{RefineRequest, RefineResponse, SearchRequest, SearchResponse, YearsResponse};
use crate::services::search_service;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/api/v1/search",
    tag = "Search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Search executed (may have zero rows)", body = SearchResponse),
        (status = 400, description = "Street or postal code missing"),
        (status = 401, description = "Missing or invalid session token"),
        (status = 403, description = "Free plan monthly limit reached"),
        (status = 502, description = "Data store failed; empty rows with error", body = SearchResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn search(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    request: web::Json<SearchRequest>,
) -> HttpResponse {
    log::info!("🔎 POST /search - user: {}", claims.email);

    match search_service::run_search(&state, &claims.sub, &claims.sid, request.into_inner()).await {
        Ok(response) if response.success => {
            log::info!("✅ Search returned {} rows for {}", response.count, claims.email);
            HttpResponse::Ok().json(response)
        }
        Ok(response) => HttpResponse::BadGateway().json(response),
        Err(e) => {
            log::warn!("❌ Search rejected for {}: {}", claims.email, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/search/refine",
    tag = "Search",
    request_body = RefineRequest,
    responses(
        (status = 200, description = "Filtered rows", body = RefineResponse),
        (status = 404, description = "No search in this session yet"),
        (status = 422, description = "Unknown column; original rows returned", body = RefineResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn refine(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    request: web::Json<RefineRequest>,
) -> HttpResponse {
    log::info!("🔎 POST /search/refine - column: {}", request.column);

    match search_service::refine_last_results(&state, &claims.sid, &request.column, &request.value) {
        Ok(response) if response.success => HttpResponse::Ok().json(response),
        Ok(response) => HttpResponse::UnprocessableEntity().json(response),
        Err(e) => {
            log::warn!("❌ Refine failed for {}: {}", claims.email, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/years",
    tag = "Search",
    responses(
        (status = 200, description = "Distinct transaction years", body = YearsResponse),
        (status = 502, description = "Data store failed; empty list with error", body = YearsResponse)
    )
)]
pub async fn get_years(state: web::Data<AppState>) -> HttpResponse {
    log::info!("📅 GET /years");

    match search_service::available_years(&state).await {
        (years, None) => HttpResponse::Ok().json(YearsResponse {
            success: true,
            years,
            error: None,
        }),
        (years, Some(e)) => HttpResponse::BadGateway().json(YearsResponse {
            success: false,
            years,
            error: Some(e.to_string()),
        }),
    }
}
