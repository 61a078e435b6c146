use actix_web::HttpResponse;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static SEARCH_COUNT: AtomicU64 = AtomicU64::new(0);
static BLOCKED_SEARCH_COUNT: AtomicU64 = AtomicU64::new(0);
static REMOTE_ERROR_COUNT: AtomicU64 = AtomicU64::new(0);

/// Busca executada com sucesso (inclui cache)
pub fn increment_search_count() {
    SEARCH_COUNT.fetch_add(1, Ordering::Relaxed);
}

/// Busca barrada pelo limite do plano gratuito
pub fn increment_blocked_search_count() {
    BLOCKED_SEARCH_COUNT.fetch_add(1, Ordering::Relaxed);
}

pub fn increment_remote_error_count() {
    REMOTE_ERROR_COUNT.fetch_add(1, Ordering::Relaxed);
}

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct MetricsResponse {
    pub itbi_searches_total: u64,
    pub itbi_searches_blocked_total: u64,
    pub itbi_remote_errors_total: u64,
}

fn render(searches: u64, blocked: u64, remote_errors: u64) -> String {
    format!(
        "# HELP itbi_searches_total Total number of executed searches\n\
         # TYPE itbi_searches_total counter\n\
         itbi_searches_total {}\n\
         \n\
         # HELP itbi_searches_blocked_total Searches blocked by the free plan quota\n\
         # TYPE itbi_searches_blocked_total counter\n\
         itbi_searches_blocked_total {}\n\
         \n\
         # HELP itbi_remote_errors_total Failed calls to the data store\n\
         # TYPE itbi_remote_errors_total counter\n\
         itbi_remote_errors_total {}\n",
        searches, blocked, remote_errors
    )
}

#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Health",
    responses(
        (status = 200, description = "Service metrics (Prometheus text format)", body = MetricsResponse)
    )
)]
pub async fn get_metrics() -> HttpResponse {
    let metrics = render(
        SEARCH_COUNT.load(Ordering::Relaxed),
        BLOCKED_SEARCH_COUNT.load(Ordering::Relaxed),
        REMOTE_ERROR_COUNT.load(Ordering::Relaxed),
    );

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_prometheus_text() {
        let text = render(7, 2, 1);
        assert!(text.contains("itbi_searches_total 7\n"));
        assert!(text.contains("itbi_searches_blocked_total 2\n"));
        assert!(text.contains("# TYPE itbi_remote_errors_total counter"));
    }
}
