use crate::api::metrics;
use crate::models::{
    RefineResponse, SearchFilter, SearchRequest, SearchResponse, TransactionQuery,
    TransactionRecord, RESULT_CAP,
};
use crate::services::{presenter_service, quota_service};
use crate::state::AppState;
use crate::utils::AppError;
use chrono::Utc;

/// Resultado de uma leitura: "zero linhas" e "falha" só se distinguem pelo `error`
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub rows: Vec<TransactionRecord>,
    pub error: Option<AppError>,
}

pub const NO_RESULTS_MESSAGE: &str = "Nenhum resultado encontrado para os filtros informados.";

/// Executa a leitura limitada (com cache). Falhas viram lista vazia + erro.
pub async fn execute_query(state: &AppState, query: &TransactionQuery) -> SearchOutcome {
    if let Some(rows) = state.search_cache.get(query) {
        log::debug!("📦 Using cached search result ({} rows)", rows.len());
        return SearchOutcome { rows, error: None };
    }

    match state.transactions.select_transactions(query).await {
        Ok(rows) => {
            state.search_cache.insert(query.clone(), rows.clone());
            SearchOutcome { rows, error: None }
        }
        Err(e) => {
            log::error!("❌ Transaction query failed: {}", e);
            metrics::increment_remote_error_count();
            SearchOutcome {
                rows: Vec::new(),
                error: Some(e),
            }
        }
    }
}

/// Busca completa: valida, checa cota, consulta, contabiliza e guarda na sessão.
pub async fn run_search(
    state: &AppState,
    user_id: &str,
    session_id: &str,
    request: SearchRequest,
) -> Result<SearchResponse, AppError> {
    let filter = SearchFilter::from(request);
    let query = TransactionQuery::from_filter(&filter);
    // Sem predicado a leitura varreria a tabela inteira
    if !filter.has_required_field() || query.predicates.is_empty() {
        return Err(AppError::InvalidInput(
            "Por favor, preencha o campo 'Nome da Rua' ou 'CEP'.".to_string(),
        ));
    }

    let today = Utc::now().date_naive();
    let mut decision = quota_service::check(state.profiles.as_ref(), user_id, today).await?;
    if !decision.allowed {
        metrics::increment_blocked_search_count();
        return Err(AppError::QuotaExceeded(format!(
            "Limite de {} buscas mensais do plano gratuito atingido.",
            quota_service::FREE_MONTHLY_LIMIT
        )));
    }

    let outcome = execute_query(state, &query).await;

    let mut warning = None;
    if outcome.error.is_none() {
        metrics::increment_search_count();
        if let Err(e) = quota_service::consume(state.profiles.as_ref(), &mut decision.profile).await {
            log::error!("❌ Failed to record search for {}: {}", user_id, e);
            warning = Some(format!("Não foi possível atualizar o contador de buscas: {}", e));
        }
    }

    state.sessions.set_results(session_id, outcome.rows.clone());

    let count = outcome.rows.len();
    let message = match &outcome.error {
        Some(e) => format!("Ocorreu um erro durante a busca: {}", e),
        None if count == 0 => NO_RESULTS_MESSAGE.to_string(),
        None => format!("Busca encontrou {} resultados (limitado a {}).", count, RESULT_CAP),
    };

    Ok(SearchResponse {
        success: outcome.error.is_none(),
        count,
        capped: count >= RESULT_CAP,
        message,
        columns: presenter_service::columns(&outcome.rows),
        rows: presenter_service::format_rows(&outcome.rows),
        remaining_searches: quota_service::remaining(&decision.profile),
        error: outcome.error.map(|e| e.to_string()),
        warning,
    })
}

/// Filtro adicional sobre o último resultado da sessão. Coluna inválida
/// devolve o conjunto original junto com o erro.
pub fn refine_last_results(
    state: &AppState,
    session_id: &str,
    column: &str,
    fragment: &str,
) -> Result<RefineResponse, AppError> {
    let rows = state
        .sessions
        .results(session_id)
        .filter(|rows| !rows.is_empty())
        .ok_or_else(|| AppError::NotFound("Nenhuma busca realizada nesta sessão.".to_string()))?;

    match presenter_service::refine(&rows, column, fragment) {
        Ok(filtered) => Ok(RefineResponse {
            success: true,
            count: filtered.len(),
            message: format!("Exibindo {} resultados após o filtro adicional.", filtered.len()),
            rows: presenter_service::format_rows(&filtered),
            error: None,
        }),
        Err(e) => {
            log::warn!("⚠️  Refine failed: {}", e);
            Ok(RefineResponse {
                success: false,
                count: rows.len(),
                message: format!("Erro ao aplicar filtro: {}", e),
                rows: presenter_service::format_rows(&rows),
                error: Some(e.to_string()),
            })
        }
    }
}

/// Anos distintos via RPC (cache de 1h). Falha devolve lista vazia + erro.
pub async fn available_years(state: &AppState) -> (Vec<i32>, Option<AppError>) {
    if let Some(years) = state.years_cache.get(&()) {
        log::debug!("📦 Using cached years ({})", years.len());
        return (years, None);
    }

    match state.transactions.distinct_years().await {
        Ok(mut years) => {
            years.sort_unstable();
            years.dedup();
            state.years_cache.insert((), years.clone());
            (years, None)
        }
        Err(e) => {
            log::error!("❌ Failed to fetch years: {}", e);
            metrics::increment_remote_error_count();
            (Vec::new(), Some(e))
        }
    }
}
