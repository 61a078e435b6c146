use serde::{Deserialize, Serialize};
use crate::utils::{digits_only, normalize_street};
use std::collections::BTreeSet;

/// Linha da tabela de transações. O formato pertence ao Supabase; aqui só
/// conhecemos as colunas usadas nos filtros e na formatação.
pub type TransactionRecord = serde_json::Map<String, serde_json::Value>;

pub const TRANSACTIONS_TABLE: &str = "transacoes_imobiliarias";
pub const DISTINCT_YEARS_RPC: &str = "get_distinct_anos";

pub const COLUMN_YEAR: &str = "ano_transacao";
pub const COLUMN_STREET: &str = "nome_do_logradouro";
pub const COLUMN_NUMBER: &str = "numero";
pub const COLUMN_POSTAL_CODE: &str = "cep";
pub const COLUMN_AMOUNT: &str = "valor_de_transacao_declarado_pelo_contribuinte";
pub const COLUMN_DATE: &str = "data_de_transacao";

/// Limite de linhas por busca (política, não paginação)
pub const RESULT_CAP: usize = 1000;

/// Filtros de uma busca. Criado a cada requisição, nunca persistido.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub street: Option<String>,
    pub house_number: Option<String>,
    pub postal_code: Option<String>,
    pub years: BTreeSet<i32>,
}

impl SearchFilter {
    /// Rua ou CEP precisa sobreviver à normalização para a busca ser disparada.
    /// CEP sem dígitos ou rua só com espaços não contam.
    pub fn has_required_field(&self) -> bool {
        let street = self
            .street
            .as_deref()
            .is_some_and(|s| !normalize_street(s).is_empty());
        let postal_code = self
            .postal_code
            .as_deref()
            .is_some_and(|s| !digits_only(s).is_empty());
        street || postal_code
    }
}

/// Corpo do `POST /api/v1/search`
#[derive(Debug, Clone, Default, Deserialize, Serialize, utoipa::ToSchema)]
pub struct SearchRequest {
    pub street: Option<String>,
    pub house_number: Option<String>,
    pub postal_code: Option<String>,
    #[serde(default)]
    pub years: Vec<i32>,
}

impl From<SearchRequest> for SearchFilter {
    fn from(request: SearchRequest) -> Self {
        SearchFilter {
            street: request.street,
            house_number: request.house_number,
            postal_code: request.postal_code,
            years: request.years.into_iter().collect(),
        }
    }
}

/// Corpo do `POST /api/v1/search/refine`
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct RefineRequest {
    pub column: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SearchResponse {
    pub success: bool,
    pub count: usize,
    /// `true` quando a busca atingiu o limite de 1000 linhas
    pub capped: bool,
    pub message: String,
    pub columns: Vec<String>,
    #[schema(value_type = Vec<Object>)]
    pub rows: Vec<TransactionRecord>,
    /// `None` para o plano profissional
    pub remaining_searches: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RefineResponse {
    pub success: bool,
    pub count: usize,
    pub message: String,
    #[schema(value_type = Vec<Object>)]
    pub rows: Vec<TransactionRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct YearsResponse {
    pub success: bool,
    pub years: Vec<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
