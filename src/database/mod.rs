pub mod gotrue;

use crate::config::Config;
use crate::models::{
    ProfileQuotaUpdate, TransactionQuery, TransactionRecord, UserProfile, DISTINCT_YEARS_RPC,
};
use crate::utils::AppError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

pub use gotrue::*;

const PROFILES_TABLE: &str = "profiles";

/// Leitura da tabela de transações e RPC de anos.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn select_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<Vec<TransactionRecord>, AppError>;

    async fn distinct_years(&self) -> Result<Vec<i32>, AppError>;
}

/// Leitura/atualização do perfil (plano + contador de buscas).
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, AppError>;

    async fn update_profile(&self, profile: &UserProfile) -> Result<(), AppError>;
}

#[derive(Debug, Deserialize)]
struct YearRow {
    ano: i32,
}

/// Cliente HTTP para o Supabase (PostgREST em `/rest/v1`, GoTrue em `/auth/v1`)
#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SupabaseClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.supabase_url.clone(),
            api_key: config.supabase_key.clone(),
        })
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, path)
    }

    pub(crate) fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    /// Requisição já com `apikey` e `Authorization` da chave do projeto
    fn rest(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.rest_url(path))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "application/json")
    }

    pub(crate) fn auth(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.auth_url(path))
            .header("apikey", &self.api_key)
            .header("Accept", "application/json")
    }
}

/// Converte status não-2xx em `AppError::Remote` com o corpo da resposta
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    context: &str,
) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AppError::Remote(format!("{} failed ({}): {}", context, status, body)))
}

#[async_trait]
impl TransactionStore for SupabaseClient {
    async fn select_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<Vec<TransactionRecord>, AppError> {
        log::debug!("🔎 GET {} {:?}", query.table, query.to_query_pairs());

        let response = self
            .rest(reqwest::Method::GET, query.table)
            .query(&query.to_query_pairs())
            .send()
            .await?;

        let rows: Vec<TransactionRecord> = ensure_success(response, "Transaction query")
            .await?
            .json()
            .await
            .map_err(|e| AppError::Remote(format!("Failed to parse transactions: {}", e)))?;

        Ok(rows)
    }

    async fn distinct_years(&self) -> Result<Vec<i32>, AppError> {
        let response = self
            .rest(reqwest::Method::POST, &format!("rpc/{}", DISTINCT_YEARS_RPC))
            .json(&serde_json::json!({}))
            .send()
            .await?;

        let rows: Vec<YearRow> = ensure_success(response, "Distinct years RPC")
            .await?
            .json()
            .await
            .map_err(|e| AppError::Remote(format!("Failed to parse years: {}", e)))?;

        Ok(rows.into_iter().map(|row| row.ano).collect())
    }
}

#[async_trait]
impl ProfileStore for SupabaseClient {
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        let response = self
            .rest(reqwest::Method::GET, PROFILES_TABLE)
            .query(&[("select", "*".to_string()), ("id", format!("eq.{}", user_id))])
            .send()
            .await?;

        let mut profiles: Vec<UserProfile> = ensure_success(response, "Profile read")
            .await?
            .json()
            .await
            .map_err(|e| AppError::Remote(format!("Failed to parse profile: {}", e)))?;

        Ok(profiles.pop())
    }

    async fn update_profile(&self, profile: &UserProfile) -> Result<(), AppError> {
        let response = self
            .rest(reqwest::Method::PATCH, PROFILES_TABLE)
            .query(&[("id", format!("eq.{}", profile.id))])
            .header("Prefer", "return=minimal")
            .json(&ProfileQuotaUpdate::from(profile))
            .send()
            .await?;

        ensure_success(response, "Profile update").await?;
        Ok(())
    }
}
