//! Fakes em memória para os testes de serviços e handlers.

use crate::config::{Config, JwtSettings};
use crate::database::{AuthSession, IdentityProvider, ProfileStore, SignUpOutcome, TransactionStore};
use crate::models::{ProviderUser, TransactionQuery, TransactionRecord, UserProfile};
use crate::state::AppState;
use crate::utils::AppError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: "3002".to_string(),
        supabase_url: "https://test.supabase.co".to_string(),
        supabase_key: "anon-key".to_string(),
        redirect_url: None,
        frontend_url: "http://localhost:3000".to_string(),
        jwt: JwtSettings {
            secret: "test-secret".to_string(),
            issuer: "itbi-search-service".to_string(),
            audience: "itbi-search-api".to_string(),
        },
        cache_ttl: Duration::from_secs(3600),
    }
}

pub fn test_state(store: Arc<InMemoryStore>) -> AppState {
    test_state_with_provider(store, Arc::new(FakeIdentityProvider::default()))
}

pub fn test_state_with_provider(store: Arc<InMemoryStore>, provider: Arc<FakeIdentityProvider>) -> AppState {
    AppState::new(test_config(), store.clone(), store, provider)
}

#[derive(Default)]
pub struct InMemoryStore {
    profiles: Mutex<HashMap<String, UserProfile>>,
    rows: Vec<TransactionRecord>,
    years: Vec<i32>,
    last_query: Mutex<Option<TransactionQuery>>,
    queries: AtomicUsize,
    rpcs: AtomicUsize,
    fail: AtomicBool,
}

impl InMemoryStore {
    pub fn with_profile(self, profile: UserProfile) -> Self {
        if let Ok(mut profiles) = self.profiles.lock() {
            profiles.insert(profile.id.clone(), profile);
        }
        self
    }

    pub fn with_rows(mut self, rows: Vec<TransactionRecord>) -> Self {
        self.rows = rows;
        self
    }

    pub fn with_years(mut self, years: Vec<i32>) -> Self {
        self.years = years;
        self
    }

    pub fn fail_queries(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn profile(&self, user_id: &str) -> Option<UserProfile> {
        self.profiles.lock().ok()?.get(user_id).cloned()
    }

    pub fn last_query(&self) -> Option<TransactionQuery> {
        self.last_query.lock().ok()?.clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn rpc_count(&self) -> usize {
        self.rpcs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionStore for InMemoryStore {
    async fn select_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<Vec<TransactionRecord>, AppError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_query.lock() {
            *last = Some(query.clone());
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Remote("connection refused".to_string()));
        }
        Ok(self.rows.iter().take(query.limit).cloned().collect())
    }

    async fn distinct_years(&self) -> Result<Vec<i32>, AppError> {
        self.rpcs.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Remote("rpc unavailable".to_string()));
        }
        Ok(self.years.clone())
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        Ok(self.profile(user_id))
    }

    async fn update_profile(&self, profile: &UserProfile) -> Result<(), AppError> {
        let mut profiles = self
            .profiles
            .lock()
            .map_err(|e| AppError::Remote(e.to_string()))?;
        profiles.insert(profile.id.clone(), profile.clone());
        Ok(())
    }
}

pub const VALID_EMAIL: &str = "ana@exatas.com.br";
pub const VALID_PASSWORD: &str = "segredo123";
pub const VALID_CODE: &str = "good-code";
pub const VALID_IMPLICIT_TOKEN: &str = "implicit-token";

/// Provedor falso: uma conta por senha, um código OAuth válido e um token implícito válido
#[derive(Default)]
pub struct FakeIdentityProvider {
    exchanges: AtomicUsize,
    sign_outs: AtomicUsize,
}

impl FakeIdentityProvider {
    pub fn exchange_count(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    pub fn sign_out_count(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }

    fn user(id: &str, email: &str) -> ProviderUser {
        ProviderUser {
            id: id.to_string(),
            email: Some(email.to_string()),
            user_metadata: serde_json::json!({ "full_name": "Ana Souza" }),
        }
    }

    fn session(access_token: &str, user: ProviderUser) -> AuthSession {
        AuthSession {
            access_token: access_token.to_string(),
            user,
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession, AppError> {
        if email == VALID_EMAIL && password == VALID_PASSWORD {
            Ok(Self::session("at-password", Self::user("u1", email)))
        } else {
            Err(AppError::Auth("Invalid login credentials".to_string()))
        }
    }

    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        _display_name: Option<&str>,
    ) -> Result<SignUpOutcome, AppError> {
        if email == VALID_EMAIL {
            return Err(AppError::Auth("User already registered".to_string()));
        }
        if email.starts_with("confirm") {
            return Ok(SignUpOutcome::ConfirmationRequired(Self::user("u9", email)));
        }
        Ok(SignUpOutcome::SignedIn(Self::session("at-signup", Self::user("u2", email))))
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), AppError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<ProviderUser, AppError> {
        if access_token == VALID_IMPLICIT_TOKEN {
            Ok(Self::user("u1", VALID_EMAIL))
        } else {
            Err(AppError::Auth("invalid JWT".to_string()))
        }
    }

    async fn exchange_code_for_session(
        &self,
        auth_code: &str,
        _code_verifier: &str,
    ) -> Result<AuthSession, AppError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        if auth_code == VALID_CODE {
            Ok(Self::session("at-oauth", Self::user("u1", VALID_EMAIL)))
        } else {
            Err(AppError::Auth("invalid flow state".to_string()))
        }
    }

    fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> String {
        format!(
            "https://test.supabase.co/auth/v1/authorize?provider={}&redirect_to={}&code_challenge={}",
            provider,
            urlencoding::encode(redirect_to),
            code_challenge
        )
    }
}
