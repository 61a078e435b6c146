use crate::config::Config;
use crate::database::{IdentityProvider, ProfileStore, SupabaseClient, TransactionStore};
use crate::models::{SessionIdentity, TransactionQuery, TransactionRecord};
use crate::utils::{AppError, TtlCache};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Artefatos de callback e fluxos PKCE valem por 10 minutos
const CALLBACK_TTL: Duration = Duration::from_secs(600);

/// Sessões duram o mesmo que o token de sessão que as identifica
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Estado de uma sessão de navegador (o que sobrevive entre interações)
#[derive(Debug, Clone)]
pub struct SessionState {
    pub identity: SessionIdentity,
    /// Token do provedor, usado no logout. Vazio quando a sessão foi restaurada do JWT.
    pub provider_token: String,
    /// Resultado da última busca, base do filtro adicional
    pub last_results: Vec<TransactionRecord>,
}

struct StoredSession {
    state: SessionState,
    touched: Instant,
}

pub struct SessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<String, StoredSession>>,
    /// Sessões encerradas por logout; o JWT delas segue assinado até expirar
    revoked: TtlCache<String, ()>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SESSION_TTL)
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
            revoked: TtlCache::new(ttl),
        }
    }

    pub fn open(&self, identity: SessionIdentity, provider_token: String) -> String {
        let session_id = Uuid::new_v4().to_string();
        self.restore(&session_id, identity, provider_token);
        session_id
    }

    /// Recria a sessão (ex: após restart) sem apagar resultados existentes
    pub fn restore(&self, session_id: &str, identity: SessionIdentity, provider_token: String) {
        if let Ok(mut sessions) = self.sessions.lock() {
            let ttl = self.ttl;
            sessions.retain(|_, s| s.touched.elapsed() < ttl);
            sessions
                .entry(session_id.to_string())
                .and_modify(|s| {
                    s.state.identity = identity.clone();
                    s.touched = Instant::now();
                })
                .or_insert(StoredSession {
                    state: SessionState {
                        identity,
                        provider_token,
                        last_results: Vec::new(),
                    },
                    touched: Instant::now(),
                });
        }
    }

    /// Retoma a sessão de um token válido. Sessão encerrada por logout não volta.
    pub fn resume(&self, session_id: &str, identity: SessionIdentity) -> Result<(), AppError> {
        if self.revoked.get(&session_id.to_string()).is_some() {
            return Err(AppError::Auth("Session ended".to_string()));
        }
        if self.get(session_id).is_none() {
            log::info!("♻️  Restoring session {} for {}", session_id, identity.email);
            self.restore(session_id, identity, String::new());
        }
        Ok(())
    }

    pub fn get(&self, session_id: &str) -> Option<SessionState> {
        let mut sessions = self.sessions.lock().ok()?;
        match sessions.get(session_id) {
            Some(s) if s.touched.elapsed() < self.ttl => Some(s.state.clone()),
            Some(_) => {
                sessions.remove(session_id);
                None
            }
            None => None,
        }
    }

    pub fn set_results(&self, session_id: &str, rows: Vec<TransactionRecord>) {
        if let Ok(mut sessions) = self.sessions.lock() {
            if let Some(session) = sessions.get_mut(session_id) {
                session.state.last_results = rows;
                session.touched = Instant::now();
            }
        }
    }

    pub fn results(&self, session_id: &str) -> Option<Vec<TransactionRecord>> {
        self.get(session_id).map(|s| s.last_results)
    }

    /// Encerra a sessão e impede que o mesmo token a recrie
    pub fn close(&self, session_id: &str) -> Option<SessionState> {
        self.revoked.insert(session_id.to_string(), ());
        self.sessions.lock().ok()?.remove(session_id).map(|s| s.state)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }
}

/// Estado da aplicação, único dono de tudo que é compartilhado entre requisições.
pub struct AppState {
    pub config: Config,
    pub transactions: Arc<dyn TransactionStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub sessions: SessionStore,
    pub years_cache: TtlCache<(), Vec<i32>>,
    pub search_cache: TtlCache<TransactionQuery, Vec<TransactionRecord>>,
    /// Códigos/tokens de callback já trocados (nunca trocar duas vezes)
    pub consumed_artifacts: TtlCache<String, ()>,
    /// flow id -> code verifier PKCE
    pub pending_flows: TtlCache<String, String>,
}

impl AppState {
    pub fn new(
        config: Config,
        transactions: Arc<dyn TransactionStore>,
        profiles: Arc<dyn ProfileStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let cache_ttl = config.cache_ttl;
        Self {
            config,
            transactions,
            profiles,
            identity,
            sessions: SessionStore::default(),
            years_cache: TtlCache::new(cache_ttl),
            search_cache: TtlCache::new(cache_ttl),
            consumed_artifacts: TtlCache::new(CALLBACK_TTL),
            pending_flows: TtlCache::new(CALLBACK_TTL),
        }
    }

    pub fn with_supabase(config: Config, client: SupabaseClient) -> Self {
        let client = Arc::new(client);
        Self::new(config, client.clone(), client.clone(), client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> SessionIdentity {
        SessionIdentity {
            user_id: "u1".to_string(),
            email: "ana@exatas.com.br".to_string(),
            display_name: "Ana".to_string(),
        }
    }

    #[test]
    fn test_session_lifecycle() {
        let store = SessionStore::default();
        let sid = store.open(identity(), "provider-token".to_string());

        let mut row = TransactionRecord::new();
        row.insert("numero".to_string(), serde_json::json!("100"));
        store.set_results(&sid, vec![row]);

        assert_eq!(store.results(&sid).map(|r| r.len()), Some(1));
        assert_eq!(store.close(&sid).map(|s| s.provider_token), Some("provider-token".to_string()));
        assert!(store.get(&sid).is_none());
    }

    #[test]
    fn test_restore_keeps_results() {
        let store = SessionStore::default();
        let sid = store.open(identity(), String::new());
        store.set_results(&sid, vec![TransactionRecord::new()]);
        store.restore(&sid, identity(), String::new());
        assert_eq!(store.results(&sid).map(|r| r.len()), Some(1));
    }

    #[test]
    fn test_closed_session_is_not_resumed() {
        let store = SessionStore::default();
        let sid = store.open(identity(), "provider-token".to_string());
        store.close(&sid);

        assert!(matches!(store.resume(&sid, identity()), Err(AppError::Auth(_))));
        assert!(store.get(&sid).is_none());
    }

    #[test]
    fn test_resume_recreates_missing_session() {
        let store = SessionStore::default();
        assert!(store.resume("old-sid", identity()).is_ok());
        assert_eq!(store.get("old-sid").map(|s| s.identity), Some(identity()));
    }

    #[test]
    fn test_expired_sessions_are_dropped() {
        let store = SessionStore::new(Duration::from_millis(0));
        let sid = store.open(identity(), String::new());
        assert!(store.get(&sid).is_none());

        store.open(identity(), String::new());
        store.open(identity(), String::new());
        assert!(store.len() <= 1);
    }
}
