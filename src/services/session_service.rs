//! Resolução de identidade a cada ativação da página.
//!
//! Estados: anônimo, callback pendente (o provedor redirecionou de volta com
//! um código ou token) e autenticado. Um artefato de callback é trocado uma
//! única vez: ele é reservado em `consumed_artifacts` antes da troca, e uma
//! nova entrega do mesmo artefato nunca chega ao provedor. A resposta a um
//! callback sempre redireciona para a URL limpa do frontend, sem os parâmetros.

use crate::database::AuthSession;
use crate::models::SessionIdentity;
use crate::services::auth_service;
use crate::state::AppState;
use crate::utils::AppError;
use serde::Deserialize;

/// Parâmetros recebidos na URL de retorno do provedor
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackParams {
    /// Código de autorização (fluxo PKCE)
    pub code: Option<String>,
    /// Token do provedor (fluxo implícito)
    pub access_token: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    /// Id do fluxo emitido por `/api/v1/auth/oauth`
    pub flow: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallbackArtifact {
    /// Fluxo authorization code + PKCE
    Code { code: String, flow: Option<String> },
    /// Fluxo implícito
    AccessToken(String),
    /// O provedor devolveu erro no lugar do artefato
    ProviderError(String),
}

impl CallbackArtifact {
    pub fn from_params(params: &CallbackParams) -> Option<Self> {
        let non_empty = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);

        if let Some(error) = non_empty(&params.error) {
            let message = non_empty(&params.error_description).unwrap_or(error);
            return Some(CallbackArtifact::ProviderError(message));
        }
        if let Some(code) = non_empty(&params.code) {
            return Some(CallbackArtifact::Code {
                code,
                flow: non_empty(&params.flow),
            });
        }
        non_empty(&params.access_token).map(CallbackArtifact::AccessToken)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateState {
    Anonymous,
    PendingCallback(CallbackArtifact),
    Authenticated(SessionIdentity),
}

impl GateState {
    /// Um artefato na URL leva a "callback pendente"; sem artefato, a identidade
    /// vem só do token de sessão (resolvido depois).
    pub fn on_activation(params: &CallbackParams) -> Self {
        match CallbackArtifact::from_params(params) {
            Some(artifact) => GateState::PendingCallback(artifact),
            None => GateState::Anonymous,
        }
    }

    #[cfg(test)]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, GateState::Authenticated(_))
    }
}

/// Resultado de uma ativação
#[derive(Debug)]
pub struct Activation {
    pub state: GateState,
    /// Token de sessão novo (só quando um callback acabou de ser trocado)
    pub token: Option<String>,
    pub error: Option<AppError>,
    /// Os parâmetros de callback devem sair da URL (redirect para a URL limpa)
    pub strip_params: bool,
}

impl Activation {
    fn anonymous(error: Option<AppError>, strip_params: bool) -> Self {
        Self {
            state: GateState::Anonymous,
            token: None,
            error,
            strip_params,
        }
    }
}

/// Determina a identidade atual a partir dos parâmetros da URL e do token de sessão.
pub async fn activate(state: &AppState, params: &CallbackParams, bearer: Option<&str>) -> Activation {
    match GateState::on_activation(params) {
        GateState::PendingCallback(artifact) => complete_callback(state, artifact, bearer).await,
        _ => restore_session(state, bearer),
    }
}

/// Reserva o artefato; `false` se ele já foi trocado antes
fn claim(state: &AppState, key: String) -> bool {
    state.consumed_artifacts.insert_if_absent(key, ())
}

async fn complete_callback(
    state: &AppState,
    artifact: CallbackArtifact,
    bearer: Option<&str>,
) -> Activation {
    let exchanged: Result<AuthSession, AppError> = match artifact {
        CallbackArtifact::ProviderError(message) => {
            log::warn!("❌ OAuth provider returned error: {}", message);
            return Activation::anonymous(Some(AppError::Auth(message)), true);
        }
        CallbackArtifact::Code { code, flow } => {
            if !claim(state, format!("code:{}", code)) {
                return replayed(state, bearer);
            }
            match flow.and_then(|flow| state.pending_flows.take(&flow)) {
                Some(verifier) => state.identity.exchange_code_for_session(&code, &verifier).await,
                None => Err(AppError::Auth("Login flow expired or unknown".to_string())),
            }
        }
        CallbackArtifact::AccessToken(access_token) => {
            if !claim(state, format!("token:{}", access_token)) {
                return replayed(state, bearer);
            }
            state
                .identity
                .get_user(&access_token)
                .await
                .map(|user| AuthSession {
                    access_token,
                    user,
                })
        }
    };

    match exchanged.and_then(|session| auth_service::open_session(state, session)) {
        Ok((identity, token)) => {
            log::info!("✅ OAuth callback completed for {}", identity.email);
            Activation {
                state: GateState::Authenticated(identity),
                token: Some(token),
                error: None,
                strip_params: true,
            }
        }
        Err(e) => {
            log::warn!("❌ OAuth callback failed: {}", e);
            Activation::anonymous(Some(e), true)
        }
    }
}

/// Artefato repetido (re-render): nenhuma troca, só limpa a URL e segue com a sessão atual
fn replayed(state: &AppState, bearer: Option<&str>) -> Activation {
    log::debug!("↩️  Callback artifact already consumed, skipping exchange");
    let mut activation = restore_session(state, bearer);
    activation.strip_params = true;
    activation
}

/// Restaura a sessão a partir do token. Token inválido limpa a sessão.
fn restore_session(state: &AppState, bearer: Option<&str>) -> Activation {
    let Some(token) = bearer else {
        return Activation::anonymous(None, false);
    };

    let resumed = auth_service::verify_token(&state.config.jwt, token).and_then(|claims| {
        let identity = claims.identity();
        state.sessions.resume(&claims.sid, identity.clone())?;
        Ok(identity)
    });

    match resumed {
        Ok(identity) => Activation {
            state: GateState::Authenticated(identity),
            token: None,
            error: None,
            strip_params: false,
        },
        Err(e) => {
            log::warn!("⚠️  Stored session rejected: {}", e);
            Activation::anonymous(Some(e), false)
        }
    }
}
