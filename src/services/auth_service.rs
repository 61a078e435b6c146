use crate::config::JwtSettings;
use crate::database::{AuthSession, SignUpOutcome};
use crate::models::SessionIdentity;
use crate::services::quota_service;
use crate::state::{AppState, SESSION_TTL};
use crate::utils::{pkce, AppError};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

// JWT Claims do token de sessão emitido por este serviço
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,           // user_id no provedor
    pub email: String,
    pub name: String,
    pub sid: String,           // id da sessão no SessionStore
    pub iat: usize,            // issued at
    pub exp: usize,            // expiration
    pub jti: String,           // JWT ID
    pub aud: String,           // audience
    pub iss: String,           // issuer
}

impl Claims {
    pub fn identity(&self) -> SessionIdentity {
        SessionIdentity {
            user_id: self.sub.clone(),
            email: self.email.clone(),
            display_name: self.name.clone(),
        }
    }
}

// Request/Response structures
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OAuthStartQuery {
    /// Provedor OAuth (padrão: google)
    pub provider: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    /// Ausente quando o cadastro aguarda confirmação de email
    pub token: Option<String>,
    pub user: SessionIdentity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct OAuthUrlResponse {
    pub success: bool,
    pub auth_url: String,
    pub flow: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct MeResponse {
    pub success: bool,
    pub user: SessionIdentity,
    pub plan: String,
    pub searches_used: u32,
    /// `None` para o plano profissional (sem limite)
    pub remaining_searches: Option<u32>,
    pub last_reset_date: String,
}

// Generate session token
pub fn generate_jwt(
    settings: &JwtSettings,
    identity: &SessionIdentity,
    session_id: &str,
) -> Result<String, AppError> {
    let iat = Utc::now().timestamp() as usize;
    let exp = (Utc::now() + Duration::seconds(SESSION_TTL.as_secs() as i64)).timestamp() as usize;

    let claims = Claims {
        sub: identity.user_id.clone(),
        email: identity.email.clone(),
        name: identity.display_name.clone(),
        sid: session_id.to_string(),
        iat,
        exp,
        jti: Uuid::new_v4().to_string(),
        aud: settings.audience.clone(),
        iss: settings.issuer.clone(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(settings.secret.as_ref()),
    )
    .map_err(|e| AppError::Auth(format!("Failed to generate token: {}", e)))
}

// Verify session token
pub fn verify_token(settings: &JwtSettings, token: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[settings.audience.clone()]);

    let mut issuers = HashSet::new();
    issuers.insert(settings.issuer.clone());
    validation.iss = Some(issuers);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.secret.as_ref()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Auth(format!("Invalid token: {}", e)))
}

/// Abre a sessão local para uma sessão do provedor e emite o token
pub fn open_session(state: &AppState, session: AuthSession) -> Result<(SessionIdentity, String), AppError> {
    let identity = SessionIdentity::from(session.user);
    let session_id = state.sessions.open(identity.clone(), session.access_token);
    let token = generate_jwt(&state.config.jwt, &identity, &session_id)?;
    Ok((identity, token))
}

// User login (email/senha)
pub async fn login(state: &AppState, request: &LoginRequest) -> Result<AuthResponse, AppError> {
    let session = state
        .identity
        .sign_in_with_password(request.email.trim(), &request.password)
        .await?;

    let (user, token) = open_session(state, session)?;

    Ok(AuthResponse {
        success: true,
        token: Some(token),
        user,
        message: None,
    })
}

// User registration
pub async fn register(state: &AppState, request: &RegisterRequest) -> Result<AuthResponse, AppError> {
    let email = request.email.trim();
    if email.is_empty() || request.password.is_empty() {
        return Err(AppError::InvalidInput("Email and password are required".to_string()));
    }

    match state
        .identity
        .sign_up(email, &request.password, request.name.as_deref())
        .await?
    {
        SignUpOutcome::SignedIn(session) => {
            let (user, token) = open_session(state, session)?;
            log::info!("✅ User registered and signed in: {}", email);
            Ok(AuthResponse {
                success: true,
                token: Some(token),
                user,
                message: None,
            })
        }
        SignUpOutcome::ConfirmationRequired(user) => {
            log::info!("📧 User registered, awaiting email confirmation: {}", email);
            Ok(AuthResponse {
                success: true,
                token: None,
                user: SessionIdentity::from(user),
                message: Some("Verifique seu email para confirmar o cadastro.".to_string()),
            })
        }
    }
}

/// Encerra a sessão local; falha no provedor é só registrada
pub async fn logout(state: &AppState, claims: &Claims) {
    let Some(session) = state.sessions.close(&claims.sid) else {
        return;
    };

    if session.provider_token.is_empty() {
        return;
    }

    if let Err(e) = state.identity.sign_out(&session.provider_token).await {
        log::warn!("⚠️  Provider sign-out failed for {}: {}", claims.sub, e);
    }
}

/// Inicia o login OAuth: guarda o verifier PKCE e devolve a URL do provedor
pub fn start_oauth(state: &AppState, provider: &str) -> OAuthUrlResponse {
    let flow = Uuid::new_v4().simple().to_string();
    let verifier = pkce::code_verifier();
    let challenge = pkce::code_challenge(&verifier);
    state.pending_flows.insert(flow.clone(), verifier);

    let callback = state.config.callback_url();
    let separator = if callback.contains('?') { '&' } else { '?' };
    let redirect_to = format!("{}{}flow={}", callback, separator, flow);

    OAuthUrlResponse {
        success: true,
        auth_url: state.identity.authorize_url(provider, &redirect_to, &challenge),
        flow,
    }
}

/// Perfil + cota do usuário logado. Não consome busca.
pub async fn current_user(state: &AppState, claims: &Claims) -> Result<MeResponse, AppError> {
    let decision =
        quota_service::check(state.profiles.as_ref(), &claims.sub, Utc::now().date_naive()).await?;
    let profile = decision.profile;

    Ok(MeResponse {
        success: true,
        user: claims.identity(),
        plan: profile.plan.as_str().to_string(),
        searches_used: profile.searches_used,
        remaining_searches: quota_service::remaining(&profile),
        last_reset_date: profile.last_reset_date.format("%Y-%m-%d").to_string(),
    })
}
