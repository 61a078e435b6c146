use super::{ensure_success, SupabaseClient};
use crate::models::ProviderUser;
use crate::utils::AppError;
use async_trait::async_trait;
use serde::Deserialize;

/// Sessão devolvida pelo provedor após login, cadastro ou troca de código
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub user: ProviderUser,
}

#[derive(Debug, Clone)]
pub enum SignUpOutcome {
    /// Confirmação de email desligada: já volta com sessão
    SignedIn(AuthSession),
    /// Conta criada, aguardando confirmação do email
    ConfirmationRequired(ProviderUser),
}

/// Provedor de identidade externo (email/senha + OAuth com PKCE).
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession, AppError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<SignUpOutcome, AppError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AppError>;

    async fn get_user(&self, access_token: &str) -> Result<ProviderUser, AppError>;

    async fn exchange_code_for_session(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<AuthSession, AppError>;

    fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> String;
}

/// 400/401/422 do GoTrue são credenciais/código inválidos; o resto é falha remota
async fn auth_result(response: reqwest::Response, context: &str) -> Result<reqwest::Response, AppError> {
    let status = response.status().as_u16();
    if matches!(status, 400 | 401 | 403 | 422) {
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        let message = ["error_description", "msg", "message", "error"]
            .iter()
            .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
            .unwrap_or("invalid credentials")
            .to_string();
        return Err(AppError::Auth(message));
    }
    ensure_success(response, context).await
}

#[async_trait]
impl IdentityProvider for SupabaseClient {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession, AppError> {
        let response = self
            .auth(reqwest::Method::POST, "token")
            .query(&[("grant_type", "password")])
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        auth_result(response, "Password sign-in")
            .await?
            .json()
            .await
            .map_err(|e| AppError::Remote(format!("Failed to parse session: {}", e)))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<SignUpOutcome, AppError> {
        let mut body = serde_json::json!({ "email": email, "password": password });
        if let Some(name) = display_name {
            body["data"] = serde_json::json!({ "full_name": name });
        }

        let response = self
            .auth(reqwest::Method::POST, "signup")
            .json(&body)
            .send()
            .await?;

        let payload: serde_json::Value = auth_result(response, "Sign-up")
            .await?
            .json()
            .await
            .map_err(|e| AppError::Remote(format!("Failed to parse sign-up response: {}", e)))?;

        parse_sign_up(payload)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AppError> {
        let response = self
            .auth(reqwest::Method::POST, "logout")
            .bearer_auth(access_token)
            .send()
            .await?;

        auth_result(response, "Sign-out").await?;
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<ProviderUser, AppError> {
        let response = self
            .auth(reqwest::Method::GET, "user")
            .bearer_auth(access_token)
            .send()
            .await?;

        auth_result(response, "User lookup")
            .await?
            .json()
            .await
            .map_err(|e| AppError::Remote(format!("Failed to parse user: {}", e)))
    }

    async fn exchange_code_for_session(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<AuthSession, AppError> {
        let response = self
            .auth(reqwest::Method::POST, "token")
            .query(&[("grant_type", "pkce")])
            .json(&serde_json::json!({ "auth_code": auth_code, "code_verifier": code_verifier }))
            .send()
            .await?;

        auth_result(response, "Code exchange")
            .await?
            .json()
            .await
            .map_err(|e| AppError::Remote(format!("Failed to parse session: {}", e)))
    }

    fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> String {
        let params = [
            ("provider", provider),
            ("redirect_to", redirect_to),
            ("code_challenge", code_challenge),
            ("code_challenge_method", "s256"),
        ];

        let query_string = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}?{}", self.auth_url("authorize"), query_string)
    }
}

/// O `/signup` devolve uma sessão completa ou só o usuário (email a confirmar)
fn parse_sign_up(payload: serde_json::Value) -> Result<SignUpOutcome, AppError> {
    if payload.get("access_token").is_some() {
        let session: AuthSession = serde_json::from_value(payload)
            .map_err(|e| AppError::Remote(format!("Failed to parse session: {}", e)))?;
        return Ok(SignUpOutcome::SignedIn(session));
    }

    let user_value = payload.get("user").cloned().unwrap_or(payload);
    let user: ProviderUser = serde_json::from_value(user_value)
        .map_err(|e| AppError::Remote(format!("Failed to parse user: {}", e)))?;
    Ok(SignUpOutcome::ConfirmationRequired(user))
}
