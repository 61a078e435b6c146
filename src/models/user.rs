use serde::{Deserialize, Serialize};

/// Identidade do usuário logado, derivada do provedor de identidade.
/// Vive enquanto durar a sessão (token de sessão) do navegador.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, utoipa::ToSchema)]
pub struct SessionIdentity {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
}

/// Usuário como devolvido pelo provedor (`GET /auth/v1/user`)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl From<ProviderUser> for SessionIdentity {
    fn from(user: ProviderUser) -> Self {
        let email = user.email.unwrap_or_default();

        // Google preenche full_name/name; cadastro por senha usa o que foi enviado no signup
        let display_name = ["full_name", "name", "display_name"]
            .iter()
            .find_map(|key| user.user_metadata.get(*key).and_then(|v| v.as_str()))
            .filter(|name| !name.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

        SessionIdentity {
            user_id: user.id,
            email,
            display_name,
        }
    }
}
