use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Plano da conta (coluna `plan` da tabela `profiles`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Professional,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Professional => "professional",
        }
    }
}

/// Perfil do usuário (tabela `profiles`, chave `id`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub plan: Plan,
    /// Buscas feitas desde o último reset mensal
    #[serde(default)]
    pub searches_used: u32,
    pub last_reset_date: NaiveDate,
}

/// Corpo do PATCH em `profiles` (só os campos de cota)
#[derive(Debug, Serialize)]
pub struct ProfileQuotaUpdate {
    pub searches_used: u32,
    pub last_reset_date: NaiveDate,
}

impl From<&UserProfile> for ProfileQuotaUpdate {
    fn from(profile: &UserProfile) -> Self {
        Self {
            searches_used: profile.searches_used,
            last_reset_date: profile.last_reset_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_from_store_row() {
        let row = serde_json::json!({
            "id": "abc",
            "plan": "professional",
            "searches_used": 12,
            "last_reset_date": "2026-09-01",
            "created_at": "2026-01-01T00:00:00Z"
        });
        let profile: UserProfile = serde_json::from_value(row).unwrap();
        assert_eq!(profile.plan, Plan::Professional);
        assert_eq!(profile.searches_used, 12);
        assert_eq!(profile.last_reset_date, NaiveDate::from_ymd_opt(2026, 9, 1).unwrap());
    }

    #[test]
    fn test_quota_update_body() {
        let profile = UserProfile {
            id: "abc".to_string(),
            plan: Plan::Free,
            searches_used: 3,
            last_reset_date: NaiveDate::from_ymd_opt(2026, 10, 2).unwrap(),
        };
        let body = serde_json::to_value(ProfileQuotaUpdate::from(&profile)).unwrap();
        assert_eq!(body, serde_json::json!({ "searches_used": 3, "last_reset_date": "2026-10-02" }));
    }
}
