use crate::database::ProfileStore;
use crate::models::{Plan, UserProfile};
use crate::utils::AppError;
use chrono::{Months, NaiveDate};

/// Buscas por mês no plano gratuito
pub const FREE_MONTHLY_LIMIT: u32 = 5;

#[derive(Debug, Clone)]
pub struct QuotaDecision {
    pub profile: UserProfile,
    pub allowed: bool,
}

/// Zera o contador quando `today` chega a um mês-calendário após o último reset.
/// Retorna `true` se houve reset (o chamador persiste na hora).
pub fn apply_reset(profile: &mut UserProfile, today: NaiveDate) -> bool {
    let Some(next_reset) = profile.last_reset_date.checked_add_months(Months::new(1)) else {
        return false;
    };

    if today >= next_reset {
        profile.searches_used = 0;
        profile.last_reset_date = today;
        return true;
    }
    false
}

pub fn is_allowed(profile: &UserProfile) -> bool {
    match profile.plan {
        Plan::Professional => true,
        Plan::Free => profile.searches_used < FREE_MONTHLY_LIMIT,
    }
}

/// Buscas restantes no mês (`None` = ilimitado)
pub fn remaining(profile: &UserProfile) -> Option<u32> {
    match profile.plan {
        Plan::Professional => None,
        Plan::Free => Some(FREE_MONTHLY_LIMIT.saturating_sub(profile.searches_used)),
    }
}

/// Carrega o perfil, aplica o reset pendente e decide se a busca pode rodar.
/// Nada é incrementado aqui.
pub async fn check(
    profiles: &dyn ProfileStore,
    user_id: &str,
    today: NaiveDate,
) -> Result<QuotaDecision, AppError> {
    let mut profile = profiles
        .get_profile(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Profile {} not found", user_id)))?;

    if apply_reset(&mut profile, today) {
        log::info!("🔄 Monthly quota reset for user {}", user_id);
        if let Err(e) = profiles.update_profile(&profile).await {
            log::error!("❌ Failed to persist quota reset for {}: {}", user_id, e);
        }
    }

    let allowed = is_allowed(&profile);
    if !allowed {
        log::warn!(
            "⛔ Search blocked for {}: {}/{} searches used",
            user_id, profile.searches_used, FREE_MONTHLY_LIMIT
        );
    }

    Ok(QuotaDecision { profile, allowed })
}

/// Conta uma busca executada. Só o plano gratuito é contado.
pub async fn consume(profiles: &dyn ProfileStore, profile: &mut UserProfile) -> Result<(), AppError> {
    if profile.plan != Plan::Free {
        return Ok(());
    }

    profile.searches_used += 1;
    profiles.update_profile(profile).await?;

    log::info!(
        "📊 User {} used {}/{} searches this month",
        profile.id, profile.searches_used, FREE_MONTHLY_LIMIT
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn free_profile(used: u32, last_reset: NaiveDate) -> UserProfile {
        UserProfile {
            id: "u1".to_string(),
            plan: Plan::Free,
            searches_used: used,
            last_reset_date: last_reset,
        }
    }

    #[test]
    fn test_reset_after_one_month_and_a_day() {
        let today = date(2026, 10, 17);
        let mut profile = free_profile(5, date(2026, 9, 16));
        assert!(apply_reset(&mut profile, today));
        assert_eq!(profile.searches_used, 0);
        assert_eq!(profile.last_reset_date, today);
        assert!(is_allowed(&profile));
    }

    #[test]
    fn test_reset_exactly_one_month_later() {
        let mut profile = free_profile(5, date(2026, 9, 17));
        assert!(apply_reset(&mut profile, date(2026, 10, 17)));
    }

    #[test]
    fn test_no_reset_within_month() {
        let mut profile = free_profile(5, date(2026, 9, 18));
        assert!(!apply_reset(&mut profile, date(2026, 10, 17)));
        assert_eq!(profile.searches_used, 5);
    }

    #[test]
    fn test_calendar_month_end_clamps() {
        // 31/01 + 1 mês = 28/02 (ano não bissexto)
        let mut profile = free_profile(3, date(2027, 1, 31));
        assert!(!apply_reset(&mut profile, date(2027, 2, 27)));
        assert!(apply_reset(&mut profile, date(2027, 2, 28)));
    }

    #[test]
    fn test_professional_is_never_limited() {
        let profile = UserProfile {
            plan: Plan::Professional,
            ..free_profile(500, date(2026, 10, 1))
        };
        assert!(is_allowed(&profile));
        assert_eq!(remaining(&profile), None);
    }

    #[tokio::test]
    async fn test_allowed_once_then_blocked() {
        let today = date(2026, 10, 17);
        let store = InMemoryStore::default().with_profile(free_profile(4, today));

        let mut decision = check(&store, "u1", today).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(remaining(&decision.profile), Some(1));

        consume(&store, &mut decision.profile).await.unwrap();
        assert_eq!(store.profile("u1").unwrap().searches_used, 5);

        let decision = check(&store, "u1", today).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(remaining(&decision.profile), Some(0));
    }

    #[tokio::test]
    async fn test_check_persists_reset_before_deciding() {
        let today = date(2026, 10, 17);
        let store = InMemoryStore::default().with_profile(free_profile(5, date(2026, 9, 16)));

        let decision = check(&store, "u1", today).await.unwrap();
        assert!(decision.allowed);

        let stored = store.profile("u1").unwrap();
        assert_eq!(stored.searches_used, 0);
        assert_eq!(stored.last_reset_date, today);
    }

    #[tokio::test]
    async fn test_consume_skips_professional() {
        let today = date(2026, 10, 17);
        let mut profile = UserProfile {
            plan: Plan::Professional,
            ..free_profile(7, today)
        };
        let store = InMemoryStore::default().with_profile(profile.clone());

        consume(&store, &mut profile).await.unwrap();
        assert_eq!(store.profile("u1").unwrap().searches_used, 7);
    }

    #[tokio::test]
    async fn test_missing_profile() {
        let store = InMemoryStore::default();
        let result = check(&store, "ghost", date(2026, 10, 17)).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
