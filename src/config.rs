use crate::utils::AppError;
use std::env;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_SECRETS_DIR: &str = "/run/secrets";

#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: String,
    pub supabase_url: String,
    pub supabase_key: String,
    /// Para onde o provedor OAuth redireciona (nosso `/api/v1/auth/callback`)
    pub redirect_url: Option<String>,
    pub frontend_url: String,
    pub jwt: JwtSettings,
    pub cache_ttl: Duration,
}

/// Fonte de valores: primeiro o diretório de secrets (um arquivo por chave),
/// depois variáveis de ambiente (ou `.env` em desenvolvimento local).
struct Sources {
    secrets_dir: PathBuf,
}

impl Sources {
    fn get(&self, key: &str) -> Option<String> {
        read_secret(&self.secrets_dir, key)
            .or_else(|| env::var(key).ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, AppError> {
        self.get(key)
            .ok_or_else(|| AppError::Config(format!("{} must be set", key)))
    }

    fn or_default(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| {
            log::debug!("{} not set, using default: {}", key, default);
            default.to_string()
        })
    }
}

fn read_secret(dir: &Path, key: &str) -> Option<String> {
    read_to_string(dir.join(key)).ok()
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        let secrets_dir = env::var("SECRETS_DIR").unwrap_or_else(|_| DEFAULT_SECRETS_DIR.to_string());
        Self::from_sources(Sources {
            secrets_dir: PathBuf::from(secrets_dir),
        })
    }

    fn from_sources(sources: Sources) -> Result<Self, AppError> {
        let supabase_url = sources.required("SUPABASE_URL")?;
        let supabase_key = sources.required("SUPABASE_KEY")?;

        // A chave do Supabase costuma ser a anon key, pública no navegador
        let jwt_secret = sources.required("JWT_SECRET")?;
        if jwt_secret == supabase_key {
            return Err(AppError::Config(
                "JWT_SECRET must differ from SUPABASE_KEY".to_string(),
            ));
        }

        let cache_ttl_seconds = sources
            .or_default("CACHE_TTL_SECONDS", "3600")
            .parse::<u64>()
            .map_err(|e| AppError::Config(format!("Invalid CACHE_TTL_SECONDS: {}", e)))?;

        Ok(Config {
            host: sources.or_default("HOST", "0.0.0.0"),
            port: sources.or_default("PORT", "3002"),
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            supabase_key,
            redirect_url: sources.get("REDIRECT_URL"),
            frontend_url: sources
                .or_default("FRONTEND_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
            jwt: JwtSettings {
                secret: jwt_secret,
                issuer: sources.or_default("JWT_ISSUER", "itbi-search-service"),
                audience: sources.or_default("JWT_AUDIENCE", "itbi-search-api"),
            },
            cache_ttl: Duration::from_secs(cache_ttl_seconds),
        })
    }

    /// Callback OAuth; sem `REDIRECT_URL` usa o próprio serviço em localhost
    pub fn callback_url(&self) -> String {
        self.redirect_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}/api/v1/auth/callback", self.port))
    }
}
