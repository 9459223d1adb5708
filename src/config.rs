use base64::{engine::general_purpose, Engine as _};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} missing")]
    Missing(&'static str),
    #[error("{0} must be base64")]
    NotBase64(&'static str),
    #[error("{0} is too short")]
    TooShort(&'static str),
    #[error("{0} must be a number")]
    NotANumber(&'static str),
}

#[derive(Clone, Debug)]
pub struct AdminBootstrap {
    pub login: String,
    pub secret: String,
    pub display_name: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub bind_addr: String,
    pub session_key: Vec<u8>,
    pub enc_key: Option<Vec<u8>>,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub admin: Option<AdminBootstrap>,
    /// Adds `Secure` to the session cookie; set when served over HTTPS.
    pub cookie_secure: bool,
    /// Keys the login limiter on `x-forwarded-for`; only set behind a trusted proxy.
    pub trust_forwarded_for: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let flag = |key: &str| {
            non_empty(key).is_some_and(|v| matches!(v.trim(), "1" | "true" | "yes"))
        };

        let session_key_b64 = non_empty("SESSION_KEY")
            .or_else(|| non_empty("APP_ENC_KEY"))
            .ok_or(ConfigError::Missing("SESSION_KEY"))?;
        let session_key = general_purpose::STANDARD
            .decode(session_key_b64.trim())
            .map_err(|_| ConfigError::NotBase64("SESSION_KEY"))?;
        if session_key.len() < 32 {
            return Err(ConfigError::TooShort("SESSION_KEY"));
        }

        let enc_key = match non_empty("APP_ENC_KEY") {
            Some(raw) => Some(
                general_purpose::STANDARD
                    .decode(raw.trim())
                    .map_err(|_| ConfigError::NotBase64("APP_ENC_KEY"))?,
            ),
            None => None,
        };

        let database_url = non_empty("DATABASE_URL");
        if database_url.is_some() && enc_key.is_none() {
            return Err(ConfigError::Missing("APP_ENC_KEY"));
        }

        let db_max_connections = match non_empty("DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::NotANumber("DB_MAX_CONNECTIONS"))?,
            None => 10,
        };

        let bind_addr = non_empty("BIND_ADDR").unwrap_or_else(|| {
            let port = non_empty("PORT").unwrap_or_else(|| "3000".to_string());
            format!("0.0.0.0:{}", port)
        });

        let admin = match (non_empty("ADMIN_LOGIN"), non_empty("ADMIN_SECRET")) {
            (Some(login), Some(secret)) => Some(AdminBootstrap {
                display_name: non_empty("ADMIN_NAME").unwrap_or_else(|| login.clone()),
                login,
                secret,
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            db_max_connections,
            bind_addr,
            session_key,
            enc_key,
            openai_api_key: non_empty("OPENAI_API_KEY"),
            openai_model: non_empty("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            admin,
            cookie_secure: flag("COOKIE_SECURE"),
            trust_forwarded_for: flag("TRUST_FORWARDED_FOR"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn key_b64() -> String {
        general_purpose::STANDARD.encode([7u8; 32])
    }

    fn lookup(pairs: &[(&str, String)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_memory_store_without_database_url() {
        let config = Config::from_lookup(lookup(&[("SESSION_KEY", key_b64())])).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.openai_model, "gpt-4o-mini");
        assert!(config.openai_api_key.is_none());
        assert!(config.admin.is_none());
        assert!(!config.cookie_secure);
        assert!(!config.trust_forwarded_for);
    }

    #[test]
    fn boolean_flags_accept_common_spellings() {
        let config = Config::from_lookup(lookup(&[
            ("SESSION_KEY", key_b64()),
            ("COOKIE_SECURE", "true".to_string()),
            ("TRUST_FORWARDED_FOR", "1".to_string()),
        ]))
        .unwrap();
        assert!(config.cookie_secure);
        assert!(config.trust_forwarded_for);
    }

    #[test]
    fn postgres_requires_encryption_key() {
        let result = Config::from_lookup(lookup(&[
            ("SESSION_KEY", key_b64()),
            ("DATABASE_URL", "postgres://localhost/reviews".to_string()),
        ]));
        assert!(matches!(result, Err(ConfigError::Missing("APP_ENC_KEY"))));
    }

    #[test]
    fn short_session_key_is_rejected() {
        let short = general_purpose::STANDARD.encode([1u8; 8]);
        let result = Config::from_lookup(lookup(&[("SESSION_KEY", short)]));
        assert!(matches!(result, Err(ConfigError::TooShort("SESSION_KEY"))));
    }

    #[test]
    fn admin_bootstrap_needs_login_and_secret() {
        let config = Config::from_lookup(lookup(&[
            ("SESSION_KEY", key_b64()),
            ("ADMIN_LOGIN", "people.ops".to_string()),
            ("ADMIN_SECRET", "s3cret".to_string()),
            ("PORT", "8080".to_string()),
        ]))
        .unwrap();
        let admin = config.admin.unwrap();
        assert_eq!(admin.display_name, "people.ops");
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
    }
}
