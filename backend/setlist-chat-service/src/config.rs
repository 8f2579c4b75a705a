use crate::error::AppError;
use actix_middleware::JwtVerifier;
use dotenvy::dotenv;
use std::env;

/// How incoming bearer tokens are verified
#[derive(Debug, Clone)]
pub enum JwtKey {
    /// Shared HS256 secret
    Secret(String),
    /// RS256 public key in PEM form
    PublicKeyPem(String),
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub key: JwtKey,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl JwtConfig {
    pub fn verifier(&self) -> Result<JwtVerifier, AppError> {
        let mut verifier = match &self.key {
            JwtKey::Secret(secret) => JwtVerifier::hs256(secret.as_bytes()),
            JwtKey::PublicKeyPem(pem) => JwtVerifier::rs256_pem(pem)
                .map_err(|e| AppError::Config(format!("invalid JWT_PUBLIC_KEY_PEM: {e}")))?,
        };
        if let Some(issuer) = &self.issuer {
            verifier = verifier.with_issuer(issuer);
        }
        if let Some(audience) = &self.audience {
            verifier = verifier.with_audience(audience);
        }
        Ok(verifier)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// `None` runs the service on the in-memory store
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub jwt: JwtConfig,
    pub cors_allowed_origins: Vec<String>,
    pub message_page_size: i64,
    pub message_page_max: i64,
    pub log_json: bool,
}

impl Config {
    fn parse_list(value: &str) -> Vec<String> {
        value
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()
    }

    fn non_empty(key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3001);

        let database_url = Self::non_empty("DATABASE_URL");
        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        // PEM takes precedence when both are present.
        let key = match (
            Self::non_empty("JWT_PUBLIC_KEY_PEM"),
            Self::non_empty("JWT_SECRET"),
        ) {
            (Some(pem), _) => JwtKey::PublicKeyPem(pem.replace("\\n", "\n")),
            (None, Some(secret)) => JwtKey::Secret(secret),
            (None, None) => {
                return Err(AppError::Config(
                    "JWT_SECRET or JWT_PUBLIC_KEY_PEM must be set".into(),
                ))
            }
        };

        let jwt = JwtConfig {
            key,
            issuer: Self::non_empty("JWT_ISSUER"),
            audience: Self::non_empty("JWT_AUDIENCE"),
        };

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| Self::parse_list(&v))
            .unwrap_or_default();

        let message_page_max = env::var("MESSAGE_PAGE_MAX")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(200);
        let message_page_size = env::var("MESSAGE_PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(50)
            .min(message_page_max);

        let log_json = env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Ok(Self {
            port,
            database_url,
            db_max_connections,
            jwt,
            cors_allowed_origins,
            message_page_size,
            message_page_max,
            log_json,
        })
    }

    /// Configuration used by tests and local tooling
    pub fn for_secret(secret: &str) -> Self {
        Self {
            port: 3001,
            database_url: None,
            db_max_connections: 10,
            jwt: JwtConfig {
                key: JwtKey::Secret(secret.to_string()),
                issuer: None,
                audience: None,
            },
            cors_allowed_origins: Vec::new(),
            message_page_size: 50,
            message_page_max: 200,
            log_json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        let origins = Config::parse_list(" https://a.example, ,https://b.example ");
        assert_eq!(origins, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn test_secret_config_builds_verifier() {
        let config = Config::for_secret("dev-secret");
        assert!(config.jwt.verifier().is_ok());
        assert_eq!(config.message_page_size, 50);
        assert_eq!(config.message_page_max, 200);
    }

    #[test]
    fn test_invalid_pem_is_config_error() {
        let jwt = JwtConfig {
            key: JwtKey::PublicKeyPem("not a pem".into()),
            issuer: None,
            audience: None,
        };
        assert!(matches!(jwt.verifier(), Err(AppError::Config(_))));
    }
}
