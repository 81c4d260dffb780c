//! Environment-driven configuration.
//!
//! Values are read once at startup and validated before any connection is
//! opened. In production every value must be set explicitly; in dev the
//! documented defaults apply.

use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub port: u16,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub security: SecurityConfig,
    pub hashing: HashingConfig,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expiry_minutes: i64,
    pub refresh_token_expiry_days: i64,
}

/// Brute-force and one-time-token thresholds.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub max_login_attempts: u32,
    pub login_attempts_window_minutes: u64,
    pub account_lockout_duration_minutes: u64,
    pub email_verification_expiry_hours: u64,
    pub password_reset_expiry_minutes: u64,
}

/// Argon2id cost parameters.
#[derive(Debug, Clone)]
pub struct HashingConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_login_attempts: 5,
            login_attempts_window_minutes: 30,
            account_lockout_duration_minutes: 30,
            email_verification_expiry_hours: 24,
            password_reset_expiry_minutes: 30,
        }
    }
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: 65536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::Config(anyhow::anyhow!(e)))?;
        let is_prod = environment == Environment::Prod;

        let config = AppConfig {
            environment,
            service_name: get_env("SERVICE_NAME", Some("casehub-auth"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            port: parse_env("PORT", Some("8080"), is_prod)?,
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", Some("10"), is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", Some("1"), is_prod)?,
            },
            redis: RedisConfig {
                url: get_env("REDIS_URL", None, is_prod)?,
            },
            jwt: JwtConfig {
                secret: get_env("JWT_SECRET", None, is_prod)?,
                access_token_expiry_minutes: parse_env(
                    "JWT_ACCESS_TOKEN_EXPIRY_MINUTES",
                    Some("15"),
                    is_prod,
                )?,
                refresh_token_expiry_days: parse_env(
                    "JWT_REFRESH_TOKEN_EXPIRY_DAYS",
                    Some("7"),
                    is_prod,
                )?,
            },
            security: SecurityConfig {
                max_login_attempts: parse_env("MAX_LOGIN_ATTEMPTS", Some("5"), is_prod)?,
                login_attempts_window_minutes: parse_env(
                    "LOGIN_ATTEMPTS_WINDOW_MINUTES",
                    Some("30"),
                    is_prod,
                )?,
                account_lockout_duration_minutes: parse_env(
                    "ACCOUNT_LOCKOUT_DURATION_MINUTES",
                    Some("30"),
                    is_prod,
                )?,
                email_verification_expiry_hours: parse_env(
                    "EMAIL_VERIFICATION_EXPIRY_HOURS",
                    Some("24"),
                    is_prod,
                )?,
                password_reset_expiry_minutes: parse_env(
                    "PASSWORD_RESET_EXPIRY_MINUTES",
                    Some("30"),
                    is_prod,
                )?,
            },
            hashing: HashingConfig {
                memory_kib: parse_env("ARGON2_MEMORY_KIB", Some("65536"), is_prod)?,
                iterations: parse_env("ARGON2_ITERATIONS", Some("3"), is_prod)?,
                parallelism: parse_env("ARGON2_PARALLELISM", Some("4"), is_prod)?,
            },
            allowed_origins: get_env("ALLOWED_ORIGINS", Some("http://localhost:3000"), is_prod)?
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.port == 0 {
            return Err(AppError::Config(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }
        if self.jwt.secret.len() < 32 {
            return Err(AppError::Config(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 bytes"
            )));
        }
        if self.jwt.access_token_expiry_minutes <= 0 {
            return Err(AppError::Config(anyhow::anyhow!(
                "JWT_ACCESS_TOKEN_EXPIRY_MINUTES must be positive"
            )));
        }
        if self.jwt.refresh_token_expiry_days <= 0 {
            return Err(AppError::Config(anyhow::anyhow!(
                "JWT_REFRESH_TOKEN_EXPIRY_DAYS must be positive"
            )));
        }
        if self.security.max_login_attempts == 0 {
            return Err(AppError::Config(anyhow::anyhow!(
                "MAX_LOGIN_ATTEMPTS must be greater than 0"
            )));
        }
        if self.environment == Environment::Prod
            && self.allowed_origins.iter().any(|o| o == "*")
        {
            return Err(AppError::Config(anyhow::anyhow!(
                "Wildcard CORS origin not allowed in production"
            )));
        }
        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::Config(anyhow::anyhow!(
                    "{key} is required in production but not set"
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::Config(anyhow::anyhow!(
                    "{key} is required but not set"
                )))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: Option<&str>, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, default, is_prod)?.parse().map_err(|e| {
        AppError::Config(anyhow::anyhow!("{key} has an invalid value: {e}"))
    })
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {s}")),
        }
    }
}
