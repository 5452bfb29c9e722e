use sqlx::postgres::{PgPool, PgPoolOptions};
use std::env;
use std::time::Duration;
use thiserror::Error;

use crate::services::{RedisSessionStore, SessionError, TokenService};

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_ORDER_LOCK_TIMEOUT_MS: u64 = 5000;
const SECS_PER_HOUR: u64 = 3600;

const REQUIRED_KEYS: [&str; 6] = [
    "DATABASE_URL",
    "REDIS_URL",
    "JWT_ACCESS_SECRET",
    "JWT_REFRESH_SECRET",
    "JWT_ACCESS_EXPIRY",
    "JWT_REFRESH_EXPIRY",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("{key} must be {expected}, got {value:?}")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub port: u16,
    pub jwt: JwtConfig,
    pub cors_allowed_origins: Option<String>,
    pub production: bool,
    pub database_max_connections: u32,
    pub database_acquire_timeout: Duration,
    pub order_lock_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key source. Every missing required
    /// key is reported in one error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let missing: Vec<String> = REQUIRED_KEYS
            .iter()
            .filter(|key| read(**key).is_none())
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let required = |key: &str| read(key).unwrap_or_default();

        let jwt = JwtConfig {
            access_secret: required("JWT_ACCESS_SECRET"),
            refresh_secret: required("JWT_REFRESH_SECRET"),
            access_ttl: expiry_hours("JWT_ACCESS_EXPIRY", &required("JWT_ACCESS_EXPIRY"))?,
            refresh_ttl: expiry_hours("JWT_REFRESH_EXPIRY", &required("JWT_REFRESH_EXPIRY"))?,
        };

        Ok(Self {
            database_url: required("DATABASE_URL"),
            redis_url: required("REDIS_URL"),
            port: parse_or("PORT", read("PORT"), DEFAULT_PORT)?,
            jwt,
            cors_allowed_origins: read("CORS_ALLOWED_ORIGINS"),
            production: read("RUST_ENV")
                .map(|v| v.to_lowercase() == "production")
                .unwrap_or(false),
            database_max_connections: parse_or(
                "DATABASE_MAX_CONNECTIONS",
                read("DATABASE_MAX_CONNECTIONS"),
                DEFAULT_MAX_CONNECTIONS,
            )?,
            database_acquire_timeout: Duration::from_secs(parse_or(
                "DATABASE_ACQUIRE_TIMEOUT_SECS",
                read("DATABASE_ACQUIRE_TIMEOUT_SECS"),
                DEFAULT_ACQUIRE_TIMEOUT_SECS,
            )?),
            order_lock_timeout: Duration::from_millis(parse_or(
                "ORDER_LOCK_TIMEOUT_MS",
                read("ORDER_LOCK_TIMEOUT_MS"),
                DEFAULT_ORDER_LOCK_TIMEOUT_MS,
            )?),
        })
    }

    pub async fn connect_database(&self) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(self.database_max_connections)
            .acquire_timeout(self.database_acquire_timeout)
            .connect(&self.database_url)
            .await
    }

    pub async fn connect_session_store(&self) -> Result<RedisSessionStore, SessionError> {
        RedisSessionStore::new(&self.redis_url).await
    }

    pub fn token_service(&self) -> TokenService {
        TokenService::new(
            &self.jwt.access_secret,
            &self.jwt.refresh_secret,
            self.jwt.access_ttl,
            self.jwt.refresh_ttl,
        )
    }
}

fn expiry_hours(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(hours) if hours > 0 => Ok(Duration::from_secs(hours * SECS_PER_HOUR)),
        _ => Err(ConfigError::Invalid {
            key,
            expected: "a positive number of hours",
            value: value.to_string(),
        }),
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key,
            expected: "a non-negative integer",
            value: raw,
        }),
    }
}
