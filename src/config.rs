/*
 * Responsibility
 * - Read settings from the environment (listen address, store backend, key discovery, token policy)
 * - Validate them; anything missing or malformed stops startup
 */
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use url::Url;

const JWKS_PATH: &str = "/auth/v1/.well-known/jwks.json";
const MAX_STORE_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn from_value(value: Option<&str>) -> Self {
        match value.unwrap_or("development").to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres {
        database_url: String,
        max_connections: u32,
    },
    /// In-process maps, optionally seeded from a JSON file.
    Memory { seed_path: Option<PathBuf> },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,

    pub store: StoreBackend,
    pub store_timeout: Duration,

    pub jwks_url: Url,
    pub jwks_refresh_interval_seconds: u64,
    pub jwks_fetch_timeout_seconds: u64,
    pub jwks_min_refresh_gap_seconds: u64,

    pub jwt_algorithm: Algorithm,
    pub auth_audience: String,
    pub auth_issuer: Option<String>,
    pub access_token_leeway_seconds: u64,
}

fn parse_or<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|_| ConfigError::Invalid(key))
        }
        _ => Ok(default),
    }
}

fn jwks_url(get: &impl Fn(&str) -> Option<String>) -> Result<Url, ConfigError> {
    if let Some(url) = get("AUTH_JWKS_URL").filter(|s| !s.trim().is_empty()) {
        return Url::parse(url.trim()).map_err(|_| ConfigError::Invalid("AUTH_JWKS_URL"));
    }

    let project = get("IDP_PROJECT_URL")
        .filter(|s| !s.trim().is_empty())
        .ok_or(ConfigError::Missing("AUTH_JWKS_URL"))?;
    let base = project.trim().trim_end_matches('/');

    Url::parse(&format!("{base}{JWKS_PATH}")).map_err(|_| ConfigError::Invalid("IDP_PROJECT_URL"))
}

fn jwt_algorithm(get: &impl Fn(&str) -> Option<String>) -> Result<Algorithm, ConfigError> {
    let raw = get("AUTH_JWT_ALGORITHM").unwrap_or_else(|| "ES256".to_string());
    match Algorithm::from_str(raw.trim()) {
        Ok(alg @ (Algorithm::ES256 | Algorithm::RS256 | Algorithm::EdDSA)) => Ok(alg),
        _ => Err(ConfigError::Invalid("AUTH_JWT_ALGORITHM")),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port: u16 = parse_or(&get, "PORT", 3000)?;
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::from_value(get("APP_ENV").as_deref());

        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let store = match get("STORE_BACKEND")
            .unwrap_or_else(|| "postgres".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "postgres" => StoreBackend::Postgres {
                database_url: get("DATABASE_URL")
                    .filter(|s| !s.is_empty())
                    .ok_or(ConfigError::Missing("DATABASE_URL"))?,
                max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            },
            "memory" => StoreBackend::Memory {
                seed_path: get("MEMORY_SEED_PATH")
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from),
            },
            _ => return Err(ConfigError::Invalid("STORE_BACKEND")),
        };

        let store_timeout_ms: u64 = parse_or(&get, "STORE_TIMEOUT_MS", 2000)?;
        if store_timeout_ms == 0 || store_timeout_ms > MAX_STORE_TIMEOUT_MS {
            return Err(ConfigError::Invalid("STORE_TIMEOUT_MS"));
        }
        let store_timeout = Duration::from_millis(store_timeout_ms);

        let auth_audience = get("AUTH_AUDIENCE")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "authenticated".to_string());
        let auth_issuer = get("AUTH_ISSUER").filter(|s| !s.trim().is_empty());

        let jwks_refresh_interval_seconds = parse_or(&get, "JWKS_REFRESH_INTERVAL_SECONDS", 3600)?;
        if jwks_refresh_interval_seconds == 0 {
            return Err(ConfigError::Invalid("JWKS_REFRESH_INTERVAL_SECONDS"));
        }

        Ok(Self {
            addr,
            app_env,
            cors_allowed_origins,
            store,
            store_timeout,
            jwks_url: jwks_url(&get)?,
            jwks_refresh_interval_seconds,
            jwks_fetch_timeout_seconds: parse_or(&get, "JWKS_FETCH_TIMEOUT_SECONDS", 10)?,
            jwks_min_refresh_gap_seconds: parse_or(&get, "JWKS_MIN_REFRESH_GAP_SECONDS", 30)?,
            jwt_algorithm: jwt_algorithm(&get)?,
            auth_audience,
            auth_issuer,
            access_token_leeway_seconds: parse_or(&get, "ACCESS_TOKEN_LEEWAY_SECONDS", 60)?,
        })
    }
}
