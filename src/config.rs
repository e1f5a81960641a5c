/*
 * Responsibility
 * - 環境変数や設定の読み込み (DATABASE_URL, CORS 許可、Auth 設定など)
 * - 設定値のバリデーション (不足なら起動失敗)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use url::Url;

use crate::services::auth::jwks::DEFAULT_MIN_REFRESH_INTERVAL;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        match std::env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
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

/// Identity-provider settings consumed by the authorization gate.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub issuer: String,
    pub audience: String,
    pub jwks_url: Url,
    // Asymmetric algorithms only; symmetric names are refused at load time.
    pub algorithms: Vec<Algorithm>,
    pub leeway_seconds: u64,
    pub jwks_cache_ttl: Duration,
    pub jwks_fetch_timeout: Duration,
    // Floor between key set refreshes forced by unknown key identifiers.
    pub jwks_min_refresh_interval: Duration,
}

pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub database_reset: bool,

    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,

    pub http_body_limit_bytes: usize,
    pub http_timeout: Duration,

    pub auth: AuthConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let database_reset = std::env::var("DATABASE_RESET")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let app_env = AppEnv::from_env();

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let http_body_limit_bytes = env_parse("HTTP_BODY_LIMIT_BYTES", 1024 * 1024);
        let http_timeout = Duration::from_secs(env_parse("HTTP_TIMEOUT_SECONDS", 30));

        let auth = AuthConfig::from_env()?;

        Ok(Self {
            addr,
            database_url,
            database_reset,
            app_env,
            cors_allowed_origins,
            http_body_limit_bytes,
            http_timeout,
            auth,
        })
    }
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let issuer =
            std::env::var("AUTH_ISSUER").map_err(|_| ConfigError::Missing("AUTH_ISSUER"))?;

        let audience =
            std::env::var("AUTH_AUDIENCE").map_err(|_| ConfigError::Missing("AUTH_AUDIENCE"))?;

        let jwks_url = match std::env::var("AUTH_JWKS_URL") {
            Ok(raw) => Url::parse(&raw).map_err(|_| ConfigError::Invalid("AUTH_JWKS_URL"))?,
            Err(_) => default_jwks_url(&issuer).ok_or(ConfigError::Invalid("AUTH_ISSUER"))?,
        };

        let algorithms = parse_algorithms(
            &std::env::var("AUTH_ALGORITHMS").unwrap_or_else(|_| "RS256".to_string()),
        )
        .ok_or(ConfigError::Invalid("AUTH_ALGORITHMS"))?;

        Ok(Self {
            issuer,
            audience,
            jwks_url,
            algorithms,
            leeway_seconds: env_parse("AUTH_LEEWAY_SECONDS", 0),
            jwks_cache_ttl: Duration::from_secs(env_parse("JWKS_CACHE_TTL_SECONDS", 300)),
            jwks_fetch_timeout: Duration::from_secs(env_parse("JWKS_FETCH_TIMEOUT_SECONDS", 5)),
            jwks_min_refresh_interval: Duration::from_secs(env_parse(
                "JWKS_MIN_REFRESH_SECONDS",
                DEFAULT_MIN_REFRESH_INTERVAL.as_secs(),
            )),
        })
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// `https://tenant.example.com/` -> `https://tenant.example.com/.well-known/jwks.json`
fn default_jwks_url(issuer: &str) -> Option<Url> {
    let base = Url::parse(issuer).ok()?;
    base.join("/.well-known/jwks.json").ok()
}

/// Comma-separated allow-list. `None` when empty, unknown, or symmetric.
pub fn parse_algorithms(raw: &str) -> Option<Vec<Algorithm>> {
    let mut out = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let alg = Algorithm::from_str(name).ok()?;
        if matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return None;
        }
        if !out.contains(&alg) {
            out.push(alg);
        }
    }
    if out.is_empty() { None } else { Some(out) }
}
