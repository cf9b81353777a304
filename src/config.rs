/*
 * Responsibility
 * - Read environment / .env settings (listen address, stores, identity provider, auth options)
 * - Validate them once at startup (missing or insecure values abort the process)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

pub const DEFAULT_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
pub const DEFAULT_IDENTITY_TOOLKIT_BASE_URL: &str = "https://identitytoolkit.googleapis.com";
pub const DEFAULT_FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" | "local" | "test" => Ok(Self::Development),
            _ => Err(ConfigError::Invalid("APP_ENV")),
        }
    }

    /// An unset `APP_ENV` means development unless the debug bypass is
    /// requested; the bypass only runs in an explicitly declared non-production
    /// environment.
    pub fn resolve(raw: Option<&str>, bypass_requested: bool) -> Result<Self, ConfigError> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Self::parse(raw),
            None if bypass_requested => Err(ConfigError::Missing("APP_ENV")),
            None => Ok(Self::Development),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
    Insecure(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
            ConfigError::Insecure(key) => {
                write!(f, "insecure configuration: {} is not allowed in production", key)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Options consumed by the identity & access layer.
#[derive(Clone)]
pub struct AuthSettings {
    pub is_production: bool,
    pub debug_bypass_enabled: bool,
    pub debug_bypass_token: Option<String>,
    pub request_timeout: Duration,
    pub admin_scope_name: String,
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the bypass credential
        f.debug_struct("AuthSettings")
            .field("is_production", &self.is_production)
            .field("debug_bypass_enabled", &self.debug_bypass_enabled)
            .field("request_timeout", &self.request_timeout)
            .field("admin_scope_name", &self.admin_scope_name)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileStoreKind {
    Firestore,
    Valkey,
}

impl FromStr for ProfileStoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(Self::Firestore),
            "valkey" | "redis" => Ok(Self::Valkey),
            _ => Err(ConfigError::Invalid("PROFILE_STORE")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FirebaseSettings {
    pub project_id: String,
    pub service_account_key_path: Option<String>,
    pub jwks_url: Url,
    pub identity_toolkit_base_url: Url,
    pub firestore_base_url: Url,
}

impl FirebaseSettings {
    /// Without a service-account key, admin REST calls carry the emulator
    /// token; that is only accepted outside production and when every admin
    /// endpoint in use points at an emulator.
    pub fn validate(
        &self,
        is_production: bool,
        profile_store: ProfileStoreKind,
    ) -> Result<(), ConfigError> {
        if self.service_account_key_path.is_some() {
            return Ok(());
        }
        if is_production || !self.uses_emulator(profile_store) {
            return Err(ConfigError::Missing("FIREBASE_SERVICE_ACCOUNT_KEY_PATH"));
        }
        Ok(())
    }

    pub fn uses_emulator(&self, profile_store: ProfileStoreKind) -> bool {
        let toolkit = !is_google_host(&self.identity_toolkit_base_url);
        match profile_store {
            ProfileStoreKind::Firestore => toolkit && !is_google_host(&self.firestore_base_url),
            ProfileStoreKind::Valkey => toolkit,
        }
    }
}

fn is_google_host(url: &Url) -> bool {
    url.host_str()
        .is_some_and(|h| h == "googleapis.com" || h.ends_with(".googleapis.com"))
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub app_name: String,
    pub app_version: String,
    pub log_level: String,
    pub cors_allowed_origins: Vec<String>,

    pub auth: AuthSettings,
    pub firebase: FirebaseSettings,

    pub profile_store: ProfileStoreKind,
    pub profile_collection: String,
    pub valkey_url: String,

    pub database_url_pg: String,
    pub database_url_mysql: String,

    pub health_check_cache_enabled: bool,
    pub health_check_cache_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = match std::env::var("PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            Err(_) => 8000,
        };

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let debug_bypass_enabled = parse_bool("DEBUG_BYPASS_ENABLED", false)?;
        let app_env = AppEnv::resolve(
            std::env::var("APP_ENV").ok().as_deref(),
            debug_bypass_enabled,
        )?;

        let app_name = std::env::var("APP_NAME").unwrap_or_else(|_| "SQES Data API".to_string());

        // Production is pinned to warn.
        let log_level = if app_env.is_production() {
            "warn".to_string()
        } else {
            std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
        };

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let auth = AuthSettings {
            is_production: app_env.is_production(),
            debug_bypass_enabled,
            debug_bypass_token: std::env::var("DEBUG_BYPASS_TOKEN")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            request_timeout: Duration::from_millis(parse_u64("REQUEST_TIMEOUT_MS", 5_000)?),
            admin_scope_name: std::env::var("ADMIN_SCOPE_NAME")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "admin".to_string()),
        };
        auth.validate()?;

        let profile_store = std::env::var("PROFILE_STORE")
            .unwrap_or_else(|_| "firestore".to_string())
            .parse::<ProfileStoreKind>()?;

        let firebase = FirebaseSettings {
            project_id: required("FIREBASE_PROJECT_ID")?,
            service_account_key_path: std::env::var("FIREBASE_SERVICE_ACCOUNT_KEY_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            jwks_url: parse_url("FIREBASE_JWKS_URL", DEFAULT_JWKS_URL)?,
            identity_toolkit_base_url: parse_url(
                "IDENTITY_TOOLKIT_BASE_URL",
                DEFAULT_IDENTITY_TOOLKIT_BASE_URL,
            )?,
            firestore_base_url: parse_url("FIRESTORE_BASE_URL", DEFAULT_FIRESTORE_BASE_URL)?,
        };
        firebase.validate(app_env.is_production(), profile_store)?;

        let profile_collection =
            std::env::var("PROFILE_COLLECTION").unwrap_or_else(|_| "Users".to_string());

        let valkey_url =
            std::env::var("VALKEY_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

        let database_url_pg = required("DATABASE_URL_PG")?;
        let database_url_mysql = required("DATABASE_URL_MYSQL")?;

        let health_check_cache_enabled = parse_bool("HEALTH_CHECK_CACHE_ENABLED", true)?;
        let health_check_cache_ttl =
            Duration::from_secs(parse_u64("HEALTH_CHECK_CACHE_SECONDS", 60)?);

        Ok(Self {
            addr,
            app_env,
            app_name,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level,
            cors_allowed_origins,
            auth,
            firebase,
            profile_store,
            profile_collection,
            valkey_url,
            database_url_pg,
            database_url_mysql,
            health_check_cache_enabled,
            health_check_cache_ttl,
        })
    }
}

impl AuthSettings {
    /// Startup gate for the debug bypass: both the flag and a non-production
    /// environment are required, and the flag alone in production is fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.debug_bypass_enabled && self.is_production {
            return Err(ConfigError::Insecure("DEBUG_BYPASS_ENABLED"));
        }
        if self.debug_bypass_enabled && self.debug_bypass_token.is_none() {
            return Err(ConfigError::Missing("DEBUG_BYPASS_TOKEN"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid("REQUEST_TIMEOUT_MS"));
        }
        if self.admin_scope_name.trim().is_empty() {
            return Err(ConfigError::Invalid("ADMIN_SCOPE_NAME"));
        }
        Ok(())
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn parse_bool(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(ConfigError::Invalid(key)),
        },
        Err(_) => Ok(default),
    }
}

fn parse_u64(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

fn parse_url(key: &'static str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    Url::parse(raw.trim()).map_err(|_| ConfigError::Invalid(key))
}
