//! Centralized configuration for api-server.
//!
//! All environment variables are loaded and validated at startup to fail fast
//! on misconfiguration rather than at request time.

use axum::http::{HeaderValue, StatusCode};
use std::env;
use std::fmt;
use std::path::PathBuf;

/// Storage backend provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageProvider {
    /// In-memory storage (data lost on restart)
    Memory,
    /// SQLite file-based storage
    Sqlite,
}

impl StorageProvider {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("sqlite") {
            Self::Sqlite
        } else {
            Self::Memory
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Temporary redirect flavour used for keyword hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectStatus {
    /// 302 Found
    Found,
    /// 307 Temporary Redirect (method preserved)
    Temporary,
}

impl RedirectStatus {
    fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "302" => Some(Self::Found),
            "307" => Some(Self::Temporary),
            _ => None,
        }
    }

    pub fn status_code(self) -> StatusCode {
        match self {
            Self::Found => StatusCode::FOUND,
            Self::Temporary => StatusCode::TEMPORARY_REDIRECT,
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration error for {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Server configuration loaded from environment variables.
///
/// All fields are validated at construction time.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3001)
    pub port: u16,
    /// CORS allow origin for the admin API
    pub cors_allow_origin: HeaderValue,
    /// Storage provider
    pub storage_provider: StorageProvider,
    /// SQLite database path (when using sqlite storage)
    pub db_path: PathBuf,
    /// Log format
    pub log_format: LogFormat,
    /// Status code used for keyword redirects
    pub redirect_status: RedirectStatus,
    /// Bearer token guarding the admin API; `None` leaves it open
    pub admin_token: Option<String>,
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// Fails fast on invalid configuration.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`] but reading values through `get`.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Port
        let port: u16 = match get("PORT") {
            Some(s) => s.trim().parse().map_err(|_| ConfigError {
                field: "PORT",
                message: format!("'{}' is not a valid port", s),
            })?,
            None => 3001,
        };

        // CORS allow origin
        let cors_origin_str = get("CORS_ALLOW_ORIGIN").unwrap_or_else(|| "*".into());
        let cors_allow_origin = if cors_origin_str == "*" {
            HeaderValue::from_static("*")
        } else {
            HeaderValue::from_str(&cors_origin_str).map_err(|e| ConfigError {
                field: "CORS_ALLOW_ORIGIN",
                message: format!("Invalid header value '{}': {}", cors_origin_str, e),
            })?
        };

        // Storage provider
        let storage_provider =
            StorageProvider::from_str(&get("STORAGE_PROVIDER").unwrap_or_else(|| "sqlite".into()));

        // DB path (for sqlite)
        let db_path = get("DB_PATH")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/redirects.db"));

        // Log format
        let log_format = LogFormat::from_str(&get("LOG_FORMAT").unwrap_or_else(|| "pretty".into()));

        // Redirect status
        let redirect_status = match get("REDIRECT_STATUS") {
            Some(s) => RedirectStatus::parse(&s).ok_or_else(|| ConfigError {
                field: "REDIRECT_STATUS",
                message: format!("'{}' must be 302 or 307", s),
            })?,
            None => RedirectStatus::Found,
        };

        // Admin token
        let admin_token = get("ADMIN_TOKEN")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if let Some(token) = &admin_token {
            if HeaderValue::from_str(&format!("Bearer {}", token)).is_err() {
                return Err(ConfigError {
                    field: "ADMIN_TOKEN",
                    message: "must be a valid header value".into(),
                });
            }
        }

        Ok(Self {
            port,
            cors_allow_origin,
            storage_provider,
            db_path,
            log_format,
            redirect_status,
            admin_token,
        })
    }

    /// Log warnings about insecure configuration.
    pub fn warn_if_insecure(&self) {
        if self.admin_token.is_none() {
            tracing::warn!(
                "ADMIN_TOKEN not set: the admin API under /api/lists accepts unauthenticated \
                 requests. DO NOT USE IN PRODUCTION."
            );
        }
        if self.storage_provider == StorageProvider::Memory {
            tracing::warn!("STORAGE_PROVIDER=memory: redirect lists are lost on restart.");
        }
    }
}
