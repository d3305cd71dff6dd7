//! Admin configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ADMIN_DATABASE_URL` - `PostgreSQL` connection string for the session
//!   store (falls back to `DATABASE_URL`)
//! - `ADMIN_BASE_URL` - Public URL for the admin panel
//! - `MARKETLINE_API_URL` - Base URL of the backend REST API
//!
//! ## Optional
//! - `ADMIN_HOST` - Bind address (default: 127.0.0.1)
//! - `ADMIN_PORT` - Listen port (default: 3001)
//! - `API_TIMEOUT_SECS` - Backend request timeout (default: 10)
//! - `STOREFRONT_URL` - Public storefront URL, for "view in shop" links
//! - `ADMIN_PAGE_SIZE` - Rows per listing page (default: 20)
//! - `LOG_FORMAT` - `json` for JSON logs, anything else for human-readable
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.1)

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Admin application configuration.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the admin panel, without trailing slash
    pub base_url: String,
    /// Public storefront URL, without trailing slash
    pub storefront_url: Option<String>,
    /// Backend API configuration
    pub api: ApiConfig,
    /// Rows per listing page
    pub page_size: u32,
    /// Emit JSON logs
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Backend REST API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL, e.g. `https://api.example.com/api`
    pub base_url: Url,
    /// Per-request timeout
    pub timeout: Duration,
}

impl AdminConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("ADMIN_DATABASE_URL")?;
        let host = get_parsed_or_default::<IpAddr>("ADMIN_HOST", "127.0.0.1")?;
        let port = get_parsed_or_default::<u16>("ADMIN_PORT", "3001")?;
        let base_url = normalize_base_url("ADMIN_BASE_URL", &get_required_env("ADMIN_BASE_URL")?)?;
        let storefront_url = get_optional_env("STOREFRONT_URL")
            .map(|url| normalize_base_url("STOREFRONT_URL", &url))
            .transpose()?;
        let api = ApiConfig::from_env()?;
        let page_size = get_parsed_or_default::<u32>("ADMIN_PAGE_SIZE", "20")?.max(1);
        let log_json = get_optional_env("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json"));

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            storefront_url,
            api,
            page_size,
            log_json,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: get_parsed_or_default("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: get_parsed_or_default("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the admin panel is served over HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Storefront page for a product, when the storefront URL is known.
    #[must_use]
    pub fn storefront_product_url(&self, product_id: impl std::fmt::Display) -> Option<String> {
        self.storefront_url
            .as_ref()
            .map(|base| format!("{base}/products/{product_id}"))
    }
}

impl ApiConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw = get_required_env("MARKETLINE_API_URL")?;
        let base_url = Url::parse(&normalize_base_url("MARKETLINE_API_URL", &raw)?)
            .map_err(|e| ConfigError::InvalidEnvVar("MARKETLINE_API_URL".to_string(), e.to_string()))?;

        Ok(Self {
            base_url,
            timeout: Duration::from_secs(get_parsed_or_default("API_TIMEOUT_SECS", "10")?),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable, falling back to a default literal.
fn get_parsed_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Check that a base URL is absolute http(s) and strip the trailing slash.
fn normalize_base_url(key: &str, value: &str) -> Result<String, ConfigError> {
    let url = Url::parse(value.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// Configuration pointing at unreachable local services.
    pub(crate) fn test_config() -> AdminConfig {
        AdminConfig {
            database_url: SecretString::from("postgres://localhost/marketline_admin_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3001,
            base_url: "http://localhost:3001".to_string(),
            storefront_url: Some("http://localhost:3000".to_string()),
            api: ApiConfig {
                base_url: Url::parse("http://127.0.0.1:9/api").unwrap(),
                timeout: Duration::from_millis(200),
            },
            page_size: 20,
            log_json: false,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        }
    }

    #[test]
    fn test_socket_addr() {
        let addr = test_config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3001);
    }

    #[test]
    fn test_storefront_product_url() {
        let mut config = test_config();
        assert_eq!(
            config.storefront_product_url(42).as_deref(),
            Some("http://localhost:3000/products/42")
        );
        config.storefront_url = None;
        assert!(config.storefront_product_url(42).is_none());
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("X", "https://admin.example.vn/").unwrap(),
            "https://admin.example.vn"
        );
        assert!(normalize_base_url("X", "admin.example.vn").is_err());
        assert!(normalize_base_url("X", "ftp://admin.example.vn").is_err());
    }

    #[test]
    fn test_database_url_debug_is_redacted() {
        let debug_output = format!("{:?}", test_config());
        assert!(!debug_output.contains("marketline_admin_test"));
    }
}
