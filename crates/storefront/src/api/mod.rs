//! Client for the Marketline backend REST API.
//!
//! # Architecture
//!
//! - The backend is the source of truth for catalog, accounts, orders,
//!   payments and invoices. Nothing is synced locally.
//! - Catalog reads are cached in memory via `moka` (TTL from config).
//! - Authenticated calls forward the customer's bearer token.
//!
//! # Example
//!
//! ```rust,ignore
//! use marketline_storefront::api::{ApiClient, ProductQuery};
//!
//! let client = ApiClient::new(&config.api)?;
//! let page = client.list_products(&ProductQuery::new(12)).await?;
//! let product = client.get_product(page.items[0].id).await?;
//! ```

mod account;
mod cache;
mod catalog;
mod orders;
pub mod types;

pub use types::*;

use std::fmt;
use std::sync::Arc;

use moka::future::Cache;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ApiConfig;

use cache::CacheValue;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure or timeout.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the expected JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found (404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or expired token (401).
    #[error("Unauthorized")]
    Unauthorized,

    /// Authenticated but not allowed (403).
    #[error("Forbidden")]
    Forbidden,

    /// Request rejected by backend validation (400, 409, 422).
    #[error("{0}")]
    Validation(String),

    /// Any other non-success status.
    #[error("Backend error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),
}

impl ApiError {
    /// Message safe to show to a shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::NotFound(_) => "The requested item could not be found.".to_string(),
            Self::Unauthorized => "Your session has expired, please sign in again.".to_string(),
            Self::Forbidden => "You are not allowed to do that.".to_string(),
            Self::RateLimited(secs) => {
                format!("Too many requests, please try again in {secs} seconds.")
            }
            Self::Http(_) | Self::Parse(_) | Self::Server { .. } => {
                "The shop is temporarily unavailable, please try again.".to_string()
            }
        }
    }

    /// Whether the failure is on the backend side rather than the request.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Parse(_) | Self::Server { .. })
    }
}

/// Backend bearer token.
///
/// Stored in the session alongside the user identity. `Debug` never prints
/// the value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

/// Successful responses may wrap the payload in a `data` envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } | Self::Bare(data) => data,
        }
    }
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the backend REST API.
///
/// Cheap to clone; clones share the connection pool and the catalog cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: String,
    cache: Cache<String, CacheValue>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("marketline-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(config.cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
                cache,
            }),
        })
    }

    /// Build a request for `path` (which starts with `/`).
    fn request(&self, method: Method, path: &str, token: Option<&AccessToken>) -> RequestBuilder {
        let request = self
            .inner
            .client
            .request(method, format!("{}{path}", self.inner.base_url))
            .header("Accept", "application/json");

        match token {
            Some(token) => request.bearer_auth(token.expose()),
            None => request,
        }
    }

    /// Send a request and decode the JSON body.
    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let body = self.send(request).await?;

        match serde_json::from_str::<Envelope<T>>(&body) {
            Ok(envelope) => Ok(envelope.into_inner()),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %body.chars().take(500).collect::<String>(),
                    "Failed to parse backend response"
                );
                Err(ApiError::Parse(e))
            }
        }
    }

    /// Send a request whose response body is not needed.
    async fn execute_empty(&self, request: RequestBuilder) -> Result<(), ApiError> {
        self.send(request).await.map(|_| ())
    }

    /// Send a request, map error statuses, and return the raw body.
    async fn send(&self, request: RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        // Read as text first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            let error = error_from_status(status, &body);
            if error.is_server_error() {
                tracing::error!(
                    status = %status,
                    body = %body.chars().take(500).collect::<String>(),
                    "Backend returned non-success status"
                );
            } else {
                tracing::debug!(status = %status, error = %error, "Backend rejected request");
            }
            return Err(error);
        }

        Ok(body)
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&AccessToken>,
    ) -> Result<T, ApiError> {
        self.execute(self.request(Method::GET, path, token)).await
    }

    pub(crate) async fn get_with_query<T, Q>(
        &self,
        path: &str,
        query: &Q,
        token: Option<&AccessToken>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.execute(self.request(Method::GET, path, token).query(query))
            .await
    }

    pub(crate) async fn send_json<T, B>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        token: Option<&AccessToken>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(self.request(method, path, token).json(body))
            .await
    }

    pub(crate) async fn send_empty(
        &self,
        method: Method,
        path: &str,
        token: Option<&AccessToken>,
    ) -> Result<(), ApiError> {
        self.execute_empty(self.request(method, path, token)).await
    }
}

/// Map a non-success status and body to an `ApiError`.
fn error_from_status(status: StatusCode, body: &str) -> ApiError {
    let message = error_message(body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    });

    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
        StatusCode::FORBIDDEN => ApiError::Forbidden,
        StatusCode::NOT_FOUND => ApiError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            ApiError::Validation(message)
        }
        _ => ApiError::Server {
            status: status.as_u16(),
            message,
        },
    }
}

/// Extract a human readable message from an error body.
///
/// Accepts `{"message": "..."}`, `{"message": ["...", "..."]}` and
/// `{"error": "..."}`.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let field = value.get("message").or_else(|| value.get("error"))?;

    match field {
        serde_json::Value::String(message) if !message.trim().is_empty() => {
            Some(message.clone())
        }
        serde_json::Value::Array(messages) => {
            let joined = messages
                .iter()
                .filter_map(serde_json::Value::as_str)
                .collect::<Vec<_>>()
                .join("; ");
            (!joined.is_empty()).then_some(joined)
        }
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::time::Duration;

    use axum::Router;
    use axum::response::IntoResponse;
    use url::Url;

    use super::*;

    /// Serve `router` on an ephemeral port and return a client pointed at it.
    pub(crate) async fn stub_backend(router: Router) -> ApiClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        ApiClient::new(&ApiConfig {
            base_url: Url::parse(&format!("http://{addr}/api")).unwrap(),
            timeout: Duration::from_secs(5),
            cache_ttl: Duration::from_secs(60),
        })
        .unwrap()
    }

    #[test]
    fn test_error_from_status_mapping() {
        assert!(matches!(
            error_from_status(StatusCode::UNAUTHORIZED, ""),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            error_from_status(StatusCode::FORBIDDEN, ""),
            ApiError::Forbidden
        ));
        assert!(matches!(
            error_from_status(StatusCode::NOT_FOUND, ""),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            error_from_status(StatusCode::BAD_GATEWAY, "oops"),
            ApiError::Server { status: 502, .. }
        ));
    }

    #[test]
    fn test_validation_message_from_body() {
        let err = error_from_status(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"message":"Email already registered"}"#,
        );
        assert_eq!(err.to_string(), "Email already registered");
        assert_eq!(err.user_message(), "Email already registered");

        let err = error_from_status(StatusCode::CONFLICT, r#"{"error":"Out of stock"}"#);
        assert_eq!(err.to_string(), "Out of stock");

        let err = error_from_status(
            StatusCode::BAD_REQUEST,
            r#"{"message":["name is required","price must be positive"]}"#,
        );
        assert_eq!(
            err.to_string(),
            "name is required; price must be positive"
        );
    }

    #[test]
    fn test_validation_without_body_uses_reason() {
        let err = error_from_status(StatusCode::BAD_REQUEST, "not json");
        assert_eq!(err.to_string(), "Bad Request");
    }

    #[test]
    fn test_server_errors_hide_details_from_users() {
        let err = error_from_status(StatusCode::INTERNAL_SERVER_ERROR, r#"{"message":"pg down"}"#);
        assert!(err.is_server_error());
        assert!(!err.user_message().contains("pg down"));
    }

    #[test]
    fn test_access_token_debug_is_redacted() {
        let token = AccessToken::new("very-secret");
        assert_eq!(format!("{token:?}"), "AccessToken([REDACTED])");
        assert_eq!(token.expose(), "very-secret");
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"very-secret\"");
    }

    #[test]
    fn test_envelope_accepts_wrapped_and_bare() {
        let wrapped: Envelope<Vec<u32>> = serde_json::from_str(r#"{"data":[1,2]}"#).unwrap();
        assert_eq!(wrapped.into_inner(), vec![1, 2]);
        let bare: Envelope<Vec<u32>> = serde_json::from_str("[3]").unwrap();
        assert_eq!(bare.into_inner(), vec![3]);
    }

    #[tokio::test]
    async fn test_rate_limited_reads_retry_after() {
        use axum::http::{HeaderMap, StatusCode as AxumStatus};
        use axum::routing::get;

        let router = Router::new().route(
            "/api/categories",
            get(|| async {
                let mut headers = HeaderMap::new();
                headers.insert("Retry-After", "7".parse().unwrap());
                (AxumStatus::TOO_MANY_REQUESTS, headers, "slow down")
            }),
        );
        let client = stub_backend(router).await;

        let err = client.list_categories().await.unwrap_err();
        assert!(matches!(err, ApiError::RateLimited(7)));
    }

    #[tokio::test]
    async fn test_bearer_token_is_forwarded() {
        use axum::http::HeaderMap;
        use axum::routing::get;

        let router = Router::new().route(
            "/api/auth/me",
            get(|headers: HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                if auth == "Bearer tok-1" {
                    axum::Json(serde_json::json!({
                        "id": 5, "email": "lan@example.vn", "full_name": "Lan"
                    }))
                    .into_response()
                } else {
                    axum::http::StatusCode::UNAUTHORIZED.into_response()
                }
            }),
        );
        let client = stub_backend(router).await;

        let user = client.me(&AccessToken::new("tok-1")).await.unwrap();
        assert_eq!(user.full_name, "Lan");

        let err = client.me(&AccessToken::new("other")).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }
}
