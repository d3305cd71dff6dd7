//! Client for the Marketline backend REST API, staff side.
//!
//! Every call forwards the signed-in staff member's bearer token; the
//! backend checks the `admin` role on each `/admin/*` endpoint. Nothing is
//! cached so every page shows the backend's current state.
//!
//! # Example
//!
//! ```rust,ignore
//! use marketline_admin::api::{ApiClient, ProductQuery};
//!
//! let client = ApiClient::new(&config.api)?;
//! let stats = client.stats(&admin.token).await?;
//! let page = client.list_products(&ProductQuery::new(20)).await?;
//! ```

mod catalog;
mod orders;
mod reviews;
pub mod types;

pub use types::*;

use std::fmt;
use std::sync::Arc;

use reqwest::multipart::Form;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::config::ApiConfig;

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

    /// Authenticated but not an administrator (403).
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
    /// Message safe to show to staff.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::NotFound(_) => "The record no longer exists.".to_string(),
            Self::Unauthorized => "Your session has expired, please sign in again.".to_string(),
            Self::Forbidden => "Your account does not have administrator access.".to_string(),
            Self::RateLimited(secs) => {
                format!("Too many requests, please try again in {secs} seconds.")
            }
            Self::Http(_) | Self::Parse(_) | Self::Server { .. } => {
                "The backend is unavailable, please try again.".to_string()
            }
        }
    }

    /// Whether the failure is on the backend side rather than the request.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Parse(_) | Self::Server { .. })
    }
}

/// Backend bearer token. `Debug` never prints the value.
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
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: String,
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
            .user_agent(concat!("marketline-admin/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
            }),
        })
    }

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
        token: &AccessToken,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(self.request(method, path, Some(token)).json(body))
            .await
    }

    pub(crate) async fn send_empty(
        &self,
        method: Method,
        path: &str,
        token: &AccessToken,
    ) -> Result<(), ApiError> {
        self.send(self.request(method, path, Some(token)))
            .await
            .map(|_| ())
    }

    // =========================================================================
    // Auth and Dashboard
    // =========================================================================

    /// Exchange credentials for a token.
    ///
    /// The caller decides whether the returned account may use the admin
    /// panel.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` for bad credentials, or an error if
    /// the API request fails.
    #[instrument(skip_all, fields(email = %request.email))]
    pub async fn login(&self, request: &LoginRequest<'_>) -> Result<AuthResponse, ApiError> {
        self.execute(self.request(Method::POST, "/auth/login", None).json(request))
            .await
    }

    /// Shop-wide counters for the dashboard.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip_all)]
    pub async fn stats(&self, token: &AccessToken) -> Result<DashboardStats, ApiError> {
        self.get("/admin/stats", Some(token)).await
    }

    /// Upload a product image and return its public URL.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` if the backend rejects the file, or
    /// an error if the API request fails.
    #[instrument(skip(self, token, bytes), fields(size = bytes.len()))]
    pub async fn upload_image(
        &self,
        token: &AccessToken,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ApiError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)?;
        let form = Form::new().part("file", part);

        let upload: UploadResponse = self
            .execute(
                self.request(Method::POST, "/admin/uploads", Some(token))
                    .multipart(form),
            )
            .await?;
        Ok(upload.url)
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
    use axum::extract::Multipart;
    use axum::http::HeaderMap;
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
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
        })
        .unwrap()
    }

    /// Whether the stub received the expected bearer token.
    pub(crate) fn has_token(headers: &HeaderMap, token: &str) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == format!("Bearer {token}"))
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
            error_from_status(StatusCode::SERVICE_UNAVAILABLE, ""),
            ApiError::Server { status: 503, .. }
        ));
    }

    #[test]
    fn test_validation_messages_are_joined() {
        let err = error_from_status(
            StatusCode::BAD_REQUEST,
            r#"{"message":["name is required","price must be positive"]}"#,
        );
        assert_eq!(err.user_message(), "name is required; price must be positive");

        let err = error_from_status(StatusCode::CONFLICT, r#"{"error":"Category has products"}"#);
        assert_eq!(err.to_string(), "Category has products");
    }

    #[test]
    fn test_access_token_debug_is_redacted() {
        let token = AccessToken::new("staff-secret");
        assert_eq!(format!("{token:?}"), "AccessToken([REDACTED])");
    }

    #[tokio::test]
    async fn test_stats_forward_token() {
        let router = Router::new().route(
            "/api/admin/stats",
            get(|headers: HeaderMap| async move {
                if has_token(&headers, "staff") {
                    axum::Json(serde_json::json!({
                        "data": {
                            "total_orders": 12,
                            "pending_orders": 3,
                            "total_revenue": "4500000",
                            "total_products": 40,
                            "total_customers": 9
                        }
                    }))
                    .into_response()
                } else {
                    axum::http::StatusCode::FORBIDDEN.into_response()
                }
            }),
        );
        let client = stub_backend(router).await;

        let stats = client.stats(&AccessToken::new("staff")).await.unwrap();
        assert_eq!(stats.total_orders, 12);
        assert_eq!(stats.pending_orders, 3);
        assert_eq!(stats.low_stock_products, 0);

        let err = client.stats(&AccessToken::new("customer")).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden));
    }

    #[tokio::test]
    async fn test_upload_image_sends_multipart_file() {
        let router = Router::new().route(
            "/api/admin/uploads",
            post(|mut multipart: Multipart| async move {
                let field = multipart.next_field().await.unwrap().unwrap();
                let name = field.name().unwrap_or_default().to_string();
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.unwrap();
                axum::Json(serde_json::json!({
                    "url": format!("https://cdn.example.vn/{name}/{file_name}/{}", bytes.len())
                }))
            }),
        );
        let client = stub_backend(router).await;

        let url = client
            .upload_image(&AccessToken::new("staff"), "mug.png", "image/png", vec![1, 2, 3])
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example.vn/file/mug.png/3");
    }

    #[tokio::test]
    async fn test_login_returns_account_and_token() {
        let router = Router::new().route(
            "/api/auth/login",
            post(|| async {
                axum::Json(serde_json::json!({
                    "token": "t-1",
                    "user": { "id": 1, "email": "admin@example.vn", "full_name": "Admin", "role": "admin" }
                }))
            }),
        );
        let client = stub_backend(router).await;

        let auth = client
            .login(&LoginRequest {
                email: "admin@example.vn",
                password: "pw",
            })
            .await
            .unwrap();
        assert_eq!(auth.token, "t-1");
        assert!(auth.user.role.is_admin());
    }
}
