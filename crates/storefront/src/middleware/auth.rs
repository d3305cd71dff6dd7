//! Authentication extractors.
//!
//! The signed-in customer lives in the session as a [`CurrentUser`]. Route
//! handlers ask for it with [`RequireAuth`] or [`OptionalAuth`].

use axum::{
    extract::{FromRequestParts, Request},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::error::clear_sentry_user;
use crate::models::{CurrentUser, session_keys};
use crate::services::flash;

/// Extractor that requires a signed-in customer.
///
/// Page requests without one are redirected to the login page with a
/// `next` parameter pointing back at the requested path.
///
/// # Example
///
/// ```rust,ignore
/// async fn orders(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Orders for {}", user.full_name)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Rejection when authentication is required but missing.
pub enum AuthRejection {
    /// Redirect to the login page, then back to `next`.
    RedirectToLogin { next: String },
    /// Plain 401 (in-page fragment requests).
    Unauthorized,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin { next } => Redirect::to(&login_url(&next)).into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

/// Login URL that returns to `next` afterwards.
#[must_use]
pub fn login_url(next: &str) -> String {
    if next.is_empty() || next == "/" {
        "/auth/login".to_string()
    } else {
        format!("/auth/login?next={}", urlencoding::encode(next))
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(AuthRejection::Unauthorized)?;

        let user: Option<CurrentUser> = session
            .get(session_keys::CURRENT_USER)
            .await
            .ok()
            .flatten();

        user.map(Self).ok_or_else(|| {
            if parts.headers.contains_key("hx-request") {
                AuthRejection::Unauthorized
            } else {
                // Only GET targets are worth returning to
                let next = if parts.method == axum::http::Method::GET {
                    parts
                        .uri
                        .path_and_query()
                        .map_or_else(String::new, ToString::to_string)
                } else {
                    String::new()
                };
                AuthRejection::RedirectToLogin { next }
            }
        })
    }
}

/// Extractor that optionally gets the signed-in customer.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<CurrentUser>(session_keys::CURRENT_USER)
                .await
                .ok()
                .flatten(),
            None => None,
        };

        Ok(Self(user))
    }
}

/// Store the signed-in customer in the session.
///
/// The session ID is cycled first so a pre-login session cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Remove the signed-in customer from the session (logout).
///
/// The cart stays in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentUser>(session_keys::CURRENT_USER)
        .await?;
    Ok(())
}

/// Response marker left by handlers whose backend token was rejected.
#[derive(Debug, Clone, Copy)]
pub struct SessionExpired;

/// Sign the customer out when a handler reports an expired backend token.
///
/// The handler's response (a redirect to the login page) is passed through
/// unchanged; this only drops the stale identity and queues a toast.
pub async fn session_expiry_middleware(session: Session, request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    if response.extensions().get::<SessionExpired>().is_some() {
        tracing::info!("Backend token rejected, signing customer out");
        if let Err(e) = clear_current_user(&session).await {
            tracing::warn!("Failed to clear expired session: {e}");
        }
        clear_sentry_user();
        flash::error(&session, "Your session has expired, please sign in again.").await;
    }

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::Router;
    use axum::http::header;
    use axum::routing::get;

    use super::*;
    use crate::api::tests::stub_backend;
    use crate::services::flash::FlashKind;
    use crate::state::tests::{TestApp, test_user};

    #[test]
    fn test_login_url_encodes_next() {
        assert_eq!(login_url("/"), "/auth/login");
        assert_eq!(login_url(""), "/auth/login");
        assert_eq!(
            login_url("/orders?status=pending"),
            "/auth/login?next=%2Forders%3Fstatus%3Dpending"
        );
    }

    #[tokio::test]
    async fn test_rejected_token_signs_customer_out() {
        let backend = Router::new().route(
            "/api/orders",
            get(|| async { StatusCode::UNAUTHORIZED }),
        );
        let app = TestApp::new(stub_backend(backend).await);
        let id = app.seed(Some(&test_user()), None).await;

        let response = app.get(id, "/orders").await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/auth/login");

        let session = app.session(id);
        let user: Option<CurrentUser> = session.get(session_keys::CURRENT_USER).await.unwrap();
        assert!(user.is_none());
        let notices = flash::take(&session).await;
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, FlashKind::Error);
        assert_eq!(
            notices[0].message,
            "Your session has expired, please sign in again."
        );
    }

    #[tokio::test]
    async fn test_signed_in_customer_passes_through() {
        let backend = Router::new().route(
            "/api/orders",
            get(|| async {
                axum::Json(serde_json::json!({ "items": [], "page": 1, "limit": 10, "total": 0 }))
            }),
        );
        let app = TestApp::new(stub_backend(backend).await);
        let id = app.seed(Some(&test_user()), None).await;

        let response = app.get(id, "/orders").await;

        assert_eq!(response.status(), StatusCode::OK);
        let user: Option<CurrentUser> = app
            .session(id)
            .get(session_keys::CURRENT_USER)
            .await
            .unwrap();
        assert_eq!(user.unwrap().email, "lan@example.vn");
    }
}
