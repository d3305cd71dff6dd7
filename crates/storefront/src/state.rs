//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::api::{ApiClient, ApiError};
use crate::config::StorefrontConfig;

/// Application state shared across all handlers.
///
/// Cheap to clone via `Arc`; gives access to configuration, the session
/// database pool, and the backend API client.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    api: ApiClient,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the API client cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config.api)?;

        Ok(Self {
            inner: Arc::new(AppStateInner { config, pool, api }),
        })
    }

    /// State around an existing API client (tests point it at a stub backend).
    #[cfg(test)]
    pub(crate) fn with_api(config: StorefrontConfig, pool: PgPool, api: ApiClient) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, pool, api }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the session database pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the backend API client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::sync::Arc;

    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use axum::response::Response;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use tower_sessions::session::Id;
    use tower_sessions::{MemoryStore, Session};

    use marketline_core::{Cart, UserId, UserRole};

    use super::*;
    use crate::api::AccessToken;
    use crate::config::tests::test_config;
    use crate::middleware::session::SESSION_COOKIE_NAME;
    use crate::middleware::session_layer;
    use crate::models::{CurrentUser, session_keys};

    /// State whose backend calls go to `api`.
    pub(crate) fn test_state(api: ApiClient) -> AppState {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/marketline_test")
            .unwrap();
        AppState::with_api(test_config(), pool, api)
    }

    /// A signed-in customer.
    pub(crate) fn test_user() -> CurrentUser {
        CurrentUser {
            id: UserId::new(7),
            email: "lan@example.vn".to_string(),
            full_name: "Nguyen Thi Lan".to_string(),
            role: UserRole::Customer,
            token: AccessToken::new("tok-lan"),
        }
    }

    /// The full storefront router over an in-memory session store.
    ///
    /// Sessions are seeded straight into the store and addressed by cookie,
    /// so requests go through every layer the real app has.
    pub(crate) struct TestApp {
        router: Router,
        store: MemoryStore,
    }

    impl TestApp {
        pub(crate) fn new(api: ApiClient) -> Self {
            let store = MemoryStore::default();
            let router = crate::build_router(test_state(api), session_layer(store.clone(), false));
            Self { router, store }
        }

        /// Create a session holding `user` and `cart`, returning its ID.
        pub(crate) async fn seed(&self, user: Option<&CurrentUser>, cart: Option<&Cart>) -> Id {
            let session = Session::new(None, Arc::new(self.store.clone()), None);
            if let Some(user) = user {
                session
                    .insert(session_keys::CURRENT_USER, user)
                    .await
                    .unwrap();
            }
            if let Some(cart) = cart {
                session.insert(session_keys::CART, cart).await.unwrap();
            }
            session.save().await.unwrap();
            session.id().unwrap()
        }

        /// Reopen a stored session after a request.
        pub(crate) fn session(&self, id: Id) -> Session {
            Session::new(Some(id), Arc::new(self.store.clone()), None)
        }

        pub(crate) async fn get(&self, id: Id, uri: &str) -> Response {
            let request = Request::builder()
                .uri(uri)
                .header(header::COOKIE, format!("{SESSION_COOKIE_NAME}={id}"))
                .body(Body::empty())
                .unwrap();
            self.router.clone().oneshot(request).await.unwrap()
        }

        pub(crate) async fn post_form(&self, id: Id, uri: &str, body: &str) -> Response {
            let request = Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::COOKIE, format!("{SESSION_COOKIE_NAME}={id}"))
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body.to_string()))
                .unwrap();
            self.router.clone().oneshot(request).await.unwrap()
        }
    }

    /// Response body as text.
    pub(crate) async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }
}
