//! Application state for admin.

use std::sync::Arc;

use sqlx::PgPool;

use crate::api::{ApiClient, ApiError};
use crate::config::AdminConfig;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    pool: PgPool,
    api: ApiClient,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the API client cannot be built.
    pub fn new(config: AdminConfig, pool: PgPool) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config.api)?;

        Ok(Self {
            inner: Arc::new(AppStateInner { config, pool, api }),
        })
    }

    /// State around an existing client, for handler tests against a stub
    /// backend.
    #[cfg(test)]
    pub(crate) fn with_api(config: AdminConfig, pool: PgPool, api: ApiClient) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, pool, api }),
        }
    }

    /// Get a reference to the admin configuration.
    #[must_use]
    pub fn config(&self) -> &AdminConfig {
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
