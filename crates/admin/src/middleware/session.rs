//! Session middleware configuration for admin.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions with
//! stricter security settings (SameSite=Strict, 24hr expiry). Admin
//! sessions live in their own schema so they never mix with shopper
//! sessions in a shared database.

use sqlx::PgPool;
use thiserror::Error;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::AdminConfig;

/// Session cookie name for admin.
pub const SESSION_COOKIE_NAME: &str = "ml_admin_session";

/// Session expiry time in seconds (24 hours - stricter than storefront).
const SESSION_EXPIRY_SECONDS: i64 = 24 * 60 * 60;

/// Errors raised while preparing the session store.
#[derive(Debug, Error)]
pub enum SessionSetupError {
    #[error("Invalid session table name: {0}")]
    InvalidName(String),
    #[error("Session store migration failed: {0}")]
    Migrate(#[from] sqlx::Error),
}

/// Create the session layer with `PostgreSQL` store.
///
/// The `admin.session` table is created if missing.
///
/// # Errors
///
/// Returns an error if the store cannot be configured or migrated.
pub async fn create_session_layer(
    pool: &PgPool,
    config: &AdminConfig,
) -> Result<SessionManagerLayer<PostgresStore>, SessionSetupError> {
    let store = PostgresStore::new(pool.clone())
        .with_schema_name("admin")
        .map_err(SessionSetupError::InvalidName)?
        .with_table_name("session")
        .map_err(SessionSetupError::InvalidName)?;
    store.migrate().await?;

    Ok(session_layer(store, config.is_secure()))
}

/// Session layer over any store, with the admin cookie settings.
#[must_use]
pub fn session_layer<S: SessionStore + Clone>(store: S, secure: bool) -> SessionManagerLayer<S> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(secure)
        // SameSite=Strict for admin (stricter than storefront's Lax)
        .with_same_site(tower_sessions::cookie::SameSite::Strict)
        .with_http_only(true)
        .with_path("/")
}
