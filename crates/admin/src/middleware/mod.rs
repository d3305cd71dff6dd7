//! HTTP middleware stack for admin.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers (stricter CSP for admin)
//! 5. Session layer (tower-sessions with `PostgreSQL` store)
//! 6. Session expiry (sign out when the backend rejects the token)
//! 7. Rate limiting on the login form (governor)
//!
//! Authentication is enforced per handler with [`RequireAdminAuth`].

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    OptionalAdminAuth, RequireAdminAuth, SessionExpired, clear_current_admin,
    session_expiry_middleware, set_current_admin,
};
pub use rate_limit::login_rate_limiter;
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::{create_session_layer, session_layer};
