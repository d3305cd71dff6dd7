//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                        - Health check
//! GET  /health/ready                  - Readiness (session database)
//!
//! # Dashboard
//! GET  /                              - Dashboard overview
//!
//! # Auth (backend accounts with the admin role)
//! GET  /auth/login                    - Login page
//! POST /auth/login                    - Login action (rate limited)
//! POST /auth/logout                   - Logout
//!
//! # Products
//! GET  /products                      - Product listing (search, category, paging)
//! GET  /products/new                  - New product form
//! POST /products                      - Create (multipart, optional image)
//! GET  /products/{id}/edit            - Edit form
//! POST /products/{id}                 - Update (multipart, optional image)
//! POST /products/{id}/delete          - Delete
//!
//! # Categories
//! GET  /categories                    - Category listing
//! GET  /categories/new                - New category form
//! POST /categories                    - Create
//! GET  /categories/{id}/edit          - Edit form
//! POST /categories/{id}               - Update
//! POST /categories/{id}/visibility - Show or hide
//! POST /categories/{id}/delete        - Delete
//!
//! # Reviews
//! GET  /reviews                       - Review listing (product, visibility, paging)
//! POST /reviews/{id}/visibility       - Show or hide
//! POST /reviews/{id}/delete           - Delete
//!
//! # Orders
//! GET  /orders                        - Order listing (status, search, paging)
//! GET  /orders/{id}                   - Order detail
//! POST /orders/{id}/status            - Change status
//! POST /orders/{id}/invoice           - Issue the invoice
//!
//! # Invoices
//! GET  /invoices                      - Invoice listing
//! GET  /invoices/{id}                 - Printable invoice
//! ```

pub mod auth;
pub mod categories;
pub mod dashboard;
pub mod invoices;
pub mod orders;
pub mod products;
pub mod reviews;

use axum::Router;

use crate::api::ApiError;
use crate::error::Result;
use crate::state::AppState;

/// Create all routes for the admin panel.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(dashboard::router())
        .merge(auth::router())
        .merge(products::router())
        .merge(categories::router())
        .merge(reviews::router())
        .merge(orders::router())
        .merge(invoices::router())
}

/// Keep a page usable when one of its backend reads fails.
///
/// An expired token still propagates (and signs the admin out); any other
/// failure is logged and returned as a message for an inline alert.
pub(crate) fn recover<T>(
    result: std::result::Result<T, ApiError>,
    what: &str,
) -> Result<(Option<T>, Option<String>)> {
    match result {
        Ok(value) => Ok((Some(value), None)),
        Err(ApiError::Unauthorized) => Err(ApiError::Unauthorized.into()),
        Err(e) => {
            tracing::error!("Failed to fetch {what}: {e}");
            Ok((None, Some(e.user_message())))
        }
    }
}

/// Redirect target for an action posted from a filtered listing.
///
/// Only paths under `section` are honoured.
pub(crate) fn return_path(return_to: Option<&str>, section: &str) -> String {
    match return_to {
        Some(path)
            if path.starts_with(section)
                && !path.starts_with("//")
                && !path.contains("://")
                && !path.contains('\\')
                && !path.chars().any(char::is_control) =>
        {
            path.to_string()
        }
        _ => section.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_recover_keeps_expired_token_fatal() {
        let result: std::result::Result<u32, ApiError> = Err(ApiError::Unauthorized);
        assert!(matches!(
            recover(result, "stats"),
            Err(AppError::Api(ApiError::Unauthorized))
        ));

        let result: std::result::Result<u32, ApiError> = Err(ApiError::Server {
            status: 500,
            message: "boom".to_string(),
        });
        let (value, message) = recover(result, "stats").unwrap();
        assert!(value.is_none());
        assert!(!message.unwrap().contains("boom"));

        let (value, message) = recover(Ok(3), "stats").unwrap();
        assert_eq!(value, Some(3));
        assert!(message.is_none());
    }

    #[test]
    fn test_return_path_stays_in_section() {
        assert_eq!(
            return_path(Some("/reviews?visibility=hidden&page=2"), "/reviews"),
            "/reviews?visibility=hidden&page=2"
        );
        assert_eq!(return_path(Some("https://evil.example"), "/reviews"), "/reviews");
        assert_eq!(return_path(Some("/orders"), "/reviews"), "/reviews");
        assert_eq!(return_path(None, "/reviews"), "/reviews");
        assert_eq!(
            return_path(Some("/reviews\r\nSet-Cookie: x=1"), "/reviews"),
            "/reviews"
        );
    }
}
