//! Cart store persisted in the session.
//!
//! The cart only holds product IDs, quantities and selection. Names, prices
//! and stock are resolved from the backend catalog every time the cart is
//! shown, and the stored cart is corrected when the catalog has moved on.

use std::collections::HashMap;

use tower_sessions::Session;

use marketline_core::{Cart, CartAdjustment, CatalogEntry, PricedCart, ProductId};

use crate::api::ApiClient;
use crate::error::AppError;
use crate::models::session_keys;

/// Load the cart from the session (empty when none is stored).
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn load(session: &Session) -> Result<Cart, tower_sessions::session::Error> {
    Ok(session
        .get::<Cart>(session_keys::CART)
        .await?
        .unwrap_or_default())
}

/// Store the cart in the session.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn save(session: &Session, cart: &Cart) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CART, cart).await
}

/// Total units in the stored cart, for the header badge.
pub async fn count(session: &Session) -> u32 {
    load(session)
        .await
        .map(|cart| cart.total_quantity())
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to load cart for badge: {e}");
            0
        })
}

/// A cart checked against the current catalog.
#[derive(Debug, Clone)]
pub struct CartSnapshot {
    pub cart: Cart,
    pub priced: PricedCart,
    /// What reconciliation changed, for toasts.
    pub adjustments: Vec<CartAdjustment>,
}

impl CartSnapshot {
    /// A snapshot without catalog data: every line shows as unavailable.
    #[must_use]
    pub fn unpriced(cart: Cart) -> Self {
        Self {
            priced: cart.price(&HashMap::<ProductId, CatalogEntry>::new()),
            cart,
            adjustments: Vec::new(),
        }
    }
}

/// Load the cart, reconcile it against the backend catalog, and price it.
///
/// The corrected cart is written back when anything changed.
///
/// # Errors
///
/// Returns an error if the session store or the catalog lookup fails.
pub async fn snapshot(api: &ApiClient, session: &Session) -> Result<CartSnapshot, AppError> {
    let mut cart = load(session).await?;
    if cart.is_empty() {
        return Ok(CartSnapshot::unpriced(cart));
    }

    let catalog = api.cart_catalog(&cart.product_ids()).await?;
    let adjustments = cart.reconcile(&catalog);
    if !adjustments.is_empty() {
        tracing::info!(count = adjustments.len(), "Cart reconciled against catalog");
        save(session, &cart).await?;
    }

    let priced = cart.price(&catalog);
    Ok(CartSnapshot {
        cart,
        priced,
        adjustments,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use tower_sessions::MemoryStore;

    use marketline_core::{Availability, Vnd};

    use super::*;
    use crate::api::tests::stub_backend;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_load_defaults_to_empty_cart() {
        let session = session();
        let cart = load(&session).await.unwrap();
        assert!(cart.is_empty());
        assert_eq!(count(&session).await, 0);
    }

    #[tokio::test]
    async fn test_save_then_count() {
        let session = session();
        let mut cart = Cart::default();
        cart.add(ProductId::new(1), 2, 10).unwrap();
        cart.add(ProductId::new(2), 1, 10).unwrap();
        save(&session, &cart).await.unwrap();

        assert_eq!(count(&session).await, 3);
    }

    #[tokio::test]
    async fn test_snapshot_reconciles_and_persists() {
        let router = Router::new().route(
            "/api/products/{id}",
            get(|Path(id): Path<i64>| async move {
                match id {
                    1 => Json(json!({ "id": 1, "name": "Mug", "price": 50000, "stock": 2 }))
                        .into_response(),
                    _ => StatusCode::NOT_FOUND.into_response(),
                }
            }),
        );
        let api = stub_backend(router).await;
        let session = session();

        let mut cart = Cart::default();
        cart.add(ProductId::new(1), 2, 10).unwrap();
        cart.set_quantity(ProductId::new(1), 5, 10).unwrap();
        cart.add(ProductId::new(9), 1, 10).unwrap();
        save(&session, &cart).await.unwrap();

        let snapshot = snapshot(&api, &session).await.unwrap();
        assert_eq!(snapshot.adjustments.len(), 2);
        assert_eq!(snapshot.cart.len(), 1);
        assert_eq!(snapshot.priced.lines[0].quantity, 2);
        assert_eq!(snapshot.priced.lines[0].availability, Availability::Available);
        assert_eq!(snapshot.priced.selected_subtotal, Vnd::from_dong(100_000));
        assert!(snapshot.priced.checkout_ready());

        let stored = load(&session).await.unwrap();
        assert_eq!(stored.total_quantity(), 2);
    }
}
