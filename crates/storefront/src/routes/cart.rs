//! Cart route handlers.
//!
//! The cart lives in the session (see `services::cart`). Every mutation
//! answers a full navigation with a redirect plus toast, and an in-page
//! request (`HX-Request`) with a fresh fragment and an `HX-Trigger:
//! cart-updated` header so the header badge refreshes.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::HeaderMap,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use marketline_core::{Availability, Cart, CartError, PricedLine, ProductId};

use crate::api::ApiError;
use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::CspNonce;
use crate::services::cart::{self as cart_store, CartSnapshot};
use crate::services::flash;
use crate::state::AppState;
use crate::views::{Layout, is_fragment_request, safe_next};

/// Event name fired after any cart change.
const CART_UPDATED: &str = "cart-updated";

// =============================================================================
// View Types
// =============================================================================

/// Cart line display data for templates.
#[derive(Debug, Clone)]
pub struct CartLineView {
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub unit_price: String,
    pub line_total: String,
    pub quantity: u32,
    pub stock: u32,
    pub selected: bool,
    pub available: bool,
    /// Stock warning shown under the line.
    pub notice: Option<String>,
    pub can_increment: bool,
    pub can_decrement: bool,
}

impl From<&PricedLine> for CartLineView {
    fn from(line: &PricedLine) -> Self {
        let notice = match line.availability {
            Availability::Available => None,
            Availability::ExceedsStock { stock } => Some(format!("Only {stock} left in stock")),
            Availability::OutOfStock => Some("Out of stock".to_string()),
            Availability::Unavailable => Some("No longer available".to_string()),
        };

        Self {
            product_id: line.product_id,
            name: line.name.clone(),
            image: line.image.clone(),
            unit_price: line.unit_price.to_string(),
            line_total: line.line_total.to_string(),
            quantity: line.quantity,
            stock: line.stock,
            selected: line.selected,
            available: line.availability.is_available(),
            notice,
            can_increment: line.quantity < line.stock,
            can_decrement: line.quantity > 1,
        }
    }
}

/// Cart display data for templates.
#[derive(Debug, Clone)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub subtotal: String,
    pub selected_quantity: u32,
    pub total_quantity: u32,
    pub all_selected: bool,
    pub checkout_ready: bool,
}

impl CartView {
    /// Whether there is nothing in the cart.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl From<&CartSnapshot> for CartView {
    fn from(snapshot: &CartSnapshot) -> Self {
        Self {
            lines: snapshot.priced.lines.iter().map(CartLineView::from).collect(),
            subtotal: snapshot.priced.selected_subtotal.to_string(),
            selected_quantity: snapshot.priced.selected_quantity,
            total_quantity: snapshot.cart.total_quantity(),
            all_selected: snapshot.cart.all_selected(),
            checkout_ready: snapshot.priced.checkout_ready(),
        }
    }
}

// =============================================================================
// Form Types
// =============================================================================

/// Form for operations on one line.
#[derive(Debug, Deserialize)]
pub struct LineForm {
    pub product_id: ProductId,
    pub quantity: Option<u32>,
    /// Where to go afterwards on a full navigation.
    pub next: Option<String>,
}

/// Form for ticking or unticking every line.
#[derive(Debug, Deserialize)]
pub struct SelectAllForm {
    /// `true`/`on` ticks every line; anything else unticks.
    pub selected: Option<String>,
    pub next: Option<String>,
}

/// Form carrying only a return path.
#[derive(Debug, Deserialize)]
pub struct NextForm {
    pub next: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub layout: Layout,
    pub cart: CartView,
    pub notice: Option<String>,
}

/// Cart body fragment.
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
    pub notice: Option<String>,
}

/// Cart count badge fragment.
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

/// Result of an add-to-cart request made in place.
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_added.html")]
pub struct CartAddedTemplate {
    pub count: u32,
    pub message: String,
    pub ok: bool,
}

// =============================================================================
// Helpers
// =============================================================================

/// What a cart operation did, for the toast.
enum Outcome {
    /// Applied with nothing to report.
    Done,
    /// Applied, with a message for the shopper.
    Notice(String),
    /// Not applied.
    Rejected(String),
}

/// Quantity changes that need the product's stock.
#[derive(Debug, Clone, Copy)]
enum QuantityChange {
    Set(u32),
    Increment,
    Decrement,
}

fn cart_error_message(error: &CartError, name: &str) -> String {
    match error {
        CartError::ZeroQuantity => "Choose a quantity of at least 1".to_string(),
        CartError::OutOfStock(_) => format!("{name} is out of stock"),
        CartError::LineNotFound(_) => format!("{name} is not in your cart"),
    }
}

/// Apply a quantity change against the product's current stock.
///
/// A product the backend no longer knows is dropped from the cart.
async fn change_quantity(
    state: &AppState,
    session: &Session,
    product_id: ProductId,
    change: QuantityChange,
) -> Result<Outcome> {
    let mut cart = cart_store::load(session).await?;
    let Some(current) = cart.line(product_id).map(|line| line.quantity) else {
        return Ok(Outcome::Rejected("That product is not in your cart".to_string()));
    };

    let product = match state.api().get_product(product_id).await {
        Ok(product) => product,
        Err(ApiError::NotFound(_)) => {
            cart.remove(product_id)?;
            cart_store::save(session, &cart).await?;
            return Ok(Outcome::Rejected(
                "That product is no longer available and was removed from your cart".to_string(),
            ));
        }
        Err(e) => return Ok(Outcome::Rejected(e.user_message())),
    };
    let stock = product.available_stock();

    let (result, requested) = match change {
        QuantityChange::Set(quantity) => (cart.set_quantity(product_id, quantity, stock), quantity),
        QuantityChange::Increment => (
            cart.increment(product_id, stock),
            current.saturating_add(1),
        ),
        QuantityChange::Decrement => (
            cart.decrement(product_id, stock),
            current.saturating_sub(1).max(1),
        ),
    };

    match result {
        Ok(quantity) => {
            cart_store::save(session, &cart).await?;
            if quantity < requested {
                Ok(Outcome::Notice(format!(
                    "Only {stock} of {} available",
                    product.name
                )))
            } else {
                Ok(Outcome::Done)
            }
        }
        Err(e) => Ok(Outcome::Rejected(cart_error_message(&e, &product.name))),
    }
}

/// Apply a change that needs no catalog lookup.
async fn change_cart<F>(session: &Session, change: F) -> Result<Outcome>
where
    F: FnOnce(&mut Cart) -> std::result::Result<(), CartError>,
{
    let mut cart = cart_store::load(session).await?;
    match change(&mut cart) {
        Ok(()) => {
            cart_store::save(session, &cart).await?;
            Ok(Outcome::Done)
        }
        Err(CartError::LineNotFound(_)) => Ok(Outcome::Rejected(
            "That product is not in your cart".to_string(),
        )),
        Err(e) => Ok(Outcome::Rejected(e.to_string())),
    }
}

/// Answer a cart mutation.
///
/// In-page requests get the re-rendered cart body; full navigations get a
/// toast and a redirect to `next` (the cart by default).
async fn respond(
    state: &AppState,
    session: &Session,
    headers: &HeaderMap,
    next: Option<&str>,
    outcome: Outcome,
) -> Result<Response> {
    if is_fragment_request(headers) {
        let snapshot = cart_store::snapshot(state.api(), session).await?;
        let notice = match outcome {
            Outcome::Done => None,
            Outcome::Notice(message) | Outcome::Rejected(message) => Some(message),
        };
        return Ok((
            AppendHeaders([("HX-Trigger", CART_UPDATED)]),
            CartItemsTemplate {
                cart: CartView::from(&snapshot),
                notice,
            },
        )
            .into_response());
    }

    match outcome {
        Outcome::Done => {}
        Outcome::Notice(message) => flash::info(session, message).await,
        Outcome::Rejected(message) => flash::error(session, message).await,
    }
    Ok(Redirect::to(safe_next(next, "/cart")).into_response())
}

// =============================================================================
// Route Handlers
// =============================================================================

/// Display cart page.
///
/// The stored cart is reconciled with the catalog first; anything that
/// changed is reported at the top of the page.
#[instrument(skip(state, session, nonce))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
) -> Result<Response> {
    let (cart, notice) = match cart_store::snapshot(state.api(), &session).await {
        Ok(snapshot) => {
            for adjustment in &snapshot.adjustments {
                flash::info(&session, adjustment.to_string()).await;
            }
            (CartView::from(&snapshot), None)
        }
        Err(e) => {
            tracing::error!("Failed to price cart: {e}");
            // Show the stored lines without prices rather than nothing
            let snapshot = CartSnapshot::unpriced(cart_store::load(&session).await?);
            (
                CartView::from(&snapshot),
                Some("Prices could not be loaded right now, please try again.".to_string()),
            )
        }
    };

    Ok(CartShowTemplate {
        layout: Layout::load(&session, nonce, "Your cart").await,
        cart,
        notice,
    }
    .into_response())
}

/// Add a product to the cart.
#[instrument(skip(state, session, headers))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<LineForm>,
) -> Result<Response> {
    let quantity = form.quantity.unwrap_or(1);

    let outcome = match state.api().get_product(form.product_id).await {
        Ok(product) => {
            let mut cart = cart_store::load(&session).await?;
            let before = cart.line(product.id).map_or(0, |line| line.quantity);
            let stock = product.available_stock();

            match cart.add(product.id, quantity, stock) {
                Ok(after) => {
                    cart_store::save(&session, &cart).await?;
                    let id = product.id.to_string();
                    add_breadcrumb("cart", "Added to cart", Some(&[("product_id", &id)]));

                    if after < before.saturating_add(quantity) {
                        Outcome::Notice(format!(
                            "Only {stock} of {} available, your cart now has {after}",
                            product.name
                        ))
                    } else {
                        Outcome::Notice(format!("Added {} to your cart", product.name))
                    }
                }
                Err(e) => Outcome::Rejected(cart_error_message(&e, &product.name)),
            }
        }
        Err(e) => Outcome::Rejected(e.user_message()),
    };

    if is_fragment_request(&headers) {
        let (message, ok) = match outcome {
            Outcome::Done => (String::new(), true),
            Outcome::Notice(message) => (message, true),
            Outcome::Rejected(message) => (message, false),
        };
        return Ok((
            AppendHeaders([("HX-Trigger", CART_UPDATED)]),
            CartAddedTemplate {
                count: cart_store::count(&session).await,
                message,
                ok,
            },
        )
            .into_response());
    }

    match outcome {
        Outcome::Done => {}
        Outcome::Notice(message) => flash::success(&session, message).await,
        Outcome::Rejected(message) => flash::error(&session, message).await,
    }
    Ok(Redirect::to(safe_next(form.next.as_deref(), "/cart")).into_response())
}

/// Set the quantity of a line (0 removes it).
#[instrument(skip(state, session, headers))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<LineForm>,
) -> Result<Response> {
    let quantity = form.quantity.unwrap_or(1);
    let outcome = change_quantity(
        &state,
        &session,
        form.product_id,
        QuantityChange::Set(quantity),
    )
    .await?;
    respond(&state, &session, &headers, form.next.as_deref(), outcome).await
}

/// Add one unit to a line.
#[instrument(skip(state, session, headers))]
pub async fn increment(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<LineForm>,
) -> Result<Response> {
    let outcome =
        change_quantity(&state, &session, form.product_id, QuantityChange::Increment).await?;
    respond(&state, &session, &headers, form.next.as_deref(), outcome).await
}

/// Remove one unit from a line.
#[instrument(skip(state, session, headers))]
pub async fn decrement(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<LineForm>,
) -> Result<Response> {
    let outcome =
        change_quantity(&state, &session, form.product_id, QuantityChange::Decrement).await?;
    respond(&state, &session, &headers, form.next.as_deref(), outcome).await
}

/// Remove a line.
#[instrument(skip(state, session, headers))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<LineForm>,
) -> Result<Response> {
    let outcome = change_cart(&session, |cart| cart.remove(form.product_id).map(|_| ())).await?;
    respond(&state, &session, &headers, form.next.as_deref(), outcome).await
}

/// Tick or untick a line for checkout.
#[instrument(skip(state, session, headers))]
pub async fn toggle(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<LineForm>,
) -> Result<Response> {
    let outcome = change_cart(&session, |cart| cart.toggle(form.product_id).map(|_| ())).await?;
    respond(&state, &session, &headers, form.next.as_deref(), outcome).await
}

/// Tick or untick every line.
#[instrument(skip(state, session, headers))]
pub async fn select_all(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<SelectAllForm>,
) -> Result<Response> {
    let selected = form
        .selected
        .as_deref()
        .is_some_and(|v| matches!(v, "true" | "on" | "1"));
    let outcome = change_cart(&session, |cart| {
        cart.select_all(selected);
        Ok(())
    })
    .await?;
    respond(&state, &session, &headers, form.next.as_deref(), outcome).await
}

/// Empty the cart.
#[instrument(skip(state, session, headers))]
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<NextForm>,
) -> Result<Response> {
    let outcome = change_cart(&session, |cart| {
        cart.clear();
        Ok(())
    })
    .await?;
    respond(&state, &session, &headers, form.next.as_deref(), outcome).await
}

/// Cart count badge fragment.
#[instrument(skip(session))]
pub async fn count(session: Session) -> impl IntoResponse {
    CartCountTemplate {
        count: cart_store::count(&session).await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{StatusCode, header};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    use marketline_core::Vnd;

    use super::*;
    use crate::api::tests::stub_backend;
    use crate::services::flash::FlashKind;
    use crate::state::tests::TestApp;

    /// Backend holding one product with three units left.
    async fn low_stock_app() -> TestApp {
        let backend = Router::new().route(
            "/api/products/{id}",
            get(|| async { Json(json!({ "id": 1, "name": "Mug", "price": 50000, "stock": 3 })) }),
        );
        TestApp::new(stub_backend(backend).await)
    }

    fn priced(quantity: u32, stock: u32, availability: Availability) -> PricedLine {
        PricedLine {
            product_id: ProductId::new(1),
            quantity,
            selected: true,
            name: "Mug".to_string(),
            image: None,
            unit_price: Vnd::from_dong(50_000),
            line_total: Vnd::from_dong(50_000 * i64::from(quantity)),
            stock,
            availability,
        }
    }

    #[test]
    fn test_line_view_available() {
        let view = CartLineView::from(&priced(2, 5, Availability::Available));
        assert!(view.available);
        assert!(view.notice.is_none());
        assert!(view.can_increment);
        assert!(view.can_decrement);
        assert_eq!(view.line_total, "100.000 ₫");
    }

    #[test]
    fn test_line_view_stock_notices() {
        let view = CartLineView::from(&priced(4, 2, Availability::ExceedsStock { stock: 2 }));
        assert!(!view.available);
        assert_eq!(view.notice.as_deref(), Some("Only 2 left in stock"));
        assert!(!view.can_increment);

        let view = CartLineView::from(&priced(1, 0, Availability::OutOfStock));
        assert_eq!(view.notice.as_deref(), Some("Out of stock"));
        assert!(!view.can_decrement);
    }

    #[test]
    fn test_cart_error_messages() {
        assert_eq!(
            cart_error_message(&CartError::OutOfStock(ProductId::new(1)), "Mug"),
            "Mug is out of stock"
        );
        assert_eq!(
            cart_error_message(&CartError::ZeroQuantity, "Mug"),
            "Choose a quantity of at least 1"
        );
    }

    #[tokio::test]
    async fn test_add_clamps_to_backend_stock() {
        let app = low_stock_app().await;
        let id = app.seed(None, Some(&Cart::default())).await;

        let response = app
            .post_form(id, "/cart/add", "product_id=1&quantity=5")
            .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/cart");
        let session = app.session(id);
        let cart = cart_store::load(&session).await.unwrap();
        assert_eq!(cart.line(ProductId::new(1)).unwrap().quantity, 3);
        let notices = flash::take(&session).await;
        assert_eq!(
            notices[0].message,
            "Only 3 of Mug available, your cart now has 3"
        );
    }

    #[tokio::test]
    async fn test_update_clamps_to_backend_stock() {
        let app = low_stock_app().await;
        let mut cart = Cart::default();
        cart.add(ProductId::new(1), 1, 10).unwrap();
        let id = app.seed(None, Some(&cart)).await;

        let response = app
            .post_form(id, "/cart/update", "product_id=1&quantity=9")
            .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let session = app.session(id);
        let cart = cart_store::load(&session).await.unwrap();
        assert_eq!(cart.line(ProductId::new(1)).unwrap().quantity, 3);
        let notices = flash::take(&session).await;
        assert_eq!(notices[0].kind, FlashKind::Info);
        assert_eq!(notices[0].message, "Only 3 of Mug available");
    }

    #[tokio::test]
    async fn test_increment_at_stock_stays_put() {
        let app = low_stock_app().await;
        let mut cart = Cart::default();
        cart.add(ProductId::new(1), 3, 10).unwrap();
        let id = app.seed(None, Some(&cart)).await;

        let response = app
            .post_form(id, "/cart/increment", "product_id=1")
            .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let session = app.session(id);
        let cart = cart_store::load(&session).await.unwrap();
        assert_eq!(cart.line(ProductId::new(1)).unwrap().quantity, 3);
        let notices = flash::take(&session).await;
        assert_eq!(notices[0].message, "Only 3 of Mug available");
    }

    #[tokio::test]
    async fn test_update_to_zero_removes_line() {
        let app = low_stock_app().await;
        let mut cart = Cart::default();
        cart.add(ProductId::new(1), 2, 10).unwrap();
        let id = app.seed(None, Some(&cart)).await;

        app.post_form(id, "/cart/update", "product_id=1&quantity=0")
            .await;

        let cart = cart_store::load(&app.session(id)).await.unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_header_injection_in_next_falls_back_to_cart() {
        let app = low_stock_app().await;
        let id = app.seed(None, Some(&Cart::default())).await;

        let response = app
            .post_form(id, "/cart/clear", "next=%2Fcart%0D%0ASet-Cookie%3A+x%3D1")
            .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/cart");
        assert!(response.headers().get(header::SET_COOKIE).is_none_or(|cookie| {
            !cookie.to_str().unwrap_or_default().contains("x=1")
        }));
    }
}
