//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                         - Home page
//!
//! # Catalog
//! GET  /products                 - Product listing (search, filters, paging)
//! GET  /products/{id}            - Product detail
//! POST /products/{id}/reviews    - Submit a review (auth)
//! GET  /categories               - Category index
//! GET  /categories/{id}          - Products in a category
//!
//! # Cart (full page or in-page fragments)
//! GET  /cart                     - Cart page
//! POST /cart/add                 - Add a product
//! POST /cart/update              - Set a line quantity
//! POST /cart/increment           - One more unit
//! POST /cart/decrement           - One less unit
//! POST /cart/remove              - Remove a line
//! POST /cart/toggle              - Tick or untick a line
//! POST /cart/select-all          - Tick or untick every line
//! POST /cart/clear               - Empty the cart
//! GET  /cart/count               - Cart count badge (fragment)
//!
//! # Checkout (auth)
//! GET  /checkout                 - Shipping and payment form
//! POST /checkout                 - Place the order
//! GET  /checkout/vnpay-return    - Back from the payment gateway
//!
//! # Orders (auth)
//! GET  /orders                   - Order history
//! GET  /orders/{id}              - Order detail
//! POST /orders/{id}/cancel       - Cancel a pending order
//! POST /orders/{id}/pay          - Retry an online payment
//! GET  /orders/{id}/invoice      - Printable invoice
//!
//! # Favorites (auth)
//! GET  /favorites                - Favorite products
//! POST /favorites/{id}           - Add a favorite
//! POST /favorites/{id}/remove    - Remove a favorite
//!
//! # Auth
//! GET  /auth/login               - Login page
//! POST /auth/login               - Login action (rate limited)
//! GET  /auth/register            - Register page
//! POST /auth/register            - Register action (rate limited)
//! GET  /auth/forgot-password     - Forgot password page
//! POST /auth/forgot-password     - Mail a reset code (rate limited)
//! GET  /auth/reset-password      - Reset password page
//! POST /auth/reset-password      - Reset with the code (rate limited)
//! POST /auth/logout              - Logout action
//!
//! # Account (auth)
//! GET  /account                  - Profile
//! POST /account                  - Update profile
//! POST /account/password         - Change password
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod checkout;
pub mod favorites;
pub mod home;
pub mod orders;
pub mod products;
pub mod reviews;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// Create the auth routes router.
///
/// Only the credential POSTs are rate limited; the pages are not.
pub fn auth_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .layer(auth_rate_limiter());

    Router::new()
        .route("/login", get(auth::login_page))
        .route("/register", get(auth::register_page))
        .route("/forgot-password", get(auth::forgot_password_page))
        .route("/reset-password", get(auth::reset_password_page))
        .route("/logout", post(auth::logout))
        .merge(limited)
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
        .route("/{id}/reviews", post(reviews::create))
}

/// Create the category routes router.
pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(categories::index))
        .route("/{id}", get(categories::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/increment", post(cart::increment))
        .route("/decrement", post(cart::decrement))
        .route("/remove", post(cart::remove))
        .route("/toggle", post(cart::toggle))
        .route("/select-all", post(cart::select_all))
        .route("/clear", post(cart::clear))
        .route("/count", get(cart::count))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show).post(checkout::place_order))
        .route("/vnpay-return", get(checkout::vnpay_return))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", post(orders::cancel))
        .route("/{id}/pay", post(orders::pay))
        .route("/{id}/invoice", get(orders::invoice))
}

/// Create the favorite routes router.
pub fn favorite_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(favorites::index))
        .route("/{id}", post(favorites::add))
        .route("/{id}/remove", post(favorites::remove))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::show).post(account::update_profile))
        .route("/password", post(account::change_password))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .nest("/products", product_routes())
        .nest("/categories", category_routes())
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/orders", order_routes())
        .nest("/favorites", favorite_routes())
        .nest("/account", account_routes())
        .nest("/auth", auth_routes())
}
