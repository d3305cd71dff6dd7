//! Checkout route handlers.
//!
//! Only ticked, available cart lines are ordered. Once the backend accepts
//! the order those lines leave the cart; the rest stay for later. Cash on
//! delivery orders land on the order page, VNPay orders are sent to the
//! gateway and come back through `/checkout/vnpay-return`.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{RawQuery, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;
use validator::Validate;

use marketline_core::PaymentMethod;

use crate::api::{ApiError, CreateOrderRequest, OrderLineRequest, ShippingInfo};
use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{CspNonce, OptionalAuth, RequireAuth};
use crate::models::CurrentUser;
use crate::services::cart::{self as cart_store, CartSnapshot};
use crate::services::flash;
use crate::state::AppState;
use crate::views::{Layout, non_empty, validation_messages};

// =============================================================================
// Form Types
// =============================================================================

/// Shipping and payment form.
#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct CheckoutForm {
    #[validate(length(min = 1, max = 100, message = "Enter the recipient's name"))]
    pub full_name: String,
    #[validate(custom(function = "validate_phone", message = "Enter a valid phone number"))]
    pub phone: String,
    #[validate(length(min = 5, max = 255, message = "Enter a complete delivery address"))]
    pub address: String,
    #[serde(default)]
    #[validate(length(max = 500, message = "The note can be at most 500 characters"))]
    pub note: String,
    #[serde(default)]
    pub payment_method: String,
}

/// Phone numbers: 9 to 15 digits, optionally led by `+`, spaces allowed.
fn validate_phone(phone: &str) -> std::result::Result<(), validator::ValidationError> {
    let digits = phone.trim().strip_prefix('+').unwrap_or(phone.trim());
    let digits: String = digits.chars().filter(|c| !c.is_whitespace()).collect();
    if (9..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("phone"))
    }
}

impl CheckoutForm {
    fn shipping(&self) -> ShippingInfo {
        ShippingInfo {
            full_name: self.full_name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            address: self.address.trim().to_string(),
            note: non_empty(&self.note).map(String::from),
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Line shown in the order summary.
#[derive(Debug, Clone)]
pub struct SummaryLine {
    pub name: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub line_total: String,
}

/// Payment method choice.
#[derive(Debug, Clone)]
pub struct PaymentOption {
    pub value: &'static str,
    pub label: &'static str,
    pub checked: bool,
}

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub layout: Layout,
    pub form: CheckoutForm,
    pub lines: Vec<SummaryLine>,
    pub subtotal: String,
    pub quantity: u32,
    pub payment_options: Vec<PaymentOption>,
    pub errors: Vec<String>,
}

fn payment_options(selected: Option<PaymentMethod>) -> Vec<PaymentOption> {
    let selected = selected.unwrap_or(PaymentMethod::Cod);
    [PaymentMethod::Cod, PaymentMethod::Vnpay]
        .into_iter()
        .map(|method| PaymentOption {
            value: method.as_str(),
            label: method.label(),
            checked: method == selected,
        })
        .collect()
}

fn summary_lines(snapshot: &CartSnapshot) -> Vec<SummaryLine> {
    snapshot
        .priced
        .selected()
        .map(|line| SummaryLine {
            name: line.name.clone(),
            image: line.image.clone(),
            quantity: line.quantity,
            line_total: line.line_total.to_string(),
        })
        .collect()
}

async fn render(
    session: &Session,
    nonce: CspNonce,
    snapshot: &CartSnapshot,
    form: CheckoutForm,
    errors: Vec<String>,
) -> Response {
    let payment_options = payment_options(form.payment_method.parse().ok());
    CheckoutTemplate {
        layout: Layout::load(session, nonce, "Checkout").await,
        lines: summary_lines(snapshot),
        subtotal: snapshot.priced.selected_subtotal.to_string(),
        quantity: snapshot.priced.selected_quantity,
        payment_options,
        errors,
        form,
    }
    .into_response()
}

/// Cart snapshot ready to be ordered, or the redirect back to the cart.
async fn checkout_snapshot(
    state: &AppState,
    session: &Session,
) -> Result<std::result::Result<CartSnapshot, Response>> {
    let snapshot = cart_store::snapshot(state.api(), session).await?;

    for adjustment in &snapshot.adjustments {
        flash::info(session, adjustment.to_string()).await;
    }

    if snapshot.priced.selected().next().is_none() {
        flash::info(session, "Select at least one product to check out.").await;
        return Ok(Err(Redirect::to("/cart").into_response()));
    }
    if !snapshot.priced.checkout_ready() {
        flash::error(
            session,
            "Some selected products are no longer available in that quantity.",
        )
        .await;
        return Ok(Err(Redirect::to("/cart").into_response()));
    }

    Ok(Ok(snapshot))
}

/// Prefill the shipping form from the account profile.
async fn prefill(state: &AppState, user: &CurrentUser) -> Result<CheckoutForm> {
    let form = match state.api().me(&user.token).await {
        Ok(profile) => CheckoutForm {
            full_name: profile.full_name,
            phone: profile.phone.unwrap_or_default(),
            address: profile.address.unwrap_or_default(),
            ..CheckoutForm::default()
        },
        Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized.into()),
        Err(e) => {
            tracing::warn!("Failed to load profile for checkout: {e}");
            CheckoutForm {
                full_name: user.full_name.clone(),
                ..CheckoutForm::default()
            }
        }
    };
    Ok(form)
}

// =============================================================================
// Route Handlers
// =============================================================================

/// Display the checkout form.
#[instrument(skip(state, session, nonce, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    RequireAuth(user): RequireAuth,
) -> Result<Response> {
    let snapshot = match checkout_snapshot(&state, &session).await? {
        Ok(snapshot) => snapshot,
        Err(redirect) => return Ok(redirect),
    };

    let form = prefill(&state, &user).await?;
    Ok(render(&session, nonce, &snapshot, form, Vec::new()).await)
}

/// Place the order.
#[instrument(skip(state, session, nonce, user, form), fields(user_id = %user.id))]
pub async fn place_order(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    RequireAuth(user): RequireAuth,
    Form(form): Form<CheckoutForm>,
) -> Result<Response> {
    let snapshot = match checkout_snapshot(&state, &session).await? {
        Ok(snapshot) => snapshot,
        Err(redirect) => return Ok(redirect),
    };

    let mut errors = form
        .validate()
        .err()
        .map(|e| validation_messages(&e))
        .unwrap_or_default();
    let payment_method = form.payment_method.parse::<PaymentMethod>();
    if payment_method.is_err() {
        errors.push("Choose a payment method".to_string());
    }
    let Ok(payment_method) = payment_method else {
        return Ok(render(&session, nonce, &snapshot, form, errors).await);
    };
    if !errors.is_empty() {
        return Ok(render(&session, nonce, &snapshot, form, errors).await);
    }

    let request = CreateOrderRequest {
        items: snapshot
            .priced
            .selected()
            .map(|line| OrderLineRequest {
                product_id: line.product_id,
                quantity: line.quantity,
            })
            .collect(),
        shipping: form.shipping(),
        payment_method,
    };

    let order = match state.api().create_order(&user.token, &request).await {
        Ok(order) => order,
        Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized.into()),
        Err(e) => {
            tracing::warn!("Order rejected: {e}");
            let errors = vec![e.user_message()];
            return Ok(render(&session, nonce, &snapshot, form, errors).await);
        }
    };

    tracing::info!(order_id = %order.id, code = %order.code, "Order placed");
    add_breadcrumb("checkout", "Order placed", Some(&[("order_code", &order.code)]));

    let mut cart = snapshot.cart;
    let purchased = cart.remove_selected();
    tracing::debug!(lines = purchased.len(), "Removed purchased lines from cart");
    cart_store::save(&session, &cart).await?;

    let order_url = format!("/orders/{}", order.id);
    if !payment_method.is_online() {
        flash::success(&session, format!("Order {} placed. Thank you!", order.code)).await;
        return Ok(Redirect::to(&order_url).into_response());
    }

    match state
        .api()
        .create_vnpay_payment(&user.token, order.id, &state.config().vnpay_return_url())
        .await
    {
        Ok(payment) => Ok(Redirect::to(&payment.payment_url).into_response()),
        Err(e) => {
            tracing::error!(order_id = %order.id, "Failed to start VNPay payment: {e}");
            flash::error(
                &session,
                format!(
                    "Order {} was placed but the payment could not be started. \
                     You can pay from the order page.",
                    order.code
                ),
            )
            .await;
            Ok(Redirect::to(&order_url).into_response())
        }
    }
}

/// Landing page after the VNPay gateway.
///
/// The backend checks the signature; this only reports the verdict.
#[instrument(skip(state, session, user, query))]
pub async fn vnpay_return(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    RawQuery(query): RawQuery,
) -> Redirect {
    let token = user.as_ref().map(|user| &user.token);
    let verdict = state
        .api()
        .verify_vnpay_return(token, query.as_deref().unwrap_or_default())
        .await;

    match verdict {
        Ok(verdict) => {
            if verdict.success {
                flash::success(&session, "Payment received. Thank you!").await;
            } else {
                flash::error(
                    &session,
                    verdict
                        .message
                        .unwrap_or_else(|| "The payment was not completed.".to_string()),
                )
                .await;
            }
            verdict
                .order_id
                .map_or_else(|| Redirect::to("/orders"), |id| Redirect::to(&format!("/orders/{id}")))
        }
        Err(e) => {
            tracing::error!("Failed to verify VNPay return: {e}");
            flash::error(&session, "We could not confirm the payment result.").await;
            Redirect::to("/orders")
        }
    }
}
