//! Order history route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;
use validator::{Validate, ValidationError};

use marketline_core::{OrderId, OrderStatus};

use crate::api::{ApiError, Invoice, Order, OrderQuery};
use crate::error::Result;
use crate::filters;
use crate::middleware::{CspNonce, RequireAuth};
use crate::services::flash;
use crate::state::AppState;
use crate::views::{Layout, PageLinks, format_date, format_datetime, validation_messages};

/// Orders per history page.
const ORDERS_PER_PAGE: u32 = 10;

/// Steps of the delivery track, in order.
const TRACK: [OrderStatus; 4] = [
    OrderStatus::Pending,
    OrderStatus::Confirmed,
    OrderStatus::Shipping,
    OrderStatus::Delivered,
];

// =============================================================================
// Query Types
// =============================================================================

/// Order history filters.
#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
}

/// Cancellation reasons offered on the order page.
pub const CANCEL_REASONS: [&str; 5] = [
    "Changed my mind",
    "Found a better price elsewhere",
    "Delivery takes too long",
    "Wrong shipping details",
    "Ordered the wrong product",
];

/// Value of the free-text choice.
const OTHER_REASON: &str = "other";

/// Cancel form data.
#[derive(Debug, Default, Deserialize, Validate)]
#[validate(schema(function = "validate_cancel_reason"))]
pub struct CancelForm {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    #[validate(length(max = 500, message = "The reason can be at most 500 characters"))]
    pub other_reason: String,
}

impl CancelForm {
    /// Reason text sent to the backend.
    fn reason_text(&self) -> &str {
        if self.reason == OTHER_REASON {
            self.other_reason.trim()
        } else {
            self.reason.trim()
        }
    }
}

fn validate_cancel_reason(form: &CancelForm) -> std::result::Result<(), ValidationError> {
    let known = form.reason == OTHER_REASON || CANCEL_REASONS.contains(&form.reason.as_str());
    if known && !form.reason_text().is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new("reason")
            .with_message("Choose or describe a reason for cancelling".into()))
    }
}

// =============================================================================
// View Types
// =============================================================================

/// Status filter tab.
#[derive(Debug, Clone)]
pub struct StatusTab {
    pub label: &'static str,
    pub url: String,
    pub active: bool,
}

fn status_tabs(current: Option<OrderStatus>) -> Vec<StatusTab> {
    let all = StatusTab {
        label: "All",
        url: "/orders".to_string(),
        active: current.is_none(),
    };
    std::iter::once(all)
        .chain(OrderStatus::ALL.into_iter().map(|status| StatusTab {
            label: status.label(),
            url: format!("/orders?status={}", status.as_str()),
            active: current == Some(status),
        }))
        .collect()
}

/// Order row in the history list.
#[derive(Debug, Clone)]
pub struct OrderRow {
    pub id: OrderId,
    pub code: String,
    pub date: String,
    pub status_label: &'static str,
    pub status_class: &'static str,
    pub payment_label: &'static str,
    pub total: String,
    pub item_count: u32,
    pub first_item: Option<String>,
    pub more_items: usize,
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            code: order.code.clone(),
            date: format_date(&order.created_at),
            status_label: order.status.label(),
            status_class: order.status.badge_class(),
            payment_label: order.payment_method.label(),
            total: order.total.to_string(),
            item_count: order.item_count(),
            first_item: order.items.first().map(|item| item.product_name.clone()),
            more_items: order.items.len().saturating_sub(1),
        }
    }
}

/// One step of the delivery track.
#[derive(Debug, Clone)]
pub struct TrackStep {
    pub label: &'static str,
    pub done: bool,
    pub current: bool,
}

fn track(status: OrderStatus) -> Vec<TrackStep> {
    let reached = status.progress_step();
    TRACK
        .iter()
        .enumerate()
        .map(|(index, step)| TrackStep {
            label: step.label(),
            done: reached.is_some_and(|r| index <= r),
            current: reached == Some(index),
        })
        .collect()
}

/// Purchased line display data.
#[derive(Debug, Clone)]
pub struct ItemView {
    pub product_id: String,
    pub name: String,
    pub image: Option<String>,
    pub unit_price: String,
    pub quantity: u32,
    pub line_total: String,
}

/// Order detail display data.
#[derive(Debug, Clone)]
pub struct OrderDetail {
    pub id: OrderId,
    pub code: String,
    pub placed_at: String,
    pub status_label: &'static str,
    pub status_class: &'static str,
    pub cancelled: bool,
    pub track: Vec<TrackStep>,
    pub items: Vec<ItemView>,
    pub recipient: String,
    pub phone: String,
    pub address: String,
    pub note: Option<String>,
    pub payment_method: &'static str,
    pub payment_status: &'static str,
    pub payment_class: &'static str,
    pub subtotal: String,
    pub shipping_fee: String,
    pub total: String,
    pub can_cancel: bool,
    pub can_pay: bool,
    pub can_review: bool,
}

impl From<&Order> for OrderDetail {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            code: order.code.clone(),
            placed_at: format_datetime(&order.created_at),
            status_label: order.status.label(),
            status_class: order.status.badge_class(),
            cancelled: order.status == OrderStatus::Cancelled,
            track: track(order.status),
            items: order
                .items
                .iter()
                .map(|item| ItemView {
                    product_id: item.product_id.to_string(),
                    name: item.product_name.clone(),
                    image: item.image.clone(),
                    unit_price: item.unit_price.to_string(),
                    quantity: item.quantity,
                    line_total: item.line_total().to_string(),
                })
                .collect(),
            recipient: order.shipping.full_name.clone(),
            phone: order.shipping.phone.clone(),
            address: order.shipping.address.clone(),
            note: order.shipping.note.clone(),
            payment_method: order.payment_method.label(),
            payment_status: order.payment_status.label(),
            payment_class: order.payment_status.badge_class(),
            subtotal: order.subtotal.to_string(),
            shipping_fee: order.shipping_fee.to_string(),
            total: order.total.to_string(),
            can_cancel: order.can_cancel(),
            can_pay: order.awaiting_online_payment(),
            can_review: order.status == OrderStatus::Delivered,
        }
    }
}

/// Invoice line display data.
#[derive(Debug, Clone)]
pub struct InvoiceLineView {
    pub description: String,
    pub quantity: u32,
    pub unit_price: String,
    pub amount: String,
}

/// Invoice display data.
#[derive(Debug, Clone)]
pub struct InvoiceView {
    pub number: String,
    pub order_id: OrderId,
    pub order_code: String,
    pub issued_at: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub billing_address: Option<String>,
    pub lines: Vec<InvoiceLineView>,
    pub subtotal: String,
    pub tax: String,
    pub total: String,
}

impl From<&Invoice> for InvoiceView {
    fn from(invoice: &Invoice) -> Self {
        Self {
            number: invoice.number.clone(),
            order_id: invoice.order_id,
            order_code: invoice
                .order_code
                .clone()
                .unwrap_or_else(|| invoice.order_id.to_string()),
            issued_at: format_date(&invoice.issued_at),
            customer_name: invoice.customer_name.clone(),
            customer_email: invoice.customer_email.clone(),
            billing_address: invoice.billing_address.clone(),
            lines: invoice
                .lines
                .iter()
                .map(|line| InvoiceLineView {
                    description: line.description.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price.to_string(),
                    amount: line.amount.to_string(),
                })
                .collect(),
            subtotal: invoice.subtotal.to_string(),
            tax: invoice.tax.to_string(),
            total: invoice.total.to_string(),
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Order history template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersIndexTemplate {
    pub layout: Layout,
    pub orders: Vec<OrderRow>,
    pub tabs: Vec<StatusTab>,
    pub links: PageLinks,
    pub error: Option<String>,
}

/// Order detail template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub layout: Layout,
    pub order: OrderDetail,
    pub cancel_reasons: &'static [&'static str],
}

/// Printable invoice template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/invoice.html")]
pub struct InvoiceTemplate {
    pub layout: Layout,
    pub invoice: InvoiceView,
}

// =============================================================================
// Route Handlers
// =============================================================================

/// Display the customer's orders.
#[instrument(skip(state, session, nonce, user), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    RequireAuth(user): RequireAuth,
    Query(query): Query<OrdersQuery>,
) -> Result<impl IntoResponse> {
    let status = query
        .status
        .as_deref()
        .and_then(|s| s.parse::<OrderStatus>().ok());
    let request = OrderQuery {
        page: query.page.unwrap_or(1).max(1),
        limit: ORDERS_PER_PAGE,
        status,
    };

    let (page, error) = match state.api().list_orders(&user.token, &request).await {
        Ok(page) => (page, None),
        Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized.into()),
        Err(e) => {
            tracing::error!("Failed to load orders: {e}");
            (crate::api::Page::empty(ORDERS_PER_PAGE), Some(e.user_message()))
        }
    };

    let params = [(
        "status",
        status.map(|s| s.as_str().to_string()).unwrap_or_default(),
    )];

    Ok(OrdersIndexTemplate {
        layout: Layout::load(&session, nonce, "My orders").await,
        orders: page.items.iter().map(OrderRow::from).collect(),
        tabs: status_tabs(status),
        links: PageLinks::new(&page.pagination(), "/orders", &params),
        error,
    })
}

/// Display one order.
#[instrument(skip(state, session, nonce, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<impl IntoResponse> {
    let order = state.api().get_order(&user.token, id).await?;

    Ok(OrderShowTemplate {
        layout: Layout::load(&session, nonce, format!("Order {}", order.code)).await,
        order: OrderDetail::from(&order),
        cancel_reasons: &CANCEL_REASONS,
    })
}

/// Cancel a pending order.
///
/// A reason is required: one of [`CANCEL_REASONS`] or free text.
#[instrument(skip(state, session, user, form), fields(user_id = %user.id))]
pub async fn cancel(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
    Form(form): Form<CancelForm>,
) -> Result<Redirect> {
    if let Err(errors) = form.validate() {
        for message in validation_messages(&errors) {
            flash::error(&session, message).await;
        }
        return Ok(Redirect::to(&format!("/orders/{id}")));
    }

    match state
        .api()
        .cancel_order(&user.token, id, form.reason_text())
        .await
    {
        Ok(order) => {
            tracing::info!(order_id = %id, "Order cancelled by customer");
            flash::success(&session, format!("Order {} was cancelled.", order.code)).await;
        }
        Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized.into()),
        Err(e) => {
            tracing::warn!(order_id = %id, "Cancel rejected: {e}");
            flash::error(&session, e.user_message()).await;
        }
    }
    Ok(Redirect::to(&format!("/orders/{id}")))
}

/// Retry the VNPay payment of an unpaid order.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn pay(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Response> {
    let order_url = format!("/orders/{id}");
    let order = state.api().get_order(&user.token, id).await?;

    if !order.awaiting_online_payment() {
        flash::info(&session, "This order does not need an online payment.").await;
        return Ok(Redirect::to(&order_url).into_response());
    }

    match state
        .api()
        .create_vnpay_payment(&user.token, id, &state.config().vnpay_return_url())
        .await
    {
        Ok(payment) => Ok(Redirect::to(&payment.payment_url).into_response()),
        Err(ApiError::Unauthorized) => Err(ApiError::Unauthorized.into()),
        Err(e) => {
            tracing::error!(order_id = %id, "Failed to start VNPay payment: {e}");
            flash::error(&session, e.user_message()).await;
            Ok(Redirect::to(&order_url).into_response())
        }
    }
}

/// Printable invoice of an order.
///
/// Orders without an issued invoice go back to the order page.
#[instrument(skip(state, session, nonce, user), fields(user_id = %user.id))]
pub async fn invoice(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Response> {
    match state.api().get_invoice(&user.token, id).await {
        Ok(invoice) => Ok(InvoiceTemplate {
            layout: Layout::load(&session, nonce, format!("Invoice {}", invoice.number)).await,
            invoice: InvoiceView::from(&invoice),
        }
        .into_response()),
        Err(ApiError::NotFound(_)) => {
            flash::info(&session, "No invoice has been issued for this order yet.").await;
            Ok(Redirect::to(&format!("/orders/{id}")).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::http::{StatusCode, header};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};

    use super::*;
    use crate::api::tests::stub_backend;
    use crate::services::flash::FlashKind;
    use crate::state::tests::{TestApp, test_user};

    fn order_value(status: &str, method: &str, payment: &str) -> Value {
        json!({
            "id": 21,
            "code": "ML-0021",
            "items": [
                { "product_id": 1, "product_name": "Mug", "unit_price": 50000, "quantity": 2 },
                { "product_id": 2, "product_name": "Teapot", "unit_price": 250000, "quantity": 1 }
            ],
            "shipping": { "full_name": "An", "phone": "0901234567", "address": "Hà Nội" },
            "payment_method": method,
            "payment_status": payment,
            "status": status,
            "subtotal": 350000,
            "total": 380000,
            "shipping_fee": 30000,
            "created_at": "2026-05-04T03:00:00Z"
        })
    }

    fn order(status: &str, method: &str, payment: &str) -> Order {
        serde_json::from_value(order_value(status, method, payment)).unwrap()
    }

    #[test]
    fn test_track_marks_reached_steps() {
        let steps = track(OrderStatus::Shipping);
        let done: Vec<bool> = steps.iter().map(|s| s.done).collect();
        assert_eq!(done, vec![true, true, true, false]);
        assert!(steps[2].current);

        assert!(track(OrderStatus::Cancelled).iter().all(|s| !s.done));
    }

    #[test]
    fn test_status_tabs() {
        let tabs = status_tabs(Some(OrderStatus::Delivered));
        assert_eq!(tabs.len(), OrderStatus::ALL.len() + 1);
        assert!(!tabs[0].active);
        assert_eq!(tabs.iter().filter(|t| t.active).count(), 1);
        assert_eq!(tabs[4].url, "/orders?status=delivered");
    }

    #[test]
    fn test_order_row_summary() {
        let row = OrderRow::from(&order("pending", "cod", "unpaid"));
        assert_eq!(row.item_count, 3);
        assert_eq!(row.first_item.as_deref(), Some("Mug"));
        assert_eq!(row.more_items, 1);
        assert_eq!(row.total, "380.000 ₫");
        assert_eq!(row.date, "04/05/2026");
    }

    #[test]
    fn test_order_detail_actions() {
        let detail = OrderDetail::from(&order("pending", "vnpay", "unpaid"));
        assert!(detail.can_cancel);
        assert!(detail.can_pay);
        assert!(!detail.can_review);
        assert_eq!(detail.items[0].line_total, "100.000 ₫");

        let detail = OrderDetail::from(&order("delivered", "vnpay", "paid"));
        assert!(!detail.can_cancel);
        assert!(!detail.can_pay);
        assert!(detail.can_review);

        let detail = OrderDetail::from(&order("cancelled", "vnpay", "unpaid"));
        assert!(detail.cancelled);
        assert!(!detail.can_pay);
    }

    fn cancel_form(reason: &str, other: &str) -> CancelForm {
        CancelForm {
            reason: reason.to_string(),
            other_reason: other.to_string(),
        }
    }

    #[test]
    fn test_cancel_reason_rules() {
        let form = cancel_form("Delivery takes too long", "");
        assert!(form.validate().is_ok());
        assert_eq!(form.reason_text(), "Delivery takes too long");

        let form = cancel_form("other", "  Moving house  ");
        assert!(form.validate().is_ok());
        assert_eq!(form.reason_text(), "Moving house");

        assert!(cancel_form("", "").validate().is_err());
        assert!(cancel_form("other", "   ").validate().is_err());
        assert!(cancel_form("Because", "").validate().is_err());
        assert!(cancel_form("other", &"x".repeat(501)).validate().is_err());
    }

    /// Backend that cancels order 21 and records the reason it was given.
    fn cancelling_backend(received: Arc<Mutex<Option<Value>>>) -> Router {
        Router::new().route(
            "/api/orders/{id}/cancel",
            post(move |Json(body): Json<Value>| {
                let received = Arc::clone(&received);
                async move {
                    *received.lock().unwrap() = Some(body["reason"].clone());
                    Json(order_value("cancelled", "cod", "unpaid"))
                }
            }),
        )
    }

    #[tokio::test]
    async fn test_cancel_sends_reason() {
        let received = Arc::new(Mutex::new(None));
        let app = TestApp::new(stub_backend(cancelling_backend(Arc::clone(&received))).await);
        let id = app.seed(Some(&test_user()), None).await;

        let response = app
            .post_form(id, "/orders/21/cancel", "reason=other&other_reason=Moving+house")
            .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/orders/21");
        assert_eq!(*received.lock().unwrap(), Some(json!("Moving house")));

        let notices = flash::take(&app.session(id)).await;
        assert_eq!(notices[0].kind, FlashKind::Success);
        assert_eq!(notices[0].message, "Order ML-0021 was cancelled.");
    }

    #[tokio::test]
    async fn test_cancel_without_reason_is_rejected() {
        let received = Arc::new(Mutex::new(None));
        let app = TestApp::new(stub_backend(cancelling_backend(Arc::clone(&received))).await);
        let id = app.seed(Some(&test_user()), None).await;

        let response = app.post_form(id, "/orders/21/cancel", "reason=").await;

        assert_eq!(response.headers()[header::LOCATION], "/orders/21");
        assert!(received.lock().unwrap().is_none());

        let notices = flash::take(&app.session(id)).await;
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, FlashKind::Error);
        assert_eq!(
            notices[0].message,
            "Choose or describe a reason for cancelling"
        );
    }
}
