//! Order route handlers.
//!
//! Staff move orders along pending → confirmed → shipping → delivered (or
//! cancel them early) and issue invoices once an order is paid or
//! delivered. The backend has the final say on every transition.

use askama::Template;
use axum::{
    Form, Router,
    extract::{Path, Query, State},
    response::{Html, Redirect},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use marketline_core::{OrderId, OrderStatus};

use crate::api::{ApiError, Order, OrderItem, OrderQuery};
use crate::error::{Result, render};
use crate::filters;
use crate::middleware::RequireAdminAuth;
use crate::routes::{recover, return_path};
use crate::services::flash;
use crate::state::AppState;
use crate::views::{
    AdminLayout, FilterOption, PageLinks, format_datetime, non_empty, page_or_first,
};

// =============================================================================
// Query and Form Types
// =============================================================================

/// Listing filters.
#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
    pub q: Option<String>,
    pub page: Option<u32>,
}

/// Status change form.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
    pub return_to: Option<String>,
}

// =============================================================================
// Views
// =============================================================================

/// Order row for the listing.
#[derive(Debug, Clone)]
pub struct OrderRow {
    pub id: String,
    pub code: String,
    pub customer_name: String,
    pub item_count: u32,
    pub total: String,
    pub payment_method: String,
    pub payment_status: String,
    pub payment_class: String,
    pub status: String,
    pub status_class: String,
    pub placed_at: String,
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.to_string(),
            code: order.code.clone(),
            customer_name: order.customer_name().to_string(),
            item_count: order.item_count(),
            total: order.total.to_string(),
            payment_method: order.payment_method.label().to_string(),
            payment_status: order.payment_status.label().to_string(),
            payment_class: order.payment_status.badge_class().to_string(),
            status: order.status.label().to_string(),
            status_class: order.status.badge_class().to_string(),
            placed_at: format_datetime(&order.created_at),
        }
    }
}

/// Order line for the detail page.
#[derive(Debug, Clone)]
pub struct OrderLineView {
    pub product_id: String,
    pub name: String,
    pub image: Option<String>,
    pub unit_price: String,
    pub quantity: u32,
    pub line_total: String,
}

impl From<&OrderItem> for OrderLineView {
    fn from(item: &OrderItem) -> Self {
        Self {
            product_id: item.product_id.to_string(),
            name: item.product_name.clone(),
            image: item.image.clone(),
            unit_price: item.unit_price.to_string(),
            quantity: item.quantity,
            line_total: item.line_total().to_string(),
        }
    }
}

/// One step of the fulfilment track.
#[derive(Debug, Clone)]
pub struct ProgressStep {
    pub label: &'static str,
    pub done: bool,
}

const TRACK: [OrderStatus; 4] = [
    OrderStatus::Pending,
    OrderStatus::Confirmed,
    OrderStatus::Shipping,
    OrderStatus::Delivered,
];

/// Fulfilment track; empty for cancelled orders.
fn progress(status: OrderStatus) -> Vec<ProgressStep> {
    status.progress_step().map_or_else(Vec::new, |current| {
        TRACK
            .iter()
            .enumerate()
            .map(|(step, status)| ProgressStep {
                label: status.label(),
                done: step <= current,
            })
            .collect()
    })
}

/// Order detail for the show page.
#[derive(Debug, Clone)]
pub struct OrderDetailView {
    pub id: String,
    pub code: String,
    pub placed_at: String,
    pub status: String,
    pub status_class: String,
    pub payment_method: String,
    pub payment_status: String,
    pub payment_class: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub recipient: String,
    pub phone: String,
    pub address: String,
    pub note: Option<String>,
    pub lines: Vec<OrderLineView>,
    pub subtotal: String,
    pub shipping_fee: String,
    pub total: String,
    pub progress: Vec<ProgressStep>,
    pub next_statuses: Vec<FilterOption>,
    pub can_invoice: bool,
}

impl From<&Order> for OrderDetailView {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.to_string(),
            code: order.code.clone(),
            placed_at: format_datetime(&order.created_at),
            status: order.status.label().to_string(),
            status_class: order.status.badge_class().to_string(),
            payment_method: order.payment_method.label().to_string(),
            payment_status: order.payment_status.label().to_string(),
            payment_class: order.payment_status.badge_class().to_string(),
            customer_name: order.customer_name().to_string(),
            customer_email: order.user.as_ref().and_then(|u| u.email.clone()),
            recipient: order.shipping.full_name.clone(),
            phone: order.shipping.phone.clone(),
            address: order.shipping.address.clone(),
            note: order.shipping.note.clone(),
            lines: order.items.iter().map(OrderLineView::from).collect(),
            subtotal: order.subtotal.to_string(),
            shipping_fee: order.shipping_fee.to_string(),
            total: order.total.to_string(),
            progress: progress(order.status),
            next_statuses: order
                .status
                .next_statuses()
                .iter()
                .map(|s| FilterOption::new(s.as_str(), s.label(), ""))
                .collect(),
            can_invoice: order.can_invoice(),
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Orders list page template.
#[derive(Template)]
#[template(path = "orders/index.html")]
pub struct OrdersIndexTemplate {
    pub layout: AdminLayout,
    pub orders: Vec<OrderRow>,
    pub statuses: Vec<FilterOption>,
    pub search_query: String,
    pub pages: Option<PageLinks>,
    pub load_error: Option<String>,
}

/// Order detail page template.
#[derive(Template)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub layout: AdminLayout,
    pub order: OrderDetailView,
}

// =============================================================================
// Route Handlers
// =============================================================================

/// Build the orders router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(index))
        .route("/orders/{id}", get(show))
        .route("/orders/{id}/status", post(update_status))
        .route("/orders/{id}/invoice", post(issue_invoice))
}

/// Orders list page handler.
///
/// GET /orders
#[instrument(skip(admin, state, session), fields(admin_id = %admin.id))]
pub async fn index(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<OrderListQuery>,
) -> Result<Html<String>> {
    let status: Option<OrderStatus> = query.status.as_deref().and_then(|s| s.parse().ok());
    let status_filter = status.map(|s| s.as_str()).unwrap_or_default();
    let search_query = query.q.as_deref().and_then(non_empty).unwrap_or_default();

    let order_query = OrderQuery {
        page: page_or_first(query.page),
        limit: state.config().page_size,
        status,
        q: non_empty(&search_query),
    };
    let (orders, load_error) = recover(
        state.api().list_orders(&admin.token, &order_query).await,
        "orders",
    )?;

    let params = [
        ("status", status_filter.to_string()),
        ("q", search_query.clone()),
    ];

    let template = OrdersIndexTemplate {
        layout: AdminLayout::load(&session, &admin, "/orders", "Orders").await,
        pages: orders
            .as_ref()
            .map(|page| PageLinks::new(&page.pagination(), "/orders", &params)),
        orders: orders
            .map(|page| page.items.iter().map(OrderRow::from).collect())
            .unwrap_or_default(),
        statuses: OrderStatus::ALL
            .iter()
            .map(|s| FilterOption::new(s.as_str(), s.label(), status_filter))
            .collect(),
        search_query,
        load_error,
    };

    render(&template)
}

/// Order detail page handler.
///
/// GET /orders/{id}
#[instrument(skip(admin, state, session), fields(admin_id = %admin.id))]
pub async fn show(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<OrderId>,
) -> Result<Html<String>> {
    let order = state.api().get_order(&admin.token, id).await?;

    let template = OrderShowTemplate {
        layout: AdminLayout::load(
            &session,
            &admin,
            &format!("/orders/{id}"),
            format!("Order {}", order.code),
        )
        .await,
        order: OrderDetailView::from(&order),
    };

    render(&template)
}

/// Move an order to a new status.
///
/// POST /orders/{id}/status
#[instrument(skip(admin, state, session, form), fields(admin_id = %admin.id, status = %form.status))]
pub async fn update_status(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<OrderId>,
    Form(form): Form<StatusForm>,
) -> Result<Redirect> {
    let back = return_path(form.return_to.as_deref(), &format!("/orders/{id}"));

    let Ok(status) = form.status.parse::<OrderStatus>() else {
        flash::error(&session, "Choose a valid status.").await;
        return Ok(Redirect::to(&back));
    };

    match state
        .api()
        .update_order_status(&admin.token, id, status)
        .await
    {
        Ok(order) => {
            tracing::info!(order_id = %id, status = order.status.as_str(), "Order status changed");
            flash::success(
                &session,
                format!("Order {} is now {}.", order.code, order.status.label()),
            )
            .await;
        }
        Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized.into()),
        Err(e) => {
            tracing::warn!(order_id = %id, "Status change rejected: {e}");
            flash::error(&session, e.user_message()).await;
        }
    }

    Ok(Redirect::to(&back))
}

/// Issue the invoice for an order and open it.
///
/// POST /orders/{id}/invoice
#[instrument(skip(admin, state, session), fields(admin_id = %admin.id))]
pub async fn issue_invoice(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<OrderId>,
) -> Result<Redirect> {
    match state.api().issue_invoice(&admin.token, id).await {
        Ok(invoice) => {
            tracing::info!(order_id = %id, invoice_id = %invoice.id, "Invoice issued");
            flash::success(&session, format!("Invoice {} issued.", invoice.number)).await;
            Ok(Redirect::to(&format!("/invoices/{}", invoice.id)))
        }
        Err(ApiError::Unauthorized) => Err(ApiError::Unauthorized.into()),
        Err(e) => {
            tracing::warn!(order_id = %id, "Invoice not issued: {e}");
            flash::error(&session, e.user_message()).await;
            Ok(Redirect::to(&format!("/orders/{id}")))
        }
    }
}
