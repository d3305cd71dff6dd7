//! Invoice route handlers.
//!
//! The show page is laid out for printing; the browser's print dialog
//! produces the paper or PDF copy.

use askama::Template;
use axum::{
    Router,
    extract::{Path, Query, State},
    response::Html,
    routing::get,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use marketline_core::InvoiceId;

use crate::api::{Invoice, InvoiceLine, InvoiceQuery};
use crate::error::{Result, render};
use crate::filters;
use crate::middleware::RequireAdminAuth;
use crate::routes::recover;
use crate::state::AppState;
use crate::views::{AdminLayout, PageLinks, format_datetime, page_or_first};

/// Listing query.
#[derive(Debug, Default, Deserialize)]
pub struct InvoiceListQuery {
    pub page: Option<u32>,
}

/// Invoice row for the listing.
#[derive(Debug, Clone)]
pub struct InvoiceRow {
    pub id: String,
    pub number: String,
    pub order_id: String,
    pub order_code: String,
    pub customer_name: String,
    pub total: String,
    pub issued_at: String,
}

impl From<&Invoice> for InvoiceRow {
    fn from(invoice: &Invoice) -> Self {
        Self {
            id: invoice.id.to_string(),
            number: invoice.number.clone(),
            order_id: invoice.order_id.to_string(),
            order_code: invoice
                .order_code
                .clone()
                .unwrap_or_else(|| format!("#{}", invoice.order_id)),
            customer_name: invoice.customer_name.clone(),
            total: invoice.total.to_string(),
            issued_at: format_datetime(&invoice.issued_at),
        }
    }
}

/// Invoice line view.
#[derive(Debug, Clone)]
pub struct InvoiceLineView {
    pub description: String,
    pub quantity: u32,
    pub unit_price: String,
    pub amount: String,
}

impl From<&InvoiceLine> for InvoiceLineView {
    fn from(line: &InvoiceLine) -> Self {
        Self {
            description: line.description.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price.to_string(),
            amount: line.amount.to_string(),
        }
    }
}

/// Printable invoice view.
#[derive(Debug, Clone)]
pub struct InvoiceView {
    pub row: InvoiceRow,
    pub customer_email: Option<String>,
    pub billing_address: Option<String>,
    pub lines: Vec<InvoiceLineView>,
    pub subtotal: String,
    pub tax: Option<String>,
}

impl From<&Invoice> for InvoiceView {
    fn from(invoice: &Invoice) -> Self {
        Self {
            row: InvoiceRow::from(invoice),
            customer_email: invoice.customer_email.clone(),
            billing_address: invoice.billing_address.clone(),
            lines: invoice.lines.iter().map(InvoiceLineView::from).collect(),
            subtotal: invoice.subtotal.to_string(),
            tax: invoice.tax.is_positive().then(|| invoice.tax.to_string()),
        }
    }
}

/// Invoices list page template.
#[derive(Template)]
#[template(path = "invoices/index.html")]
pub struct InvoicesIndexTemplate {
    pub layout: AdminLayout,
    pub invoices: Vec<InvoiceRow>,
    pub pages: Option<PageLinks>,
    pub load_error: Option<String>,
}

/// Printable invoice template.
#[derive(Template)]
#[template(path = "invoices/show.html")]
pub struct InvoiceShowTemplate {
    pub layout: AdminLayout,
    pub invoice: InvoiceView,
}

/// Build the invoices router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/invoices", get(index))
        .route("/invoices/{id}", get(show))
}

/// Invoices list page handler.
///
/// GET /invoices
#[instrument(skip(admin, state, session), fields(admin_id = %admin.id))]
pub async fn index(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<InvoiceListQuery>,
) -> Result<Html<String>> {
    let invoice_query = InvoiceQuery {
        page: page_or_first(query.page),
        limit: state.config().page_size,
    };
    let (invoices, load_error) = recover(
        state.api().list_invoices(&admin.token, &invoice_query).await,
        "invoices",
    )?;

    let template = InvoicesIndexTemplate {
        layout: AdminLayout::load(&session, &admin, "/invoices", "Invoices").await,
        pages: invoices
            .as_ref()
            .map(|page| PageLinks::new(&page.pagination(), "/invoices", &[])),
        invoices: invoices
            .map(|page| page.items.iter().map(InvoiceRow::from).collect())
            .unwrap_or_default(),
        load_error,
    };

    render(&template)
}

/// Printable invoice.
///
/// GET /invoices/{id}
#[instrument(skip(admin, state, session), fields(admin_id = %admin.id))]
pub async fn show(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<InvoiceId>,
) -> Result<Html<String>> {
    let invoice = state.api().get_invoice(&admin.token, id).await?;

    let template = InvoiceShowTemplate {
        layout: AdminLayout::load(
            &session,
            &admin,
            &format!("/invoices/{id}"),
            format!("Invoice {}", invoice.number),
        )
        .await,
        invoice: InvoiceView::from(&invoice),
    };

    render(&template)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::get as stub_get;

    use super::*;
    use crate::api::tests::stub_backend;
    use crate::state::tests::{test_admin, test_session, test_state};

    fn invoice_json() -> serde_json::Value {
        serde_json::json!({
            "id": 40,
            "number": "INV-2026-0040",
            "order_id": 14,
            "order_code": "ML-0014",
            "customer_name": "Hoa Nguyen",
            "customer_email": "hoa@example.vn",
            "billing_address": "12 Ly Thuong Kiet, Hue",
            "lines": [
                { "description": "Ceramic mug", "quantity": 2, "unit_price": 120000, "amount": 240000 },
                { "description": "Shipping", "quantity": 1, "unit_price": 30000, "amount": 30000 }
            ],
            "subtotal": 270000,
            "total": 270000,
            "issued_at": "2026-06-02T03:00:00Z"
        })
    }

    #[test]
    fn test_zero_tax_is_hidden() {
        let invoice: Invoice = serde_json::from_value(invoice_json()).unwrap();
        let view = InvoiceView::from(&invoice);
        assert!(view.tax.is_none());
        assert_eq!(view.row.order_code, "ML-0014");
        assert_eq!(view.lines.len(), 2);
    }

    #[tokio::test]
    async fn test_printable_invoice_renders() {
        let backend = Router::new().route(
            "/api/admin/invoices/{id}",
            stub_get(|| async { axum::Json(invoice_json()) }),
        );
        let state = test_state(stub_backend(backend).await);

        let Html(html) = show(
            RequireAdminAuth(test_admin()),
            State(state),
            test_session(),
            Path(InvoiceId::new(40)),
        )
        .await
        .unwrap();

        assert!(html.contains("INV-2026-0040"));
        assert!(html.contains("270.000 ₫"));
        assert!(html.contains("12 Ly Thuong Kiet, Hue"));
    }

    #[tokio::test]
    async fn test_missing_invoice_is_not_found() {
        let backend = Router::new().route(
            "/api/admin/invoices/{id}",
            stub_get(|| async { StatusCode::NOT_FOUND }),
        );
        let state = test_state(stub_backend(backend).await);

        let response = show(
            RequireAdminAuth(test_admin()),
            State(state),
            test_session(),
            Path(InvoiceId::new(41)),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
