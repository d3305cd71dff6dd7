//! Order fulfilment and invoices.

use reqwest::Method;
use tracing::instrument;

use marketline_core::{InvoiceId, OrderId, OrderStatus};

use super::types::{Invoice, InvoiceQuery, Order, OrderQuery, OrderStatusRequest, Page};
use super::{AccessToken, ApiClient, ApiError};

impl ApiClient {
    // =========================================================================
    // Order Methods
    // =========================================================================

    /// List every customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn list_orders(
        &self,
        token: &AccessToken,
        query: &OrderQuery,
    ) -> Result<Page<Order>, ApiError> {
        self.get_with_query("/admin/orders", query, Some(token))
            .await
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the order does not exist.
    #[instrument(skip(self, token), fields(order_id = %id))]
    pub async fn get_order(&self, token: &AccessToken, id: OrderId) -> Result<Order, ApiError> {
        self.get(&format!("/admin/orders/{id}"), Some(token)).await
    }

    /// Move an order to a new status.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` when the backend refuses the
    /// transition.
    #[instrument(skip(self, token), fields(order_id = %id, status = status.as_str()))]
    pub async fn update_order_status(
        &self,
        token: &AccessToken,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, ApiError> {
        self.send_json(
            Method::PATCH,
            &format!("/admin/orders/{id}/status"),
            &OrderStatusRequest { status },
            token,
        )
        .await
    }

    /// Issue the invoice for an order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` if an invoice already exists or the
    /// order cannot be invoiced.
    #[instrument(skip(self, token), fields(order_id = %id))]
    pub async fn issue_invoice(&self, token: &AccessToken, id: OrderId) -> Result<Invoice, ApiError> {
        self.send_json(
            Method::POST,
            &format!("/admin/orders/{id}/invoice"),
            &serde_json::json!({}),
            token,
        )
        .await
    }

    // =========================================================================
    // Invoice Methods
    // =========================================================================

    /// List issued invoices, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn list_invoices(
        &self,
        token: &AccessToken,
        query: &InvoiceQuery,
    ) -> Result<Page<Invoice>, ApiError> {
        self.get_with_query("/admin/invoices", query, Some(token))
            .await
    }

    /// Get an invoice by ID.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the invoice does not exist.
    #[instrument(skip(self, token), fields(invoice_id = %id))]
    pub async fn get_invoice(&self, token: &AccessToken, id: InvoiceId) -> Result<Invoice, ApiError> {
        self.get(&format!("/admin/invoices/{id}"), Some(token)).await
    }
}
