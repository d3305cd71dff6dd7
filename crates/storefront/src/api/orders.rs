//! Orders, VNPay payments and invoices.

use reqwest::Method;
use tracing::instrument;

use marketline_core::OrderId;

use super::types::{
    CancelOrderRequest, CreateOrderRequest, Invoice, Order, OrderQuery, Page, VnpayPayment, VnpayPaymentRequest,
    VnpayReturn,
};
use super::{AccessToken, ApiClient, ApiError};

impl ApiClient {
    /// Place an order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` when the backend rejects the order
    /// (stock changed, invalid shipping data), or an error if the API
    /// request fails.
    #[instrument(skip_all, fields(lines = request.items.len(), method = request.payment_method.as_str()))]
    pub async fn create_order(
        &self,
        token: &AccessToken,
        request: &CreateOrderRequest,
    ) -> Result<Order, ApiError> {
        let order: Order = self
            .send_json(Method::POST, "/orders", request, Some(token))
            .await?;

        let ids: Vec<_> = request.items.iter().map(|line| line.product_id).collect();
        self.invalidate_products(&ids).await;

        Ok(order)
    }

    /// The customer's orders, newest first.
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
        self.get_with_query("/orders", query, Some(token)).await
    }

    /// One of the customer's orders.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the order does not exist or belongs
    /// to someone else.
    #[instrument(skip(self, token))]
    pub async fn get_order(&self, token: &AccessToken, id: OrderId) -> Result<Order, ApiError> {
        self.get(&format!("/orders/{id}"), Some(token)).await
    }

    /// Cancel a pending order, giving the customer's reason.
    ///
    /// The backend puts the stock back, so the order's products are dropped
    /// from the cache.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` if the order can no longer be cancelled.
    #[instrument(skip(self, token, reason))]
    pub async fn cancel_order(
        &self,
        token: &AccessToken,
        id: OrderId,
        reason: &str,
    ) -> Result<Order, ApiError> {
        let order: Order = self
            .send_json(
                Method::POST,
                &format!("/orders/{id}/cancel"),
                &CancelOrderRequest { reason },
                Some(token),
            )
            .await?;

        let ids: Vec<_> = order.items.iter().map(|item| item.product_id).collect();
        self.invalidate_products(&ids).await;

        Ok(order)
    }

    /// Invoice issued for an order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if no invoice has been issued yet.
    #[instrument(skip(self, token))]
    pub async fn get_invoice(
        &self,
        token: &AccessToken,
        order_id: OrderId,
    ) -> Result<Invoice, ApiError> {
        self.get(&format!("/orders/{order_id}/invoice"), Some(token))
            .await
    }

    // =========================================================================
    // VNPay
    // =========================================================================

    /// Ask the backend for a signed VNPay payment URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot create the payment.
    #[instrument(skip(self, token))]
    pub async fn create_vnpay_payment(
        &self,
        token: &AccessToken,
        order_id: OrderId,
        return_url: &str,
    ) -> Result<VnpayPayment, ApiError> {
        self.send_json(
            Method::POST,
            "/payments/vnpay",
            &VnpayPaymentRequest {
                order_id,
                return_url,
            },
            Some(token),
        )
        .await
    }

    /// Have the backend verify the gateway's return parameters.
    ///
    /// The query string is forwarded untouched because the signature covers
    /// the exact parameter encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token, raw_query))]
    pub async fn verify_vnpay_return(
        &self,
        token: Option<&AccessToken>,
        raw_query: &str,
    ) -> Result<VnpayReturn, ApiError> {
        let path = if raw_query.is_empty() {
            "/payments/vnpay/return".to_string()
        } else {
            format!("/payments/vnpay/return?{raw_query}")
        };
        self.get(&path, token).await
    }
}
