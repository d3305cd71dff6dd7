//! Request and response types for the staff side of the backend API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use marketline_core::{
    CategoryId, InvoiceId, OrderId, OrderStatus, Pagination, PaymentMethod, PaymentStatus,
    ProductId, Rating, ReviewId, UserId, UserRole, Vnd, discount_percent,
};

const fn default_true() -> bool {
    true
}

const fn first_page() -> u32 {
    1
}

/// One page of a listing.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub total: u64,
}

impl<T> Page<T> {
    /// Page arithmetic for the listing controls.
    #[must_use]
    pub fn pagination(&self) -> Pagination {
        let per_page = if self.limit == 0 {
            u32::try_from(self.items.len()).unwrap_or(u32::MAX)
        } else {
            self.limit
        };
        Pagination::new(self.page, per_page, self.total)
    }
}

// =============================================================================
// Auth and Dashboard
// =============================================================================

/// A user account.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub role: UserRole,
}

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Response of the login call.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    #[serde(alias = "access_token")]
    pub token: String,
    pub user: User,
}

/// Counters returned by `GET /admin/stats`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DashboardStats {
    pub total_orders: u64,
    pub pending_orders: u64,
    pub total_revenue: Vnd,
    pub total_products: u64,
    pub total_customers: u64,
    pub low_stock_products: u64,
}

/// Response of `POST /admin/uploads`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub url: String,
}

// =============================================================================
// Catalog
// =============================================================================

/// Category reference embedded in a product.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRef {
    pub id: CategoryId,
    pub name: String,
}

/// A product as returned by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Vnd,
    #[serde(default)]
    pub sale_price: Option<Vnd>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub sold: u32,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub category: Option<CategoryRef>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Percent off when the product is on sale.
    #[must_use]
    pub fn discount_percent(&self) -> Option<u8> {
        discount_percent(self.price, self.sale_price)
    }

    /// First image, used as the thumbnail.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// A product category.
#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub product_count: u32,
    /// Hidden categories are left out of the storefront menus.
    #[serde(default = "visible_by_default")]
    pub is_visible: bool,
}

const fn visible_by_default() -> bool {
    true
}

/// Query parameters for `GET /products`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProductQuery {
    pub page: u32,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    /// Ask for inactive products too.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub include_inactive: bool,
}

impl ProductQuery {
    /// First page of `limit` products, inactive ones included.
    #[must_use]
    pub fn new(limit: u32) -> Self {
        Self {
            page: 1,
            limit,
            include_inactive: true,
            ..Self::default()
        }
    }
}

/// Body of `POST /admin/products` and `PUT /admin/products/{id}`.
///
/// Prices are whole đồng.
#[derive(Debug, Clone, Serialize)]
pub struct ProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub sale_price: Option<i64>,
    pub stock: u32,
    pub category_id: CategoryId,
    pub images: Vec<String>,
    pub is_active: bool,
}

/// Body of `POST /admin/categories` and `PUT /admin/categories/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryRequest {
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
}

// =============================================================================
// Reviews
// =============================================================================

/// Author shown next to a review.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewAuthor {
    pub id: UserId,
    pub full_name: String,
}

/// A product review.
#[derive(Debug, Clone, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: Option<String>,
    pub user: ReviewAuthor,
    pub rating: Rating,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default = "default_true")]
    pub is_visible: bool,
    pub created_at: DateTime<Utc>,
}

/// Query parameters for `GET /admin/reviews`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReviewQuery {
    pub page: u32,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_visible: Option<bool>,
}

/// Body of `PATCH /admin/categories/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryVisibilityRequest {
    pub is_visible: bool,
}

/// Body of `PATCH /admin/reviews/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewVisibilityRequest {
    pub is_visible: bool,
}

// =============================================================================
// Orders
// =============================================================================

/// A purchased line.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    #[serde(default)]
    pub image: Option<String>,
    pub unit_price: Vnd,
    pub quantity: u32,
}

impl OrderItem {
    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Vnd {
        self.unit_price.checked_mul(self.quantity).unwrap_or_default()
    }
}

/// Delivery details.
#[derive(Debug, Clone, Deserialize)]
pub struct ShippingInfo {
    pub full_name: String,
    pub phone: String,
    pub address: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// Buyer summary attached to an order.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderUser {
    pub id: UserId,
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// An order.
#[derive(Debug, Clone, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub code: String,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub shipping: ShippingInfo,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub subtotal: Vnd,
    #[serde(default)]
    pub shipping_fee: Vnd,
    pub total: Vnd,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub user: Option<OrderUser>,
}

impl Order {
    /// Customer name for listings: the account name, else the recipient.
    #[must_use]
    pub fn customer_name(&self) -> &str {
        self.user
            .as_ref()
            .map_or(self.shipping.full_name.as_str(), |u| u.full_name.as_str())
    }

    /// Total number of units.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Whether an invoice may be issued: the order is paid or delivered.
    #[must_use]
    pub fn can_invoice(&self) -> bool {
        !matches!(self.status, OrderStatus::Cancelled)
            && (self.payment_status == PaymentStatus::Paid
                || self.status == OrderStatus::Delivered)
    }
}

/// Query parameters for `GET /admin/orders`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrderQuery {
    pub page: u32,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
}

/// Body of `PATCH /admin/orders/{id}/status`.
#[derive(Debug, Clone, Serialize)]
pub struct OrderStatusRequest {
    pub status: OrderStatus,
}

// =============================================================================
// Invoices
// =============================================================================

/// One invoice line.
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceLine {
    pub description: String,
    pub quantity: u32,
    pub unit_price: Vnd,
    pub amount: Vnd,
}

/// An issued invoice.
#[derive(Debug, Clone, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub number: String,
    pub order_id: OrderId,
    #[serde(default)]
    pub order_code: Option<String>,
    pub customer_name: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub billing_address: Option<String>,
    #[serde(default)]
    pub lines: Vec<InvoiceLine>,
    pub subtotal: Vnd,
    #[serde(default)]
    pub tax: Vnd,
    pub total: Vnd,
    pub issued_at: DateTime<Utc>,
}

/// Query parameters for `GET /admin/invoices`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InvoiceQuery {
    pub page: u32,
    pub limit: u32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stats_default_missing_counters() {
        let stats: DashboardStats = serde_json::from_value(json!({ "total_orders": 5 })).unwrap();
        assert_eq!(stats.total_orders, 5);
        assert_eq!(stats.total_revenue, Vnd::zero());
        assert_eq!(stats.low_stock_products, 0);
    }

    #[test]
    fn test_product_query_includes_inactive() {
        let mut query = ProductQuery::new(20);
        query.q = Some("mug".to_string());
        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(
            value,
            json!({ "page": 1, "limit": 20, "q": "mug", "include_inactive": true })
        );
    }

    #[test]
    fn test_review_query_serializes_visibility_filter() {
        let query = ReviewQuery {
            page: 2,
            limit: 20,
            product_id: None,
            is_visible: Some(false),
        };
        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(value, json!({ "page": 2, "limit": 20, "is_visible": false }));
    }

    #[test]
    fn test_order_customer_name_falls_back_to_recipient() {
        let order: Order = serde_json::from_value(json!({
            "id": 9,
            "code": "ML-0009",
            "items": [{ "product_id": 1, "product_name": "Mug", "unit_price": 50000, "quantity": 3 }],
            "shipping": { "full_name": "Pham Van An", "phone": "0900000000", "address": "2 Hai Ba Trung" },
            "payment_method": "cod",
            "status": "confirmed",
            "subtotal": 150000,
            "total": 180000,
            "shipping_fee": 30000,
            "created_at": "2026-05-10T02:00:00Z"
        }))
        .unwrap();

        assert_eq!(order.customer_name(), "Pham Van An");
        assert!(!order.can_invoice());
        assert_eq!(order.item_count(), 3);
        assert_eq!(order.items[0].line_total(), Vnd::from_dong(150_000));
    }

    #[test]
    fn test_invoice_needs_payment_or_delivery() {
        let mut order: Order = serde_json::from_value(json!({
            "id": 2,
            "code": "ML-0002",
            "shipping": { "full_name": "Lan", "phone": "0901234567", "address": "1 Le Loi" },
            "payment_method": "vnpay",
            "payment_status": "paid",
            "status": "confirmed",
            "subtotal": 90000,
            "total": 90000,
            "created_at": "2026-05-10T02:00:00Z"
        }))
        .unwrap();
        assert!(order.can_invoice());

        order.payment_status = PaymentStatus::Unpaid;
        assert!(!order.can_invoice());

        order.status = OrderStatus::Delivered;
        assert!(order.can_invoice());

        order.status = OrderStatus::Cancelled;
        order.payment_status = PaymentStatus::Paid;
        assert!(!order.can_invoice());
    }

    #[test]
    fn test_product_request_sends_whole_dong() {
        let request = ProductRequest {
            name: "Mug".to_string(),
            description: None,
            price: 120_000,
            sale_price: Some(99_000),
            stock: 4,
            category_id: CategoryId::new(2),
            images: vec![],
            is_active: true,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["price"], json!(120_000));
        assert_eq!(value["sale_price"], json!(99_000));
        assert_eq!(value["category_id"], json!(2));
    }
}
