//! Request and response types for the backend REST API.
//!
//! Response types tolerate missing optional display fields so that a
//! partially filled record still renders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use marketline_core::{
    CatalogEntry, CategoryId, InvoiceId, OrderId, OrderStatus, Pagination, PaymentMethod,
    PaymentStatus, ProductId, Rating, ReviewId, UserId, UserRole, Vnd, discount_percent,
};

const fn default_true() -> bool {
    true
}

// =============================================================================
// Pagination
// =============================================================================

/// One page of a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub total: u64,
}

const fn first_page() -> u32 {
    1
}

impl<T> Page<T> {
    /// An empty first page.
    #[must_use]
    pub const fn empty(limit: u32) -> Self {
        Self {
            items: Vec::new(),
            page: 1,
            limit,
            total: 0,
        }
    }

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
// Catalog
// =============================================================================

/// Category reference embedded in a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: CategoryId,
    pub name: String,
}

/// A product as returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
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
    #[serde(default)]
    pub rating_average: Option<f64>,
    #[serde(default)]
    pub rating_count: u32,
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

    /// Price the customer pays: the sale price when it is a real discount.
    #[must_use]
    pub fn effective_price(&self) -> Vnd {
        match self.sale_price {
            Some(sale) if self.discount_percent().is_some() => sale,
            _ => self.price,
        }
    }

    /// Whether at least one unit can be bought.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.is_active && self.stock > 0
    }

    /// Units that may be put in a cart: none when the product is inactive.
    #[must_use]
    pub const fn available_stock(&self) -> u32 {
        if self.is_active { self.stock } else { 0 }
    }

    /// First image, used as the thumbnail.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// Cart catalog entry for this product.
    #[must_use]
    pub fn catalog_entry(&self) -> CatalogEntry {
        CatalogEntry {
            name: self.name.clone(),
            unit_price: self.effective_price(),
            stock: self.stock,
            image: self.images.first().cloned(),
            active: self.is_active,
        }
    }
}

/// A product category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub product_count: u32,
}

/// Listing sort order understood by `GET /products`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    BestSelling,
    Rating,
}

impl ProductSort {
    /// Every sort order, in menu order.
    pub const ALL: [Self; 5] = [
        Self::Newest,
        Self::PriceAsc,
        Self::PriceDesc,
        Self::BestSelling,
        Self::Rating,
    ];

    /// Wire value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::BestSelling => "best_selling",
            Self::Rating => "rating",
        }
    }

    /// Menu label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Newest => "Newest",
            Self::PriceAsc => "Price: low to high",
            Self::PriceDesc => "Price: high to low",
            Self::BestSelling => "Best selling",
            Self::Rating => "Top rated",
        }
    }
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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<ProductSort>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<i64>,
}

impl ProductQuery {
    /// First page of `limit` products.
    #[must_use]
    pub fn new(limit: u32) -> Self {
        Self {
            page: 1,
            limit,
            ..Self::default()
        }
    }

    /// Cache key for this listing, or `None` when it must not be cached.
    ///
    /// Search results are never cached.
    #[must_use]
    pub fn cache_key(&self) -> Option<String> {
        if self.q.as_deref().is_some_and(|q| !q.trim().is_empty()) {
            return None;
        }
        Some(format!(
            "products:{}:{}:{}:{}:{}:{}",
            self.page,
            self.limit,
            self.category_id.map(|id| id.to_string()).unwrap_or_default(),
            self.sort.map(|s| s.as_str()).unwrap_or_default(),
            self.min_price.map(|p| p.to_string()).unwrap_or_default(),
            self.max_price.map(|p| p.to_string()).unwrap_or_default(),
        ))
    }
}

// =============================================================================
// Reviews
// =============================================================================

/// Author shown next to a review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewAuthor {
    pub id: UserId,
    pub full_name: String,
}

/// A product review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user: ReviewAuthor,
    pub rating: Rating,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default = "default_true")]
    pub is_visible: bool,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /products/{id}/reviews`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateReviewRequest {
    pub rating: Rating,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

// =============================================================================
// Accounts
// =============================================================================

/// A user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Body of `POST /auth/register`.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub full_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<&'a str>,
}

/// Response of the login and register calls.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    #[serde(alias = "access_token")]
    pub token: String,
    pub user: User,
}

/// Body of `PUT /users/me`.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateProfileRequest<'a> {
    pub full_name: &'a str,
    pub phone: Option<&'a str>,
    pub address: Option<&'a str>,
}

/// Body of `POST /auth/change-password`.
#[derive(Debug, Clone, Serialize)]
pub struct ChangePasswordRequest<'a> {
    pub current_password: &'a str,
    pub new_password: &'a str,
}

/// Body of `POST /auth/forgot-password`.
#[derive(Debug, Clone, Serialize)]
pub struct ForgotPasswordRequest<'a> {
    pub email: &'a str,
}

/// Body of `POST /auth/reset-password`.
#[derive(Debug, Clone, Serialize)]
pub struct ResetPasswordRequest<'a> {
    pub email: &'a str,
    /// Six-digit code mailed by the backend.
    pub otp: &'a str,
    pub new_password: &'a str,
}

// =============================================================================
// Orders
// =============================================================================

/// A purchased line.
#[derive(Debug, Clone, Serialize, Deserialize)]
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
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub full_name: String,
    pub phone: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Buyer summary attached to an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderUser {
    pub id: UserId,
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// An order.
#[derive(Debug, Clone, Serialize, Deserialize)]
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
    /// Whether the customer may still cancel.
    #[must_use]
    pub const fn can_cancel(&self) -> bool {
        self.status.is_cancellable()
    }

    /// Whether an online payment is still outstanding.
    #[must_use]
    pub const fn awaiting_online_payment(&self) -> bool {
        self.payment_method.is_online()
            && matches!(
                self.payment_status,
                PaymentStatus::Unpaid | PaymentStatus::Failed
            )
            && !matches!(self.status, OrderStatus::Cancelled)
    }

    /// Total number of units.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

/// One line of `POST /orders`.
#[derive(Debug, Clone, Serialize)]
pub struct OrderLineRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLineRequest>,
    pub shipping: ShippingInfo,
    pub payment_method: PaymentMethod,
}

/// Body of `POST /orders/{id}/cancel`.
#[derive(Debug, Clone, Serialize)]
pub struct CancelOrderRequest<'a> {
    pub reason: &'a str,
}

/// Query parameters for `GET /orders`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrderQuery {
    pub page: u32,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
}

// =============================================================================
// Payments
// =============================================================================

/// Body of `POST /payments/vnpay`.
#[derive(Debug, Clone, Serialize)]
pub struct VnpayPaymentRequest<'a> {
    pub order_id: OrderId,
    pub return_url: &'a str,
}

/// Response of `POST /payments/vnpay`.
#[derive(Debug, Clone, Deserialize)]
pub struct VnpayPayment {
    pub payment_url: String,
}

/// Verdict of `GET /payments/vnpay/return`.
#[derive(Debug, Clone, Deserialize)]
pub struct VnpayReturn {
    #[serde(default)]
    pub order_id: Option<OrderId>,
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

// =============================================================================
// Invoices
// =============================================================================

/// One invoice line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub description: String,
    pub quantity: u32,
    pub unit_price: Vnd,
    pub amount: Vnd,
}

/// An issued invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product_json() -> serde_json::Value {
        json!({
            "id": 7,
            "name": "Ceramic mug",
            "price": 120000,
            "sale_price": "90000",
            "stock": 4,
            "images": ["https://cdn.example.vn/mug.jpg"],
            "category": { "id": 2, "name": "Kitchen" }
        })
    }

    #[test]
    fn test_product_defaults_optional_fields() {
        let product: Product = serde_json::from_value(product_json()).unwrap();
        assert!(product.is_active);
        assert_eq!(product.sold, 0);
        assert_eq!(product.rating_count, 0);
        assert!(product.description.is_none());
        assert_eq!(product.discount_percent(), Some(25));
        assert_eq!(product.effective_price(), Vnd::from_dong(90_000));
    }

    #[test]
    fn test_sale_price_above_price_is_ignored() {
        let mut product: Product = serde_json::from_value(product_json()).unwrap();
        product.sale_price = Some(Vnd::from_dong(150_000));
        assert_eq!(product.effective_price(), Vnd::from_dong(120_000));
    }

    #[test]
    fn test_catalog_entry_uses_effective_price() {
        let product: Product = serde_json::from_value(product_json()).unwrap();
        let entry = product.catalog_entry();
        assert_eq!(entry.unit_price, Vnd::from_dong(90_000));
        assert_eq!(entry.stock, 4);
        assert_eq!(entry.image.as_deref(), Some("https://cdn.example.vn/mug.jpg"));
        assert!(entry.active);
    }

    #[test]
    fn test_order_awaiting_online_payment() {
        let mut order: Order = serde_json::from_value(json!({
            "id": 1,
            "code": "ML-0001",
            "items": [{ "product_id": 7, "product_name": "Mug", "unit_price": 90000, "quantity": 2 }],
            "shipping": { "full_name": "Lan", "phone": "0901234567", "address": "1 Le Loi" },
            "payment_method": "vnpay",
            "status": "pending",
            "subtotal": 180000,
            "total": 180000,
            "created_at": "2026-03-01T08:00:00Z"
        }))
        .unwrap();

        assert_eq!(order.payment_status, PaymentStatus::Unpaid);
        assert_eq!(order.shipping_fee, Vnd::zero());
        assert_eq!(order.item_count(), 2);
        assert_eq!(order.items[0].line_total(), Vnd::from_dong(180_000));
        assert!(order.awaiting_online_payment());
        assert!(order.can_cancel());

        order.status = OrderStatus::Cancelled;
        assert!(!order.awaiting_online_payment());
        assert!(!order.can_cancel());
    }

    #[test]
    fn test_product_query_cache_key() {
        let mut query = ProductQuery::new(12);
        query.sort = Some(ProductSort::PriceAsc);
        assert_eq!(query.cache_key().as_deref(), Some("products:1:12::price_asc::"));

        query.q = Some("mug".to_string());
        assert!(query.cache_key().is_none());

        query.q = Some("   ".to_string());
        assert!(query.cache_key().is_some());
    }

    #[test]
    fn test_product_query_serializes_only_set_filters() {
        let mut query = ProductQuery::new(12);
        query.category_id = Some(CategoryId::new(3));
        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(value, json!({ "page": 1, "limit": 12, "category_id": 3 }));
    }

    #[test]
    fn test_page_pagination() {
        let page: Page<Category> = serde_json::from_value(json!({
            "items": [], "page": 2, "limit": 10, "total": 35
        }))
        .unwrap();
        let pagination = page.pagination();
        assert_eq!(pagination.total_pages(), 4);
        assert!(pagination.has_prev());
        assert!(pagination.has_next());
    }

    #[test]
    fn test_auth_response_accepts_access_token_alias() {
        let response: AuthResponse = serde_json::from_value(json!({
            "access_token": "abc",
            "user": { "id": 1, "email": "lan@example.vn", "full_name": "Lan" }
        }))
        .unwrap();
        assert_eq!(response.token, "abc");
        assert_eq!(response.user.role, UserRole::Customer);
    }
}
