//! View models shared by several templates.
//!
//! Templates receive pre-formatted strings; formatting rules (money, stars,
//! page links) live here rather than in template logic.

use axum::http::HeaderMap;
use chrono::{DateTime, FixedOffset, Utc};
use tower_sessions::Session;
use url::form_urlencoded;
use validator::ValidationErrors;

use marketline_core::{Pagination, ProductId, average_stars};

use crate::api::Product;
use crate::middleware::CspNonce;
use crate::models::{CurrentUser, session_keys};
use crate::services::{cart, flash};
use crate::services::flash::Flash;

/// Page chrome: header, toasts and the script nonce.
#[derive(Debug, Clone)]
pub struct Layout {
    pub title: String,
    pub nonce: String,
    pub user: Option<CurrentUser>,
    pub cart_count: u32,
    pub flashes: Vec<Flash>,
}

impl Layout {
    /// Gather the chrome for a page about to be rendered.
    ///
    /// Takes the queued toasts, so call it only when the page is actually
    /// rendered (not before a redirect).
    pub async fn load(session: &Session, nonce: CspNonce, title: impl Into<String>) -> Self {
        let user = session
            .get::<CurrentUser>(session_keys::CURRENT_USER)
            .await
            .ok()
            .flatten();

        Self {
            title: title.into(),
            nonce: nonce.0,
            user,
            cart_count: cart::count(session).await,
            flashes: flash::take(session).await,
        }
    }

    /// Greeting name for the header.
    #[must_use]
    pub fn greeting(&self) -> &str {
        self.user.as_ref().map_or("", CurrentUser::first_name)
    }
}

/// Star string such as `★★★★☆`.
#[must_use]
pub fn star_string(filled: u8, empty: u8) -> String {
    let mut stars = "★".repeat(usize::from(filled));
    stars.push_str(&"☆".repeat(usize::from(empty)));
    stars
}

/// Product tile used in grids.
#[derive(Debug, Clone)]
pub struct ProductCard {
    pub id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub price: String,
    /// Crossed-out list price when on sale.
    pub original_price: Option<String>,
    pub discount: Option<u8>,
    pub in_stock: bool,
    pub stars: String,
    pub rating_count: u32,
    pub category: Option<String>,
}

impl From<&Product> for ProductCard {
    fn from(product: &Product) -> Self {
        let discount = product.discount_percent();
        let (filled, empty) = average_stars(product.rating_average.unwrap_or(0.0));

        Self {
            id: product.id,
            name: product.name.clone(),
            image: product.images.first().cloned(),
            price: product.effective_price().to_string(),
            original_price: discount.map(|_| product.price.to_string()),
            discount,
            in_stock: product.in_stock(),
            stars: star_string(filled, empty),
            rating_count: product.rating_count,
            category: product.category.as_ref().map(|c| c.name.clone()),
        }
    }
}

/// One numbered page link.
#[derive(Debug, Clone)]
pub struct PageLink {
    pub number: u32,
    pub url: String,
    pub current: bool,
}

/// Pagination controls.
#[derive(Debug, Clone)]
pub struct PageLinks {
    pub prev: Option<String>,
    pub next: Option<String>,
    pub pages: Vec<PageLink>,
    pub total_pages: u32,
}

impl PageLinks {
    /// Links for `pagination`, keeping the other query `params`.
    ///
    /// Empty parameter values are dropped from the URLs.
    #[must_use]
    pub fn new(pagination: &Pagination, path: &str, params: &[(&str, String)]) -> Self {
        let url = |page: u32| page_url(path, params, page);

        Self {
            prev: pagination
                .has_prev()
                .then(|| url(pagination.prev_page())),
            next: pagination
                .has_next()
                .then(|| url(pagination.next_page())),
            pages: pagination
                .window(2)
                .into_iter()
                .map(|number| PageLink {
                    number,
                    url: url(number),
                    current: number == pagination.page,
                })
                .collect(),
            total_pages: pagination.total_pages(),
        }
    }

    /// Whether there is more than one page to show.
    #[must_use]
    pub const fn is_paginated(&self) -> bool {
        self.total_pages > 1
    }
}

fn page_url(path: &str, params: &[(&str, String)], page: u32) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        if !value.is_empty() {
            query.append_pair(key, value);
        }
    }
    if page > 1 {
        query.append_pair("page", &page.to_string());
    }

    let query = query.finish();
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{query}")
    }
}

/// Vietnam is UTC+7 all year.
const VIETNAM_OFFSET_SECS: i32 = 7 * 3600;

fn format_local(value: &DateTime<Utc>, format: &str) -> String {
    FixedOffset::east_opt(VIETNAM_OFFSET_SECS).map_or_else(
        || value.format(format).to_string(),
        |offset| value.with_timezone(&offset).format(format).to_string(),
    )
}

/// `dd/mm/yyyy hh:mm` in shop time.
#[must_use]
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    format_local(value, "%d/%m/%Y %H:%M")
}

/// `dd/mm/yyyy` in shop time.
#[must_use]
pub fn format_date(value: &DateTime<Utc>) -> String {
    format_local(value, "%d/%m/%Y")
}

/// Keep redirect targets on this site.
///
/// Accepts absolute paths only; `//host`, anything with a scheme and
/// anything with control characters (which would not survive as a
/// `Location` header) fall back to `default`.
#[must_use]
pub fn safe_next<'a>(next: Option<&'a str>, default: &'a str) -> &'a str {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(char::is_control) =>
        {
            path
        }
        _ => default,
    }
}

/// Whether the request came from an in-page fragment swap rather than a
/// full navigation.
#[must_use]
pub fn is_fragment_request(headers: &HeaderMap) -> bool {
    headers.contains_key("hx-request")
}

/// Flatten validator errors into messages for an inline alert.
///
/// Fields are reported in name order so the alert is stable.
#[must_use]
pub fn validation_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    fields
        .into_iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| {
                error.message.as_ref().map_or_else(
                    || format!("{} is invalid", field.replace('_', " ")),
                    ToString::to_string,
                )
            })
        })
        .collect()
}

/// Trim a form value, mapping blank input to `None`.
#[must_use]
pub fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use validator::Validate;

    use super::*;

    #[test]
    fn test_star_string() {
        assert_eq!(star_string(4, 1), "★★★★☆");
        assert_eq!(star_string(0, 5), "☆☆☆☆☆");
    }

    #[test]
    fn test_product_card_on_sale() {
        let product: Product = serde_json::from_value(json!({
            "id": 3, "name": "Tea set", "price": 400000, "sale_price": 300000,
            "stock": 0, "rating_average": 4.4, "rating_count": 8
        }))
        .unwrap();
        let card = ProductCard::from(&product);
        assert_eq!(card.price, "300.000 ₫");
        assert_eq!(card.original_price.as_deref(), Some("400.000 ₫"));
        assert_eq!(card.discount, Some(25));
        assert!(!card.in_stock);
        assert_eq!(card.stars, "★★★★☆");
    }

    #[test]
    fn test_page_links_keep_filters() {
        let pagination = Pagination::new(2, 10, 45);
        let links = PageLinks::new(
            &pagination,
            "/products",
            &[("q", "tea cup".to_string()), ("sort", String::new())],
        );
        assert_eq!(links.prev.as_deref(), Some("/products?q=tea+cup"));
        assert_eq!(links.next.as_deref(), Some("/products?q=tea+cup&page=3"));
        assert_eq!(links.pages.len(), 4);
        assert!(links.pages[1].current);
        assert!(links.is_paginated());
    }

    #[test]
    fn test_single_page_has_no_links() {
        let links = PageLinks::new(&Pagination::new(1, 10, 3), "/orders", &[]);
        assert!(links.prev.is_none());
        assert!(links.next.is_none());
        assert!(!links.is_paginated());
    }

    #[test]
    fn test_dates_use_shop_time() {
        let value = "2026-03-01T20:30:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(format_datetime(&value), "02/03/2026 03:30");
        assert_eq!(format_date(&value), "02/03/2026");
    }

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/orders/5"), "/"), "/orders/5");
        assert_eq!(safe_next(Some("//evil.example"), "/"), "/");
        assert_eq!(safe_next(Some("https://evil.example"), "/"), "/");
        assert_eq!(safe_next(Some("/\\evil.example"), "/"), "/");
        assert_eq!(safe_next(None, "/cart"), "/cart");
        assert_eq!(
            safe_next(Some("/cart\r\nSet-Cookie: x=1"), "/cart"),
            "/cart"
        );
        assert_eq!(safe_next(Some("/cart\tx"), "/"), "/");
    }

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 1, message = "Name is required"))]
        full_name: String,
        #[validate(length(min = 8))]
        password: String,
    }

    #[test]
    fn test_validation_messages_are_sorted_and_readable() {
        let errors = Sample {
            full_name: String::new(),
            password: "short".to_string(),
        }
        .validate()
        .unwrap_err();

        assert_eq!(
            validation_messages(&errors),
            vec!["Name is required".to_string(), "password is invalid".to_string()]
        );
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  0901234567 "), Some("0901234567"));
        assert_eq!(non_empty("   "), None);
    }

    #[test]
    fn test_fragment_request_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_fragment_request(&headers));
        headers.insert("hx-request", "true".parse().unwrap());
        assert!(is_fragment_request(&headers));
    }
}
