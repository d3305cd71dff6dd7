//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use marketline_core::{CategoryId, ProductId, average_stars};

use crate::api::{Category, Product, ProductQuery, ProductSort, Review};
use crate::error::Result;
use crate::filters;
use crate::middleware::{CspNonce, OptionalAuth};
use crate::state::AppState;
use crate::views::{Layout, PageLinks, ProductCard, format_date, star_string};

/// Reviews shown per page on the product page.
const REVIEWS_PER_PAGE: u32 = 10;

/// Related products shown under the detail.
const RELATED_COUNT: usize = 4;

/// Related products requested; one extra in case the product itself is
/// among them.
const RELATED_LIMIT: u32 = 5;

// =============================================================================
// Query Types
// =============================================================================

/// Listing filters as they arrive in the query string.
///
/// Everything is a string so that an empty form field (`category=`) reads as
/// "no filter" instead of failing extraction.
#[derive(Debug, Default, Deserialize)]
pub struct ListingParams {
    pub q: Option<String>,
    pub category: Option<String>,
    pub sort: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub page: Option<u32>,
}

impl ListingParams {
    fn text(value: Option<&String>) -> Option<String> {
        value
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(String::from)
    }

    /// Search term, if any.
    #[must_use]
    pub fn search(&self) -> Option<String> {
        Self::text(self.q.as_ref())
    }

    /// Selected category filter.
    #[must_use]
    pub fn category_id(&self) -> Option<CategoryId> {
        Self::text(self.category.as_ref()).and_then(|v| v.parse().ok())
    }

    /// Selected sort order; unknown values fall back to the default.
    #[must_use]
    pub fn sort(&self) -> Option<ProductSort> {
        let value = Self::text(self.sort.as_ref())?;
        ProductSort::ALL.into_iter().find(|s| s.as_str() == value)
    }

    /// Price bounds in dong. A reversed range is swapped.
    #[must_use]
    pub fn price_range(&self) -> (Option<i64>, Option<i64>) {
        let parse = |value: Option<&String>| {
            Self::text(value)
                .and_then(|v| v.replace(['.', ','], "").parse::<i64>().ok())
                .filter(|v| *v >= 0)
        };
        match (parse(self.min_price.as_ref()), parse(self.max_price.as_ref())) {
            (Some(min), Some(max)) if min > max => (Some(max), Some(min)),
            range => range,
        }
    }

    /// Backend query for this listing.
    #[must_use]
    pub fn to_query(&self, per_page: u32) -> ProductQuery {
        let (min_price, max_price) = self.price_range();
        ProductQuery {
            page: self.page.unwrap_or(1).max(1),
            limit: per_page,
            category_id: self.category_id(),
            q: self.search(),
            sort: self.sort(),
            min_price,
            max_price,
        }
    }

    /// Parameters to keep on pagination links (`page` excluded).
    #[must_use]
    pub fn link_params(&self) -> Vec<(&'static str, String)> {
        let (min_price, max_price) = self.price_range();
        vec![
            ("q", self.search().unwrap_or_default()),
            (
                "category",
                self.category_id().map(|id| id.to_string()).unwrap_or_default(),
            ),
            (
                "sort",
                self.sort().map(|s| s.as_str().to_string()).unwrap_or_default(),
            ),
            ("min_price", min_price.map(|p| p.to_string()).unwrap_or_default()),
            ("max_price", max_price.map(|p| p.to_string()).unwrap_or_default()),
        ]
    }
}

/// One entry of the sort menu.
#[derive(Debug, Clone)]
pub struct SortOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

/// Sort menu with the current choice marked.
#[must_use]
pub fn sort_options(current: Option<ProductSort>) -> Vec<SortOption> {
    let current = current.unwrap_or_default();
    ProductSort::ALL
        .into_iter()
        .map(|sort| SortOption {
            value: sort.as_str(),
            label: sort.label(),
            selected: sort == current,
        })
        .collect()
}

/// Category entry of the filter menu.
#[derive(Debug, Clone)]
pub struct CategoryOption {
    pub id: CategoryId,
    pub name: String,
    pub selected: bool,
}

// =============================================================================
// Templates
// =============================================================================

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub layout: Layout,
    pub products: Vec<ProductCard>,
    pub total: u64,
    pub search: String,
    pub min_price: String,
    pub max_price: String,
    pub sort_options: Vec<SortOption>,
    pub categories: Vec<CategoryOption>,
    pub links: PageLinks,
    pub error: Option<String>,
}

/// Review display data.
#[derive(Debug, Clone)]
pub struct ReviewView {
    pub author: String,
    pub stars: String,
    pub comment: Option<String>,
    pub date: String,
}

impl From<&Review> for ReviewView {
    fn from(review: &Review) -> Self {
        let (filled, empty) = review.rating.stars();
        Self {
            author: review.user.full_name.clone(),
            stars: star_string(filled, empty),
            comment: review.comment.clone(),
            date: format_date(&review.created_at),
        }
    }
}

/// Breadcrumb link to the product's category.
#[derive(Debug, Clone)]
pub struct CategoryLink {
    pub id: CategoryId,
    pub name: String,
}

/// Product detail display data.
#[derive(Debug, Clone)]
pub struct ProductDetail {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub images: Vec<String>,
    pub price: String,
    pub original_price: Option<String>,
    pub discount: Option<u8>,
    pub stock: u32,
    pub in_stock: bool,
    pub sold: u32,
    pub category: Option<CategoryLink>,
    pub stars: String,
    pub rating_average: String,
    pub rating_count: u32,
}

impl From<&Product> for ProductDetail {
    fn from(product: &Product) -> Self {
        let average = product.rating_average.unwrap_or(0.0);
        let (filled, empty) = average_stars(average);
        let discount = product.discount_percent();

        Self {
            id: product.id,
            name: product.name.clone(),
            description: product.description.clone(),
            images: product.images.clone(),
            price: product.effective_price().to_string(),
            original_price: discount.map(|_| product.price.to_string()),
            discount,
            stock: product.stock,
            in_stock: product.in_stock(),
            sold: product.sold,
            category: product.category.as_ref().map(|c| CategoryLink {
                id: c.id,
                name: c.name.clone(),
            }),
            stars: star_string(filled, empty),
            rating_average: format!("{average:.1}"),
            rating_count: product.rating_count,
        }
    }
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub layout: Layout,
    pub product: ProductDetail,
    pub reviews: Vec<ReviewView>,
    pub review_total: u64,
    pub related: Vec<ProductCard>,
    pub signed_in: bool,
    pub is_favorite: bool,
    pub next: String,
}

// =============================================================================
// Route Handlers
// =============================================================================

/// Display product listing page.
#[instrument(skip(state, session, nonce))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    Query(params): Query<ListingParams>,
) -> impl IntoResponse {
    let query = params.to_query(state.config().products_per_page);
    let (page, categories) = tokio::join!(
        state.api().list_products(&query),
        state.api().list_categories()
    );

    let (page, error) = match page {
        Ok(page) => (page, None),
        Err(e) => {
            tracing::error!("Failed to load products: {e}");
            (crate::api::Page::empty(query.limit), Some(e.user_message()))
        }
    };

    let selected_category = params.category_id();
    let categories = categories
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to load categories: {e}");
            Vec::new()
        })
        .into_iter()
        .map(|c: Category| CategoryOption {
            selected: Some(c.id) == selected_category,
            id: c.id,
            name: c.name,
        })
        .collect();

    let title = params
        .search()
        .map_or_else(|| "All products".to_string(), |q| format!("Search: {q}"));
    let (min_price, max_price) = params.price_range();

    ProductsIndexTemplate {
        layout: Layout::load(&session, nonce, title).await,
        products: page.items.iter().map(ProductCard::from).collect(),
        total: page.total,
        search: params.search().unwrap_or_default(),
        min_price: min_price.map(|p| p.to_string()).unwrap_or_default(),
        max_price: max_price.map(|p| p.to_string()).unwrap_or_default(),
        sort_options: sort_options(params.sort()),
        categories,
        links: PageLinks::new(&page.pagination(), "/products", &params.link_params()),
        error,
    }
}

/// Display product detail page.
///
/// Reviews, related products and the favorite flag are best effort; only
/// the product itself is required.
#[instrument(skip(state, session, nonce, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<ProductId>,
) -> Result<impl IntoResponse> {
    let api = state.api();
    let product = api.get_product(id).await?;

    let related_query = product.category.as_ref().map(|category| ProductQuery {
        category_id: Some(category.id),
        sort: Some(ProductSort::BestSelling),
        ..ProductQuery::new(RELATED_LIMIT)
    });

    let (reviews, related, favorites) = tokio::join!(
        api.list_reviews(id, 1, REVIEWS_PER_PAGE),
        async {
            match &related_query {
                Some(query) => api.list_products(query).await.map(|page| page.items),
                None => Ok(Vec::new()),
            }
        },
        async {
            match &user {
                Some(user) => api.list_favorites(&user.token).await.map(Some),
                None => Ok(None),
            }
        },
    );

    let (reviews, review_total) = match reviews {
        Ok(page) => (
            page.items
                .iter()
                .filter(|review| review.is_visible)
                .map(ReviewView::from)
                .collect(),
            page.total,
        ),
        Err(e) => {
            tracing::warn!("Failed to load reviews: {e}");
            (Vec::new(), 0)
        }
    };

    let related = related
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to load related products: {e}");
            Vec::new()
        })
        .iter()
        .filter(|p| p.id != id)
        .take(RELATED_COUNT)
        .map(ProductCard::from)
        .collect();

    let is_favorite = favorites.ok().flatten().is_some_and(|favorites| {
        favorites.iter().any(|p| p.id == id)
    });

    Ok(ProductShowTemplate {
        layout: Layout::load(&session, nonce, product.name.clone()).await,
        product: ProductDetail::from(&product),
        reviews,
        review_total,
        related,
        signed_in: user.is_some(),
        is_favorite,
        next: format!("/products/{id}"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> ListingParams {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        let uri = format!("/products?{query}").parse().unwrap();
        Query::<ListingParams>::try_from_uri(&uri).unwrap().0
    }

    #[test]
    fn test_blank_filters_are_ignored() {
        let params = params(&[("q", "  "), ("category", ""), ("sort", ""), ("min_price", "")]);
        let query = params.to_query(12);
        assert!(query.q.is_none());
        assert!(query.category_id.is_none());
        assert!(query.sort.is_none());
        assert!(query.min_price.is_none());
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 12);
    }

    #[test]
    fn test_filters_are_parsed() {
        let params = params(&[
            ("q", "tea"),
            ("category", "3"),
            ("sort", "price_asc"),
            ("min_price", "500.000"),
            ("max_price", "100000"),
            ("page", "2"),
        ]);
        let query = params.to_query(12);
        assert_eq!(query.q.as_deref(), Some("tea"));
        assert_eq!(query.category_id, Some(CategoryId::new(3)));
        assert_eq!(query.sort, Some(ProductSort::PriceAsc));
        // Reversed range is swapped
        assert_eq!(query.min_price, Some(100_000));
        assert_eq!(query.max_price, Some(500_000));
        assert_eq!(query.page, 2);
    }

    #[test]
    fn test_unknown_sort_falls_back() {
        let params = params(&[("sort", "cheapest")]);
        assert!(params.sort().is_none());
        let options = sort_options(params.sort());
        assert!(options[0].selected);
        assert_eq!(options.iter().filter(|o| o.selected).count(), 1);
    }

    #[test]
    fn test_link_params_drop_page() {
        let params = params(&[("q", "mug"), ("page", "4")]);
        let links = params.link_params();
        assert!(links.iter().all(|(key, _)| *key != "page"));
        assert_eq!(links[0], ("q", "mug".to_string()));
    }
}
