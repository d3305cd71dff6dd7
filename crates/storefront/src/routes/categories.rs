//! Category route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use tower_sessions::Session;
use tracing::instrument;

use marketline_core::CategoryId;

use crate::api::Category;
use crate::error::Result;
use crate::filters;
use crate::middleware::CspNonce;
use crate::routes::products::{ListingParams, SortOption, sort_options};
use crate::state::AppState;
use crate::views::{Layout, PageLinks, ProductCard};

/// Category index template.
#[derive(Template, WebTemplate)]
#[template(path = "categories/index.html")]
pub struct CategoriesIndexTemplate {
    pub layout: Layout,
    pub categories: Vec<Category>,
    pub error: Option<String>,
}

/// Category detail template.
#[derive(Template, WebTemplate)]
#[template(path = "categories/show.html")]
pub struct CategoryShowTemplate {
    pub layout: Layout,
    pub category: Category,
    pub products: Vec<ProductCard>,
    pub total: u64,
    pub sort_options: Vec<SortOption>,
    pub links: PageLinks,
    pub error: Option<String>,
}

/// Display all categories.
#[instrument(skip(state, session, nonce))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
) -> impl IntoResponse {
    let (categories, error) = match state.api().list_categories().await {
        Ok(categories) => (categories, None),
        Err(e) => {
            tracing::error!("Failed to load categories: {e}");
            (Vec::new(), Some(e.user_message()))
        }
    };

    CategoriesIndexTemplate {
        layout: Layout::load(&session, nonce, "Categories").await,
        categories,
        error,
    }
}

/// Display the products of one category.
///
/// Only sorting and paging apply here; the category comes from the path.
#[instrument(skip(state, session, nonce))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    Path(id): Path<CategoryId>,
    Query(params): Query<ListingParams>,
) -> Result<impl IntoResponse> {
    let category = state.api().get_category(id).await?;

    let params = ListingParams {
        sort: params.sort,
        page: params.page,
        ..ListingParams::default()
    };
    let mut query = params.to_query(state.config().products_per_page);
    query.category_id = Some(id);

    let (page, error) = match state.api().list_products(&query).await {
        Ok(page) => (page, None),
        Err(e) => {
            tracing::error!("Failed to load category products: {e}");
            (crate::api::Page::empty(query.limit), Some(e.user_message()))
        }
    };

    let path = format!("/categories/{id}");
    let links = PageLinks::new(
        &page.pagination(),
        &path,
        &[(
            "sort",
            params.sort().map(|s| s.as_str().to_string()).unwrap_or_default(),
        )],
    );

    Ok(CategoryShowTemplate {
        layout: Layout::load(&session, nonce, category.name.clone()).await,
        products: page.items.iter().map(ProductCard::from).collect(),
        total: page.total,
        sort_options: sort_options(params.sort()),
        links,
        error,
        category,
    })
}
