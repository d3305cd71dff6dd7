//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tower_sessions::Session;
use tracing::instrument;

use crate::api::{ApiError, Category, Page, Product, ProductQuery, ProductSort};
use crate::filters;
use crate::middleware::CspNonce;
use crate::state::AppState;
use crate::views::{Layout, ProductCard};

/// Products per home page shelf.
const SHELF_SIZE: u32 = 8;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub layout: Layout,
    pub newest: Vec<ProductCard>,
    pub best_selling: Vec<ProductCard>,
    pub categories: Vec<Category>,
}

/// Display the home page.
///
/// Each shelf degrades to empty on its own when the backend fails.
#[instrument(skip(state, session, nonce))]
pub async fn home(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
) -> impl IntoResponse {
    let api = state.api();

    let newest_query = ProductQuery {
        sort: Some(ProductSort::Newest),
        ..ProductQuery::new(SHELF_SIZE)
    };
    let best_query = ProductQuery {
        sort: Some(ProductSort::BestSelling),
        ..ProductQuery::new(SHELF_SIZE)
    };

    let (newest, best_selling, categories) = tokio::join!(
        api.list_products(&newest_query),
        api.list_products(&best_query),
        api.list_categories(),
    );

    let newest = shelf(newest, "newest");
    let best_selling = shelf(best_selling, "best_selling");
    let categories = categories.unwrap_or_else(|e| {
        tracing::warn!("Failed to load categories: {e}");
        Vec::new()
    });

    HomeTemplate {
        layout: Layout::load(&session, nonce, "Marketline").await,
        newest,
        best_selling,
        categories,
    }
}

fn shelf(result: Result<Page<Product>, ApiError>, name: &str) -> Vec<ProductCard> {
    match result {
        Ok(page) => page.items.iter().map(ProductCard::from).collect(),
        Err(e) => {
            tracing::warn!(shelf = name, "Failed to load home shelf: {e}");
            Vec::new()
        }
    }
}
