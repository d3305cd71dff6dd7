//! Review moderation route handlers.

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

use marketline_core::ReviewId;

use crate::api::{ApiError, ProductQuery, Review, ReviewQuery};
use crate::error::{Result, render};
use crate::filters;
use crate::middleware::RequireAdminAuth;
use crate::routes::{recover, return_path};
use crate::services::flash;
use crate::state::AppState;
use crate::views::{AdminLayout, FilterOption, PageLinks, format_datetime, page_or_first, page_url};

/// Products offered in the product filter.
const PRODUCT_FILTER_LIMIT: u32 = 100;

/// Listing filters.
#[derive(Debug, Default, Deserialize)]
pub struct ReviewListQuery {
    pub product_id: Option<String>,
    /// `visible`, `hidden`, or empty for both.
    pub visibility: Option<String>,
    pub page: Option<u32>,
}

impl ReviewListQuery {
    fn is_visible(&self) -> Option<bool> {
        match self.visibility.as_deref() {
            Some("visible") => Some(true),
            Some("hidden") => Some(false),
            _ => None,
        }
    }
}

/// Visibility toggle form.
#[derive(Debug, Deserialize)]
pub struct VisibilityForm {
    pub visible: bool,
    pub return_to: Option<String>,
}

/// Delete form data.
#[derive(Debug, Deserialize)]
pub struct DeleteForm {
    pub return_to: Option<String>,
}

/// Review row for the listing.
#[derive(Debug, Clone)]
pub struct ReviewRow {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub author: String,
    pub rating: u8,
    pub stars: String,
    pub comment: String,
    pub is_visible: bool,
    pub created_at: String,
}

impl From<&Review> for ReviewRow {
    fn from(review: &Review) -> Self {
        Self {
            id: review.id.to_string(),
            product_id: review.product_id.to_string(),
            product_name: review
                .product_name
                .clone()
                .unwrap_or_else(|| format!("Product #{}", review.product_id)),
            author: review.user.full_name.clone(),
            rating: review.rating.value(),
            stars: {
                let (filled, empty) = review.rating.stars();
                format!(
                    "{}{}",
                    "★".repeat(usize::from(filled)),
                    "☆".repeat(usize::from(empty))
                )
            },
            comment: review.comment.clone().unwrap_or_default(),
            is_visible: review.is_visible,
            created_at: format_datetime(&review.created_at),
        }
    }
}

/// Reviews list page template.
#[derive(Template)]
#[template(path = "reviews/index.html")]
pub struct ReviewsIndexTemplate {
    pub layout: AdminLayout,
    pub reviews: Vec<ReviewRow>,
    pub products: Vec<FilterOption>,
    pub visibility: Vec<FilterOption>,
    pub pages: Option<PageLinks>,
    pub return_to: String,
    pub load_error: Option<String>,
}

/// Build the reviews router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reviews", get(index))
        .route("/reviews/{id}/visibility", post(set_visibility))
        .route("/reviews/{id}/delete", post(delete))
}

/// Reviews list page handler.
///
/// GET /reviews
#[instrument(skip(admin, state, session), fields(admin_id = %admin.id))]
pub async fn index(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ReviewListQuery>,
) -> Result<Html<String>> {
    let product_filter = query.product_id.clone().unwrap_or_default();
    let visibility_filter = match query.is_visible() {
        Some(true) => "visible",
        Some(false) => "hidden",
        None => "",
    };

    let review_query = ReviewQuery {
        page: page_or_first(query.page),
        limit: state.config().page_size,
        product_id: product_filter.trim().parse().ok(),
        is_visible: query.is_visible(),
    };

    let product_query = ProductQuery::new(PRODUCT_FILTER_LIMIT);
    let (reviews, products) = tokio::join!(
        state.api().list_reviews(&admin.token, &review_query),
        state.api().list_products(&admin.token, &product_query),
    );
    let (reviews, load_error) = recover(reviews, "reviews")?;
    let (products, _) = recover(products, "products")?;

    let params = [
        ("product_id", product_filter.clone()),
        ("visibility", visibility_filter.to_string()),
    ];

    let template = ReviewsIndexTemplate {
        layout: AdminLayout::load(&session, &admin, "/reviews", "Reviews").await,
        pages: reviews
            .as_ref()
            .map(|page| PageLinks::new(&page.pagination(), "/reviews", &params)),
        reviews: reviews
            .map(|page| page.items.iter().map(ReviewRow::from).collect())
            .unwrap_or_default(),
        products: products
            .map(|page| {
                page.items
                    .iter()
                    .map(|p| FilterOption::new(p.id.to_string(), p.name.clone(), &product_filter))
                    .collect()
            })
            .unwrap_or_default(),
        visibility: vec![
            FilterOption::new("visible", "Visible", visibility_filter),
            FilterOption::new("hidden", "Hidden", visibility_filter),
        ],
        return_to: page_url("/reviews", &params, review_query.page),
        load_error,
    };

    render(&template)
}

/// Show or hide a review.
///
/// POST /reviews/{id}/visibility
#[instrument(skip(admin, state, session, form), fields(admin_id = %admin.id, visible = form.visible))]
pub async fn set_visibility(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ReviewId>,
    Form(form): Form<VisibilityForm>,
) -> Result<Redirect> {
    match state
        .api()
        .set_review_visibility(&admin.token, id, form.visible)
        .await
    {
        Ok(review) => {
            tracing::info!(review_id = %id, "Review visibility changed");
            let message = if review.is_visible {
                "Review is now visible on the storefront."
            } else {
                "Review is now hidden from the storefront."
            };
            flash::success(&session, message).await;
        }
        Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized.into()),
        Err(e) => {
            tracing::warn!(review_id = %id, "Review visibility change rejected: {e}");
            flash::error(&session, e.user_message()).await;
        }
    }

    Ok(Redirect::to(&return_path(
        form.return_to.as_deref(),
        "/reviews",
    )))
}

/// Delete a review.
///
/// POST /reviews/{id}/delete
#[instrument(skip(admin, state, session, form), fields(admin_id = %admin.id))]
pub async fn delete(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ReviewId>,
    Form(form): Form<DeleteForm>,
) -> Result<Redirect> {
    match state.api().delete_review(&admin.token, id).await {
        Ok(()) => {
            tracing::info!(review_id = %id, "Review deleted");
            flash::success(&session, "Review deleted.").await;
        }
        Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized.into()),
        Err(e) => {
            tracing::warn!(review_id = %id, "Review delete rejected: {e}");
            flash::error(&session, e.user_message()).await;
        }
    }

    Ok(Redirect::to(&return_path(
        form.return_to.as_deref(),
        "/reviews",
    )))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{StatusCode, header};
    use axum::response::IntoResponse;
    use axum::routing::{get as stub_get, patch as stub_patch};

    use super::*;
    use crate::api::tests::stub_backend;
    use crate::state::tests::{test_admin, test_session, test_state};

    fn review_json(visible: bool) -> serde_json::Value {
        serde_json::json!({
            "id": 5,
            "product_id": 12,
            "product_name": "Ceramic mug",
            "user": { "id": 8, "full_name": "Tran Thi Lan" },
            "rating": 4,
            "comment": "Sturdy and pretty",
            "is_visible": visible,
            "created_at": "2026-04-02T09:30:00Z"
        })
    }

    #[test]
    fn test_visibility_filter() {
        let query = ReviewListQuery {
            visibility: Some("hidden".to_string()),
            ..ReviewListQuery::default()
        };
        assert_eq!(query.is_visible(), Some(false));
        assert_eq!(ReviewListQuery::default().is_visible(), None);
    }

    #[tokio::test]
    async fn test_hide_returns_to_filtered_list() {
        let backend = Router::new().route(
            "/api/admin/reviews/{id}",
            stub_patch(|axum::Json(body): axum::Json<serde_json::Value>| async move {
                axum::Json(review_json(body["is_visible"].as_bool().unwrap()))
            }),
        );
        let state = test_state(stub_backend(backend).await);
        let session = test_session();

        let redirect = set_visibility(
            RequireAdminAuth(test_admin()),
            State(state),
            session.clone(),
            Path(ReviewId::new(5)),
            Form(VisibilityForm {
                visible: false,
                return_to: Some("/reviews?product_id=12".to_string()),
            }),
        )
        .await
        .unwrap()
        .into_response();

        assert_eq!(redirect.status(), StatusCode::SEE_OTHER);
        assert_eq!(redirect.headers()[header::LOCATION], "/reviews?product_id=12");
        let notices = flash::take(&session).await;
        assert_eq!(notices[0].message, "Review is now hidden from the storefront.");
    }

    #[tokio::test]
    async fn test_listing_renders_rows_and_filters() {
        let backend = Router::new()
            .route(
                "/api/admin/reviews",
                stub_get(|| async {
                    axum::Json(serde_json::json!({
                        "items": [review_json(false)],
                        "page": 1,
                        "limit": 20,
                        "total": 1
                    }))
                }),
            )
            .route(
                "/api/products",
                stub_get(|| async {
                    axum::Json(serde_json::json!({
                        "items": [{ "id": 12, "name": "Ceramic mug", "price": 120000 }],
                        "page": 1,
                        "limit": 100,
                        "total": 1
                    }))
                }),
            );
        let state = test_state(stub_backend(backend).await);

        let Html(html) = index(
            RequireAdminAuth(test_admin()),
            State(state),
            test_session(),
            Query(ReviewListQuery {
                product_id: Some("12".to_string()),
                visibility: Some("hidden".to_string()),
                page: None,
            }),
        )
        .await
        .unwrap();

        assert!(html.contains("Tran Thi Lan"));
        assert!(html.contains("Sturdy and pretty"));
        assert!(html.contains("<option value=\"12\" selected>"));
    }
}
