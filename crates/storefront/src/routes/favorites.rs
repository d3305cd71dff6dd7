//! Favorite products.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use marketline_core::ProductId;

use crate::api::ApiError;
use crate::error::Result;
use crate::filters;
use crate::middleware::{CspNonce, RequireAuth};
use crate::services::flash;
use crate::state::AppState;
use crate::views::{Layout, ProductCard, safe_next};

/// Favorites page template.
#[derive(Template, WebTemplate)]
#[template(path = "favorites/index.html")]
pub struct FavoritesTemplate {
    pub layout: Layout,
    pub products: Vec<ProductCard>,
}

/// Form carrying the page to return to.
#[derive(Debug, Deserialize)]
pub struct FavoriteForm {
    pub next: Option<String>,
}

/// Display the customer's favorites.
#[instrument(skip(state, session, nonce, user), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse> {
    let products = state.api().list_favorites(&user.token).await?;

    Ok(FavoritesTemplate {
        layout: Layout::load(&session, nonce, "Favorites").await,
        products: products.iter().map(ProductCard::from).collect(),
    })
}

/// Mark a product as favorite.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ProductId>,
    Form(form): Form<FavoriteForm>,
) -> Result<Redirect> {
    match state.api().add_favorite(&user.token, id).await {
        Ok(()) => flash::success(&session, "Added to your favorites.").await,
        Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized.into()),
        Err(e) => {
            tracing::warn!(product_id = %id, "Failed to add favorite: {e}");
            flash::error(&session, e.user_message()).await;
        }
    }

    let default = format!("/products/{id}");
    Ok(Redirect::to(safe_next(form.next.as_deref(), &default)))
}

/// Remove a product from the favorites.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ProductId>,
    Form(form): Form<FavoriteForm>,
) -> Result<Redirect> {
    match state.api().remove_favorite(&user.token, id).await {
        Ok(()) => flash::info(&session, "Removed from your favorites.").await,
        Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized.into()),
        Err(e) => {
            tracing::warn!(product_id = %id, "Failed to remove favorite: {e}");
            flash::error(&session, e.user_message()).await;
        }
    }

    Ok(Redirect::to(safe_next(form.next.as_deref(), "/favorites")))
}
