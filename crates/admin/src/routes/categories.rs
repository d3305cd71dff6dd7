//! Category route handlers.

use askama::Template;
use axum::{
    Form, Router,
    extract::{Path, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;
use validator::Validate;

use marketline_core::CategoryId;

use crate::api::{ApiError, Category, CategoryRequest};
use crate::error::{Result, render};
use crate::filters;
use crate::middleware::RequireAdminAuth;
use crate::models::CurrentAdmin;
use crate::routes::recover;
use crate::services::flash;
use crate::state::AppState;
use crate::views::{AdminLayout, non_empty, validation_messages};

/// Category form data.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CategoryForm {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 1000, message = "Description is too long"))]
    pub description: String,
    #[serde(default)]
    #[validate(url(message = "Image must be a full URL"))]
    pub image: Option<String>,
}

impl From<&Category> for CategoryForm {
    fn from(category: &Category) -> Self {
        Self {
            name: category.name.clone(),
            description: category.description.clone().unwrap_or_default(),
            image: category.image.clone(),
        }
    }
}

impl CategoryForm {
    fn to_request(&self) -> CategoryRequest {
        CategoryRequest {
            name: self.name.trim().to_string(),
            description: non_empty(&self.description),
            image: self.image.as_deref().and_then(non_empty),
        }
    }
}

/// Visibility toggle form.
#[derive(Debug, Deserialize)]
pub struct VisibilityForm {
    pub visible: bool,
}

/// Category row for the listing.
#[derive(Debug, Clone)]
pub struct CategoryRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub image: Option<String>,
    pub product_count: u32,
    pub is_visible: bool,
}

impl From<&Category> for CategoryRow {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id.to_string(),
            name: category.name.clone(),
            description: category.description.clone().unwrap_or_default(),
            image: category.image.clone(),
            product_count: category.product_count,
            is_visible: category.is_visible,
        }
    }
}

/// Categories list page template.
#[derive(Template)]
#[template(path = "categories/index.html")]
pub struct CategoriesIndexTemplate {
    pub layout: AdminLayout,
    pub categories: Vec<CategoryRow>,
    pub load_error: Option<String>,
}

/// New and edit category form template.
#[derive(Template)]
#[template(path = "categories/form.html")]
pub struct CategoryFormTemplate {
    pub layout: AdminLayout,
    pub form: CategoryForm,
    pub errors: Vec<String>,
    pub action: String,
    pub is_new: bool,
}

async fn form_page(
    session: &Session,
    admin: &CurrentAdmin,
    id: Option<CategoryId>,
    form: CategoryForm,
    errors: Vec<String>,
) -> Result<Html<String>> {
    let template = match id {
        Some(id) => CategoryFormTemplate {
            layout: AdminLayout::load(
                session,
                admin,
                &format!("/categories/{id}/edit"),
                "Edit category",
            )
            .await,
            form,
            errors,
            action: format!("/categories/{id}"),
            is_new: false,
        },
        None => CategoryFormTemplate {
            layout: AdminLayout::load(session, admin, "/categories/new", "New category").await,
            form,
            errors,
            action: "/categories".to_string(),
            is_new: true,
        },
    };
    render(&template)
}

/// Build the categories router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(index).post(create))
        .route("/categories/new", get(new))
        .route("/categories/{id}/edit", get(edit))
        .route("/categories/{id}", post(update))
        .route("/categories/{id}/visibility", post(set_visibility))
        .route("/categories/{id}/delete", post(delete))
}

/// Categories list page handler.
///
/// GET /categories
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn index(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
) -> Result<Html<String>> {
    let (categories, load_error) = recover(
        state.api().list_categories(&admin.token).await,
        "categories",
    )?;

    let template = CategoriesIndexTemplate {
        layout: AdminLayout::load(&session, &admin, "/categories", "Categories").await,
        categories: categories
            .unwrap_or_default()
            .iter()
            .map(CategoryRow::from)
            .collect(),
        load_error,
    };

    render(&template)
}

/// New category form.
///
/// GET /categories/new
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn new(
    RequireAdminAuth(admin): RequireAdminAuth,
    session: Session,
) -> Result<Html<String>> {
    form_page(&session, &admin, None, CategoryForm::default(), Vec::new()).await
}

/// Edit category form.
///
/// GET /categories/{id}/edit
#[instrument(skip(admin, state, session), fields(admin_id = %admin.id))]
pub async fn edit(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<CategoryId>,
) -> Result<Html<String>> {
    let category = state.api().get_category(&admin.token, id).await?;
    form_page(&session, &admin, Some(id), CategoryForm::from(&category), Vec::new()).await
}

async fn submit(
    state: &AppState,
    session: &Session,
    admin: &CurrentAdmin,
    id: Option<CategoryId>,
    form: CategoryForm,
) -> Result<Response> {
    let errors = match form.validate() {
        Ok(()) => {
            let request = form.to_request();
            let saved = match id {
                Some(id) => state.api().update_category(&admin.token, id, &request).await,
                None => state.api().create_category(&admin.token, &request).await,
            };
            match saved {
                Ok(category) => {
                    tracing::info!(category_id = %category.id, "Category saved");
                    flash::success(session, format!("Category \"{}\" saved.", category.name)).await;
                    return Ok(Redirect::to("/categories").into_response());
                }
                Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized.into()),
                Err(e) => {
                    tracing::warn!("Category save rejected: {e}");
                    vec![e.user_message()]
                }
            }
        }
        Err(errors) => validation_messages(&errors),
    };

    Ok(form_page(session, admin, id, form, errors)
        .await?
        .into_response())
}

/// Create a category.
///
/// POST /categories
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CategoryForm>,
) -> Result<Response> {
    submit(&state, &session, &admin, None, normalize(form)).await
}

/// Update a category.
///
/// POST /categories/{id}
#[instrument(skip(admin, state, session, form), fields(admin_id = %admin.id))]
pub async fn update(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<CategoryId>,
    Form(form): Form<CategoryForm>,
) -> Result<Response> {
    submit(&state, &session, &admin, Some(id), normalize(form)).await
}

/// Blank image input means no image, not an invalid URL.
fn normalize(form: CategoryForm) -> CategoryForm {
    CategoryForm {
        image: form.image.as_deref().and_then(non_empty),
        ..form
    }
}

/// Show or hide a category on the storefront.
///
/// POST /categories/{id}/visibility
#[instrument(skip(admin, state, session, form), fields(admin_id = %admin.id, visible = form.visible))]
pub async fn set_visibility(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<CategoryId>,
    Form(form): Form<VisibilityForm>,
) -> Result<Redirect> {
    match state
        .api()
        .set_category_visibility(&admin.token, id, form.visible)
        .await
    {
        Ok(category) => {
            tracing::info!(category_id = %id, "Category visibility changed");
            let message = if category.is_visible {
                format!("Category \"{}\" is now shown on the storefront.", category.name)
            } else {
                format!("Category \"{}\" is now hidden from the storefront.", category.name)
            };
            flash::success(&session, message).await;
        }
        Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized.into()),
        Err(e) => {
            tracing::warn!(category_id = %id, "Category visibility change rejected: {e}");
            flash::error(&session, e.user_message()).await;
        }
    }
    Ok(Redirect::to("/categories"))
}

/// Delete a category.
///
/// The backend refuses while products still use it; that is reported as a
/// notice on the listing.
///
/// POST /categories/{id}/delete
#[instrument(skip(admin, state, session), fields(admin_id = %admin.id))]
pub async fn delete(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<CategoryId>,
) -> Result<Redirect> {
    match state.api().delete_category(&admin.token, id).await {
        Ok(()) => {
            tracing::info!(category_id = %id, "Category deleted");
            flash::success(&session, "Category deleted.").await;
        }
        Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized.into()),
        Err(e) => {
            tracing::warn!(category_id = %id, "Category delete rejected: {e}");
            flash::error(&session, e.user_message()).await;
        }
    }
    Ok(Redirect::to("/categories"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{StatusCode, header};
    use axum::routing::{delete as stub_delete, patch as stub_patch};

    use super::*;
    use crate::api::tests::stub_backend;
    use crate::services::flash::FlashKind;
    use crate::state::tests::{test_admin, test_session, test_state};

    #[test]
    fn test_form_rules() {
        let form = CategoryForm {
            name: "Kitchen".to_string(),
            ..CategoryForm::default()
        };
        assert!(form.validate().is_ok());

        let form = CategoryForm {
            name: "x".repeat(101),
            ..CategoryForm::default()
        };
        assert_eq!(
            validation_messages(&form.validate().unwrap_err()),
            vec!["Name must be 1 to 100 characters".to_string()]
        );

        let form = normalize(CategoryForm {
            name: "Kitchen".to_string(),
            description: String::new(),
            image: Some("  ".to_string()),
        });
        assert!(form.validate().is_ok());
        assert!(form.to_request().image.is_none());
    }

    #[tokio::test]
    async fn test_delete_conflict_becomes_notice() {
        let backend = Router::new().route(
            "/api/admin/categories/{id}",
            stub_delete(|| async {
                (
                    StatusCode::CONFLICT,
                    axum::Json(serde_json::json!({ "message": "Category still has products" })),
                )
            }),
        );
        let state = test_state(stub_backend(backend).await);
        let session = test_session();

        let redirect = delete(
            RequireAdminAuth(test_admin()),
            State(state),
            session.clone(),
            Path(CategoryId::new(2)),
        )
        .await
        .unwrap()
        .into_response();

        assert_eq!(redirect.headers()[header::LOCATION], "/categories");
        let notices = flash::take(&session).await;
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, FlashKind::Error);
        assert_eq!(notices[0].message, "Category still has products");
    }

    #[tokio::test]
    async fn test_hide_category() {
        let backend = Router::new().route(
            "/api/admin/categories/{id}",
            stub_patch(
                |Path(id): Path<i64>, axum::Json(body): axum::Json<serde_json::Value>| async move {
                    axum::Json(serde_json::json!({
                        "id": id,
                        "name": "Seasonal",
                        "is_visible": body["is_visible"]
                    }))
                },
            ),
        );
        let state = test_state(stub_backend(backend).await);
        let session = test_session();

        let redirect = set_visibility(
            RequireAdminAuth(test_admin()),
            State(state),
            session.clone(),
            Path(CategoryId::new(3)),
            Form(VisibilityForm { visible: false }),
        )
        .await
        .unwrap()
        .into_response();

        assert_eq!(redirect.status(), StatusCode::SEE_OTHER);
        assert_eq!(redirect.headers()[header::LOCATION], "/categories");
        let notices = flash::take(&session).await;
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, FlashKind::Success);
        assert_eq!(
            notices[0].message,
            "Category \"Seasonal\" is now hidden from the storefront."
        );
    }

    #[tokio::test]
    async fn test_visibility_missing_category_becomes_notice() {
        let backend = Router::new().route(
            "/api/admin/categories/{id}",
            stub_patch(|| async {
                (
                    StatusCode::NOT_FOUND,
                    axum::Json(serde_json::json!({ "message": "Category not found" })),
                )
            }),
        );
        let state = test_state(stub_backend(backend).await);
        let session = test_session();

        let redirect = set_visibility(
            RequireAdminAuth(test_admin()),
            State(state),
            session.clone(),
            Path(CategoryId::new(99)),
            Form(VisibilityForm { visible: true }),
        )
        .await
        .unwrap()
        .into_response();

        assert_eq!(redirect.headers()[header::LOCATION], "/categories");
        let notices = flash::take(&session).await;
        assert_eq!(notices[0].kind, FlashKind::Error);
    }
}
