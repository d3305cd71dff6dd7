//! Product route handlers.
//!
//! Create and update forms are posted as `multipart/form-data` so an image
//! can ride along with the fields. An attached image is uploaded to the
//! backend first and its URL appended to the product's image list.

use askama::Template;
use axum::{
    Form, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;
use validator::{Validate, ValidationError};

use marketline_core::{CategoryId, ProductId};

use crate::api::{ApiError, Category, Product, ProductQuery, ProductRequest};
use crate::error::{AppError, Result, render};
use crate::filters;
use crate::middleware::RequireAdminAuth;
use crate::models::CurrentAdmin;
use crate::routes::{recover, return_path};
use crate::services::flash;
use crate::state::AppState;
use crate::views::{
    AdminLayout, FilterOption, PageLinks, non_empty, page_or_first, page_url, validation_messages,
};

/// Largest accepted form body, image included.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Stock at or below this is flagged in the listing.
const LOW_STOCK: u32 = 5;

// =============================================================================
// Query and Form Types
// =============================================================================

/// Listing filters.
#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub q: Option<String>,
    /// Kept as text so an empty "All categories" choice parses.
    pub category_id: Option<String>,
    pub page: Option<u32>,
}

/// Product form as typed, kept verbatim for redisplay.
#[derive(Debug, Clone, Default)]
pub struct ProductForm {
    pub name: String,
    pub description: String,
    pub price: String,
    pub sale_price: String,
    pub stock: String,
    pub category_id: String,
    /// One image URL per line.
    pub images: String,
    pub is_active: bool,
}

impl From<&Product> for ProductForm {
    fn from(product: &Product) -> Self {
        let dong = |price: &marketline_core::Vnd| {
            price
                .to_dong()
                .map_or_else(|| price.to_string(), |d| d.to_string())
        };
        Self {
            name: product.name.clone(),
            description: product.description.clone().unwrap_or_default(),
            price: dong(&product.price),
            sale_price: product.sale_price.as_ref().map(dong).unwrap_or_default(),
            stock: product.stock.to_string(),
            category_id: product
                .category
                .as_ref()
                .map(|c| c.id.to_string())
                .unwrap_or_default(),
            images: product.images.join("\n"),
            is_active: product.is_active,
        }
    }
}

/// Parsed product fields, checked before anything is sent.
#[derive(Debug, Validate)]
#[validate(schema(function = "validate_sale_price"))]
pub struct ProductInput {
    #[validate(length(min = 1, max = 200, message = "Name must be 1 to 200 characters"))]
    pub name: String,
    #[validate(range(min = 1, message = "Price must be above zero"))]
    pub price: i64,
    pub sale_price: Option<i64>,
    #[validate(range(max = 1_000_000, message = "Stock is too large"))]
    pub stock: u32,
    #[validate(required(message = "Choose a category"))]
    pub category_id: Option<CategoryId>,
}

fn validate_sale_price(input: &ProductInput) -> std::result::Result<(), ValidationError> {
    match input.sale_price {
        Some(sale) if sale <= 0 || sale >= input.price => Err(ValidationError::new("sale_price")
            .with_message("Sale price must be below the price".into())),
        _ => Ok(()),
    }
}

/// Parse a đồng amount as staff type it: `120000`, `120.000` or `120,000 ₫`.
///
/// Blank input is `Ok(None)`.
fn parse_dong(input: &str) -> std::result::Result<Option<i64>, ()> {
    let digits: String = input
        .trim()
        .trim_end_matches('₫')
        .trim_end_matches('đ')
        .chars()
        .filter(|c| !matches!(c, '.' | ',' | ' '))
        .collect();

    if digits.is_empty() {
        return Ok(None);
    }
    digits.parse::<i64>().map(Some).map_err(|_| ())
}

/// Image URLs from the textarea, blank lines dropped.
fn image_lines(images: &str) -> Vec<String> {
    images
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

impl ProductForm {
    /// Parse and validate into a backend request.
    ///
    /// Returns every problem found, parse errors first.
    pub fn to_request(&self) -> std::result::Result<ProductRequest, Vec<String>> {
        let mut errors = Vec::new();

        let price = match parse_dong(&self.price) {
            Ok(Some(price)) => price,
            Ok(None) => {
                errors.push("Enter a price".to_string());
                0
            }
            Err(()) => {
                errors.push("Price must be a whole number of đồng".to_string());
                0
            }
        };
        let sale_price = parse_dong(&self.sale_price).unwrap_or_else(|()| {
            errors.push("Sale price must be a whole number of đồng".to_string());
            None
        });
        let stock = match self.stock.trim() {
            "" => 0,
            raw => raw.parse::<u32>().unwrap_or_else(|_| {
                errors.push("Stock must be a whole number of zero or more".to_string());
                0
            }),
        };

        let input = ProductInput {
            name: self.name.trim().to_string(),
            price,
            sale_price,
            stock,
            category_id: self.category_id.trim().parse().ok(),
        };
        if let Err(validation) = input.validate() {
            // Price problems already reported above
            let skip_price = !errors.is_empty() && price == 0;
            errors.extend(
                validation_messages(&validation)
                    .into_iter()
                    .filter(|m| !(skip_price && m.starts_with("Price"))),
            );
        }

        match (errors.is_empty(), input.category_id) {
            (true, Some(category_id)) => Ok(ProductRequest {
                name: input.name,
                description: non_empty(&self.description),
                price: input.price,
                sale_price: input.sale_price,
                stock: input.stock,
                category_id,
                images: image_lines(&self.images),
                is_active: self.is_active,
            }),
            _ => Err(errors),
        }
    }
}

/// An image attached to the form.
#[derive(Debug)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Delete form data.
#[derive(Debug, Deserialize)]
pub struct DeleteForm {
    pub return_to: Option<String>,
}

/// Read the multipart product form.
///
/// An empty file input is ignored; a file that is not an image is an error
/// message rather than a failure.
async fn read_form(
    mut multipart: Multipart,
) -> Result<(ProductForm, Option<ImageUpload>, Vec<String>)> {
    let bad_request = |e: axum::extract::multipart::MultipartError| {
        AppError::BadRequest(format!("Invalid form data: {e}"))
    };

    let mut form = ProductForm::default();
    let mut upload = None;
    let mut errors = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "image_file" {
            let file_name = field.file_name().unwrap_or("image").to_string();
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(bad_request)?;
            if bytes.is_empty() {
                continue;
            }
            if content_type.starts_with("image/") {
                upload = Some(ImageUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            } else {
                errors.push("Only image files can be uploaded".to_string());
            }
            continue;
        }

        let value = field.text().await.map_err(bad_request)?;
        match name.as_str() {
            "name" => form.name = value,
            "description" => form.description = value,
            "price" => form.price = value,
            "sale_price" => form.sale_price = value,
            "stock" => form.stock = value,
            "category_id" => form.category_id = value,
            "images" => form.images = value,
            "is_active" => form.is_active = true,
            _ => {}
        }
    }

    Ok((form, upload, errors))
}

// =============================================================================
// Views and Templates
// =============================================================================

/// Product row for the listing.
#[derive(Debug, Clone)]
pub struct ProductRow {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    pub category: String,
    pub price: String,
    pub sale_price: Option<String>,
    pub discount: Option<u8>,
    pub stock: u32,
    pub low_stock: bool,
    pub sold: u32,
    pub is_active: bool,
    pub storefront_url: Option<String>,
}

impl ProductRow {
    fn new(product: &Product, state: &AppState) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            image: product.primary_image().map(String::from),
            category: product
                .category
                .as_ref()
                .map_or_else(|| "-".to_string(), |c| c.name.clone()),
            price: product.price.to_string(),
            sale_price: product.sale_price.as_ref().map(ToString::to_string),
            discount: product.discount_percent(),
            stock: product.stock,
            low_stock: product.stock <= LOW_STOCK,
            sold: product.sold,
            is_active: product.is_active,
            storefront_url: state.config().storefront_product_url(product.id),
        }
    }
}

/// Products list page template.
#[derive(Template)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub layout: AdminLayout,
    pub products: Vec<ProductRow>,
    pub categories: Vec<FilterOption>,
    pub search_query: String,
    pub pages: Option<PageLinks>,
    pub return_to: String,
    pub load_error: Option<String>,
}

/// New and edit product form template.
#[derive(Template)]
#[template(path = "products/form.html")]
pub struct ProductFormTemplate {
    pub layout: AdminLayout,
    pub form: ProductForm,
    pub categories: Vec<FilterOption>,
    pub errors: Vec<String>,
    pub action: String,
    pub product_id: Option<String>,
}

fn category_options(categories: &[Category], current: &str) -> Vec<FilterOption> {
    categories
        .iter()
        .map(|c| FilterOption::new(c.id.to_string(), c.name.clone(), current))
        .collect()
}

async fn form_page(
    state: &AppState,
    session: &Session,
    admin: &CurrentAdmin,
    product_id: Option<ProductId>,
    form: ProductForm,
    errors: Vec<String>,
) -> Result<Html<String>> {
    let (categories, category_error) =
        recover(state.api().list_categories(&admin.token).await, "categories")?;
    let categories = categories.unwrap_or_default();

    let (path, title, action) = match product_id {
        Some(id) => (
            format!("/products/{id}/edit"),
            "Edit product",
            format!("/products/{id}"),
        ),
        None => (
            "/products/new".to_string(),
            "New product",
            "/products".to_string(),
        ),
    };

    let template = ProductFormTemplate {
        layout: AdminLayout::load(session, admin, &path, title).await,
        categories: category_options(&categories, &form.category_id),
        form,
        errors: errors.into_iter().chain(category_error).collect(),
        action,
        product_id: product_id.map(|id| id.to_string()),
    };
    render(&template)
}

// =============================================================================
// Route Handlers
// =============================================================================

/// Build the products router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(index).post(create))
        .route("/products/new", get(new))
        .route("/products/{id}/edit", get(edit))
        .route("/products/{id}", post(update))
        .route("/products/{id}/delete", post(delete))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

/// Products list page handler.
///
/// GET /products
#[instrument(skip(admin, state, session), fields(admin_id = %admin.id))]
pub async fn index(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ProductListQuery>,
) -> Result<Html<String>> {
    let search_query = query.q.as_deref().and_then(non_empty).unwrap_or_default();
    let category_filter = query.category_id.clone().unwrap_or_default();

    let mut product_query = ProductQuery::new(state.config().page_size);
    product_query.page = page_or_first(query.page);
    product_query.q = non_empty(&search_query);
    product_query.category_id = category_filter.trim().parse().ok();

    let (products, categories) = tokio::join!(
        state.api().list_products(&admin.token, &product_query),
        state.api().list_categories(&admin.token),
    );
    let (products, load_error) = recover(products, "products")?;
    let (categories, _) = recover(categories, "categories")?;

    let params = [
        ("q", search_query.clone()),
        ("category_id", category_filter.clone()),
    ];
    let pages = products
        .as_ref()
        .map(|page| PageLinks::new(&page.pagination(), "/products", &params));
    let return_to = page_url("/products", &params, product_query.page);

    let template = ProductsIndexTemplate {
        layout: AdminLayout::load(&session, &admin, "/products", "Products").await,
        products: products
            .map(|page| page.items.iter().map(|p| ProductRow::new(p, &state)).collect())
            .unwrap_or_default(),
        categories: category_options(&categories.unwrap_or_default(), &category_filter),
        search_query,
        pages,
        return_to,
        load_error,
    };

    render(&template)
}

/// New product form.
///
/// GET /products/new
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn new(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
) -> Result<Html<String>> {
    let form = ProductForm {
        is_active: true,
        ..ProductForm::default()
    };
    form_page(&state, &session, &admin, None, form, Vec::new()).await
}

/// Edit product form.
///
/// GET /products/{id}/edit
#[instrument(skip(admin, state, session), fields(admin_id = %admin.id))]
pub async fn edit(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ProductId>,
) -> Result<Html<String>> {
    let product = state.api().get_product(&admin.token, id).await?;
    form_page(&state, &session, &admin, Some(id), ProductForm::from(&product), Vec::new()).await
}

/// Upload the attached image, if any, and send the product.
async fn save(
    state: &AppState,
    admin: &CurrentAdmin,
    id: Option<ProductId>,
    mut request: ProductRequest,
    upload: Option<ImageUpload>,
) -> std::result::Result<Product, ApiError> {
    if let Some(upload) = upload {
        let url = state
            .api()
            .upload_image(
                &admin.token,
                &upload.file_name,
                &upload.content_type,
                upload.bytes,
            )
            .await?;
        request.images.push(url);
    }

    match id {
        Some(id) => state.api().update_product(&admin.token, id, &request).await,
        None => state.api().create_product(&admin.token, &request).await,
    }
}

async fn submit(
    state: AppState,
    session: Session,
    admin: CurrentAdmin,
    id: Option<ProductId>,
    multipart: Multipart,
) -> Result<Response> {
    let (form, upload, mut errors) = read_form(multipart).await?;

    let request = match form.to_request() {
        Ok(request) if errors.is_empty() => Some(request),
        Ok(_) => None,
        Err(problems) => {
            errors.extend(problems);
            None
        }
    };

    if let Some(request) = request {
        match save(&state, &admin, id, request, upload).await {
            Ok(product) => {
                tracing::info!(product_id = %product.id, "Product saved");
                let verb = if id.is_some() { "updated" } else { "created" };
                flash::success(&session, format!("Product \"{}\" {verb}.", product.name)).await;
                return Ok(Redirect::to("/products").into_response());
            }
            Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized.into()),
            Err(e) => {
                tracing::warn!("Product save rejected: {e}");
                errors.push(e.user_message());
            }
        }
    }

    Ok(form_page(&state, &session, &admin, id, form, errors)
        .await?
        .into_response())
}

/// Create a product.
///
/// POST /products
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    multipart: Multipart,
) -> Result<Response> {
    submit(state, session, admin, None, multipart).await
}

/// Update a product.
///
/// POST /products/{id}
#[instrument(skip(admin, state, session, multipart), fields(admin_id = %admin.id))]
pub async fn update(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ProductId>,
    multipart: Multipart,
) -> Result<Response> {
    submit(state, session, admin, Some(id), multipart).await
}

/// Delete a product.
///
/// POST /products/{id}/delete
#[instrument(skip(admin, state, session, form), fields(admin_id = %admin.id))]
pub async fn delete(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ProductId>,
    Form(form): Form<DeleteForm>,
) -> Result<Redirect> {
    match state.api().delete_product(&admin.token, id).await {
        Ok(()) => {
            tracing::info!(product_id = %id, "Product deleted");
            flash::success(&session, "Product deleted.").await;
        }
        Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized.into()),
        Err(e) => {
            tracing::warn!(product_id = %id, "Product delete rejected: {e}");
            flash::error(&session, e.user_message()).await;
        }
    }

    Ok(Redirect::to(&return_path(
        form.return_to.as_deref(),
        "/products",
    )))
}
