//! Product and category management.

use reqwest::Method;
use tracing::instrument;

use marketline_core::{CategoryId, ProductId};

use super::types::{
    Category, CategoryRequest, CategoryVisibilityRequest, Page, Product, ProductQuery,
    ProductRequest,
};
use super::{AccessToken, ApiClient, ApiError};

impl ApiClient {
    // =========================================================================
    // Product Methods
    // =========================================================================

    /// List products.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token), fields(page = query.page, q = ?query.q))]
    pub async fn list_products(
        &self,
        token: &AccessToken,
        query: &ProductQuery,
    ) -> Result<Page<Product>, ApiError> {
        self.get_with_query("/products", query, Some(token)).await
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the product does not exist.
    #[instrument(skip(self, token), fields(product_id = %id))]
    pub async fn get_product(&self, token: &AccessToken, id: ProductId) -> Result<Product, ApiError> {
        self.get(&format!("/products/{id}"), Some(token)).await
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` if the backend rejects the product.
    #[instrument(skip(self, token, request), fields(name = %request.name))]
    pub async fn create_product(
        &self,
        token: &AccessToken,
        request: &ProductRequest,
    ) -> Result<Product, ApiError> {
        self.send_json(Method::POST, "/admin/products", request, token)
            .await
    }

    /// Replace a product's editable fields.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` if the backend rejects the product.
    #[instrument(skip(self, token, request), fields(product_id = %id))]
    pub async fn update_product(
        &self,
        token: &AccessToken,
        id: ProductId,
        request: &ProductRequest,
    ) -> Result<Product, ApiError> {
        self.send_json(Method::PUT, &format!("/admin/products/{id}"), request, token)
            .await
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` if the backend refuses (for example
    /// when orders reference it).
    #[instrument(skip(self, token), fields(product_id = %id))]
    pub async fn delete_product(&self, token: &AccessToken, id: ProductId) -> Result<(), ApiError> {
        self.send_empty(Method::DELETE, &format!("/admin/products/{id}"), token)
            .await
    }

    // =========================================================================
    // Category Methods
    // =========================================================================

    /// List all categories, hidden ones included.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip_all)]
    pub async fn list_categories(&self, token: &AccessToken) -> Result<Vec<Category>, ApiError> {
        self.get("/admin/categories", Some(token)).await
    }

    /// Get a category by ID.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the category does not exist.
    #[instrument(skip(self, token), fields(category_id = %id))]
    pub async fn get_category(
        &self,
        token: &AccessToken,
        id: CategoryId,
    ) -> Result<Category, ApiError> {
        self.get(&format!("/categories/{id}"), Some(token)).await
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` if the backend rejects the category.
    #[instrument(skip(self, token, request), fields(name = %request.name))]
    pub async fn create_category(
        &self,
        token: &AccessToken,
        request: &CategoryRequest,
    ) -> Result<Category, ApiError> {
        self.send_json(Method::POST, "/admin/categories", request, token)
            .await
    }

    /// Update a category.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` if the backend rejects the category.
    #[instrument(skip(self, token, request), fields(category_id = %id))]
    pub async fn update_category(
        &self,
        token: &AccessToken,
        id: CategoryId,
        request: &CategoryRequest,
    ) -> Result<Category, ApiError> {
        self.send_json(Method::PUT, &format!("/admin/categories/{id}"), request, token)
            .await
    }

    /// Show or hide a category on the storefront.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the category no longer exists.
    #[instrument(skip(self, token), fields(category_id = %id))]
    pub async fn set_category_visibility(
        &self,
        token: &AccessToken,
        id: CategoryId,
        is_visible: bool,
    ) -> Result<Category, ApiError> {
        self.send_json(
            Method::PATCH,
            &format!("/admin/categories/{id}"),
            &CategoryVisibilityRequest { is_visible },
            token,
        )
        .await
    }

    /// Delete a category.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` if the backend refuses (for example
    /// while products still belong to it).
    #[instrument(skip(self, token), fields(category_id = %id))]
    pub async fn delete_category(
        &self,
        token: &AccessToken,
        id: CategoryId,
    ) -> Result<(), ApiError> {
        self.send_empty(Method::DELETE, &format!("/admin/categories/{id}"), token)
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::Router;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, patch, put};
    use serde_json::{Value, json};

    use super::super::tests::{has_token, stub_backend};
    use super::*;

    fn token() -> AccessToken {
        AccessToken::new("staff")
    }

    #[tokio::test]
    async fn test_update_product_puts_json() {
        let router = Router::new().route(
            "/api/admin/products/{id}",
            put(
                |Path(id): Path<i64>, headers: HeaderMap, axum::Json(body): axum::Json<Value>| async move {
                    assert!(has_token(&headers, "staff"));
                    axum::Json(json!({
                        "id": id,
                        "name": body["name"],
                        "price": body["price"],
                        "stock": body["stock"],
                        "is_active": body["is_active"]
                    }))
                },
            )
            .delete(|| async { StatusCode::NO_CONTENT }),
        );
        let client = stub_backend(router).await;

        let request = ProductRequest {
            name: "Tea set".to_string(),
            description: None,
            price: 400_000,
            sale_price: None,
            stock: 3,
            category_id: CategoryId::new(1),
            images: vec![],
            is_active: false,
        };
        let product = client
            .update_product(&token(), ProductId::new(8), &request)
            .await
            .unwrap();
        assert_eq!(product.id, ProductId::new(8));
        assert_eq!(product.name, "Tea set");
        assert!(!product.is_active);

        client.delete_product(&token(), ProductId::new(8)).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_category_conflict_is_validation() {
        let router = Router::new().route(
            "/api/admin/categories/{id}",
            axum::routing::delete(|| async {
                (
                    StatusCode::CONFLICT,
                    axum::Json(json!({ "message": "Category still has products" })),
                )
                    .into_response()
            }),
        );
        let client = stub_backend(router).await;

        let err = client
            .delete_category(&token(), CategoryId::new(4))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref m) if m == "Category still has products"));
    }

    #[tokio::test]
    async fn test_list_categories_accepts_envelope() {
        let router = Router::new().route(
            "/api/admin/categories",
            get(|| async {
                axum::Json(json!({ "data": [
                    { "id": 1, "name": "Kitchen", "product_count": 4 },
                    { "id": 2, "name": "Seasonal", "is_visible": false }
                ] }))
            }),
        );
        let client = stub_backend(router).await;

        let categories = client.list_categories(&token()).await.unwrap();
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].product_count, 4);
        assert!(categories[0].is_visible);
        assert!(!categories[1].is_visible);
    }

    #[tokio::test]
    async fn test_set_category_visibility_patches_flag() {
        let router = Router::new().route(
            "/api/admin/categories/{id}",
            patch(
                |Path(id): Path<i64>, headers: HeaderMap, axum::Json(body): axum::Json<Value>| async move {
                    assert!(has_token(&headers, "staff"));
                    assert_eq!(body, json!({ "is_visible": false }));
                    axum::Json(json!({ "id": id, "name": "Seasonal", "is_visible": false }))
                },
            ),
        );
        let client = stub_backend(router).await;

        let category = client
            .set_category_visibility(&token(), CategoryId::new(2), false)
            .await
            .unwrap();
        assert_eq!(category.id, CategoryId::new(2));
        assert!(!category.is_visible);
    }
}
