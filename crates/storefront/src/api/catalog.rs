//! Products, categories and reviews.

use std::collections::HashMap;

use futures::future::join_all;
use reqwest::Method;
use tracing::{debug, instrument};

use marketline_core::{CatalogEntry, CategoryId, ProductId};

use super::cache::{CATEGORIES_KEY, CacheValue, category_key, product_key};
use super::types::{Category, CreateReviewRequest, Page, Product, ProductQuery, Review};
use super::{AccessToken, ApiClient, ApiError};

impl ApiClient {
    // =========================================================================
    // Product Methods
    // =========================================================================

    /// List products. Listings without a search term are cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(page = query.page, q = ?query.q))]
    pub async fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>, ApiError> {
        let cache_key = query.cache_key();

        if let Some(key) = &cache_key
            && let Some(CacheValue::Products(page)) = self.inner.cache.get(key).await
        {
            debug!("Cache hit for product listing");
            return Ok(page);
        }

        let page: Page<Product> = self.get_with_query("/products", query, None).await?;

        if let Some(key) = cache_key {
            self.inner
                .cache
                .insert(key, CacheValue::Products(page.clone()))
                .await;
        }

        Ok(page)
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the product does not exist, or an
    /// error if the API request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, ApiError> {
        let cache_key = product_key(id);

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let product: Product = self.get(&format!("/products/{id}"), None).await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// Drop cached products so the next read sees fresh stock.
    pub async fn invalidate_products(&self, ids: &[ProductId]) {
        for id in ids {
            self.inner.cache.invalidate(&product_key(id)).await;
        }
    }

    /// Resolve cart lines against the backend catalog.
    ///
    /// Products the backend no longer knows are left out of the map so the
    /// cart can drop them. Any other failure aborts, since treating an
    /// outage as "product gone" would empty the cart.
    ///
    /// # Errors
    ///
    /// Returns the first non-404 error from the product lookups.
    #[instrument(skip(self), fields(count = ids.len()))]
    pub async fn cart_catalog(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, CatalogEntry>, ApiError> {
        let results = join_all(ids.iter().map(|&id| async move {
            (id, self.get_product(id).await)
        }))
        .await;

        let mut catalog = HashMap::with_capacity(results.len());
        for (id, result) in results {
            match result {
                Ok(product) => {
                    catalog.insert(id, product.catalog_entry());
                }
                Err(ApiError::NotFound(_)) => {
                    debug!(product_id = %id, "Cart product no longer exists");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(catalog)
    }

    // =========================================================================
    // Category Methods
    // =========================================================================

    /// List all categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        if let Some(CacheValue::Categories(categories)) =
            self.inner.cache.get(CATEGORIES_KEY).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories: Vec<Category> = self.get("/categories", None).await?;

        self.inner
            .cache
            .insert(
                CATEGORIES_KEY.to_string(),
                CacheValue::Categories(categories.clone()),
            )
            .await;

        Ok(categories)
    }

    /// Get a category by ID.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the category does not exist, or an
    /// error if the API request fails.
    #[instrument(skip(self), fields(category_id = %id))]
    pub async fn get_category(&self, id: CategoryId) -> Result<Category, ApiError> {
        let cache_key = category_key(id);

        if let Some(CacheValue::Category(category)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for category");
            return Ok(*category);
        }

        let category: Category = self.get(&format!("/categories/{id}"), None).await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Category(Box::new(category.clone())))
            .await;

        Ok(category)
    }

    // =========================================================================
    // Review Methods
    // =========================================================================

    /// List visible reviews for a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn list_reviews(
        &self,
        product_id: ProductId,
        page: u32,
        limit: u32,
    ) -> Result<Page<Review>, ApiError> {
        self.get_with_query(
            &format!("/products/{product_id}/reviews"),
            &[("page", page), ("limit", limit)],
            None,
        )
        .await
    }

    /// Submit a review as the signed-in customer.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` if the backend rejects the review
    /// (for example when the customer has not bought the product).
    #[instrument(skip(self, token, review), fields(product_id = %product_id))]
    pub async fn create_review(
        &self,
        token: &AccessToken,
        product_id: ProductId,
        review: &CreateReviewRequest,
    ) -> Result<Review, ApiError> {
        let created: Review = self
            .send_json(
                Method::POST,
                &format!("/products/{product_id}/reviews"),
                review,
                Some(token),
            )
            .await?;

        // Rating aggregates live on the product record
        self.inner.cache.invalidate(&product_key(product_id)).await;

        Ok(created)
    }
}
