//! Review moderation.

use reqwest::Method;
use tracing::instrument;

use marketline_core::ReviewId;

use super::types::{Page, Review, ReviewQuery, ReviewVisibilityRequest};
use super::{AccessToken, ApiClient, ApiError};

impl ApiClient {
    /// List reviews, hidden ones included.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn list_reviews(
        &self,
        token: &AccessToken,
        query: &ReviewQuery,
    ) -> Result<Page<Review>, ApiError> {
        self.get_with_query("/admin/reviews", query, Some(token))
            .await
    }

    /// Show or hide a review on the storefront.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the review no longer exists.
    #[instrument(skip(self, token), fields(review_id = %id))]
    pub async fn set_review_visibility(
        &self,
        token: &AccessToken,
        id: ReviewId,
        is_visible: bool,
    ) -> Result<Review, ApiError> {
        self.send_json(
            Method::PATCH,
            &format!("/admin/reviews/{id}"),
            &ReviewVisibilityRequest { is_visible },
            token,
        )
        .await
    }

    /// Delete a review.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the review no longer exists.
    #[instrument(skip(self, token), fields(review_id = %id))]
    pub async fn delete_review(&self, token: &AccessToken, id: ReviewId) -> Result<(), ApiError> {
        self.send_empty(Method::DELETE, &format!("/admin/reviews/{id}"), token)
            .await
    }
}
