//! Authentication, profile and favorites.

use reqwest::Method;
use tracing::instrument;

use marketline_core::ProductId;

use super::types::{
    AuthResponse, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, Product,
    RegisterRequest, ResetPasswordRequest, UpdateProfileRequest, User,
};
use super::{AccessToken, ApiClient, ApiError};

impl ApiClient {
    /// Exchange credentials for a token.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` or `ApiError::Validation` for bad
    /// credentials, or an error if the API request fails.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: &LoginRequest<'_>) -> Result<AuthResponse, ApiError> {
        self.send_json(Method::POST, "/auth/login", request, None)
            .await
    }

    /// Create an account and sign it in.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` if the backend rejects the data (for
    /// example a duplicate email), or an error if the API request fails.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: &RegisterRequest<'_>) -> Result<AuthResponse, ApiError> {
        self.send_json(Method::POST, "/auth/register", request, None)
            .await
    }

    /// Fetch the account behind a token.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` if the token is no longer valid.
    #[instrument(skip_all)]
    pub async fn me(&self, token: &AccessToken) -> Result<User, ApiError> {
        self.get("/auth/me", Some(token)).await
    }

    /// Update name, phone and address.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the update.
    #[instrument(skip_all)]
    pub async fn update_profile(
        &self,
        token: &AccessToken,
        request: &UpdateProfileRequest<'_>,
    ) -> Result<User, ApiError> {
        self.send_json(Method::PUT, "/users/me", request, Some(token))
            .await
    }

    /// Change the account password.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` if the current password is wrong.
    #[instrument(skip_all)]
    pub async fn change_password(
        &self,
        token: &AccessToken,
        request: &ChangePasswordRequest<'_>,
    ) -> Result<(), ApiError> {
        self.execute_empty(
            self.request(Method::POST, "/auth/change-password", Some(token))
                .json(request),
        )
        .await
    }

    /// Ask the backend to mail a one-time reset code.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` or `ApiError::Validation` when the email
    /// is not registered, or an error if the API request fails.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn forgot_password(
        &self,
        request: &ForgotPasswordRequest<'_>,
    ) -> Result<(), ApiError> {
        self.execute_empty(
            self.request(Method::POST, "/auth/forgot-password", None)
                .json(request),
        )
        .await
    }

    /// Set a new password using the mailed code.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` when the code is wrong or expired, or
    /// an error if the API request fails.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn reset_password(&self, request: &ResetPasswordRequest<'_>) -> Result<(), ApiError> {
        self.execute_empty(
            self.request(Method::POST, "/auth/reset-password", None)
                .json(request),
        )
        .await
    }

    // =========================================================================
    // Favorites
    // =========================================================================

    /// Products the customer marked as favorite.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip_all)]
    pub async fn list_favorites(&self, token: &AccessToken) -> Result<Vec<Product>, ApiError> {
        self.get("/favorites", Some(token)).await
    }

    /// Mark a product as favorite.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn add_favorite(
        &self,
        token: &AccessToken,
        product_id: ProductId,
    ) -> Result<(), ApiError> {
        self.send_empty(Method::POST, &format!("/favorites/{product_id}"), Some(token))
            .await
    }

    /// Remove a product from the favorites.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn remove_favorite(
        &self,
        token: &AccessToken,
        product_id: ProductId,
    ) -> Result<(), ApiError> {
        self.send_empty(
            Method::DELETE,
            &format!("/favorites/{product_id}"),
            Some(token),
        )
        .await
    }
}
