//! Session-related types.
//!
//! The session plays the role of the browser's local storage: it holds the
//! cart, the signed-in identity with its backend token, and pending toasts.

use serde::{Deserialize, Serialize};

use marketline_core::{UserId, UserRole};

use crate::api::{AccessToken, User};

/// Session-stored identity of the signed-in customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Backend user ID.
    pub id: UserId,
    /// Email address used to sign in.
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// Role reported by the backend.
    pub role: UserRole,
    /// Bearer token forwarded on authenticated backend calls.
    pub token: AccessToken,
}

impl CurrentUser {
    /// Build the session identity from a backend account and token.
    #[must_use]
    pub fn new(user: &User, token: AccessToken) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
            token,
        }
    }

    /// Given name for the header greeting (last word of a Vietnamese full name).
    #[must_use]
    pub fn first_name(&self) -> &str {
        self.full_name
            .split_whitespace()
            .last()
            .unwrap_or(self.full_name.as_str())
    }
}

/// Session keys.
pub mod keys {
    /// Key for the signed-in customer.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the cart store.
    pub const CART: &str = "cart";

    /// Key for queued toast messages.
    pub const FLASH: &str = "flash";

    /// Email a password reset code was last sent to.
    pub const PASSWORD_RESET_EMAIL: &str = "password_reset_email";
}
