//! Session-related types for admin authentication.

use serde::{Deserialize, Serialize};

use marketline_core::UserId;

use crate::api::{AccessToken, User};

/// Session-stored staff identity.
///
/// Only accounts whose backend role is `admin` ever get one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentAdmin {
    /// Backend user ID.
    pub id: UserId,
    /// Email address used to sign in.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Bearer token forwarded on every backend call.
    pub token: AccessToken,
}

impl CurrentAdmin {
    /// Build the session identity for an administrator account.
    ///
    /// Returns `None` for any other role.
    #[must_use]
    pub fn from_account(user: &User, token: AccessToken) -> Option<Self> {
        user.role.is_admin().then(|| Self {
            id: user.id,
            email: user.email.clone(),
            name: user.full_name.clone(),
            token,
        })
    }
}

/// Session keys for admin data.
pub mod keys {
    /// Key for storing the current logged-in admin.
    pub const CURRENT_ADMIN: &str = "current_admin";

    /// Key for queued toast messages.
    pub const FLASH: &str = "flash";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use marketline_core::UserRole;

    use super::*;

    fn account(role: UserRole) -> User {
        User {
            id: UserId::new(3),
            email: "staff@example.vn".to_string(),
            full_name: "Vo Minh Chau".to_string(),
            role,
        }
    }

    #[test]
    fn test_only_admin_accounts_get_an_identity() {
        let admin = CurrentAdmin::from_account(&account(UserRole::Admin), AccessToken::new("t"))
            .unwrap();
        assert_eq!(admin.id, UserId::new(3));
        assert_eq!(admin.name, "Vo Minh Chau");

        assert!(
            CurrentAdmin::from_account(&account(UserRole::Customer), AccessToken::new("t"))
                .is_none()
        );
    }
}
