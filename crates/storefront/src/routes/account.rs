//! Account route handlers (profile and password).

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;
use validator::Validate;

use crate::api::{ApiError, ChangePasswordRequest, UpdateProfileRequest, User};
use crate::error::Result;
use crate::filters;
use crate::middleware::{CspNonce, RequireAuth};
use crate::models::{CurrentUser, session_keys};
use crate::services::flash;
use crate::state::AppState;
use crate::views::{Layout, format_date, non_empty, validation_messages};

// =============================================================================
// Form Types
// =============================================================================

/// Profile form data.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProfileForm {
    #[validate(length(min = 1, max = 100, message = "Enter your full name"))]
    pub full_name: String,
    #[serde(default)]
    #[validate(length(max = 20, message = "Phone number is too long"))]
    pub phone: String,
    #[serde(default)]
    #[validate(length(max = 255, message = "Address is too long"))]
    pub address: String,
}

impl From<&User> for ProfileForm {
    fn from(user: &User) -> Self {
        Self {
            full_name: user.full_name.clone(),
            phone: user.phone.clone().unwrap_or_default(),
            address: user.address.clone().unwrap_or_default(),
        }
    }
}

/// Change password form data.
#[derive(Debug, Deserialize, Validate)]
pub struct PasswordForm {
    #[validate(length(min = 1, message = "Enter your current password"))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128, message = "Passwords must be 8 to 128 characters"))]
    pub new_password: String,
    #[validate(must_match(other = "new_password", message = "Passwords do not match"))]
    pub new_password_confirm: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Account page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/show.html")]
pub struct AccountTemplate {
    pub layout: Layout,
    pub email: String,
    pub member_since: Option<String>,
    pub profile: ProfileForm,
    pub profile_errors: Vec<String>,
    pub password_errors: Vec<String>,
}

async fn render(
    session: &Session,
    nonce: CspNonce,
    user: &User,
    profile: ProfileForm,
    profile_errors: Vec<String>,
    password_errors: Vec<String>,
) -> Response {
    AccountTemplate {
        layout: Layout::load(session, nonce, "My account").await,
        email: user.email.clone(),
        member_since: user.created_at.as_ref().map(format_date),
        profile,
        profile_errors,
        password_errors,
    }
    .into_response()
}

// =============================================================================
// Route Handlers
// =============================================================================

/// Display the account page.
#[instrument(skip(state, session, nonce, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    RequireAuth(user): RequireAuth,
) -> Result<Response> {
    let profile = state.api().me(&user.token).await?;
    let form = ProfileForm::from(&profile);
    Ok(render(&session, nonce, &profile, form, Vec::new(), Vec::new()).await)
}

/// Update name, phone and address.
#[instrument(skip(state, session, nonce, user, form), fields(user_id = %user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    RequireAuth(user): RequireAuth,
    Form(form): Form<ProfileForm>,
) -> Result<Response> {
    let current = state.api().me(&user.token).await?;

    if let Err(errors) = form.validate() {
        let errors = validation_messages(&errors);
        return Ok(render(&session, nonce, &current, form, errors, Vec::new()).await);
    }

    let request = UpdateProfileRequest {
        full_name: form.full_name.trim(),
        phone: non_empty(&form.phone),
        address: non_empty(&form.address),
    };

    match state.api().update_profile(&user.token, &request).await {
        Ok(updated) => {
            // Keep the header greeting in step with the new name
            let refreshed = CurrentUser {
                full_name: updated.full_name.clone(),
                ..user
            };
            session
                .insert(session_keys::CURRENT_USER, &refreshed)
                .await?;
            flash::success(&session, "Your profile has been updated.").await;
            Ok(Redirect::to("/account").into_response())
        }
        Err(ApiError::Unauthorized) => Err(ApiError::Unauthorized.into()),
        Err(e) => {
            tracing::warn!("Profile update rejected: {e}");
            let errors = vec![e.user_message()];
            Ok(render(&session, nonce, &current, form, errors, Vec::new()).await)
        }
    }
}

/// Change the account password.
#[instrument(skip(state, session, nonce, user, form), fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    RequireAuth(user): RequireAuth,
    Form(form): Form<PasswordForm>,
) -> Result<Response> {
    let errors = match form.validate() {
        Ok(()) => {
            let request = ChangePasswordRequest {
                current_password: &form.current_password,
                new_password: &form.new_password,
            };
            match state.api().change_password(&user.token, &request).await {
                Ok(()) => {
                    tracing::info!("Password changed");
                    flash::success(&session, "Your password has been changed.").await;
                    return Ok(Redirect::to("/account").into_response());
                }
                Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized.into()),
                Err(e) => vec![e.user_message()],
            }
        }
        Err(errors) => validation_messages(&errors),
    };

    let current = state.api().me(&user.token).await?;
    let profile = ProfileForm::from(&current);
    Ok(render(&session, nonce, &current, profile, Vec::new(), errors).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_form_requires_name() {
        let form = ProfileForm {
            full_name: String::new(),
            ..ProfileForm::default()
        };
        let messages = validation_messages(&form.validate().unwrap_err());
        assert_eq!(messages, vec!["Enter your full name".to_string()]);
    }

    #[test]
    fn test_password_form_must_match() {
        let form = PasswordForm {
            current_password: "old password".to_string(),
            new_password: "new password".to_string(),
            new_password_confirm: "new passw0rd".to_string(),
        };
        let messages = validation_messages(&form.validate().unwrap_err());
        assert_eq!(messages, vec!["Passwords do not match".to_string()]);
    }
}
