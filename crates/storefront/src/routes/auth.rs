//! Authentication route handlers.
//!
//! Credentials go straight to the backend; on success its bearer token is
//! kept in the session next to the user identity (the auth store).
//! Forgotten passwords are reset with a six-digit code the backend mails
//! out; the address it went to is remembered in the session between the
//! two steps.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;
use validator::{Validate, ValidationError};

use marketline_core::Email;

use crate::api::{
    AccessToken, ApiError, AuthResponse, ForgotPasswordRequest, LoginRequest, RegisterRequest,
    ResetPasswordRequest,
};
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{CspNonce, OptionalAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, session_keys};
use crate::services::flash;
use crate::state::AppState;
use crate::views::{Layout, non_empty, safe_next, validation_messages};

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub next: Option<String>,
}

/// Registration form data.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct RegisterForm {
    #[validate(length(min = 1, max = 100, message = "Enter your full name"))]
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 20, message = "Phone number is too long"))]
    pub phone: String,
    #[validate(length(min = 8, max = 128, message = "Passwords must be 8 to 128 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub password_confirm: String,
    pub next: Option<String>,
}

/// Forgot password form data.
#[derive(Debug, Default, Deserialize)]
pub struct ForgotPasswordForm {
    pub email: String,
}

/// Reset password form data.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ResetPasswordForm {
    #[validate(custom(function = "validate_otp", message = "Enter the 6-digit code from the email"))]
    pub otp: String,
    #[validate(length(min = 8, max = 128, message = "Passwords must be 8 to 128 characters"))]
    pub new_password: String,
    #[validate(must_match(other = "new_password", message = "Passwords do not match"))]
    pub new_password_confirm: String,
}

fn validate_otp(otp: &str) -> std::result::Result<(), ValidationError> {
    if otp.len() == 6 && otp.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("otp"))
    }
}

/// Query parameters for the auth pages.
#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
    pub email: String,
    pub next: String,
    pub errors: Vec<String>,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub layout: Layout,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub next: String,
    pub errors: Vec<String>,
}

/// Forgot password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/forgot_password.html")]
pub struct ForgotPasswordTemplate {
    pub layout: Layout,
    pub email: String,
    pub errors: Vec<String>,
}

/// Reset password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/reset_password.html")]
pub struct ResetPasswordTemplate {
    pub layout: Layout,
    pub email: String,
    pub errors: Vec<String>,
}

// =============================================================================
// Helpers
// =============================================================================

/// Put the authenticated account in the session.
async fn sign_in(session: &Session, auth: AuthResponse) -> Result<CurrentUser> {
    let user = CurrentUser::new(&auth.user, AccessToken::new(auth.token));
    set_current_user(session, &user).await?;
    set_sentry_user(&user.id, Some(&user.email));
    tracing::info!(user_id = %user.id, "Customer signed in");
    Ok(user)
}

fn next_or_home(next: Option<&str>) -> String {
    safe_next(next, "/").to_string()
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
#[instrument(skip(session, nonce, user))]
pub async fn login_page(
    session: Session,
    nonce: CspNonce,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<NextQuery>,
) -> Response {
    let next = next_or_home(query.next.as_deref());
    if user.is_some() {
        return Redirect::to(&next).into_response();
    }

    LoginTemplate {
        layout: Layout::load(&session, nonce, "Sign in").await,
        email: String::new(),
        next,
        errors: Vec::new(),
    }
    .into_response()
}

/// Handle login form submission.
#[instrument(skip(state, session, nonce, form), fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let next = next_or_home(form.next.as_deref());

    let mut errors = Vec::new();
    let email = match Email::parse(&form.email) {
        Ok(email) => Some(email),
        Err(e) => {
            errors.push(format!("Email: {e}"));
            None
        }
    };
    if form.password.is_empty() {
        errors.push("Enter your password".to_string());
    }

    if let Some(email) = email.filter(|_| errors.is_empty()) {
        let request = LoginRequest {
            email: email.as_str(),
            password: &form.password,
        };
        match state.api().login(&request).await {
            Ok(auth) => {
                let user = sign_in(&session, auth).await?;
                flash::success(&session, format!("Welcome back, {}!", user.first_name())).await;
                return Ok(Redirect::to(&next).into_response());
            }
            Err(ApiError::Unauthorized) => {
                tracing::info!("Login rejected");
                errors.push("Incorrect email or password".to_string());
            }
            Err(e) => {
                tracing::warn!("Login failed: {e}");
                errors.push(e.user_message());
            }
        }
    }

    Ok(LoginTemplate {
        layout: Layout::load(&session, nonce, "Sign in").await,
        email: form.email,
        next,
        errors,
    }
    .into_response())
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
#[instrument(skip(session, nonce, user))]
pub async fn register_page(
    session: Session,
    nonce: CspNonce,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<NextQuery>,
) -> Response {
    let next = next_or_home(query.next.as_deref());
    if user.is_some() {
        return Redirect::to(&next).into_response();
    }

    RegisterTemplate {
        layout: Layout::load(&session, nonce, "Create account").await,
        full_name: String::new(),
        email: String::new(),
        phone: String::new(),
        next,
        errors: Vec::new(),
    }
    .into_response()
}

/// Handle registration form submission.
#[instrument(skip(state, session, nonce, form), fields(email = %form.email))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    let next = next_or_home(form.next.as_deref());

    let mut errors = form
        .validate()
        .err()
        .map(|e| validation_messages(&e))
        .unwrap_or_default();
    let email = match Email::parse(&form.email) {
        Ok(email) => Some(email),
        Err(e) => {
            errors.push(format!("Email: {e}"));
            None
        }
    };

    if let Some(email) = email.filter(|_| errors.is_empty()) {
        let request = RegisterRequest {
            email: email.as_str(),
            password: &form.password,
            full_name: form.full_name.trim(),
            phone: non_empty(&form.phone),
        };
        match state.api().register(&request).await {
            Ok(auth) => {
                let user = sign_in(&session, auth).await?;
                flash::success(
                    &session,
                    format!("Welcome to Marketline, {}!", user.first_name()),
                )
                .await;
                return Ok(Redirect::to(&next).into_response());
            }
            Err(e) => {
                tracing::warn!("Registration failed: {e}");
                errors.push(e.user_message());
            }
        }
    }

    Ok(RegisterTemplate {
        layout: Layout::load(&session, nonce, "Create account").await,
        full_name: form.full_name,
        email: form.email,
        phone: form.phone,
        next,
        errors,
    }
    .into_response())
}

// =============================================================================
// Password Reset Routes
// =============================================================================

/// Display the forgot password page.
#[instrument(skip(session, nonce))]
pub async fn forgot_password_page(session: Session, nonce: CspNonce) -> Response {
    ForgotPasswordTemplate {
        layout: Layout::load(&session, nonce, "Forgot password").await,
        email: String::new(),
        errors: Vec::new(),
    }
    .into_response()
}

/// Ask the backend to mail a reset code, then move on to the reset form.
#[instrument(skip(state, session, nonce, form), fields(email = %form.email))]
pub async fn forgot_password(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    Form(form): Form<ForgotPasswordForm>,
) -> Result<Response> {
    let mut errors = Vec::new();
    match Email::parse(&form.email) {
        Ok(email) => {
            let request = ForgotPasswordRequest {
                email: email.as_str(),
            };
            match state.api().forgot_password(&request).await {
                Ok(()) => {
                    session
                        .insert(session_keys::PASSWORD_RESET_EMAIL, email.as_str())
                        .await?;
                    tracing::info!("Password reset code requested");
                    flash::info(
                        &session,
                        format!("We sent a 6-digit code to {}.", email.as_str()),
                    )
                    .await;
                    return Ok(Redirect::to("/auth/reset-password").into_response());
                }
                Err(ApiError::NotFound(_)) => {
                    errors.push("No account uses that email".to_string());
                }
                Err(e) => {
                    tracing::warn!("Password reset request failed: {e}");
                    errors.push(e.user_message());
                }
            }
        }
        Err(e) => errors.push(format!("Email: {e}")),
    }

    Ok(ForgotPasswordTemplate {
        layout: Layout::load(&session, nonce, "Forgot password").await,
        email: form.email,
        errors,
    }
    .into_response())
}

async fn reset_email(session: &Session) -> Option<String> {
    session
        .get::<String>(session_keys::PASSWORD_RESET_EMAIL)
        .await
        .ok()
        .flatten()
}

/// Display the reset password page.
#[instrument(skip(session, nonce))]
pub async fn reset_password_page(session: Session, nonce: CspNonce) -> Response {
    let Some(email) = reset_email(&session).await else {
        flash::info(&session, "Enter your email to get a reset code first.").await;
        return Redirect::to("/auth/forgot-password").into_response();
    };

    ResetPasswordTemplate {
        layout: Layout::load(&session, nonce, "Reset password").await,
        email,
        errors: Vec::new(),
    }
    .into_response()
}

/// Set a new password with the mailed code.
#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    Form(form): Form<ResetPasswordForm>,
) -> Result<Response> {
    let Some(email) = reset_email(&session).await else {
        flash::info(&session, "Enter your email to get a reset code first.").await;
        return Ok(Redirect::to("/auth/forgot-password").into_response());
    };

    let mut errors = form
        .validate()
        .err()
        .map(|e| validation_messages(&e))
        .unwrap_or_default();

    if errors.is_empty() {
        let request = ResetPasswordRequest {
            email: &email,
            otp: &form.otp,
            new_password: &form.new_password,
        };
        match state.api().reset_password(&request).await {
            Ok(()) => {
                session
                    .remove::<String>(session_keys::PASSWORD_RESET_EMAIL)
                    .await?;
                tracing::info!("Password reset");
                flash::success(&session, "Your password was reset, please sign in.").await;
                return Ok(Redirect::to("/auth/login").into_response());
            }
            Err(e) => {
                tracing::warn!("Password reset failed: {e}");
                errors.push(e.user_message());
            }
        }
    }

    Ok(ResetPasswordTemplate {
        layout: Layout::load(&session, nonce, "Reset password").await,
        email,
        errors,
    }
    .into_response())
}

// =============================================================================
// Logout
// =============================================================================

/// Sign out. The cart stays in the session.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Redirect> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    flash::info(&session, "You have been signed out.").await;
    Ok(Redirect::to("/"))
}
