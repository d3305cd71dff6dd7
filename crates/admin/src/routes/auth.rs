//! Authentication route handlers for admin.
//!
//! Staff sign in with their backend account. Only accounts whose backend
//! role is `admin` are let in; their bearer token is kept in the session
//! and forwarded on every backend call.

use askama::Template;
use axum::{
    Form, Router,
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use marketline_core::Email;

use crate::api::{AccessToken, ApiError, LoginRequest};
use crate::error::{Result, clear_sentry_user, render, set_sentry_user};
use crate::filters;
use crate::middleware::{
    OptionalAdminAuth, clear_current_admin, login_rate_limiter, set_current_admin,
};
use crate::models::CurrentAdmin;
use crate::services::flash::{self, Flash};
use crate::state::AppState;

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Login page template.
#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub email: String,
    pub errors: Vec<String>,
    pub flashes: Vec<Flash>,
}

/// Build the auth router.
pub fn router() -> Router<AppState> {
    let limited = Router::new()
        .route("/auth/login", post(login))
        .layer(login_rate_limiter());

    Router::new()
        .route("/auth/login", get(login_page))
        .route("/auth/logout", post(logout))
        .merge(limited)
}

/// Render the login page.
///
/// GET /auth/login
pub async fn login_page(
    OptionalAdminAuth(admin): OptionalAdminAuth,
    session: Session,
) -> Result<Response> {
    if admin.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    let template = LoginTemplate {
        email: String::new(),
        errors: Vec::new(),
        flashes: flash::take(&session).await,
    };
    Ok(render(&template)?.into_response())
}

/// Check credentials with the backend and admit administrators only.
///
/// POST /auth/login
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let mut errors = Vec::new();

    match Email::parse(&form.email) {
        Ok(_) if form.password.is_empty() => errors.push("Enter your password".to_string()),
        Ok(email) => {
            let request = LoginRequest {
                email: email.as_str(),
                password: &form.password,
            };
            match state.api().login(&request).await {
                Ok(auth) => {
                    let token = AccessToken::new(auth.token);
                    if let Some(admin) = CurrentAdmin::from_account(&auth.user, token) {
                        set_current_admin(&session, &admin).await?;
                        set_sentry_user(&admin.id, Some(&admin.email));
                        tracing::info!(admin_id = %admin.id, "Admin signed in");
                        flash::success(&session, format!("Welcome back, {}.", admin.name)).await;
                        return Ok(Redirect::to("/").into_response());
                    }
                    tracing::warn!(user_id = %auth.user.id, "Non-admin account tried to sign in");
                    errors.push("This account does not have administrator access.".to_string());
                }
                Err(ApiError::Unauthorized) => {
                    errors.push("Incorrect email or password".to_string());
                }
                Err(e) => {
                    tracing::warn!("Admin login failed: {e}");
                    errors.push(e.user_message());
                }
            }
        }
        Err(e) => errors.push(format!("Email: {e}")),
    }

    let template = LoginTemplate {
        email: form.email,
        errors,
        flashes: Vec::new(),
    };
    Ok(render(&template)?.into_response())
}

/// Logout and clear session.
///
/// POST /auth/logout
pub async fn logout(session: Session) -> Result<Redirect> {
    clear_current_admin(&session).await?;
    clear_sentry_user();
    flash::success(&session, "You have been signed out.").await;
    Ok(Redirect::to("/auth/login"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use axum::http::{StatusCode, header};
    use axum::routing::post as stub_post;

    use super::*;
    use crate::api::tests::stub_backend;
    use crate::models::session_keys;
    use crate::state::tests::{test_admin, test_session, test_state};

    async fn state_with_role(role: &'static str) -> AppState {
        let backend = Router::new().route(
            "/api/auth/login",
            stub_post(move || async move {
                axum::Json(serde_json::json!({
                    "token": "tok",
                    "user": { "id": 4, "email": "chau@example.vn", "full_name": "Chau", "role": role }
                }))
            }),
        );
        test_state(stub_backend(backend).await)
    }

    fn form() -> Form<LoginForm> {
        Form(LoginForm {
            email: "chau@example.vn".to_string(),
            password: "secret".to_string(),
        })
    }

    #[tokio::test]
    async fn test_admin_login_redirects_to_dashboard() {
        let session = test_session();
        let response = login(State(state_with_role("admin").await), session.clone(), form())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");
        let admin: Option<CurrentAdmin> = session.get(session_keys::CURRENT_ADMIN).await.unwrap();
        assert_eq!(admin.unwrap().token.expose(), "tok");
    }

    #[tokio::test]
    async fn test_customer_login_is_rejected() {
        let session = test_session();
        let response = login(State(state_with_role("customer").await), session.clone(), form())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("does not have administrator access"));
        let admin: Option<CurrentAdmin> = session.get(session_keys::CURRENT_ADMIN).await.unwrap();
        assert!(admin.is_none());
    }

    #[tokio::test]
    async fn test_invalid_email_skips_backend() {
        let response = login(
            State(state_with_role("admin").await),
            test_session(),
            Form(LoginForm {
                email: "not-an-email".to_string(),
                password: "secret".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8(body.to_vec()).unwrap().contains("Email:"));
    }

    #[tokio::test]
    async fn test_logout_clears_identity() {
        let session = test_session();
        set_current_admin(&session, &test_admin()).await.unwrap();

        let redirect = logout(session.clone()).await.unwrap().into_response();
        assert_eq!(redirect.headers()[header::LOCATION], "/auth/login");
        let remaining: Option<CurrentAdmin> =
            session.get(session_keys::CURRENT_ADMIN).await.unwrap();
        assert!(remaining.is_none());
    }
}
