//! Review submission.

use axum::{
    Form,
    extract::{Path, State},
    response::Redirect,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;
use validator::Validate;

use marketline_core::{ProductId, Rating};

use crate::api::{ApiError, CreateReviewRequest};
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::services::flash;
use crate::state::AppState;
use crate::views::{non_empty, validation_messages};

/// Review form.
#[derive(Debug, Deserialize, Validate)]
pub struct ReviewForm {
    /// Missing when no star was picked.
    #[serde(default)]
    #[validate(range(min = 1, max = 5, message = "Choose a rating from 1 to 5 stars"))]
    pub rating: u8,
    #[serde(default)]
    #[validate(length(max = 1000, message = "Reviews can be at most 1000 characters"))]
    pub comment: String,
}

impl ReviewForm {
    /// Backend request for a validated form.
    fn to_request(&self) -> Option<CreateReviewRequest> {
        Some(CreateReviewRequest {
            rating: Rating::new(self.rating).ok()?,
            comment: non_empty(&self.comment).map(String::from),
        })
    }
}

/// Submit a review for a product.
///
/// The backend decides whether the customer may review (usually only
/// after a delivered order); its message is shown as is.
#[instrument(skip(state, session, user, form), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
    Form(form): Form<ReviewForm>,
) -> Result<Redirect> {
    let back = Redirect::to(&format!("/products/{product_id}#reviews"));

    if let Err(errors) = form.validate() {
        for message in validation_messages(&errors) {
            flash::error(&session, message).await;
        }
        return Ok(back);
    }
    let Some(request) = form.to_request() else {
        flash::error(&session, "Choose a rating from 1 to 5 stars").await;
        return Ok(back);
    };

    match state
        .api()
        .create_review(&user.token, product_id, &request)
        .await
    {
        Ok(_) => {
            tracing::info!(product_id = %product_id, "Review submitted");
            flash::success(&session, "Thank you for your review!").await;
        }
        Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized.into()),
        Err(e) => {
            tracing::warn!(product_id = %product_id, "Review rejected: {e}");
            flash::error(&session, e.user_message()).await;
        }
    }

    Ok(back)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        let form = ReviewForm {
            rating: 0,
            comment: String::new(),
        };
        assert!(form.validate().is_err());

        let form = ReviewForm {
            rating: 5,
            comment: "  Great mug  ".to_string(),
        };
        assert!(form.validate().is_ok());
        let request = form.to_request().unwrap();
        assert_eq!(request.rating.value(), 5);
        assert_eq!(request.comment.as_deref(), Some("Great mug"));
    }

    #[test]
    fn test_comment_length_counts_characters() {
        let form = ReviewForm {
            rating: 4,
            comment: "\u{e9}".repeat(1000),
        };
        assert!(form.validate().is_ok());

        let form = ReviewForm {
            rating: 4,
            comment: "a".repeat(1001),
        };
        let messages = validation_messages(&form.validate().unwrap_err());
        assert_eq!(messages, vec!["Reviews can be at most 1000 characters".to_string()]);
    }
}
