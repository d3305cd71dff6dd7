//! Flash messages (toasts).
//!
//! Handlers queue a message before redirecting; the next rendered page takes
//! the queue and shows each message once.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::models::session_keys;

/// Toast severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashKind {
    Success,
    Error,
    Info,
}

impl FlashKind {
    /// CSS classes for the toast.
    #[must_use]
    pub const fn css_class(&self) -> &'static str {
        match self {
            Self::Success => "toast toast-success",
            Self::Error => "toast toast-error",
            Self::Info => "toast toast-info",
        }
    }
}

/// A queued toast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

/// Queue a toast for the next page.
///
/// Session failures are logged and otherwise ignored; a lost toast is not
/// worth failing the request over.
pub async fn push(session: &Session, kind: FlashKind, message: impl Into<String>) {
    let mut queue: Vec<Flash> = session
        .get(session_keys::FLASH)
        .await
        .ok()
        .flatten()
        .unwrap_or_default();
    queue.push(Flash {
        kind,
        message: message.into(),
    });

    if let Err(e) = session.insert(session_keys::FLASH, queue).await {
        tracing::warn!("Failed to queue flash message: {e}");
    }
}

/// Queue a success toast.
pub async fn success(session: &Session, message: impl Into<String>) {
    push(session, FlashKind::Success, message).await;
}

/// Queue an error toast.
pub async fn error(session: &Session, message: impl Into<String>) {
    push(session, FlashKind::Error, message).await;
}

/// Queue an informational toast.
pub async fn info(session: &Session, message: impl Into<String>) {
    push(session, FlashKind::Info, message).await;
}

/// Take every queued toast, leaving the queue empty.
pub async fn take(session: &Session) -> Vec<Flash> {
    match session.remove::<Vec<Flash>>(session_keys::FLASH).await {
        Ok(queue) => queue.unwrap_or_default(),
        Err(e) => {
            tracing::warn!("Failed to read flash messages: {e}");
            Vec::new()
        }
    }
}
