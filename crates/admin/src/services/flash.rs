//! Flash notices shown above the next rendered admin page.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::models::session_keys;

/// Notice severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashKind {
    Success,
    Error,
}

impl FlashKind {
    /// CSS classes for the notice banner.
    #[must_use]
    pub const fn css_class(&self) -> &'static str {
        match self {
            Self::Success => "notice bg-green-100 text-green-700",
            Self::Error => "notice bg-red-100 text-red-700",
        }
    }
}

/// A queued notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

async fn push(session: &Session, kind: FlashKind, message: String) {
    let mut queue: Vec<Flash> = session
        .get(session_keys::FLASH)
        .await
        .ok()
        .flatten()
        .unwrap_or_default();
    queue.push(Flash { kind, message });

    if let Err(e) = session.insert(session_keys::FLASH, queue).await {
        tracing::warn!("Failed to queue flash message: {e}");
    }
}

/// Queue a success notice.
pub async fn success(session: &Session, message: impl Into<String>) {
    push(session, FlashKind::Success, message.into()).await;
}

/// Queue an error notice.
pub async fn error(session: &Session, message: impl Into<String>) {
    push(session, FlashKind::Error, message.into()).await;
}

/// Take every queued notice, leaving the queue empty.
pub async fn take(session: &Session) -> Vec<Flash> {
    session
        .remove::<Vec<Flash>>(session_keys::FLASH)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to read flash messages: {e}");
            None
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn test_notices_keep_order_and_clear() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);

        success(&session, "Product saved").await;
        error(&session, "Upload failed").await;

        let notices = take(&session).await;
        assert_eq!(
            notices.iter().map(|n| n.kind).collect::<Vec<_>>(),
            vec![FlashKind::Success, FlashKind::Error]
        );
        assert!(take(&session).await.is_empty());
    }
}
