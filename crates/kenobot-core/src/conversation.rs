//! Conversation metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::ChatId;

/// Maximum length of a lazily-computed conversation title.
const TITLE_MAX_CHARS: usize = 60;

/// Metadata for a logical message thread.
///
/// Materialized on the first message; destroyed only by explicit delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// The platform-qualified conversation key.
    pub id: ChatId,
    /// Snippet of the first user message, at most 60 characters.
    pub title: Option<String>,
    /// Number of messages recorded in this conversation.
    pub message_count: u64,
    /// When the conversation was materialized.
    pub created_at: DateTime<Utc>,
    /// When the conversation last changed.
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Materialize a new conversation.
    #[must_use]
    pub fn new(id: ChatId) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: None,
            message_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a message, setting the title from the first user message.
    pub fn record_message(&mut self, text: &str, from_user: bool) {
        if self.title.is_none() && from_user {
            self.title = Some(title_snippet(text));
        }
        self.message_count += 1;
        self.updated_at = Utc::now();
    }
}

/// Truncate text to a title snippet on a char boundary.
fn title_snippet(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= TITLE_MAX_CHARS {
        return trimmed.to_string();
    }
    trimmed.chars().take(TITLE_MAX_CHARS).collect()
}
