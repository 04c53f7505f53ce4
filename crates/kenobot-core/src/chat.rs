//! Chat identifiers and channel names.
//!
//! A conversation is keyed by a platform-qualified [`ChatId`] such as
//! `telegram-123`, `api-<uuid>`, or `webhook-<session>`. The prefix ties
//! the conversation to the channel that owns it, so outbound routing never
//! needs a separate lookup table.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Well-known channel names.
///
/// Transport adapters register under their own name; these constants cover
/// the channels the core itself speaks.
pub mod channel {
    /// Synchronous REST API callers.
    pub const API: &str = "api";
    /// Signed webhook callers.
    pub const WEBHOOK: &str = "webhook";
    /// The scheduler, injecting messages as if from the user.
    pub const SCHEDULER: &str = "scheduler";
    /// Internal system notifications (watchdog, notifier).
    pub const SYSTEM: &str = "system";
}

/// Platform-qualified conversation identifier.
///
/// Equality, ordering, and hashing are by the full string, so a
/// `webhook-alice` and an `api-alice` are distinct conversations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(String);

impl ChatId {
    /// Create a chat ID from an already-qualified string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Chat ID for a persistent webhook session: `webhook-<session>`.
    #[must_use]
    pub fn webhook(session: impl fmt::Display) -> Self {
        Self(format!("webhook-{session}"))
    }

    /// Chat ID for a REST API conversation: `api-<id>`.
    #[must_use]
    pub fn api(id: impl fmt::Display) -> Self {
        Self(format!("api-{id}"))
    }

    /// Fresh transient chat ID with no history (one-shot webhook calls).
    #[must_use]
    pub fn transient() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The full identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The platform prefix, if the ID is qualified (`telegram-123` → `telegram`).
    #[must_use]
    pub fn platform(&self) -> Option<&str> {
        self.0.split_once('-').map(|(p, _)| p)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChatId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ChatId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
