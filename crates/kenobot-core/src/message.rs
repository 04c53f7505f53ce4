//! Message records carried on the signal bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::ChatId;

/// A user message entering the system, regardless of transport.
///
/// Scheduler-injected messages use the same shape so downstream flow is
/// indistinguishable from real user input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Message text.
    pub text: String,
    /// Conversation this message belongs to.
    pub chat_id: ChatId,
    /// Platform-level user identifier (`webhook`, `api`, a Telegram user id, ...).
    pub user_id: String,
    /// Channel the message arrived on; the reply must leave on the same one.
    pub channel: String,
    /// When the message was received.
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    /// Create an inbound message stamped with the current time.
    #[must_use]
    pub fn new(
        text: impl Into<String>,
        chat_id: ChatId,
        user_id: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            chat_id,
            user_id: user_id.into(),
            channel: channel.into(),
            received_at: Utc::now(),
        }
    }
}

/// A reply leaving the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Reply text.
    pub text: String,
    /// Conversation the reply belongs to.
    pub chat_id: ChatId,
    /// Channel the reply must be delivered on.
    pub channel: String,
}

impl OutboundMessage {
    /// Create an outbound message.
    #[must_use]
    pub fn new(text: impl Into<String>, chat_id: ChatId, channel: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            chat_id,
            channel: channel.into(),
        }
    }

    /// The reply to an inbound message: same chat, same channel.
    #[must_use]
    pub fn reply_to(inbound: &InboundMessage, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            chat_id: inbound.chat_id.clone(),
            channel: inbound.channel.clone(),
        }
    }
}
