//! Signal records and the closed set of signal types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use kenobot_core::{ChatId, InboundMessage, OutboundMessage};

/// The closed set of signal types the daemon speaks.
///
/// Wire names (used in serialization and the audit trail) are the
/// SCREAMING_SNAKE forms: `INCOMING_MESSAGE`, `OUTGOING_MESSAGE`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalType {
    /// A user message entered the system.
    IncomingMessage,
    /// The agent produced a reply for a conversation.
    OutgoingMessage,
    /// The agent started working (typing indicator).
    ThinkingStart,
    /// A component failed in a recoverable way.
    Error,
    /// Watchdog: system state degraded.
    HealthDegraded,
    /// Watchdog: system state is unhealthy.
    HealthUnhealthy,
    /// Watchdog: system state recovered.
    HealthRecovered,
    /// An owner-directed notification.
    Notification,
    /// The sleep cycle proposed a change awaiting approval.
    ApprovalProposed,
}

impl SignalType {
    /// The stable wire name of this signal type.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::IncomingMessage => "INCOMING_MESSAGE",
            Self::OutgoingMessage => "OUTGOING_MESSAGE",
            Self::ThinkingStart => "THINKING_START",
            Self::Error => "ERROR",
            Self::HealthDegraded => "HEALTH_DEGRADED",
            Self::HealthUnhealthy => "HEALTH_UNHEALTHY",
            Self::HealthRecovered => "HEALTH_RECOVERED",
            Self::Notification => "NOTIFICATION",
            Self::ApprovalProposed => "APPROVAL_PROPOSED",
        }
    }

    /// All signal types, in declaration order.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[
            Self::IncomingMessage,
            Self::OutgoingMessage,
            Self::ThinkingStart,
            Self::Error,
            Self::HealthDegraded,
            Self::HealthUnhealthy,
            Self::HealthRecovered,
            Self::Notification,
            Self::ApprovalProposed,
        ]
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Payload carried by a signal.
///
/// Message signals carry typed records so correlators and middleware can
/// read routing fields without re-parsing JSON; everything else is either
/// a small typed record or an opaque JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum SignalPayload {
    /// Payload of `INCOMING_MESSAGE`.
    Inbound(InboundMessage),
    /// Payload of `OUTGOING_MESSAGE`.
    Outbound(OutboundMessage),
    /// Payload of the `HEALTH_*` signals.
    Health(HealthTransition),
    /// Payload of `ERROR`.
    Error(ErrorReport),
    /// Opaque payload (`NOTIFICATION`, `APPROVAL_PROPOSED`, `THINKING_START`).
    Json(serde_json::Value),
}

impl SignalPayload {
    /// The conversation this payload belongs to, when it has one.
    #[must_use]
    pub fn chat_id(&self) -> Option<&ChatId> {
        match self {
            Self::Inbound(m) => Some(&m.chat_id),
            Self::Outbound(m) => Some(&m.chat_id),
            _ => None,
        }
    }

    /// The channel this payload travels on, when it has one.
    #[must_use]
    pub fn channel(&self) -> Option<&str> {
        match self {
            Self::Inbound(m) => Some(&m.channel),
            Self::Outbound(m) => Some(&m.channel),
            _ => None,
        }
    }
}

/// A health-state edge crossing reported by the watchdog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthTransition {
    /// The state being left.
    pub previous: String,
    /// Human-readable summary of the failing/recovered checks.
    pub detail: String,
}

/// A recoverable failure converted into a signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// What went wrong.
    pub message: String,
    /// Where it happened (component or subscriber name).
    pub context: String,
}

/// An immutable, timestamped record broadcast on the bus.
///
/// Created at `fire()` time and never mutated after the middleware pipeline
/// completes; middleware may read the whole signal but only set `trace_id`.
/// Equality is by `trace_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// Signal type.
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    /// Component that fired the signal.
    pub source: String,
    /// Correlation id shared across one user turn.
    pub trace_id: Uuid,
    /// When the signal was fired.
    pub timestamp: DateTime<Utc>,
    /// Typed or opaque payload.
    pub payload: SignalPayload,
}

impl Signal {
    /// Construct a signal stamped with the current time and a fresh trace id.
    #[must_use]
    pub fn new(signal_type: SignalType, payload: SignalPayload, source: impl Into<String>) -> Self {
        Self::with_trace(signal_type, payload, source, Uuid::new_v4())
    }

    /// Construct a signal carrying a caller-supplied trace id.
    #[must_use]
    pub fn with_trace(
        signal_type: SignalType,
        payload: SignalPayload,
        source: impl Into<String>,
        trace_id: Uuid,
    ) -> Self {
        Self {
            signal_type,
            source: source.into(),
            trace_id,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// The conversation this signal belongs to, when it has one.
    #[must_use]
    pub fn chat_id(&self) -> Option<&ChatId> {
        self.payload.chat_id()
    }

    /// The channel this signal travels on, when it has one.
    #[must_use]
    pub fn channel(&self) -> Option<&str> {
        self.payload.channel()
    }
}

impl PartialEq for Signal {
    fn eq(&self, other: &Self) -> bool {
        self.trace_id == other.trace_id
    }
}
