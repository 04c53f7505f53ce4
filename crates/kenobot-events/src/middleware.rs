//! Middleware pipeline values.
//!
//! Each middleware is a callable over the in-flight signal; the pipeline is
//! an ordered sequence, not a class hierarchy. Middleware may observe the
//! whole signal but only `trace_id` mutation is honored.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::bus::HandlerTable;
use crate::signal::{Signal, SignalType};
use kenobot_core::ChatId;

/// Outcome of one middleware application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Continue the pipeline and deliver the signal.
    Deliver,
    /// Abort the pipeline and suppress delivery.
    Inhibit,
}

/// A function in the bus pipeline that can observe, annotate, or inhibit a
/// signal before delivery.
pub trait Middleware: Send + Sync {
    /// Middleware name, for logs.
    fn name(&self) -> &str;

    /// Apply to the in-flight signal.
    fn apply(&self, signal: &mut Signal) -> Verdict;
}

/// Trace propagation: a reply inherits the trace id of the user turn that
/// caused it.
///
/// When `INCOMING_MESSAGE` for chat C passes through, its trace id is
/// stashed under C; the next `OUTGOING_MESSAGE` for C adopts that trace id
/// and evicts the stash entry.
pub struct TraceMiddleware {
    stash: Arc<DashMap<ChatId, Uuid>>,
}

impl TraceMiddleware {
    /// Create the trace middleware with an empty stash.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stash: Arc::new(DashMap::new()),
        }
    }

    /// Number of conversations with a stashed trace (awaiting a reply).
    #[must_use]
    pub fn pending_traces(&self) -> usize {
        self.stash.len()
    }
}

impl Default for TraceMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for TraceMiddleware {
    fn name(&self) -> &str {
        "trace"
    }

    fn apply(&self, signal: &mut Signal) -> Verdict {
        match signal.signal_type {
            SignalType::IncomingMessage => {
                if let Some(chat_id) = signal.chat_id() {
                    self.stash.insert(chat_id.clone(), signal.trace_id);
                }
            },
            SignalType::OutgoingMessage => {
                if let Some(chat_id) = signal.chat_id() {
                    if let Some((_, trace_id)) = self.stash.remove(chat_id) {
                        signal.trace_id = trace_id;
                    }
                }
            },
            _ => {},
        }
        Verdict::Deliver
    }
}

/// Structured log line per signal, except for types in the quiet set.
pub struct LoggingMiddleware {
    quiet: HashSet<SignalType>,
}

impl LoggingMiddleware {
    /// Create with an explicit quiet set.
    #[must_use]
    pub fn with_quiet(quiet: impl IntoIterator<Item = SignalType>) -> Self {
        Self {
            quiet: quiet.into_iter().collect(),
        }
    }
}

impl Default for LoggingMiddleware {
    /// Typing indicators are noisy and carry no information worth a line.
    fn default() -> Self {
        Self::with_quiet([SignalType::ThinkingStart])
    }
}

impl Middleware for LoggingMiddleware {
    fn name(&self) -> &str {
        "logging"
    }

    fn apply(&self, signal: &mut Signal) -> Verdict {
        if !self.quiet.contains(&signal.signal_type) {
            info!(
                signal_type = %signal.signal_type,
                source = %signal.source,
                trace_id = %signal.trace_id,
                "signal"
            );
        }
        Verdict::Deliver
    }
}

/// Warn when a fired signal has no handlers for its type.
pub struct DeadSignalMiddleware {
    handlers: HandlerTable,
}

impl DeadSignalMiddleware {
    pub(crate) fn new(handlers: HandlerTable) -> Self {
        Self { handlers }
    }
}

impl Middleware for DeadSignalMiddleware {
    fn name(&self) -> &str {
        "dead-signal"
    }

    fn apply(&self, signal: &mut Signal) -> Verdict {
        let listeners = self
            .handlers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&signal.signal_type)
            .map_or(0, Vec::len);
        if listeners == 0 {
            warn!(
                signal_type = %signal.signal_type,
                source = %signal.source,
                "signal fired with no subscribers"
            );
        }
        Verdict::Deliver
    }
}
