//! The request/response correlator.
//!
//! Each synchronous HTTP caller parks on a oneshot receiver registered
//! here; the bus subscriber for `OUTGOING_MESSAGE` resolves the first
//! entry matching the signal's chat and channel. An entry evicted by
//! timeout simply no longer matches — a late reply is dropped silently.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

use kenobot_core::ChatId;

use crate::error::{GatewayError, GatewayResult};

/// How a parked request concluded.
#[derive(Debug, PartialEq, Eq)]
pub enum PendingOutcome {
    /// The agent replied with this text.
    Reply(String),
    /// The server is shutting down; the caller gets a terminal error.
    ShuttingDown,
}

struct PendingEntry {
    chat_id: ChatId,
    channel: String,
    created: Instant,
    reply_tx: oneshot::Sender<PendingOutcome>,
}

/// Table of outstanding HTTP requests awaiting an agent reply.
///
/// `chat_id` is a primary key: a second concurrent registration for the
/// same conversation is rejected with a conflict rather than superseding
/// the first.
pub struct PendingTable {
    entries: Mutex<HashMap<Uuid, PendingEntry>>,
}

impl PendingTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Park a request for `chat_id` on `channel`.
    ///
    /// # Errors
    ///
    /// [`GatewayError::ChatBusy`] when an entry for the conversation
    /// already exists.
    pub fn register(
        &self,
        chat_id: ChatId,
        channel: impl Into<String>,
    ) -> GatewayResult<(Uuid, oneshot::Receiver<PendingOutcome>)> {
        let mut entries = self.lock();
        if entries.values().any(|e| e.chat_id == chat_id) {
            return Err(GatewayError::ChatBusy {
                chat_id: chat_id.to_string(),
            });
        }
        let request_id = Uuid::new_v4();
        let (reply_tx, reply_rx) = oneshot::channel();
        entries.insert(
            request_id,
            PendingEntry {
                chat_id,
                channel: channel.into(),
                created: Instant::now(),
                reply_tx,
            },
        );
        Ok((request_id, reply_rx))
    }

    /// Resolve the first entry matching chat and channel with the reply.
    ///
    /// Returns whether an entry matched; a miss means the caller already
    /// timed out (or the reply belongs to a transport adapter instead).
    pub fn resolve(&self, chat_id: &ChatId, channel: &str, text: &str) -> bool {
        let entry = {
            let mut entries = self.lock();
            let matched = entries
                .iter()
                .find(|(_, e)| &e.chat_id == chat_id && e.channel == channel)
                .map(|(id, _)| *id);
            matched.and_then(|id| entries.remove(&id))
        };
        match entry {
            Some(entry) => {
                debug!(
                    chat_id = %chat_id,
                    waited_ms = u64::try_from(entry.created.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "resolving pending request"
                );
                let _ = entry.reply_tx.send(PendingOutcome::Reply(text.to_string()));
                true
            },
            None => {
                debug!(chat_id = %chat_id, "no pending entry for reply, dropping");
                false
            },
        }
    }

    /// Evict an entry after its deadline passed. The parked receiver has
    /// already given up; nothing is sent.
    pub fn evict(&self, request_id: Uuid) -> bool {
        self.lock().remove(&request_id).is_some()
    }

    /// Reject every parked request and clear the table (shutdown).
    pub fn drain(&self) -> usize {
        let entries: Vec<PendingEntry> = {
            let mut map = self.lock();
            map.drain().map(|(_, e)| e).collect()
        };
        let count = entries.len();
        for entry in entries {
            let _ = entry.reply_tx.send(PendingOutcome::ShuttingDown);
        }
        count
    }

    /// Number of parked requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, PendingEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for PendingTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_registration_for_same_chat_conflicts() {
        let table = PendingTable::new();
        let chat = ChatId::api("abc");

        let (_first, _rx) = table.register(chat.clone(), "api").unwrap();
        let err = table.register(chat.clone(), "api").unwrap_err();
        assert!(matches!(err, GatewayError::ChatBusy { .. }));

        // A different conversation is unaffected.
        assert!(table.register(ChatId::api("other"), "api").is_ok());
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_matches_chat_and_channel() {
        let table = PendingTable::new();
        let chat = ChatId::webhook("s");
        let (_id, rx) = table.register(chat.clone(), "webhook").unwrap();

        // Wrong channel leaves the entry alone.
        assert!(!table.resolve(&chat, "api", "nope"));
        assert_eq!(table.len(), 1);

        assert!(table.resolve(&chat, "webhook", "General Kenobi!"));
        assert!(table.is_empty());
        assert_eq!(
            rx.await.unwrap(),
            PendingOutcome::Reply("General Kenobi!".to_string())
        );
    }

    #[test]
    fn test_late_reply_after_eviction_is_dropped() {
        let table = PendingTable::new();
        let chat = ChatId::api("late");
        let (id, _rx) = table.register(chat.clone(), "api").unwrap();

        assert!(table.evict(id));
        assert!(!table.evict(id));
        // The reply finds no entry and is silently dropped.
        assert!(!table.resolve(&chat, "api", "too late"));
    }

    #[tokio::test]
    async fn test_drain_rejects_all_waiters() {
        let table = PendingTable::new();
        let (_a, rx_a) = table.register(ChatId::api("a"), "api").unwrap();
        let (_b, rx_b) = table.register(ChatId::api("b"), "api").unwrap();

        assert_eq!(table.drain(), 2);
        assert!(table.is_empty());
        assert_eq!(rx_a.await.unwrap(), PendingOutcome::ShuttingDown);
        assert_eq!(rx_b.await.unwrap(), PendingOutcome::ShuttingDown);
    }

    /// After eviction the same chat can immediately register again.
    #[test]
    fn test_eviction_frees_the_chat_key() {
        let table = PendingTable::new();
        let chat = ChatId::api("again");
        let (id, _rx) = table.register(chat.clone(), "api").unwrap();
        table.evict(id);
        assert!(table.register(chat, "api").is_ok());
    }
}
