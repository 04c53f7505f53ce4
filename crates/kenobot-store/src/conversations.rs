//! Conversation metadata and message journals.
//!
//! Layout, one directory per conversation:
//!
//! ```text
//! <conversations>/<key>/
//! ├── meta.json         (Conversation record)
//! └── messages.jsonl    (StoredMessage per line, append-only)
//! ```
//!
//! The directory key is the chat id with filesystem-hostile characters
//! replaced, so `api-<uuid>` and `telegram-123` map 1:1.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use kenobot_core::{ChatId, Conversation};

use crate::error::{StoreError, StoreResult};

/// Who authored a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoredRole {
    /// The user.
    User,
    /// The agent.
    Assistant,
}

/// One journaled message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Author.
    pub role: StoredRole,
    /// Message text.
    pub content: String,
    /// When it was recorded.
    pub timestamp: DateTime<Utc>,
}

impl StoredMessage {
    /// A user message stamped now.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: StoredRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// An assistant message stamped now.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: StoredRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Conversation store: metadata index plus per-conversation journals.
///
/// The in-memory index is authoritative between restarts; `open` rebuilds
/// it by scanning `meta.json` files.
pub struct ConversationStore {
    dir: PathBuf,
    index: RwLock<HashMap<ChatId, Conversation>>,
}

impl ConversationStore {
    /// Open the store, scanning existing conversations.
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.display().to_string(),
            source,
        })?;

        let mut index = HashMap::new();
        let entries = std::fs::read_dir(&dir).map_err(|source| StoreError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        for entry in entries.flatten() {
            let meta_path = entry.path().join("meta.json");
            if !meta_path.is_file() {
                continue;
            }
            match read_meta(&meta_path) {
                Ok(convo) => {
                    index.insert(convo.id.clone(), convo);
                },
                Err(e) => {
                    warn!(path = %meta_path.display(), error = %e, "skipping unreadable conversation");
                },
            }
        }

        Ok(Self {
            dir,
            index: RwLock::new(index),
        })
    }

    /// All conversations, sorted by `updated_at` descending.
    #[must_use]
    pub fn list(&self) -> Vec<Conversation> {
        let mut conversations: Vec<Conversation> = self.read_index().values().cloned().collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        conversations
    }

    /// Metadata for one conversation.
    #[must_use]
    pub fn get(&self, id: &ChatId) -> Option<Conversation> {
        self.read_index().get(id).cloned()
    }

    /// Whether the conversation exists.
    #[must_use]
    pub fn exists(&self, id: &ChatId) -> bool {
        self.read_index().contains_key(id)
    }

    /// Materialize a conversation with no messages. Idempotent.
    pub fn create(&self, id: ChatId) -> StoreResult<Conversation> {
        if let Some(existing) = self.get(&id) {
            return Ok(existing);
        }
        let convo = Conversation::new(id.clone());
        self.persist_meta(&convo)?;
        self.write_index().insert(id, convo.clone());
        Ok(convo)
    }

    /// Append a message, materializing the conversation on first use.
    pub fn append_message(&self, id: &ChatId, message: &StoredMessage) -> StoreResult<()> {
        let mut convo = match self.get(id) {
            Some(c) => c,
            None => self.create(id.clone())?,
        };
        convo.record_message(&message.content, message.role == StoredRole::User);

        let journal = self.convo_dir(id).join("messages.jsonl");
        let line = serde_json::to_string(message)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&journal)
            .map_err(|source| StoreError::Io {
                path: journal.display().to_string(),
                source,
            })?;
        writeln!(file, "{line}").map_err(|source| StoreError::Io {
            path: journal.display().to_string(),
            source,
        })?;

        self.persist_meta(&convo)?;
        self.write_index().insert(id.clone(), convo);
        Ok(())
    }

    /// The most recent `limit` messages, in chronological order.
    pub fn messages(&self, id: &ChatId, limit: usize) -> StoreResult<Vec<StoredMessage>> {
        let journal = self.convo_dir(id).join("messages.jsonl");
        if !journal.is_file() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&journal).map_err(|source| StoreError::Io {
            path: journal.display().to_string(),
            source,
        })?;
        let mut messages = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| StoreError::Io {
                path: journal.display().to_string(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            messages.push(serde_json::from_str(&line)?);
        }
        if messages.len() > limit {
            messages.drain(..messages.len() - limit);
        }
        Ok(messages)
    }

    /// Delete a conversation and its journal. Returns whether it existed.
    pub fn delete(&self, id: &ChatId) -> StoreResult<bool> {
        if self.write_index().remove(id).is_none() {
            return Ok(false);
        }
        let dir = self.convo_dir(id);
        if dir.is_dir() {
            std::fs::remove_dir_all(&dir).map_err(|source| StoreError::Io {
                path: dir.display().to_string(),
                source,
            })?;
        }
        Ok(true)
    }

    /// Number of conversations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read_index().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read_index().is_empty()
    }

    fn convo_dir(&self, id: &ChatId) -> PathBuf {
        self.dir.join(sanitize_key(id.as_str()))
    }

    fn persist_meta(&self, convo: &Conversation) -> StoreResult<()> {
        let dir = self.convo_dir(&convo.id);
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        let path = dir.join("meta.json");
        let json = serde_json::to_string_pretty(convo)?;
        std::fs::write(&path, json).map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    fn read_index(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ChatId, Conversation>> {
        self.index
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_index(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ChatId, Conversation>> {
        self.index
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn read_meta(path: &Path) -> StoreResult<Conversation> {
    let raw = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}

/// Replace filesystem-hostile characters so chat ids map onto directories.
fn sanitize_key(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, ConversationStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = ConversationStore::open(tmp.path().join("conversations")).unwrap();
        (tmp, store)
    }

    #[test]
    fn test_materialize_on_first_message() {
        let (_tmp, store) = store();
        let id = ChatId::api("abc");
        assert!(!store.exists(&id));

        store
            .append_message(&id, &StoredMessage::user("hello there"))
            .unwrap();
        let convo = store.get(&id).unwrap();
        assert_eq!(convo.message_count, 1);
        assert_eq!(convo.title.as_deref(), Some("hello there"));
    }

    #[test]
    fn test_list_sorted_by_updated_at_desc() {
        let (_tmp, store) = store();
        store
            .append_message(&ChatId::api("first"), &StoredMessage::user("a"))
            .unwrap();
        store
            .append_message(&ChatId::api("second"), &StoredMessage::user("b"))
            .unwrap();

        let list = store.list();
        assert_eq!(list.len(), 2);
        assert!(list[0].updated_at >= list[1].updated_at);
        assert_eq!(list[0].id, ChatId::api("second"));
    }

    #[test]
    fn test_messages_window_returns_most_recent() {
        let (_tmp, store) = store();
        let id = ChatId::api("w");
        for i in 0..10 {
            store
                .append_message(&id, &StoredMessage::user(format!("msg {i}")))
                .unwrap();
        }

        let window = store.messages(&id, 3).unwrap();
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].content, "msg 7");
        assert_eq!(window[2].content, "msg 9");
    }

    #[test]
    fn test_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("conversations");
        let id = ChatId::webhook("persist");
        {
            let store = ConversationStore::open(&dir).unwrap();
            store
                .append_message(&id, &StoredMessage::user("remember me"))
                .unwrap();
            store
                .append_message(&id, &StoredMessage::assistant("noted"))
                .unwrap();
        }

        let store = ConversationStore::open(&dir).unwrap();
        let convo = store.get(&id).unwrap();
        assert_eq!(convo.message_count, 2);
        assert_eq!(store.messages(&id, 200).unwrap().len(), 2);
    }

    #[test]
    fn test_delete_removes_everything() {
        let (_tmp, store) = store();
        let id = ChatId::api("gone");
        store
            .append_message(&id, &StoredMessage::user("x"))
            .unwrap();

        assert!(store.delete(&id).unwrap());
        assert!(!store.exists(&id));
        assert!(store.messages(&id, 10).unwrap().is_empty());
        // A second delete reports absence.
        assert!(!store.delete(&id).unwrap());
    }

    #[test]
    fn test_create_is_idempotent() {
        let (_tmp, store) = store();
        let id = ChatId::api("idem");
        let first = store.create(id.clone()).unwrap();
        let second = store.create(id).unwrap();
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(store.len(), 1);
    }
}
