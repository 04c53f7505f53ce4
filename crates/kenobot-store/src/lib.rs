//! KenoBot Store - Persistent resources served by the REST API.
//!
//! This crate provides:
//! - [`ConversationStore`]: conversation metadata plus a per-conversation
//!   message journal (line-delimited JSON)
//! - [`MemoryStore`]: read-only views over the agent's memory files
//! - [`TaskEventLog`]: active background tasks and their recent events
//!
//! The semantics of memory *content* belong to the agent; this crate only
//! moves bytes in the layouts the API serves.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod conversations;
mod error;
mod memory;
mod tasks;

pub use conversations::{ConversationStore, StoredMessage, StoredRole};
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryEntry, MemoryStore};
pub use tasks::{TaskEvent, TaskEventLog, TaskStatus, TaskSummary};
