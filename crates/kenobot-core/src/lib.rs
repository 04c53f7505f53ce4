//! KenoBot Core - Foundation types for the KenoBot assistant daemon.
//!
//! This crate provides:
//! - Chat and channel identifiers shared by every transport
//! - Inbound/outbound message records carried on the signal bus
//! - Conversation metadata
//! - Data-directory layout and PID file helpers
//!
//! Everything here is deliberately dependency-light: the daemon's moving
//! parts (bus, correlators, scheduler, watchdog) all speak these types.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod chat;
mod conversation;
mod error;
mod message;
mod paths;

pub use chat::{ChatId, channel};
pub use conversation::Conversation;
pub use error::{CoreError, CoreResult};
pub use message::{InboundMessage, OutboundMessage};
pub use paths::{DataPaths, PidFile};
