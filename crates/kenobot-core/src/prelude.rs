//! Prelude module - commonly used types for convenient import.
//!
//! Use `use kenobot_core::prelude::*;` to import all essential types.

pub use crate::chat::{ChatId, channel};
pub use crate::conversation::Conversation;
pub use crate::error::{CoreError, CoreResult};
pub use crate::message::{InboundMessage, OutboundMessage};
pub use crate::paths::{DataPaths, PidFile};
