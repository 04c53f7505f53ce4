//! Scheduler task records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kenobot_core::ChatId;

/// Caller-supplied description of a task to schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// 5-field cron expression.
    pub cron_expr: String,
    /// Message injected when the task fires.
    pub message: String,
    /// Human description for listings.
    pub description: String,
    /// Conversation the message lands in.
    pub chat_id: ChatId,
    /// User the message appears to come from.
    pub user_id: String,
    /// Channel the message appears on.
    pub channel: String,
}

/// A persisted task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerTask {
    /// Task id.
    pub id: Uuid,
    /// 5-field cron expression.
    pub cron_expr: String,
    /// Message injected when the task fires.
    pub message: String,
    /// Human description for listings.
    pub description: String,
    /// Conversation the message lands in.
    pub chat_id: ChatId,
    /// User the message appears to come from.
    pub user_id: String,
    /// Channel the message appears on.
    pub channel: String,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
}

impl SchedulerTask {
    /// Materialize a spec into a task with a fresh id.
    #[must_use]
    pub fn from_spec(spec: TaskSpec) -> Self {
        Self {
            id: Uuid::new_v4(),
            cron_expr: spec.cron_expr,
            message: spec.message,
            description: spec.description,
            chat_id: spec.chat_id,
            user_id: spec.user_id,
            channel: spec.channel,
            created_at: Utc::now(),
        }
    }
}
