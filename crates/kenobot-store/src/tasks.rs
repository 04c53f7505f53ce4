//! Active background tasks and their recent events.
//!
//! Purely in-memory: the task log describes what the daemon is doing right
//! now, not history. Each task keeps a bounded ring of recent events.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

/// Most events retained per task.
const EVENT_RING_CAPACITY: usize = 100;

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// The task is running.
    Active,
    /// The task finished.
    Completed,
    /// The task failed.
    Failed,
}

/// One task event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskEvent {
    /// When it happened.
    pub timestamp: DateTime<Utc>,
    /// Short event kind (`started`, `progress`, `error`, ...).
    pub kind: String,
    /// Free-form detail.
    pub detail: String,
}

impl TaskEvent {
    /// Create an event stamped now.
    #[must_use]
    pub fn now(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: kind.into(),
            detail: detail.into(),
        }
    }
}

/// Task summary for the list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    /// Task id.
    pub id: String,
    /// What the task is doing.
    pub description: String,
    /// Lifecycle state.
    pub status: TaskStatus,
    /// When the task started.
    pub started_at: DateTime<Utc>,
}

struct TaskRecord {
    description: String,
    status: TaskStatus,
    started_at: DateTime<Utc>,
    events: VecDeque<TaskEvent>,
}

/// Registry of background tasks with bounded per-task event logs.
#[derive(Default)]
pub struct TaskEventLog {
    tasks: DashMap<String, TaskRecord>,
}

impl TaskEventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task as active.
    pub fn begin(&self, id: impl Into<String>, description: impl Into<String>) {
        let id = id.into();
        let mut record = TaskRecord {
            description: description.into(),
            status: TaskStatus::Active,
            started_at: Utc::now(),
            events: VecDeque::new(),
        };
        record.events.push_back(TaskEvent::now("started", ""));
        self.tasks.insert(id, record);
    }

    /// Append an event to a task; unknown ids are ignored.
    pub fn push_event(&self, id: &str, event: TaskEvent) {
        if let Some(mut record) = self.tasks.get_mut(id) {
            if record.events.len() >= EVENT_RING_CAPACITY {
                record.events.pop_front();
            }
            record.events.push_back(event);
        }
    }

    /// Mark a task completed or failed.
    pub fn finish(&self, id: &str, status: TaskStatus) {
        if let Some(mut record) = self.tasks.get_mut(id) {
            record.status = status;
        }
    }

    /// Drop a finished task from the registry.
    pub fn forget(&self, id: &str) {
        self.tasks.remove(id);
    }

    /// Currently active tasks, oldest first.
    #[must_use]
    pub fn active(&self) -> Vec<TaskSummary> {
        let mut summaries: Vec<TaskSummary> = self
            .tasks
            .iter()
            .filter(|entry| entry.value().status == TaskStatus::Active)
            .map(|entry| TaskSummary {
                id: entry.key().clone(),
                description: entry.value().description.clone(),
                status: entry.value().status,
                started_at: entry.value().started_at,
            })
            .collect();
        summaries.sort_by_key(|s| s.started_at);
        summaries
    }

    /// Events for one task, oldest first. `None` for unknown ids.
    #[must_use]
    pub fn events(&self, id: &str) -> Option<Vec<TaskEvent>> {
        self.tasks
            .get(id)
            .map(|record| record.events.iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_and_listing() {
        let log = TaskEventLog::new();
        log.begin("t1", "indexing");
        log.begin("t2", "summarizing");
        assert_eq!(log.active().len(), 2);

        log.finish("t1", TaskStatus::Completed);
        let active = log.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "t2");

        // Finished tasks still answer event queries until forgotten.
        assert!(log.events("t1").is_some());
        log.forget("t1");
        assert!(log.events("t1").is_none());
    }

    #[test]
    fn test_event_ring_is_bounded() {
        let log = TaskEventLog::new();
        log.begin("t", "busy");
        for i in 0..200 {
            log.push_event("t", TaskEvent::now("progress", format!("{i}")));
        }
        let events = log.events("t").unwrap();
        assert_eq!(events.len(), EVENT_RING_CAPACITY);
        assert_eq!(events.last().unwrap().detail, "199");
    }

    #[test]
    fn test_unknown_task_events_are_ignored() {
        let log = TaskEventLog::new();
        log.push_event("ghost", TaskEvent::now("progress", "x"));
        assert!(log.events("ghost").is_none());
    }
}
