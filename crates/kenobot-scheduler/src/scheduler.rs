//! The scheduler: task table plus ticker.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use cron::Schedule;
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use uuid::Uuid;

use kenobot_core::InboundMessage;
use kenobot_events::{SignalBus, SignalPayload, SignalType};

use crate::cron_spec::{next_occurrence, parse_cron};
use crate::error::SchedulerResult;
use crate::journal::TaskJournal;
use crate::task::{SchedulerTask, TaskSpec};

struct Entry {
    task: SchedulerTask,
    schedule: Schedule,
    next_fire: Option<DateTime<Utc>>,
}

/// Cron-driven message injection.
///
/// When a task's next fire time elapses, the scheduler emits an
/// `INCOMING_MESSAGE` as if it came from the user identified by the task,
/// so downstream flow is indistinguishable from real input. Injection uses
/// the bus's middleware-bypassing `emit` so scheduled turns do not disturb
/// trace correlation.
pub struct Scheduler {
    bus: Arc<SignalBus>,
    journal: TaskJournal,
    entries: Mutex<HashMap<Uuid, Entry>>,
    changed: Arc<Notify>,
    ticker: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a scheduler journaling into `dir`.
    pub fn new(bus: Arc<SignalBus>, dir: impl AsRef<std::path::Path>) -> SchedulerResult<Self> {
        Ok(Self {
            bus,
            journal: TaskJournal::open(dir)?,
            entries: Mutex::new(HashMap::new()),
            changed: Arc::new(Notify::new()),
            ticker: Mutex::new(None),
        })
    }

    /// Validate and add a task; it is journaled before it is scheduled.
    pub fn add(&self, spec: TaskSpec) -> SchedulerResult<SchedulerTask> {
        let schedule = parse_cron(&spec.cron_expr)?;
        let task = SchedulerTask::from_spec(spec);
        self.journal.append_add(&task)?;

        let next_fire = next_occurrence(&schedule, Utc::now());
        info!(id = %task.id, cron = %task.cron_expr, next = ?next_fire, "task added");
        self.lock_entries().insert(
            task.id,
            Entry {
                task: task.clone(),
                schedule,
                next_fire,
            },
        );
        self.changed.notify_waiters();
        Ok(task)
    }

    /// Remove a task by id. Returns whether it existed.
    pub fn remove(&self, id: Uuid) -> SchedulerResult<bool> {
        if self.lock_entries().remove(&id).is_none() {
            return Ok(false);
        }
        self.journal.append_remove(id)?;
        info!(id = %id, "task removed");
        self.changed.notify_waiters();
        Ok(true)
    }

    /// All tasks, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<SchedulerTask> {
        let mut tasks: Vec<SchedulerTask> = self
            .lock_entries()
            .values()
            .map(|e| e.task.clone())
            .collect();
        tasks.sort_by_key(|t| t.created_at);
        tasks
    }

    /// Number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    /// Rebuild the table from the journal, scheduling only future
    /// occurrences (missed fires are not backfilled).
    pub fn load(&self) -> SchedulerResult<usize> {
        let tasks = self.journal.load()?;
        let now = Utc::now();
        let mut entries = self.lock_entries();
        entries.clear();
        for task in tasks {
            match parse_cron(&task.cron_expr) {
                Ok(schedule) => {
                    let next_fire = next_occurrence(&schedule, now);
                    entries.insert(
                        task.id,
                        Entry {
                            task,
                            schedule,
                            next_fire,
                        },
                    );
                },
                Err(e) => {
                    warn!(id = %task.id, error = %e, "journaled task has unparseable cron, skipping");
                },
            }
        }
        let count = entries.len();
        drop(entries);
        self.changed.notify_waiters();
        info!(tasks = count, "scheduler loaded");
        Ok(count)
    }

    /// Start the ticker. Idempotent.
    pub fn start(self: &Arc<Self>) {
        let mut ticker = self
            .ticker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if ticker.is_some() {
            return;
        }
        let scheduler = Arc::clone(self);
        *ticker = Some(tokio::spawn(async move {
            scheduler.tick_loop().await;
        }));
    }

    /// Stop the ticker. Future timers are cleared; a fire already in
    /// progress completes.
    pub fn stop(&self) {
        if let Some(handle) = self
            .ticker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }

    async fn tick_loop(&self) {
        loop {
            let nearest = self
                .lock_entries()
                .values()
                .filter_map(|e| e.next_fire)
                .min();

            match nearest {
                None => self.changed.notified().await,
                Some(when) => {
                    let now = Utc::now();
                    if when <= now {
                        self.fire_due(now);
                        continue;
                    }
                    let delay = (when - now).to_std().unwrap_or_default();
                    tokio::select! {
                        () = tokio::time::sleep(delay) => self.fire_due(Utc::now()),
                        () = self.changed.notified() => {},
                    }
                },
            }
        }
    }

    /// Inject every task due at `now` and advance its next occurrence.
    fn fire_due(&self, now: DateTime<Utc>) {
        let mut due = Vec::new();
        {
            let mut entries = self.lock_entries();
            for entry in entries.values_mut() {
                if entry.next_fire.is_some_and(|t| t <= now) {
                    entry.next_fire = next_occurrence(&entry.schedule, now);
                    due.push(entry.task.clone());
                }
            }
        }
        for task in due {
            debug!(id = %task.id, chat = %task.chat_id, "firing scheduled task");
            let message = InboundMessage::new(
                task.message.clone(),
                task.chat_id.clone(),
                task.user_id.clone(),
                task.channel.clone(),
            );
            self.bus.emit(
                SignalType::IncomingMessage,
                SignalPayload::Inbound(message),
                "scheduler",
            );
        }
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Entry>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
