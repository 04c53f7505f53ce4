//! Prelude module - commonly used types for convenient import.

pub use crate::{
    Scheduler, SchedulerError, SchedulerResult, SchedulerTask, TaskJournal, TaskSpec, parse_cron,
};
