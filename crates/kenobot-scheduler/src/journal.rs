//! Append-only task journal.
//!
//! One JSON record per line; removal is a tombstone. The authoritative
//! in-memory table is rebuilt by a full scan at load time.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::{SchedulerError, SchedulerResult};
use crate::task::SchedulerTask;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum JournalRecord {
    Add {
        task: SchedulerTask,
    },
    Remove {
        id: Uuid,
    },
}

/// Line-delimited JSON journal of task adds and removals.
pub struct TaskJournal {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TaskJournal {
    /// Journal at `<dir>/tasks.jsonl`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> SchedulerResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|source| SchedulerError::JournalIo {
            path: dir.display().to_string(),
            source,
        })?;
        Ok(Self {
            path: dir.join("tasks.jsonl"),
            write_lock: Mutex::new(()),
        })
    }

    /// Append an add record.
    pub fn append_add(&self, task: &SchedulerTask) -> SchedulerResult<()> {
        self.append(&JournalRecord::Add { task: task.clone() })
    }

    /// Append a tombstone.
    pub fn append_remove(&self, id: Uuid) -> SchedulerResult<()> {
        self.append(&JournalRecord::Remove { id })
    }

    /// Rebuild the live task set by scanning the journal.
    ///
    /// Unparseable lines are skipped with a warning — a torn final write
    /// must not take the whole scheduler down.
    pub fn load(&self) -> SchedulerResult<Vec<SchedulerTask>> {
        let file = match std::fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(SchedulerError::JournalIo {
                    path: self.path.display().to_string(),
                    source,
                });
            },
        };

        let mut live: Vec<SchedulerTask> = Vec::new();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| SchedulerError::JournalIo {
                path: self.path.display().to_string(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<JournalRecord>(&line) {
                Ok(JournalRecord::Add { task }) => live.push(task),
                Ok(JournalRecord::Remove { id }) => live.retain(|t| t.id != id),
                Err(e) => {
                    warn!(line = lineno + 1, error = %e, "skipping malformed journal record");
                },
            }
        }
        Ok(live)
    }

    /// Journal file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, record: &JournalRecord) -> SchedulerResult<()> {
        let line = serde_json::to_string(record)?;
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| SchedulerError::JournalIo {
                path: self.path.display().to_string(),
                source,
            })?;
        writeln!(file, "{line}").map_err(|source| SchedulerError::JournalIo {
            path: self.path.display().to_string(),
            source,
        })
    }
}
