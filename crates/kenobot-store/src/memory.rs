//! Read-only views over the agent's memory files.
//!
//! Layout:
//!
//! ```text
//! <memory>/
//! ├── long-term.md            (distilled long-term memory)
//! ├── patterns.md             (procedural patterns)
//! ├── episodic/
//! │   └── YYYY-MM-DD.md       (one file per day)
//! └── working/
//!     └── <session>.md        (per-session working memory)
//! ```
//!
//! What the agent writes into these files is its own business; missing
//! files read as empty.

use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::error::{StoreError, StoreResult};

/// One day of episodic memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryEntry {
    /// The day this entry covers.
    pub date: NaiveDate,
    /// Raw markdown content.
    pub content: String,
}

/// Read surface over the memory directory.
pub struct MemoryStore {
    dir: PathBuf,
}

impl MemoryStore {
    /// Create a store over `dir`. The directory need not exist yet.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Distilled long-term memory.
    pub fn long_term(&self) -> StoreResult<String> {
        read_or_empty(&self.dir.join("long-term.md"))
    }

    /// Procedural patterns.
    pub fn patterns(&self) -> StoreResult<String> {
        read_or_empty(&self.dir.join("patterns.md"))
    }

    /// Working memory for one session, if any was written.
    pub fn working(&self, session_id: &str) -> StoreResult<Option<String>> {
        let name = format!("{}.md", sanitize(session_id));
        let path = self.dir.join("working").join(name);
        if !path.is_file() {
            return Ok(None);
        }
        read_or_empty(&path).map(Some)
    }

    /// Episodic entries for the last `days` days, newest first.
    ///
    /// Days without a file are skipped rather than reported empty.
    pub fn recent(&self, days: u32) -> StoreResult<Vec<MemoryEntry>> {
        let today = Utc::now().date_naive();
        let mut entries = Vec::new();
        for offset in 0..i64::from(days) {
            let Some(date) = today.checked_sub_signed(Duration::days(offset)) else {
                break;
            };
            let path = self
                .dir
                .join("episodic")
                .join(format!("{}.md", date.format("%Y-%m-%d")));
            if !path.is_file() {
                continue;
            }
            entries.push(MemoryEntry {
                date,
                content: read_or_empty(&path)?,
            });
        }
        Ok(entries)
    }
}

fn read_or_empty(path: &Path) -> StoreResult<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(source) => Err(StoreError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

fn sanitize(id: &str) -> String {
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

    #[test]
    fn test_missing_files_read_as_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(tmp.path().join("memory"));

        assert_eq!(store.long_term().unwrap(), "");
        assert_eq!(store.patterns().unwrap(), "");
        assert!(store.working("nope").unwrap().is_none());
        assert!(store.recent(3).unwrap().is_empty());
    }

    #[test]
    fn test_recent_picks_up_todays_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("memory");
        let episodic = dir.join("episodic");
        std::fs::create_dir_all(&episodic).unwrap();
        let today = Utc::now().date_naive();
        std::fs::write(
            episodic.join(format!("{}.md", today.format("%Y-%m-%d"))),
            "today was fine",
        )
        .unwrap();

        let store = MemoryStore::new(&dir);
        let entries = store.recent(3).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].date, today);
        assert_eq!(entries[0].content, "today was fine");
    }

    #[test]
    fn test_working_memory_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("memory");
        std::fs::create_dir_all(dir.join("working")).unwrap();
        std::fs::write(dir.join("working").join("api-1.md"), "scratch").unwrap();

        let store = MemoryStore::new(&dir);
        assert_eq!(store.working("api-1").unwrap().as_deref(), Some("scratch"));
        // Hostile session ids cannot escape the directory.
        assert!(store.working("../../etc/passwd").unwrap().is_none());
    }
}
