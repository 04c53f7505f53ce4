//! Data-directory layout and PID file.
//!
//! All persistent daemon state lives under one data directory:
//!
//! ```text
//! <data_dir>/
//! ├── kenobot.pid                 (current process id)
//! ├── bus-audit.jsonl             (serialized signals, line-delimited JSON)
//! ├── conversations/              (metadata + per-conversation journals)
//! ├── memory/                     (long-term / episodic / working / patterns)
//! ├── scheduler/
//! │   └── tasks.jsonl             (append-only task journal)
//! └── sleep/
//!     └── proposals/              (one markdown file per sleep-cycle run)
//! ```

use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};

/// Resolved locations of everything the daemon persists.
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    /// Create paths rooted at the given data directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The data directory root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// PID file path.
    #[must_use]
    pub fn pid_file(&self) -> PathBuf {
        self.root.join("kenobot.pid")
    }

    /// Bus audit log (line-delimited JSON of serialized signals).
    #[must_use]
    pub fn bus_audit_log(&self) -> PathBuf {
        self.root.join("bus-audit.jsonl")
    }

    /// Conversation store directory.
    #[must_use]
    pub fn conversations_dir(&self) -> PathBuf {
        self.root.join("conversations")
    }

    /// Memory directory.
    #[must_use]
    pub fn memory_dir(&self) -> PathBuf {
        self.root.join("memory")
    }

    /// Scheduler journal directory.
    #[must_use]
    pub fn scheduler_dir(&self) -> PathBuf {
        self.root.join("scheduler")
    }

    /// Sleep-cycle proposals directory.
    #[must_use]
    pub fn sleep_proposals_dir(&self) -> PathBuf {
        self.root.join("sleep").join("proposals")
    }

    /// Create every directory the daemon writes into.
    pub fn ensure_layout(&self) -> CoreResult<()> {
        for dir in [
            self.root.clone(),
            self.conversations_dir(),
            self.memory_dir(),
            self.scheduler_dir(),
            self.sleep_proposals_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|source| CoreError::Io {
                path: dir.display().to_string(),
                source,
            })?;
        }
        Ok(())
    }
}

/// PID file that records the current process id and removes itself on drop.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Write the current process id to `path`.
    pub fn write(path: impl Into<PathBuf>) -> CoreResult<Self> {
        let path = path.into();
        let pid = std::process::id();
        std::fs::write(&path, format!("{pid}\n")).map_err(|source| CoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self { path })
    }

    /// Read the pid recorded in an existing file.
    pub fn read(path: impl AsRef<Path>) -> CoreResult<u32> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        raw.trim().parse().map_err(|_| CoreError::Malformed {
            path: path.display().to_string(),
            detail: format!("expected a pid, found {:?}", raw.trim()),
        })
    }

    /// Path of the PID file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
