//! Append-only on-disk audit trail of serialized signals.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{BusError, BusResult};
use crate::signal::Signal;

/// Line-delimited JSON log of every signal the bus dispatched.
///
/// One signal per line; the file is opened in append mode so restarts
/// extend the trail rather than truncating it.
pub struct AuditTrail {
    path: PathBuf,
    file: Mutex<File>,
}

impl AuditTrail {
    /// Open (or create) the audit log at `path`.
    pub fn open(path: impl Into<PathBuf>) -> BusResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| BusError::AuditIo {
                path: path.display().to_string(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| BusError::AuditIo {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Append one serialized signal.
    pub fn record(&self, signal: &Signal) -> BusResult<()> {
        let line = serde_json::to_string(signal).map_err(BusError::AuditSerialize)?;
        let mut file = self
            .file
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        writeln!(file, "{line}").map_err(|source| BusError::AuditIo {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Read the whole trail back (diagnostics and tests).
    pub fn read_all(&self) -> BusResult<Vec<Signal>> {
        Self::read_from(&self.path)
    }

    /// Read a trail from an arbitrary path.
    pub fn read_from(path: impl AsRef<Path>) -> BusResult<Vec<Signal>> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| BusError::AuditIo {
            path: path.display().to_string(),
            source,
        })?;
        let mut signals = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| BusError::AuditIo {
                path: path.display().to_string(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            signals.push(serde_json::from_str(&line).map_err(BusError::AuditSerialize)?);
        }
        Ok(signals)
    }

    /// Path of the on-disk log.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
