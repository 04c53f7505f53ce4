//! Markdown proposal output.
//!
//! The self-improvement phase distills its suggestions into one markdown
//! file per proposal under `<dataDir>/sleep/proposals/`. Files are never
//! rewritten; each proposal gets a fresh timestamped name.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use kenobot_events::{SignalBus, SignalPayload, SignalType};

use crate::error::{SleepError, SleepResult};

/// Writes proposals and announces them on the bus.
pub struct ProposalWriter {
    dir: PathBuf,
    bus: Option<Arc<SignalBus>>,
}

impl ProposalWriter {
    /// Create a writer into `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            bus: None,
        }
    }

    /// Announce each written proposal with an `APPROVAL_PROPOSED` signal.
    #[must_use]
    pub fn with_bus(mut self, bus: Arc<SignalBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Write one proposal; returns the path of the new file.
    pub fn write(&self, title: &str, body: &str) -> SleepResult<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|source| SleepError::ProposalIo {
            path: self.dir.display().to_string(),
            source,
        })?;

        let name = format!("{}.md", Utc::now().format("%Y%m%dT%H%M%S%3fZ"));
        let path = self.dir.join(name);
        let content = format!("# {title}\n\n{body}\n");
        std::fs::write(&path, content).map_err(|source| SleepError::ProposalIo {
            path: path.display().to_string(),
            source,
        })?;
        info!(path = %path.display(), "proposal written");

        if let Some(bus) = &self.bus {
            bus.fire(
                SignalType::ApprovalProposed,
                SignalPayload::Json(serde_json::json!({
                    "title": title,
                    "path": path.display().to_string(),
                })),
                "sleep-cycle",
            );
        }
        Ok(path)
    }

    /// The proposals directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
