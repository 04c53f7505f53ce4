//! Configuration types for the KenoBot daemon.
//!
//! All types here are self-contained; domain crates receive plain values at
//! the boundary. Every struct implements [`Default`] with production
//! defaults so a bare `[section]` header in TOML produces a working
//! configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration for the KenoBot daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for all persistent state.
    pub data_dir: Option<PathBuf>,
    /// HTTP listener settings.
    pub server: ServerSection,
    /// API key and webhook secret.
    pub auth: AuthSection,
    /// Rate limits and request timeouts.
    pub limits: LimitsSection,
    /// Language-model provider settings.
    pub provider: ProviderSection,
    /// Circuit-breaker thresholds.
    pub breaker: BreakerSection,
    /// Spend budget for provider calls.
    pub budget: BudgetSection,
    /// Watchdog tick and check timeouts.
    pub watchdog: WatchdogSection,
    /// Scheduler behaviour.
    pub scheduler: SchedulerSection,
    /// Sleep-cycle period and target hour.
    pub sleep: SleepSection,
    /// Owner contact for health notifications.
    pub owner: OwnerSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

impl Config {
    /// The data directory, defaulting to the platform data dir
    /// (`~/.local/share/kenobot` on Linux).
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        directories::ProjectDirs::from("", "", "kenobot").map_or_else(
            || PathBuf::from(".kenobot"),
            |dirs| dirs.data_dir().to_path_buf(),
        )
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Authentication material.
///
/// Empty strings mean "not configured": bearer-authenticated routes and
/// the webhook reject every request until the corresponding secret is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    /// Bearer token for the REST API.
    pub api_key: String,
    /// HMAC secret for webhook signatures.
    pub webhook_secret: String,
}

/// Rate limits and request timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsSection {
    /// Requests allowed per IP per window.
    pub rate_limit: u32,
    /// Sliding-window length in seconds.
    pub rate_window_secs: u64,
    /// How long a correlator waits for an agent reply, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            rate_limit: 60,
            rate_window_secs: 60,
            request_timeout_secs: 120,
        }
    }
}

/// Language-model provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    /// Model identifier.
    pub model: String,
    /// Provider API key.
    pub api_key: String,
    /// Override endpoint (proxies, compatible APIs).
    pub base_url: Option<String>,
    /// Maximum tokens per reply.
    pub max_tokens: usize,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            api_key: String::new(),
            base_url: None,
            max_tokens: 4096,
        }
    }
}

/// Circuit-breaker thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSection {
    /// Consecutive failures before the circuit opens.
    pub threshold: u32,
    /// Seconds the circuit stays open before probing.
    pub cooldown_secs: u64,
}

impl Default for BreakerSection {
    fn default() -> Self {
        Self {
            threshold: 3,
            cooldown_secs: 60,
        }
    }
}

/// Spend budget for provider calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetSection {
    /// Daily spend ceiling in USD. Zero disables the budget guard.
    pub daily_usd: f64,
}

impl Default for BudgetSection {
    fn default() -> Self {
        Self { daily_usd: 5.0 }
    }
}

/// Watchdog tick and check timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogSection {
    /// Seconds between ticks.
    pub interval_secs: u64,
    /// Bounded await for each individual check, in seconds.
    pub check_timeout_secs: u64,
}

impl Default for WatchdogSection {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            check_timeout_secs: 10,
        }
    }
}

/// Scheduler behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    /// Whether the ticker starts with the daemon.
    pub enabled: bool,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Sleep-cycle period and target hour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SleepSection {
    /// Hours between runs.
    pub period_hours: u64,
    /// Preferred local hour for the scheduled run (0-23).
    pub target_hour: u8,
}

impl Default for SleepSection {
    fn default() -> Self {
        Self {
            period_hours: 24,
            target_hour: 3,
        }
    }
}

/// Owner contact for health notifications.
///
/// When unset, health transitions are logged but nobody is messaged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OwnerSection {
    /// Chat to notify (platform-qualified, e.g. `telegram-123`).
    pub chat_id: Option<String>,
    /// Channel that chat lives on.
    pub channel: Option<String>,
}

/// Logging level, format, and per-crate directives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Base level.
    pub level: String,
    /// `pretty`, `compact`, or `json`.
    pub format: String,
    /// Extra env-filter directives.
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
            directives: Vec::new(),
        }
    }
}
