//! Daily spend accounting for provider calls.

use std::sync::Mutex;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::warn;

use crate::provider::Usage;

/// Snapshot of the tracker for the stats endpoint.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BudgetSnapshot {
    /// Spend recorded today, in USD.
    pub spent_today_usd: f64,
    /// Configured ceiling (zero means unlimited).
    pub daily_limit_usd: f64,
    /// Whether further paid calls should be refused.
    pub over_budget: bool,
}

#[derive(Debug)]
struct Day {
    date: NaiveDate,
    spent_usd: f64,
}

/// Tracks provider spend against a daily ceiling.
///
/// The counter resets when the UTC date changes; a zero limit disables the
/// guard entirely.
pub struct CostTracker {
    daily_limit_usd: f64,
    input_usd_per_mtok: f64,
    output_usd_per_mtok: f64,
    day: Mutex<Day>,
}

impl CostTracker {
    /// Default pricing: a mid-tier model's list price per million tokens.
    const DEFAULT_INPUT_USD_PER_MTOK: f64 = 3.0;
    const DEFAULT_OUTPUT_USD_PER_MTOK: f64 = 15.0;

    /// Create a tracker with a daily USD ceiling (zero = unlimited).
    #[must_use]
    pub fn new(daily_limit_usd: f64) -> Self {
        Self {
            daily_limit_usd,
            input_usd_per_mtok: Self::DEFAULT_INPUT_USD_PER_MTOK,
            output_usd_per_mtok: Self::DEFAULT_OUTPUT_USD_PER_MTOK,
            day: Mutex::new(Day {
                date: Utc::now().date_naive(),
                spent_usd: 0.0,
            }),
        }
    }

    /// Override token pricing (USD per million tokens).
    #[must_use]
    pub fn with_rates(mut self, input_usd_per_mtok: f64, output_usd_per_mtok: f64) -> Self {
        self.input_usd_per_mtok = input_usd_per_mtok;
        self.output_usd_per_mtok = output_usd_per_mtok;
        self
    }

    /// Record the cost of one completion.
    pub fn record(&self, usage: Usage) {
        #[allow(clippy::cast_precision_loss)]
        let cost = (usage.input_tokens as f64) * self.input_usd_per_mtok / 1_000_000.0
            + (usage.output_tokens as f64) * self.output_usd_per_mtok / 1_000_000.0;
        let mut day = self.lock_today();
        day.spent_usd += cost;
        if self.daily_limit_usd > 0.0 && day.spent_usd > self.daily_limit_usd {
            warn!(
                spent = day.spent_usd,
                limit = self.daily_limit_usd,
                "daily budget exceeded"
            );
        }
    }

    /// Whether the daily ceiling has been reached.
    #[must_use]
    pub fn over_budget(&self) -> bool {
        if self.daily_limit_usd <= 0.0 {
            return false;
        }
        self.lock_today().spent_usd >= self.daily_limit_usd
    }

    /// Snapshot for the stats endpoint.
    #[must_use]
    pub fn snapshot(&self) -> BudgetSnapshot {
        let spent = self.lock_today().spent_usd;
        BudgetSnapshot {
            spent_today_usd: spent,
            daily_limit_usd: self.daily_limit_usd,
            over_budget: self.daily_limit_usd > 0.0 && spent >= self.daily_limit_usd,
        }
    }

    /// Lock the day record, rolling the counter on a date change.
    fn lock_today(&self) -> std::sync::MutexGuard<'_, Day> {
        let mut day = self
            .day
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let today = Utc::now().date_naive();
        if day.date != today {
            day.date = today;
            day.spent_usd = 0.0;
        }
        day
    }
}
