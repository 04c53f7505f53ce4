//! 5-field cron parsing.
//!
//! Task specs use standard POSIX cron (`minute hour day-of-month month
//! day-of-week`, no seconds). The `cron` crate wants a seconds field, so a
//! literal `0` is prepended after validating the field count.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::error::{SchedulerError, SchedulerResult};

/// Parse a 5-field cron expression.
///
/// # Errors
///
/// Returns [`SchedulerError::InvalidCron`] with a human-readable detail when
/// the field count is wrong or any field fails to parse.
pub fn parse_cron(expr: &str) -> SchedulerResult<Schedule> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(SchedulerError::InvalidCron {
            expr: expr.to_string(),
            detail: format!(
                "expected 5 fields (minute hour day-of-month month day-of-week), found {}",
                fields.len()
            ),
        });
    }
    let with_seconds = format!("0 {}", fields.join(" "));
    Schedule::from_str(&with_seconds).map_err(|e| SchedulerError::InvalidCron {
        expr: expr.to_string(),
        detail: e.to_string(),
    })
}

/// The next occurrence strictly after `after`, if the schedule has one.
#[must_use]
pub fn next_occurrence(schedule: &Schedule, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&after).next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_accepts_standard_expressions() {
        for expr in ["* * * * *", "0 9 * * 1-5", "*/15 2,14 1 */3 *", "30 3 * * 0"] {
            assert!(parse_cron(expr).is_ok(), "{expr} should parse");
        }
    }

    #[test]
    fn test_rejects_wrong_field_count() {
        let err = parse_cron("0 0 12 * * *").unwrap_err();
        match err {
            SchedulerError::InvalidCron { detail, .. } => {
                assert!(detail.contains("expected 5 fields"));
                assert!(detail.contains("found 6"));
            },
            other => panic!("unexpected error: {other}"),
        }
        assert!(parse_cron("").is_err());
        assert!(parse_cron("* * * *").is_err());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        assert!(parse_cron("61 * * * *").is_err());
        assert!(parse_cron("* 25 * * *").is_err());
    }

    #[test]
    fn test_next_occurrence_is_strictly_after() {
        let schedule = parse_cron("0 9 * * *").unwrap();
        let at_nine = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        let next = next_occurrence(&schedule, at_nine).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap());
    }
}
