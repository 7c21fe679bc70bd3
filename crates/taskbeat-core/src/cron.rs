//! Cron expression evaluation
//!
//! Wraps the croner crate for standard 5-field expressions
//! (minute hour day-of-month month day-of-week). The only query the
//! scheduler ever needs is "next occurrence strictly after a reference
//! time"; an occurrence exactly at the reference is never returned.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use croner::Cron;
use tracing::warn;

use crate::error::{Result, SchedulerError};

/// Parsed cron schedule retaining the original expression
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    cron: Cron,
}

impl CronSchedule {
    /// Parse a 5-field cron expression
    pub fn parse(expression: &str) -> Result<Self> {
        let cron =
            Cron::from_str(expression).map_err(|e| SchedulerError::InvalidCronExpression {
                expression: expression.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            expression: expression.to_string(),
            cron,
        })
    }

    /// Next occurrence strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>) -> Result<DateTime<Utc>> {
        self.cron
            .find_next_occurrence(&after, false)
            .map_err(|e| SchedulerError::InvalidCronExpression {
                expression: self.expression.clone(),
                reason: e.to_string(),
            })
    }

    /// The original expression string
    pub fn expression(&self) -> &str {
        &self.expression
    }
}

/// Compute the next run strictly after `after`, or None when the stored
/// expression no longer evaluates.
///
/// The None case leaves the task unscheduled until the expression is
/// corrected, so it is logged rather than swallowed.
pub fn next_run_or_stall(expression: &str, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match CronSchedule::parse(expression).and_then(|schedule| schedule.next_after(after)) {
        Ok(next) => Some(next),
        Err(e) => {
            warn!("task left unscheduled, cron evaluation failed: {}", e);
            None
        }
    }
}
