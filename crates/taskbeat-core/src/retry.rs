//! Retry and backoff policy
//!
//! Pure decision logic for the post-execution state transition: which
//! status the task moves to, how much retry budget it has left, and when
//! it runs next. The scheduler engine applies the decision; nothing here
//! touches the store.

use chrono::{DateTime, Duration, Utc};

use crate::cron;
use crate::types::{ExecutionOutcome, RunKind, ScheduledTask, TaskStatus};

/// Backoff delays in seconds for scheduled runs, indexed by the retry
/// attempt and clamped at the last entry.
pub const BACKOFF_SCHEDULE: [i64; 7] = [1, 2, 4, 8, 16, 32, 64];

/// Fixed retry delay in seconds for manually triggered runs.
///
/// Manual retries reschedule on this flat delay; only scheduled runs walk
/// [`BACKOFF_SCHEDULE`].
pub const MANUAL_RETRY_DELAY_SECS: i64 = 10;

/// State transition computed from one execution outcome
#[derive(Debug, Clone, PartialEq)]
pub struct RetryDecision {
    /// Status the task moves to
    pub status: TaskStatus,
    /// Updated retry counter
    pub retry_count: i32,
    /// When the task should run next; None when cron evaluation fails
    pub next_run_time: Option<DateTime<Utc>>,
    /// Operator-facing outcome message
    pub message: String,
}

/// Compute the transition for `task` after one execution.
///
/// Success resets the retry budget and returns the task to its cron
/// schedule. Failed and Retrying outcomes consume budget and reschedule
/// after a backoff delay; once the budget is exhausted the task goes
/// terminally Failed and falls back to the cron schedule from `now`.
pub fn evaluate(
    task: &ScheduledTask,
    outcome: ExecutionOutcome,
    kind: RunKind,
    now: DateTime<Utc>,
) -> RetryDecision {
    match outcome {
        ExecutionOutcome::Success => {
            let next_run_time = cron::next_run_or_stall(&task.cron_expression, now);
            let mut message = "Execution succeeded".to_string();
            if next_run_time.is_none() {
                message.push_str("; cron evaluation failed, task left unscheduled");
            }
            RetryDecision {
                status: TaskStatus::Success,
                retry_count: 0,
                next_run_time,
                message,
            }
        }
        ExecutionOutcome::Failed | ExecutionOutcome::Retrying => {
            let verb = match outcome {
                ExecutionOutcome::Failed => "failed",
                _ => "requested retry",
            };

            if task.retry_count < task.max_retries {
                let delay = retry_delay(kind, task.retry_count);
                let retry_count = task.retry_count + 1;
                let status = match outcome {
                    ExecutionOutcome::Failed => TaskStatus::Failed,
                    _ => TaskStatus::Retrying,
                };
                RetryDecision {
                    status,
                    retry_count,
                    next_run_time: Some(now + Duration::seconds(delay)),
                    message: format!(
                        "Execution {}. Retrying in {}s (attempt {}/{})",
                        verb, delay, retry_count, task.max_retries
                    ),
                }
            } else {
                let next_run_time = cron::next_run_or_stall(&task.cron_expression, now);
                let mut message = format!(
                    "Execution {}. Retries exhausted after {} attempts, returning to cron schedule",
                    verb, task.retry_count
                );
                if next_run_time.is_none() {
                    message.push_str("; cron evaluation failed, task left unscheduled");
                }
                RetryDecision {
                    status: TaskStatus::Failed,
                    retry_count: task.retry_count,
                    next_run_time,
                    message,
                }
            }
        }
    }
}

fn retry_delay(kind: RunKind, retry_count: i32) -> i64 {
    match kind {
        RunKind::Scheduled => {
            let idx = (retry_count.max(0) as usize).min(BACKOFF_SCHEDULE.len() - 1);
            BACKOFF_SCHEDULE[idx]
        }
        RunKind::Manual => MANUAL_RETRY_DELAY_SECS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn task_with_retries(retry_count: i32, max_retries: i32) -> ScheduledTask {
        let mut task = ScheduledTask::new("job", "*/5 * * * *").with_max_retries(max_retries);
        task.retry_count = retry_count;
        task
    }

    fn reference_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 10, 5, 0).unwrap()
    }

    #[test]
    fn success_resets_budget_and_returns_to_cron() {
        let task = task_with_retries(2, 3);
        let now = reference_time();

        let decision = evaluate(&task, ExecutionOutcome::Success, RunKind::Scheduled, now);

        assert_eq!(decision.status, TaskStatus::Success);
        assert_eq!(decision.retry_count, 0);
        assert_eq!(
            decision.next_run_time,
            Some(Utc.with_ymd_and_hms(2026, 3, 2, 10, 10, 0).unwrap())
        );
        assert!(decision.message.contains("succeeded"));
    }

    #[test]
    fn consecutive_failures_walk_the_backoff_table() {
        let now = reference_time();

        for (retry_count, expected_delay) in [(0, 1), (1, 2), (2, 4)] {
            let task = task_with_retries(retry_count, 3);
            let decision = evaluate(&task, ExecutionOutcome::Failed, RunKind::Scheduled, now);

            assert_eq!(decision.status, TaskStatus::Failed);
            assert_eq!(decision.retry_count, retry_count + 1);
            assert_eq!(
                decision.next_run_time,
                Some(now + Duration::seconds(expected_delay))
            );
            assert!(decision.message.contains(&format!("in {}s", expected_delay)));
        }
    }

    #[test]
    fn retrying_outcome_moves_to_retrying_status() {
        let task = task_with_retries(0, 3);
        let decision = evaluate(
            &task,
            ExecutionOutcome::Retrying,
            RunKind::Scheduled,
            reference_time(),
        );

        assert_eq!(decision.status, TaskStatus::Retrying);
        assert_eq!(decision.retry_count, 1);
    }

    #[test]
    fn exhausted_budget_goes_terminal_and_back_to_cron() {
        let task = task_with_retries(3, 3);
        let now = reference_time();

        let decision = evaluate(&task, ExecutionOutcome::Failed, RunKind::Scheduled, now);

        assert_eq!(decision.status, TaskStatus::Failed);
        assert_eq!(decision.retry_count, 3);
        assert_eq!(
            decision.next_run_time,
            Some(Utc.with_ymd_and_hms(2026, 3, 2, 10, 10, 0).unwrap())
        );
        assert!(decision.message.contains("exhausted"));
    }

    #[test]
    fn backoff_clamps_at_the_table_end() {
        let task = task_with_retries(10, 20);
        let now = reference_time();

        let decision = evaluate(&task, ExecutionOutcome::Failed, RunKind::Scheduled, now);

        assert_eq!(decision.next_run_time, Some(now + Duration::seconds(64)));
    }

    #[test]
    fn manual_runs_use_the_fixed_delay() {
        let now = reference_time();

        for retry_count in [0, 1, 5] {
            let task = task_with_retries(retry_count, 10);
            let decision = evaluate(&task, ExecutionOutcome::Failed, RunKind::Manual, now);
            assert_eq!(
                decision.next_run_time,
                Some(now + Duration::seconds(MANUAL_RETRY_DELAY_SECS))
            );
        }
    }

    #[test]
    fn broken_expression_stalls_instead_of_scheduling() {
        let mut task = task_with_retries(0, 3);
        task.cron_expression = "99 99 * * *".to_string();

        let decision = evaluate(
            &task,
            ExecutionOutcome::Success,
            RunKind::Scheduled,
            reference_time(),
        );

        assert_eq!(decision.status, TaskStatus::Success);
        assert!(decision.next_run_time.is_none());
        assert!(decision.message.contains("unscheduled"));
    }
}
