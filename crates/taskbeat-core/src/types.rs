//! Task types, statuses, and execution records
//!
//! Contains the core data model shared by the store, engine, and service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{Result, SchedulerError};

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Waiting for its next scheduled time
    Pending,
    /// An execution is in flight
    Running,
    /// The most recent execution succeeded
    Success,
    /// The most recent execution failed; terminal once retries are exhausted
    Failed,
    /// The most recent execution asked to be retried
    Retrying,
}

impl TaskStatus {
    /// Stable string form used in the database and in messages
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Running => "Running",
            TaskStatus::Success => "Success",
            TaskStatus::Failed => "Failed",
            TaskStatus::Retrying => "Retrying",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Pending" => Ok(TaskStatus::Pending),
            "Running" => Ok(TaskStatus::Running),
            "Success" => Ok(TaskStatus::Success),
            "Failed" => Ok(TaskStatus::Failed),
            "Retrying" => Ok(TaskStatus::Retrying),
            other => Err(SchedulerError::InvalidConfig(format!(
                "unknown task status: {}",
                other
            ))),
        }
    }
}

/// How an execution was initiated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    /// Picked up by the periodic loop
    Scheduled,
    /// Requested through the on-demand trigger
    Manual,
}

/// Result reported by an executor for one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The work completed
    Success,
    /// The work failed
    Failed,
    /// The work failed transiently and asked for a retry
    Retrying,
}

/// A recurring task definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// Unique task ID
    pub id: Uuid,
    /// Human-readable task name
    pub name: String,
    /// Free-form category tag, e.g. "etl" or "report"
    pub task_type: String,
    /// 5-field cron expression driving the schedule
    pub cron_expression: String,
    /// Task whose latest run must have succeeded for this one to run
    pub dependency_id: Option<Uuid>,
    /// Current lifecycle status
    pub status: TaskStatus,
    /// Whether the loop considers this task at all
    pub enabled: bool,
    /// Failed or retrying attempts since the last success
    pub retry_count: i32,
    /// Retry budget before a failure becomes terminal
    pub max_retries: i32,
    /// When the task last started running
    pub last_run_time: Option<DateTime<Utc>>,
    /// When the task should next run; None leaves it unscheduled
    pub next_run_time: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl ScheduledTask {
    /// Create a new task: Pending, enabled, retry budget of three
    pub fn new(name: impl Into<String>, cron_expression: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            task_type: "default".to_string(),
            cron_expression: cron_expression.into(),
            dependency_id: None,
            status: TaskStatus::Pending,
            enabled: true,
            retry_count: 0,
            max_retries: 3,
            last_run_time: None,
            next_run_time: None,
            created_at: Utc::now(),
        }
    }

    /// Set the category tag
    pub fn with_task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = task_type.into();
        self
    }

    /// Set the dependency link
    pub fn with_dependency(mut self, dependency_id: Uuid) -> Self {
        self.dependency_id = Some(dependency_id);
        self
    }

    /// Set the retry budget
    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Partial update applied to an existing task.
///
/// `dependency_id` is doubly optional: `None` leaves the link unchanged,
/// `Some(None)` clears it, `Some(Some(id))` points it at another task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskUpdate {
    /// New display name
    pub name: Option<String>,
    /// New category tag
    pub task_type: Option<String>,
    /// New cron expression; a changed value triggers a next-run recompute
    pub cron_expression: Option<String>,
    /// New dependency link
    pub dependency_id: Option<Option<Uuid>>,
    /// New enabled flag
    pub enabled: Option<bool>,
    /// New retry budget
    pub max_retries: Option<i32>,
}

/// Immutable record of one execution attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Record ID
    pub id: Uuid,
    /// Task this record belongs to
    pub task_id: Uuid,
    /// Execution start
    pub started_at: DateTime<Utc>,
    /// Execution end
    pub finished_at: DateTime<Utc>,
    /// Elapsed wall-clock seconds, never negative
    pub duration_secs: f64,
    /// Status the execution finished with
    pub status: TaskStatus,
    /// Outcome description
    pub message: String,
}

impl ExecutionRecord {
    /// Build a record for a finished attempt, deriving the duration
    pub fn new(
        task_id: Uuid,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        status: TaskStatus,
        message: impl Into<String>,
    ) -> Self {
        let duration_secs = (finished_at - started_at).num_milliseconds().max(0) as f64 / 1000.0;
        Self {
            id: Uuid::new_v4(),
            task_id,
            started_at,
            finished_at,
            duration_secs,
            status,
            message: message.into(),
        }
    }
}

/// Execution record joined with its task's display name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordEntry {
    /// Display name of the owning task
    pub task_name: String,
    /// The record itself
    pub record: ExecutionRecord,
}

/// What an on-demand run reports back to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Task ID
    pub task_id: Uuid,
    /// Task display name
    pub name: String,
    /// Status after applying the retry policy
    pub status: TaskStatus,
    /// Outcome message, also stored on the execution record
    pub message: String,
    /// When the task runs next
    pub next_run_time: Option<DateTime<Utc>>,
}

/// Aggregate counters for operator dashboards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStats {
    /// Number of tasks, enabled or not
    pub total_tasks: i64,
    /// Execution records that finished with Success
    pub success_records: i64,
    /// Execution records that finished with Failed
    pub failed_records: i64,
    /// Execution records that finished with Retrying
    pub retrying_records: i64,
    /// Execution records with Pending status (normally zero)
    pub pending_records: i64,
    /// Earliest future next_run_time among enabled tasks
    pub next_upcoming_run: Option<DateTime<Utc>>,
}

/// Internal row type for task queries
#[derive(FromRow)]
pub(crate) struct TaskRow {
    pub id: String,
    pub name: String,
    pub task_type: String,
    pub cron_expression: String,
    pub dependency_id: Option<String>,
    pub status: String,
    pub enabled: bool,
    pub retry_count: i32,
    pub max_retries: i32,
    pub last_run_time: Option<DateTime<Utc>>,
    pub next_run_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for ScheduledTask {
    type Error = SchedulerError;

    fn try_from(row: TaskRow) -> Result<Self> {
        let dependency_id = row
            .dependency_id
            .map(|id| Uuid::parse_str(&id))
            .transpose()
            .map_err(|e| SchedulerError::InvalidConfig(format!("invalid dependency ID: {}", e)))?;

        Ok(ScheduledTask {
            id: Uuid::parse_str(&row.id)
                .map_err(|e| SchedulerError::InvalidConfig(format!("invalid task ID: {}", e)))?,
            name: row.name,
            task_type: row.task_type,
            cron_expression: row.cron_expression,
            dependency_id,
            status: row.status.parse()?,
            enabled: row.enabled,
            retry_count: row.retry_count,
            max_retries: row.max_retries,
            last_run_time: row.last_run_time,
            next_run_time: row.next_run_time,
            created_at: row.created_at,
        })
    }
}

/// Internal row type for execution record queries
#[derive(FromRow)]
pub(crate) struct RecordRow {
    pub id: String,
    pub task_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub status: String,
    pub message: String,
}

impl TryFrom<RecordRow> for ExecutionRecord {
    type Error = SchedulerError;

    fn try_from(row: RecordRow) -> Result<Self> {
        Ok(ExecutionRecord {
            id: Uuid::parse_str(&row.id)
                .map_err(|e| SchedulerError::InvalidConfig(format!("invalid record ID: {}", e)))?,
            task_id: Uuid::parse_str(&row.task_id)
                .map_err(|e| SchedulerError::InvalidConfig(format!("invalid task ID: {}", e)))?,
            started_at: row.started_at,
            finished_at: row.finished_at,
            duration_secs: row.duration_secs,
            status: row.status.parse()?,
            message: row.message,
        })
    }
}

/// Internal row type for the joined record listing
#[derive(FromRow)]
pub(crate) struct RecordEntryRow {
    pub id: String,
    pub task_id: String,
    pub task_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub status: String,
    pub message: String,
}

impl TryFrom<RecordEntryRow> for RecordEntry {
    type Error = SchedulerError;

    fn try_from(row: RecordEntryRow) -> Result<Self> {
        let record = ExecutionRecord::try_from(RecordRow {
            id: row.id,
            task_id: row.task_id,
            started_at: row.started_at,
            finished_at: row.finished_at,
            duration_secs: row.duration_secs,
            status: row.status,
            message: row.message,
        })?;

        Ok(RecordEntry {
            task_name: row.task_name,
            record,
        })
    }
}
