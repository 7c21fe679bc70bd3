//! Error types for taskbeat-core

use uuid::Uuid;

use crate::dependency::DependencyState;

/// Result type for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Scheduler error types
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Transaction or migration failure
    #[error("transaction error: {0}")]
    Transaction(String),
    /// Cron expression failed to parse or evaluate
    #[error("invalid cron expression {expression:?}: {reason}")]
    InvalidCronExpression {
        /// The offending expression
        expression: String,
        /// Parser diagnostic
        reason: String,
    },
    /// Task not found
    #[error("task not found: {0}")]
    TaskNotFound(Uuid),
    /// The dependency chain loops back to the task
    #[error("circular dependency: task {0} would depend on itself")]
    CircularDependency(Uuid),
    /// The dependency gate rejected an on-demand run
    #[error("dependency unsatisfied: {0}")]
    DependencyUnsatisfied(DependencyState),
    /// Another caller holds the running slot
    #[error("task {0} is already running")]
    AlreadyRunning(Uuid),
    /// Invalid stored data or configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
