//! Taskbeat Core - Recurring Task Scheduler
//!
//! This crate provides the scheduling engine behind taskbeat, including:
//! - Cron: Next-occurrence evaluation for 5-field cron expressions
//! - Dependencies: Run gating on a prerequisite task's latest outcome,
//!   plus write-time cycle rejection
//! - Retry: Table-driven backoff with a bounded retry budget
//! - Execution: A pluggable executor trait invoked for every attempt
//! - Engine: The tick loop that picks up due tasks, guards concurrent
//!   runs, and persists outcomes
//! - Service: Validated task management for presentation layers
//! - Store: SQLite persistence for tasks and their execution history
//!
//! The engine evaluates each sweep against an explicit instant, so the
//! whole scheduling lifecycle can be driven deterministically:
//!
//! ```ignore
//! let store = Arc::new(TaskStore::from_path(Path::new("data/taskbeat.db")).await?);
//! let engine = Arc::new(SchedulerEngine::new(
//!     store.clone(),
//!     Arc::new(SimulatedExecutor::new()),
//!     SchedulerConfig::new(),
//! ));
//! let service = TaskService::new(store, engine.clone());
//!
//! service
//!     .create_task(ScheduledTask::new("nightly-etl", "0 3 * * *"))
//!     .await?;
//! engine.run(shutdown_token).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cron;
pub mod dependency;
pub mod engine;
pub mod error;
pub mod executor;
pub mod retry;
pub mod service;
pub mod store;
pub mod types;

pub use cron::CronSchedule;
pub use dependency::DependencyState;
pub use engine::{SchedulerConfig, SchedulerEngine};
pub use error::{Result as SchedulerResult, SchedulerError};
pub use executor::{SimulatedExecutor, TaskExecutor};
pub use service::TaskService;
pub use store::TaskStore;
pub use types::{
    ExecutionOutcome, ExecutionRecord, RecordEntry, RunKind, RunOutcome, ScheduledTask, TaskStats,
    TaskStatus, TaskUpdate,
};
