//! Transport-agnostic task management operations
//!
//! Everything a presentation layer needs to manage the task table:
//! validated create/update, enable toggling, deletion, manual triggering,
//! execution history, and aggregate statistics. Scheduling itself lives
//! in [`crate::engine::SchedulerEngine`]; this layer owns the write-time
//! validation rules (cron syntax, dependency existence, cycle rejection).

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::cron::CronSchedule;
use crate::dependency;
use crate::engine::SchedulerEngine;
use crate::error::Result;
use crate::store::TaskStore;
use crate::types::{
    ExecutionRecord, RecordEntry, RunOutcome, ScheduledTask, TaskStats, TaskStatus, TaskUpdate,
};

/// Validated task management facade over the store and engine
pub struct TaskService {
    store: Arc<TaskStore>,
    engine: Arc<SchedulerEngine>,
}

impl TaskService {
    /// Create a new service
    pub fn new(store: Arc<TaskStore>, engine: Arc<SchedulerEngine>) -> Self {
        Self { store, engine }
    }

    /// Validate and persist a new task.
    ///
    /// The cron expression is parsed eagerly and the first run is scheduled
    /// from the current time. A declared dependency must exist and must not
    /// introduce a cycle. Status and retry count are normalized regardless
    /// of what the caller built.
    pub async fn create_task(&self, mut task: ScheduledTask) -> Result<ScheduledTask> {
        let schedule = CronSchedule::parse(&task.cron_expression)?;
        if let Some(dependency_id) = task.dependency_id {
            self.check_dependency(task.id, dependency_id).await?;
        }

        task.status = TaskStatus::Pending;
        task.retry_count = 0;
        task.next_run_time = Some(schedule.next_after(Utc::now())?);

        self.store.create_task(&task).await?;
        info!("Created task '{}' ({})", task.name, task.id);
        Ok(task)
    }

    /// Apply a partial update to an existing task.
    ///
    /// The next run time is recomputed only when the cron expression
    /// actually changed or when the task has no scheduled run; otherwise the
    /// current slot is kept. Dependency changes re-run cycle detection.
    /// Validation failures leave the stored task untouched. Run bookkeeping
    /// (status, retry count, last run time) is never written from here,
    /// even while an execution holds the task's run slot.
    pub async fn update_task(&self, task_id: Uuid, update: TaskUpdate) -> Result<ScheduledTask> {
        let mut task = self.store.get_task(task_id).await?;

        let mut cron_changed = false;
        if let Some(name) = update.name {
            task.name = name;
        }
        if let Some(task_type) = update.task_type {
            task.task_type = task_type;
        }
        if let Some(expression) = update.cron_expression {
            if expression != task.cron_expression {
                task.cron_expression = expression;
                cron_changed = true;
            }
        }
        if let Some(dependency_id) = update.dependency_id {
            if let Some(new_dependency) = dependency_id {
                self.check_dependency(task.id, new_dependency).await?;
            }
            task.dependency_id = dependency_id;
        }
        if let Some(enabled) = update.enabled {
            task.enabled = enabled;
        }
        if let Some(max_retries) = update.max_retries {
            task.max_retries = max_retries;
        }

        if cron_changed || task.next_run_time.is_none() {
            let schedule = CronSchedule::parse(&task.cron_expression)?;
            task.next_run_time = Some(schedule.next_after(Utc::now())?);
        }

        self.store.update_definition(&task).await?;
        Ok(task)
    }

    /// Flip the enabled flag, touching nothing else
    pub async fn toggle_task(&self, task_id: Uuid) -> Result<ScheduledTask> {
        let mut task = self.store.get_task(task_id).await?;
        task.enabled = !task.enabled;
        self.store.set_enabled(task.id, task.enabled).await?;
        info!(
            "Task '{}' {}",
            task.name,
            if task.enabled { "enabled" } else { "disabled" }
        );
        Ok(task)
    }

    /// Delete a task along with its execution history
    pub async fn delete_task(&self, task_id: Uuid) -> Result<()> {
        self.store.delete_task(task_id).await?;
        info!("Deleted task {}", task_id);
        Ok(())
    }

    /// Fetch a single task by id
    pub async fn get_task(&self, task_id: Uuid) -> Result<ScheduledTask> {
        self.store.get_task(task_id).await
    }

    /// List every task, newest first
    pub async fn list_tasks(&self) -> Result<Vec<ScheduledTask>> {
        self.store.list_all_tasks().await
    }

    /// Execute a task immediately, subject to the dependency gate
    pub async fn trigger_task(&self, task_id: Uuid) -> Result<RunOutcome> {
        self.engine.run_now(task_id).await
    }

    /// Recent execution records across all tasks, newest first
    pub async fn records(&self, limit: i64) -> Result<Vec<RecordEntry>> {
        self.store.list_records(limit).await
    }

    /// Recent execution records for one task, newest first
    pub async fn records_for_task(
        &self,
        task_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ExecutionRecord>> {
        self.store.records_for_task(task_id, limit).await
    }

    /// Aggregate counters over tasks and their history
    pub async fn stats(&self) -> Result<TaskStats> {
        self.store.stats(Utc::now()).await
    }

    /// Reject dangling and cyclic dependency links
    async fn check_dependency(&self, task_id: Uuid, dependency_id: Uuid) -> Result<()> {
        self.store.get_task(dependency_id).await?;
        let index = self.store.dependency_index().await?;
        dependency::check_acyclic(task_id, Some(dependency_id), &index)
    }
}
