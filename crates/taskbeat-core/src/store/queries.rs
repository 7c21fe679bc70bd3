use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::TaskStore;
use crate::error::{Result, SchedulerError};
use crate::types::{
    ExecutionRecord, RecordEntry, RecordEntryRow, RecordRow, ScheduledTask, TaskRow, TaskStats,
    TaskStatus,
};

impl TaskStore {
    /// Create a new task
    pub async fn create_task(&self, task: &ScheduledTask) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, name, task_type, cron_expression, dependency_id,
                status, enabled, retry_count, max_retries,
                last_run_time, next_run_time, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(task.id.to_string())
        .bind(&task.name)
        .bind(&task.task_type)
        .bind(&task.cron_expression)
        .bind(task.dependency_id.map(|id| id.to_string()))
        .bind(task.status.as_str())
        .bind(task.enabled)
        .bind(task.retry_count)
        .bind(task.max_retries)
        .bind(task.last_run_time)
        .bind(task.next_run_time)
        .bind(task.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a task by ID
    pub async fn get_task(&self, id: Uuid) -> Result<ScheduledTask> {
        let row: TaskRow = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(SchedulerError::TaskNotFound(id))?;

        row.try_into()
    }

    /// Save a task's definition and schedule.
    ///
    /// Run bookkeeping (status, retry count, last run time) is owned by
    /// the run lifecycle operations and is never written here.
    pub async fn update_definition(&self, task: &ScheduledTask) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE tasks SET
                name = ?, task_type = ?, cron_expression = ?, dependency_id = ?,
                enabled = ?, max_retries = ?, next_run_time = ?
            WHERE id = ?
            "#,
        )
        .bind(&task.name)
        .bind(&task.task_type)
        .bind(&task.cron_expression)
        .bind(task.dependency_id.map(|id| id.to_string()))
        .bind(task.enabled)
        .bind(task.max_retries)
        .bind(task.next_run_time)
        .bind(task.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SchedulerError::TaskNotFound(task.id));
        }

        Ok(())
    }

    /// Set the enabled flag, touching no other column
    pub async fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<()> {
        let result = sqlx::query("UPDATE tasks SET enabled = ? WHERE id = ?")
            .bind(enabled)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(SchedulerError::TaskNotFound(id));
        }

        Ok(())
    }

    /// Delete a task together with its execution records, detaching any
    /// tasks that depended on it
    pub async fn delete_task(&self, id: Uuid) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SchedulerError::Transaction(e.to_string()))?;

        sqlx::query("UPDATE tasks SET dependency_id = NULL WHERE dependency_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM execution_records WHERE task_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(SchedulerError::TaskNotFound(id));
        }

        tx.commit()
            .await
            .map_err(|e| SchedulerError::Transaction(e.to_string()))?;

        Ok(())
    }

    /// List all tasks, newest first
    pub async fn list_all_tasks(&self) -> Result<Vec<ScheduledTask>> {
        let rows: Vec<TaskRow> = sqlx::query_as("SELECT * FROM tasks ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// List all enabled tasks ordered by next run time
    pub async fn list_enabled_tasks(&self) -> Result<Vec<ScheduledTask>> {
        let rows: Vec<TaskRow> =
            sqlx::query_as("SELECT * FROM tasks WHERE enabled = TRUE ORDER BY next_run_time ASC")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Get enabled tasks due at or before `until`, soonest first
    pub async fn get_due_tasks(&self, until: DateTime<Utc>) -> Result<Vec<ScheduledTask>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            r#"
            SELECT * FROM tasks
            WHERE enabled = TRUE AND next_run_time IS NOT NULL AND next_run_time <= ?
            ORDER BY next_run_time ASC
            "#,
        )
        .bind(until)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Atomically move a task into Running and stamp its last run time.
    ///
    /// Returns false when another caller already holds the running slot
    /// (or the task no longer exists). Losers must skip, not retry.
    pub async fn try_acquire_run(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE tasks SET status = ?, last_run_time = ? WHERE id = ? AND status != ?",
        )
        .bind(TaskStatus::Running.as_str())
        .bind(now)
        .bind(id.to_string())
        .bind(TaskStatus::Running.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Write the outcome of a finished run: status, retry counter, and
    /// next scheduled time. Every other column is left untouched.
    pub async fn complete_run(
        &self,
        id: Uuid,
        status: TaskStatus,
        retry_count: i32,
        next_run_time: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE tasks SET status = ?, retry_count = ?, next_run_time = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(retry_count)
        .bind(next_run_time)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SchedulerError::TaskNotFound(id));
        }

        Ok(())
    }

    /// Fold a finished status back to Pending.
    ///
    /// Guarded on the row's current status: Pending is already the
    /// resting state and Running belongs to an execution in flight, so
    /// both stay untouched even when the caller holds a stale snapshot.
    /// Returns whether a reset happened.
    pub async fn reset_waiting(&self, id: Uuid) -> Result<bool> {
        let result =
            sqlx::query("UPDATE tasks SET status = ? WHERE id = ? AND status NOT IN (?, ?)")
                .bind(TaskStatus::Pending.as_str())
                .bind(id.to_string())
                .bind(TaskStatus::Pending.as_str())
                .bind(TaskStatus::Running.as_str())
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Fold every Running task back to Pending, returning how many
    /// changed. Meant for startup, before any execution is in flight.
    pub async fn recover_interrupted(&self) -> Result<u64> {
        let result = sqlx::query("UPDATE tasks SET status = ? WHERE status = ?")
            .bind(TaskStatus::Pending.as_str())
            .bind(TaskStatus::Running.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Schedule a task that has no next run time yet. Guarded on the
    /// slot still being empty; returns whether the write happened.
    pub async fn backfill_next_run(&self, id: Uuid, next: DateTime<Utc>) -> Result<bool> {
        let result =
            sqlx::query("UPDATE tasks SET next_run_time = ? WHERE id = ? AND next_run_time IS NULL")
                .bind(next)
                .bind(id.to_string())
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Append one execution record
    pub async fn insert_record(&self, record: &ExecutionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO execution_records (
                id, task_id, started_at, finished_at, duration_secs, status, message
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.task_id.to_string())
        .bind(record.started_at)
        .bind(record.finished_at)
        .bind(record.duration_secs)
        .bind(record.status.as_str())
        .bind(&record.message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Most recent record for a task by finish time, if any
    pub async fn latest_record_for(&self, task_id: Uuid) -> Result<Option<ExecutionRecord>> {
        let row: Option<RecordRow> = sqlx::query_as(
            r#"
            SELECT id, task_id, started_at, finished_at, duration_secs, status, message
            FROM execution_records
            WHERE task_id = ?
            ORDER BY finished_at DESC
            LIMIT 1
            "#,
        )
        .bind(task_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into()).transpose()
    }

    /// Recent records for one task, newest first
    pub async fn records_for_task(
        &self,
        task_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ExecutionRecord>> {
        let rows: Vec<RecordRow> = sqlx::query_as(
            r#"
            SELECT id, task_id, started_at, finished_at, duration_secs, status, message
            FROM execution_records
            WHERE task_id = ?
            ORDER BY started_at DESC
            LIMIT ?
            "#,
        )
        .bind(task_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Recent records across all tasks with their task names, newest first
    pub async fn list_records(&self, limit: i64) -> Result<Vec<RecordEntry>> {
        let rows: Vec<RecordEntryRow> = sqlx::query_as(
            r#"
            SELECT r.id, r.task_id, t.name AS task_name, r.started_at, r.finished_at,
                   r.duration_secs, r.status, r.message
            FROM execution_records r
            JOIN tasks t ON t.id = r.task_id
            ORDER BY r.started_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Snapshot of every task's dependency link, for cycle checks
    pub async fn dependency_index(&self) -> Result<HashMap<Uuid, Option<Uuid>>> {
        let rows: Vec<(String, Option<String>)> =
            sqlx::query_as("SELECT id, dependency_id FROM tasks")
                .fetch_all(&self.pool)
                .await?;

        let mut index = HashMap::with_capacity(rows.len());
        for (id, dependency_id) in rows {
            let id = Uuid::parse_str(&id)
                .map_err(|e| SchedulerError::InvalidConfig(format!("invalid task ID: {}", e)))?;
            let dependency_id = dependency_id
                .map(|d| Uuid::parse_str(&d))
                .transpose()
                .map_err(|e| {
                    SchedulerError::InvalidConfig(format!("invalid dependency ID: {}", e))
                })?;
            index.insert(id, dependency_id);
        }

        Ok(index)
    }

    /// Aggregate statistics as of `now`
    pub async fn stats(&self, now: DateTime<Utc>) -> Result<TaskStats> {
        let total_tasks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks")
            .fetch_one(&self.pool)
            .await?;

        let counts: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM execution_records GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut stats = TaskStats {
            total_tasks,
            success_records: 0,
            failed_records: 0,
            retrying_records: 0,
            pending_records: 0,
            next_upcoming_run: None,
        };
        for (status, count) in counts {
            match status.parse::<TaskStatus>()? {
                TaskStatus::Success => stats.success_records = count,
                TaskStatus::Failed => stats.failed_records = count,
                TaskStatus::Retrying => stats.retrying_records = count,
                TaskStatus::Pending => stats.pending_records = count,
                TaskStatus::Running => {}
            }
        }

        stats.next_upcoming_run = sqlx::query_scalar(
            "SELECT MIN(next_run_time) FROM tasks WHERE enabled = TRUE AND next_run_time > ?",
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }
}
