//! Scheduler execution engine
//!
//! Drives the recurring-task lifecycle:
//! - Periodic ticks that pick up due tasks
//! - Dependency gating before each run
//! - Atomic run acquisition so a task never executes twice concurrently
//! - Retry/backoff bookkeeping after each attempt
//! - Graceful shutdown support

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cron;
use crate::dependency::{self, DependencyState};
use crate::error::{Result, SchedulerError};
use crate::executor::TaskExecutor;
use crate::retry;
use crate::store::TaskStore;
use crate::types::{
    ExecutionOutcome, ExecutionRecord, RunKind, RunOutcome, ScheduledTask, TaskStatus,
};

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Seconds between due-task sweeps
    pub tick_interval_secs: u64,
    /// Upper bound on a single execution attempt, in seconds
    pub execution_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 10,
            execution_timeout_secs: 300,
        }
    }
}

impl SchedulerConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tick interval
    pub fn with_tick_interval(mut self, secs: u64) -> Self {
        self.tick_interval_secs = secs;
        self
    }

    /// Set the per-attempt execution timeout
    pub fn with_execution_timeout(mut self, secs: u64) -> Self {
        self.execution_timeout_secs = secs;
        self
    }
}

/// Scheduler engine for executing recurring tasks
pub struct SchedulerEngine {
    store: Arc<TaskStore>,
    executor: Arc<dyn TaskExecutor>,
    config: SchedulerConfig,
}

impl SchedulerEngine {
    /// Create a new scheduler engine
    pub fn new(
        store: Arc<TaskStore>,
        executor: Arc<dyn TaskExecutor>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            executor,
            config,
        }
    }

    /// Start the scheduler loop
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        info!("Scheduler engine starting");

        self.initialize_tasks().await?;

        let tick_interval = tokio::time::Duration::from_secs(self.config.tick_interval_secs);

        loop {
            tokio::select! {
                _ = tokio::time::sleep(tick_interval) => {
                    if let Err(e) = self.tick_at(Utc::now()).await {
                        error!("Scheduler tick failed: {}", e);
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Scheduler engine shutting down");
                    break;
                }
            }
        }

        info!("Scheduler engine stopped");
        Ok(())
    }

    /// Recover interrupted state and backfill missing run times on startup
    async fn initialize_tasks(&self) -> Result<()> {
        // a Running status cannot outlive the process that set it
        let recovered = self.store.recover_interrupted().await?;
        if recovered > 0 {
            warn!("Reset {} tasks left Running by an interrupted run", recovered);
        }

        let tasks = self.store.list_all_tasks().await?;
        let now = Utc::now();

        let mut enabled = 0usize;
        for task in tasks {
            if !task.enabled {
                continue;
            }
            enabled += 1;
            if task.next_run_time.is_none() {
                if let Some(next) = cron::next_run_or_stall(&task.cron_expression, now) {
                    self.store.backfill_next_run(task.id, next).await?;
                }
            }
        }

        info!("Initialized {} scheduled tasks", enabled);
        Ok(())
    }

    /// Run one scheduling sweep as of `now`.
    ///
    /// Enabled tasks split into two lanes: tasks whose next run time has
    /// arrived are executed, and the rest have any finished status folded
    /// back to Pending so the table always reflects "waiting for its slot".
    /// Returns the outcome of every run performed during the sweep.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Result<Vec<RunOutcome>> {
        let tasks = self.store.list_enabled_tasks().await?;

        let (due, waiting): (Vec<_>, Vec<_>) = tasks
            .into_iter()
            .partition(|task| matches!(task.next_run_time, Some(at) if at <= now));

        for task in &waiting {
            if let Err(e) = self.heal_pending(task).await {
                error!("Failed to reset task status: {}", e);
            }
        }

        if due.is_empty() {
            debug!("No tasks due for execution");
            return Ok(Vec::new());
        }

        debug!("Executing {} due tasks", due.len());

        let mut outcomes = Vec::with_capacity(due.len());
        for task in due {
            let task_id = task.id;
            match self.process_due_task(task, now).await {
                Ok(Some(outcome)) => outcomes.push(outcome),
                Ok(None) => {}
                Err(e) => error!("Task {} failed to process: {}", task_id, e),
            }
        }

        Ok(outcomes)
    }

    /// Fold a finished status back to Pending while the task waits.
    ///
    /// Pending and Running are left alone: Pending is already the resting
    /// state, and Running belongs to an execution still in flight. The
    /// store re-checks the current status, so a run acquired after this
    /// sweep took its snapshot keeps its Running marker. The snapshot
    /// match only skips statements for tasks already at rest.
    async fn heal_pending(&self, task: &ScheduledTask) -> Result<()> {
        match task.status {
            TaskStatus::Pending | TaskStatus::Running => Ok(()),
            _ => self.store.reset_waiting(task.id).await.map(|_| ()),
        }
    }

    /// Gate, acquire, and execute one due task
    async fn process_due_task(
        &self,
        task: ScheduledTask,
        now: DateTime<Utc>,
    ) -> Result<Option<RunOutcome>> {
        let state = self.dependency_state(&task).await?;
        if !state.is_runnable() {
            info!("Task '{}' skipped: {}", task.name, state);
            return Ok(None);
        }

        if !self.store.try_acquire_run(task.id, now).await? {
            debug!("Task '{}' already running, skipping", task.name);
            return Ok(None);
        }

        let outcome = self.execute_acquired(task.id, RunKind::Scheduled, now).await?;
        Ok(Some(outcome))
    }

    /// Evaluate the task's dependency gate from its dependency's run history
    async fn dependency_state(&self, task: &ScheduledTask) -> Result<DependencyState> {
        match task.dependency_id {
            None => Ok(DependencyState::Runnable),
            Some(dependency_id) => {
                let latest = self.store.latest_record_for(dependency_id).await?;
                Ok(dependency::evaluate(latest.as_ref()))
            }
        }
    }

    /// Execute a task whose run slot has already been acquired.
    ///
    /// The task is re-fetched so the retry bookkeeping sees the state the
    /// acquisition persisted. `now` anchors the rescheduling decision.
    async fn execute_acquired(
        &self,
        task_id: Uuid,
        kind: RunKind,
        now: DateTime<Utc>,
    ) -> Result<RunOutcome> {
        let task = self.store.get_task(task_id).await?;

        info!("Executing task '{}' ({})", task.name, task.id);

        let started_at = Utc::now();
        let outcome = self.execute_with_timeout(&task, kind).await;
        let finished_at = Utc::now();

        let decision = retry::evaluate(&task, outcome, kind, now);

        self.store
            .complete_run(
                task.id,
                decision.status,
                decision.retry_count,
                decision.next_run_time,
            )
            .await?;

        let record = ExecutionRecord::new(
            task.id,
            started_at,
            finished_at,
            decision.status,
            decision.message.clone(),
        );
        self.store.insert_record(&record).await?;

        info!("Task '{}' finished: {}", task.name, decision.message);

        Ok(RunOutcome {
            task_id: task.id,
            name: task.name,
            status: decision.status,
            message: decision.message,
            next_run_time: decision.next_run_time,
        })
    }

    /// Run the executor, treating an elapsed timeout as a failed attempt
    async fn execute_with_timeout(&self, task: &ScheduledTask, kind: RunKind) -> ExecutionOutcome {
        let limit = tokio::time::Duration::from_secs(self.config.execution_timeout_secs);
        match tokio::time::timeout(limit, self.executor.execute(task, kind)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    "Task '{}' timed out after {}s",
                    task.name, self.config.execution_timeout_secs
                );
                ExecutionOutcome::Failed
            }
        }
    }

    /// Execute a task immediately, outside its schedule.
    ///
    /// The dependency gate still applies, and a task already running
    /// cannot be triggered again. Disabled tasks can be run this way.
    pub async fn run_now(&self, task_id: Uuid) -> Result<RunOutcome> {
        let task = self.store.get_task(task_id).await?;

        let state = self.dependency_state(&task).await?;
        if !state.is_runnable() {
            return Err(SchedulerError::DependencyUnsatisfied(state));
        }

        let now = Utc::now();
        if !self.store.try_acquire_run(task.id, now).await? {
            return Err(SchedulerError::AlreadyRunning(task.id));
        }

        self.execute_acquired(task.id, RunKind::Manual, now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Executor that replays a queue of outcomes and records which tasks ran
    struct ScriptedExecutor {
        outcomes: Mutex<VecDeque<ExecutionOutcome>>,
        seen: Mutex<Vec<String>>,
    }

    impl ScriptedExecutor {
        fn with_outcomes(outcomes: &[ExecutionOutcome]) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.iter().copied().collect()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TaskExecutor for ScriptedExecutor {
        async fn execute(&self, task: &ScheduledTask, _kind: RunKind) -> ExecutionOutcome {
            self.seen.lock().unwrap().push(task.name.clone());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(ExecutionOutcome::Success)
        }
    }

    /// Executor that never finishes, for exercising the timeout guard
    struct SleepyExecutor;

    #[async_trait]
    impl TaskExecutor for SleepyExecutor {
        async fn execute(&self, _task: &ScheduledTask, _kind: RunKind) -> ExecutionOutcome {
            tokio::time::sleep(tokio::time::Duration::from_secs(3600)).await;
            ExecutionOutcome::Success
        }
    }

    struct TestContext {
        engine: SchedulerEngine,
        store: Arc<TaskStore>,
        executor: Arc<ScriptedExecutor>,
        _dir: TempDir,
    }

    async fn create_test_context(outcomes: &[ExecutionOutcome]) -> TestContext {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test_engine.db");
        let store = Arc::new(TaskStore::from_path(&path).await.unwrap());
        let executor = ScriptedExecutor::with_outcomes(outcomes);
        let engine = SchedulerEngine::new(
            store.clone(),
            executor.clone(),
            SchedulerConfig::new().with_tick_interval(1),
        );
        TestContext {
            engine,
            store,
            executor,
            _dir: dir,
        }
    }

    fn tick_instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 10, 5, 0).unwrap()
    }

    async fn create_due_task(ctx: &TestContext, name: &str) -> ScheduledTask {
        let mut task = ScheduledTask::new(name, "*/5 * * * *");
        task.next_run_time = Some(tick_instant());
        ctx.store.create_task(&task).await.unwrap();
        task
    }

    #[tokio::test]
    async fn test_tick_executes_due_task() {
        let ctx = create_test_context(&[ExecutionOutcome::Success]).await;
        let task = create_due_task(&ctx, "due").await;

        let now = tick_instant();
        let outcomes = ctx.engine.tick_at(now).await.unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, TaskStatus::Success);

        let task = ctx.store.get_task(task.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Success);
        assert_eq!(task.retry_count, 0);
        assert_eq!(task.last_run_time, Some(now));
        // next slot on the five-minute grid, strictly after the tick
        assert_eq!(
            task.next_run_time,
            Some(Utc.with_ymd_and_hms(2026, 3, 2, 10, 10, 0).unwrap())
        );

        let records = ctx.store.records_for_task(task.id, 10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, TaskStatus::Success);
    }

    #[tokio::test]
    async fn test_tick_skips_future_and_unscheduled_tasks() {
        let ctx = create_test_context(&[]).await;

        let mut future = ScheduledTask::new("future", "*/5 * * * *");
        future.next_run_time = Some(tick_instant() + Duration::minutes(5));
        ctx.store.create_task(&future).await.unwrap();

        let unscheduled = ScheduledTask::new("unscheduled", "*/5 * * * *");
        ctx.store.create_task(&unscheduled).await.unwrap();

        let outcomes = ctx.engine.tick_at(tick_instant()).await.unwrap();
        assert!(outcomes.is_empty());
        assert!(ctx.executor.seen().is_empty());
    }

    #[tokio::test]
    async fn test_failure_schedules_backoff_retry() {
        let ctx = create_test_context(&[ExecutionOutcome::Failed]).await;
        let task = create_due_task(&ctx, "flaky").await;

        let now = tick_instant();
        let outcomes = ctx.engine.tick_at(now).await.unwrap();
        assert_eq!(outcomes[0].status, TaskStatus::Failed);

        let task = ctx.store.get_task(task.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.retry_count, 1);
        // first backoff step is one second
        assert_eq!(task.next_run_time, Some(now + Duration::seconds(1)));
    }

    #[tokio::test]
    async fn test_retry_exhaustion_returns_to_cron() {
        let ctx = create_test_context(&[
            ExecutionOutcome::Failed,
            ExecutionOutcome::Failed,
            ExecutionOutcome::Failed,
        ])
        .await;

        let mut task = ScheduledTask::new("doomed", "*/5 * * * *").with_max_retries(2);
        task.next_run_time = Some(tick_instant());
        ctx.store.create_task(&task).await.unwrap();

        let mut now = tick_instant();
        for _ in 0..3 {
            let outcomes = ctx.engine.tick_at(now).await.unwrap();
            assert_eq!(outcomes.len(), 1);
            let refreshed = ctx.store.get_task(task.id).await.unwrap();
            now = refreshed.next_run_time.unwrap();
        }

        let task = ctx.store.get_task(task.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.retry_count, 2);
        // back on the cron grid instead of another backoff step
        assert_eq!(
            task.next_run_time,
            Some(Utc.with_ymd_and_hms(2026, 3, 2, 10, 10, 0).unwrap())
        );

        let records = ctx.store.records_for_task(task.id, 10).await.unwrap();
        assert_eq!(records.len(), 3);
        assert!(records[0].message.contains("exhausted"));
    }

    #[tokio::test]
    async fn test_tick_heals_finished_statuses() {
        let ctx = create_test_context(&[]).await;

        let mut waiting = ScheduledTask::new("waiting", "*/5 * * * *");
        waiting.status = TaskStatus::Success;
        waiting.next_run_time = Some(tick_instant() + Duration::minutes(5));
        ctx.store.create_task(&waiting).await.unwrap();

        ctx.engine.tick_at(tick_instant()).await.unwrap();

        let task = ctx.store.get_task(waiting.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_tick_leaves_running_status_alone() {
        let ctx = create_test_context(&[]).await;

        let mut in_flight = ScheduledTask::new("in-flight", "*/5 * * * *");
        in_flight.status = TaskStatus::Running;
        in_flight.next_run_time = Some(tick_instant() + Duration::minutes(5));
        ctx.store.create_task(&in_flight).await.unwrap();

        ctx.engine.tick_at(tick_instant()).await.unwrap();

        let task = ctx.store.get_task(in_flight.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn test_heal_spares_run_acquired_after_snapshot() {
        let ctx = create_test_context(&[]).await;

        let mut task = ScheduledTask::new("contended", "*/5 * * * *");
        task.status = TaskStatus::Success;
        task.next_run_time = Some(tick_instant() + Duration::minutes(5));
        ctx.store.create_task(&task).await.unwrap();

        // the sweep read this snapshot before the manual run was acquired
        let snapshot = ctx.store.get_task(task.id).await.unwrap();
        let acquired_at = tick_instant();
        assert!(ctx
            .store
            .try_acquire_run(task.id, acquired_at)
            .await
            .unwrap());

        ctx.engine.heal_pending(&snapshot).await.unwrap();

        let current = ctx.store.get_task(task.id).await.unwrap();
        assert_eq!(current.status, TaskStatus::Running);
        assert_eq!(current.last_run_time, Some(acquired_at));
        // the in-flight run still holds the slot against a second trigger
        assert!(!ctx
            .store
            .try_acquire_run(task.id, acquired_at)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_dependency_gate_blocks_never_run() {
        let ctx = create_test_context(&[]).await;

        let upstream = ScheduledTask::new("upstream", "*/5 * * * *");
        ctx.store.create_task(&upstream).await.unwrap();

        let mut downstream =
            ScheduledTask::new("downstream", "*/5 * * * *").with_dependency(upstream.id);
        downstream.next_run_time = Some(tick_instant());
        ctx.store.create_task(&downstream).await.unwrap();

        let outcomes = ctx.engine.tick_at(tick_instant()).await.unwrap();
        assert!(outcomes.is_empty());
        assert!(ctx.executor.seen().is_empty());

        // the task keeps its slot; nothing was consumed
        let task = ctx.store.get_task(downstream.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.next_run_time, Some(tick_instant()));
        assert!(ctx
            .store
            .records_for_task(downstream.id, 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_dependency_gate_blocks_failed_dependency() {
        let ctx = create_test_context(&[]).await;

        let upstream = ScheduledTask::new("upstream", "*/5 * * * *");
        ctx.store.create_task(&upstream).await.unwrap();
        let record = ExecutionRecord::new(
            upstream.id,
            tick_instant() - Duration::minutes(5),
            tick_instant() - Duration::minutes(4),
            TaskStatus::Failed,
            "boom",
        );
        ctx.store.insert_record(&record).await.unwrap();

        let mut downstream =
            ScheduledTask::new("downstream", "*/5 * * * *").with_dependency(upstream.id);
        downstream.next_run_time = Some(tick_instant());
        ctx.store.create_task(&downstream).await.unwrap();

        let outcomes = ctx.engine.tick_at(tick_instant()).await.unwrap();
        assert!(outcomes.is_empty());
        assert!(ctx.executor.seen().is_empty());
    }

    #[tokio::test]
    async fn test_dependency_gate_allows_after_success() {
        let ctx = create_test_context(&[ExecutionOutcome::Success]).await;

        let upstream = ScheduledTask::new("upstream", "*/5 * * * *");
        ctx.store.create_task(&upstream).await.unwrap();
        // older failure must not shadow the newer success
        for (minutes, status) in [(10, TaskStatus::Failed), (5, TaskStatus::Success)] {
            let record = ExecutionRecord::new(
                upstream.id,
                tick_instant() - Duration::minutes(minutes + 1),
                tick_instant() - Duration::minutes(minutes),
                status,
                "run",
            );
            ctx.store.insert_record(&record).await.unwrap();
        }

        let mut downstream =
            ScheduledTask::new("downstream", "*/5 * * * *").with_dependency(upstream.id);
        downstream.next_run_time = Some(tick_instant());
        ctx.store.create_task(&downstream).await.unwrap();

        let outcomes = ctx.engine.tick_at(tick_instant()).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(ctx.executor.seen(), vec!["downstream".to_string()]);
    }

    #[tokio::test]
    async fn test_running_task_not_reacquired() {
        let ctx = create_test_context(&[]).await;

        let task = create_due_task(&ctx, "held").await;
        assert!(ctx
            .store
            .try_acquire_run(task.id, tick_instant())
            .await
            .unwrap());

        let outcomes = ctx.engine.tick_at(tick_instant()).await.unwrap();
        assert!(outcomes.is_empty());
        assert!(ctx.executor.seen().is_empty());
    }

    #[tokio::test]
    async fn test_due_tasks_run_in_slot_order() {
        let ctx = create_test_context(&[]).await;

        let mut second = ScheduledTask::new("second", "*/5 * * * *");
        second.next_run_time = Some(tick_instant());
        ctx.store.create_task(&second).await.unwrap();

        let mut first = ScheduledTask::new("first", "*/5 * * * *");
        first.next_run_time = Some(tick_instant() - Duration::minutes(5));
        ctx.store.create_task(&first).await.unwrap();

        ctx.engine.tick_at(tick_instant()).await.unwrap();
        assert_eq!(
            ctx.executor.seen(),
            vec!["first".to_string(), "second".to_string()]
        );
    }

    #[tokio::test]
    async fn test_run_now_success() {
        let ctx = create_test_context(&[ExecutionOutcome::Success]).await;

        let task = ScheduledTask::new("manual", "*/5 * * * *");
        ctx.store.create_task(&task).await.unwrap();

        let outcome = ctx.engine.run_now(task.id).await.unwrap();
        assert_eq!(outcome.status, TaskStatus::Success);
        assert_eq!(outcome.name, "manual");

        let task = ctx.store.get_task(task.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Success);
        assert!(task.last_run_time.is_some());
    }

    #[tokio::test]
    async fn test_run_now_manual_retry_delay() {
        let ctx = create_test_context(&[ExecutionOutcome::Failed]).await;

        let task = ScheduledTask::new("manual-flaky", "*/5 * * * *");
        ctx.store.create_task(&task).await.unwrap();

        let before = Utc::now();
        let outcome = ctx.engine.run_now(task.id).await.unwrap();
        assert_eq!(outcome.status, TaskStatus::Failed);

        // manual runs retry on a fixed ten-second delay, not the backoff table
        let task = ctx.store.get_task(task.id).await.unwrap();
        assert_eq!(task.retry_count, 1);
        let next = task.next_run_time.unwrap();
        let delay = next - task.last_run_time.unwrap();
        assert_eq!(delay.num_seconds(), 10);
        assert!(next >= before + Duration::seconds(10));
    }

    #[tokio::test]
    async fn test_run_now_blocked_by_dependency() {
        let ctx = create_test_context(&[]).await;

        let upstream = ScheduledTask::new("upstream", "*/5 * * * *");
        ctx.store.create_task(&upstream).await.unwrap();
        let downstream =
            ScheduledTask::new("downstream", "*/5 * * * *").with_dependency(upstream.id);
        ctx.store.create_task(&downstream).await.unwrap();

        let result = ctx.engine.run_now(downstream.id).await;
        assert!(matches!(
            result,
            Err(SchedulerError::DependencyUnsatisfied(_))
        ));
        assert!(ctx
            .store
            .records_for_task(downstream.id, 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_run_now_missing_task() {
        let ctx = create_test_context(&[]).await;

        let result = ctx.engine.run_now(Uuid::new_v4()).await;
        assert!(matches!(result, Err(SchedulerError::TaskNotFound(_))));
    }

    #[tokio::test]
    async fn test_run_now_rejects_already_running() {
        let ctx = create_test_context(&[]).await;

        let mut task = ScheduledTask::new("busy", "*/5 * * * *");
        task.status = TaskStatus::Running;
        ctx.store.create_task(&task).await.unwrap();

        let result = ctx.engine.run_now(task.id).await;
        assert!(matches!(result, Err(SchedulerError::AlreadyRunning(_))));
    }

    #[tokio::test]
    async fn test_execution_timeout_counts_as_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test_engine.db");
        let store = Arc::new(TaskStore::from_path(&path).await.unwrap());
        let engine = SchedulerEngine::new(
            store.clone(),
            Arc::new(SleepyExecutor),
            SchedulerConfig::new().with_execution_timeout(0),
        );

        let task = ScheduledTask::new("stuck", "*/5 * * * *");
        store.create_task(&task).await.unwrap();

        let outcome = engine.run_now(task.id).await.unwrap();
        assert_eq!(outcome.status, TaskStatus::Failed);

        let task = store.get_task(task.id).await.unwrap();
        assert_eq!(task.retry_count, 1);
    }

    #[tokio::test]
    async fn test_run_recovers_interrupted_tasks_on_startup() {
        let ctx = create_test_context(&[]).await;

        let mut stuck = ScheduledTask::new("stuck", "*/5 * * * *");
        stuck.status = TaskStatus::Running;
        ctx.store.create_task(&stuck).await.unwrap();

        let unscheduled = ScheduledTask::new("unscheduled", "*/5 * * * *");
        ctx.store.create_task(&unscheduled).await.unwrap();

        // pre-cancelled token: the loop exits right after initialization
        let token = CancellationToken::new();
        token.cancel();
        ctx.engine.run(token).await.unwrap();

        let stuck = ctx.store.get_task(stuck.id).await.unwrap();
        assert_eq!(stuck.status, TaskStatus::Pending);

        let unscheduled = ctx.store.get_task(unscheduled.id).await.unwrap();
        assert!(unscheduled.next_run_time.is_some());
    }

    #[tokio::test]
    async fn test_unparseable_cron_leaves_task_unscheduled() {
        let ctx = create_test_context(&[ExecutionOutcome::Success]).await;

        // store-level writes skip cron validation, so a bad expression
        // can only surface when the schedule is next computed
        let mut task = ScheduledTask::new("broken", "not a cron");
        task.next_run_time = Some(tick_instant());
        ctx.store.create_task(&task).await.unwrap();

        let outcomes = ctx.engine.tick_at(tick_instant()).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, TaskStatus::Success);
        assert!(outcomes[0].next_run_time.is_none());

        let task = ctx.store.get_task(task.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Success);
        assert!(task.next_run_time.is_none());
    }
}
