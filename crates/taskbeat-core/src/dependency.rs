//! Dependency gating and cycle detection
//!
//! The run-time gate is shallow: it looks at the immediate dependency's
//! most recent execution record and nothing further up the chain. Cycle
//! detection at write time is the only place the full ancestor chain is
//! walked.

use std::collections::HashMap;
use std::fmt;

use uuid::Uuid;

use crate::error::{Result, SchedulerError};
use crate::types::{ExecutionRecord, TaskStatus};

/// Outcome of the dependency gate for one task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyState {
    /// No dependency, or the dependency's latest run succeeded
    Runnable,
    /// The dependency has no execution record yet
    BlockedNeverRun,
    /// The dependency's latest record finished with a non-success status
    BlockedNotSuccessful(TaskStatus),
}

impl DependencyState {
    /// Whether the gate allows execution
    pub fn is_runnable(&self) -> bool {
        matches!(self, DependencyState::Runnable)
    }
}

impl fmt::Display for DependencyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyState::Runnable => write!(f, "runnable"),
            DependencyState::BlockedNeverRun => write!(f, "dependency has never run"),
            DependencyState::BlockedNotSuccessful(status) => {
                write!(f, "dependency last finished with status {}", status)
            }
        }
    }
}

/// Evaluate the gate from the dependency's most recent record.
///
/// Callers resolve the "no dependency" case themselves; this sees only
/// what the store returned for the dependency task.
pub fn evaluate(latest: Option<&ExecutionRecord>) -> DependencyState {
    match latest {
        None => DependencyState::BlockedNeverRun,
        Some(record) if record.status == TaskStatus::Success => DependencyState::Runnable,
        Some(record) => DependencyState::BlockedNotSuccessful(record.status),
    }
}

/// Verify that linking `task_id` to `dependency_id` keeps the graph acyclic.
///
/// Walks the ancestor chain through the id -> dependency index. The walk is
/// bounded by the index size, so a pre-existing loop elsewhere in the table
/// surfaces as an error instead of spinning.
pub fn check_acyclic(
    task_id: Uuid,
    dependency_id: Option<Uuid>,
    index: &HashMap<Uuid, Option<Uuid>>,
) -> Result<()> {
    let mut current = dependency_id;
    let mut steps = 0;

    while let Some(ancestor) = current {
        if ancestor == task_id {
            return Err(SchedulerError::CircularDependency(task_id));
        }
        steps += 1;
        if steps > index.len() {
            return Err(SchedulerError::CircularDependency(task_id));
        }
        current = index.get(&ancestor).copied().flatten();
    }

    Ok(())
}
