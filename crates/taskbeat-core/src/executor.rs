//! Task execution
//!
//! The engine drives a pluggable [`TaskExecutor`]; this crate ships a
//! weighted-random reference implementation for demos. Production
//! deployments implement the trait with whatever actually performs the
//! task's declared work, and tests inject deterministic fakes.

use async_trait::async_trait;
use rand::Rng;

use crate::types::{ExecutionOutcome, RunKind, ScheduledTask};

/// Pluggable unit of work invoked for each execution attempt
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Perform the task's work and report the outcome
    async fn execute(&self, task: &ScheduledTask, kind: RunKind) -> ExecutionOutcome;
}

/// Reference executor drawing outcomes from a weighted distribution.
///
/// Scheduled runs succeed with probability 0.5, fail with 0.3, and request
/// a retry with 0.2. Manual runs are biased friendlier: 0.6 / 0.25 / 0.15.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedExecutor;

impl SimulatedExecutor {
    /// Create a new simulated executor
    pub fn new() -> Self {
        Self
    }

    fn weights(kind: RunKind) -> [(ExecutionOutcome, f64); 3] {
        match kind {
            RunKind::Scheduled => [
                (ExecutionOutcome::Success, 0.5),
                (ExecutionOutcome::Failed, 0.3),
                (ExecutionOutcome::Retrying, 0.2),
            ],
            RunKind::Manual => [
                (ExecutionOutcome::Success, 0.6),
                (ExecutionOutcome::Failed, 0.25),
                (ExecutionOutcome::Retrying, 0.15),
            ],
        }
    }
}

#[async_trait]
impl TaskExecutor for SimulatedExecutor {
    async fn execute(&self, _task: &ScheduledTask, kind: RunKind) -> ExecutionOutcome {
        let weights = Self::weights(kind);
        let roll: f64 = rand::thread_rng().gen();

        let mut cumulative = 0.0;
        for (outcome, weight) in weights {
            cumulative += weight;
            if roll < cumulative {
                return outcome;
            }
        }
        weights[weights.len() - 1].0
    }
}
