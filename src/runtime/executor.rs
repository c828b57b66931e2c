/// Action execution seam
///
/// The poller hands each started run's actions to an [`ActionExecutor`] and
/// records one run log per returned outcome. The run state machine never looks
/// at what the executor actually did beyond the success flag.

use crate::workflow::types::{Action, WorkflowRun};
use async_trait::async_trait;

/// Message recorded for every action handled by [`StubExecutor`]
pub const STUB_MESSAGE: &str = "action execution stubbed";

/// Result of attempting a single action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub action_id: String,
    /// Snapshot of the action's position at execution time
    pub action_position: i32,
    pub success: bool,
    pub message: String,
}

impl ActionOutcome {
    pub fn succeeded(action: &Action, message: impl Into<String>) -> Self {
        Self {
            action_id: action.id.clone(),
            action_position: action.position,
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(action: &Action, message: impl Into<String>) -> Self {
        Self {
            action_id: action.id.clone(),
            action_position: action.position,
            success: false,
            message: message.into(),
        }
    }
}

/// Executes the actions of one run
///
/// Implementations return exactly one outcome per action they attempted, in
/// the order attempted. Stopping early after a failure is allowed.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, run: &WorkflowRun, actions: &[Action]) -> Vec<ActionOutcome>;
}

/// Executor that performs nothing and reports every action as successful
#[derive(Debug, Default, Clone, Copy)]
pub struct StubExecutor;

#[async_trait]
impl ActionExecutor for StubExecutor {
    async fn execute(&self, run: &WorkflowRun, actions: &[Action]) -> Vec<ActionOutcome> {
        tracing::debug!("🧪 Stub executing {} actions for run {}", actions.len(), run.id);
        actions
            .iter()
            .map(|action| ActionOutcome::succeeded(action, STUB_MESSAGE))
            .collect()
    }
}
