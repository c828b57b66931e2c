/// Ownership-scoped workflow management
///
/// Every operation takes the authenticated user id and resolves the target
/// workflow through that user first. A workflow owned by someone else is
/// reported exactly like one that does not exist, and the same goes for its
/// triggers, actions and runs.

use crate::deadline::Deadline;
use crate::store::{StoreError, WorkflowStore};
use crate::workflow::types::{Action, RunLog, Trigger, Workflow, WorkflowRun};
use std::sync::Arc;
use thiserror::Error;
use tracing::Span;

/// Trigger type recorded when a run is enqueued without one
pub const DEFAULT_TRIGGER_TYPE: &str = "manual";

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow not found")]
    NotFound,

    #[error("trigger not found")]
    TriggerNotFound,

    #[error("action not found")]
    ActionNotFound,

    #[error("run not found")]
    RunNotFound,

    #[error(transparent)]
    Store(StoreError),
}

impl WorkflowError {
    /// Map a store error, turning `NotFound` into `not_found`
    fn from_store(err: StoreError, not_found: WorkflowError) -> Self {
        match err {
            StoreError::NotFound => not_found,
            other => WorkflowError::Store(other),
        }
    }
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        WorkflowError::Store(err)
    }
}

/// Workflow, trigger, action and run operations on behalf of a user
pub struct WorkflowManager {
    store: Arc<dyn WorkflowStore>,
    span: Span,
}

impl WorkflowManager {
    /// Create a manager logging under `span`
    pub fn new(store: Arc<dyn WorkflowStore>, span: Span) -> Self {
        Self { store, span }
    }

    // ---- workflows ----

    pub async fn create_workflow(&self, deadline: Deadline, user_id: &str, name: &str) -> Result<Workflow, WorkflowError> {
        let workflow = deadline.run(self.store.create_workflow(user_id, name)).await?;
        tracing::info!(parent: &self.span, "📝 Created workflow {} for user {}", workflow.id, user_id);
        Ok(workflow)
    }

    /// All workflows of `user_id`, newest first
    pub async fn list_workflows(&self, deadline: Deadline, user_id: &str) -> Result<Vec<Workflow>, WorkflowError> {
        Ok(deadline.run(self.store.list_workflows_by_user(user_id)).await?)
    }

    /// Fetch a workflow owned by `user_id`
    pub async fn get_workflow(&self, deadline: Deadline, user_id: &str, id: &str) -> Result<Workflow, WorkflowError> {
        deadline
            .run(self.store.get_workflow(id, user_id))
            .await
            .map_err(|e| WorkflowError::from_store(e, WorkflowError::NotFound))
    }

    pub async fn update_workflow(
        &self,
        deadline: Deadline,
        user_id: &str,
        id: &str,
        name: &str,
        is_enabled: bool,
    ) -> Result<Workflow, WorkflowError> {
        let workflow = deadline
            .run(self.store.update_workflow(id, user_id, name, is_enabled))
            .await
            .map_err(|e| WorkflowError::from_store(e, WorkflowError::NotFound))?;
        tracing::info!(parent: &self.span, "✏️ Updated workflow {} (enabled: {})", workflow.id, workflow.is_enabled);
        Ok(workflow)
    }

    /// Delete a workflow together with its triggers, actions, runs and logs
    pub async fn delete_workflow(&self, deadline: Deadline, user_id: &str, id: &str) -> Result<(), WorkflowError> {
        deadline
            .run(self.store.delete_workflow(id, user_id))
            .await
            .map_err(|e| WorkflowError::from_store(e, WorkflowError::NotFound))?;
        tracing::info!(parent: &self.span, "🗑️ Deleted workflow {}", id);
        Ok(())
    }

    // ---- triggers ----

    pub async fn create_trigger(
        &self,
        deadline: Deadline,
        user_id: &str,
        workflow_id: &str,
        trigger_type: &str,
        config: &[u8],
    ) -> Result<Trigger, WorkflowError> {
        let workflow = self.get_workflow(deadline, user_id, workflow_id).await?;
        let trigger = deadline
            .run(self.store.create_trigger(&workflow.id, trigger_type, config))
            .await?;
        tracing::info!(parent: &self.span, "⚡ Added {} trigger {} to workflow {}", trigger.trigger_type, trigger.id, workflow.id);
        Ok(trigger)
    }

    pub async fn list_triggers(&self, deadline: Deadline, user_id: &str, workflow_id: &str) -> Result<Vec<Trigger>, WorkflowError> {
        let workflow = self.get_workflow(deadline, user_id, workflow_id).await?;
        Ok(deadline.run(self.store.list_triggers_by_workflow(&workflow.id)).await?)
    }

    pub async fn update_trigger(
        &self,
        deadline: Deadline,
        user_id: &str,
        workflow_id: &str,
        trigger_id: &str,
        trigger_type: &str,
        config: &[u8],
    ) -> Result<Trigger, WorkflowError> {
        let workflow = self.get_workflow(deadline, user_id, workflow_id).await?;
        deadline
            .run(self.store.update_trigger(trigger_id, &workflow.id, trigger_type, config))
            .await
            .map_err(|e| WorkflowError::from_store(e, WorkflowError::TriggerNotFound))
    }

    pub async fn delete_trigger(
        &self,
        deadline: Deadline,
        user_id: &str,
        workflow_id: &str,
        trigger_id: &str,
    ) -> Result<(), WorkflowError> {
        let workflow = self.get_workflow(deadline, user_id, workflow_id).await?;
        deadline
            .run(self.store.delete_trigger(trigger_id, &workflow.id))
            .await
            .map_err(|e| WorkflowError::from_store(e, WorkflowError::TriggerNotFound))
    }

    // ---- actions ----

    /// Add an action. `position` is stored as given; duplicates and gaps are allowed.
    pub async fn create_action(
        &self,
        deadline: Deadline,
        user_id: &str,
        workflow_id: &str,
        action_type: &str,
        position: i32,
        config: &[u8],
    ) -> Result<Action, WorkflowError> {
        let workflow = self.get_workflow(deadline, user_id, workflow_id).await?;
        let action = deadline
            .run(self.store.create_action(&workflow.id, action_type, position, config))
            .await?;
        tracing::info!(parent: &self.span, "🔧 Added {} action {} at position {} to workflow {}", action.action_type, action.id, action.position, workflow.id);
        Ok(action)
    }

    /// Actions ordered by position, ties in insertion order
    pub async fn list_actions(&self, deadline: Deadline, user_id: &str, workflow_id: &str) -> Result<Vec<Action>, WorkflowError> {
        let workflow = self.get_workflow(deadline, user_id, workflow_id).await?;
        Ok(deadline.run(self.store.list_actions_by_workflow(&workflow.id)).await?)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update_action(
        &self,
        deadline: Deadline,
        user_id: &str,
        workflow_id: &str,
        action_id: &str,
        action_type: &str,
        position: i32,
        config: &[u8],
    ) -> Result<Action, WorkflowError> {
        let workflow = self.get_workflow(deadline, user_id, workflow_id).await?;
        deadline
            .run(self.store.update_action(action_id, &workflow.id, action_type, position, config))
            .await
            .map_err(|e| WorkflowError::from_store(e, WorkflowError::ActionNotFound))
    }

    pub async fn delete_action(
        &self,
        deadline: Deadline,
        user_id: &str,
        workflow_id: &str,
        action_id: &str,
    ) -> Result<(), WorkflowError> {
        let workflow = self.get_workflow(deadline, user_id, workflow_id).await?;
        deadline
            .run(self.store.delete_action(action_id, &workflow.id))
            .await
            .map_err(|e| WorkflowError::from_store(e, WorkflowError::ActionNotFound))
    }

    // ---- runs ----

    /// Queue a pending run. An empty `trigger_type` becomes [`DEFAULT_TRIGGER_TYPE`].
    pub async fn enqueue_run(
        &self,
        deadline: Deadline,
        user_id: &str,
        workflow_id: &str,
        trigger_type: &str,
    ) -> Result<WorkflowRun, WorkflowError> {
        let workflow = self.get_workflow(deadline, user_id, workflow_id).await?;
        let trigger_type = match trigger_type.trim() {
            "" => DEFAULT_TRIGGER_TYPE,
            t => t,
        };

        let run = deadline.run(self.store.create_run(&workflow.id, trigger_type)).await?;
        tracing::info!(parent: &self.span, "📥 Enqueued run {} for workflow {} ({})", run.id, workflow.id, run.trigger_type);
        Ok(run)
    }

    pub async fn list_runs(&self, deadline: Deadline, user_id: &str, workflow_id: &str) -> Result<Vec<WorkflowRun>, WorkflowError> {
        let workflow = self.get_workflow(deadline, user_id, workflow_id).await?;
        Ok(deadline.run(self.store.list_runs_by_workflow(&workflow.id)).await?)
    }

    /// Per-action outcomes recorded for one run of the workflow
    pub async fn list_run_logs(
        &self,
        deadline: Deadline,
        user_id: &str,
        workflow_id: &str,
        run_id: &str,
    ) -> Result<Vec<RunLog>, WorkflowError> {
        let workflow = self.get_workflow(deadline, user_id, workflow_id).await?;
        let run = deadline
            .run(self.store.get_run(run_id, &workflow.id))
            .await
            .map_err(|e| WorkflowError::from_store(e, WorkflowError::RunNotFound))?;
        Ok(deadline.run(self.store.list_run_logs(&run.id)).await?)
    }
}
