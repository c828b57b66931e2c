/// Persistence contract
///
/// Business logic is written against these traits only. The SQLite
/// implementation lives in [`sqlite`]; tests can swap in narrow fakes.
///
/// Every lookup or mutation keyed by id that matches no row must return
/// [`StoreError::NotFound`], never an empty success, so callers can map it to
/// their own entity-specific not-found error.

pub mod sqlite;

use crate::auth::types::{User, UserRecord};
use crate::workflow::types::{
    Action, NewRunLog, RunLog, RunStatus, Trigger, Workflow, WorkflowRun,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use sqlite::SqliteStore;

/// Errors surfaced by store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    /// No row matched the key (or the owner/workflow scope)
    #[error("no matching row")]
    NotFound,

    /// A uniqueness constraint rejected the write
    #[error("conflict: {0}")]
    Conflict(String),

    /// The caller's deadline elapsed before the store answered
    #[error("store operation timed out")]
    Timeout,

    /// A stored value could not be decoded into its domain type
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// User persistence consumed by the auth service
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user. A duplicate email is [`StoreError::Conflict`].
    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User, StoreError>;

    async fn get_user_by_email(&self, email: &str) -> Result<UserRecord, StoreError>;

    async fn get_user_by_id(&self, id: &str) -> Result<User, StoreError>;
}

/// Workflow, trigger, action and run persistence consumed by the manager
///
/// Workflow operations are keyed by `(id, user_id)`; trigger and action
/// mutations by `(id, workflow_id)`.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn create_workflow(&self, user_id: &str, name: &str) -> Result<Workflow, StoreError>;

    async fn list_workflows_by_user(&self, user_id: &str) -> Result<Vec<Workflow>, StoreError>;

    async fn get_workflow(&self, id: &str, user_id: &str) -> Result<Workflow, StoreError>;

    async fn update_workflow(
        &self,
        id: &str,
        user_id: &str,
        name: &str,
        is_enabled: bool,
    ) -> Result<Workflow, StoreError>;

    /// Delete a workflow; children go with it
    async fn delete_workflow(&self, id: &str, user_id: &str) -> Result<(), StoreError>;

    async fn create_trigger(
        &self,
        workflow_id: &str,
        trigger_type: &str,
        config: &[u8],
    ) -> Result<Trigger, StoreError>;

    async fn list_triggers_by_workflow(&self, workflow_id: &str) -> Result<Vec<Trigger>, StoreError>;

    async fn update_trigger(
        &self,
        id: &str,
        workflow_id: &str,
        trigger_type: &str,
        config: &[u8],
    ) -> Result<Trigger, StoreError>;

    async fn delete_trigger(&self, id: &str, workflow_id: &str) -> Result<(), StoreError>;

    async fn create_action(
        &self,
        workflow_id: &str,
        action_type: &str,
        position: i32,
        config: &[u8],
    ) -> Result<Action, StoreError>;

    /// Actions ordered by position, equal positions in insertion order
    async fn list_actions_by_workflow(&self, workflow_id: &str) -> Result<Vec<Action>, StoreError>;

    async fn update_action(
        &self,
        id: &str,
        workflow_id: &str,
        action_type: &str,
        position: i32,
        config: &[u8],
    ) -> Result<Action, StoreError>;

    async fn delete_action(&self, id: &str, workflow_id: &str) -> Result<(), StoreError>;

    /// Insert a `pending` run with no start or finish time
    async fn create_run(&self, workflow_id: &str, trigger_type: &str) -> Result<WorkflowRun, StoreError>;

    async fn list_runs_by_workflow(&self, workflow_id: &str) -> Result<Vec<WorkflowRun>, StoreError>;

    async fn get_run(&self, id: &str, workflow_id: &str) -> Result<WorkflowRun, StoreError>;

    async fn list_run_logs(&self, run_id: &str) -> Result<Vec<RunLog>, StoreError>;
}

/// The poller's view of the store. Deliberately narrow and cross-tenant.
#[async_trait]
pub trait RunQueue: Send + Sync {
    /// Oldest pending runs first, at most `limit`
    async fn list_pending_runs(&self, limit: u32) -> Result<Vec<WorkflowRun>, StoreError>;

    /// `pending -> running`. A run that is no longer pending is
    /// [`StoreError::NotFound`].
    async fn start_run(&self, id: &str, started_at: DateTime<Utc>) -> Result<WorkflowRun, StoreError>;

    async fn list_actions_by_workflow(&self, workflow_id: &str) -> Result<Vec<Action>, StoreError>;

    async fn insert_run_log(&self, log: &NewRunLog) -> Result<RunLog, StoreError>;

    /// `running -> status`. A run that is not running is
    /// [`StoreError::NotFound`].
    async fn finish_run(
        &self,
        id: &str,
        status: RunStatus,
        finished_at: DateTime<Utc>,
    ) -> Result<WorkflowRun, StoreError>;
}

/// Database liveness check used by `/healthz`
#[async_trait]
pub trait Pinger: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;
}
