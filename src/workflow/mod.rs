/// Workflow Management Layer
///
/// Domain types for workflows and their triggers, actions, runs and run logs,
/// plus the manager that performs every operation within a user's tenant scope.

// Core workflow type definitions
pub mod types;

// Ownership-scoped CRUD and run enqueueing
pub mod manager;

// Re-export commonly used types
pub use manager::{WorkflowError, WorkflowManager, DEFAULT_TRIGGER_TYPE};
pub use types::{Action, NewRunLog, RunLog, RunStatus, Trigger, Workflow, WorkflowRun};
