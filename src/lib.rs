/// PotaFlow: multi-tenant workflow automation backend
///
/// Users own workflows made of triggers and actions; runs are queued through
/// the HTTP API and advanced by a background poller.

// Core configuration and setup
pub mod config;

// Caller-supplied deadlines for store calls
pub mod deadline;

// Accounts: password hashing, session tokens, register/login
pub mod auth;

// Persistence traits and the SQLite implementation
pub mod store;

// Workflow domain types and the ownership-scoped manager
pub mod workflow;

// Run poller and the action executor seam
pub mod runtime;

// HTTP API layer - REST endpoints and auth middleware
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use auth::{AuthError, AuthService};
pub use deadline::Deadline;
pub use server::{create_app, start_server};
pub use store::{SqliteStore, StoreError};
pub use workflow::{Workflow, WorkflowError, WorkflowManager};
