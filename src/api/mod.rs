/// HTTP API Layer
///
/// This module provides the REST endpoints of the PotaFlow service:
/// - Account registration, login and the current-user lookup
/// - Workflow CRUD and run enqueueing, scoped to the caller
/// - Trigger and action management under a workflow
///
/// Everything except `/auth/*` and `/healthz` sits behind [`auth::require_auth`].

use crate::auth::AuthService;
use crate::deadline::Deadline;
use crate::store::Pinger;
use crate::workflow::WorkflowManager;
use std::sync::Arc;
use std::time::Duration;

// Error type shared by all handlers
pub mod error;

// Register, login, me and the bearer-token middleware
pub mod auth;

// Workflow CRUD and runs
pub mod workflows;

// Triggers and actions
pub mod components;

pub use error::ApiError;

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub workflows: Arc<WorkflowManager>,
    /// Database liveness for `/healthz`
    pub health: Arc<dyn Pinger>,
    /// Deadline applied to each request's store calls
    pub request_timeout: Duration,
}

impl AppState {
    /// Fresh deadline for the current request
    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.request_timeout)
    }
}
