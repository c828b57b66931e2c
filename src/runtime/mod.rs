/// Run Execution Runtime
///
/// Background processing of queued workflow runs:
/// - Polling pending runs and driving them through their lifecycle
/// - The pluggable action executor seam

// Interval poller that claims, executes and finishes runs
pub mod poller;

// Action executor trait and the stub implementation
pub mod executor;

// Re-export main types
pub use executor::{ActionExecutor, ActionOutcome, StubExecutor};
pub use poller::{Poller, PollerConfig, TickSummary};
