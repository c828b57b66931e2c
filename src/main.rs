/// PotaFlow API server
///
/// Loads configuration from the environment and serves the HTTP API:
/// - Account endpoints at /auth/* and /me
/// - Workflow, trigger, action and run endpoints at /api/workflows/*
/// - Health check at /healthz
///
/// Queued runs are processed by the separate `potaflow-worker` binary.

use potaflow::{config::Config, server::{init_tracing, start_server}};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env()?;
    start_server(config).await?;

    Ok(())
}
