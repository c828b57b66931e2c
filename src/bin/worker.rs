/// PotaFlow background worker
///
/// Polls the shared database for pending runs and drives them to completion
/// with the stub executor. Stops after the batch in progress once Ctrl-C or
/// SIGTERM arrives.

use potaflow::{
    config::Config,
    runtime::{Poller, StubExecutor},
    server::{init_tracing, open_store, shutdown_signal},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env()?;
    let store = Arc::new(open_store(&config.database).await?);

    let poller = Poller::new(
        store,
        Arc::new(StubExecutor),
        config.worker.poller(),
        tracing::info_span!("worker"),
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    tracing::info!("👷 Worker started");
    poller.run(cancel).await;
    tracing::info!("👷 Worker stopped");

    Ok(())
}
