/// Background run poller
///
/// Drains pending runs on a fixed interval: claim, execute, log, finish.
/// Runs in a batch are handled one after another, and every per-run failure is
/// logged and contained so the rest of the batch still proceeds. Cancellation
/// is only observed between ticks, never in the middle of a batch.

use crate::deadline::Deadline;
use crate::runtime::executor::ActionExecutor;
use crate::store::RunQueue;
use crate::workflow::types::{NewRunLog, RunStatus, WorkflowRun};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::Span;

/// Poller cadence and limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Time between ticks
    pub interval: Duration,
    /// Maximum runs claimed per tick
    pub batch_size: u32,
    /// Deadline for the store calls of a single run
    pub run_timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            batch_size: 10,
            run_timeout: Duration::from_secs(30),
        }
    }
}

/// What one tick did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    /// Pending runs fetched
    pub fetched: usize,
    /// Runs that could not be claimed and were left pending
    pub skipped: usize,
    pub succeeded: usize,
    pub failed: usize,
}

enum RunResult {
    Skipped,
    Finished(RunStatus),
    /// Claimed, but the final status could not be written
    Unfinished,
}

/// Pending-run poller
pub struct Poller {
    queue: Arc<dyn RunQueue>,
    executor: Arc<dyn ActionExecutor>,
    config: PollerConfig,
    span: Span,
}

impl Poller {
    pub fn new(
        queue: Arc<dyn RunQueue>,
        executor: Arc<dyn ActionExecutor>,
        config: PollerConfig,
        span: Span,
    ) -> Self {
        Self {
            queue,
            executor,
            config,
            span,
        }
    }

    /// Tick until `cancel` fires
    ///
    /// The first batch is processed immediately. A batch in progress always
    /// completes before the loop checks for cancellation again.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            parent: &self.span,
            "🔄 Poller started (interval: {:?}, batch: {})",
            self.config.interval,
            self.config.batch_size
        );

        // tokio rejects a zero period
        let period = self.config.interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            self.process_once().await;
        }

        tracing::info!(parent: &self.span, "⏹️ Poller stopped");
    }

    /// Process one batch of pending runs, oldest first
    pub async fn process_once(&self) -> TickSummary {
        let mut summary = TickSummary::default();

        let deadline = Deadline::after(self.config.run_timeout);
        let runs = match deadline.run(self.queue.list_pending_runs(self.config.batch_size)).await {
            Ok(runs) => runs,
            Err(e) => {
                tracing::error!(parent: &self.span, "❌ Failed to list pending runs: {}", e);
                return summary;
            }
        };
        summary.fetched = runs.len();
        if !runs.is_empty() {
            tracing::debug!(parent: &self.span, "📋 Processing {} pending runs", runs.len());
        }

        for run in &runs {
            match self.process_run(run).await {
                RunResult::Skipped => summary.skipped += 1,
                RunResult::Finished(RunStatus::Success) => summary.succeeded += 1,
                RunResult::Finished(_) => summary.failed += 1,
                RunResult::Unfinished => {}
            }
        }

        summary
    }

    async fn process_run(&self, run: &WorkflowRun) -> RunResult {
        let deadline = Deadline::after(self.config.run_timeout);

        let started = match deadline.run(self.queue.start_run(&run.id, Utc::now())).await {
            Ok(started) => started,
            Err(e) => {
                tracing::error!(parent: &self.span, "❌ Failed to mark run {} running: {}", run.id, e);
                return RunResult::Skipped;
            }
        };

        let actions = match deadline.run(self.queue.list_actions_by_workflow(&started.workflow_id)).await {
            Ok(actions) => actions,
            Err(e) => {
                tracing::error!(parent: &self.span, "❌ Failed to list actions for workflow {}: {}", started.workflow_id, e);
                return self.finish(deadline, &started, RunStatus::Failed).await;
            }
        };

        let outcomes = self.executor.execute(&started, &actions).await;

        let mut status = RunStatus::Success;
        for outcome in outcomes {
            if !outcome.success {
                status = RunStatus::Failed;
            }

            let log = NewRunLog {
                run_id: started.id.clone(),
                action_id: outcome.action_id,
                action_position: outcome.action_position,
                success: outcome.success,
                message: outcome.message,
            };
            if let Err(e) = deadline.run(self.queue.insert_run_log(&log)).await {
                tracing::warn!(parent: &self.span, "⚠️ Failed to record log for action {} in run {}: {}", log.action_id, started.id, e);
            }
        }

        self.finish(deadline, &started, status).await
    }

    async fn finish(&self, deadline: Deadline, run: &WorkflowRun, status: RunStatus) -> RunResult {
        match deadline.run(self.queue.finish_run(&run.id, status, Utc::now())).await {
            Ok(finished) => {
                tracing::info!(parent: &self.span, "✅ Run {} finished: {}", finished.id, finished.status);
                RunResult::Finished(finished.status)
            }
            Err(e) => {
                tracing::error!(parent: &self.span, "❌ Failed to mark run {} {}: {}", run.id, status, e);
                RunResult::Unfinished
            }
        }
    }
}
