//! # Analysis Executor
//!
//! Runs analysis requests as tracked background tasks on a bounded worker
//! pool. Each run claims its request (`processing`), executes the pipeline
//! under a deadline and records the outcome: the result writer marks success,
//! failures are stored with their message, and cancelled runs go back to
//! `pending`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::ExecutorConfig;
use crate::error::{AnalysisError, RepositoryError};
use crate::pipeline::AnalysisPipeline;
use crate::repositories::AnalysisStore;
use crate::telemetry::{ANALYSIS_DURATION_SECONDS, ANALYSIS_RUNS_TOTAL};

/// How a single submitted run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed { result_id: Uuid, version: i32 },
    Failed { error: String },
    /// Interrupted by shutdown; the request is pending again
    Cancelled,
    /// Already processed or being processed elsewhere
    Skipped,
}

impl RunOutcome {
    fn label(&self) -> &'static str {
        match self {
            RunOutcome::Completed { .. } => "completed",
            RunOutcome::Failed { .. } => "failed",
            RunOutcome::Cancelled => "cancelled",
            RunOutcome::Skipped => "skipped",
        }
    }
}

#[derive(Clone)]
pub struct AnalysisExecutor {
    pipeline: Arc<AnalysisPipeline>,
    store: Arc<dyn AnalysisStore>,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    max_run: Duration,
}

impl AnalysisExecutor {
    pub fn new(
        pipeline: Arc<AnalysisPipeline>,
        store: Arc<dyn AnalysisStore>,
        config: &ExecutorConfig,
    ) -> Self {
        Self {
            pipeline,
            store,
            permits: Arc::new(Semaphore::new(config.concurrency.max(1))),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            max_run: config.max_run(),
        }
    }

    /// Schedule a run of `request_id` in the background.
    pub fn submit(&self, request_id: Uuid) -> JoinHandle<RunOutcome> {
        let executor = self.clone();
        self.tracker
            .spawn(async move { executor.run_one(request_id).await })
    }

    /// Submit every unprocessed request that is pending or failed.
    pub async fn resubmit_retryable(
        &self,
    ) -> Result<Vec<(Uuid, JoinHandle<RunOutcome>)>, RepositoryError> {
        let ids = self.store.retryable_requests().await?;
        info!(count = ids.len(), "Resubmitting retryable analysis requests");
        Ok(ids.into_iter().map(|id| (id, self.submit(id))).collect())
    }

    /// Cancel in-flight runs and wait for every tracked task to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("Analysis executor stopped");
    }

    #[instrument(skip(self), fields(request_id = %request_id))]
    async fn run_one(&self, request_id: Uuid) -> RunOutcome {
        let started = Instant::now();

        let _permit = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return self.finish(RunOutcome::Cancelled, started),
            permit = self.permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return self.finish(RunOutcome::Cancelled, started),
            },
        };

        match self.store.claim(request_id).await {
            Ok(true) => debug!("Analysis request claimed"),
            Ok(false) => {
                debug!("Analysis request not claimable");
                return self.finish(RunOutcome::Skipped, started);
            }
            Err(err) => {
                error!(error = %err, "Failed to claim analysis request");
                return self.finish(
                    RunOutcome::Failed {
                        error: err.to_string(),
                    },
                    started,
                );
            }
        }

        let outcome = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                if let Err(err) = self.store.release(request_id).await {
                    error!(error = %err, "Failed to release cancelled analysis request");
                }
                RunOutcome::Cancelled
            }
            run = tokio::time::timeout(self.max_run, self.pipeline.run(request_id)) => {
                match run {
                    Ok(Ok(stored)) => RunOutcome::Completed {
                        result_id: stored.id,
                        version: stored.version,
                    },
                    Ok(Err(err)) => self.fail(request_id, err).await,
                    Err(_) => {
                        let err = AnalysisError::TimedOut {
                            seconds: self.max_run.as_secs(),
                        };
                        self.fail(request_id, err).await
                    }
                }
            }
        };

        self.finish(outcome, started)
    }

    async fn fail(&self, request_id: Uuid, err: AnalysisError) -> RunOutcome {
        let message = err.to_string();
        warn!(error = %message, "Analysis run failed");
        if let Err(store_err) = self.store.mark_failed(request_id, &message).await {
            error!(error = %store_err, "Failed to record analysis failure");
        }
        RunOutcome::Failed { error: message }
    }

    fn finish(&self, outcome: RunOutcome, started: Instant) -> RunOutcome {
        let label = outcome.label();
        counter!(ANALYSIS_RUNS_TOTAL, "outcome" => label).increment(1);
        histogram!(ANALYSIS_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        info!(
            outcome = label,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Analysis run finished"
        );
        outcome
    }
}
