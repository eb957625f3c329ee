//! C8 Worker Engine: a single-process, single-threaded cooperative polling loop. Grounded
//! in the teacher's `queue::worker::QueueWorker::run` (acquire -> pick -> process -> loop)
//! but adapted to this system's one-in-flight-job-at-a-time contract: where the teacher's
//! loop spawns each picked job onto its own task bounded by a semaphore, this loop awaits
//! each job to completion before picking the next one. The semaphore budget instead bounds
//! *sub-task* concurrency inside a handler (e.g. per-article analysis fan-out).
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, warn};

use super::handler::JobHandler;
use super::logger::JobLogger;
use super::progress::ProgressReporter;
use crate::observability::metrics::Metrics;
use crate::queue::JobQueueStore;

pub struct WorkerEngine {
    store: Arc<JobQueueStore>,
    handler: Arc<dyn JobHandler>,
    worker_id: String,
    empty_queue_backoff: Duration,
    stale_reclaim_minutes: i64,
    metrics: Arc<Metrics>,
}

impl WorkerEngine {
    #[must_use]
    pub fn new(
        store: Arc<JobQueueStore>,
        handler: Arc<dyn JobHandler>,
        worker_id: String,
        empty_queue_backoff: Duration,
        stale_reclaim_minutes: i64,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            handler,
            worker_id,
            empty_queue_backoff,
            stale_reclaim_minutes,
            metrics,
        }
    }

    /// Runs until `shutdown` reports `true`. Shutdown is cooperative only: the current
    /// job, if any, always runs to completion before the loop checks the flag again.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let reclaimed = self
            .store
            .reclaim_stale(self.stale_reclaim_minutes)
            .await
            .unwrap_or_else(|e| {
                error!(error = %e, "boot-time stale-job reclamation failed");
                Vec::new()
            });
        if !reclaimed.is_empty() {
            self.metrics.jobs_reclaimed.inc_by(reclaimed.len() as f64);
            info!(count = reclaimed.len(), "failed stale processing jobs left over from a worker restart");
        }

        info!(worker_id = %self.worker_id, "worker engine starting");

        loop {
            if *shutdown.borrow() {
                info!("worker engine received shutdown signal, exiting");
                return Ok(());
            }

            let job = match self.store.next().await {
                Ok(Some(job)) => job,
                Ok(None) => {
                    sleep(self.empty_queue_backoff).await;
                    continue;
                }
                Err(e) => {
                    error!(error = %e, "failed to poll for next job");
                    sleep(self.empty_queue_backoff).await;
                    continue;
                }
            };

            match self.store.claim(job.job_id, &self.worker_id).await {
                Ok(true) => {}
                Ok(false) => continue, // lost the race to another worker
                Err(e) => {
                    error!(job_id = %job.job_id, error = %e, "failed to claim job");
                    continue;
                }
            }

            let claim_latency = (chrono::Utc::now() - job.created_at)
                .to_std()
                .unwrap_or(Duration::ZERO);
            self.metrics
                .job_claim_latency
                .observe(claim_latency.as_secs_f64());

            self.process(job).await;
        }
    }

    async fn process(&self, job: crate::store::models::Job) {
        let job_id = job.job_id;
        let logger = JobLogger::new(self.store.clone(), job_id, job.account_id.clone());
        let progress = ProgressReporter::new(self.store.clone(), job_id);

        logger
            .info("worker", &format!("processing job_type={}", job.job_type))
            .await;

        self.metrics.active_jobs.inc();
        let started = std::time::Instant::now();
        let outcome = self.handler.handle(&job, &logger, &progress).await;
        self.metrics
            .job_duration
            .observe(started.elapsed().as_secs_f64());
        self.metrics.active_jobs.dec();

        match outcome {
            Ok(results) => {
                if let Err(e) = self.store.complete(job_id, results).await {
                    error!(job_id = %job_id, error = %e, "failed to persist job completion");
                }
                self.metrics.jobs_completed.inc();
                logger.info("worker", "job completed").await;
            }
            Err(e) => {
                let message = format!("{e:#}");
                warn!(job_id = %job_id, error = %message, "job failed");
                if let Err(store_err) = self.store.fail(job_id, &message).await {
                    error!(job_id = %job_id, error = %store_err, "failed to persist job failure");
                }
                self.metrics.jobs_failed.inc();
                logger.error("worker", &message).await;
            }
        }
    }
}

/// `{hostname}-{pid}-{start_unix_ts}`, the teacher's "process id + start time" recipe
/// made concrete with a hostname prefix for multi-host deployments.
#[must_use]
pub fn generate_worker_id() -> String {
    let hostname = hostname_or_unknown();
    let pid = std::process::id();
    let start_ts = chrono::Utc::now().timestamp();
    format!("{hostname}-{pid}-{start_ts}")
}

fn hostname_or_unknown() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown-host".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_id_has_three_dash_separated_parts() {
        let id = generate_worker_id();
        let parts: Vec<&str> = id.rsplitn(3, '-').collect();
        assert_eq!(parts.len(), 3);
    }
}
