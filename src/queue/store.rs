//! Postgres-backed job queue store, C7. Owns the `jobs` and `job_logs` tables directly
//! — the job queue is its own component per the system overview, not a sub-concern of
//! the content store. Claim uses a single conditional `UPDATE` verifying exactly one row
//! changed (the atomic-claim contract); `pick_next_job` below additionally uses
//! `SELECT ... FOR UPDATE SKIP LOCKED` so concurrent pollers never block on each other
//! while racing to find a candidate row.
use std::collections::HashMap;

use anyhow::{Context, Result};
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::store::models::{Job, JobStatus};

#[derive(Debug, Clone)]
pub struct JobQueueStore {
    pool: PgPool,
}

#[derive(Debug, Clone, Default)]
pub struct JobTypeStats {
    pub queued: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub cancelled: i64,
}

#[derive(Debug, Clone, Default)]
pub struct JobStats {
    pub queued: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub cancelled: i64,
    pub by_job_type: HashMap<String, JobTypeStats>,
}

impl JobQueueStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a new queued job. `job_id` is generated by the caller (uuid v7, so job
    /// rows are roughly creation-ordered even without an index on `created_at`).
    pub async fn enqueue(
        &self,
        account_id: &str,
        job_type: &str,
        payload: Value,
        priority: i32,
        max_retries: i32,
    ) -> Result<Uuid> {
        let job_id = Uuid::now_v7();
        sqlx::query(
            r"
            INSERT INTO jobs
                (job_id, account_id, job_type, status, priority, payload, progress_pct,
                 retry_count, max_retries, created_at, updated_at)
            VALUES ($1, $2, $3, 'queued', $4, $5, 0, 0, $6, NOW(), NOW())
            ",
        )
        .bind(job_id)
        .bind(account_id)
        .bind(job_type)
        .bind(priority)
        .bind(payload)
        .bind(max_retries)
        .execute(&self.pool)
        .await
        .context("failed to enqueue job")?;

        Ok(job_id)
    }

    /// Finds the next queued job a worker could claim: highest priority first, then
    /// FIFO within a priority band. Does not itself transition the row — `claim` does
    /// that atomically so a caller that merely peeked never blocks another claimant.
    pub async fn next(&self) -> Result<Option<Job>> {
        let row = sqlx::query(
            r"
            SELECT job_id, account_id, job_type, status, priority, payload, results, error,
                   progress_pct, progress_detail, retry_count, max_retries, worker_id,
                   created_at, started_at, completed_at, updated_at
            FROM jobs
            WHERE status = 'queued'
            ORDER BY priority DESC, created_at ASC
            FOR UPDATE SKIP LOCKED
            LIMIT 1
            ",
        )
        .fetch_optional(&self.pool)
        .await
        .context("failed to pick next job")?;

        row.as_ref().map(Self::row_to_job).transpose()
    }

    /// Atomically transitions `queued` -> `processing` for `job_id`, binding it to
    /// `worker_id`. Returns `true` only if this call performed the transition — the
    /// claim contract every concurrent caller must honour.
    pub async fn claim(&self, job_id: Uuid, worker_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE jobs
            SET status = 'processing', worker_id = $2, started_at = NOW(), updated_at = NOW()
            WHERE job_id = $1 AND status = 'queued'
            ",
        )
        .bind(job_id)
        .bind(worker_id)
        .execute(&self.pool)
        .await
        .context("failed to claim job")?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn progress(&self, job_id: Uuid, pct: i32, detail: Option<&str>) -> Result<()> {
        sqlx::query(
            r"
            UPDATE jobs
            SET progress_pct = $2, progress_detail = $3, updated_at = NOW()
            WHERE job_id = $1
            ",
        )
        .bind(job_id)
        .bind(pct.clamp(0, 100))
        .bind(detail)
        .execute(&self.pool)
        .await
        .context("failed to update job progress")?;

        Ok(())
    }

    /// Idempotent: a second call against an already-terminal job is a no-op, not an error.
    pub async fn complete(&self, job_id: Uuid, results: Value) -> Result<()> {
        sqlx::query(
            r"
            UPDATE jobs
            SET status = 'completed', results = $2, progress_pct = 100, completed_at = NOW(),
                updated_at = NOW()
            WHERE job_id = $1 AND status != 'completed'
            ",
        )
        .bind(job_id)
        .bind(results)
        .execute(&self.pool)
        .await
        .context("failed to complete job")?;

        Ok(())
    }

    pub async fn fail(&self, job_id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            r"
            UPDATE jobs
            SET status = 'failed', error = $2, completed_at = NOW(), updated_at = NOW()
            WHERE job_id = $1 AND status != 'failed'
            ",
        )
        .bind(job_id)
        .bind(error)
        .execute(&self.pool)
        .await
        .context("failed to fail job")?;

        Ok(())
    }

    /// `queued` -> `cancelled` is immediate. `processing` -> `cancelled` flips the status
    /// but does not preempt a handler already running; the handler must poll and exit.
    pub async fn cancel(&self, job_id: Uuid) -> Result<()> {
        sqlx::query(
            r"
            UPDATE jobs
            SET status = 'cancelled', completed_at = NOW(), updated_at = NOW()
            WHERE job_id = $1 AND status IN ('queued', 'processing')
            ",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await
        .context("failed to cancel job")?;

        Ok(())
    }

    /// Only legal from `failed`, and only while `retry_count < max_retries`. Resets the
    /// job to `queued` and increments `retry_count` exactly once.
    pub async fn retry(&self, job_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE jobs
            SET status = 'queued', retry_count = retry_count + 1, error = NULL,
                worker_id = NULL, started_at = NULL, completed_at = NULL, updated_at = NOW()
            WHERE job_id = $1 AND status = 'failed' AND retry_count < max_retries
            ",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await
        .context("failed to retry job")?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn get_job(&self, account_id: &str, job_id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query(
            r"
            SELECT job_id, account_id, job_type, status, priority, payload, results, error,
                   progress_pct, progress_detail, retry_count, max_retries, worker_id,
                   created_at, started_at, completed_at, updated_at
            FROM jobs
            WHERE account_id = $1 AND job_id = $2
            ",
        )
        .bind(account_id)
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to get job")?;

        row.as_ref().map(Self::row_to_job).transpose()
    }

    pub async fn recent(&self, account_id: &str, limit: i64) -> Result<Vec<Job>> {
        let rows = sqlx::query(
            r"
            SELECT job_id, account_id, job_type, status, priority, payload, results, error,
                   progress_pct, progress_detail, retry_count, max_retries, worker_id,
                   created_at, started_at, completed_at, updated_at
            FROM jobs
            WHERE account_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            ",
        )
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("failed to list recent jobs")?;

        rows.iter().map(Self::row_to_job).collect()
    }

    pub async fn by_status(&self, account_id: &str, status: JobStatus, limit: i64) -> Result<Vec<Job>> {
        let rows = sqlx::query(
            r"
            SELECT job_id, account_id, job_type, status, priority, payload, results, error,
                   progress_pct, progress_detail, retry_count, max_retries, worker_id,
                   created_at, started_at, completed_at, updated_at
            FROM jobs
            WHERE account_id = $1 AND status = $2
            ORDER BY priority DESC, created_at ASC
            LIMIT $3
            ",
        )
        .bind(account_id)
        .bind(status.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("failed to list jobs by status")?;

        rows.iter().map(Self::row_to_job).collect()
    }

    /// Stats over the trailing 24h window, broken down by `status` and `job_type`, per
    /// the observability surface in the external interface.
    pub async fn stats(&self, account_id: &str) -> Result<JobStats> {
        let rows = sqlx::query(
            r"
            SELECT job_type, status, COUNT(*) as n
            FROM jobs
            WHERE account_id = $1 AND created_at > NOW() - INTERVAL '24 hours'
            GROUP BY job_type, status
            ",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to compute job stats")?;

        let mut stats = JobStats::default();
        for row in rows {
            let job_type: String = row.try_get("job_type")?;
            let status: String = row.try_get("status")?;
            let n: i64 = row.try_get("n")?;

            let by_type = stats.by_job_type.entry(job_type).or_default();
            match status.as_str() {
                "queued" => {
                    stats.queued += n;
                    by_type.queued = n;
                }
                "processing" => {
                    stats.processing += n;
                    by_type.processing = n;
                }
                "completed" => {
                    stats.completed += n;
                    by_type.completed = n;
                }
                "failed" => {
                    stats.failed += n;
                    by_type.failed = n;
                }
                "cancelled" => {
                    stats.cancelled += n;
                    by_type.cancelled = n;
                }
                _ => {}
            }
        }
        Ok(stats)
    }

    /// Current count of `queued` jobs across all accounts, for the `queue_depth` gauge.
    /// Unlike `stats`, this is a point-in-time snapshot, not a trailing-window count.
    pub async fn queue_depth(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as n FROM jobs WHERE status = 'queued'")
            .fetch_one(&self.pool)
            .await
            .context("failed to compute queue depth")?;
        row.try_get("n").context("failed to read queue depth count")
    }

    pub async fn cleanup(&self, days_old: i64) -> Result<u64> {
        let result = sqlx::query(
            r"
            DELETE FROM jobs
            WHERE status IN ('completed', 'failed', 'cancelled')
              AND completed_at < NOW() - make_interval(days => $1)
            ",
        )
        .bind(days_old as f64)
        .execute(&self.pool)
        .await
        .context("failed to clean up old jobs")?;

        Ok(result.rows_affected())
    }

    /// Fails jobs stuck `processing` past `max_processing_minutes` since they started —
    /// the sole timeout mechanism this system has, per the worker engine contract (no
    /// per-job hard timeout otherwise). These are never auto-retried: a worker that died
    /// mid-job leaves no evidence the handler is safe to silently re-run, so the job is
    /// marked terminally `failed` and must go through the explicit `retry` API like any
    /// other failure. Returns the reclaimed job ids for logging.
    pub async fn reclaim_stale(&self, max_processing_minutes: i64) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            r"
            UPDATE jobs
            SET status = 'failed', error = 'worker restart', completed_at = NOW(), updated_at = NOW()
            WHERE status = 'processing'
              AND started_at < NOW() - make_interval(mins => $1)
            RETURNING job_id
            ",
        )
        .bind(max_processing_minutes as f64)
        .fetch_all(&self.pool)
        .await
        .context("failed to reclaim stale jobs")?;

        rows.iter()
            .map(|row| row.try_get::<Uuid, _>("job_id").context("missing job_id"))
            .collect()
    }

    pub async fn insert_job_log(
        &self,
        job_id: Option<Uuid>,
        account_id: Option<&str>,
        level: &str,
        message: &str,
        source: &str,
        metadata: Option<Value>,
    ) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO job_logs (log_id, job_id, account_id, level, message, source, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            ",
        )
        .bind(Uuid::now_v7())
        .bind(job_id)
        .bind(account_id)
        .bind(level)
        .bind(message)
        .bind(source)
        .bind(metadata)
        .execute(&self.pool)
        .await
        .context("failed to insert job log")?;

        Ok(())
    }

    fn row_to_job(row: &sqlx::postgres::PgRow) -> Result<Job> {
        let status_str: String = row.try_get("status").context("failed to get status")?;
        let status = JobStatus::from_str(&status_str)
            .with_context(|| format!("invalid job status: {status_str}"))?;

        Ok(Job {
            job_id: row.try_get("job_id")?,
            account_id: row.try_get("account_id")?,
            job_type: row.try_get("job_type")?,
            status,
            priority: row.try_get("priority")?,
            payload: row.try_get("payload")?,
            results: row.try_get("results")?,
            error: row.try_get("error")?,
            progress_pct: row.try_get("progress_pct")?,
            progress_detail: row.try_get("progress_detail")?,
            retry_count: row.try_get("retry_count")?,
            max_retries: row.try_get("max_retries")?,
            worker_id: row.try_get("worker_id")?,
            created_at: row.try_get("created_at")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_stats_default_is_all_zero() {
        let stats = JobStats::default();
        assert_eq!(stats.queued, 0);
        assert_eq!(stats.processing, 0);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.cancelled, 0);
        assert!(stats.by_job_type.is_empty());
    }
}
