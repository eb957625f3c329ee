use async_trait::async_trait;
use serde_json::Value;

use super::logger::JobLogger;
use super::progress::ProgressReporter;
use crate::store::models::Job;

/// Dispatches a claimed job to whatever component handles its `job_type`. Implemented
/// by the pipeline orchestrator (C9); kept as a trait here so the worker engine (C8)
/// never depends on the pipeline crate's concrete types, only this seam.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(
        &self,
        job: &Job,
        logger: &JobLogger,
        progress: &ProgressReporter,
    ) -> anyhow::Result<Value>;
}
