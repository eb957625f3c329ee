//! Progress-reporting handle passed into handlers. Handlers MUST call this every few
//! minutes during long-running work — stale-job reclamation is keyed off `updated_at`,
//! which this is the only in-handler path that refreshes.
use std::sync::Arc;

use uuid::Uuid;

use crate::queue::JobQueueStore;

#[derive(Clone)]
pub struct ProgressReporter {
    store: Arc<JobQueueStore>,
    job_id: Uuid,
}

impl ProgressReporter {
    #[must_use]
    pub fn new(store: Arc<JobQueueStore>, job_id: Uuid) -> Self {
        Self { store, job_id }
    }

    pub async fn report(&self, pct: i32, detail: impl Into<String>) {
        if let Err(e) = self
            .store
            .progress(self.job_id, pct, Some(&detail.into()))
            .await
        {
            tracing::warn!(job_id = %self.job_id, error = %e, "failed to report job progress");
        }
    }
}
