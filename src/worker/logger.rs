//! Per-job-scoped logger: every message is written as a `JobLog` row and also emitted
//! as a structured `tracing` event, the dual-sink pattern the design notes call for in
//! place of a global logger. Never a static/global — one instance per in-flight job,
//! handed to the handler by the worker engine.
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::queue::JobQueueStore;
use crate::store::models::LogLevel;

#[derive(Clone)]
pub struct JobLogger {
    store: Arc<JobQueueStore>,
    job_id: Uuid,
    account_id: String,
}

impl JobLogger {
    #[must_use]
    pub fn new(store: Arc<JobQueueStore>, job_id: Uuid, account_id: String) -> Self {
        Self {
            store,
            job_id,
            account_id,
        }
    }

    pub async fn log(&self, level: LogLevel, source: &str, message: &str, metadata: Option<Value>) {
        match level {
            LogLevel::Debug => tracing::debug!(job_id = %self.job_id, account_id = %self.account_id, source, "{message}"),
            LogLevel::Info => tracing::info!(job_id = %self.job_id, account_id = %self.account_id, source, "{message}"),
            LogLevel::Warn => tracing::warn!(job_id = %self.job_id, account_id = %self.account_id, source, "{message}"),
            LogLevel::Error => tracing::error!(job_id = %self.job_id, account_id = %self.account_id, source, "{message}"),
        }

        if let Err(e) = self
            .store
            .insert_job_log(
                Some(self.job_id),
                Some(&self.account_id),
                level.as_str(),
                message,
                source,
                metadata,
            )
            .await
        {
            tracing::warn!(job_id = %self.job_id, error = %e, "failed to persist job log row");
        }
    }

    pub async fn info(&self, source: &str, message: &str) {
        self.log(LogLevel::Info, source, message, None).await;
    }

    pub async fn warn(&self, source: &str, message: &str) {
        self.log(LogLevel::Warn, source, message, None).await;
    }

    pub async fn error(&self, source: &str, message: &str) {
        self.log(LogLevel::Error, source, message, None).await;
    }
}
