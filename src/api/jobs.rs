use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::app::AppState;
use crate::store::models::{Job, JobPayload, JobStatus};

#[derive(Debug, Deserialize)]
pub(crate) struct CreateJobRequest {
    account_id: String,
    #[serde(default)]
    priority: i32,
    #[serde(default = "default_max_retries")]
    max_retries: i32,
    #[serde(flatten)]
    payload: JobPayload,
}

fn default_max_retries() -> i32 {
    3
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateJobResponse {
    job_id: Uuid,
}

pub(crate) async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateJobRequest>,
) -> Result<Json<CreateJobResponse>, (StatusCode, String)> {
    let job_type = request.payload.job_type();
    let payload_json = serde_json::to_value(&request.payload).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("failed to serialise job payload: {e}"),
        )
    })?;

    let job_id = state
        .queue_store()
        .enqueue(
            &request.account_id,
            job_type,
            payload_json,
            request.priority,
            request.max_retries,
        )
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("failed to enqueue job: {e:#}")))?;

    state.telemetry().metrics().jobs_enqueued.inc();

    Ok(Json(CreateJobResponse { job_id }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountScopedQuery {
    account_id: String,
}

pub(crate) async fn get(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Query(query): Query<AccountScopedQuery>,
) -> Result<Json<Job>, StatusCode> {
    match state.queue_store().get_job(&query.account_id, job_id).await {
        Ok(Some(job)) => Ok(Json(job)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListJobsQuery {
    account_id: String,
    status: Option<String>,
    #[serde(default = "default_list_limit")]
    limit: i64,
}

fn default_list_limit() -> i64 {
    50
}

pub(crate) async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<Vec<Job>>, (StatusCode, String)> {
    let store = state.queue_store();

    let jobs = if let Some(status_str) = &query.status {
        let status = JobStatus::from_str(status_str)
            .ok_or_else(|| (StatusCode::BAD_REQUEST, format!("unknown job status: {status_str}")))?;
        store.by_status(&query.account_id, status, query.limit).await
    } else {
        store.recent(&query.account_id, query.limit).await
    };

    jobs.map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("failed to list jobs: {e:#}")))
}

pub(crate) async fn cancel(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .queue_store()
        .cancel(job_id)
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("failed to cancel job: {e:#}")))
}

#[derive(Debug, Serialize)]
pub(crate) struct RetryResponse {
    retried: bool,
}

pub(crate) async fn retry(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<RetryResponse>, (StatusCode, String)> {
    let retried = state
        .queue_store()
        .retry(job_id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("failed to retry job: {e:#}")))?;

    if retried {
        state.telemetry().metrics().jobs_retried.inc();
    }

    Ok(Json(RetryResponse { retried }))
}

pub(crate) async fn stats(
    State(state): State<AppState>,
    Query(query): Query<AccountScopedQuery>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let stats = state
        .queue_store()
        .stats(&query.account_id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("failed to compute job stats: {e:#}")))?;

    let by_job_type: HashMap<String, Value> = stats
        .by_job_type
        .iter()
        .map(|(job_type, s)| {
            (
                job_type.clone(),
                serde_json::json!({
                    "queued": s.queued,
                    "processing": s.processing,
                    "completed": s.completed,
                    "failed": s.failed,
                    "cancelled": s.cancelled,
                }),
            )
        })
        .collect();

    Ok(Json(serde_json::json!({
        "queued": stats.queued,
        "processing": stats.processing,
        "completed": stats.completed,
        "failed": stats.failed,
        "cancelled": stats.cancelled,
        "byJobType": by_job_type,
    })))
}
