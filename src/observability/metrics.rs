//! Prometheus metric definitions, registered once at startup against a private registry
//! (not the global default registry) so tests can build independent `Metrics` instances.
use prometheus::{
    Counter, Gauge, Histogram, Registry, register_counter_with_registry, register_gauge_with_registry,
    register_histogram_with_registry,
};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Metrics {
    // Counters
    pub jobs_enqueued: Counter,
    pub jobs_completed: Counter,
    pub jobs_failed: Counter,
    pub jobs_retried: Counter,
    pub jobs_reclaimed: Counter,
    pub articles_fetched: Counter,
    pub articles_analyzed: Counter,
    pub articles_analysis_failed: Counter,
    pub content_artifacts_generated: Counter,
    pub ai_provider_calls: Counter,
    pub ai_provider_call_failures: Counter,
    pub ai_provider_tokens_total: Counter,

    // Histograms
    pub job_claim_latency: Histogram,
    pub job_duration: Histogram,
    pub ai_provider_call_duration: Histogram,
    pub source_fetch_duration: Histogram,

    // Gauges
    pub active_jobs: Gauge,
    pub queue_depth: Gauge,
}

impl Metrics {
    pub fn new(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        Ok(Self {
            jobs_enqueued: register_counter_with_registry!(
                "contentflow_jobs_enqueued_total",
                "Total number of jobs enqueued",
                registry
            )?,
            jobs_completed: register_counter_with_registry!(
                "contentflow_jobs_completed_total",
                "Total number of jobs completed",
                registry
            )?,
            jobs_failed: register_counter_with_registry!(
                "contentflow_jobs_failed_total",
                "Total number of jobs failed",
                registry
            )?,
            jobs_retried: register_counter_with_registry!(
                "contentflow_jobs_retried_total",
                "Total number of jobs retried",
                registry
            )?,
            jobs_reclaimed: register_counter_with_registry!(
                "contentflow_jobs_reclaimed_total",
                "Total number of stale processing jobs failed after a worker restart",
                registry
            )?,
            articles_fetched: register_counter_with_registry!(
                "contentflow_articles_fetched_total",
                "Total number of articles fetched from sources",
                registry
            )?,
            articles_analyzed: register_counter_with_registry!(
                "contentflow_articles_analyzed_total",
                "Total number of articles successfully analysed",
                registry
            )?,
            articles_analysis_failed: register_counter_with_registry!(
                "contentflow_articles_analysis_failed_total",
                "Total number of articles that failed analysis",
                registry
            )?,
            content_artifacts_generated: register_counter_with_registry!(
                "contentflow_content_artifacts_generated_total",
                "Total number of generated content artifacts (blog bodies and template outputs)",
                registry
            )?,
            ai_provider_calls: register_counter_with_registry!(
                "contentflow_ai_provider_calls_total",
                "Total number of AI provider calls",
                registry
            )?,
            ai_provider_call_failures: register_counter_with_registry!(
                "contentflow_ai_provider_call_failures_total",
                "Total number of failed AI provider calls",
                registry
            )?,
            ai_provider_tokens_total: register_counter_with_registry!(
                "contentflow_ai_provider_tokens_total",
                "Total number of tokens consumed across AI provider calls",
                registry
            )?,
            job_claim_latency: register_histogram_with_registry!(
                "contentflow_job_claim_latency_seconds",
                "Time between a job entering the queue and being claimed",
                registry
            )?,
            job_duration: register_histogram_with_registry!(
                "contentflow_job_duration_seconds",
                "Duration of a job's handler execution",
                registry
            )?,
            ai_provider_call_duration: register_histogram_with_registry!(
                "contentflow_ai_provider_call_duration_seconds",
                "Duration of AI provider calls",
                registry
            )?,
            source_fetch_duration: register_histogram_with_registry!(
                "contentflow_source_fetch_duration_seconds",
                "Duration of source fetch operations",
                registry
            )?,
            active_jobs: register_gauge_with_registry!(
                "contentflow_active_jobs",
                "Number of jobs currently being processed",
                registry
            )?,
            queue_depth: register_gauge_with_registry!(
                "contentflow_queue_depth",
                "Number of jobs currently queued",
                registry
            )?,
        })
    }
}
