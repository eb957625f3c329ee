//! Data model for the content automation domain: tenants, news sources, scraped
//! and generated articles, prompt templates/versions, AI provenance logs, and
//! job/log rows. Status columns are closed enums with `as_str`/`from_str`
//! round-trips so the bit-exact vocabulary in the external interface is enforced
//! by the type system rather than string comparisons at call sites.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsSource {
    pub source_id: Uuid,
    pub account_id: String,
    pub name: String,
    pub homepage_url: String,
    pub feed_url: Option<String>,
    pub active: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    Scraped,
    Analyzed,
    Processed,
    Failed,
}

impl ArticleStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ArticleStatus::Scraped => "scraped",
            ArticleStatus::Analyzed => "analyzed",
            ArticleStatus::Processed => "processed",
            ArticleStatus::Failed => "failed",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "scraped" => Some(ArticleStatus::Scraped),
            "analyzed" => Some(ArticleStatus::Analyzed),
            "processed" => Some(ArticleStatus::Processed),
            "failed" => Some(ArticleStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedArticle {
    pub article_id: Uuid,
    pub account_id: String,
    pub source_id: Uuid,
    pub title: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub full_text: String,
    pub status: ArticleStatus,
    pub summary: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub relevance_score: Option<f64>,
    pub scraped_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Text,
    Image,
    Video,
}

impl MediaType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Text => "text",
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "text" => Some(MediaType::Text),
            "image" => Some(MediaType::Image),
            "video" => Some(MediaType::Video),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub template_id: Uuid,
    pub account_id: String,
    pub name: String,
    pub category: String,
    pub execution_order: i32,
    pub media_type: MediaType,
    pub parsing_method: String,
    pub ui_config: Value,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptVersion {
    pub version_id: Uuid,
    pub template_id: Uuid,
    pub version_number: i32,
    pub prompt_text: String,
    pub system_message: Option<String>,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
}

/// A template together with the one version flagged current, as handed to the
/// content generator. See `store::dao::ContentStore::active_templates_with_current_version`.
#[derive(Debug, Clone)]
pub struct ActiveTemplate {
    pub template: PromptTemplate,
    pub version: PromptVersion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratedArticleStatus {
    Draft,
    ReviewPending,
    Approved,
    Archived,
    Rejected,
    Published,
}

impl GeneratedArticleStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            GeneratedArticleStatus::Draft => "draft",
            GeneratedArticleStatus::ReviewPending => "review_pending",
            GeneratedArticleStatus::Approved => "approved",
            GeneratedArticleStatus::Archived => "archived",
            GeneratedArticleStatus::Rejected => "rejected",
            GeneratedArticleStatus::Published => "published",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(GeneratedArticleStatus::Draft),
            "review_pending" => Some(GeneratedArticleStatus::ReviewPending),
            "approved" => Some(GeneratedArticleStatus::Approved),
            "archived" => Some(GeneratedArticleStatus::Archived),
            "rejected" => Some(GeneratedArticleStatus::Rejected),
            "published" => Some(GeneratedArticleStatus::Published),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedArticle {
    pub gen_article_id: Uuid,
    pub account_id: String,
    pub based_on_article_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    pub status: GeneratedArticleStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub content_id: Uuid,
    pub account_id: String,
    pub based_on_gen_article_id: Uuid,
    pub prompt_category: String,
    pub content_data: Value,
    pub metadata: Value,
    pub status: GeneratedArticleStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiResponseLog {
    pub log_id: Uuid,
    pub generated_article_id: Uuid,
    pub template_id: Uuid,
    pub version_id: Uuid,
    pub category: String,
    pub provider: String,
    pub model: String,
    pub prompt_text: String,
    pub system_message: Option<String>,
    pub response_text: String,
    pub tokens_input: i32,
    pub tokens_output: i32,
    pub tokens_total: i32,
    pub duration_ms: i64,
    pub temperature: f64,
    pub max_output_tokens: i32,
    pub stop_reason: String,
    pub is_complete: bool,
    pub is_truncated: bool,
    pub safety_ratings: Option<Value>,
    pub success: bool,
    pub error: Option<String>,
    pub warning: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(JobStatus::Queued),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Job type discriminant, matching the payload schemas in the external interface.
/// The `extra` escape hatch on each variant tolerates forward-compatible payload
/// fields a future revision might add, per the "dynamic payload typing" design note.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "jobType", rename_all = "snake_case")]
pub enum JobPayload {
    NewsAggregation {
        #[serde(skip_serializing_if = "Option::is_none")]
        source_id: Option<Uuid>,
        #[serde(skip_serializing_if = "Option::is_none")]
        source_name: Option<String>,
        #[serde(default)]
        single_source: bool,
        #[serde(flatten)]
        extra: Value,
    },
    AiAnalysis {
        #[serde(default = "default_analysis_limit")]
        limit: i64,
        #[serde(flatten)]
        extra: Value,
    },
    UrlAnalysis {
        article_id: Uuid,
        url: String,
        source_id: Uuid,
        #[serde(flatten)]
        extra: Value,
    },
    ContentGeneration {
        #[serde(default = "default_generation_limit")]
        limit: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        specific_story_id: Option<Uuid>,
        #[serde(flatten)]
        extra: Value,
    },
    FullCycle {
        #[serde(flatten)]
        extra: Value,
    },
}

fn default_analysis_limit() -> i64 {
    20
}

fn default_generation_limit() -> i64 {
    5
}

impl JobPayload {
    #[must_use]
    pub fn job_type(&self) -> &'static str {
        match self {
            JobPayload::NewsAggregation { .. } => "news_aggregation",
            JobPayload::AiAnalysis { .. } => "ai_analysis",
            JobPayload::UrlAnalysis { .. } => "url_analysis",
            JobPayload::ContentGeneration { .. } => "content_generation",
            JobPayload::FullCycle { .. } => "full_cycle",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: Uuid,
    pub account_id: String,
    pub job_type: String,
    pub status: JobStatus,
    pub priority: i32,
    pub payload: Value,
    pub results: Option<Value>,
    pub error: Option<String>,
    pub progress_pct: i32,
    pub progress_detail: Option<String>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub worker_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLog {
    pub log_id: Uuid,
    pub job_id: Option<Uuid>,
    pub account_id: Option<String>,
    pub level: LogLevel,
    pub message: String,
    pub source: String,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn article_status_round_trips() {
        for s in [
            ArticleStatus::Scraped,
            ArticleStatus::Analyzed,
            ArticleStatus::Processed,
            ArticleStatus::Failed,
        ] {
            assert_eq!(ArticleStatus::from_str(s.as_str()), Some(s));
        }
        assert_eq!(ArticleStatus::from_str("bogus"), None);
    }

    #[test]
    fn job_status_terminal_classification() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn job_payload_tags_job_type() {
        let payload = JobPayload::AiAnalysis {
            limit: 20,
            extra: Value::Null,
        };
        assert_eq!(payload.job_type(), "ai_analysis");

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["jobType"], "ai_analysis");
        assert_eq!(json["limit"], 20);
    }

    #[test]
    fn job_payload_default_limits() {
        let json = serde_json::json!({"jobType": "content_generation"});
        let payload: JobPayload = serde_json::from_value(json).unwrap();
        match payload {
            JobPayload::ContentGeneration {
                limit,
                specific_story_id,
                ..
            } => {
                assert_eq!(limit, 5);
                assert_eq!(specific_story_id, None);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
