//! ContentStore trait — abstraction over the content domain's persisted state
//! (everything in the data model except jobs/job logs, which `queue::store`
//! owns directly since the job queue is its own component, C7).
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::store::models::{
    ActiveTemplate, AiResponseLog, ArticleStatus, GeneratedArticle, GeneratedArticleStatus,
    GeneratedContent, NewsSource, PromptTemplate, PromptVersion, ScrapedArticle,
};

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Reference to the backing connection pool, where one exists (mocks return `None`).
    fn pool(&self) -> Option<&PgPool>;

    // --- NewsSource ---------------------------------------------------

    async fn active_sources(&self, account_id: &str) -> anyhow::Result<Vec<NewsSource>>;

    async fn get_source(&self, account_id: &str, source_id: Uuid) -> anyhow::Result<Option<NewsSource>>;

    async fn mark_source_checked(&self, source_id: Uuid, checked_at: DateTime<Utc>) -> anyhow::Result<()>;

    // --- ScrapedArticle -------------------------------------------------

    /// Inserts a new article unless `(account_id, url)` already exists, in which case the
    /// insert is silently skipped (the dedup rule in the source-fetcher contract) and
    /// `Ok(None)` is returned.
    async fn insert_article_if_new(&self, article: &ScrapedArticle) -> anyhow::Result<Option<Uuid>>;

    async fn get_article(&self, account_id: &str, article_id: Uuid) -> anyhow::Result<Option<ScrapedArticle>>;

    async fn articles_by_status(
        &self,
        account_id: &str,
        status: ArticleStatus,
        limit: i64,
    ) -> anyhow::Result<Vec<ScrapedArticle>>;

    /// Top-N by `relevance_score` (descending, nulls last) with `status != processed`, the
    /// selection rule the content-generation handler uses when no specific story is named.
    async fn top_articles_by_relevance(
        &self,
        account_id: &str,
        limit: i64,
    ) -> anyhow::Result<Vec<ScrapedArticle>>;

    async fn update_article_analysis(
        &self,
        article_id: Uuid,
        summary: &str,
        keywords: &[String],
        relevance_score: f64,
    ) -> anyhow::Result<()>;

    async fn set_article_status(&self, article_id: Uuid, status: ArticleStatus) -> anyhow::Result<()>;

    async fn set_article_full_text(&self, article_id: Uuid, full_text: &str) -> anyhow::Result<()>;

    // --- PromptTemplate / PromptVersion ---------------------------------

    /// Active templates for `account_id`, tenant-specific rows preceding the
    /// `account_id = "global"` fallback rows, ordered `(execution_order asc, name asc)`,
    /// each paired with its one current version. Templates lacking a current version are
    /// refused (not returned) per the exactly-one-current invariant.
    async fn active_templates_with_current_version(
        &self,
        account_id: &str,
    ) -> anyhow::Result<Vec<ActiveTemplate>>;

    async fn get_template(&self, template_id: Uuid) -> anyhow::Result<Option<PromptTemplate>>;

    async fn get_current_version(&self, template_id: Uuid) -> anyhow::Result<Option<PromptVersion>>;

    // --- GeneratedArticle / GeneratedContent -----------------------------

    async fn create_draft_article(&self, article: &GeneratedArticle) -> anyhow::Result<Uuid>;

    async fn get_generated_article(
        &self,
        account_id: &str,
        gen_article_id: Uuid,
    ) -> anyhow::Result<Option<GeneratedArticle>>;

    async fn update_generated_article_body(
        &self,
        gen_article_id: Uuid,
        title: &str,
        body: &str,
    ) -> anyhow::Result<()>;

    async fn set_generated_article_status(
        &self,
        gen_article_id: Uuid,
        status: GeneratedArticleStatus,
    ) -> anyhow::Result<()>;

    /// `true` if the source article already has a draft or review_pending generated
    /// article, the at-most-one-in-flight invariant the content generator must honour
    /// before creating a new draft.
    async fn has_draft_or_review_pending(
        &self,
        account_id: &str,
        based_on_article_id: Uuid,
    ) -> anyhow::Result<bool>;

    async fn insert_generated_content(&self, content: &GeneratedContent) -> anyhow::Result<Uuid>;

    // --- AIResponseLog (append-only provenance) -------------------------

    async fn insert_ai_response_log(&self, log: &AiResponseLog) -> anyhow::Result<Uuid>;
}
