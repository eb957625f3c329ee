//! Postgres-backed `ContentStore`. Row mapping uses `row.try_get::<T>("col")` rather
//! than the `query_as!` macro family, the teacher's choice for a schema that evolves
//! faster than compile-time macro checks can track.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::dao_trait::ContentStore;
use crate::pipeline::templates::parse_ui_config;
use crate::store::models::{
    ActiveTemplate, AiResponseLog, ArticleStatus, GeneratedArticle, GeneratedArticleStatus,
    GeneratedContent, MediaType, NewsSource, PromptTemplate, PromptVersion, ScrapedArticle,
};

#[derive(Debug, Clone)]
pub struct PgContentStore {
    pool: PgPool,
}

impl PgContentStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_source(row: &sqlx::postgres::PgRow) -> anyhow::Result<NewsSource> {
    Ok(NewsSource {
        source_id: row.try_get("source_id")?,
        account_id: row.try_get("account_id")?,
        name: row.try_get("name")?,
        homepage_url: row.try_get("homepage_url")?,
        feed_url: row.try_get("feed_url")?,
        active: row.try_get("active")?,
        last_checked_at: row.try_get("last_checked_at")?,
    })
}

fn row_to_article(row: &sqlx::postgres::PgRow) -> anyhow::Result<ScrapedArticle> {
    let status_str: String = row.try_get("status")?;
    let status = ArticleStatus::from_str(&status_str)
        .ok_or_else(|| anyhow::anyhow!("unknown article status in row: {status_str}"))?;
    let keywords: Option<serde_json::Value> = row.try_get("keywords")?;
    let keywords = keywords.and_then(|v| serde_json::from_value::<Vec<String>>(v).ok());
    Ok(ScrapedArticle {
        article_id: row.try_get("article_id")?,
        account_id: row.try_get("account_id")?,
        source_id: row.try_get("source_id")?,
        title: row.try_get("title")?,
        url: row.try_get("url")?,
        published_at: row.try_get("published_at")?,
        full_text: row.try_get("full_text")?,
        status,
        summary: row.try_get("summary")?,
        keywords,
        relevance_score: row.try_get("relevance_score")?,
        scraped_at: row.try_get("scraped_at")?,
    })
}

fn row_to_template(row: &sqlx::postgres::PgRow) -> anyhow::Result<PromptTemplate> {
    let media_type_str: String = row.try_get("media_type")?;
    let media_type = MediaType::from_str(&media_type_str)
        .ok_or_else(|| anyhow::anyhow!("unknown media type in row: {media_type_str}"))?;
    Ok(PromptTemplate {
        template_id: row.try_get("template_id")?,
        account_id: row.try_get("account_id")?,
        name: row.try_get("name")?,
        category: row.try_get("category")?,
        execution_order: row.try_get("execution_order")?,
        media_type,
        parsing_method: row.try_get("parsing_method")?,
        ui_config: parse_ui_config(&row.try_get("ui_config")?),
        active: row.try_get("active")?,
    })
}

fn row_to_version(row: &sqlx::postgres::PgRow) -> anyhow::Result<PromptVersion> {
    Ok(PromptVersion {
        version_id: row.try_get("version_id")?,
        template_id: row.try_get("template_id")?,
        version_number: row.try_get("version_number")?,
        prompt_text: row.try_get("prompt_text")?,
        system_message: row.try_get("system_message")?,
        is_current: row.try_get("is_current")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_generated_article(row: &sqlx::postgres::PgRow) -> anyhow::Result<GeneratedArticle> {
    let status_str: String = row.try_get("status")?;
    let status = GeneratedArticleStatus::from_str(&status_str)
        .ok_or_else(|| anyhow::anyhow!("unknown generated article status in row: {status_str}"))?;
    Ok(GeneratedArticle {
        gen_article_id: row.try_get("gen_article_id")?,
        account_id: row.try_get("account_id")?,
        based_on_article_id: row.try_get("based_on_article_id")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        status,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl ContentStore for PgContentStore {
    fn pool(&self) -> Option<&PgPool> {
        Some(&self.pool)
    }

    async fn active_sources(&self, account_id: &str) -> anyhow::Result<Vec<NewsSource>> {
        let rows = sqlx::query(
            r"
            SELECT source_id, account_id, name, homepage_url, feed_url, active, last_checked_at
            FROM news_sources
            WHERE account_id = $1 AND active = TRUE
            ORDER BY name ASC
            ",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_source).collect()
    }

    async fn get_source(
        &self,
        account_id: &str,
        source_id: Uuid,
    ) -> anyhow::Result<Option<NewsSource>> {
        let row = sqlx::query(
            r"
            SELECT source_id, account_id, name, homepage_url, feed_url, active, last_checked_at
            FROM news_sources
            WHERE account_id = $1 AND source_id = $2
            ",
        )
        .bind(account_id)
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_source).transpose()
    }

    async fn mark_source_checked(
        &self,
        source_id: Uuid,
        checked_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE news_sources SET last_checked_at = $2 WHERE source_id = $1")
            .bind(source_id)
            .bind(checked_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_article_if_new(
        &self,
        article: &ScrapedArticle,
    ) -> anyhow::Result<Option<Uuid>> {
        let keywords_json = article
            .keywords
            .as_ref()
            .map(|k| serde_json::to_value(k))
            .transpose()?;

        let row = sqlx::query(
            r"
            INSERT INTO scraped_articles
                (article_id, account_id, source_id, title, url, published_at, full_text,
                 status, summary, keywords, relevance_score, scraped_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (account_id, url) DO NOTHING
            RETURNING article_id
            ",
        )
        .bind(article.article_id)
        .bind(&article.account_id)
        .bind(article.source_id)
        .bind(&article.title)
        .bind(&article.url)
        .bind(article.published_at)
        .bind(&article.full_text)
        .bind(article.status.as_str())
        .bind(&article.summary)
        .bind(keywords_json)
        .bind(article.relevance_score)
        .bind(article.scraped_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.try_get::<Uuid, _>("article_id")).transpose()?)
    }

    async fn get_article(
        &self,
        account_id: &str,
        article_id: Uuid,
    ) -> anyhow::Result<Option<ScrapedArticle>> {
        let row = sqlx::query(
            r"
            SELECT article_id, account_id, source_id, title, url, published_at, full_text,
                   status, summary, keywords, relevance_score, scraped_at
            FROM scraped_articles
            WHERE account_id = $1 AND article_id = $2
            ",
        )
        .bind(account_id)
        .bind(article_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_article).transpose()
    }

    async fn articles_by_status(
        &self,
        account_id: &str,
        status: ArticleStatus,
        limit: i64,
    ) -> anyhow::Result<Vec<ScrapedArticle>> {
        let rows = sqlx::query(
            r"
            SELECT article_id, account_id, source_id, title, url, published_at, full_text,
                   status, summary, keywords, relevance_score, scraped_at
            FROM scraped_articles
            WHERE account_id = $1 AND status = $2
            ORDER BY scraped_at ASC
            LIMIT $3
            ",
        )
        .bind(account_id)
        .bind(status.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_article).collect()
    }

    async fn top_articles_by_relevance(
        &self,
        account_id: &str,
        limit: i64,
    ) -> anyhow::Result<Vec<ScrapedArticle>> {
        let rows = sqlx::query(
            r"
            SELECT article_id, account_id, source_id, title, url, published_at, full_text,
                   status, summary, keywords, relevance_score, scraped_at
            FROM scraped_articles
            WHERE account_id = $1 AND status != 'processed'
            ORDER BY relevance_score DESC NULLS LAST
            LIMIT $2
            ",
        )
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_article).collect()
    }

    async fn update_article_analysis(
        &self,
        article_id: Uuid,
        summary: &str,
        keywords: &[String],
        relevance_score: f64,
    ) -> anyhow::Result<()> {
        let keywords_json = serde_json::to_value(keywords)?;
        sqlx::query(
            r"
            UPDATE scraped_articles
            SET summary = $2, keywords = $3, relevance_score = $4, status = 'analyzed'
            WHERE article_id = $1
            ",
        )
        .bind(article_id)
        .bind(summary)
        .bind(keywords_json)
        .bind(relevance_score)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_article_status(&self, article_id: Uuid, status: ArticleStatus) -> anyhow::Result<()> {
        sqlx::query("UPDATE scraped_articles SET status = $2 WHERE article_id = $1")
            .bind(article_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_article_full_text(&self, article_id: Uuid, full_text: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE scraped_articles SET full_text = $2 WHERE article_id = $1")
            .bind(article_id)
            .bind(full_text)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn active_templates_with_current_version(
        &self,
        account_id: &str,
    ) -> anyhow::Result<Vec<ActiveTemplate>> {
        let rows = sqlx::query(
            r"
            SELECT
                t.template_id, t.account_id, t.name, t.category, t.execution_order,
                t.media_type, t.parsing_method, t.ui_config, t.active,
                v.version_id, v.template_id AS v_template_id, v.version_number,
                v.prompt_text, v.system_message, v.is_current, v.created_at
            FROM prompt_templates t
            JOIN prompt_versions v ON v.template_id = t.template_id AND v.is_current = TRUE
            WHERE t.active = TRUE AND (t.account_id = $1 OR t.account_id = 'global')
            ORDER BY (t.account_id = 'global') ASC, t.execution_order ASC, t.name ASC
            ",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ActiveTemplate {
                    template: row_to_template(row)?,
                    version: row_to_version(row)?,
                })
            })
            .collect()
    }

    async fn get_template(&self, template_id: Uuid) -> anyhow::Result<Option<PromptTemplate>> {
        let row = sqlx::query(
            r"
            SELECT template_id, account_id, name, category, execution_order,
                   media_type, parsing_method, ui_config, active
            FROM prompt_templates
            WHERE template_id = $1
            ",
        )
        .bind(template_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_template).transpose()
    }

    async fn get_current_version(&self, template_id: Uuid) -> anyhow::Result<Option<PromptVersion>> {
        let row = sqlx::query(
            r"
            SELECT version_id, template_id, version_number, prompt_text, system_message,
                   is_current, created_at
            FROM prompt_versions
            WHERE template_id = $1 AND is_current = TRUE
            ",
        )
        .bind(template_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_version).transpose()
    }

    async fn create_draft_article(&self, article: &GeneratedArticle) -> anyhow::Result<Uuid> {
        sqlx::query(
            r"
            INSERT INTO generated_articles
                (gen_article_id, account_id, based_on_article_id, title, body, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(article.gen_article_id)
        .bind(&article.account_id)
        .bind(article.based_on_article_id)
        .bind(&article.title)
        .bind(&article.body)
        .bind(article.status.as_str())
        .bind(article.created_at)
        .execute(&self.pool)
        .await?;
        Ok(article.gen_article_id)
    }

    async fn get_generated_article(
        &self,
        account_id: &str,
        gen_article_id: Uuid,
    ) -> anyhow::Result<Option<GeneratedArticle>> {
        let row = sqlx::query(
            r"
            SELECT gen_article_id, account_id, based_on_article_id, title, body, status, created_at
            FROM generated_articles
            WHERE account_id = $1 AND gen_article_id = $2
            ",
        )
        .bind(account_id)
        .bind(gen_article_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_generated_article).transpose()
    }

    async fn update_generated_article_body(
        &self,
        gen_article_id: Uuid,
        title: &str,
        body: &str,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE generated_articles SET title = $2, body = $3 WHERE gen_article_id = $1")
            .bind(gen_article_id)
            .bind(title)
            .bind(body)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_generated_article_status(
        &self,
        gen_article_id: Uuid,
        status: GeneratedArticleStatus,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE generated_articles SET status = $2 WHERE gen_article_id = $1")
            .bind(gen_article_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn has_draft_or_review_pending(
        &self,
        account_id: &str,
        based_on_article_id: Uuid,
    ) -> anyhow::Result<bool> {
        let row = sqlx::query(
            r"
            SELECT EXISTS(
                SELECT 1 FROM generated_articles
                WHERE account_id = $1 AND based_on_article_id = $2
                  AND status IN ('draft', 'review_pending')
            ) as exists
            ",
        )
        .bind(account_id)
        .bind(based_on_article_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("exists")?)
    }

    async fn insert_generated_content(&self, content: &GeneratedContent) -> anyhow::Result<Uuid> {
        sqlx::query(
            r"
            INSERT INTO generated_content
                (content_id, account_id, based_on_gen_article_id, prompt_category,
                 content_data, metadata, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(content.content_id)
        .bind(&content.account_id)
        .bind(content.based_on_gen_article_id)
        .bind(&content.prompt_category)
        .bind(&content.content_data)
        .bind(&content.metadata)
        .bind(content.status.as_str())
        .bind(content.created_at)
        .execute(&self.pool)
        .await?;
        Ok(content.content_id)
    }

    async fn insert_ai_response_log(&self, log: &AiResponseLog) -> anyhow::Result<Uuid> {
        sqlx::query(
            r"
            INSERT INTO ai_response_logs
                (log_id, generated_article_id, template_id, version_id, category, provider,
                 model, prompt_text, system_message, response_text, tokens_input,
                 tokens_output, tokens_total, duration_ms, temperature, max_output_tokens,
                 stop_reason, is_complete, is_truncated, safety_ratings, success, error,
                 warning, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22, $23, $24)
            ",
        )
        .bind(log.log_id)
        .bind(log.generated_article_id)
        .bind(log.template_id)
        .bind(log.version_id)
        .bind(&log.category)
        .bind(&log.provider)
        .bind(&log.model)
        .bind(&log.prompt_text)
        .bind(&log.system_message)
        .bind(&log.response_text)
        .bind(log.tokens_input)
        .bind(log.tokens_output)
        .bind(log.tokens_total)
        .bind(log.duration_ms)
        .bind(log.temperature)
        .bind(log.max_output_tokens)
        .bind(&log.stop_reason)
        .bind(log.is_complete)
        .bind(log.is_truncated)
        .bind(&log.safety_ratings)
        .bind(log.success)
        .bind(&log.error)
        .bind(&log.warning)
        .bind(log.created_at)
        .execute(&self.pool)
        .await?;
        Ok(log.log_id)
    }
}
