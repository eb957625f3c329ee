//! In-memory `ContentStore` for tests that don't need a real Postgres instance.
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::dao_trait::ContentStore;
use crate::store::models::{
    ActiveTemplate, AiResponseLog, ArticleStatus, GeneratedArticle, GeneratedArticleStatus,
    GeneratedContent, NewsSource, PromptTemplate, PromptVersion, ScrapedArticle,
};

#[derive(Default)]
struct MockState {
    sources: Vec<NewsSource>,
    articles: Vec<ScrapedArticle>,
    templates: Vec<ActiveTemplate>,
    generated_articles: Vec<GeneratedArticle>,
    generated_content: Vec<GeneratedContent>,
    ai_logs: Vec<AiResponseLog>,
}

/// Mock `ContentStore` backed by `Mutex`-guarded vectors, seeded directly by tests via
/// the `seed_*` helpers rather than going through SQL.
pub struct MockContentStore {
    state: Mutex<MockState>,
}

impl MockContentStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn seed_source(&self, source: NewsSource) {
        self.state.lock().unwrap().sources.push(source);
    }

    pub fn seed_article(&self, article: ScrapedArticle) {
        self.state.lock().unwrap().articles.push(article);
    }

    pub fn seed_template(&self, active: ActiveTemplate) {
        self.state.lock().unwrap().templates.push(active);
    }

    pub fn generated_articles(&self) -> Vec<GeneratedArticle> {
        self.state.lock().unwrap().generated_articles.clone()
    }

    pub fn generated_content(&self) -> Vec<GeneratedContent> {
        self.state.lock().unwrap().generated_content.clone()
    }

    pub fn ai_logs(&self) -> Vec<AiResponseLog> {
        self.state.lock().unwrap().ai_logs.clone()
    }
}

impl Default for MockContentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for MockContentStore {
    fn pool(&self) -> Option<&PgPool> {
        None
    }

    async fn active_sources(&self, account_id: &str) -> anyhow::Result<Vec<NewsSource>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .sources
            .iter()
            .filter(|s| s.account_id == account_id && s.active)
            .cloned()
            .collect())
    }

    async fn get_source(
        &self,
        account_id: &str,
        source_id: Uuid,
    ) -> anyhow::Result<Option<NewsSource>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .sources
            .iter()
            .find(|s| s.account_id == account_id && s.source_id == source_id)
            .cloned())
    }

    async fn mark_source_checked(
        &self,
        source_id: Uuid,
        checked_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(s) = state.sources.iter_mut().find(|s| s.source_id == source_id) {
            s.last_checked_at = Some(checked_at);
        }
        Ok(())
    }

    async fn insert_article_if_new(
        &self,
        article: &ScrapedArticle,
    ) -> anyhow::Result<Option<Uuid>> {
        let mut state = self.state.lock().unwrap();
        let exists = state
            .articles
            .iter()
            .any(|a| a.account_id == article.account_id && a.url == article.url);
        if exists {
            return Ok(None);
        }
        state.articles.push(article.clone());
        Ok(Some(article.article_id))
    }

    async fn get_article(
        &self,
        account_id: &str,
        article_id: Uuid,
    ) -> anyhow::Result<Option<ScrapedArticle>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .articles
            .iter()
            .find(|a| a.account_id == account_id && a.article_id == article_id)
            .cloned())
    }

    async fn articles_by_status(
        &self,
        account_id: &str,
        status: ArticleStatus,
        limit: i64,
    ) -> anyhow::Result<Vec<ScrapedArticle>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .articles
            .iter()
            .filter(|a| a.account_id == account_id && a.status == status)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn top_articles_by_relevance(
        &self,
        account_id: &str,
        limit: i64,
    ) -> anyhow::Result<Vec<ScrapedArticle>> {
        let mut articles: Vec<ScrapedArticle> = self
            .state
            .lock()
            .unwrap()
            .articles
            .iter()
            .filter(|a| a.account_id == account_id && a.status != ArticleStatus::Processed)
            .cloned()
            .collect();
        articles.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        articles.truncate(limit.max(0) as usize);
        Ok(articles)
    }

    async fn update_article_analysis(
        &self,
        article_id: Uuid,
        summary: &str,
        keywords: &[String],
        relevance_score: f64,
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(a) = state.articles.iter_mut().find(|a| a.article_id == article_id) {
            a.summary = Some(summary.to_string());
            a.keywords = Some(keywords.to_vec());
            a.relevance_score = Some(relevance_score);
            a.status = ArticleStatus::Analyzed;
        }
        Ok(())
    }

    async fn set_article_status(&self, article_id: Uuid, status: ArticleStatus) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(a) = state.articles.iter_mut().find(|a| a.article_id == article_id) {
            a.status = status;
        }
        Ok(())
    }

    async fn set_article_full_text(&self, article_id: Uuid, full_text: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(a) = state.articles.iter_mut().find(|a| a.article_id == article_id) {
            a.full_text = full_text.to_string();
        }
        Ok(())
    }

    async fn active_templates_with_current_version(
        &self,
        account_id: &str,
    ) -> anyhow::Result<Vec<ActiveTemplate>> {
        let mut templates: Vec<ActiveTemplate> = self
            .state
            .lock()
            .unwrap()
            .templates
            .iter()
            .filter(|t| {
                t.template.active
                    && (t.template.account_id == account_id || t.template.account_id == "global")
            })
            .cloned()
            .collect();
        templates.sort_by(|a, b| {
            let a_global = a.template.account_id == "global";
            let b_global = b.template.account_id == "global";
            a_global
                .cmp(&b_global)
                .then(a.template.execution_order.cmp(&b.template.execution_order))
                .then(a.template.name.cmp(&b.template.name))
        });
        Ok(templates)
    }

    async fn get_template(&self, template_id: Uuid) -> anyhow::Result<Option<PromptTemplate>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .templates
            .iter()
            .find(|t| t.template.template_id == template_id)
            .map(|t| t.template.clone()))
    }

    async fn get_current_version(&self, template_id: Uuid) -> anyhow::Result<Option<PromptVersion>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .templates
            .iter()
            .find(|t| t.template.template_id == template_id)
            .map(|t| t.version.clone()))
    }

    async fn create_draft_article(&self, article: &GeneratedArticle) -> anyhow::Result<Uuid> {
        let mut state = self.state.lock().unwrap();
        state.generated_articles.push(article.clone());
        Ok(article.gen_article_id)
    }

    async fn get_generated_article(
        &self,
        account_id: &str,
        gen_article_id: Uuid,
    ) -> anyhow::Result<Option<GeneratedArticle>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .generated_articles
            .iter()
            .find(|a| a.account_id == account_id && a.gen_article_id == gen_article_id)
            .cloned())
    }

    async fn update_generated_article_body(
        &self,
        gen_article_id: Uuid,
        title: &str,
        body: &str,
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(a) = state
            .generated_articles
            .iter_mut()
            .find(|a| a.gen_article_id == gen_article_id)
        {
            a.title = title.to_string();
            a.body = body.to_string();
        }
        Ok(())
    }

    async fn set_generated_article_status(
        &self,
        gen_article_id: Uuid,
        status: GeneratedArticleStatus,
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(a) = state
            .generated_articles
            .iter_mut()
            .find(|a| a.gen_article_id == gen_article_id)
        {
            a.status = status;
        }
        Ok(())
    }

    async fn has_draft_or_review_pending(
        &self,
        account_id: &str,
        based_on_article_id: Uuid,
    ) -> anyhow::Result<bool> {
        Ok(self.state.lock().unwrap().generated_articles.iter().any(|a| {
            a.account_id == account_id
                && a.based_on_article_id == Some(based_on_article_id)
                && matches!(
                    a.status,
                    GeneratedArticleStatus::Draft | GeneratedArticleStatus::ReviewPending
                )
        }))
    }

    async fn insert_generated_content(&self, content: &GeneratedContent) -> anyhow::Result<Uuid> {
        let mut state = self.state.lock().unwrap();
        state.generated_content.push(content.clone());
        Ok(content.content_id)
    }

    async fn insert_ai_response_log(&self, log: &AiResponseLog) -> anyhow::Result<Uuid> {
        let mut state = self.state.lock().unwrap();
        state.ai_logs.push(log.clone());
        Ok(log.log_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::MediaType;

    fn sample_article(account_id: &str, url: &str) -> ScrapedArticle {
        ScrapedArticle {
            article_id: Uuid::new_v4(),
            account_id: account_id.to_string(),
            source_id: Uuid::new_v4(),
            title: "Title".to_string(),
            url: url.to_string(),
            published_at: None,
            full_text: "body text".to_string(),
            status: ArticleStatus::Scraped,
            summary: None,
            keywords: None,
            relevance_score: None,
            scraped_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_article_if_new_is_idempotent_by_url() {
        let store = MockContentStore::new();
        let a = sample_article("acct-1", "https://example.com/a");
        assert!(store.insert_article_if_new(&a).await.unwrap().is_some());
        let dup = sample_article("acct-1", "https://example.com/a");
        assert!(store.insert_article_if_new(&dup).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn top_articles_by_relevance_orders_descending() {
        let store = MockContentStore::new();
        let mut low = sample_article("acct-1", "https://example.com/low");
        low.relevance_score = Some(0.2);
        let mut high = sample_article("acct-1", "https://example.com/high");
        high.relevance_score = Some(0.9);
        store.insert_article_if_new(&low).await.unwrap();
        store.insert_article_if_new(&high).await.unwrap();

        let top = store.top_articles_by_relevance("acct-1", 10).await.unwrap();
        assert_eq!(top[0].url, "https://example.com/high");
    }

    #[tokio::test]
    async fn active_templates_order_tenant_before_global() {
        let store = MockContentStore::new();
        let global = ActiveTemplate {
            template: PromptTemplate {
                template_id: Uuid::new_v4(),
                account_id: "global".to_string(),
                name: "blog".to_string(),
                category: "blog".to_string(),
                execution_order: 1,
                media_type: MediaType::Text,
                parsing_method: "generic_text".to_string(),
                ui_config: serde_json::json!({}),
                active: true,
            },
            version: PromptVersion {
                version_id: Uuid::new_v4(),
                template_id: Uuid::new_v4(),
                version_number: 1,
                prompt_text: "{article_content}".to_string(),
                system_message: None,
                is_current: true,
                created_at: Utc::now(),
            },
        };
        let mut tenant = global.clone();
        tenant.template.account_id = "acct-1".to_string();
        store.seed_template(global);
        store.seed_template(tenant.clone());

        let ordered = store
            .active_templates_with_current_version("acct-1")
            .await
            .unwrap();
        assert_eq!(ordered.len(), 2);
        assert_eq!(ordered[0].template.account_id, "acct-1");
        assert_eq!(ordered[1].template.account_id, "global");
    }
}
