//! C4 Analyser: summarises and scores scraped articles via the AI provider. Runs a
//! bounded number of articles concurrently (default 4, via `tokio::sync::Semaphore`,
//! the teacher's own choice for bounding its classification worker pool) with at least
//! a 1s delay between AI calls per article to stay inside provider rate limits. Any
//! single AI failure marks that article `failed` and the batch continues — per-article
//! errors never propagate to the caller.
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::clients::ai_provider::{AiProvider, GenerateRequest};
use crate::observability::metrics::Metrics;
use crate::store::dao::ContentStore;
use crate::store::models::ArticleStatus;

const DEFAULT_CONCURRENCY: usize = 4;
const MIN_CALL_SPACING: Duration = Duration::from_secs(1);
const SUMMARY_MODEL: &str = "analysis-default";

pub struct Analyser {
    store: Arc<dyn ContentStore>,
    provider: Arc<dyn AiProvider>,
    metrics: Arc<Metrics>,
    concurrency: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AnalysisOutcome {
    pub analyzed: u32,
    pub failed: u32,
}

impl Analyser {
    #[must_use]
    pub fn new(store: Arc<dyn ContentStore>, provider: Arc<dyn AiProvider>, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            provider,
            metrics,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Analyses a single already-fetched article, used by the `url_analysis` handler
    /// rather than the batch path since that job type targets exactly one article.
    pub async fn analyse_one_article(&self, account_id: &str, article_id: Uuid) -> anyhow::Result<()> {
        let article = self
            .store
            .get_article(account_id, article_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("article {article_id} not found for account {account_id}"))?;
        let result = analyse_one(&*self.store, &*self.provider, article_id, &article.full_text).await;
        match &result {
            Ok(()) => self.metrics.articles_analyzed.inc(),
            Err(_) => self.metrics.articles_analysis_failed.inc(),
        }
        result
    }

    /// Analyses up to `limit` scraped articles for `account_id`, returning the count
    /// actually analysed (failures are not retried within this call).
    pub async fn analyse_batch(&self, account_id: &str, limit: i64) -> anyhow::Result<AnalysisOutcome> {
        let articles = self
            .store
            .articles_by_status(account_id, ArticleStatus::Scraped, limit)
            .await?;

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut outcome = AnalysisOutcome::default();
        let mut handles = Vec::with_capacity(articles.len());

        for article in articles {
            let semaphore = semaphore.clone();
            let store = self.store.clone();
            let provider = self.provider.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore never closed");
                let result = analyse_one(&*store, &*provider, article.article_id, &article.full_text).await;
                tokio::time::sleep(MIN_CALL_SPACING).await;
                result
            }));
        }

        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {
                    outcome.analyzed += 1;
                    self.metrics.articles_analyzed.inc();
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "article analysis failed");
                    outcome.failed += 1;
                    self.metrics.articles_analysis_failed.inc();
                }
                Err(join_err) => {
                    tracing::error!(error = %join_err, "analysis task panicked");
                    outcome.failed += 1;
                    self.metrics.articles_analysis_failed.inc();
                }
            }
        }

        Ok(outcome)
    }
}

async fn analyse_one(
    store: &dyn ContentStore,
    provider: &dyn AiProvider,
    article_id: Uuid,
    full_text: &str,
) -> anyhow::Result<()> {
    let prompt = format!(
        "Summarise the following article in at most two sentences, extract a short list \
         of keywords, and rate its relevance on a 0.0-1.0 scale. Article:\n\n{full_text}"
    );

    let response = provider
        .generate(GenerateRequest {
            prompt,
            system_message: Some(
                "Respond as JSON: {\"summary\": string, \"keywords\": [string], \"relevance_score\": number}"
                    .to_string(),
            ),
            temperature: 0.3,
            max_output_tokens: 400,
            model: SUMMARY_MODEL.to_string(),
        })
        .await;

    let response = match response {
        Ok(r) => r,
        Err(e) => {
            store.set_article_status(article_id, ArticleStatus::Failed).await?;
            return Err(anyhow::anyhow!("AI analysis call failed: {e}"));
        }
    };

    let parsed: Value = serde_json::from_str(&response.text).unwrap_or_else(|_| {
        serde_json::json!({"summary": response.text.clone(), "keywords": [], "relevance_score": 0.5})
    });

    let summary = parsed
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or(&response.text)
        .to_string();
    let keywords: Vec<String> = parsed
        .get("keywords")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    let relevance_score = parsed
        .get("relevance_score")
        .and_then(Value::as_f64)
        .unwrap_or(0.5)
        .clamp(0.0, 1.0);

    store
        .update_article_analysis(article_id, &summary, &keywords, relevance_score)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ai_provider::{AiProviderError, GenerateResponse};
    use crate::store::dao::MockContentStore;
    use crate::store::models::ScrapedArticle;
    use async_trait::async_trait;
    use chrono::Utc;

    fn test_metrics() -> Arc<Metrics> {
        Arc::new(Metrics::new(Arc::new(prometheus::Registry::new())).expect("metrics register"))
    }

    struct StubProvider {
        response: Result<GenerateResponse, String>,
    }

    #[async_trait]
    impl AiProvider for StubProvider {
        async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse, AiProviderError> {
            match &self.response {
                Ok(r) => Ok(r.clone()),
                Err(msg) => Err(AiProviderError::Fatal { message: msg.clone() }),
            }
        }
    }

    fn sample_article() -> ScrapedArticle {
        ScrapedArticle {
            article_id: Uuid::new_v4(),
            account_id: "acct-1".to_string(),
            source_id: Uuid::new_v4(),
            title: "t".to_string(),
            url: "https://example.com/x".to_string(),
            published_at: None,
            full_text: "some long article body".to_string(),
            status: ArticleStatus::Scraped,
            summary: None,
            keywords: None,
            relevance_score: None,
            scraped_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn failed_ai_call_marks_article_failed_and_continues() {
        let store = Arc::new(MockContentStore::new());
        let article = sample_article();
        let article_id = article.article_id;
        store.insert_article_if_new(&article).await.unwrap();

        let provider: Arc<dyn AiProvider> = Arc::new(StubProvider {
            response: Err("boom".to_string()),
        });
        let analyser = Analyser::new(store.clone(), provider, test_metrics());
        let outcome = analyser.analyse_batch("acct-1", 10).await.unwrap();

        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.analyzed, 0);
        let stored = store.get_article("acct-1", article_id).await.unwrap().unwrap();
        assert_eq!(stored.status, ArticleStatus::Failed);
    }

    #[tokio::test]
    async fn successful_call_clamps_out_of_range_relevance_score() {
        let store = Arc::new(MockContentStore::new());
        let article = sample_article();
        let article_id = article.article_id;
        store.insert_article_if_new(&article).await.unwrap();

        let provider: Arc<dyn AiProvider> = Arc::new(StubProvider {
            response: Ok(GenerateResponse {
                text: serde_json::json!({
                    "summary": "a summary",
                    "keywords": ["a", "b"],
                    "relevance_score": 1.5
                })
                .to_string(),
                tokens_in: 10,
                tokens_out: 20,
                stop_reason: "STOP".to_string(),
                safety_ratings: None,
                duration_ms: 5,
            }),
        });
        let analyser = Analyser::new(store.clone(), provider, test_metrics());
        let outcome = analyser.analyse_batch("acct-1", 10).await.unwrap();

        assert_eq!(outcome.analyzed, 1);
        let stored = store.get_article("acct-1", article_id).await.unwrap().unwrap();
        assert_eq!(stored.relevance_score, Some(1.0));
        assert_eq!(stored.status, ArticleStatus::Analyzed);
    }
}
