//! C9 Pipeline Orchestrator: the single `JobHandler` implementation, dispatching each
//! claimed job to the matching pipeline stage by `job_type`. Fetch, analyse and generate
//! are each separate components (C3/C4/C6); this module only sequences them and reports
//! progress, the same "thin coordinator over independently-testable stages" shape the
//! teacher's now-retired `PipelineOrchestrator` used for its seven fixed stages — here the
//! stages are looked up by job type instead of always running in a fixed order.
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::clients::ai_provider::AiProvider;
use crate::clients::source_fetcher::{cap_for_persistence, SourceFetcher};
use crate::observability::metrics::Metrics;
use crate::store::dao::ContentStore;
use crate::store::models::{ArticleStatus, Job, JobPayload, ScrapedArticle};
use crate::worker::handler::JobHandler;
use crate::worker::logger::JobLogger;
use crate::worker::progress::ProgressReporter;

use super::analyser::Analyser;
use super::generator::ContentGenerator;

pub struct PipelineOrchestrator {
    store: Arc<dyn ContentStore>,
    fetcher: Arc<SourceFetcher>,
    analyser: Analyser,
    generator: ContentGenerator,
}

impl PipelineOrchestrator {
    #[must_use]
    pub fn new(
        store: Arc<dyn ContentStore>,
        fetcher: Arc<SourceFetcher>,
        provider: Arc<dyn AiProvider>,
        metrics: Arc<Metrics>,
        analysis_concurrency: usize,
    ) -> Self {
        let analyser = Analyser::new(store.clone(), provider.clone(), Arc::clone(&metrics))
            .with_concurrency(analysis_concurrency);
        let generator = ContentGenerator::new(store.clone(), provider, metrics);
        Self {
            store,
            fetcher,
            analyser,
            generator,
        }
    }

    fn parse_payload(job: &Job) -> anyhow::Result<JobPayload> {
        let mut payload = job.payload.clone();
        if let Value::Object(ref mut map) = payload {
            map.insert("jobType".to_string(), Value::String(job.job_type.clone()));
        }
        Ok(serde_json::from_value(payload)?)
    }

    async fn run_news_aggregation(
        &self,
        account_id: &str,
        source_id: Option<Uuid>,
        single_source: bool,
        logger: &JobLogger,
    ) -> anyhow::Result<Value> {
        let sources = if let Some(source_id) = source_id {
            self.store
                .get_source(account_id, source_id)
                .await?
                .into_iter()
                .collect::<Vec<_>>()
        } else {
            self.store.active_sources(account_id).await?
        };

        let mut aggregated = 0u32;
        let mut sources_failed = 0u32;

        for source in sources {
            let fetched = if let Some(feed_url) = &source.feed_url {
                self.fetcher.fetch_feed(feed_url).await
            } else {
                self.fetcher.scrape_page(&source.homepage_url, false).await
            };

            let records = match fetched {
                Ok(records) => records,
                Err(e) => {
                    logger
                        .warn("news_aggregation", &format!("source {} failed: {e}", source.source_id))
                        .await;
                    sources_failed += 1;
                    continue;
                }
            };

            for record in records {
                let article = ScrapedArticle {
                    article_id: Uuid::now_v7(),
                    account_id: account_id.to_string(),
                    source_id: source.source_id,
                    title: record.title,
                    url: record.url,
                    published_at: record.published_at,
                    full_text: cap_for_persistence(&record.text),
                    status: ArticleStatus::Scraped,
                    summary: None,
                    keywords: None,
                    relevance_score: None,
                    scraped_at: crate::util::time::now(),
                };
                if self.store.insert_article_if_new(&article).await?.is_some() {
                    aggregated += 1;
                }
            }

            self.store
                .mark_source_checked(source.source_id, crate::util::time::now())
                .await?;

            if single_source {
                break;
            }
        }

        Ok(serde_json::json!({
            "articlesAggregated": aggregated,
            "sourcesFailed": sources_failed,
        }))
    }

    async fn run_ai_analysis(&self, account_id: &str, limit: i64) -> anyhow::Result<Value> {
        let outcome = self.analyser.analyse_batch(account_id, limit).await?;
        Ok(serde_json::json!({
            "articlesAnalyzed": outcome.analyzed,
            "articlesFailed": outcome.failed,
        }))
    }

    async fn run_url_analysis(
        &self,
        account_id: &str,
        article_id: Uuid,
        url: &str,
        logger: &JobLogger,
    ) -> anyhow::Result<Value> {
        let records = self.fetcher.scrape_page(url, true).await.unwrap_or_default();
        let text = records.into_iter().map(|r| r.text).collect::<Vec<_>>().join("\n\n");

        if text.is_empty() {
            logger
                .warn("url_analysis", &format!("no extractable text at {url}"))
                .await;
            self.store.set_article_status(article_id, ArticleStatus::Failed).await?;
            return Ok(serde_json::json!({"analyzed": false, "reason": "no_extractable_text"}));
        }

        self.store
            .set_article_full_text(article_id, &cap_for_persistence(&text))
            .await?;

        let outcome = self.analyser.analyse_one_article(account_id, article_id).await;
        match outcome {
            Ok(()) => Ok(serde_json::json!({"analyzed": true})),
            Err(e) => {
                logger.warn("url_analysis", &format!("analysis failed: {e}")).await;
                Ok(serde_json::json!({"analyzed": false, "reason": "analysis_failed"}))
            }
        }
    }

    async fn run_content_generation(
        &self,
        account_id: &str,
        limit: i64,
        specific_story_id: Option<Uuid>,
    ) -> anyhow::Result<Value> {
        let articles = if let Some(article_id) = specific_story_id {
            self.store
                .get_article(account_id, article_id)
                .await?
                .into_iter()
                .collect::<Vec<_>>()
        } else {
            self.store.top_articles_by_relevance(account_id, limit).await?
        };

        let mut generated = 0u32;
        let mut skipped = 0u32;

        for article in articles {
            match self.generator.generate_for_article(account_id, &article).await? {
                Some(_) => generated += 1,
                None => skipped += 1,
            }
        }

        Ok(serde_json::json!({
            "articlesGenerated": generated,
            "articlesSkipped": skipped,
        }))
    }

    async fn run_full_cycle(
        &self,
        account_id: &str,
        logger: &JobLogger,
        progress: &ProgressReporter,
    ) -> anyhow::Result<Value> {
        progress.report(10, "news aggregation").await;
        let aggregation = self.run_news_aggregation(account_id, None, false, logger).await?;

        progress.report(35, "ai analysis").await;
        let analysis = self.run_ai_analysis(account_id, 20).await?;

        progress.report(65, "content generation").await;
        let generation = self.run_content_generation(account_id, 5, None).await?;

        progress.report(95, "finishing up").await;

        Ok(serde_json::json!({
            "aggregation": aggregation,
            "analysis": analysis,
            "generation": generation,
        }))
    }
}

#[async_trait]
impl JobHandler for PipelineOrchestrator {
    async fn handle(
        &self,
        job: &Job,
        logger: &JobLogger,
        progress: &ProgressReporter,
    ) -> anyhow::Result<Value> {
        let payload = Self::parse_payload(job)?;

        match payload {
            JobPayload::NewsAggregation {
                source_id,
                single_source,
                ..
            } => {
                progress.report(10, "fetching sources").await;
                let result = self
                    .run_news_aggregation(&job.account_id, source_id, single_source, logger)
                    .await?;
                progress.report(100, "done").await;
                Ok(result)
            }
            JobPayload::AiAnalysis { limit, .. } => {
                progress.report(10, "analysing articles").await;
                let result = self.run_ai_analysis(&job.account_id, limit).await?;
                progress.report(100, "done").await;
                Ok(result)
            }
            JobPayload::UrlAnalysis { article_id, url, .. } => {
                progress.report(10, "fetching url").await;
                let result = self
                    .run_url_analysis(&job.account_id, article_id, &url, logger)
                    .await?;
                progress.report(100, "done").await;
                Ok(result)
            }
            JobPayload::ContentGeneration {
                limit,
                specific_story_id,
                ..
            } => {
                progress.report(10, "generating content").await;
                let result = self
                    .run_content_generation(&job.account_id, limit, specific_story_id)
                    .await?;
                progress.report(100, "done").await;
                Ok(result)
            }
            JobPayload::FullCycle { .. } => self.run_full_cycle(&job.account_id, logger, progress).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::JobStatus;
    use chrono::Utc;

    fn job_with(job_type: &str, payload: Value) -> Job {
        Job {
            job_id: Uuid::new_v4(),
            account_id: "acct-1".to_string(),
            job_type: job_type.to_string(),
            status: JobStatus::Processing,
            priority: 0,
            payload,
            results: None,
            error: None,
            progress_pct: 0,
            progress_detail: None,
            retry_count: 0,
            max_retries: 3,
            worker_id: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn parse_payload_injects_job_type_tag() {
        let job = job_with("ai_analysis", serde_json::json!({"limit": 7}));
        let payload = PipelineOrchestrator::parse_payload(&job).unwrap();
        match payload {
            JobPayload::AiAnalysis { limit, .. } => assert_eq!(limit, 7),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn parse_payload_defaults_missing_fields() {
        let job = job_with("content_generation", serde_json::json!({}));
        let payload = PipelineOrchestrator::parse_payload(&job).unwrap();
        match payload {
            JobPayload::ContentGeneration { limit, specific_story_id, .. } => {
                assert_eq!(limit, 5);
                assert_eq!(specific_story_id, None);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
