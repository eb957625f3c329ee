//! C6 Content Generator: drafts a `GeneratedArticle`, then runs every active template
//! in `execution_order`, substituting placeholders from prior templates' outputs into
//! each prompt before calling the AI provider. The first `category = "blog"` template
//! updates the draft article's title/body directly; every other template writes a
//! `GeneratedContent` row referencing it. An `AIResponseLog` row is written for every
//! call, successful or not, before the next template runs — the append-only provenance
//! contract.
use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;
use uuid::Uuid;

use crate::clients::ai_provider::{AiProvider, GenerateRequest};
use crate::observability::metrics::Metrics;
use crate::store::dao::ContentStore;
use crate::store::models::{AiResponseLog, GeneratedArticle, GeneratedArticleStatus, GeneratedContent, ScrapedArticle};

use super::templates::TemplateRegistry;

const DEFAULT_TEMPERATURE: f64 = 0.7;
const DEFAULT_MAX_OUTPUT_TOKENS: i32 = 1500;
const BLOG_CATEGORY: &str = "blog";
const GENERATOR_MODEL: &str = "generation-default";

pub struct ContentGenerator {
    store: Arc<dyn ContentStore>,
    provider: Arc<dyn AiProvider>,
    templates: TemplateRegistry,
    metrics: Arc<Metrics>,
}

impl ContentGenerator {
    #[must_use]
    pub fn new(store: Arc<dyn ContentStore>, provider: Arc<dyn AiProvider>, metrics: Arc<Metrics>) -> Self {
        let templates = TemplateRegistry::new(store.clone());
        Self { store, provider, templates, metrics }
    }

    /// Runs the full template pipeline for one source article. Returns the created
    /// `GeneratedArticle`'s id, or `Ok(None)` if generation was skipped because the
    /// article already has a draft or review-pending generated article in flight.
    pub async fn generate_for_article(
        &self,
        account_id: &str,
        article: &ScrapedArticle,
    ) -> anyhow::Result<Option<Uuid>> {
        if self
            .store
            .has_draft_or_review_pending(account_id, article.article_id)
            .await?
        {
            return Ok(None);
        }

        let now = crate::util::time::now();
        let draft = GeneratedArticle {
            gen_article_id: Uuid::now_v7(),
            account_id: account_id.to_string(),
            based_on_article_id: Some(article.article_id),
            title: article.title.clone(),
            body: String::new(),
            status: GeneratedArticleStatus::Draft,
            created_at: now,
        };
        let gen_article_id = self.store.create_draft_article(&draft).await?;

        let templates = self.templates.active_templates(account_id).await?;

        let mut placeholders: HashMap<String, String> = HashMap::new();
        placeholders.insert("article_content".to_string(), article.full_text.clone());
        placeholders.insert(
            "analysis_output".to_string(),
            article.summary.clone().unwrap_or_default(),
        );

        let mut blog_template_seen = false;

        for active in &templates {
            let prompt = substitute_placeholders(&active.version.prompt_text, &placeholders);

            let call_started = std::time::Instant::now();
            let generation = self
                .provider
                .generate(GenerateRequest {
                    prompt: prompt.clone(),
                    system_message: active.version.system_message.clone(),
                    temperature: DEFAULT_TEMPERATURE,
                    max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
                    model: GENERATOR_MODEL.to_string(),
                })
                .await;

            let (response_text, tokens_in, tokens_out, stop_reason, safety_ratings, success, error) =
                match generation {
                    Ok(resp) => (
                        resp.text,
                        resp.tokens_in,
                        resp.tokens_out,
                        resp.stop_reason,
                        resp.safety_ratings,
                        true,
                        None,
                    ),
                    Err(e) => (
                        String::new(),
                        0,
                        0,
                        "ERROR".to_string(),
                        None,
                        false,
                        Some(e.to_string()),
                    ),
                };

            let is_complete = stop_reason == "STOP";
            let is_truncated = stop_reason == "MAX_TOKENS";

            let (content_data, parse_warning) = if success {
                parse_response(&active.template.parsing_method, &response_text)
            } else {
                (Value::Null, None)
            };

            let log = AiResponseLog {
                log_id: Uuid::now_v7(),
                generated_article_id: gen_article_id,
                template_id: active.template.template_id,
                version_id: active.version.version_id,
                category: active.template.category.clone(),
                provider: "http".to_string(),
                model: GENERATOR_MODEL.to_string(),
                prompt_text: prompt,
                system_message: active.version.system_message.clone(),
                response_text: response_text.clone(),
                tokens_input: tokens_in,
                tokens_output: tokens_out,
                tokens_total: tokens_in + tokens_out,
                duration_ms: call_started.elapsed().as_millis() as i64,
                temperature: DEFAULT_TEMPERATURE,
                max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
                stop_reason,
                is_complete,
                is_truncated,
                safety_ratings,
                success,
                error,
                warning: parse_warning,
                created_at: crate::util::time::now(),
            };
            self.store.insert_ai_response_log(&log).await?;

            if !success {
                // Per-template failures are swallowed: partial output is preserved and
                // the next template still sees this one's placeholder as empty.
                placeholders.insert(placeholder_key(&active.template.category), String::new());
                continue;
            }

            if active.template.category == BLOG_CATEGORY && !blog_template_seen {
                blog_template_seen = true;
                self.store
                    .update_generated_article_body(gen_article_id, &article.title, &response_text)
                    .await?;
                self.metrics.content_artifacts_generated.inc();
            } else {
                let content = GeneratedContent {
                    content_id: Uuid::now_v7(),
                    account_id: account_id.to_string(),
                    based_on_gen_article_id: gen_article_id,
                    prompt_category: active.template.category.clone(),
                    content_data,
                    metadata: serde_json::json!({"template_id": active.template.template_id}),
                    status: GeneratedArticleStatus::Draft,
                    created_at: crate::util::time::now(),
                };
                self.store.insert_generated_content(&content).await?;
                self.metrics.content_artifacts_generated.inc();
            }

            placeholders.insert(placeholder_key(&active.template.category), response_text);
        }

        self.store
            .set_generated_article_status(gen_article_id, GeneratedArticleStatus::ReviewPending)
            .await?;
        self.store
            .set_article_status(article.article_id, crate::store::models::ArticleStatus::Processed)
            .await?;

        Ok(Some(gen_article_id))
    }
}

fn placeholder_key(category: &str) -> String {
    format!("{category}_output")
}

/// Substitutes `{name}` tokens with values from `placeholders`. A token with no entry
/// is left as a literal (e.g. `{unknown_thing}` stays in the text verbatim) rather than
/// causing an error — the tolerant-substitution rule.
fn substitute_placeholders(template: &str, placeholders: &HashMap<String, String>) -> String {
    let re = Regex::new(r"\{(\w+)\}").expect("placeholder pattern is a valid regex literal");
    re.replace_all(template, |caps: &regex::Captures| {
        let key = &caps[1];
        placeholders
            .get(key)
            .cloned()
            .unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}

/// Parses a raw AI response per the template's `parsing_method`. Parse failures return
/// the raw text wrapped as `{"raw": text}` plus a warning rather than erroring the
/// whole generation — the provider-soft row in the error handling design.
fn parse_response(parsing_method: &str, raw: &str) -> (Value, Option<String>) {
    match parsing_method {
        "social_media_json" | "video_script_json" => match serde_json::from_str::<Value>(raw) {
            Ok(value) => (value, None),
            Err(e) => (
                serde_json::json!({"raw": raw}),
                Some(format!("failed to parse {parsing_method} output as JSON: {e}")),
            ),
        },
        "prayer_points_numbered_list" | "image_prompt_list" => {
            let items = parse_numbered_or_bulleted_list(raw);
            (serde_json::json!({"items": items}), None)
        }
        _ => (serde_json::json!({"text": raw}), None),
    }
}

fn parse_numbered_or_bulleted_list(raw: &str) -> Vec<String> {
    let leading_marker = Regex::new(r"^\s*(\d+[.)]|[-*])\s*").expect("list marker pattern is valid");
    raw.lines()
        .map(|line| leading_marker.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitute_placeholders_fills_known_tokens() {
        let mut placeholders = HashMap::new();
        placeholders.insert("article_content".to_string(), "the body".to_string());
        let result = substitute_placeholders("Summarise: {article_content}", &placeholders);
        assert_eq!(result, "Summarise: the body");
    }

    #[test]
    fn substitute_placeholders_leaves_unknown_tokens_literal() {
        let placeholders = HashMap::new();
        let result = substitute_placeholders("Use {unknown_thing} here", &placeholders);
        assert_eq!(result, "Use {unknown_thing} here");
    }

    #[test]
    fn parse_response_generic_text_wraps_raw() {
        let (value, warning) = parse_response("generic_text", "hello world");
        assert_eq!(value, serde_json::json!({"text": "hello world"}));
        assert!(warning.is_none());
    }

    #[test]
    fn parse_response_social_media_json_falls_back_on_malformed_input() {
        let (value, warning) = parse_response("social_media_json", "not json");
        assert_eq!(value, serde_json::json!({"raw": "not json"}));
        assert!(warning.is_some());
    }

    #[test]
    fn parse_numbered_list_strips_markers() {
        let raw = "1. first point\n2. second point\n";
        let items = parse_numbered_or_bulleted_list(raw);
        assert_eq!(items, vec!["first point".to_string(), "second point".to_string()]);
    }
}
