//! C3 Source Fetcher: feed mode (`feed-rs`, RSS/Atom) and scrape mode (`scraper`, CSS
//! selector DOM queries), sharing one `reqwest::Client` with a fixed User-Agent and
//! 30s timeout. Selector priority and length thresholds follow the fetch contract.
use std::sync::Arc;
use std::time::{Duration, Instant};

use scraper::{Html, Selector};
use url::Url;

use crate::observability::metrics::Metrics;
use crate::util::text::{collapse_whitespace, strip_control_chars, truncate_chars};

const USER_AGENT: &str = "contentflow-worker/1.0 (+https://github.com/Kaikei-e/Alt)";
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const FEED_BATCH_LIMIT: usize = 20;
const SCRAPE_BATCH_LIMIT: usize = 10;
const MIN_FEED_ENTRY_CHARS: usize = 100;
const MIN_SCRAPE_ELEMENT_CHARS: usize = 50;
const PERSISTED_TEXT_CAP: usize = 10_000;
const PRE_PERSIST_TEXT_CAP: usize = 5_000;

/// The prioritised selector list from the scrape contract: the first selector that
/// matches at least one element wins, subsequent selectors are never tried.
const SCRAPE_SELECTORS: &[&str] = &[
    "article",
    ".post",
    ".news-item",
    ".article",
    ".entry",
    "[class*=\"article\"]",
    "[class*=\"post\"]",
];

/// A more permissive selector list used by the `url_analysis` handler, which fetches a
/// single arbitrary URL rather than a known, curated source.
const PERMISSIVE_SCRAPE_SELECTORS: &[&str] = &[
    "article",
    ".post",
    ".news-item",
    ".article",
    ".entry",
    "[class*=\"article\"]",
    "[class*=\"post\"]",
    "main",
    "body",
];

#[derive(Debug, Clone)]
pub struct FetchedRecord {
    pub title: String,
    pub url: String,
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
    pub text: String,
}

pub struct SourceFetcher {
    client: reqwest::Client,
    metrics: Arc<Metrics>,
}

impl SourceFetcher {
    pub fn new(metrics: Arc<Metrics>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(Self { client, metrics })
    }

    /// Fetches and parses a syndication feed, dropping entries whose content is under
    /// the minimum length and capping the batch at `FEED_BATCH_LIMIT`.
    pub async fn fetch_feed(&self, feed_url: &str) -> anyhow::Result<Vec<FetchedRecord>> {
        let started = Instant::now();
        let bytes = self.client.get(feed_url).send().await?.bytes().await?;
        let feed = feed_rs::parser::parse(&bytes[..])?;

        let mut records = Vec::new();
        for entry in feed.entries.into_iter().take(FEED_BATCH_LIMIT) {
            let title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "(untitled)".to_string());
            let link = entry.links.first().map(|l| l.href.clone());
            let Some(link) = link else { continue };
            let text = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();
            let normalized = normalize_text(&text);
            if normalized.chars().count() < MIN_FEED_ENTRY_CHARS {
                continue;
            }
            records.push(FetchedRecord {
                title: collapse_whitespace(&title),
                url: link,
                published_at: entry.published,
                text: normalized,
            });
        }

        self.metrics.source_fetch_duration.observe(started.elapsed().as_secs_f64());
        self.metrics.articles_fetched.inc_by(records.len() as f64);
        Ok(records)
    }

    /// Fetches a page and extracts candidate article elements using the prioritised
    /// selector list. Returns an empty vec (not an error) when no selector matches any
    /// element — per-source failure is the caller's concern, not this fetcher's.
    pub async fn scrape_page(
        &self,
        page_url: &str,
        permissive: bool,
    ) -> anyhow::Result<Vec<FetchedRecord>> {
        let started = Instant::now();
        let body = self.client.get(page_url).send().await?.text().await?;
        let document = Html::parse_document(&body);
        let base = Url::parse(page_url)?;

        let selectors: &[&str] = if permissive {
            PERMISSIVE_SCRAPE_SELECTORS
        } else {
            SCRAPE_SELECTORS
        };

        for selector_str in selectors {
            let Ok(selector) = Selector::parse(selector_str) else {
                continue;
            };
            let elements: Vec<_> = document.select(&selector).collect();
            if elements.is_empty() {
                continue;
            }

            let mut records = Vec::new();
            for element in elements.into_iter().take(SCRAPE_BATCH_LIMIT) {
                let text = normalize_text(&element.text().collect::<Vec<_>>().join(" "));
                if text.chars().count() < MIN_SCRAPE_ELEMENT_CHARS {
                    continue;
                }
                let title = element
                    .select(&Selector::parse("h1, h2, h3").unwrap())
                    .next()
                    .map(|h| collapse_whitespace(&h.text().collect::<Vec<_>>().join(" ")))
                    .unwrap_or_else(|| truncate_chars(&text, 80));
                let href = element
                    .select(&Selector::parse("a").unwrap())
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .and_then(|href| base.join(href).ok())
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| page_url.to_string());

                records.push(FetchedRecord {
                    title,
                    url: href,
                    published_at: None,
                    text,
                });
            }

            // First selector yielding >= 1 element wins, even if every element was
            // ultimately rejected for length — we don't fall through to the next one.
            self.metrics.source_fetch_duration.observe(started.elapsed().as_secs_f64());
            self.metrics.articles_fetched.inc_by(records.len() as f64);
            return Ok(records);
        }

        self.metrics.source_fetch_duration.observe(started.elapsed().as_secs_f64());
        Ok(Vec::new())
    }
}

/// Whitespace collapsed, control characters stripped, length capped pre-persist; the
/// persisted cap is applied separately by the caller since it differs by 2x.
fn normalize_text(text: &str) -> String {
    let collapsed = collapse_whitespace(text);
    let stripped = strip_control_chars(&collapsed);
    truncate_chars(&stripped, PRE_PERSIST_TEXT_CAP)
}

/// Applies the persisted-length cap (larger than the pre-persist cap) right before a
/// record is written to the store.
#[must_use]
pub fn cap_for_persistence(text: &str) -> String {
    truncate_chars(text, PERSISTED_TEXT_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_collapses_and_strips() {
        let input = "  line one\n\nline\ttwo \u{0007} ";
        let normalized = normalize_text(input);
        assert_eq!(normalized, "line one line two");
    }

    #[test]
    fn cap_for_persistence_respects_cap() {
        let long = "a".repeat(20_000);
        assert_eq!(cap_for_persistence(&long).chars().count(), PERSISTED_TEXT_CAP);
    }
}
