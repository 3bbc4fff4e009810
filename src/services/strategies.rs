// src/services/strategies.rs

//! Live bulletin discovery strategies.
//!
//! - `DirectGuess`: current month's filenames against known storage paths
//! - `SiteSearch`: the site's built-in search, ranked by Last-Modified
//! - `ListingCrawl`: news listings plus one hop into linked articles
//! - `HistoricalPattern`: filenames for the last N months

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde_json::json;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{DiscoveryStrategy, SourceConfig, has_pdf_extension, is_bulletin_link};
use crate::services::links::{harvest_link_elements, harvest_links};
use crate::services::locator::{DiscoveryContext, SourceStrategy};
use crate::utils::dates::{month_name_es, months_back, render_template};
use crate::utils::http::WebClient;
use crate::utils::{dedup_preserving_order, get_domain, resolve};

/// Points for mentioning the bulletin's month name.
const MONTH_SCORE: u32 = 5;
/// Points for mentioning the bulletin's year.
const YEAR_SCORE: u32 = 2;

/// Candidate URLs for one month: every template under every storage path.
pub fn guess_urls(source: &SourceConfig, year: i32, month: u32) -> Vec<String> {
    let urls = source.filename_templates.iter().flat_map(|template| {
        let filename = render_template(template, year, month);
        source.storage_paths.iter().filter_map(move |path| {
            let relative = format!("{}/{}", path.trim_end_matches('/'), filename);
            resolve(&source.site_base, &relative)
        })
    });
    dedup_preserving_order(urls)
}

/// Month/year presence score of a bulletin URL.
pub fn bulletin_score(url: &str, today: NaiveDate) -> u32 {
    let lower = url.to_lowercase();
    let mut score = 0;
    if lower.contains(month_name_es(today.month())) {
        score += MONTH_SCORE;
    }
    if lower.contains(&today.year().to_string()) {
        score += YEAR_SCORE;
    }
    score
}

/// A discovered PDF awaiting ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub url: String,
    pub exists: bool,
    pub last_modified: Option<DateTime<Utc>>,
    pub score: u32,
    /// Discovery order; lower wins ties
    pub order: usize,
}

impl ScoredCandidate {
    fn rank(&self, other: &Self) -> Ordering {
        other
            .exists
            .cmp(&self.exists)
            .then_with(|| other.last_modified.cmp(&self.last_modified))
            .then_with(|| other.score.cmp(&self.score))
            .then_with(|| self.order.cmp(&other.order))
    }
}

/// Best existing candidate by recency, score, then discovery order.
///
/// Candidates whose existence check failed are never picked.
pub fn pick_best(candidates: Vec<ScoredCandidate>) -> Option<String> {
    let mut candidates: Vec<_> = candidates.into_iter().filter(|c| c.exists).collect();
    candidates.sort_by(|a, b| a.rank(b));
    candidates.into_iter().next().map(|c| c.url)
}

// --- Direct guess ---

/// Tries the current month's filenames directly.
pub struct DirectGuess {
    web: Arc<dyn WebClient>,
    source: SourceConfig,
}

impl DirectGuess {
    pub fn new(web: Arc<dyn WebClient>, source: SourceConfig) -> Self {
        Self { web, source }
    }
}

#[async_trait]
impl SourceStrategy for DirectGuess {
    fn kind(&self) -> DiscoveryStrategy {
        DiscoveryStrategy::DirectGuess
    }

    async fn discover(&self, ctx: &mut DiscoveryContext) -> Result<Option<String>> {
        let candidates = ctx.fresh(guess_urls(
            &self.source,
            ctx.today.year(),
            ctx.today.month(),
        ));
        log::debug!("Direct guess: {} candidates", candidates.len());

        for url in candidates {
            if self.web.probe(&url).await.is_some() {
                return Ok(Some(url));
            }
            ctx.reject(&url);
        }
        Ok(None)
    }
}

// --- Site search ---

/// Search results page URL for the radar keyword within the recent window.
pub fn search_url(source: &SourceConfig, today: NaiveDate) -> Result<String> {
    let from = (today - Duration::days(source.search_days_back))
        .and_time(NaiveTime::MIN)
        .and_utc()
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string();

    let filter = json!({
        "k": source.search_keyword,
        "r": [{
            "n": "LastModifiedTime",
            "t": [format!("range({from}, max, to=\"le\")")],
            "o": "and",
            "k": false,
            "m": null,
        }],
        "l": source.search_locale,
    });
    let encoded: String =
        url::form_urlencoded::byte_serialize(filter.to_string().as_bytes()).collect();

    let mut url = Url::parse(&source.site_base)?.join(&source.search_path)?;
    url.query_pairs_mut().append_pair("k", &source.search_keyword);
    url.set_fragment(Some(&format!("Default={encoded}")));
    Ok(url.to_string())
}

/// Queries the site's built-in search.
pub struct SiteSearch {
    web: Arc<dyn WebClient>,
    source: SourceConfig,
}

impl SiteSearch {
    pub fn new(web: Arc<dyn WebClient>, source: SourceConfig) -> Self {
        Self { web, source }
    }
}

#[async_trait]
impl SourceStrategy for SiteSearch {
    fn kind(&self) -> DiscoveryStrategy {
        DiscoveryStrategy::SiteSearch
    }

    async fn discover(&self, ctx: &mut DiscoveryContext) -> Result<Option<String>> {
        let url = search_url(&self.source, ctx.today)?;
        let html = self.web.get_text(&url).await?;
        let base = Url::parse(&url)?;

        let links = harvest_links(&html, &base)
            .into_iter()
            .filter(|link| is_bulletin_link(link, &self.source.radar_tokens));
        let candidates = ctx.fresh(links);
        log::debug!("Site search: {} PDF candidates", candidates.len());

        let mut scored = Vec::with_capacity(candidates.len());
        for (order, candidate) in candidates.into_iter().enumerate() {
            let info = self.web.probe(&candidate).await;
            if info.is_none() {
                ctx.reject(&candidate);
            }
            scored.push(ScoredCandidate {
                score: bulletin_score(&candidate, ctx.today),
                exists: info.is_some(),
                last_modified: info.and_then(|p| p.last_modified),
                url: candidate,
                order,
            });
        }
        Ok(pick_best(scored))
    }
}

// --- Listing crawl ---

/// Listing pages plus their paginated variants.
pub fn listing_urls(source: &SourceConfig) -> Vec<String> {
    let mut urls = Vec::new();
    for page in &source.listing_pages {
        let Some(primary) = resolve(&source.site_base, page) else {
            continue;
        };
        urls.push(primary.clone());
        if let Ok(parsed) = Url::parse(&primary) {
            for n in 2..(2 + source.max_listing_pages) {
                let mut variant = parsed.clone();
                variant
                    .query_pairs_mut()
                    .append_pair(&source.page_param, &n.to_string());
                urls.push(variant.to_string());
            }
        }
    }
    dedup_preserving_order(urls)
}

/// Crawls listing pages and follows article links one hop.
pub struct ListingCrawl {
    web: Arc<dyn WebClient>,
    source: SourceConfig,
}

impl ListingCrawl {
    pub fn new(web: Arc<dyn WebClient>, source: SourceConfig) -> Self {
        Self { web, source }
    }

    /// Same-site, non-PDF link whose path looks like an article.
    pub fn is_article(&self, url: &str) -> bool {
        if has_pdf_extension(url) {
            return false;
        }
        if get_domain(url) != get_domain(&self.source.site_base) {
            return false;
        }
        self.source
            .article_patterns
            .iter()
            .any(|pattern| url.contains(pattern.as_str()))
    }

    fn mentions_radar(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.source
            .radar_tokens
            .iter()
            .any(|token| lower.contains(&token.to_lowercase()))
    }
}

#[async_trait]
impl SourceStrategy for ListingCrawl {
    fn kind(&self) -> DiscoveryStrategy {
        DiscoveryStrategy::ListingCrawl
    }

    async fn discover(&self, ctx: &mut DiscoveryContext) -> Result<Option<String>> {
        let pages = listing_urls(&self.source);
        let mut pdfs = Vec::new();
        let mut articles = Vec::new();
        let mut reached = 0;

        for page in &pages {
            let html = match self.web.get_text(page).await {
                Ok(html) => html,
                Err(e) => {
                    log::debug!("Listing page {} unavailable: {}", page, e);
                    continue;
                }
            };
            reached += 1;
            let base = Url::parse(page)?;

            for link in harvest_link_elements(&html, &base) {
                if is_bulletin_link(&link.url, &self.source.radar_tokens) {
                    pdfs.push(link.url);
                } else if self.is_article(&link.url) && !pages.contains(&link.url) {
                    let hinted = self.mentions_radar(&link.text) || self.mentions_radar(&link.url);
                    articles.push((hinted, link.url));
                }
            }
        }

        if reached == 0 {
            return Err(AppError::discovery(
                "no listing page could be fetched",
            ));
        }

        // Radar-looking articles first, otherwise discovery order.
        articles.sort_by_key(|(hinted, _)| !*hinted);
        let articles = dedup_preserving_order(articles.into_iter().map(|(_, url)| url));

        for article in articles.into_iter().take(self.source.max_articles) {
            match self.web.get_text(&article).await {
                Ok(html) => {
                    let base = Url::parse(&article)?;
                    pdfs.extend(
                        harvest_links(&html, &base)
                            .into_iter()
                            .filter(|link| is_bulletin_link(link, &self.source.radar_tokens)),
                    );
                }
                Err(e) => log::debug!("Article {} unavailable: {}", article, e),
            }
        }

        let candidates = ctx.fresh(pdfs);
        log::debug!("Listing crawl: {} PDF candidates", candidates.len());

        let scored = candidates
            .into_iter()
            .enumerate()
            .map(|(order, url)| ScoredCandidate {
                score: bulletin_score(&url, ctx.today),
                exists: true,
                last_modified: None,
                url,
                order,
            })
            .collect();
        Ok(pick_best(scored))
    }
}

// --- Historical pattern ---

/// Tries the filename catalogue for each of the last N months.
pub struct HistoricalPattern {
    web: Arc<dyn WebClient>,
    source: SourceConfig,
}

impl HistoricalPattern {
    pub fn new(web: Arc<dyn WebClient>, source: SourceConfig) -> Self {
        Self { web, source }
    }
}

#[async_trait]
impl SourceStrategy for HistoricalPattern {
    fn kind(&self) -> DiscoveryStrategy {
        DiscoveryStrategy::HistoricalPattern
    }

    async fn discover(&self, ctx: &mut DiscoveryContext) -> Result<Option<String>> {
        for (year, month) in months_back(ctx.today, self.source.history_months) {
            for url in ctx.fresh(guess_urls(&self.source, year, month)) {
                if self.web.probe(&url).await.is_some() {
                    return Ok(Some(url));
                }
                ctx.reject(&url);
            }
        }
        Ok(None)
    }
}
