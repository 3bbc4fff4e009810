// src/services/locator.rs

//! Bulletin source locator.
//!
//! Runs the discovery strategies strictly in order; the first one that
//! yields a bulletin wins. When all of them come up empty the cached
//! last-known-good URL is used with a warning.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{AppError, Result};
use crate::models::{BulletinReference, Config, DiscoveryStrategy};
use crate::services::strategies::{DirectGuess, HistoricalPattern, ListingCrawl, SiteSearch};
use crate::storage::BulletinStore;
use crate::utils::http::WebClient;

/// Run-scoped state shared by the strategies of one locate call.
#[derive(Debug)]
pub struct DiscoveryContext {
    pub today: NaiveDate,
    rejected: HashSet<String>,
}

impl DiscoveryContext {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            rejected: HashSet::new(),
        }
    }

    /// Mark a candidate as checked and unusable.
    pub fn reject(&mut self, url: &str) {
        self.rejected.insert(url.to_string());
    }

    pub fn is_rejected(&self, url: &str) -> bool {
        self.rejected.contains(url)
    }

    /// Deduplicate candidates in discovery order and drop those an earlier
    /// strategy already rejected.
    pub fn fresh<I>(&self, urls: I) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut seen = HashSet::new();
        urls.into_iter()
            .filter(|url| !self.is_rejected(url) && seen.insert(url.clone()))
            .collect()
    }
}

/// One way of finding this month's bulletin.
#[async_trait]
pub trait SourceStrategy: Send + Sync {
    fn kind(&self) -> DiscoveryStrategy;

    /// `Ok(None)` means the strategy ran but found nothing.
    async fn discover(&self, ctx: &mut DiscoveryContext) -> Result<Option<String>>;
}

/// Ordered fallback chain producing one bulletin reference per run.
pub struct SourceLocator {
    strategies: Vec<Box<dyn SourceStrategy>>,
    store: Arc<dyn BulletinStore>,
    radar_tokens: Vec<String>,
}

impl SourceLocator {
    pub fn new(
        strategies: Vec<Box<dyn SourceStrategy>>,
        store: Arc<dyn BulletinStore>,
        radar_tokens: Vec<String>,
    ) -> Self {
        Self {
            strategies,
            store,
            radar_tokens,
        }
    }

    /// The standard chain: direct guess, site search, listing crawl,
    /// historical pattern.
    pub fn from_config(
        config: &Config,
        web: Arc<dyn WebClient>,
        store: Arc<dyn BulletinStore>,
    ) -> Self {
        let source = &config.source;
        let strategies: Vec<Box<dyn SourceStrategy>> = vec![
            Box::new(DirectGuess::new(web.clone(), source.clone())),
            Box::new(SiteSearch::new(web.clone(), source.clone())),
            Box::new(ListingCrawl::new(web.clone(), source.clone())),
            Box::new(HistoricalPattern::new(web, source.clone())),
        ];
        Self::new(strategies, store, source.radar_tokens.clone())
    }

    /// Find the bulletin for `today`.
    pub async fn locate(&self, today: NaiveDate) -> Result<BulletinReference> {
        let mut ctx = DiscoveryContext::new(today);

        for strategy in &self.strategies {
            let kind = strategy.kind();
            log::info!("Discovery: trying {}", kind);

            match strategy.discover(&mut ctx).await {
                Ok(Some(url)) => {
                    match BulletinReference::discovered(url.as_str(), kind, &self.radar_tokens) {
                        Ok(reference) => {
                            log::info!("Discovery: {} found {}", kind, reference.url);
                            self.remember(&reference).await;
                            return Ok(reference);
                        }
                        Err(e) => {
                            log::warn!("Discovery: {} returned an unusable link: {}", kind, e);
                            ctx.reject(&url);
                        }
                    }
                }
                Ok(None) => log::info!("Discovery: {} found nothing", kind),
                Err(e) => log::warn!("Discovery: {} failed: {}", kind, e),
            }
        }

        self.fall_back_to_cache().await
    }

    async fn fall_back_to_cache(&self) -> Result<BulletinReference> {
        let cached = match self.store.load_last_known().await {
            Ok(cached) => cached,
            Err(e) => {
                log::error!("Could not read the cached bulletin: {}", e);
                None
            }
        };

        let Some(url) = cached else {
            log::error!("All discovery strategies failed and no cached bulletin exists");
            return Err(AppError::DiscoveryExhausted);
        };

        match BulletinReference::cached(url) {
            Ok(reference) => {
                log::warn!(
                    "All discovery strategies failed; using cached bulletin {}",
                    reference.url
                );
                Ok(reference)
            }
            Err(e) => {
                log::error!("Cached bulletin is unusable: {}", e);
                Err(AppError::DiscoveryExhausted)
            }
        }
    }

    async fn remember(&self, reference: &BulletinReference) {
        if let Err(e) = self.store.save_last_known(&reference.url).await {
            log::warn!("Could not persist bulletin reference: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        kind: DiscoveryStrategy,
        outcome: Option<&'static str>,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn boxed(
            kind: DiscoveryStrategy,
            outcome: Option<&'static str>,
            fail: bool,
            calls: &Arc<AtomicUsize>,
        ) -> Box<dyn SourceStrategy> {
            Box::new(Self {
                kind,
                outcome,
                fail,
                calls: Arc::clone(calls),
            })
        }
    }

    #[async_trait]
    impl SourceStrategy for Scripted {
        fn kind(&self) -> DiscoveryStrategy {
            self.kind
        }

        async fn discover(&self, _ctx: &mut DiscoveryContext) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::discovery("simulated outage"));
            }
            Ok(self.outcome.map(String::from))
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    fn tokens() -> Vec<String> {
        vec!["radar".to_string()]
    }

    fn failing_chain(calls: &Arc<AtomicUsize>) -> Vec<Box<dyn SourceStrategy>> {
        vec![
            Scripted::boxed(DiscoveryStrategy::DirectGuess, None, false, calls),
            Scripted::boxed(DiscoveryStrategy::SiteSearch, None, true, calls),
            Scripted::boxed(DiscoveryStrategy::ListingCrawl, None, true, calls),
            Scripted::boxed(DiscoveryStrategy::HistoricalPattern, None, false, calls),
        ]
    }

    #[tokio::test]
    async fn test_cache_used_when_live_discovery_fails() {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = Arc::new(MemoryStore::with_url("https://example.org/old.pdf"));
        let locator = SourceLocator::new(failing_chain(&calls), store, tokens());

        let reference = locator.locate(today()).await.unwrap();
        assert_eq!(reference.url, "https://example.org/old.pdf");
        assert_eq!(reference.strategy, DiscoveryStrategy::Cached);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_exhausted_without_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let locator = SourceLocator::new(failing_chain(&calls), Arc::new(MemoryStore::new()), tokens());

        let result = locator.locate(today()).await;
        assert!(matches!(result, Err(AppError::DiscoveryExhausted)));
    }

    #[tokio::test]
    async fn test_first_success_short_circuits_and_persists() {
        let calls = Arc::new(AtomicUsize::new(0));
        let later = Arc::new(AtomicUsize::new(0));
        let store = Arc::new(MemoryStore::with_url("https://example.org/old.pdf"));
        let strategies = vec![
            Scripted::boxed(DiscoveryStrategy::DirectGuess, None, true, &calls),
            Scripted::boxed(
                DiscoveryStrategy::SiteSearch,
                Some("https://example.org/Radares%20Marzo%202025.pdf"),
                false,
                &calls,
            ),
            Scripted::boxed(
                DiscoveryStrategy::ListingCrawl,
                Some("https://example.org/radares-otro.pdf"),
                false,
                &later,
            ),
        ];
        let locator = SourceLocator::new(strategies, store.clone(), tokens());

        let reference = locator.locate(today()).await.unwrap();
        assert_eq!(reference.strategy, DiscoveryStrategy::SiteSearch);
        assert_eq!(later.load(Ordering::SeqCst), 0);
        assert_eq!(
            store.current().as_deref(),
            Some("https://example.org/Radares%20Marzo%202025.pdf")
        );
    }

    #[tokio::test]
    async fn test_non_bulletin_link_falls_through() {
        let calls = Arc::new(AtomicUsize::new(0));
        let strategies = vec![
            Scripted::boxed(
                DiscoveryStrategy::SiteSearch,
                Some("https://example.org/agenda.pdf"),
                false,
                &calls,
            ),
            Scripted::boxed(
                DiscoveryStrategy::ListingCrawl,
                Some("https://example.org/radares-marzo-2025.pdf"),
                false,
                &calls,
            ),
        ];
        let locator = SourceLocator::new(strategies, Arc::new(MemoryStore::new()), tokens());

        let reference = locator.locate(today()).await.unwrap();
        assert_eq!(reference.strategy, DiscoveryStrategy::ListingCrawl);
    }

    #[tokio::test]
    async fn test_cached_success_does_not_rewrite_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = Arc::new(MemoryStore::with_url("https://example.org/old.pdf"));
        let locator = SourceLocator::new(failing_chain(&calls), store.clone(), tokens());

        locator.locate(today()).await.unwrap();
        assert_eq!(store.current().as_deref(), Some("https://example.org/old.pdf"));
    }

    #[test]
    fn test_context_fresh_dedups_and_skips_rejected() {
        let mut ctx = DiscoveryContext::new(today());
        ctx.reject("https://a/1.pdf");
        let fresh = ctx.fresh(
            ["https://a/2.pdf", "https://a/1.pdf", "https://a/2.pdf", "https://a/3.pdf"]
                .map(String::from),
        );
        assert_eq!(fresh, vec!["https://a/2.pdf", "https://a/3.pdf"]);
    }
}
