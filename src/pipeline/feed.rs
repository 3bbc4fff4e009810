// src/pipeline/feed.rs

//! Daily radar feed pipeline.
//!
//! locate → download → extract → parse → resolve → assemble → write.
//! A fatal failure anywhere before writing is caught once here and turned
//! into an empty feature collection; the output file is always written.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};

use crate::error::Result;
use crate::models::{BulletinReference, Config, FeatureCollection, OutputConfig, StreetMention};
use crate::services::{
    DayBlockParser, FeatureAssembler, OverpassBackend, SourceLocator, StreetResolver, extract_text,
};
use crate::storage::LocalStorage;
use crate::utils::http::{ResilientFetcher, WebClient};

/// What one run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub bulletin: Option<String>,
    pub streets: usize,
    pub features: usize,
    pub output: PathBuf,
    /// The fatal error that emptied the output, if any.
    pub failure: Option<String>,
}

struct Outcome {
    bulletin: BulletinReference,
    streets: usize,
    collection: FeatureCollection,
}

pub struct FeedPipeline {
    locator: SourceLocator,
    web: Arc<dyn WebClient>,
    parser: DayBlockParser,
    resolver: StreetResolver,
    storage: LocalStorage,
    attribution: String,
}

impl FeedPipeline {
    pub fn new(
        locator: SourceLocator,
        web: Arc<dyn WebClient>,
        parser: DayBlockParser,
        resolver: StreetResolver,
        storage: LocalStorage,
        attribution: impl Into<String>,
    ) -> Self {
        Self {
            locator,
            web,
            parser,
            resolver,
            storage,
            attribution: attribution.into(),
        }
    }

    /// Wire up the live components described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = ResilientFetcher::new(&config.http)?;
        let storage = LocalStorage::from_config(&config.output);
        let backend = Arc::new(OverpassBackend::new(fetcher.clone(), &config.resolver));
        let web: Arc<dyn WebClient> = Arc::new(fetcher);
        let locator = SourceLocator::from_config(config, web.clone(), Arc::new(storage.clone()));

        Ok(Self::new(
            locator,
            web,
            DayBlockParser::new(&config.parser)?,
            StreetResolver::new(backend, &config.resolver),
            storage,
            config.output.attribution.clone(),
        ))
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    async fn build(&self, today: NaiveDate) -> Result<Outcome> {
        let bulletin = self.locator.locate(today).await?;

        log::info!("Downloading {}", bulletin.url);
        let bytes = self.web.get_bytes(&bulletin.url).await?;
        let text = extract_text(&bytes).inspect_err(|e| {
            log::error!("Could not extract {}: {}", bulletin.url, e);
        })?;

        let mentions = self.parser.extract_mentions(&text, today.day())?;
        if mentions.is_empty() {
            log::warn!("No streets listed for day {}", today.day());
        }

        let mut resolved: Vec<(StreetMention, _)> = Vec::with_capacity(mentions.len());
        for mention in mentions {
            let road = self.resolver.resolve(&mention.name).await;
            resolved.push((mention, road));
        }
        let streets = resolved.len();

        let collection = FeatureAssembler::new(self.attribution.as_str())
            .with_provenance(bulletin.url.as_str(), today)
            .assemble(resolved);

        Ok(Outcome {
            bulletin,
            streets,
            collection,
        })
    }

    /// Run for `today` and write the output document.
    ///
    /// Only a failure to write the output is returned as an error.
    pub async fn run(&self, today: NaiveDate) -> Result<RunSummary> {
        let started = Utc::now();

        let (collection, bulletin, streets, failure) = match self.build(today).await {
            Ok(outcome) => (
                outcome.collection,
                Some(outcome.bulletin.url),
                outcome.streets,
                None,
            ),
            Err(e) => {
                if e.is_fatal() {
                    log::error!("Run aborted, writing an empty feed: {}", e);
                } else {
                    log::error!("Run failed, writing an empty feed: {}", e);
                }
                (FeatureCollection::empty(), None, 0, Some(e.to_string()))
            }
        };

        let output = self.storage.write_features(&collection).await?;
        log::info!(
            "Wrote {} feature(s) to {} in {}s",
            collection.len(),
            output.display(),
            (Utc::now() - started).num_seconds()
        );

        Ok(RunSummary {
            bulletin,
            streets,
            features: collection.len(),
            output,
            failure,
        })
    }
}

/// Write an empty feature collection to the configured output.
pub async fn write_empty_feed(output: &OutputConfig) -> Result<PathBuf> {
    LocalStorage::from_config(output)
        .write_features(&FeatureCollection::empty())
        .await
}

/// Build the pipeline from `config` and run it once.
///
/// When the pipeline cannot even be built, an empty feed is still written
/// before the error is returned.
pub async fn run_feed(config: &Config, today: NaiveDate) -> Result<RunSummary> {
    match FeedPipeline::from_config(config) {
        Ok(pipeline) => pipeline.run(today).await,
        Err(e) => {
            log::error!("Could not start the pipeline, writing an empty feed: {}", e);
            write_empty_feed(&config.output).await?;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{DiscoveryStrategy, ParserConfig, ResolverConfig};
    use crate::services::{DiscoveryContext, GeocodingBackend, NameFilter, SourceStrategy, Way};
    use crate::storage::MemoryStore;
    use crate::utils::http::ProbeInfo;
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Unreachable(DiscoveryStrategy);

    #[async_trait]
    impl SourceStrategy for Unreachable {
        fn kind(&self) -> DiscoveryStrategy {
            self.0
        }

        async fn discover(&self, _ctx: &mut DiscoveryContext) -> Result<Option<String>> {
            Err(AppError::discovery("site unreachable"))
        }
    }

    struct NoRoads;

    #[async_trait]
    impl GeocodingBackend for NoRoads {
        async fn find_ways(&self, _filter: &NameFilter) -> Result<Vec<Way>> {
            Ok(Vec::new())
        }
    }

    /// Serves the same body for every download.
    struct StaticWeb(Vec<u8>);

    #[async_trait]
    impl WebClient for StaticWeb {
        async fn get_text(&self, _url: &str) -> Result<String> {
            Ok(String::from_utf8_lossy(&self.0).into_owned())
        }

        async fn get_bytes(&self, _url: &str) -> Result<Vec<u8>> {
            Ok(self.0.clone())
        }

        async fn probe(&self, _url: &str) -> Option<ProbeInfo> {
            Some(ProbeInfo::default())
        }
    }

    /// Always finds the same bulletin.
    struct Found(&'static str);

    #[async_trait]
    impl SourceStrategy for Found {
        fn kind(&self) -> DiscoveryStrategy {
            DiscoveryStrategy::DirectGuess
        }

        async fn discover(&self, _ctx: &mut DiscoveryContext) -> Result<Option<String>> {
            Ok(Some(self.0.to_string()))
        }
    }

    fn pipeline_with(
        root: &std::path::Path,
        strategies: Vec<Box<dyn SourceStrategy>>,
        web: Arc<dyn WebClient>,
    ) -> FeedPipeline {
        let locator = SourceLocator::new(
            strategies,
            Arc::new(MemoryStore::new()),
            vec!["radar".to_string()],
        );
        let resolver = StreetResolver::new(Arc::new(NoRoads), &ResolverConfig::default())
            .with_cooldown(Duration::ZERO);

        FeedPipeline::new(
            locator,
            web,
            DayBlockParser::new(&ParserConfig::default()).unwrap(),
            resolver,
            LocalStorage::new(root),
            "Ayuntamiento de León",
        )
    }

    fn pipeline(root: &std::path::Path) -> FeedPipeline {
        let strategies: Vec<Box<dyn SourceStrategy>> = [
            DiscoveryStrategy::DirectGuess,
            DiscoveryStrategy::SiteSearch,
            DiscoveryStrategy::ListingCrawl,
            DiscoveryStrategy::HistoricalPattern,
        ]
        .into_iter()
        .map(|kind| Box::new(Unreachable(kind)) as Box<dyn SourceStrategy>)
        .collect();

        pipeline_with(root, strategies, Arc::new(StaticWeb(Vec::new())))
    }

    fn read_output(path: &std::path::Path) -> serde_json::Value {
        let written = std::fs::read_to_string(path).unwrap();
        serde_json::from_str(&written).unwrap()
    }

    #[tokio::test]
    async fn test_total_discovery_failure_still_writes_empty_feed() {
        let tmp = TempDir::new().unwrap();
        let pipeline = pipeline(&tmp.path().join("radars"));
        let today = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();

        let summary = pipeline.run(today).await.unwrap();
        assert_eq!(summary.features, 0);
        assert_eq!(summary.bulletin, None);
        assert!(summary.failure.is_some());

        let json = read_output(&summary.output);
        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["features"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_rerun_replaces_previous_output() {
        let tmp = TempDir::new().unwrap();
        let pipeline = pipeline(tmp.path());
        let today = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();

        pipeline.run(today).await.unwrap();
        pipeline.run(today).await.unwrap();
        assert_eq!(
            pipeline.storage().read_features().await.unwrap(),
            Some(FeatureCollection::empty())
        );
    }

    #[tokio::test]
    async fn test_unreadable_bulletin_discards_whole_batch() {
        let tmp = TempDir::new().unwrap();
        let url = "https://www.aytoleon.es/es/actualidad/noticias/Documents/radares-marzo-2025.pdf";
        let pipeline = pipeline_with(
            tmp.path(),
            vec![Box::new(Found(url)) as Box<dyn SourceStrategy>],
            Arc::new(StaticWeb(b"<html>not found</html>".to_vec())),
        );
        let today = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();

        let summary = pipeline.run(today).await.unwrap();
        assert_eq!(summary.features, 0);
        assert_eq!(summary.streets, 0);
        assert_eq!(summary.bulletin, None);
        assert!(summary.failure.unwrap().contains("Corrupt document"));
        assert_eq!(read_output(&summary.output)["features"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_run_feed_writes_empty_feed_when_pipeline_cannot_start() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.output.output_dir = tmp.path().to_string_lossy().into_owned();
        // Not a valid header value, so the HTTP client cannot be built.
        config.http.user_agent = "radar\nfeed".to_string();
        let today = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();

        assert!(run_feed(&config, today).await.is_err());

        let output = LocalStorage::from_config(&config.output).features_path();
        let json = read_output(&output);
        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["features"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_write_empty_feed_replaces_stale_output() {
        let tmp = TempDir::new().unwrap();
        let mut output = OutputConfig::default();
        output.output_dir = tmp.path().to_string_lossy().into_owned();
        let path = LocalStorage::from_config(&output).features_path();
        std::fs::write(&path, r#"{"type":"FeatureCollection","features":[{"stale":true}]}"#).unwrap();

        assert_eq!(write_empty_feed(&output).await.unwrap(), path);
        assert_eq!(read_output(&path)["features"], serde_json::json!([]));
    }
}
