// src/services/resolver.rs

//! Street resolver.
//!
//! Expands a bulletin street name into candidates and asks the geocoding
//! backend for each, first with exact names and then with accent-tolerant
//! patterns. The first candidate with any hit wins. Queries are spaced by
//! a fixed cooldown for the whole run.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{AppError, Result};
use crate::models::{ResolverConfig, RoadGeometry, StreetAlias};
use crate::services::candidates::generate_candidates;
use crate::services::overpass::{GeocodingBackend, NameFilter, Way};

pub struct StreetResolver {
    backend: Arc<dyn GeocodingBackend>,
    aliases: Vec<StreetAlias>,
    cooldown: Duration,
    last_query: Mutex<Option<Instant>>,
}

impl StreetResolver {
    pub fn new(backend: Arc<dyn GeocodingBackend>, config: &ResolverConfig) -> Self {
        Self {
            backend,
            aliases: config.aliases.clone(),
            cooldown: config.cooldown(),
            last_query: Mutex::new(None),
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Wait until the cooldown since the previous query has elapsed.
    async fn throttle(&self) {
        let wait = self
            .last_query
            .lock()
            .ok()
            .and_then(|last| *last)
            .map(|last| self.cooldown.saturating_sub(last.elapsed()))
            .unwrap_or(Duration::ZERO);

        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        if let Ok(mut last) = self.last_query.lock() {
            *last = Some(Instant::now());
        }
    }

    async fn query(&self, filter: NameFilter) -> Result<Option<RoadGeometry>> {
        self.throttle().await;
        let ways = self.backend.find_ways(&filter).await?;
        if ways.is_empty() {
            return Ok(None);
        }
        Ok(Some(to_geometry(filter.name(), ways)))
    }

    /// Geometry for `name`, or `None` when no candidate matched.
    ///
    /// Fails only when the backend could not be reached at all.
    pub async fn try_resolve(&self, name: &str) -> Result<Option<RoadGeometry>> {
        let candidates = generate_candidates(name, &self.aliases);
        log::debug!("{}: {} candidates", name, candidates.len());

        for candidate in &candidates {
            if let Some(geometry) = self.query(NameFilter::Exact(candidate.clone())).await? {
                log::info!("Matched {} as {} (exact)", name, geometry.matched_name);
                return Ok(Some(geometry));
            }
        }

        for candidate in &candidates {
            if let Some(geometry) = self.query(NameFilter::Tolerant(candidate.clone())).await? {
                log::info!("Matched {} as {} (tolerant)", name, geometry.matched_name);
                return Ok(Some(geometry));
            }
        }

        log::info!("No map match for {}", name);
        Ok(None)
    }

    /// Geometry for `name`; empty when unmatched or the backend is down.
    pub async fn resolve(&self, name: &str) -> RoadGeometry {
        match self.try_resolve(name).await {
            Ok(Some(geometry)) => geometry,
            Ok(None) => RoadGeometry::default(),
            Err(AppError::BackendUnavailable { mirrors }) => {
                log::warn!("Skipping {}: all {} mirrors unavailable", name, mirrors);
                RoadGeometry::default()
            }
            Err(e) => {
                log::warn!("Skipping {}: {}", name, e);
                RoadGeometry::default()
            }
        }
    }
}

/// One polyline per way, in backend order.
fn to_geometry(candidate: &str, ways: Vec<Way>) -> RoadGeometry {
    let matched_name = ways
        .iter()
        .find_map(|way| way.name.clone())
        .unwrap_or_else(|| candidate.to_string());
    RoadGeometry {
        matched_name,
        lines: ways.into_iter().map(|way| way.positions).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Position;
    use async_trait::async_trait;

    /// Answers only the listed filters; records every query.
    #[derive(Default)]
    struct FakeBackend {
        hits: Vec<(NameFilter, Vec<Vec<Position>>)>,
        down: bool,
        seen: Mutex<Vec<NameFilter>>,
    }

    #[async_trait]
    impl GeocodingBackend for FakeBackend {
        async fn find_ways(&self, filter: &NameFilter) -> Result<Vec<Way>> {
            self.seen.lock().unwrap().push(filter.clone());
            if self.down {
                return Err(AppError::BackendUnavailable { mirrors: 3 });
            }
            Ok(self
                .hits
                .iter()
                .filter(|(f, _)| f == filter)
                .flat_map(|(_, lines)| lines.clone())
                .map(|positions| Way {
                    name: None,
                    positions,
                })
                .collect())
        }
    }

    fn resolver(backend: Arc<FakeBackend>) -> StreetResolver {
        StreetResolver::new(backend, &ResolverConfig::default()).with_cooldown(Duration::ZERO)
    }

    fn corredera_line() -> Vec<Position> {
        vec![[-5.570, 42.597], [-5.569, 42.598], [-5.568, 42.599]]
    }

    #[tokio::test]
    async fn test_tolerant_phase_runs_after_exact_misses() {
        let backend = Arc::new(FakeBackend {
            hits: vec![(
                NameFilter::Tolerant("Calle La Corredera".into()),
                vec![corredera_line()],
            )],
            ..FakeBackend::default()
        });
        let resolver = resolver(backend.clone());

        let geometry = resolver.resolve("Calle La Corredera").await;
        assert_eq!(geometry.lines, vec![corredera_line()]);
        assert_eq!(geometry.matched_name, "Calle La Corredera");

        let seen = backend.seen.lock().unwrap();
        let candidates = generate_candidates("Calle La Corredera", &ResolverConfig::default().aliases);
        assert_eq!(seen.len(), candidates.len() + 1);
        assert!(seen[..candidates.len()]
            .iter()
            .all(|f| matches!(f, NameFilter::Exact(_))));
        assert_eq!(seen[candidates.len()], NameFilter::Tolerant("Calle La Corredera".into()));
    }

    #[tokio::test]
    async fn test_exact_hit_stops_early() {
        let backend = Arc::new(FakeBackend {
            hits: vec![(
                NameFilter::Exact("Calle de la Corredera".into()),
                vec![corredera_line(), corredera_line()],
            )],
            ..FakeBackend::default()
        });
        let resolver = resolver(backend.clone());

        let geometry = resolver.try_resolve("Calle La Corredera").await.unwrap().unwrap();
        assert_eq!(geometry.lines.len(), 2);
        assert!(backend
            .seen
            .lock()
            .unwrap()
            .iter()
            .all(|f| matches!(f, NameFilter::Exact(_))));
    }

    #[tokio::test]
    async fn test_no_match_is_empty_not_error() {
        let backend = Arc::new(FakeBackend::default());
        let resolver = resolver(backend);
        assert_eq!(resolver.try_resolve("Calle Inexistente").await.unwrap(), None);
        assert!(resolver.resolve("Calle Inexistente").await.is_empty());
    }

    #[tokio::test]
    async fn test_backend_down_degrades_to_empty() {
        let backend = Arc::new(FakeBackend {
            down: true,
            ..FakeBackend::default()
        });
        let resolver = resolver(backend.clone());

        assert!(matches!(
            resolver.try_resolve("Calle Ancha").await,
            Err(AppError::BackendUnavailable { .. })
        ));
        assert!(resolver.resolve("Calle Ancha").await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_queries_respect_cooldown() {
        let backend = Arc::new(FakeBackend::default());
        let resolver = StreetResolver::new(backend, &ResolverConfig::default())
            .with_cooldown(Duration::from_millis(1100));

        let started = Instant::now();
        resolver.throttle().await;
        resolver.throttle().await;
        resolver.throttle().await;
        assert!(started.elapsed() >= Duration::from_millis(2200));
    }
}
