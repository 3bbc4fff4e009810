// src/services/overpass.rs

//! Geocoding backend: Overpass API mirrors.
//!
//! One query per name filter, restricted to the configured bounding box.
//! Mirrors are interchangeable; each gets its own retry budget and the
//! first one that answers with a well-formed document wins.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{BoundingBox, Position, ResolverConfig};
use crate::services::pattern::{ql_string, tolerant_pattern};
use crate::utils::http::{FetchOptions, ResilientFetcher};

/// How a candidate name is matched against road names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameFilter {
    /// Byte-for-byte equality.
    Exact(String),
    /// Accent- and case-tolerant pattern built from the name.
    Tolerant(String),
}

impl NameFilter {
    pub fn name(&self) -> &str {
        match self {
            NameFilter::Exact(name) | NameFilter::Tolerant(name) => name,
        }
    }

    /// The QL tag filter, e.g. `["name"="Calle Ancha"]`.
    pub fn to_ql(&self) -> String {
        match self {
            NameFilter::Exact(name) => format!("[\"name\"=\"{}\"]", ql_string(name)),
            NameFilter::Tolerant(name) => {
                format!("[\"name\"~\"{}\",i]", ql_string(&tolerant_pattern(name)))
            }
        }
    }
}

/// A named road segment with its coordinates in longitude-latitude order.
#[derive(Debug, Clone, PartialEq)]
pub struct Way {
    pub name: Option<String>,
    pub positions: Vec<Position>,
}

/// Source of road geometry by name.
#[async_trait]
pub trait GeocodingBackend: Send + Sync {
    /// Roads matching `filter`; an empty list means no match.
    ///
    /// Fails with [`AppError::BackendUnavailable`] when no endpoint answered.
    async fn find_ways(&self, filter: &NameFilter) -> Result<Vec<Way>>;
}

/// Full query text for one filter.
pub fn build_query(filter: &NameFilter, bbox: &BoundingBox, timeout_secs: u64) -> String {
    format!(
        "[out:json][timeout:{}];way[\"highway\"]{}({},{},{},{});out geom;",
        timeout_secs,
        filter.to_ql(),
        bbox.south,
        bbox.west,
        bbox.north,
        bbox.east
    )
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    elements: Vec<Element>,
}

#[derive(Debug, Deserialize)]
struct Element {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    geometry: Vec<Option<LatLon>>,
}

#[derive(Debug, Deserialize)]
struct LatLon {
    lat: f64,
    lon: f64,
}

/// Decode a response body into ways.
///
/// Mirrors under load answer with HTML error pages and a success status;
/// anything that is not the expected JSON document is an error.
pub fn parse_response(url: &str, body: &str) -> Result<Vec<Way>> {
    let response: OverpassResponse = serde_json::from_str(body)
        .map_err(|e| AppError::invalid_response(url, format!("not an Overpass document: {e}")))?;

    Ok(response
        .elements
        .into_iter()
        .filter(|element| element.kind == "way")
        .map(|element| Way {
            name: element.tags.get("name").cloned(),
            positions: element
                .geometry
                .into_iter()
                .flatten()
                .map(|point| [point.lon, point.lat])
                .collect(),
        })
        .filter(|way| !way.positions.is_empty())
        .collect())
}

/// Overpass API client with mirror failover.
pub struct OverpassBackend {
    fetcher: ResilientFetcher,
    mirrors: Vec<String>,
    bbox: BoundingBox,
    timeout_secs: u64,
    mirror_attempts: u32,
}

impl OverpassBackend {
    pub fn new(fetcher: ResilientFetcher, config: &ResolverConfig) -> Self {
        Self {
            fetcher,
            mirrors: config.mirrors.clone(),
            bbox: config.bbox,
            timeout_secs: config.query_timeout_secs,
            mirror_attempts: config.mirror_attempts,
        }
    }
}

#[async_trait]
impl GeocodingBackend for OverpassBackend {
    async fn find_ways(&self, filter: &NameFilter) -> Result<Vec<Way>> {
        let query = build_query(filter, &self.bbox, self.timeout_secs);
        let options = FetchOptions::form(&[("data", query.as_str())]);

        for mirror in &self.mirrors {
            match self
                .fetcher
                .fetch_decoded(mirror, &options, self.mirror_attempts, parse_response)
                .await
            {
                Ok(ways) => {
                    log::debug!("{} -> {} way(s) from {}", filter.to_ql(), ways.len(), mirror);
                    return Ok(ways);
                }
                Err(e) => log::warn!("Overpass mirror {} failed: {}", mirror, e),
            }
        }

        Err(AppError::BackendUnavailable {
            mirrors: self.mirrors.len(),
        })
    }
}
