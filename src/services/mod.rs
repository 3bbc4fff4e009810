//! Service layer for the radar feed.
//!
//! This module contains the business logic for:
//! - Bulletin discovery (`SourceLocator` and its strategies)
//! - PDF text extraction (`extract_text`)
//! - Day-block parsing (`DayBlockParser`)
//! - Street resolution against Overpass (`StreetResolver`, `OverpassBackend`)
//! - GeoJSON assembly (`FeatureAssembler`)

pub mod assembler;
pub mod candidates;
pub mod extractor;
pub mod links;
pub mod locator;
pub mod overpass;
pub mod parser;
pub mod pattern;
pub mod resolver;
pub mod strategies;

pub use assembler::FeatureAssembler;
pub use extractor::extract_text;
pub use locator::{DiscoveryContext, SourceLocator, SourceStrategy};
pub use overpass::{GeocodingBackend, NameFilter, OverpassBackend, Way};
pub use parser::{DayBlockParser, normalize_street_name};
pub use resolver::StreetResolver;
pub use strategies::{DirectGuess, HistoricalPattern, ListingCrawl, SiteSearch};
