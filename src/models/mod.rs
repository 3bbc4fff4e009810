// src/models/mod.rs

//! Domain models for the radar feed.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod bulletin;
mod config;
mod feature;
mod street;

// Re-export all public types
pub use bulletin::{BulletinReference, DiscoveryStrategy, has_pdf_extension, is_bulletin_link};
pub use config::{
    BoundingBox, Config, HttpConfig, LoggingConfig, OutputConfig, ParserConfig, ResolverConfig,
    SourceConfig, StreetAlias,
};
pub use feature::{FeatureCollection, Geometry, RadarFeature, RadarProperties};
pub use street::{DayBlock, Position, RoadGeometry, Shift, StreetMention};
