//! Pipeline entry points.
//!
//! - `run_feed`: discover today's bulletin and write the radar GeoJSON
//! - `write_empty_feed`: the fallback output when a run cannot start

pub mod feed;

pub use feed::{FeedPipeline, RunSummary, run_feed, write_empty_feed};
