//! Street-level data derived from a bulletin.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A `[longitude, latitude]` pair.
pub type Position = [f64; 2];

/// Half-day shift as labelled in the bulletin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shift {
    Morning,
    Afternoon,
}

impl Shift {
    pub const ALL: [Shift; 2] = [Shift::Morning, Shift::Afternoon];
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shift::Morning => f.write_str("morning"),
            Shift::Afternoon => f.write_str("afternoon"),
        }
    }
}

/// Raw lines covering one day and one shift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayBlock {
    pub day: u32,
    pub shift: Shift,
    pub raw_lines: Vec<String>,
}

/// A street named in today's blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreetMention {
    pub name: String,
    pub source_line: String,
}

/// Road segments matched for one street.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoadGeometry {
    /// Candidate name that produced the match
    pub matched_name: String,
    /// One polyline per matched segment, in backend order
    pub lines: Vec<Vec<Position>>,
}

impl RoadGeometry {
    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|line| line.is_empty())
    }
}
