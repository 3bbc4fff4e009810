//! GeoJSON output document.

use serde::{Deserialize, Serialize};

use super::street::Position;

/// Line geometry of one radar street.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    LineString(Vec<Position>),
    MultiLineString(Vec<Vec<Position>>),
}

impl Geometry {
    /// Single segment becomes a `LineString`; several stay grouped, unstitched.
    pub fn from_lines(mut lines: Vec<Vec<Position>>) -> Option<Self> {
        lines.retain(|line| !line.is_empty());
        match lines.len() {
            0 => None,
            1 => lines.pop().map(Geometry::LineString),
            _ => Some(Geometry::MultiLineString(lines)),
        }
    }
}

/// Properties attached to each radar feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarProperties {
    pub name: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bulletin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct RadarFeature {
    pub properties: RadarProperties,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    pub features: Vec<RadarFeature>,
}

impl FeatureCollection {
    pub fn empty() -> Self {
        Self {
            features: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self::empty()
    }
}
