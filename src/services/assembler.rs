//! Feature assembly.

use chrono::NaiveDate;

use crate::models::{
    FeatureCollection, Geometry, RadarFeature, RadarProperties, RoadGeometry, StreetMention,
};

/// Turns resolved streets into output features.
#[derive(Debug, Clone)]
pub struct FeatureAssembler {
    attribution: String,
    bulletin: Option<String>,
    date: Option<NaiveDate>,
}

impl FeatureAssembler {
    pub fn new(attribution: impl Into<String>) -> Self {
        Self {
            attribution: attribution.into(),
            bulletin: None,
            date: None,
        }
    }

    /// Record which bulletin and day the features come from.
    pub fn with_provenance(mut self, bulletin: impl Into<String>, date: NaiveDate) -> Self {
        self.bulletin = Some(bulletin.into());
        self.date = Some(date);
        self
    }

    /// A feature for one street, or `None` when it has no geometry.
    pub fn feature(&self, mention: &StreetMention, road: RoadGeometry) -> Option<RadarFeature> {
        let Some(geometry) = Geometry::from_lines(road.lines) else {
            log::info!("No geometry for {}, skipped", mention.name);
            return None;
        };
        Some(RadarFeature {
            properties: RadarProperties {
                name: mention.name.clone(),
                source: self.attribution.clone(),
                bulletin: self.bulletin.clone(),
                date: self.date.map(|d| d.format("%Y-%m-%d").to_string()),
            },
            geometry,
        })
    }

    /// Collection of every street that resolved, in mention order.
    pub fn assemble<I>(&self, resolved: I) -> FeatureCollection
    where
        I: IntoIterator<Item = (StreetMention, RoadGeometry)>,
    {
        let features = resolved
            .into_iter()
            .filter_map(|(mention, road)| self.feature(&mention, road))
            .collect();
        FeatureCollection { features }
    }
}
