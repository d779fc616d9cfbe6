use std::fs;
use std::time::Instant;

use anyhow::{Context, Result};
use geojson::{Feature, FeatureCollection};
use reqwest::blocking::Client;

use crate::collect::overpass::{self, OsmElement};
use crate::config::PrepConfig;
use crate::geo_core;
use crate::geometric::division::DivisionBoundary;

/// Outward buffer applied to the division boundary before querying roads.
/// Without it, roads running exactly along the boundary can be missed; with
/// it, clipping leaves short stubs past the true edge. Acceptable tradeoff.
pub const ROAD_BUFFER_METERS: f64 = 2.0;

/// Road extraction pipeline: fetch the division boundary, buffer it by a
/// couple of meters, pull every highway-tagged OSM element inside it from
/// Overpass, and clip the results to the buffered boundary.
pub struct RoadExtract {
    config: PrepConfig,
    client: Client,
    features: Option<FeatureCollection>,
}

impl RoadExtract {
    pub fn new(config: PrepConfig) -> Self {
        RoadExtract {
            config,
            client: Client::new(),
            features: None,
        }
    }

    /// Run the pipeline: boundary, buffer, Overpass query, clip.
    pub fn run(mut self) -> Result<Self> {
        println!("Downloading division data...");
        let division = DivisionBoundary::fetch(
            &self.client,
            &self.config.boundary_url,
            &self.config.division_id,
        )?;
        let buffered = division
            .buffered_outward(ROAD_BUFFER_METERS)
            .context("Failed to buffer the division boundary")?;

        println!("Downloading roads from OpenStreetMap...");
        let started = Instant::now();
        let elements = overpass::fetch_highways(
            &self.client,
            &self.config.feature_source_url,
            &buffered.exterior_rings(),
        )?;
        println!("Took {:.2} seconds", started.elapsed().as_secs_f64());

        let features = clip_elements(&elements, &buffered)?;
        println!("Kept {} road features", features.features.len());
        self.features = Some(features);
        Ok(self)
    }

    pub fn feature_collection(&self) -> Option<&FeatureCollection> {
        self.features.as_ref()
    }

    /// Write the clipped road features as a GeoJSON file.
    pub fn to_geojson(&self) -> Result<()> {
        let features = self
            .features
            .as_ref()
            .context("No road features available. Call run() first.")?;

        if let Some(parent) = self.config.output_path.parent() {
            fs::create_dir_all(parent).context("Failed to create output directory")?;
        }
        let body =
            serde_json::to_string(features).context("Failed to serialize road features")?;
        fs::write(&self.config.output_path, body)
            .with_context(|| format!("Failed to write {:?}", self.config.output_path))?;

        println!("Roads saved to: {:?}", self.config.output_path);
        Ok(())
    }
}

/// Clip every element to the buffered boundary and attach its scalar
/// attributes. Elements that fall entirely outside the boundary, or have no
/// usable geometry, are dropped.
fn clip_elements(
    elements: &[OsmElement],
    boundary: &DivisionBoundary,
) -> Result<FeatureCollection> {
    let mut features = Vec::new();
    for element in elements {
        let geometry = match element.to_geometry() {
            Some(geometry) => geometry,
            None => continue,
        };
        let clipped = match geo_core::clip(&geometry, &boundary.geometry)? {
            Some(clipped) => clipped,
            None => continue,
        };
        features.push(Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(&clipped))),
            id: None,
            properties: Some(element.scalar_properties()),
            foreign_members: None,
        });
    }
    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}
