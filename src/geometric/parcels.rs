use std::fs;
use std::time::Instant;

use anyhow::{Context, Result};
use geo::geometry::{Geometry, MultiPolygon};
use geo::{BooleanOps, Contains};
use geojson::{Feature, FeatureCollection};
use reqwest::blocking::Client;

use crate::collect::opendata;
use crate::config::PrepConfig;
use crate::geo_core::BoundingBox;
use crate::geometric::division::DivisionBoundary;

/// Outcome of reading one parcel feature's geometry. The citywide dataset
/// contains features with null or otherwise unusable geometry; those are
/// skipped per-feature instead of failing the run.
#[derive(Debug)]
pub enum ParcelGeometry {
    Valid(Geometry<f64>),
    Invalid,
}

/// Classify a parcel feature's geometry. Absent geometry and geometry that
/// does not convert to a concrete shape both count as invalid.
pub fn parse_parcel_geometry(feature: &Feature) -> ParcelGeometry {
    let geometry = match feature.geometry.as_ref() {
        Some(geometry) => geometry,
        None => return ParcelGeometry::Invalid,
    };
    match Geometry::try_from(geometry.value.clone()) {
        Ok(geometry) => ParcelGeometry::Valid(geometry),
        Err(_) => ParcelGeometry::Invalid,
    }
}

/// Counters from one filtering pass over the parcel dataset.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FilterStats {
    /// Features skipped for null or unparseable geometry.
    pub invalid: usize,
    /// Features rejected by the bounding-box prefilter alone.
    pub bbox_rejected: usize,
    /// Features that reached the exact containment test.
    pub containment_checked: usize,
    /// Features fully contained in the division.
    pub included: usize,
}

/// Select the parcels fully contained in the division. The bounding-box
/// overlap test runs first, so most of the citywide dataset never reaches
/// the exact containment predicate.
pub fn select_contained(
    division: &DivisionBoundary,
    parcels: &FeatureCollection,
) -> (Vec<Geometry<f64>>, FilterStats) {
    let mut stats = FilterStats::default();
    let mut selected = Vec::new();

    for feature in &parcels.features {
        let geometry = match parse_parcel_geometry(feature) {
            ParcelGeometry::Valid(geometry) => geometry,
            ParcelGeometry::Invalid => {
                stats.invalid += 1;
                continue;
            }
        };
        let bbox = match BoundingBox::of(&geometry) {
            Ok(bbox) => bbox,
            Err(_) => {
                stats.invalid += 1;
                continue;
            }
        };

        if !division.bbox.intersects(&bbox) {
            stats.bbox_rejected += 1;
            continue;
        }

        stats.containment_checked += 1;
        if division.geometry.contains(&geometry) {
            selected.push(geometry);
            stats.included += 1;
        }
    }

    (selected, stats)
}

/// Union the selected parcels into one composite footprint. Zero parcels
/// yield an empty MultiPolygon; a single parcel comes back unchanged.
pub fn union_parcels(geometries: &[Geometry<f64>]) -> MultiPolygon<f64> {
    let mut composite = MultiPolygon::new(Vec::new());
    for geometry in geometries {
        let parcel = match geometry {
            Geometry::Polygon(polygon) => MultiPolygon::new(vec![polygon.clone()]),
            Geometry::MultiPolygon(multi) => multi.clone(),
            _ => continue,
        };
        if composite.0.is_empty() {
            composite = parcel;
        } else {
            composite = composite.union(&parcel);
        }
    }
    composite
}

/// Parcel filter-and-merge pipeline: fetch the division boundary and the
/// citywide parcel dataset, keep the parcels fully inside the division, and
/// union them into the division's stormwater parcel footprint.
pub struct ParcelMerge {
    config: PrepConfig,
    client: Client,
    composite: Option<MultiPolygon<f64>>,
    stats: FilterStats,
}

impl ParcelMerge {
    pub fn new(config: PrepConfig) -> Self {
        ParcelMerge {
            config,
            client: Client::new(),
            composite: None,
            stats: FilterStats::default(),
        }
    }

    /// Run the pipeline: fetch, filter, union.
    pub fn run(mut self) -> Result<Self> {
        println!("Downloading division data...");
        let division = DivisionBoundary::fetch(
            &self.client,
            &self.config.boundary_url,
            &self.config.division_id,
        )?;

        println!("Downloading parcel data...");
        let parcels =
            opendata::fetch_feature_collection(&self.client, &self.config.feature_source_url)?;

        println!(
            "Loading the parcels within division {}...",
            self.config.division_id
        );
        let started = Instant::now();
        let (selected, stats) = select_contained(&division, &parcels);
        println!("Took {:.2} seconds", started.elapsed().as_secs_f64());
        println!(
            "{} parcels included, {} rejected by bounding box, {} skipped for bad geometry",
            stats.included, stats.bbox_rejected, stats.invalid
        );

        self.composite = Some(union_parcels(&selected));
        self.stats = stats;
        Ok(self)
    }

    pub fn stats(&self) -> FilterStats {
        self.stats
    }

    pub fn composite(&self) -> Option<&MultiPolygon<f64>> {
        self.composite.as_ref()
    }

    /// Write the composite footprint as a single GeoJSON feature.
    pub fn to_geojson(&self) -> Result<()> {
        let composite = self
            .composite
            .as_ref()
            .context("No composite geometry available. Call run() first.")?;

        println!("Outputting new composite parcel file...");
        if let Some(parent) = self.config.output_path.parent() {
            fs::create_dir_all(parent).context("Failed to create output directory")?;
        }

        let feature = Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(composite))),
            id: None,
            properties: None,
            foreign_members: None,
        };
        let body = serde_json::to_string(&feature)
            .context("Failed to serialize the composite footprint")?;
        fs::write(&self.config.output_path, body)
            .with_context(|| format!("Failed to write {:?}", self.config.output_path))?;

        println!(
            "Composite parcel footprint saved to: {:?}",
            self.config.output_path
        );
        Ok(())
    }
}
