use anyhow::{Context, Result};
use geo::geometry::{Geometry, LineString};
use geojson::{Feature, FeatureCollection};
use reqwest::blocking::Client;
use serde_json::Value;
use thiserror::Error;

use crate::collect::opendata;
use crate::geo_core::{self, BoundingBox};

/// Property holding the four-digit ward/division pair in the boundary
/// dataset.
const DIVISION_NUM_PROPERTY: &str = "DIVISION_NUM";

/// WGS84 geographic coordinates; the CRS of the boundary dataset and of all
/// intersection tests and output files.
const GEOGRAPHIC_EPSG: i32 = 4326;

/// Pennsylvania South state plane (meters), used only for metric buffering.
const METRIC_EPSG: i32 = 32129;

#[derive(Debug, Error)]
#[error("Division {division_id} not found in the boundary dataset")]
pub struct DivisionNotFound {
    pub division_id: String,
}

/// The boundary of one ward division, in geographic coordinates, with its
/// precomputed bounding box.
pub struct DivisionBoundary {
    pub geometry: Geometry<f64>,
    pub bbox: BoundingBox,
}

impl DivisionBoundary {
    /// Download the citywide boundary dataset and select one division by its
    /// four-digit identifier.
    pub fn fetch(client: &Client, boundary_url: &str, division_id: &str) -> Result<Self> {
        let collection = opendata::fetch_feature_collection(client, boundary_url)?;
        let feature = find_division(&collection, division_id)?;
        Self::from_feature(feature)
    }

    fn from_feature(feature: &Feature) -> Result<Self> {
        let geometry = feature
            .geometry
            .as_ref()
            .context("Division feature has no geometry")?;
        let geometry = Geometry::try_from(geometry.value.clone())
            .context("Failed to convert division geometry")?;
        let bbox = BoundingBox::of(&geometry)?;
        Ok(DivisionBoundary { geometry, bbox })
    }

    /// Expand the boundary outward by `meters`, round-tripping through the
    /// state plane CRS so the distance is metric.
    pub fn buffered_outward(&self, meters: f64) -> Result<Self> {
        let projected = geo_core::reproject(&self.geometry, GEOGRAPHIC_EPSG, METRIC_EPSG)?;
        let buffered = geo_core::buffer(&projected, meters)?;
        let geometry = geo_core::reproject(&buffered, METRIC_EPSG, GEOGRAPHIC_EPSG)?;
        let bbox = BoundingBox::of(&geometry)?;
        Ok(DivisionBoundary { geometry, bbox })
    }

    /// Exterior rings of the boundary polygon(s), for building area queries.
    pub fn exterior_rings(&self) -> Vec<LineString<f64>> {
        match &self.geometry {
            Geometry::Polygon(polygon) => vec![polygon.exterior().clone()],
            Geometry::MultiPolygon(multi) => multi
                .iter()
                .map(|polygon| polygon.exterior().clone())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Locate the one feature whose division-number property matches
/// `division_id`.
pub fn find_division<'a>(
    collection: &'a FeatureCollection,
    division_id: &str,
) -> Result<&'a Feature, DivisionNotFound> {
    collection
        .features
        .iter()
        .find(|feature| {
            feature
                .property(DIVISION_NUM_PROPERTY)
                .and_then(Value::as_str)
                == Some(division_id)
        })
        .ok_or_else(|| DivisionNotFound {
            division_id: division_id.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use serde_json::Map;

    fn division_feature(division_id: &str) -> Feature {
        let mut properties = Map::new();
        properties.insert(
            DIVISION_NUM_PROPERTY.to_string(),
            Value::from(division_id),
        );
        let polygon = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ];
        Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(
                &Geometry::Polygon(polygon),
            ))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }

    fn collection(features: Vec<Feature>) -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }

    #[test]
    fn test_find_division_matches_by_property() {
        let fc = collection(vec![division_feature("0101"), division_feature("3927")]);
        let feature = find_division(&fc, "3927").unwrap();
        assert_eq!(
            feature.property(DIVISION_NUM_PROPERTY),
            Some(&Value::from("3927"))
        );
    }

    #[test]
    fn test_find_division_fails_when_absent() {
        let fc = collection(vec![division_feature("0101")]);
        let err = find_division(&fc, "3927").unwrap_err();
        assert_eq!(err.division_id, "3927");
        assert!(err.to_string().contains("3927"));
    }

    #[test]
    fn test_find_division_fails_on_empty_collection() {
        let fc = collection(Vec::new());
        assert!(find_division(&fc, "3927").is_err());
    }

    #[test]
    fn test_boundary_from_feature_computes_bbox() {
        let boundary = DivisionBoundary::from_feature(&division_feature("3927")).unwrap();
        assert_eq!(boundary.bbox, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(boundary.exterior_rings().len(), 1);
    }
}
