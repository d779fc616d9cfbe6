use std::path::PathBuf;

/// Four-digit ward/division pair used as the unit of analysis
/// (ward 39, division 27).
pub const DIVISION_NUM: &str = "3927";

/// Political Ward Divisions on OpenDataPhilly.
/// https://opendataphilly.org/datasets/political-ward-divisions/
const DIVISIONS_URL: &str =
    "https://data-phl.opendata.arcgis.com/datasets/160a3665943d4864806d7b1399029a04_0.geojson";

/// PWD Stormwater Billing Parcels on OpenDataPhilly.
/// https://opendataphilly.org/datasets/pwd-stormwater-billing-parcels/
const PARCELS_URL: &str =
    "https://opendata.arcgis.com/datasets/84baed491de44f539889f2af178ad85c_0.geojson";

/// Overpass API interpreter endpoint.
const OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

/// Everything one pipeline run needs. There are no CLI flags or environment
/// variables; the production values are fixed and come from the two
/// constructors below.
#[derive(Debug, Clone)]
pub struct PrepConfig {
    /// Four-digit ward/division identifier to select from the boundary dataset.
    pub division_id: String,
    /// GeoJSON FeatureCollection of all ward-division boundaries.
    pub boundary_url: String,
    /// Where the pipeline's features come from (Overpass interpreter for
    /// roads, citywide parcel GeoJSON for parcels).
    pub feature_source_url: String,
    /// Output GeoJSON file.
    pub output_path: PathBuf,
}

impl PrepConfig {
    /// Configuration for the road extraction pipeline.
    pub fn roads() -> Self {
        PrepConfig {
            division_id: DIVISION_NUM.to_string(),
            boundary_url: DIVISIONS_URL.to_string(),
            feature_source_url: OVERPASS_URL.to_string(),
            output_path: PathBuf::from(format!("data/div{}-roads.geojson", DIVISION_NUM)),
        }
    }

    /// Configuration for the parcel filter-and-merge pipeline.
    pub fn parcels() -> Self {
        PrepConfig {
            division_id: DIVISION_NUM.to_string(),
            boundary_url: DIVISIONS_URL.to_string(),
            feature_source_url: PARCELS_URL.to_string(),
            output_path: PathBuf::from(format!("data/div{}-footprints.geojson", DIVISION_NUM)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roads_config() {
        let config = PrepConfig::roads();
        assert_eq!(config.division_id, "3927");
        assert!(config.feature_source_url.contains("overpass"));
        assert_eq!(config.output_path, PathBuf::from("data/div3927-roads.geojson"));
    }

    #[test]
    fn test_parcels_config() {
        let config = PrepConfig::parcels();
        assert_eq!(config.division_id, "3927");
        assert_eq!(config.boundary_url, PrepConfig::roads().boundary_url);
        assert_eq!(
            config.output_path,
            PathBuf::from("data/div3927-footprints.geojson")
        );
    }
}
