use anyhow::Result;
use division_prep::config::PrepConfig;
use division_prep::geometric::roads::RoadExtract;

/// Download the division's road network from OpenStreetMap and write it to
/// the data directory as GeoJSON.
fn main() -> Result<()> {
    let roads = RoadExtract::new(PrepConfig::roads()).run()?;
    roads.to_geojson()?;
    Ok(())
}
