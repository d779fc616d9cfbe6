use anyhow::Result;
use division_prep::config::PrepConfig;
use division_prep::geometric::parcels::ParcelMerge;

/// Filter the citywide stormwater billing parcels down to the ones fully
/// inside the division and write their union as a single GeoJSON feature.
fn main() -> Result<()> {
    let parcels = ParcelMerge::new(PrepConfig::parcels()).run()?;
    parcels.to_geojson()?;
    Ok(())
}
