use anyhow::{Context, Result};
use geo::geometry::{Coord, Geometry};
use geo::{BoundingRect, MapCoords};
use geos::Geom;
use proj::Proj;

/// Axis-aligned bounding box in (min_x, min_y, max_x, max_y) order, in the
/// owning geometry's CRS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Bounding box of a geometry. Fails for empty geometries, which have no
    /// bounding rectangle.
    pub fn of(geometry: &Geometry<f64>) -> Result<Self> {
        let rect = geometry
            .bounding_rect()
            .context("Geometry is empty and has no bounding rectangle")?;
        Ok(BoundingBox::new(
            rect.min().x,
            rect.min().y,
            rect.max().x,
            rect.max().y,
        ))
    }

    /// Rectangle-overlap test: true iff the boxes overlap on both axes.
    /// Cheap prefilter run before exact polygon predicates.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }
}

/// Reproject a geometry between two EPSG coordinate reference systems.
pub fn reproject(geometry: &Geometry<f64>, from_epsg: i32, to_epsg: i32) -> Result<Geometry<f64>> {
    let from_crs = format!("EPSG:{}", from_epsg);
    let to_crs = format!("EPSG:{}", to_epsg);

    let proj = Proj::new_known_crs(&from_crs, &to_crs, None)
        .context("Failed to create Proj transformation")?;

    geometry
        .try_map_coords(|coord: Coord<f64>| -> std::result::Result<Coord<f64>, proj::ProjError> {
            let (x, y) = proj.convert((coord.x, coord.y))?;
            Ok(Coord { x, y })
        })
        .context(format!(
            "Failed to reproject geometry from {} to {}",
            from_crs, to_crs
        ))
}

/// Buffer a geometry outward by `distance`, in the geometry's own CRS units.
/// Callers reproject to a metric CRS first when the distance is in meters.
pub fn buffer(geometry: &Geometry<f64>, distance: f64) -> Result<Geometry<f64>> {
    let geos_geometry: geos::Geometry = geometry
        .clone()
        .try_into()
        .context("Failed to convert geometry to GEOS")?;
    let buffered = geos_geometry
        .buffer(distance, 8)
        .context("GEOS buffer failed")?;
    let geometry: Geometry<f64> = buffered
        .try_into()
        .context("Failed to convert buffered geometry from GEOS")?;
    Ok(geometry)
}

/// Clip a geometry to a boundary polygon. Returns None when the two are
/// disjoint.
pub fn clip(geometry: &Geometry<f64>, boundary: &Geometry<f64>) -> Result<Option<Geometry<f64>>> {
    let geos_geometry: geos::Geometry = geometry
        .clone()
        .try_into()
        .context("Failed to convert geometry to GEOS")?;
    let geos_boundary: geos::Geometry = boundary
        .clone()
        .try_into()
        .context("Failed to convert boundary to GEOS")?;

    let intersection = geos_geometry
        .intersection(&geos_boundary)
        .context("GEOS intersection failed")?;
    if intersection
        .is_empty()
        .context("GEOS emptiness check failed")?
    {
        return Ok(None);
    }

    let clipped: Geometry<f64> = intersection
        .try_into()
        .context("Failed to convert clipped geometry from GEOS")?;
    Ok(Some(clipped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn test_bounding_box_of_polygon() {
        let polygon = polygon![
            (x: 1.0, y: 2.0),
            (x: 5.0, y: 2.0),
            (x: 5.0, y: 8.0),
            (x: 1.0, y: 8.0),
        ];
        let bbox = BoundingBox::of(&Geometry::Polygon(polygon)).unwrap();
        assert_eq!(bbox, BoundingBox::new(1.0, 2.0, 5.0, 8.0));
    }

    #[test]
    fn test_intersects_is_symmetric() {
        let pairs = [
            // overlapping
            (
                BoundingBox::new(0.0, 0.0, 2.0, 2.0),
                BoundingBox::new(1.0, 1.0, 3.0, 3.0),
            ),
            // disjoint on x
            (
                BoundingBox::new(0.0, 0.0, 1.0, 1.0),
                BoundingBox::new(2.0, 0.0, 3.0, 1.0),
            ),
            // disjoint on y
            (
                BoundingBox::new(0.0, 0.0, 1.0, 1.0),
                BoundingBox::new(0.0, 5.0, 1.0, 6.0),
            ),
            // touching edge
            (
                BoundingBox::new(0.0, 0.0, 1.0, 1.0),
                BoundingBox::new(1.0, 0.0, 2.0, 1.0),
            ),
            // one inside the other
            (
                BoundingBox::new(0.0, 0.0, 10.0, 10.0),
                BoundingBox::new(4.0, 4.0, 5.0, 5.0),
            ),
        ];
        for (a, b) in pairs {
            assert_eq!(a.intersects(&b), b.intersects(&a));
        }
    }

    #[test]
    fn test_intersects_requires_overlap_on_both_axes() {
        let a = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        // overlaps on x only
        let b = BoundingBox::new(0.5, 3.0, 1.5, 4.0);
        // overlaps on y only
        let c = BoundingBox::new(3.0, 0.5, 4.0, 1.5);
        assert!(!a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(a.intersects(&a));
    }
}
