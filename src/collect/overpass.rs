use anyhow::{Context, Result};
use geo::geometry::{Geometry, LineString, Point, Polygon};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

/// One vertex of a way geometry in an `out geom` response.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Vertex {
    pub lat: f64,
    pub lon: f64,
}

/// One element from an Overpass `out geom` response. Ways carry both their
/// vertex geometry and a list of node ids; the id list never survives into
/// output features (see [`OsmElement::scalar_properties`]).
#[derive(Debug, Deserialize)]
pub struct OsmElement {
    #[serde(rename = "type")]
    pub element_type: String,
    pub id: i64,
    #[serde(default)]
    pub tags: Map<String, Value>,
    #[serde(default)]
    pub nodes: Vec<i64>,
    #[serde(default)]
    pub geometry: Vec<Vertex>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    elements: Vec<OsmElement>,
}

impl OsmElement {
    /// Convert the element to a geographic geometry. Nodes become points and
    /// ways become linestrings, except closed ways tagged `area=yes`, which
    /// become polygons. Elements without usable geometry yield None.
    pub fn to_geometry(&self) -> Option<Geometry<f64>> {
        match self.element_type.as_str() {
            "node" => {
                let lat = self.lat?;
                let lon = self.lon?;
                Some(Geometry::Point(Point::new(lon, lat)))
            }
            "way" => {
                if self.geometry.len() < 2 {
                    return None;
                }
                let line = LineString::from(
                    self.geometry
                        .iter()
                        .map(|vertex| (vertex.lon, vertex.lat))
                        .collect::<Vec<_>>(),
                );
                let is_area = self.tags.get("area").and_then(Value::as_str) == Some("yes");
                if line.is_closed() && is_area {
                    Some(Geometry::Polygon(Polygon::new(line, Vec::new())))
                } else {
                    Some(Geometry::LineString(line))
                }
            }
            _ => None,
        }
    }

    /// Feature attributes for export: the OSM id, the element kind, and the
    /// tags, with every list- or object-valued entry removed. The output
    /// attribute schema is scalar-only, and way elements arrive with a
    /// list-valued `nodes` field.
    pub fn scalar_properties(&self) -> Map<String, Value> {
        let mut properties = Map::new();
        properties.insert("osm_id".to_string(), Value::from(self.id));
        properties.insert(
            "element".to_string(),
            Value::from(self.element_type.clone()),
        );
        if !self.nodes.is_empty() {
            properties.insert("nodes".to_string(), Value::from(self.nodes.clone()));
        }
        for (key, value) in &self.tags {
            properties.insert(key.clone(), value.clone());
        }
        drop_list_attributes(properties)
    }
}

/// Keep only attributes the export schema can represent: no arrays, no
/// nested objects.
pub fn drop_list_attributes(properties: Map<String, Value>) -> Map<String, Value> {
    properties
        .into_iter()
        .filter(|(_, value)| !value.is_array() && !value.is_object())
        .collect()
}

/// Build the OverpassQL query selecting every node and way tagged
/// `highway=*` inside the given polygons, one `poly:` clause per exterior
/// ring. The `poly:` filter wants "lat lon" pairs.
pub fn highway_query(rings: &[LineString<f64>]) -> String {
    let mut clauses = String::new();
    for ring in rings {
        let poly = ring
            .coords()
            .map(|coord| format!("{} {}", coord.y, coord.x))
            .collect::<Vec<_>>()
            .join(" ");
        clauses.push_str(&format!("  node[\"highway\"](poly:\"{}\");\n", poly));
        clauses.push_str(&format!("  way[\"highway\"](poly:\"{}\");\n", poly));
    }
    format!("[out:json];\n(\n{});\nout geom;", clauses)
}

/// Query the Overpass interpreter for all highway-tagged elements inside the
/// given rings, with a single blocking GET.
pub fn fetch_highways(
    client: &Client,
    endpoint: &str,
    rings: &[LineString<f64>],
) -> Result<Vec<OsmElement>> {
    let query = highway_query(rings);
    let url = Url::parse_with_params(endpoint, &[("data", query.as_str())])
        .context("Failed to build Overpass request URL")?;

    let response = client
        .get(url)
        .send()
        .with_context(|| format!("Failed to request {}", endpoint))?;
    if !response.status().is_success() {
        anyhow::bail!("Overpass returned {} from {}", response.status(), endpoint);
    }

    let parsed: OverpassResponse = response
        .json()
        .context("Failed to parse Overpass JSON response")?;
    Ok(parsed.elements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;

    fn way(vertices: Vec<Vertex>, tags: &[(&str, &str)]) -> OsmElement {
        OsmElement {
            element_type: "way".to_string(),
            id: 42,
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), Value::from(*v)))
                .collect(),
            nodes: vec![1, 2, 3],
            geometry: vertices,
            lat: None,
            lon: None,
        }
    }

    #[test]
    fn test_node_becomes_point() {
        let element = OsmElement {
            element_type: "node".to_string(),
            id: 7,
            tags: Map::new(),
            nodes: Vec::new(),
            geometry: Vec::new(),
            lat: Some(39.92),
            lon: Some(-75.17),
        };
        match element.to_geometry() {
            Some(Geometry::Point(point)) => {
                assert_eq!(point.x(), -75.17);
                assert_eq!(point.y(), 39.92);
            }
            other => panic!("expected a point, got {:?}", other),
        }
    }

    #[test]
    fn test_open_way_becomes_linestring() {
        let element = way(
            vec![
                Vertex { lat: 0.0, lon: 0.0 },
                Vertex { lat: 1.0, lon: 1.0 },
            ],
            &[("highway", "residential")],
        );
        assert!(matches!(
            element.to_geometry(),
            Some(Geometry::LineString(_))
        ));
    }

    #[test]
    fn test_closed_area_way_becomes_polygon() {
        let vertices = vec![
            Vertex { lat: 0.0, lon: 0.0 },
            Vertex { lat: 0.0, lon: 1.0 },
            Vertex { lat: 1.0, lon: 1.0 },
            Vertex { lat: 0.0, lon: 0.0 },
        ];
        let element = way(vertices.clone(), &[("highway", "pedestrian"), ("area", "yes")]);
        assert!(matches!(element.to_geometry(), Some(Geometry::Polygon(_))));

        // Closed but not tagged as an area: still a linestring.
        let element = way(vertices, &[("highway", "pedestrian")]);
        assert!(matches!(
            element.to_geometry(),
            Some(Geometry::LineString(_))
        ));
    }

    #[test]
    fn test_scalar_properties_drop_the_nodes_list() {
        let element = way(
            vec![
                Vertex { lat: 0.0, lon: 0.0 },
                Vertex { lat: 1.0, lon: 1.0 },
            ],
            &[("highway", "residential"), ("name", "Mifflin St")],
        );
        let properties = element.scalar_properties();
        assert!(!properties.contains_key("nodes"));
        assert_eq!(properties["highway"], Value::from("residential"));
        assert_eq!(properties["name"], Value::from("Mifflin St"));
        assert_eq!(properties["osm_id"], Value::from(42));
        for value in properties.values() {
            assert!(!value.is_array() && !value.is_object());
        }
    }

    #[test]
    fn test_highway_query_uses_lat_lon_order() {
        let ring = line_string![
            (x: -75.2, y: 39.9),
            (x: -75.1, y: 39.9),
            (x: -75.1, y: 40.0),
            (x: -75.2, y: 39.9),
        ];
        let query = highway_query(&[ring]);
        assert!(query.contains("[out:json]"));
        assert!(query.contains("out geom"));
        assert!(query.contains("way[\"highway\"](poly:\"39.9 -75.2 39.9 -75.1 40 -75.1 39.9 -75.2\")"));
        assert!(query.contains("node[\"highway\"]"));
    }
}
