use anyhow::{Context, Result};
use geojson::{FeatureCollection, GeoJson};
use reqwest::blocking::Client;

/// Fetch a GeoJSON FeatureCollection from an open-data endpoint with a
/// single blocking GET. No authentication, no pagination; a non-success
/// status or a non-FeatureCollection body is an error.
pub fn fetch_feature_collection(client: &Client, url: &str) -> Result<FeatureCollection> {
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("Failed to request {}", url))?;
    if !response.status().is_success() {
        anyhow::bail!("{} returned {}", url, response.status());
    }

    let body = response
        .text()
        .with_context(|| format!("Failed to read response body from {}", url))?;
    let geojson: GeoJson = body
        .parse()
        .with_context(|| format!("Failed to parse GeoJSON from {}", url))?;

    FeatureCollection::try_from(geojson)
        .with_context(|| format!("Expected a FeatureCollection from {}", url))
}
