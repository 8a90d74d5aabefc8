use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct GeoRegion {
    pub key: String,
    pub group: String,
    pub geometry: MultiPolygon<f64>,
    // Column name -> value; absent or non-numeric values are not stored
    pub attributes: HashMap<String, f64>,
}

impl GeoRegion {
    pub fn value(&self, column: &str) -> Option<f64> {
        self.attributes.get(column).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardItem {
    pub name: String,
    pub label: String, // "<stage>:<name>", used as hover text
    pub stage: String,
    pub lat: f64,
    pub lon: f64,
    pub colour: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn span(&self) -> f64 {
        (self.max_lat - self.min_lat).max(self.max_lon - self.min_lon)
    }

    /// Midpoint per axis, returned as (lon, lat).
    pub fn centroid(&self) -> (f64, f64) {
        (
            (self.min_lon + self.max_lon) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }

    /// Open rectangle test: points on any edge are outside.
    pub fn strictly_contains(&self, lon: f64, lat: f64) -> bool {
        lon > self.min_lon && lat > self.min_lat && lon < self.max_lon && lat < self.max_lat
    }
}
