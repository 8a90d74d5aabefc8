use crate::config::AppConfig;
use crate::types::GeoRegion;
use anyhow::{anyhow, bail, Context, Result};
use geo::MultiPolygon;
use geojson::GeoJson;
use shapefile::dbase::FieldValue;
use shapefile::Reader;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

/// Which columns of the geometry file hold the key, the group label and the
/// numeric attributes.
#[derive(Debug, Clone)]
pub struct RegionSchema {
    pub key_column: String,
    pub group_column: String,
    pub attribute_columns: Vec<String>,
}

impl RegionSchema {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            key_column: config.input.key_column.clone(),
            group_column: config.input.group_column.clone(),
            attribute_columns: config.attribute_columns(),
        }
    }
}

/// Regions in file order, keys unique. Read-only once loaded.
#[derive(Debug, Default)]
pub struct RegionTable {
    regions: Vec<GeoRegion>,
}

impl RegionTable {
    pub fn new(regions: Vec<GeoRegion>) -> Result<Self> {
        let mut keys = HashSet::with_capacity(regions.len());
        for region in &regions {
            if !keys.insert(region.key.as_str()) {
                bail!("Duplicate region key '{}'", region.key);
            }
        }
        Ok(Self { regions })
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Sorted, de-duplicated group labels: the dropdown options.
    pub fn groups(&self) -> Vec<String> {
        self.regions
            .iter()
            .map(|r| r.group.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn in_group(&self, group: &str) -> Vec<&GeoRegion> {
        self.regions.iter().filter(|r| r.group == group).collect()
    }
}

pub fn load_regions(config: &AppConfig) -> Result<RegionTable> {
    let path = &config.input.geometry;
    let schema = RegionSchema::from_config(config);
    info!("Loading regions from {:?}...", path);

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s: &str| s.to_lowercase())
        .ok_or_else(|| anyhow!("Input geometry file has no extension"))?;

    let regions = match extension.as_str() {
        "shp" => load_shapefile(path, &schema)?,
        "json" | "geojson" => load_geojson(path, &schema)?,
        _ => return Err(anyhow!("Unsupported geometry format: {}", extension)),
    };

    let table = RegionTable::new(regions)?;
    info!(
        "Loaded {} regions in {} groups",
        table.len(),
        table.groups().len()
    );
    Ok(table)
}

fn load_geojson(path: &Path, schema: &RegionSchema) -> Result<Vec<GeoRegion>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open GeoJSON file: {:?}", path))?;
    let geojson = GeoJson::from_reader(BufReader::new(file)).context("Failed to parse GeoJSON")?;
    regions_from_geojson(geojson, schema)
}

pub fn regions_from_geojson(geojson: GeoJson, schema: &RegionSchema) -> Result<Vec<GeoRegion>> {
    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("GeoJSON must be a FeatureCollection")),
    };

    let mut regions = Vec::new();
    let mut skipped = 0;

    for feature in collection.features {
        let props = feature.properties.as_ref();

        let key = match props.and_then(|p| p.get(&schema.key_column)) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => bail!("Feature without a '{}' property", schema.key_column),
        };

        let group = match props.and_then(|p| p.get(&schema.group_column)) {
            Some(serde_json::Value::String(s)) => s.clone(),
            _ => bail!("Region '{}' has no '{}' string property", key, schema.group_column),
        };

        let mut attributes = HashMap::new();
        for column in &schema.attribute_columns {
            if let Some(value) = props.and_then(|p| p.get(column)).and_then(json_number) {
                attributes.insert(column.clone(), value);
            }
        }

        let geometry = match feature.geometry {
            Some(geom) => {
                let geo_geom: geo::Geometry<f64> = geom
                    .value
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert geometry of '{}': {:?}", key, e))?;
                match geo_geom {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => {
                        skipped += 1;
                        continue;
                    }
                }
            }
            None => {
                skipped += 1;
                continue;
            }
        };

        regions.push(GeoRegion {
            key,
            group,
            geometry,
            attributes,
        });
    }

    if skipped > 0 {
        warn!("Skipped {} features without polygon geometry", skipped);
    }

    Ok(regions)
}

fn json_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn load_shapefile(path: &Path, schema: &RegionSchema) -> Result<Vec<GeoRegion>> {
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("Failed to open Shapefile: {:?}", path))?;

    let mut regions = Vec::new();

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;

        let key = match record.get(&schema.key_column) {
            Some(FieldValue::Character(Some(s))) => s.trim().to_string(),
            Some(FieldValue::Numeric(Some(n))) => n.to_string(),
            Some(FieldValue::Integer(n)) => n.to_string(),
            _ => bail!("Shapefile record without a '{}' value", schema.key_column),
        };

        let group = match record.get(&schema.group_column) {
            Some(FieldValue::Character(Some(s))) => s.trim().to_string(),
            _ => bail!("Region '{}' has no '{}' string value", key, schema.group_column),
        };

        let mut attributes = HashMap::new();
        for column in &schema.attribute_columns {
            if let Some(value) = record.get(column).and_then(dbase_number) {
                attributes.insert(column.clone(), value);
            }
        }

        let geometry: MultiPolygon<f64> = match shape {
            shapefile::Shape::Polygon(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("Failed to convert polygon: {:?}", e))?,
            shapefile::Shape::PolygonM(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("Failed to convert polygonM: {:?}", e))?,
            shapefile::Shape::PolygonZ(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("Failed to convert polygonZ: {:?}", e))?,
            _ => continue, // Skip non-polygon shapes
        };

        regions.push(GeoRegion {
            key,
            group,
            geometry,
            attributes,
        });
    }

    Ok(regions)
}

fn dbase_number(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Numeric(n) => *n,
        FieldValue::Float(f) => f.map(f64::from),
        FieldValue::Double(d) => Some(*d),
        FieldValue::Integer(i) => Some(f64::from(*i)),
        FieldValue::Currency(c) => Some(*c),
        _ => None,
    }
}
