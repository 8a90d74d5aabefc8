use crate::view::View;
use geojson::{feature::Id, Feature, FeatureCollection, Geometry, JsonObject};
use serde::Serialize;

// ColorBrewer YlOrRd, 9 classes
const YLORRD: [&str; 9] = [
    "#ffffcc", "#ffeda0", "#fed976", "#feb24c", "#fd8d3c", "#fc4e2a", "#e31a1c", "#bd0026",
    "#800026",
];
const MISSING_FILL: &str = "rgb(220, 220, 220)";
const MAP_STYLE: &str = "carto-positron";
const OPACITY: f64 = 0.5;
const HEIGHT: u32 = 800;
const MARKER_SIZE: u32 = 8;

#[derive(Debug, Serialize)]
pub struct Figure {
    pub group: String,
    pub attribute: String,
    pub attribute_label: String,
    pub regions: FeatureCollection,
    pub colour_range: ColourRange,
    pub colour_scale: Vec<String>,
    pub center: LatLon,
    pub zoom: u8,
    pub map_style: &'static str,
    pub opacity: f64,
    pub height: u32,
    pub marker_size: u32,
    pub markers: Vec<Marker>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ColourRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Marker {
    pub lat: f64,
    pub lon: f64,
    pub text: String,
    pub colour: String,
}

pub fn build_figure(view: &View) -> Figure {
    let attribute = view.attribute;

    let features = view
        .regions
        .iter()
        .map(|region| {
            let value = region.value(&attribute.column);
            let fill = value
                .map(|v| scale_colour(v, attribute.min, attribute.max))
                .unwrap_or_else(|| MISSING_FILL.to_string());

            let mut properties = JsonObject::new();
            properties.insert("name".to_string(), region.key.clone().into());
            properties.insert("value".to_string(), value.into());
            properties.insert("fill".to_string(), fill.into());

            Feature {
                bbox: None,
                geometry: Some(Geometry::new(geojson::Value::from(&region.geometry))),
                id: Some(Id::String(region.key.clone())),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let markers = view
        .items
        .iter()
        .map(|item| Marker {
            lat: item.lat,
            lon: item.lon,
            text: item.label.clone(),
            colour: item.colour.clone(),
        })
        .collect();

    let (lon, lat) = view.center;

    Figure {
        group: view.group.clone(),
        attribute: attribute.name.clone(),
        attribute_label: attribute.label.clone(),
        regions: FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        },
        colour_range: ColourRange {
            min: attribute.min,
            max: attribute.max,
        },
        colour_scale: YLORRD.iter().map(|hex| rgb_string(hex_to_rgb(hex))).collect(),
        center: LatLon { lat, lon },
        zoom: view.zoom,
        map_style: MAP_STYLE,
        opacity: OPACITY,
        height: HEIGHT,
        marker_size: MARKER_SIZE,
        markers,
    }
}

/// Maps a value onto the YlOrRd scale over [min, max], clamping outside values.
pub fn scale_colour(value: f64, min: f64, max: f64) -> String {
    let t = if max > min {
        ((value - min) / (max - min)).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let t = if t.is_nan() { 0.0 } else { t };

    let position = t * (YLORRD.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = (lower + 1).min(YLORRD.len() - 1);
    let frac = position - lower as f64;

    let (r0, g0, b0) = hex_to_rgb(YLORRD[lower]);
    let (r1, g1, b1) = hex_to_rgb(YLORRD[upper]);
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * frac).round() as u8;

    rgb_string((mix(r0, r1), mix(g0, g1), mix(b0, b1)))
}

fn hex_to_rgb(hex: &str) -> (u8, u8, u8) {
    let hex = hex.trim_start_matches('#');
    let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(0);
    let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(0);
    let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(0);
    (r, g, b)
}

fn rgb_string((r, g, b): (u8, u8, u8)) -> String {
    format!("rgb({}, {}, {})", r, g, b)
}
