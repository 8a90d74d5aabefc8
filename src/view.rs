use crate::config::AttributeConfig;
use crate::error::ViewError;
use crate::geodata::RegionTable;
use crate::types::{BoardItem, BoundingBox, GeoRegion};
use geo::bounding_rect::BoundingRect;
use geo::Rect;
use rstar::{RTree, RTreeObject, AABB};

// Spans wider than this (in degrees) zoom out one level. Two levels only.
const WIDE_SPAN_DEGREES: f64 = 0.5;
const WIDE_ZOOM: u8 = 8;
const NARROW_ZOOM: u8 = 9;

// Wrapper for RTree indexing
struct SiteEntry {
    index: usize,
    point: [f64; 2],
}

impl RTreeObject for SiteEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

/// Board items plus a spatial index over their (lon, lat) positions.
pub struct SiteIndex {
    items: Vec<BoardItem>,
    tree: RTree<SiteEntry>,
}

impl SiteIndex {
    pub fn new(items: Vec<BoardItem>) -> Self {
        let entries = items
            .iter()
            .enumerate()
            .map(|(index, item)| SiteEntry {
                index,
                point: [item.lon, item.lat],
            })
            .collect();
        Self {
            items,
            tree: RTree::bulk_load(entries),
        }
    }

    /// Items strictly inside the box, in board order.
    pub fn within(&self, bbox: &BoundingBox) -> Vec<&BoardItem> {
        let envelope = AABB::from_corners([bbox.min_lon, bbox.min_lat], [bbox.max_lon, bbox.max_lat]);

        // The tree query is inclusive; edges are dropped by the strict test
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope(&envelope)
            .filter(|entry| bbox.strictly_contains(entry.point[0], entry.point[1]))
            .map(|entry| entry.index)
            .collect();
        hits.sort_unstable();

        hits.into_iter().map(|i| &self.items[i]).collect()
    }
}

#[derive(Debug)]
pub struct View<'a> {
    pub group: String,
    pub attribute: &'a AttributeConfig,
    pub regions: Vec<&'a GeoRegion>,
    pub bbox: BoundingBox,
    pub center: (f64, f64), // (lon, lat)
    pub zoom: u8,
    pub items: Vec<&'a BoardItem>,
}

pub fn zoom_for_span(span: f64) -> u8 {
    if span > WIDE_SPAN_DEGREES {
        WIDE_ZOOM
    } else {
        NARROW_ZOOM
    }
}

/// Envelope of the union of the regions' envelopes.
pub fn combined_bounds<'a>(regions: impl IntoIterator<Item = &'a GeoRegion>) -> Option<BoundingBox> {
    regions
        .into_iter()
        .filter_map(|region| region.geometry.bounding_rect())
        .reduce(|acc: Rect<f64>, rect| {
            Rect::new(
                geo::coord! { x: acc.min().x.min(rect.min().x), y: acc.min().y.min(rect.min().y) },
                geo::coord! { x: acc.max().x.max(rect.max().x), y: acc.max().y.max(rect.max().y) },
            )
        })
        .map(|rect| BoundingBox {
            min_lon: rect.min().x,
            min_lat: rect.min().y,
            max_lon: rect.max().x,
            max_lat: rect.max().y,
        })
}

pub fn select_view<'a>(
    regions: &'a RegionTable,
    sites: &'a SiteIndex,
    attributes: &'a [AttributeConfig],
    group: &str,
    attribute: &str,
) -> Result<View<'a>, ViewError> {
    let attribute = attributes
        .iter()
        .find(|a| a.name == attribute)
        .ok_or_else(|| ViewError::UnknownAttribute(attribute.to_string()))?;

    // 1. Regions in the group
    let selected = regions.in_group(group);
    if selected.is_empty() {
        return Err(ViewError::UnknownGroup(group.to_string()));
    }

    // 2. Bounds, zoom and centre
    let bbox = combined_bounds(selected.iter().copied())
        .ok_or_else(|| ViewError::UnknownGroup(group.to_string()))?;
    let zoom = zoom_for_span(bbox.span());
    let center = bbox.centroid();

    // 3. Sites inside the bounds
    let items = sites.within(&bbox);

    Ok(View {
        group: group.to_string(),
        attribute,
        regions: selected,
        bbox,
        center,
        zoom,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_attributes;
    use geo::{polygon, MultiPolygon};
    use std::collections::HashMap;

    fn square(key: &str, group: &str, min_lon: f64, min_lat: f64, size: f64) -> GeoRegion {
        rect_region(key, group, min_lon, min_lat, min_lon + size, min_lat + size)
    }

    fn rect_region(key: &str, group: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> GeoRegion {
        let poly = polygon![
            (x: x0, y: y0),
            (x: x1, y: y0),
            (x: x1, y: y1),
            (x: x0, y: y1),
            (x: x0, y: y0),
        ];
        GeoRegion {
            key: key.to_string(),
            group: group.to_string(),
            geometry: MultiPolygon::new(vec![poly]),
            attributes: HashMap::new(),
        }
    }

    fn site(name: &str, lon: f64, lat: f64) -> BoardItem {
        BoardItem {
            name: name.to_string(),
            label: format!("Lead:{}", name),
            stage: "Lead".to_string(),
            lat,
            lon,
            colour: "rgb(196, 196, 196)".to_string(),
        }
    }

    #[test]
    fn wide_region_zooms_out() {
        let regions = RegionTable::new(vec![square("a", "G", 0.0, 0.0, 1.0)]).unwrap();
        let sites = SiteIndex::new(vec![]);
        let attributes = default_attributes();

        let view = select_view(&regions, &sites, &attributes, "G", "score").unwrap();
        assert_eq!(view.bbox.span(), 1.0);
        assert_eq!(view.zoom, 8);
    }

    #[test]
    fn narrow_region_zooms_in() {
        let regions = RegionTable::new(vec![square("a", "G", 0.0, 0.0, 0.1)]).unwrap();
        let sites = SiteIndex::new(vec![]);
        let attributes = default_attributes();

        let view = select_view(&regions, &sites, &attributes, "G", "score").unwrap();
        assert_eq!(view.zoom, 9);
    }

    #[test]
    fn threshold_is_strict() {
        assert_eq!(zoom_for_span(0.5), 9);
        assert_eq!(zoom_for_span(0.5000001), 8);
        assert_eq!(zoom_for_span(0.0), 9);
    }

    #[test]
    fn boundary_points_are_excluded() {
        let bbox = BoundingBox {
            min_lon: 0.0,
            max_lon: 1.0,
            min_lat: 0.0,
            max_lat: 1.0,
        };
        let sites = SiteIndex::new(vec![
            site("on-min-lat", 0.5, 0.0),
            site("inside", 0.5, 0.5),
            site("on-max-lon", 1.0, 0.5),
            site("corner", 0.0, 0.0),
            site("outside", 2.0, 0.5),
        ]);

        let names: Vec<_> = sites.within(&bbox).iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["inside"]);
    }

    #[test]
    fn filtered_sites_keep_board_order() {
        let bbox = BoundingBox {
            min_lon: 0.0,
            max_lon: 10.0,
            min_lat: 0.0,
            max_lat: 10.0,
        };
        let sites = SiteIndex::new(vec![
            site("c", 9.0, 9.0),
            site("a", 1.0, 1.0),
            site("x", 11.0, 1.0),
            site("b", 5.0, 5.0),
        ]);

        let names: Vec<_> = sites.within(&bbox).iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn center_is_bounds_midpoint() {
        let regions = RegionTable::new(vec![rect_region("a", "G", -10.0, 0.0, 10.0, 20.0)]).unwrap();
        let sites = SiteIndex::new(vec![]);
        let attributes = default_attributes();

        let view = select_view(&regions, &sites, &attributes, "G", "score").unwrap();
        assert_eq!(view.center, (0.0, 10.0));
    }

    #[test]
    fn nyc_scenario() {
        let regions = RegionTable::new(vec![
            rect_region("101", "NYC", -74.2, 40.5, -73.9, 40.9),
            rect_region("102", "NYC", -73.9, 40.5, -73.7, 40.8),
            rect_region("201", "Boston", -71.2, 42.3, -71.0, 42.4),
        ])
        .unwrap();
        let sites = SiteIndex::new(vec![site("inside", -73.9, 40.7), site("outside", -75.0, 40.7)]);
        let attributes = default_attributes();

        let view = select_view(&regions, &sites, &attributes, "NYC", "score").unwrap();

        assert_eq!(
            view.bbox,
            BoundingBox {
                min_lon: -74.2,
                min_lat: 40.5,
                max_lon: -73.7,
                max_lat: 40.9,
            }
        );
        // Longitude span is exactly 0.5, which is not wide
        assert_eq!(view.zoom, 9);
        assert_eq!(view.regions.len(), 2);
        assert_eq!(view.attribute.column, "geoscore");

        let names: Vec<_> = view.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["inside"]);
    }

    #[test]
    fn unknown_group_and_attribute() {
        let regions = RegionTable::new(vec![square("a", "G", 0.0, 0.0, 1.0)]).unwrap();
        let sites = SiteIndex::new(vec![]);
        let attributes = default_attributes();

        assert_eq!(
            select_view(&regions, &sites, &attributes, "H", "score").unwrap_err(),
            ViewError::UnknownGroup("H".to_string())
        );
        assert_eq!(
            select_view(&regions, &sites, &attributes, "G", "crime").unwrap_err(),
            ViewError::UnknownAttribute("crime".to_string())
        );
    }
}
