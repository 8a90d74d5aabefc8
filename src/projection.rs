use crate::board::RawItem;
use crate::config::StageConfig;
use crate::error::BoardError;
use crate::types::BoardItem;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Funnel stage of a site, as shown in the board's status column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Engaged,
    Enrolled,
    Matched,
    Activated,
    Lead,
    Contact,
    Churned,
    Unknown(String),
}

impl Stage {
    pub fn parse(text: &str) -> Self {
        match text {
            "Engaged" => Stage::Engaged,
            "Enrolled" => Stage::Enrolled,
            "Matched" => Stage::Matched,
            "Activated" => Stage::Activated,
            "Lead" => Stage::Lead,
            "Contact" => Stage::Contact,
            "Churned" => Stage::Churned,
            other => Stage::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Stage::Engaged => "Engaged",
            Stage::Enrolled => "Enrolled",
            Stage::Matched => "Matched",
            Stage::Activated => "Activated",
            Stage::Lead => "Lead",
            Stage::Contact => "Contact",
            Stage::Churned => "Churned",
            Stage::Unknown(text) => text.as_str(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct StagePalette {
    colours: BTreeMap<String, String>,
    fallback: String,
}

impl StagePalette {
    pub fn from_config(config: &StageConfig) -> Self {
        Self {
            colours: config.colours.clone(),
            fallback: config.fallback.clone(),
        }
    }

    pub fn colour(&self, stage: &Stage) -> &str {
        self.colours
            .get(stage.as_str())
            .map(String::as_str)
            .unwrap_or(self.fallback.as_str())
    }

    /// Builds a board item, recomputing the label and colour from the stage.
    pub fn item(&self, name: String, stage: &Stage, lat: f64, lon: f64) -> BoardItem {
        BoardItem {
            label: format!("{}:{}", stage, name),
            name,
            stage: stage.to_string(),
            lat,
            lon,
            colour: self.colour(stage).to_string(),
        }
    }
}

/// Ok(None) means the item has no location set and cannot be placed on the map.
pub fn project(raw: RawItem, palette: &StagePalette) -> Result<Option<BoardItem>, BoardError> {
    let status = raw
        .status_column
        .first()
        .ok_or_else(|| BoardError::Decode(format!("item {:?} has no status column", raw.name)))?;
    let location = raw
        .location_column
        .first()
        .ok_or_else(|| BoardError::Decode(format!("item {:?} has no location column", raw.name)))?;

    let stage = Stage::parse(status.text.as_deref().unwrap_or(""));

    let (lat, lon) = match (location.lat, location.lng) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return Ok(None),
    };

    Ok(Some(palette.item(raw.name, &stage, lat, lon)))
}

pub fn project_all(raw_items: Vec<RawItem>, palette: &StagePalette) -> Result<Vec<BoardItem>, BoardError> {
    let total = raw_items.len();
    let mut items = Vec::with_capacity(total);

    for raw in raw_items {
        if let Some(item) = project(raw, palette)? {
            items.push(item);
        }
    }

    if items.len() < total {
        warn!("Skipped {} board items with no location", total - items.len());
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{LocationValue, StatusValue};

    fn palette() -> StagePalette {
        StagePalette::from_config(&StageConfig::default())
    }

    fn raw(name: &str, stage: Option<&str>, lat: Option<f64>, lng: Option<f64>) -> RawItem {
        RawItem {
            name: name.to_string(),
            status_column: vec![StatusValue {
                text: stage.map(str::to_string),
            }],
            location_column: vec![LocationValue { lat, lng }],
        }
    }

    #[test]
    fn known_stages_get_documented_colours() {
        let palette = palette();
        let expected = [
            (Stage::Engaged, "rgb(253, 171, 61)"),
            (Stage::Enrolled, "rgb(255, 100, 46)"),
            (Stage::Matched, "rgb(156, 211, 38)"),
            (Stage::Activated, "rgb(3, 127, 76)"),
            (Stage::Lead, "rgb(196, 196, 196)"),
            (Stage::Contact, "rgb(255, 203, 0)"),
            (Stage::Churned, "rgb(223, 47, 74)"),
        ];
        for (stage, colour) in expected {
            assert_eq!(Stage::parse(stage.as_str()), stage);
            assert_eq!(palette.colour(&stage), colour);
        }
    }

    #[test]
    fn unknown_stages_use_fallback() {
        let palette = palette();
        assert_eq!(palette.colour(&Stage::parse("Prospect")), "rgb(128, 128, 128)");
        assert_eq!(palette.colour(&Stage::parse("engaged")), "rgb(128, 128, 128)");
        assert_eq!(palette.colour(&Stage::parse("")), "rgb(128, 128, 128)");
    }

    #[test]
    fn projects_label_and_colour() {
        let item = project(raw("Acme Roof", Some("Matched"), Some(40.7), Some(-73.9)), &palette())
            .unwrap()
            .unwrap();

        assert_eq!(item.name, "Acme Roof");
        assert_eq!(item.label, "Matched:Acme Roof");
        assert_eq!(item.stage, "Matched");
        assert_eq!(item.lat, 40.7);
        assert_eq!(item.lon, -73.9);
        assert_eq!(item.colour, "rgb(156, 211, 38)");
    }

    #[test]
    fn null_status_text_is_unknown_stage() {
        let item = project(raw("x", None, Some(1.0), Some(2.0)), &palette())
            .unwrap()
            .unwrap();
        assert_eq!(item.label, ":x");
        assert_eq!(item.colour, "rgb(128, 128, 128)");
    }

    #[test]
    fn items_without_location_are_skipped() {
        let items = project_all(
            vec![
                raw("a", Some("Lead"), Some(1.0), Some(2.0)),
                raw("b", Some("Lead"), None, None),
                raw("c", Some("Churned"), Some(3.0), Some(4.0)),
            ],
            &palette(),
        )
        .unwrap();

        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn missing_columns_are_decode_errors() {
        let mut item = raw("a", Some("Lead"), Some(1.0), Some(2.0));
        item.location_column.clear();
        assert!(matches!(project(item, &palette()), Err(BoardError::Decode(_))));

        let mut item = raw("a", Some("Lead"), Some(1.0), Some(2.0));
        item.status_column.clear();
        assert!(matches!(project(item, &palette()), Err(BoardError::Decode(_))));
    }
}
