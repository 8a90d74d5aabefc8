use crate::projection::{Stage, StagePalette};
use crate::types::BoardItem;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, Writer};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

// On-disk row: name,stage,lat,lng
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotRow {
    name: String,
    stage: String,
    lat: f64,
    lng: f64,
}

pub fn write_snapshot<W: Write>(items: &[BoardItem], writer: W) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);
    for item in items {
        wtr.serialize(SnapshotRow {
            name: item.name.clone(),
            stage: item.stage.clone(),
            lat: item.lat,
            lng: item.lon,
        })?;
    }
    wtr.flush().context("Failed to flush board snapshot")?;
    Ok(())
}

/// Colours are recomputed from the palette, never read from the file.
pub fn read_snapshot<R: Read>(reader: R, palette: &StagePalette) -> Result<Vec<BoardItem>> {
    let mut rdr = ReaderBuilder::new().from_reader(reader);
    let mut items = Vec::new();

    for (line, result) in rdr.deserialize::<SnapshotRow>().enumerate() {
        let row = result.with_context(|| format!("Invalid board snapshot row {}", line + 1))?;
        let stage = Stage::parse(&row.stage);
        items.push(palette.item(row.name, &stage, row.lat, row.lng));
    }

    Ok(items)
}

pub fn save_snapshot(items: &[BoardItem], path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create board snapshot: {:?}", path))?;
    write_snapshot(items, file)
}

pub fn load_snapshot(path: &Path, palette: &StagePalette) -> Result<Vec<BoardItem>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open board snapshot: {:?}", path))?;
    read_snapshot(file, palette)
}
