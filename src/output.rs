use crate::error::{FleetError, Result};
use crate::types::{FilteredView, REQUIRED_COLUMNS};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let file = File::create(path).map_err(|e| FleetError::io(path, e))?;
    let mut wtr = csv::Writer::from_writer(file);
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush().map_err(|e| FleetError::io(path, e))?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s).map_err(|e| FleetError::io(path, e))?;
    Ok(())
}

/// Write the view in the source schema. The header is always present, so
/// even an empty view re-loads cleanly.
pub fn write_view<W: Write>(writer: W, view: &FilteredView) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(REQUIRED_COLUMNS)?;
    for r in view.iter() {
        wtr.serialize(r)?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Raw-data export of the current view. Returns the number of rows written.
pub fn export_view(path: &Path, view: &FilteredView) -> Result<usize> {
    let file = File::create(path).map_err(|e| FleetError::io(path, e))?;
    write_view(file, view)?;
    Ok(view.len())
}

/// Render the first `max_rows` rows as a Markdown table.
pub fn render_table<T>(rows: &[T], max_rows: usize) -> Option<String>
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return None;
    }
    Some(Table::new(slice).with(Style::markdown()).to_string())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    match render_table(rows, max_rows) {
        Some(table) => println!("{}\n", table),
        None => println!("(no rows)\n"),
    }
}
