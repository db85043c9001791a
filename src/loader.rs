use crate::error::{FleetError, Result};
use crate::types::{Dataset, RawRow, Record, REQUIRED_COLUMNS};
use crate::util::{
    parse_count_safe, parse_date_safe, parse_f64_safe, parse_non_negative_safe, parse_text_safe,
};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub vehicles: usize,
    pub models: usize,
    pub date_span: Option<(NaiveDate, NaiveDate)>,
    /// Vehicle ids that appear under more than one model.
    pub inconsistent_vehicles: usize,
}

pub fn load_dataset(path: &Path) -> Result<(Dataset, LoadReport)> {
    let file = File::open(path).map_err(|e| FleetError::io(path, e))?;
    let loaded = load_from_reader(file)?;
    info!("loaded {} rows from {}", loaded.1.total_rows, path.display());
    Ok(loaded)
}

/// Parse a whole CSV stream. The first bad row aborts the load, so callers
/// never see a partial dataset.
pub fn load_from_reader<R: Read>(reader: R) -> Result<(Dataset, LoadReport)> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(FleetError::MissingColumn(column.to_string()));
        }
    }

    let mut records = Vec::new();
    for (idx, result) in rdr.deserialize::<RawRow>().enumerate() {
        let row = result?;
        records.push(parse_record(row, idx + 1)?);
    }

    let dataset = Dataset::new(records);
    let report = summarize(&dataset);
    if dataset.is_empty() {
        warn!("dataset has a header but no rows");
    }
    Ok((dataset, report))
}

fn field<T>(
    row: usize,
    column: &'static str,
    raw: Option<String>,
    parse: impl Fn(Option<&str>) -> Option<T>,
) -> Result<T> {
    parse(raw.as_deref()).ok_or_else(|| FleetError::InvalidValue {
        row,
        column,
        value: raw.unwrap_or_default(),
    })
}

fn parse_record(raw: RawRow, row: usize) -> Result<Record> {
    Ok(Record {
        date: field(row, "Data", raw.date, parse_date_safe)?,
        vehicle_id: field(row, "ID_Veiculo", raw.vehicle_id, parse_text_safe)?,
        model: field(row, "Modelo", raw.model, parse_text_safe)?,
        km_driven: field(row, "KM_Rodado", raw.km_driven, parse_non_negative_safe)?,
        avg_consumption_km_per_l: field(
            row,
            "Media_Consumo_KML",
            raw.avg_consumption_km_per_l,
            parse_f64_safe,
        )?,
        fuel_cost: field(row, "Custo_Combustivel", raw.fuel_cost, parse_non_negative_safe)?,
        maintenance_cost: field(
            row,
            "Custo_Manutencao",
            raw.maintenance_cost,
            parse_non_negative_safe,
        )?,
        fine_cost: field(row, "Custo_Multas", raw.fine_cost, parse_non_negative_safe)?,
        maintenance_downtime_hours: field(
            row,
            "Tempo_Parada_Manutencao_Horas",
            raw.maintenance_downtime_hours,
            parse_non_negative_safe,
        )?,
        accidents: field(row, "Acidentes", raw.accidents, parse_count_safe)?,
        liters_consumed: field(
            row,
            "Litros_Consumidos",
            raw.liters_consumed,
            parse_non_negative_safe,
        )?,
    })
}

fn summarize(dataset: &Dataset) -> LoadReport {
    let mut models_per_vehicle: HashMap<&str, HashSet<&str>> = HashMap::new();
    for r in dataset.records() {
        models_per_vehicle
            .entry(r.vehicle_id.as_str())
            .or_default()
            .insert(r.model.as_str());
    }

    let mut inconsistent: Vec<&str> = models_per_vehicle
        .iter()
        .filter(|(_, models)| models.len() > 1)
        .map(|(vehicle, _)| *vehicle)
        .collect();
    inconsistent.sort_unstable();
    for vehicle in &inconsistent {
        warn!("vehicle {} is recorded under more than one model", vehicle);
    }

    LoadReport {
        total_rows: dataset.len(),
        vehicles: models_per_vehicle.len(),
        models: dataset.models().len(),
        date_span: dataset.date_bounds(),
        inconsistent_vehicles: inconsistent.len(),
    }
}

// ---------------------------------------------------------------------------
// Memoized loading
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct CacheEntry {
    modified: Option<SystemTime>,
    dataset: Arc<Dataset>,
    report: LoadReport,
}

/// Result of [`DatasetCache::load`].
#[derive(Debug, Clone)]
pub struct Loaded {
    pub dataset: Arc<Dataset>,
    pub report: LoadReport,
    pub from_cache: bool,
}

/// Datasets keyed by source file identity (canonical path plus modification
/// time). A changed mtime reloads; `invalidate` forces it.
#[derive(Debug, Default)]
pub struct DatasetCache {
    entries: HashMap<PathBuf, CacheEntry>,
}

impl DatasetCache {
    pub fn load(&mut self, path: &Path) -> Result<Loaded> {
        let key = source_key(path);
        let modified = fs::metadata(path)
            .map_err(|e| FleetError::io(path, e))?
            .modified()
            .ok();

        if let Some(entry) = self.entries.get(&key) {
            if modified.is_some() && entry.modified == modified {
                debug!("cache hit for {}", key.display());
                return Ok(Loaded {
                    dataset: Arc::clone(&entry.dataset),
                    report: entry.report.clone(),
                    from_cache: true,
                });
            }
            debug!("{} changed on disk, reloading", key.display());
        }

        let (dataset, report) = load_dataset(path)?;
        let dataset = Arc::new(dataset);
        self.entries.insert(
            key,
            CacheEntry {
                modified,
                dataset: Arc::clone(&dataset),
                report: report.clone(),
            },
        );
        Ok(Loaded {
            dataset,
            report,
            from_cache: false,
        })
    }

    /// Drop the cached copy of `path`. Returns whether anything was cached.
    pub fn invalidate(&mut self, path: &Path) -> bool {
        self.entries.remove(&source_key(path)).is_some()
    }
}

fn source_key(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
