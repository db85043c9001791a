use crate::util::{display_0dp, display_2dp, display_opt_2dp};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// Source column names, in the order the export writes them.
pub const REQUIRED_COLUMNS: [&str; 11] = [
    "Data",
    "ID_Veiculo",
    "Modelo",
    "KM_Rodado",
    "Media_Consumo_KML",
    "Custo_Combustivel",
    "Custo_Manutencao",
    "Custo_Multas",
    "Tempo_Parada_Manutencao_Horas",
    "Acidentes",
    "Litros_Consumidos",
];

/// One CSV row as it comes off the reader, before any validation.
#[derive(Debug, Deserialize)]
pub struct RawRow {
    #[serde(rename = "Data")]
    pub date: Option<String>,
    #[serde(rename = "ID_Veiculo")]
    pub vehicle_id: Option<String>,
    #[serde(rename = "Modelo")]
    pub model: Option<String>,
    #[serde(rename = "KM_Rodado")]
    pub km_driven: Option<String>,
    #[serde(rename = "Media_Consumo_KML")]
    pub avg_consumption_km_per_l: Option<String>,
    #[serde(rename = "Custo_Combustivel")]
    pub fuel_cost: Option<String>,
    #[serde(rename = "Custo_Manutencao")]
    pub maintenance_cost: Option<String>,
    #[serde(rename = "Custo_Multas")]
    pub fine_cost: Option<String>,
    #[serde(rename = "Tempo_Parada_Manutencao_Horas")]
    pub maintenance_downtime_hours: Option<String>,
    #[serde(rename = "Acidentes")]
    pub accidents: Option<String>,
    #[serde(rename = "Litros_Consumidos")]
    pub liters_consumed: Option<String>,
}

/// A validated vehicle-day. Serializes back to the source schema, which is
/// what the raw-data export relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct Record {
    #[serde(rename = "Data")]
    #[tabled(rename = "Data")]
    pub date: NaiveDate,
    #[serde(rename = "ID_Veiculo")]
    #[tabled(rename = "ID_Veiculo")]
    pub vehicle_id: String,
    #[serde(rename = "Modelo")]
    #[tabled(rename = "Modelo")]
    pub model: String,
    #[serde(rename = "KM_Rodado")]
    #[tabled(rename = "KM_Rodado")]
    pub km_driven: f64,
    #[serde(rename = "Media_Consumo_KML")]
    #[tabled(rename = "Media_Consumo_KML")]
    pub avg_consumption_km_per_l: f64,
    #[serde(rename = "Custo_Combustivel")]
    #[tabled(rename = "Custo_Combustivel")]
    pub fuel_cost: f64,
    #[serde(rename = "Custo_Manutencao")]
    #[tabled(rename = "Custo_Manutencao")]
    pub maintenance_cost: f64,
    #[serde(rename = "Custo_Multas")]
    #[tabled(rename = "Custo_Multas")]
    pub fine_cost: f64,
    #[serde(rename = "Tempo_Parada_Manutencao_Horas")]
    #[tabled(rename = "Tempo_Parada_Manutencao_Horas")]
    pub maintenance_downtime_hours: f64,
    #[serde(rename = "Acidentes")]
    #[tabled(rename = "Acidentes")]
    pub accidents: u32,
    #[serde(rename = "Litros_Consumidos")]
    #[tabled(rename = "Litros_Consumidos")]
    pub liters_consumed: f64,
}

impl Record {
    /// Fuel + maintenance + fines for this day.
    pub fn total_cost(&self) -> f64 {
        self.fuel_cost + self.maintenance_cost + self.fine_cost
    }

    /// An operational day is one where the vehicle actually drove.
    pub fn is_operational(&self) -> bool {
        self.km_driven > 0.0
    }
}

/// The loaded table. Immutable once built; shared behind an `Arc` by the
/// loader cache.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every record, unfiltered.
    pub fn view(&self) -> FilteredView<'_> {
        FilteredView::new(self.records.iter().collect())
    }

    /// Distinct models in order of first appearance.
    pub fn models(&self) -> Vec<String> {
        distinct_in_order(self.records.iter().map(|r| r.model.as_str()))
    }

    /// Distinct vehicle ids in order of first appearance.
    pub fn vehicle_ids(&self) -> Vec<String> {
        distinct_in_order(self.records.iter().map(|r| r.vehicle_id.as_str()))
    }

    /// Earliest and latest date present, `None` for an empty dataset.
    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.records.iter().map(|r| r.date).min()?;
        let max = self.records.iter().map(|r| r.date).max()?;
        Some((min, max))
    }
}

fn distinct_in_order<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .filter(|v| seen.insert(*v))
        .map(str::to_string)
        .collect()
}

/// A read-only subset of a [`Dataset`], borrowing its records. Rebuilt from
/// scratch on every filter change.
#[derive(Debug, Clone, Default)]
pub struct FilteredView<'a> {
    records: Vec<&'a Record>,
}

impl<'a> FilteredView<'a> {
    pub fn new(records: Vec<&'a Record>) -> Self {
        Self { records }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Record> + '_ {
        self.records.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The operational subview: records with `km_driven > 0`.
    pub fn operational(&self) -> FilteredView<'a> {
        FilteredView::new(
            self.records
                .iter()
                .copied()
                .filter(|r| r.is_operational())
                .collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// Aggregated output rows
// ---------------------------------------------------------------------------

/// The five headline KPIs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadlineMetrics {
    pub total_km: f64,
    /// Mean of the per-record consumption column; `None` when nothing drove.
    pub avg_consumption: Option<f64>,
    pub total_cost: f64,
    pub cost_per_km: f64,
    pub total_accidents: u64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
#[tabled(rename_all = "PascalCase")]
pub struct CostCategoryRow {
    pub category: String,
    #[tabled(display_with = "display_2dp")]
    pub amount: f64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
#[tabled(rename_all = "PascalCase")]
pub struct DailyCostRow {
    pub date: NaiveDate,
    #[tabled(display_with = "display_2dp")]
    pub fuel_cost: f64,
    #[tabled(display_with = "display_2dp")]
    pub maintenance_cost: f64,
    #[tabled(display_with = "display_2dp")]
    pub fine_cost: f64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
#[tabled(rename_all = "PascalCase")]
pub struct VehicleCostRow {
    pub vehicle_id: String,
    #[tabled(display_with = "display_2dp")]
    pub fuel_cost: f64,
    #[tabled(display_with = "display_2dp")]
    pub maintenance_cost: f64,
    #[tabled(display_with = "display_2dp")]
    pub fine_cost: f64,
    #[tabled(display_with = "display_2dp")]
    pub total_cost: f64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
#[tabled(rename_all = "PascalCase")]
pub struct ModelConsumptionRow {
    pub model: String,
    #[tabled(display_with = "display_2dp")]
    pub avg_consumption_km_per_l: f64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
#[tabled(rename_all = "PascalCase")]
pub struct VehicleKmRow {
    pub vehicle_id: String,
    #[tabled(display_with = "display_0dp")]
    pub km_driven: f64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
#[tabled(rename_all = "PascalCase")]
pub struct DailyOperationRow {
    pub date: NaiveDate,
    #[tabled(display_with = "display_0dp")]
    pub km_driven: f64,
    #[tabled(display_with = "display_2dp")]
    pub liters_consumed: f64,
    /// km / liters for the day; `None` when no fuel was recorded.
    #[tabled(display_with = "display_opt_2dp")]
    pub daily_consumption: Option<f64>,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
#[tabled(rename_all = "PascalCase")]
pub struct ModelMaintenanceRow {
    pub model: String,
    #[tabled(display_with = "display_2dp")]
    pub maintenance_cost: f64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
#[tabled(rename_all = "PascalCase")]
pub struct VehicleDowntimeRow {
    pub vehicle_id: String,
    #[tabled(display_with = "display_2dp")]
    pub downtime_hours: f64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
#[tabled(rename_all = "PascalCase")]
pub struct AvailabilityRow {
    pub vehicle_id: String,
    pub days: usize,
    #[tabled(display_with = "display_0dp")]
    pub total_possible_hours: f64,
    #[tabled(display_with = "display_2dp")]
    pub downtime_hours: f64,
    #[tabled(display_with = "display_2dp")]
    pub availability_pct: f64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
#[tabled(rename_all = "PascalCase")]
pub struct ModelAccidentsRow {
    pub model: String,
    pub accidents: u64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
#[tabled(rename_all = "PascalCase")]
pub struct ModelFinesRow {
    pub model: String,
    #[tabled(display_with = "display_2dp")]
    pub fine_cost: f64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
#[tabled(rename_all = "PascalCase")]
pub struct AccidentRateRow {
    pub model: String,
    pub accidents: u64,
    #[tabled(display_with = "display_0dp")]
    pub km_driven: f64,
    #[tabled(display_with = "display_2dp")]
    pub rate_per_million_km: f64,
}

// ---------------------------------------------------------------------------
// Thematic views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostReport {
    pub by_category: Vec<CostCategoryRow>,
    pub over_time: Vec<DailyCostRow>,
    pub top_vehicles: Vec<VehicleCostRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationsReport {
    pub consumption_by_model: Vec<ModelConsumptionRow>,
    pub top_vehicles_by_km: Vec<VehicleKmRow>,
    pub daily: Vec<DailyOperationRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintenanceReport {
    pub cost_by_model: Vec<ModelMaintenanceRow>,
    pub top_vehicles_by_downtime: Vec<VehicleDowntimeRow>,
    pub lowest_availability: Vec<AvailabilityRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetyReport {
    pub accidents_by_model: Vec<ModelAccidentsRow>,
    pub fines_by_model: Vec<ModelFinesRow>,
    pub accident_rate_by_model: Vec<AccidentRateRow>,
}

/// Human-readable echo of the filters a dashboard was computed under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterSummary {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub model: String,
    pub vehicle: String,
}

/// Everything the presentation layer needs for one filter state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub filters: FilterSummary,
    pub rows_in_view: usize,
    pub operational_rows: usize,
    pub headline: HeadlineMetrics,
    pub costs: CostReport,
    pub operations: OperationsReport,
    pub maintenance: MaintenanceReport,
    pub safety: SafetyReport,
}
