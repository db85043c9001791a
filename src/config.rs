// Runtime configuration, read once at startup from the environment (a `.env`
// file in the working directory is honored by `main`).
use crate::error::{FleetError, Result};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_DATA_FILE: &str = "kpis_frota_ficticios.csv";
pub const EXPORT_FILE_NAME: &str = "kpis_frota_filtrados.csv";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Source CSV with one row per vehicle-day.
    pub data_path: PathBuf,
    /// Directory receiving report CSVs, `dashboard.json` and the export.
    pub output_dir: PathBuf,
    /// Rows shown in each console table preview.
    pub preview_rows: usize,
    pub currency_symbol: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_FILE),
            output_dir: PathBuf::from("."),
            preview_rows: 5,
            currency_symbol: "R$".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup so tests don't have to
    /// touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let preview_rows = match non_empty("FLEET_KPI_PREVIEW_ROWS") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
                FleetError::Config(format!(
                    "FLEET_KPI_PREVIEW_ROWS must be a non-negative integer, got {:?}",
                    raw
                ))
            })?,
            None => defaults.preview_rows,
        };

        Ok(Self {
            data_path: non_empty("FLEET_KPI_DATA")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_path),
            output_dir: non_empty("FLEET_KPI_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            preview_rows,
            currency_symbol: non_empty("FLEET_KPI_CURRENCY").unwrap_or(defaults.currency_symbol),
        })
    }

    pub fn output_file(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    pub fn export_path(&self) -> PathBuf {
        self.output_file(EXPORT_FILE_NAME)
    }
}
