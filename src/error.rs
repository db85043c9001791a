use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong between reading the source file and writing
/// the reports. Aggregation itself never fails: empty views degrade to zeros
/// or `None`.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing column `{0}` in header")]
    MissingColumn(String),

    #[error("row {row}: invalid value {value:?} for `{column}`")]
    InvalidValue {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl FleetError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FleetError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, FleetError>;
