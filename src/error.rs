#[cfg(feature = "python")]
use pyo3::exceptions::{PyRuntimeError, PyValueError};
#[cfg(feature = "python")]
use pyo3::PyErr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Unknown log name: {0}")]
    UnknownLogName(String),

    #[error("No candidate values left to filter column '{0}'")]
    EmptyFilterRange(String),

    #[error("Column '{0}' has non-numeric values and cannot be range-filtered")]
    NonNumericRangeColumn(String),

    #[error("Missing sheet: {0}")]
    MissingSheet(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Missing column '{column}' in sheet '{sheet}'")]
    MissingColumn { sheet: String, column: String },

    #[error("InvalidData: {0}")]
    InvalidData(String),

    #[error("Config: {0}")]
    Config(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StatsError {
    /// Errors the shell should surface as a blocking validation message
    /// rather than a failure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnknownLogName(_)
                | Self::EmptyFilterRange(_)
                | Self::NonNumericRangeColumn(_)
                | Self::MissingSheet(_)
        )
    }
}

impl From<toml::de::Error> for StatsError {
    fn from(err: toml::de::Error) -> Self {
        StatsError::Config(err.to_string())
    }
}

#[cfg(feature = "python")]
impl From<StatsError> for PyErr {
    fn from(err: StatsError) -> PyErr {
        if err.is_validation() {
            PyValueError::new_err(err.to_string())
        } else {
            PyRuntimeError::new_err(err.to_string())
        }
    }
}
