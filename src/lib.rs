pub mod aggregation;
pub mod chart;
pub mod config;
pub mod error;
pub mod filter;
pub mod history;
pub mod legend;
pub mod loader;
pub mod parameter;
pub mod scalar;
pub mod schema;
pub mod session;

#[cfg(feature = "python")]
mod python;

pub use aggregation::{Aggregation, SummaryTable};
pub use config::{ColumnRule, RuleKind, SheetConfig, StatsConfig};
pub use error::StatsError;
pub use filter::{FilterEngine, FilterSet, FilterSpec, FilteredView, LogSelection};
pub use history::{EventFilter, EventKind, LogHistory};
pub use legend::{LogIndex, LogLegendEntry, LogLegendIndex};
pub use loader::{CsvDirectory, SheetSource};
pub use parameter::ParameterTable;
pub use scalar::Scalar;
pub use session::{StatsSession, SummaryRequest};

#[cfg(feature = "python")]
use pyo3::prelude::*;
#[cfg(feature = "python")]
use pyo3::types::PyModule;

/// Export schema constants as Python submodules
#[cfg(feature = "python")]
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("TOTAL", schema::TOTAL)?;

    // Sheets
    let sheet = PyModule::new(m.py(), "sheet")?;
    sheet.add("LEGEND", schema::sheet::LEGEND)?;
    sheet.add("CURRENT", schema::sheet::CURRENT)?;
    sheet.add("VOLTAGE", schema::sheet::VOLTAGE)?;
    sheet.add("TIME", schema::sheet::TIME)?;
    sheet.add("FAILURE", schema::sheet::FAILURE)?;
    sheet.add("WARNING", schema::sheet::WARNING)?;
    sheet.add("EXPOSURE", schema::sheet::EXPOSURE)?;
    sheet.add("PARAMETERS", schema::sheet::PARAMETERS.to_vec())?;
    m.add_submodule(&sheet)?;

    // Legend
    let legend = PyModule::new(m.py(), "legend")?;
    legend.add("NAME", schema::legend::NAME)?;
    m.add_submodule(&legend)?;

    // Exposure
    let exposure = PyModule::new(m.py(), "exposure")?;
    exposure.add("CHARGE", schema::exposure::CHARGE)?;
    exposure.add("POWER", schema::exposure::POWER)?;
    exposure.add("ENERGY", schema::exposure::ENERGY)?;
    exposure.add("CURRENT_GAIN", schema::exposure::CURRENT_GAIN)?;
    exposure.add("INDUCTOR", schema::exposure::INDUCTOR)?;
    m.add_submodule(&exposure)?;

    // History
    let history = PyModule::new(m.py(), "history")?;
    history.add("FAILURE", schema::history::FAILURE)?;
    history.add("WARNING", schema::history::WARNING)?;
    m.add_submodule(&history)?;

    // Valid values
    let valid = PyModule::new(m.py(), "valid")?;
    valid.add("CURRENT_SETTINGS", schema::valid::CURRENT_SETTINGS.to_vec())?;
    valid.add("VOLTAGE_RANGE", schema::valid::VOLTAGE_RANGE)?;
    valid.add("TIME_RANGE", schema::valid::TIME_RANGE)?;
    m.add_submodule(&valid)?;

    Ok(())
}

#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<python::LogStatsModel>()?;
    m.add_class::<python::PyFilter>()?;
    m.add_class::<python::Summary>()?;
    m.add_function(wrap_pyfunction!(python::init_logging, m)?)?;
    add_schema_exports(m)?;
    Ok(())
}
