use std::collections::HashMap;
use std::path::{Path, PathBuf};

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use pyo3_polars::PyDataFrame;
use tracing_subscriber::filter::EnvFilter;

use crate::aggregation::SummaryTable;
use crate::chart::{self, PieSource};
use crate::config::{RuleKind, StatsConfig};
use crate::error::StatsError;
use crate::filter::{FilterSet, FilterSpec, LogSelection};
use crate::history::{EventFilter, EventKind};
use crate::legend::LogLegendIndex;
use crate::loader::CsvDirectory;
use crate::scalar::Scalar;
use crate::session::{StatsSession, SummaryRequest};

/// Filter choice for one column, built from Python and applied in Rust.
#[derive(Debug, Clone)]
#[pyclass(name = "Filter")]
pub struct PyFilter {
    pub(crate) spec: FilterSpec,
}

#[pymethods]
impl PyFilter {
    #[staticmethod]
    #[pyo3(signature = (column, values, restrict_to_valid=true))]
    fn categorical(column: &str, values: Vec<Bound<'_, PyAny>>, restrict_to_valid: bool) -> PyResult<Self> {
        let values = values.iter().map(scalar_from_py).collect::<PyResult<Vec<_>>>()?;
        Ok(Self {
            spec: FilterSpec::categorical(column, values).restrict_to_valid(restrict_to_valid),
        })
    }

    #[staticmethod]
    #[pyo3(signature = (column, min, max, restrict_to_valid=true))]
    fn range(column: &str, min: f64, max: f64, restrict_to_valid: bool) -> Self {
        Self {
            spec: FilterSpec::range(column, min, max).restrict_to_valid(restrict_to_valid),
        }
    }

    #[getter]
    fn column(&self) -> &str {
        &self.spec.column
    }

    fn __repr__(&self) -> String {
        format!("Filter({:?})", self.spec)
    }
}

/// Summary of one sheet, with its chart feeds.
#[pyclass]
pub struct Summary {
    summary: SummaryTable,
    legend: LogLegendIndex,
}

#[pymethods]
impl Summary {
    #[getter]
    fn sheet(&self) -> &str {
        self.summary.sheet_name()
    }

    #[getter]
    fn frame(&self) -> PyDataFrame {
        PyDataFrame(self.summary.to_frame())
    }

    fn bar_chart_json(&self) -> PyResult<String> {
        Ok(chart::bar_chart(&self.summary, &self.legend)?.to_json()?)
    }

    /// Selector options for the pie chart: log names followed by "TOTAL".
    fn pie_sources(&self) -> Vec<String> {
        chart::pie_sources(&self.summary, &self.legend)
    }

    #[pyo3(signature = (source="TOTAL"))]
    fn pie_chart_json(&self, source: &str) -> PyResult<String> {
        let slices = chart::pie_chart(&self.summary, &self.legend, &PieSource::parse(source))?;
        Ok(chart::pie_chart_json(&slices)?)
    }
}

#[pyclass]
pub struct LogStatsModel {
    base_path: PathBuf,
    session: Option<StatsSession>,
}

#[pymethods]
impl LogStatsModel {
    #[new]
    fn new(base_path: String) -> Self {
        Self {
            base_path: PathBuf::from(base_path),
            session: None,
        }
    }

    // ── Data loading ────────────────────────────────────────────────────────

    /// Load `<sheet>.csv` files from the base path.
    ///
    /// Args:
    ///     config_path: TOML file overriding the built-in sheet configuration
    #[pyo3(signature = (config_path=None))]
    fn load(&mut self, config_path: Option<&str>) -> PyResult<()> {
        let config = self.read_config(config_path)?;
        let source = CsvDirectory::new(&self.base_path);
        self.session = Some(StatsSession::load(&source, config)?);
        Ok(())
    }

    /// Load from frames keyed by sheet name, e.g. read with
    /// `pl.read_excel(path, sheet_id=0)`.
    #[pyo3(signature = (sheets, config_path=None))]
    fn load_frames(&mut self, sheets: HashMap<String, PyDataFrame>, config_path: Option<&str>) -> PyResult<()> {
        let config = self.read_config(config_path)?;
        let sheets: HashMap<String, _> = sheets.into_iter().map(|(name, df)| (name, df.0)).collect();
        self.session = Some(StatsSession::load(&sheets, config)?);
        Ok(())
    }

    // ── Legend ──────────────────────────────────────────────────────────────

    #[getter]
    fn log_names(&self) -> PyResult<Vec<String>> {
        let session = self.session()?;
        Ok(session.legend().names_in_order().into_iter().map(String::from).collect())
    }

    #[getter]
    fn legend(&self) -> PyResult<PyDataFrame> {
        let session = self.session()?;
        Ok(PyDataFrame(LogLegendIndex::to_frame(session.legend().entries())?))
    }

    #[getter]
    fn sheet_names(&self) -> PyResult<Vec<String>> {
        let session = self.session()?;
        Ok(session.tables().iter().map(|t| t.sheet_name().to_string()).collect())
    }

    // ── Filtering ───────────────────────────────────────────────────────────

    /// Values a filter widget can offer.
    ///
    /// Returns a dict with `values`, and for range columns `bounds` and
    /// integer `slider` bounds. The widget kind and the default of
    /// `restrict_to_valid` come from the sheet configuration.
    #[pyo3(signature = (sheet, column, restrict_to_valid=None))]
    fn candidates<'py>(
        &self,
        py: Python<'py>,
        sheet: &str,
        column: &str,
        restrict_to_valid: Option<bool>,
    ) -> PyResult<Bound<'py, PyDict>> {
        let session = self.session()?;
        let rule = session.table(sheet)?.rule_for(column);
        let kind = rule.map(|r| r.kind).unwrap_or(RuleKind::Categorical);
        let restrict = restrict_to_valid.unwrap_or_else(|| rule.is_none_or(|r| r.restrict_to_valid));
        let candidates = session.candidates(sheet, column, kind, restrict)?;

        let dict = PyDict::new(py);
        let values = candidates
            .values
            .iter()
            .map(|v| scalar_to_py(py, v))
            .collect::<PyResult<Vec<_>>>()?;
        dict.set_item("values", values)?;
        if let Some(bounds) = candidates.bounds {
            dict.set_item("bounds", (bounds.min, bounds.max))?;
            dict.set_item("slider", bounds.slider())?;
        }
        Ok(dict)
    }

    /// One filter per configured column, selecting every candidate.
    fn default_filters(&self, sheet: &str) -> PyResult<Vec<PyFilter>> {
        let filters = self.session()?.default_filters(sheet)?;
        Ok(filters.iter().cloned().map(|spec| PyFilter { spec }).collect())
    }

    /// Filter and total one sheet.
    ///
    /// Args:
    ///     logs: log names under analysis (default: every log)
    ///     filters: applied in order; a later filter on the same column wins
    #[pyo3(signature = (sheet, logs=None, filters=None))]
    fn summarize(
        &self,
        sheet: &str,
        logs: Option<Vec<String>>,
        filters: Option<Vec<PyRef<'_, PyFilter>>>,
    ) -> PyResult<Summary> {
        let session = self.session()?;
        let mut filter_set = FilterSet::new();
        for filter in filters.unwrap_or_default() {
            filter_set.set(filter.spec.clone());
        }
        let request = SummaryRequest::new(sheet)
            .logs(LogSelection::names(logs.unwrap_or_default()))
            .filters(filter_set);
        Ok(Summary {
            summary: session.summarize(&request)?,
            legend: session.legend().clone(),
        })
    }

    // ── Log history ─────────────────────────────────────────────────────────

    /// Distinct labels in the `Falha` or `Warning` column of a log's history.
    fn event_labels(&self, log_name: &str, kind: &str) -> PyResult<Vec<String>> {
        let kind = parse_event_kind(kind)?;
        Ok(self.session()?.history_by_name(log_name)?.event_labels(kind)?)
    }

    /// History of one log. With `kind` and `label`, only rows carrying that
    /// label plus the `back_lines` rows before each of them.
    #[pyo3(signature = (log_name, kind=None, label=None, back_lines=1))]
    fn log_history(
        &self,
        log_name: &str,
        kind: Option<&str>,
        label: Option<String>,
        back_lines: usize,
    ) -> PyResult<PyDataFrame> {
        let filter = match (kind, label) {
            (Some(kind), Some(label)) => EventFilter::Event {
                kind: parse_event_kind(kind)?,
                label,
            },
            (None, None) => EventFilter::None,
            _ => return Err(PyValueError::new_err("kind and label must be given together")),
        };
        let window = self.session()?.history_window(log_name, &filter, back_lines)?;
        Ok(PyDataFrame(window))
    }
}

// ── Private helpers ─────────────────────────────────────────────────────────

impl LogStatsModel {
    fn session(&self) -> Result<&StatsSession, StatsError> {
        self.session
            .as_ref()
            .ok_or_else(|| StatsError::InvalidData("No statistics loaded".into()))
    }

    fn read_config(&self, config_path: Option<&str>) -> Result<StatsConfig, StatsError> {
        match config_path {
            Some(path) => StatsConfig::load(Path::new(path)),
            None => Ok(StatsConfig::default()),
        }
    }
}

fn parse_event_kind(kind: &str) -> PyResult<EventKind> {
    EventKind::from_column(kind).ok_or_else(|| {
        PyValueError::new_err(format!(
            "Invalid event kind: '{}'. Must be 'Falha' or 'Warning'",
            kind
        ))
    })
}

fn scalar_from_py(value: &Bound<'_, PyAny>) -> PyResult<Scalar> {
    if value.is_none() {
        Ok(Scalar::Missing)
    } else if let Ok(n) = value.extract::<f64>() {
        Ok(Scalar::from(n))
    } else {
        Ok(Scalar::Text(value.str()?.to_string()))
    }
}

fn scalar_to_py(py: Python<'_>, value: &Scalar) -> PyResult<PyObject> {
    Ok(match value {
        Scalar::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
            (*n as i64).into_pyobject(py)?.into_any().unbind()
        }
        Scalar::Number(n) => n.into_pyobject(py)?.into_any().unbind(),
        Scalar::Text(s) => s.into_pyobject(py)?.into_any().unbind(),
        Scalar::Missing => py.None(),
    })
}

/// Install a stderr subscriber. `level` is an `EnvFilter` directive such as
/// `"debug"` or `"_core=trace"`. Returns false when one is already installed.
#[pyfunction]
#[pyo3(signature = (level="info"))]
pub fn init_logging(level: &str) -> PyResult<bool> {
    let filter = EnvFilter::try_new(level).map_err(|e| PyValueError::new_err(e.to_string()))?;
    Ok(tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok())
}
