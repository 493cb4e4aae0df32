use std::collections::HashMap;

use polars::prelude::DataFrame;
use rayon::prelude::*;

use crate::aggregation::{Aggregation, SummaryTable};
use crate::config::{RuleKind, StatsConfig};
use crate::error::StatsError;
use crate::filter::{Candidates, FilterEngine, FilterSet, FilterSpec, LogSelection};
use crate::history::{EventFilter, LogHistory};
use crate::legend::{LogIndex, LogLegendIndex};
use crate::loader::SheetSource;
use crate::parameter::ParameterTable;

/// What to summarize on one sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRequest {
    pub sheet: String,
    pub logs: LogSelection,
    pub filters: FilterSet,
}

impl SummaryRequest {
    /// Every log, no filters.
    pub fn new(sheet: &str) -> Self {
        Self {
            sheet: sheet.to_string(),
            logs: LogSelection::all(),
            filters: FilterSet::new(),
        }
    }

    pub fn logs(mut self, logs: LogSelection) -> Self {
        self.logs = logs;
        self
    }

    pub fn filter(mut self, spec: FilterSpec) -> Self {
        self.filters.set(spec);
        self
    }

    pub fn filters(mut self, filters: FilterSet) -> Self {
        self.filters = filters;
        self
    }
}

/// Everything read from one statistics workbook.
///
/// Loaded once; every query runs against this immutable snapshot.
#[derive(Debug, Clone)]
pub struct StatsSession {
    config: StatsConfig,
    legend: LogLegendIndex,
    tables: Vec<ParameterTable>,
    histories: HashMap<LogIndex, LogHistory>,
}

impl StatsSession {
    /// Read the legend, every configured parameter sheet and the history sheet
    /// of each log. History sheets are optional.
    pub fn load(source: &dyn SheetSource, config: StatsConfig) -> Result<Self, StatsError> {
        config.validate()?;

        let legend_frame = require_sheet(source, &config.legend_sheet)?;
        let legend = LogLegendIndex::from_frame(&legend_frame)?;

        let mut tables = Vec::with_capacity(config.sheets.len());
        for sheet in &config.sheets {
            let frame = require_sheet(source, &sheet.name)?;
            tables.push(ParameterTable::from_frame(sheet.clone(), &frame)?);
        }

        let mut histories = HashMap::new();
        for index in legend.indexes() {
            match source.read_sheet(&LogLegendIndex::column_for(index))? {
                Some(frame) => {
                    histories.insert(index, LogHistory::new(index, frame));
                }
                None => tracing::warn!(log = index, name = %legend.name_for(index), "No history sheet for log"),
            }
        }

        tracing::info!(
            logs = legend.len(),
            sheets = tables.len(),
            histories = histories.len(),
            "Statistics loaded"
        );

        Ok(Self {
            config,
            legend,
            tables,
            histories,
        })
    }

    pub fn legend(&self) -> &LogLegendIndex {
        &self.legend
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    /// Parameter sheets in configuration order.
    pub fn tables(&self) -> &[ParameterTable] {
        &self.tables
    }

    pub fn table(&self, sheet: &str) -> Result<&ParameterTable, StatsError> {
        self.tables
            .iter()
            .find(|t| t.sheet_name() == sheet)
            .ok_or_else(|| StatsError::MissingSheet(sheet.to_string()))
    }

    pub fn history(&self, index: LogIndex) -> Result<&LogHistory, StatsError> {
        self.histories
            .get(&index)
            .ok_or_else(|| StatsError::MissingSheet(LogLegendIndex::column_for(index)))
    }

    pub fn history_by_name(&self, name: &str) -> Result<&LogHistory, StatsError> {
        self.history(self.legend.index_for(name)?)
    }

    /// History rows of one log, narrowed to an event and its preceding rows.
    pub fn history_window(
        &self,
        name: &str,
        filter: &EventFilter,
        back_lines: usize,
    ) -> Result<DataFrame, StatsError> {
        self.history_by_name(name)?.window(filter, back_lines)
    }

    pub fn engine(&self, sheet: &str) -> Result<FilterEngine<'_>, StatsError> {
        Ok(FilterEngine::new(self.table(sheet)?, &self.legend))
    }

    pub fn candidates(
        &self,
        sheet: &str,
        column: &str,
        kind: RuleKind,
        restrict_to_valid: bool,
    ) -> Result<Candidates, StatsError> {
        self.engine(sheet)?.candidates(column, kind, restrict_to_valid)
    }

    pub fn default_filters(&self, sheet: &str) -> Result<FilterSet, StatsError> {
        self.engine(sheet)?.default_filters()
    }

    /// Filter then aggregate one sheet.
    pub fn summarize(&self, request: &SummaryRequest) -> Result<SummaryTable, StatsError> {
        let view = self.engine(&request.sheet)?.apply(&request.logs, &request.filters)?;
        Aggregation::for_view(&view).apply(&view)
    }

    /// Summaries for independent requests, computed in parallel and returned
    /// in request order.
    pub fn summarize_all(&self, requests: &[SummaryRequest]) -> Result<Vec<SummaryTable>, StatsError> {
        requests.par_iter().map(|r| self.summarize(r)).collect()
    }
}

fn require_sheet(source: &dyn SheetSource, name: &str) -> Result<DataFrame, StatsError> {
    source
        .read_sheet(name)?
        .ok_or_else(|| StatsError::MissingSheet(name.to_string()))
}
