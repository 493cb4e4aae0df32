use std::collections::HashSet;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::RuleKind;
use crate::error::StatsError;
use crate::legend::{LogIndex, LogLegendIndex};
use crate::parameter::{ParameterTable, SheetLayout};
use crate::scalar::{column_scalars, numeric_expr, row_scalars, text_expr, Scalar};
use crate::schema::TOTAL;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterKind {
    Categorical { accepted_values: Vec<Scalar> },
    Range { min: f64, max: f64 },
}

impl FilterKind {
    pub fn rule_kind(&self) -> RuleKind {
        match self {
            FilterKind::Categorical { .. } => RuleKind::Categorical,
            FilterKind::Range { .. } => RuleKind::Range,
        }
    }
}

/// User choice for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub column: String,
    #[serde(flatten)]
    pub kind: FilterKind,
    pub restrict_to_valid: bool,
}

impl FilterSpec {
    pub fn categorical<I, V>(column: &str, accepted_values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Scalar>,
    {
        Self {
            column: column.to_string(),
            kind: FilterKind::Categorical {
                accepted_values: accepted_values.into_iter().map(Into::into).collect(),
            },
            restrict_to_valid: true,
        }
    }

    pub fn range(column: &str, min: f64, max: f64) -> Self {
        Self {
            column: column.to_string(),
            kind: FilterKind::Range { min, max },
            restrict_to_valid: true,
        }
    }

    pub fn restrict_to_valid(mut self, restrict: bool) -> Self {
        self.restrict_to_valid = restrict;
        self
    }
}

/// Ordered filters, at most one per column.
///
/// Setting a filter for a column that already has one replaces it in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    specs: Vec<FilterSpec>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, spec: FilterSpec) -> Self {
        self.set(spec);
        self
    }

    pub fn set(&mut self, spec: FilterSpec) {
        match self.specs.iter_mut().find(|s| s.column == spec.column) {
            Some(slot) => *slot = spec,
            None => self.specs.push(spec),
        }
    }

    pub fn remove(&mut self, column: &str) -> Option<FilterSpec> {
        let pos = self.specs.iter().position(|s| s.column == column)?;
        Some(self.specs.remove(pos))
    }

    pub fn get(&self, column: &str) -> Option<&FilterSpec> {
        self.specs.iter().find(|s| s.column == column)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FilterSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl FromIterator<FilterSpec> for FilterSet {
    fn from_iter<T: IntoIterator<Item = FilterSpec>>(iter: T) -> Self {
        let mut set = FilterSet::new();
        for spec in iter {
            set.set(spec);
        }
        set
    }
}

/// Logs under analysis, by legend name. Empty means every log in the legend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSelection {
    names: Vec<String>,
}

impl LogSelection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Legend indexes of the selected logs in first-seen order. A log named
    /// twice is counted once.
    pub fn resolve(&self, legend: &LogLegendIndex) -> Result<Vec<LogIndex>, StatsError> {
        if self.names.is_empty() {
            return Ok(legend.indexes());
        }
        let mut indexes = legend.indexes_for(self.names.as_slice())?;
        let mut seen = HashSet::new();
        indexes.retain(|i| seen.insert(*i));
        Ok(indexes)
    }
}

/// Numeric bounds of a range filter's candidates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    /// Integer slider bounds, truncated toward zero.
    pub fn slider(&self) -> (i64, i64) {
        (self.min.trunc() as i64, self.max.trunc() as i64)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Values a filter widget may offer for one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidates {
    pub column: String,
    pub values: Vec<Scalar>,
    pub bounds: Option<Bounds>,
}

/// Rows of a parameter sheet that survived filtering, projected onto the
/// visible columns.
#[derive(Debug, Clone)]
pub struct FilteredView {
    layout: SheetLayout,
    log_columns: Vec<String>,
    frame: DataFrame,
}

impl FilteredView {
    pub fn new(layout: SheetLayout, log_columns: Vec<String>, frame: DataFrame) -> Self {
        Self {
            layout,
            log_columns,
            frame,
        }
    }

    pub fn layout(&self) -> &SheetLayout {
        &self.layout
    }

    pub fn columns(&self) -> Vec<String> {
        self.frame
            .get_column_names_str()
            .into_iter()
            .map(String::from)
            .collect()
    }

    pub fn log_columns(&self) -> &[String] {
        &self.log_columns
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.get_column_index(name).is_some()
    }

    pub fn column(&self, name: &str) -> Result<Vec<Scalar>, StatsError> {
        column_scalars(&self.frame, name)
    }

    pub fn row(&self, i: usize) -> Result<Vec<Scalar>, StatsError> {
        row_scalars(&self.frame, i)
    }
}

impl PartialEq for FilteredView {
    fn eq(&self, other: &Self) -> bool {
        self.layout == other.layout
            && self.log_columns == other.log_columns
            && self.frame.equals_missing(&other.frame)
    }
}

/// Applies log selection and column filters to one parameter sheet.
pub struct FilterEngine<'a> {
    table: &'a ParameterTable,
    legend: &'a LogLegendIndex,
}

impl<'a> FilterEngine<'a> {
    pub fn new(table: &'a ParameterTable, legend: &'a LogLegendIndex) -> Self {
        Self { table, legend }
    }

    /// Candidate values for a filter on `column`.
    ///
    /// With `restrict_to_valid`, categorical candidates are limited to the
    /// configured allow-list and range candidates drop non-numeric values and
    /// anything outside the configured valid range. Without a configured list
    /// or range, only the non-numeric drop applies. Bounds are computed after
    /// that restriction.
    pub fn candidates(
        &self,
        column: &str,
        kind: RuleKind,
        restrict_to_valid: bool,
    ) -> Result<Candidates, StatsError> {
        let mut values = self.table.distinct_values(column, true, true)?;
        let rule = self.table.rule_for(column);

        let bounds = match kind {
            RuleKind::Categorical => {
                if restrict_to_valid {
                    if let Some(list) = rule.and_then(|r| r.valid_selection_list.as_ref()) {
                        values.retain(|v| list.contains(v));
                    }
                }
                if values.is_empty() {
                    return Err(StatsError::EmptyFilterRange(column.to_string()));
                }
                None
            }
            RuleKind::Range => {
                if restrict_to_valid {
                    let valid = rule.and_then(|r| r.valid_range());
                    values.retain(|v| match (v.as_number(), valid) {
                        (Some(n), Some((lo, hi))) => n >= lo && n <= hi,
                        (Some(_), None) => true,
                        (None, _) => false,
                    });
                } else if values.iter().any(|v| !v.is_number()) {
                    return Err(StatsError::NonNumericRangeColumn(column.to_string()));
                }
                let bounds = numeric_bounds(&values)
                    .ok_or_else(|| StatsError::EmptyFilterRange(column.to_string()))?;
                Some(bounds)
            }
        };

        Ok(Candidates {
            column: column.to_string(),
            values,
            bounds,
        })
    }

    /// Values a filter lets through. Empty selections are rejected.
    fn selection(&self, spec: &FilterSpec) -> Result<Vec<Scalar>, StatsError> {
        let candidates = self.candidates(&spec.column, spec.kind.rule_kind(), spec.restrict_to_valid)?;
        let selected: Vec<Scalar> = match &spec.kind {
            FilterKind::Categorical { accepted_values } => candidates
                .values
                .into_iter()
                .filter(|v| accepted_values.contains(v))
                .collect(),
            FilterKind::Range { min, max } => {
                let requested = Bounds { min: *min, max: *max };
                candidates
                    .values
                    .into_iter()
                    .filter(|v| v.as_number().is_some_and(|n| requested.contains(n)))
                    .collect()
            }
        };
        if selected.is_empty() {
            return Err(StatsError::EmptyFilterRange(spec.column.clone()));
        }
        Ok(selected)
    }

    /// Filter the sheet.
    ///
    /// Filters are evaluated in order against the full row, so they may target
    /// columns that are not visible. A row passes a filter when its value is
    /// selected or is the `TOTAL` marker. Selected logs the sheet has no column
    /// for show up as missing cells.
    pub fn apply(&self, logs: &LogSelection, filters: &FilterSet) -> Result<FilteredView, StatsError> {
        let log_columns: Vec<String> = logs
            .resolve(self.legend)?
            .into_iter()
            .map(LogLegendIndex::column_for)
            .collect();
        let columns = self.table.all_columns(&log_columns);

        let mut lf = self.table.frame().clone().lazy();
        for spec in filters.iter() {
            if !self.table.has_column(&spec.column) {
                return Err(StatsError::ColumnNotFound(spec.column.clone()));
            }
            let selected = self.selection(spec)?;
            tracing::debug!(
                sheet = %self.table.sheet_name(),
                column = %spec.column,
                selected = selected.len(),
                "Filter added"
            );
            lf = lf.filter(selection_predicate(&spec.column, &selected));
        }

        let projection: Vec<Expr> = columns
            .iter()
            .map(|c| {
                if self.table.has_column(c) {
                    col(c.as_str())
                } else {
                    lit(NULL).cast(DataType::String).alias(c.as_str())
                }
            })
            .collect();
        let frame = lf.select(projection).collect()?;

        tracing::debug!(
            sheet = %self.table.sheet_name(),
            filters = filters.len(),
            rows = frame.height(),
            "Filters applied"
        );
        Ok(FilteredView::new(self.table.layout(), log_columns, frame))
    }

    /// One filter per configured rule, selecting every candidate, the way the
    /// widgets start out. Rules for columns the sheet lacks are skipped.
    pub fn default_filters(&self) -> Result<FilterSet, StatsError> {
        let mut filters = FilterSet::new();
        for rule in &self.table.config().rules {
            if !self.table.has_column(&rule.column) {
                tracing::warn!(
                    sheet = %self.table.sheet_name(),
                    column = %rule.column,
                    "Configured filter column not in sheet, skipping"
                );
                continue;
            }
            let candidates = self.candidates(&rule.column, rule.kind, rule.restrict_to_valid)?;
            let spec = match candidates.bounds {
                Some(bounds) => FilterSpec::range(&rule.column, bounds.min, bounds.max),
                None => FilterSpec::categorical(&rule.column, candidates.values),
            };
            filters.set(spec.restrict_to_valid(rule.restrict_to_valid));
        }
        Ok(filters)
    }
}

/// Rows whose cell is one of `selected` or the `TOTAL` marker.
///
/// Numbers match by value, so `"100"` and `"100.0"` are the same setting.
/// Text matches only cells that do not read as a number.
fn selection_predicate(column: &str, selected: &[Scalar]) -> Expr {
    let numbers: Vec<f64> = selected.iter().filter_map(Scalar::as_number).collect();
    let texts: Vec<String> = selected
        .iter()
        .filter_map(|v| match v {
            Scalar::Text(s) => Some(s.clone()),
            _ => None,
        })
        .collect();

    let mut predicate = text_expr(column).eq(lit(TOTAL));
    if !numbers.is_empty() {
        let numbers = Series::new("numbers".into(), numbers);
        predicate = predicate.or(numeric_expr(column).is_in(lit(numbers), false));
    }
    if !texts.is_empty() {
        let texts = Series::new("texts".into(), texts);
        predicate = predicate.or(numeric_expr(column)
            .is_null()
            .and(text_expr(column).is_in(lit(texts), false)));
    }
    predicate
}

fn numeric_bounds(values: &[Scalar]) -> Option<Bounds> {
    values.iter().filter_map(Scalar::as_number).fold(None, |acc, n| match acc {
        None => Some(Bounds { min: n, max: n }),
        Some(b) => Some(Bounds {
            min: b.min.min(n),
            max: b.max.max(n),
        }),
    })
}
