use polars::prelude::*;

use crate::error::StatsError;
use crate::filter::FilteredView;
use crate::parameter::SheetLayout;
use crate::scalar::{column_scalars, numeric_expr, row_scalars, text_expr, Scalar};
use crate::schema::TOTAL;

/// Declarative totals: which log columns feed the derived
/// `TOTAL` column and row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregation {
    selected_log_columns: Vec<String>,
}

impl Aggregation {
    pub fn new(selected_log_columns: Vec<String>) -> Self {
        Self {
            selected_log_columns,
        }
    }

    /// Sum over the logs the view was filtered for.
    pub fn for_view(view: &FilteredView) -> Self {
        Self::new(view.log_columns().to_vec())
    }

    pub fn selected_log_columns(&self) -> &[String] {
        &self.selected_log_columns
    }

    /// Derive the summary table.
    ///
    /// Rows keyed `TOTAL` and any `TOTAL` column already in the view are
    /// dropped first, so feeding a summary back in reproduces it. Key and
    /// sub-key columns come out as text and every other column as `Float64`.
    /// Missing and non-numeric cells add nothing to a sum.
    pub fn apply(&self, view: &FilteredView) -> Result<SummaryTable, StatsError> {
        let layout = view.layout().clone();
        let grouping = layout.grouping_columns();
        let kept: Vec<String> = view.columns().into_iter().filter(|c| c != TOTAL).collect();

        let mut summed: Vec<&String> = Vec::new();
        for column in &self.selected_log_columns {
            if kept.contains(column) && !grouping.contains(column) && !summed.contains(&column) {
                summed.push(column);
            }
        }

        let mut lf = view.frame().clone().lazy();
        if view.has_column(&layout.key_column) {
            lf = lf.filter(text_expr(&layout.key_column).eq_missing(lit(TOTAL)).not());
        }

        let cells: Vec<Expr> = kept
            .iter()
            .map(|c| {
                if grouping.contains(c) {
                    text_expr(c).alias(c.as_str())
                } else {
                    numeric_expr(c).alias(c.as_str())
                }
            })
            .collect();
        let row_total = if summed.is_empty() {
            lit(0.0).cast(DataType::Float64)
        } else {
            let summands: Vec<Expr> = summed
                .iter()
                .map(|c| col(c.as_str()).fill_null(lit(0.0)))
                .collect();
            sum_horizontal(summands, true)?
        };
        let body = lf.select(cells).with_column(row_total.alias(TOTAL));

        let mut totals: Vec<Expr> = kept
            .iter()
            .map(|c| {
                if *c == layout.key_column {
                    lit(TOTAL).cast(DataType::String).alias(c.as_str())
                } else if grouping.contains(c) {
                    lit(NULL).cast(DataType::String).alias(c.as_str())
                } else if summed.contains(&c) {
                    col(c.as_str()).sum().alias(c.as_str())
                } else {
                    lit(NULL).cast(DataType::Float64).alias(c.as_str())
                }
            })
            .collect();
        totals.push(col(TOTAL).sum().alias(TOTAL));
        let total_row = body.clone().select(totals);

        let frame = concat(&[body, total_row], UnionArgs::default())?.collect()?;

        tracing::debug!(
            sheet = %layout.sheet_name,
            rows = frame.height().saturating_sub(1),
            logs = summed.len(),
            "Summary derived"
        );

        Ok(SummaryTable {
            layout,
            log_columns: self.selected_log_columns.clone(),
            frame,
        })
    }
}

/// Filtered rows plus a derived `TOTAL` column and a trailing `TOTAL` row.
///
/// A fresh value is produced for every request; nothing here is updated in place.
#[derive(Debug, Clone)]
pub struct SummaryTable {
    layout: SheetLayout,
    log_columns: Vec<String>,
    frame: DataFrame,
}

impl SummaryTable {
    pub fn layout(&self) -> &SheetLayout {
        &self.layout
    }

    pub fn sheet_name(&self) -> &str {
        &self.layout.sheet_name
    }

    pub fn key_column(&self) -> &str {
        &self.layout.key_column
    }

    pub fn columns(&self) -> Vec<String> {
        self.frame
            .get_column_names_str()
            .into_iter()
            .map(String::from)
            .collect()
    }

    /// Log columns that were summed, in selection order.
    pub fn log_columns(&self) -> &[String] {
        &self.log_columns
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Number of rows without the derived `TOTAL` row.
    pub fn body_height(&self) -> usize {
        self.frame.height().saturating_sub(1)
    }

    /// Cells of one column across the body rows.
    pub fn body_column(&self, name: &str) -> Result<Vec<Scalar>, StatsError> {
        let mut cells = column_scalars(&self.frame, name)?;
        cells.truncate(self.body_height());
        Ok(cells)
    }

    pub fn total_row(&self) -> Result<Vec<Scalar>, StatsError> {
        row_scalars(&self.frame, self.body_height())
    }

    /// Derived `TOTAL` column over the body rows.
    pub fn total_column(&self) -> Result<Vec<f64>, StatsError> {
        Ok(self.body_column(TOTAL)?.iter().map(Scalar::summand).collect())
    }

    /// Same rows as a filtered view, to aggregate again.
    pub fn as_view(&self) -> FilteredView {
        FilteredView::new(self.layout.clone(), self.log_columns.clone(), self.frame.clone())
    }

    /// Grid for display: key and sub-key columns as text, everything else
    /// as `Float64`.
    pub fn to_frame(&self) -> DataFrame {
        self.frame.clone()
    }
}

impl PartialEq for SummaryTable {
    fn eq(&self, other: &Self) -> bool {
        self.layout == other.layout
            && self.log_columns == other.log_columns
            && self.frame.equals_missing(&other.frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SheetConfig;
    use crate::filter::{FilterEngine, FilterSet, FilterSpec, LogSelection};
    use crate::legend::{LogLegendEntry, LogLegendIndex};
    use crate::parameter::ParameterTable;

    fn legend() -> LogLegendIndex {
        LogLegendIndex::new(vec![
            LogLegendEntry { index: 1, name: "log1".into() },
            LogLegendEntry { index: 2, name: "log2".into() },
        ])
        .unwrap()
    }

    /// mA sheet with a stale literal total row and total column.
    fn current_table() -> ParameterTable {
        let df = df!(
            "mA" => ["100", "100", "50", "TOTAL"],
            "1" => [3, 1, 5, 99],
            "2" => [0, 2, 0, 99],
            "TOTAL" => [99, 99, 99, 99]
        )
        .unwrap();
        ParameterTable::from_frame(SheetConfig::new("mA", "mA"), &df).unwrap()
    }

    fn summarize(filters: &FilterSet, logs: &LogSelection) -> SummaryTable {
        let table = current_table();
        let legend = legend();
        let view = FilterEngine::new(&table, &legend).apply(logs, filters).unwrap();
        Aggregation::for_view(&view).apply(&view).unwrap()
    }

    fn numbers(cells: &[Scalar]) -> Vec<f64> {
        cells.iter().map(Scalar::summand).collect()
    }

    fn layout(key: &str, sub_keys: &[&str]) -> SheetLayout {
        SheetLayout {
            sheet_name: key.into(),
            key_column: key.into(),
            sub_key_columns: sub_keys.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_totals_without_filters() {
        let summary = summarize(&FilterSet::new(), &LogSelection::all());
        assert_eq!(summary.columns(), vec!["mA", "1", "2", "TOTAL"]);
        assert_eq!(summary.total_column().unwrap(), vec![3.0, 3.0, 5.0]);
        let total_row = summary.total_row().unwrap();
        assert_eq!(total_row[0], Scalar::total());
        assert_eq!(numbers(&total_row[1..]), vec![9.0, 2.0, 11.0]);
    }

    #[test]
    fn test_totals_follow_categorical_filter() {
        let filters = FilterSet::new().with(FilterSpec::categorical("mA", [100i64]));
        let summary = summarize(&filters, &LogSelection::all());
        assert_eq!(summary.body_height(), 2);
        assert_eq!(numbers(&summary.total_row().unwrap()[1..]), vec![4.0, 2.0, 6.0]);
    }

    #[test]
    fn test_total_column_sums_only_selected_logs() {
        let summary = summarize(&FilterSet::new(), &LogSelection::names(["log2"]));
        assert_eq!(summary.columns(), vec!["mA", "2", "TOTAL"]);
        assert_eq!(summary.total_column().unwrap(), vec![0.0, 2.0, 0.0]);
        assert_eq!(numbers(&summary.total_row().unwrap()[1..]), vec![2.0, 2.0]);
    }

    #[test]
    fn test_log_named_twice_counts_once() {
        let df = df!("mA" => ["100"], "1" => ["3"], "2" => ["1"]).unwrap();
        let table = ParameterTable::from_frame(SheetConfig::new("mA", "mA"), &df).unwrap();
        let legend = legend();
        let view = FilterEngine::new(&table, &legend)
            .apply(&LogSelection::names(["log1", "log1"]), &FilterSet::new())
            .unwrap();
        let summary = Aggregation::for_view(&view).apply(&view).unwrap();
        assert_eq!(summary.total_column().unwrap(), vec![3.0]);

        let repeated = Aggregation::new(vec!["1".into(), "1".into()]).apply(&view).unwrap();
        assert_eq!(repeated.total_column().unwrap(), vec![3.0]);
    }

    #[test]
    fn test_grand_total_consistency() {
        let summary = summarize(&FilterSet::new(), &LogSelection::all());
        let column_sum: f64 = summary.total_column().unwrap().iter().sum();
        let columns = summary.columns();
        let total_row = summary.total_row().unwrap();
        let row_sum: f64 = summary
            .log_columns()
            .iter()
            .map(|c| total_row[columns.iter().position(|o| o == c).unwrap()].summand())
            .sum();
        assert_eq!(column_sum, row_sum);
        assert_eq!(total_row.last().unwrap().summand(), column_sum);
    }

    #[test]
    fn test_aggregating_a_summary_is_idempotent() {
        let summary = summarize(&FilterSet::new(), &LogSelection::all());
        let view = summary.as_view();
        let again = Aggregation::for_view(&view).apply(&view).unwrap();
        assert_eq!(again, summary);
    }

    #[test]
    fn test_missing_and_text_cells_count_as_zero() {
        let df = df!(
            "Falha" => ["E01", "E02"],
            "1" => [None, Some("-")],
            "2" => [Some("2"), None]
        )
        .unwrap();
        let view = FilteredView::new(layout("Falha", &[]), vec!["1".into(), "2".into()], df);
        let summary = Aggregation::for_view(&view).apply(&view).unwrap();
        assert_eq!(summary.total_column().unwrap(), vec![2.0, 0.0]);
        assert_eq!(numbers(&summary.total_row().unwrap()[1..]), vec![0.0, 2.0, 2.0]);
    }

    #[test]
    fn test_empty_selection_gives_zero_totals() {
        let df = df!("mA" => ["100"], "TOTAL" => ["7"]).unwrap();
        let view = FilteredView::new(layout("mA", &[]), vec![], df);
        let summary = Aggregation::new(vec![]).apply(&view).unwrap();
        assert_eq!(summary.columns(), vec!["mA", "TOTAL"]);
        assert_eq!(summary.total_column().unwrap(), vec![0.0]);
        assert_eq!(summary.total_row().unwrap(), vec![Scalar::total(), Scalar::Number(0.0)]);
    }

    #[test]
    fn test_sub_keys_blank_on_total_row() {
        let df = df!(
            "Exposição" => ["1", "2"],
            "mA" => ["100", "50"],
            "kV" => ["80", "60"],
            "1" => ["4", "1"],
            "TOTAL" => ["4", "1"]
        )
        .unwrap();
        let view = FilteredView::new(layout("Exposição", &["mA", "kV"]), vec!["1".into()], df);
        let summary = Aggregation::for_view(&view).apply(&view).unwrap();
        let total_row = summary.total_row().unwrap();
        assert_eq!(total_row[0], Scalar::total());
        assert!(total_row[1].is_missing() && total_row[2].is_missing());
        assert_eq!(numbers(&total_row[3..]), vec![5.0, 5.0]);

        let frame = summary.to_frame();
        assert_eq!(frame.height(), 3);
        assert_eq!(frame.column("mA").unwrap().dtype(), &DataType::String);
        assert_eq!(frame.column("1").unwrap().dtype(), &DataType::Float64);
        assert_eq!(frame.column("TOTAL").unwrap().dtype(), &DataType::Float64);
    }
}
