//! Chart feeds derived from a summary table.
//!
//! The shell renders these. This module extracts the numbers, labels them
//! with legend names and serializes them to JSON.

use serde::{Deserialize, Serialize};

use crate::aggregation::SummaryTable;
use crate::error::StatsError;
use crate::legend::{LogIndex, LogLegendIndex};
use crate::scalar::Scalar;
use crate::schema::TOTAL;

// ── Bar chart ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSeries {
    pub log_index: Option<LogIndex>,
    pub name: String,
    pub values: Vec<f64>,
}

/// One bar group per key value, one bar per selected log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarChart {
    pub categories: Vec<String>,
    pub series: Vec<BarSeries>,
}

impl BarChart {
    pub fn to_json(&self) -> Result<String, StatsError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Build the bar chart. The `TOTAL` row, the `TOTAL` column and sub-key
/// columns are left out; missing cells plot as zero.
pub fn bar_chart(summary: &SummaryTable, legend: &LogLegendIndex) -> Result<BarChart, StatsError> {
    let categories = key_labels(summary)?;

    let mut series = Vec::with_capacity(summary.log_columns().len());
    for column in summary.log_columns() {
        let log_index = column.parse::<LogIndex>().ok();
        let name = match log_index {
            Some(i) if !legend.name_for(i).is_empty() => legend.name_for(i).to_string(),
            _ => column.clone(),
        };
        let values = summary.body_column(column)?.iter().map(Scalar::summand).collect();
        series.push(BarSeries {
            log_index,
            name,
            values,
        });
    }

    Ok(BarChart { categories, series })
}

// ── Pie chart ───────────────────────────────────────────────────────────────

/// Data source of the pie chart: one selected log or the derived total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PieSource {
    Log(String),
    Total,
}

impl PieSource {
    /// `TOTAL` selects the derived total, anything else is a log name.
    pub fn parse(selection: &str) -> Self {
        if selection == TOTAL {
            PieSource::Total
        } else {
            PieSource::Log(selection.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PieSlice {
    pub label: String,
    pub value: f64,
}

/// Options the pie source selector offers: the selected logs, then `TOTAL`.
pub fn pie_sources(summary: &SummaryTable, legend: &LogLegendIndex) -> Vec<String> {
    let mut sources: Vec<String> = summary
        .log_columns()
        .iter()
        .map(|c| match c.parse::<LogIndex>() {
            Ok(i) => legend.name_for(i).to_string(),
            Err(_) => c.clone(),
        })
        .collect();
    sources.push(TOTAL.to_string());
    sources
}

/// One slice per non-`TOTAL` row.
///
/// Fails with `UnknownLogName` for a log outside the legend and with
/// `ColumnNotFound` for a log that is not part of the summary.
pub fn pie_chart(
    summary: &SummaryTable,
    legend: &LogLegendIndex,
    source: &PieSource,
) -> Result<Vec<PieSlice>, StatsError> {
    let labels = key_labels(summary)?;
    let values: Vec<f64> = match source {
        PieSource::Total => summary.total_column()?,
        PieSource::Log(name) => {
            let column = LogLegendIndex::column_for(legend.index_for(name)?);
            summary.body_column(&column)?.iter().map(Scalar::summand).collect()
        }
    };

    Ok(labels
        .into_iter()
        .zip(values)
        .map(|(label, value)| PieSlice { label, value })
        .collect())
}

pub fn pie_chart_json(slices: &[PieSlice]) -> Result<String, StatsError> {
    Ok(serde_json::to_string(slices)?)
}

fn key_labels(summary: &SummaryTable) -> Result<Vec<String>, StatsError> {
    Ok(summary
        .body_column(summary.key_column())?
        .iter()
        .map(Scalar::to_string)
        .collect())
}
