use std::collections::{BTreeSet, HashSet};

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::StatsError;
use crate::legend::LogIndex;
use crate::schema::history;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Failure,
    Warning,
}

impl EventKind {
    /// History column holding this kind of event.
    pub fn column(&self) -> &'static str {
        match self {
            EventKind::Failure => history::FAILURE,
            EventKind::Warning => history::WARNING,
        }
    }

    pub fn from_column(column: &str) -> Option<Self> {
        match column {
            history::FAILURE => Some(EventKind::Failure),
            history::WARNING => Some(EventKind::Warning),
            _ => None,
        }
    }
}

/// Which history rows to show.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventFilter {
    /// The full sheet.
    #[default]
    None,
    /// Rows carrying `label` in the event column, plus preceding context.
    Event { kind: EventKind, label: String },
}

/// Event history sheet of one log.
#[derive(Debug, Clone)]
pub struct LogHistory {
    index: LogIndex,
    frame: DataFrame,
}

impl LogHistory {
    pub fn new(index: LogIndex, frame: DataFrame) -> Self {
        Self { index, frame }
    }

    pub fn index(&self) -> LogIndex {
        self.index
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    /// Event column rendered as text, one entry per row.
    fn event_cells(&self, kind: EventKind) -> Result<Vec<Option<String>>, StatsError> {
        let column = self
            .frame
            .column(kind.column())
            .map_err(|_| StatsError::ColumnNotFound(kind.column().to_string()))?
            .cast(&DataType::String)?;
        let cells = column
            .str()?
            .into_iter()
            .map(|cell| cell.map(str::to_string))
            .collect();
        Ok(cells)
    }

    /// Distinct labels found in the event column, sorted. Nulls and blank
    /// cells are skipped.
    pub fn event_labels(&self, kind: EventKind) -> Result<Vec<String>, StatsError> {
        let mut seen = HashSet::new();
        let mut labels: Vec<String> = self
            .event_cells(kind)?
            .into_iter()
            .flatten()
            .filter(|label| !label.trim().is_empty())
            .filter(|label| seen.insert(label.clone()))
            .collect();
        labels.sort();
        Ok(labels)
    }

    /// Row positions `window` would return.
    pub fn window_indices(&self, filter: &EventFilter, back_lines: usize) -> Result<Vec<usize>, StatsError> {
        match filter {
            EventFilter::None => Ok((0..self.height()).collect()),
            EventFilter::Event { kind, label } => {
                let matches: Vec<usize> = self
                    .event_cells(*kind)?
                    .iter()
                    .enumerate()
                    .filter(|(_, cell)| cell.as_deref() == Some(label.as_str()))
                    .map(|(i, _)| i)
                    .collect();
                Ok(context_window(&matches, back_lines, self.height()))
            }
        }
    }

    /// Matching rows plus the `back_lines` rows before each match, in sheet order.
    pub fn window(&self, filter: &EventFilter, back_lines: usize) -> Result<DataFrame, StatsError> {
        if matches!(filter, EventFilter::None) {
            return Ok(self.frame.clone());
        }
        let positions = self.window_indices(filter, back_lines)?;
        let idx: Vec<IdxSize> = positions.into_iter().map(|i| i as IdxSize).collect();
        let idx = IdxCa::from_vec("idx".into(), idx);
        let window = self.frame.take(&idx)?;

        tracing::debug!(
            log = self.index,
            rows = window.height(),
            back_lines,
            "History window selected"
        );
        Ok(window)
    }
}

/// Each match together with up to `back_lines` preceding rows, deduplicated,
/// in ascending order and clipped to `0..height`.
pub fn context_window(matches: &[usize], back_lines: usize, height: usize) -> Vec<usize> {
    let mut rows = BTreeSet::new();
    for &i in matches.iter().filter(|&&i| i < height) {
        rows.extend(i.saturating_sub(back_lines)..=i);
    }
    rows.into_iter().collect()
}
