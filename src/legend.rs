use std::collections::HashSet;

use polars::prelude::*;
use serde::Serialize;

use crate::error::StatsError;
use crate::scalar::Scalar;
use crate::schema::{legend, sheet};

/// Integer identifier of one exported log.
pub type LogIndex = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogLegendEntry {
    pub index: LogIndex,
    pub name: String,
}

/// Two-way mapping between log indexes and log names, in legend order.
///
/// Built once per loaded file and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct LogLegendIndex {
    entries: Vec<LogLegendEntry>,
}

impl LogLegendIndex {
    pub fn new(entries: Vec<LogLegendEntry>) -> Result<Self, StatsError> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.index) {
                return Err(StatsError::InvalidData(format!(
                    "Duplicate log index {} in legend",
                    entry.index
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Build from the legend sheet.
    ///
    /// Names are the raw text of the `Arquivo` column (or the last column when
    /// it is absent). Indexes come from the first other column when all of its
    /// cells are integers, otherwise from the row position. Rows without a
    /// name are skipped but still consume their position.
    pub fn from_frame(df: &DataFrame) -> Result<Self, StatsError> {
        let columns = df.get_column_names_str();
        let name_col = match columns.iter().position(|c| c.trim() == legend::NAME) {
            Some(j) => j,
            None if !columns.is_empty() => columns.len() - 1,
            None => {
                return Err(StatsError::MissingColumn {
                    sheet: sheet::LEGEND.to_string(),
                    column: legend::NAME.to_string(),
                })
            }
        };

        let names = df.get_columns()[name_col].cast(&DataType::String)?;
        let mut index_cells: Option<Vec<Scalar>> = None;
        for (j, column) in df.get_columns().iter().enumerate() {
            if j == name_col {
                continue;
            }
            let cells = (0..column.len())
                .map(|i| Ok(Scalar::from_any_value(&column.get(i)?)))
                .collect::<Result<Vec<_>, StatsError>>()?;
            if cells.iter().all(is_integral) {
                index_cells = Some(cells);
                break;
            }
        }

        let mut entries = Vec::with_capacity(df.height());
        for (pos, name) in names.str()?.into_iter().enumerate() {
            let Some(name) = name else {
                continue;
            };
            let index = match &index_cells {
                Some(cells) => cells[pos].as_number().map(|n| n as LogIndex).unwrap_or_default(),
                None => pos as LogIndex,
            };
            entries.push(LogLegendEntry {
                index,
                name: name.to_string(),
            });
        }

        tracing::debug!(logs = entries.len(), explicit_index = index_cells.is_some(), "Legend loaded");
        Self::new(entries)
    }

    /// Frame with `index` and `Arquivo` columns, one row per entry.
    pub fn to_frame(entries: &[LogLegendEntry]) -> Result<DataFrame, StatsError> {
        let indexes: Vec<i64> = entries.iter().map(|e| e.index).collect();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        Ok(DataFrame::new(vec![
            Column::new("index".into(), indexes),
            Column::new(legend::NAME.into(), names),
        ])?)
    }

    /// Column name a log occupies in every parameter sheet.
    pub fn column_for(index: LogIndex) -> String {
        index.to_string()
    }

    pub fn entries(&self) -> &[LogLegendEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names_in_order(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn indexes(&self) -> Vec<LogIndex> {
        self.entries.iter().map(|e| e.index).collect()
    }

    /// First entry carrying `name`.
    pub fn index_for(&self, name: &str) -> Result<LogIndex, StatsError> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.index)
            .ok_or_else(|| StatsError::UnknownLogName(name.to_string()))
    }

    pub fn indexes_for<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<LogIndex>, StatsError> {
        names.iter().map(|n| self.index_for(n.as_ref())).collect()
    }

    /// Empty string for an unknown index.
    pub fn name_for(&self, index: LogIndex) -> &str {
        self.entries
            .iter()
            .find(|e| e.index == index)
            .map(|e| e.name.as_str())
            .unwrap_or("")
    }

    pub fn names_for(&self, indexes: &[LogIndex]) -> Vec<String> {
        indexes.iter().map(|&i| self.name_for(i).to_string()).collect()
    }

    /// Legend rows whose index is in `indexes`, in legend order.
    pub fn filter_by_indexes(&self, indexes: &[LogIndex]) -> Vec<LogLegendEntry> {
        self.entries
            .iter()
            .filter(|e| indexes.contains(&e.index))
            .cloned()
            .collect()
    }
}

fn is_integral(value: &Scalar) -> bool {
    matches!(value, Scalar::Number(n) if n.fract() == 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legend() -> LogLegendIndex {
        LogLegendIndex::new(vec![
            LogLegendEntry { index: 0, name: "gen_a.log".into() },
            LogLegendEntry { index: 1, name: "gen_b.log".into() },
            LogLegendEntry { index: 2, name: "gen_c.log".into() },
        ])
        .unwrap()
    }

    #[test]
    fn test_lookups() {
        let legend = legend();
        assert_eq!(legend.names_in_order(), vec!["gen_a.log", "gen_b.log", "gen_c.log"]);
        assert_eq!(legend.index_for("gen_b.log").unwrap(), 1);
        assert_eq!(legend.name_for(2), "gen_c.log");
        assert_eq!(legend.name_for(9), "");
        assert_eq!(legend.names_for(&[2, 9]), vec!["gen_c.log".to_string(), String::new()]);
    }

    #[test]
    fn test_unknown_name_is_an_error() {
        let err = legend().index_for("missing.log").unwrap_err();
        assert!(matches!(err, StatsError::UnknownLogName(n) if n == "missing.log"));
        assert!(legend().indexes_for(&["gen_a.log", "nope"]).is_err());
    }

    #[test]
    fn test_filter_by_indexes_keeps_legend_order() {
        let picked = legend().filter_by_indexes(&[2, 0, 7]);
        let names: Vec<&str> = picked.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["gen_a.log", "gen_c.log"]);
    }

    #[test]
    fn test_duplicate_index_rejected() {
        let err = LogLegendIndex::new(vec![
            LogLegendEntry { index: 3, name: "a".into() },
            LogLegendEntry { index: 3, name: "b".into() },
        ])
        .unwrap_err();
        assert!(matches!(err, StatsError::InvalidData(_)));
    }

    #[test]
    fn test_from_frame_uses_row_position() {
        let df = df!(legend::NAME => [Some("x.log"), None, Some("y.log")]).unwrap();
        let legend = LogLegendIndex::from_frame(&df).unwrap();
        assert_eq!(legend.indexes(), vec![0, 2]);
        assert_eq!(legend.name_for(2), "y.log");
    }

    #[test]
    fn test_from_frame_uses_explicit_index_column() {
        let df = df!(
            "Log" => [4, 7],
            legend::NAME => ["x.log", "y.log"]
        )
        .unwrap();
        let legend = LogLegendIndex::from_frame(&df).unwrap();
        assert_eq!(legend.indexes(), vec![4, 7]);
        assert_eq!(LogLegendIndex::column_for(7), "7");
    }

    #[test]
    fn test_numeric_looking_names_keep_their_text() {
        let df = df!(legend::NAME => ["007", "1.50", " padded "]).unwrap();
        let legend = LogLegendIndex::from_frame(&df).unwrap();
        assert_eq!(legend.names_in_order(), vec!["007", "1.50", " padded "]);
        assert_eq!(legend.index_for("007").unwrap(), 0);
        assert_eq!(legend.index_for("1.50").unwrap(), 1);
        assert!(legend.index_for("7").is_err());
    }

    #[test]
    fn test_empty_legend_frame() {
        let err = LogLegendIndex::from_frame(&DataFrame::empty()).unwrap_err();
        assert!(matches!(err, StatsError::MissingColumn { .. }));
    }
}
