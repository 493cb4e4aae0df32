use std::collections::HashSet;

use polars::prelude::*;

use crate::config::{ColumnRule, SheetConfig};
use crate::error::StatsError;
use crate::scalar::{sort_if_comparable, text_expr, Scalar};
use crate::schema::TOTAL;

/// Key and grouping columns of a sheet, carried along by every derived table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLayout {
    pub sheet_name: String,
    pub key_column: String,
    pub sub_key_columns: Vec<String>,
}

impl SheetLayout {
    /// Key column followed by the sub-key columns.
    pub fn grouping_columns(&self) -> Vec<String> {
        let mut columns = vec![self.key_column.clone()];
        columns.extend(self.sub_key_columns.iter().cloned());
        columns
    }
}

/// One parameter sheet: per-key event counts with one column per log.
///
/// Cells are held as text; numeric readings happen per query.
#[derive(Debug, Clone)]
pub struct ParameterTable {
    config: SheetConfig,
    frame: DataFrame,
}

impl ParameterTable {
    /// Column names are trimmed and every column is cast to `String`.
    pub fn from_frame(config: SheetConfig, df: &DataFrame) -> Result<Self, StatsError> {
        let columns: Vec<Expr> = df
            .get_column_names_str()
            .iter()
            .map(|c| text_expr(c).alias(c.trim()))
            .collect();
        let frame = df.clone().lazy().select(columns).collect()?;

        let required = std::iter::once(&config.key_column).chain(config.sub_key_columns.iter());
        for column in required {
            if frame.get_column_index(column).is_none() {
                return Err(StatsError::MissingColumn {
                    sheet: config.name.clone(),
                    column: column.clone(),
                });
            }
        }
        Ok(Self { config, frame })
    }

    pub fn sheet_name(&self) -> &str {
        &self.config.name
    }

    pub fn key_column(&self) -> &str {
        &self.config.key_column
    }

    pub fn sub_key_columns(&self) -> &[String] {
        &self.config.sub_key_columns
    }

    pub fn total_column_name(&self) -> &'static str {
        TOTAL
    }

    pub fn config(&self) -> &SheetConfig {
        &self.config
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.frame.get_column_index(column).is_some()
    }

    pub fn rule_for(&self, column: &str) -> Option<&ColumnRule> {
        self.config.rule_for(column)
    }

    pub fn layout(&self) -> SheetLayout {
        SheetLayout {
            sheet_name: self.config.name.clone(),
            key_column: self.config.key_column.clone(),
            sub_key_columns: self.config.sub_key_columns.clone(),
        }
    }

    fn is_fixed_column(&self, column: &str) -> bool {
        column == self.config.key_column
            || column == TOTAL
            || self.config.sub_key_columns.iter().any(|c| c == column)
            || self.config.metadata_columns.iter().any(|c| c == column)
    }

    /// Every column that is not a key, sub-key, metadata or total column.
    pub fn log_columns(&self) -> Vec<String> {
        self.frame
            .get_column_names_str()
            .into_iter()
            .filter(|c| !self.is_fixed_column(c))
            .map(String::from)
            .collect()
    }

    /// Key column, sub-key columns, the selected log columns and the total
    /// column, in that order.
    pub fn all_columns(&self, selected_log_columns: &[String]) -> Vec<String> {
        let mut columns = self.layout().grouping_columns();
        columns.extend(selected_log_columns.iter().cloned());
        columns.push(TOTAL.to_string());
        columns
    }

    /// Distinct values of a column, sorted when all of them are numbers or
    /// all of them are text, otherwise in first-seen order.
    ///
    /// `exclude_sentinel` drops `TOTAL` as well as empty and whitespace-only text.
    pub fn distinct_values(
        &self,
        column: &str,
        exclude_missing: bool,
        exclude_sentinel: bool,
    ) -> Result<Vec<Scalar>, StatsError> {
        let cells = self
            .frame
            .column(column)
            .map_err(|_| StatsError::ColumnNotFound(column.to_string()))?
            .unique_stable()?;

        // "80" and "80.0" are distinct strings but one value.
        let mut seen = HashSet::new();
        let mut values: Vec<Scalar> = Vec::with_capacity(cells.len());
        for cell in cells.str()?.into_iter() {
            let value = cell.map(Scalar::parse).unwrap_or(Scalar::Missing);
            if exclude_missing && value.is_missing() {
                continue;
            }
            if exclude_sentinel && (value.is_sentinel() || value.is_blank()) {
                continue;
            }
            if seen.insert(value.clone()) {
                values.push(value);
            }
        }

        if !sort_if_comparable(&mut values) {
            tracing::debug!(
                sheet = %self.config.name,
                column,
                "Mixed value kinds, keeping first-seen order"
            );
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::exposure;

    fn exposure_table() -> ParameterTable {
        let mut config = SheetConfig::new("Exposição", "Exposição");
        config.sub_key_columns = vec!["mA".into(), "kV".into(), "ms".into()];
        config.metadata_columns = vec![exposure::CHARGE.into()];
        let df = df!(
            "Exposição" => ["1", "TOTAL"],
            "mA" => [Some("100"), None],
            "kV" => [Some("80"), None],
            "ms" => [Some("10"), None],
            "mAs" => [Some("1"), None],
            " 0 " => ["2", "2"],
            "1" => ["0", "0"],
            "TOTAL" => ["2", "2"]
        )
        .unwrap();
        ParameterTable::from_frame(config, &df).unwrap()
    }

    fn current_table() -> ParameterTable {
        let df = df!(
            "mA" => [Some("100"), Some("50"), Some("100.0"), Some(" "), Some("TOTAL")],
            "0" => [Some(3.0), None, Some(1.0), Some(1.0), Some(4.0)]
        )
        .unwrap();
        ParameterTable::from_frame(SheetConfig::new("mA", "mA"), &df).unwrap()
    }

    #[test]
    fn test_column_partition() {
        let table = exposure_table();
        assert_eq!(table.key_column(), "Exposição");
        assert_eq!(table.total_column_name(), "TOTAL");
        assert_eq!(table.log_columns(), vec!["0", "1"]);
        assert_eq!(
            table.all_columns(&["1".to_string()]),
            vec!["Exposição", "mA", "kV", "ms", "1", "TOTAL"]
        );
    }

    #[test]
    fn test_cells_are_held_as_text() {
        let table = current_table();
        assert_eq!(table.height(), 5);
        assert_eq!(table.frame().column("0").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_missing_key_column() {
        let df = df!("0" => ["1"]).unwrap();
        let err = ParameterTable::from_frame(SheetConfig::new("kV", "kV"), &df).unwrap_err();
        assert!(matches!(err, StatsError::MissingColumn { column, .. } if column == "kV"));
    }

    #[test]
    fn test_distinct_values_excludes_sentinel_and_blank() {
        let values = current_table().distinct_values("mA", true, true).unwrap();
        assert_eq!(values, vec![Scalar::from(50i64), Scalar::from(100i64)]);
    }

    #[test]
    fn test_distinct_values_mixed_kinds_keep_first_seen_order() {
        let values = current_table().distinct_values("mA", true, false).unwrap();
        assert_eq!(
            values,
            vec![Scalar::from(100i64), Scalar::from(50i64), Scalar::from(" "), Scalar::total()]
        );
    }

    #[test]
    fn test_distinct_values_missing_handling() {
        let table = current_table();
        assert_eq!(table.distinct_values("0", true, true).unwrap().len(), 3);
        let with_missing = table.distinct_values("0", false, true).unwrap();
        assert!(with_missing.contains(&Scalar::Missing));
    }

    #[test]
    fn test_distinct_values_unknown_column() {
        let err = current_table().distinct_values("kV", true, true).unwrap_err();
        assert!(matches!(err, StatsError::ColumnNotFound(c) if c == "kV"));
    }
}
