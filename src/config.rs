//! Declarative per-sheet configuration.
//!
//! Every parameter sheet is summarized by the same engine; the differences
//! between sheets (key column, grouping columns, valid values) live here.
//! The built-in defaults can be overridden from TOML:
//!
//! ```toml
//! [[sheet]]
//! name = "kV"
//! key_column = "kV"
//!
//! [[sheet.rule]]
//! column = "kV"
//! kind = "range"
//! valid_range_min = 40
//! valid_range_max = 150
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StatsError;
use crate::scalar::Scalar;
use crate::schema::{exposure, sheet, valid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Categorical,
    Range,
}

/// Filter widget and valid values for one column of a sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRule {
    pub column: String,
    pub kind: RuleKind,
    #[serde(default)]
    pub valid_selection_list: Option<Vec<Scalar>>,
    #[serde(default)]
    pub valid_range_min: Option<f64>,
    #[serde(default)]
    pub valid_range_max: Option<f64>,
    /// Initial state of the "valid values only" toggle.
    #[serde(default = "default_true")]
    pub restrict_to_valid: bool,
}

fn default_true() -> bool {
    true
}

impl ColumnRule {
    pub fn categorical(column: &str) -> Self {
        Self {
            column: column.to_string(),
            kind: RuleKind::Categorical,
            valid_selection_list: None,
            valid_range_min: None,
            valid_range_max: None,
            restrict_to_valid: true,
        }
    }

    pub fn range(column: &str) -> Self {
        Self {
            kind: RuleKind::Range,
            ..Self::categorical(column)
        }
    }

    pub fn with_valid_list(mut self, values: &[f64]) -> Self {
        self.valid_selection_list = Some(values.iter().map(|&v| Scalar::from(v)).collect());
        self
    }

    pub fn with_valid_range(mut self, (min, max): (f64, f64)) -> Self {
        self.valid_range_min = Some(min);
        self.valid_range_max = Some(max);
        self
    }

    /// Valid range, only when both bounds are configured.
    pub fn valid_range(&self) -> Option<(f64, f64)> {
        self.valid_range_min.zip(self.valid_range_max)
    }
}

/// Shape of one parameter sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetConfig {
    pub name: String,
    pub key_column: String,
    #[serde(default)]
    pub sub_key_columns: Vec<String>,
    /// Descriptive columns that are neither keys nor logs.
    #[serde(default)]
    pub metadata_columns: Vec<String>,
    #[serde(default, rename = "rule")]
    pub rules: Vec<ColumnRule>,
}

impl SheetConfig {
    pub fn new(name: &str, key_column: &str) -> Self {
        Self {
            name: name.to_string(),
            key_column: key_column.to_string(),
            sub_key_columns: Vec::new(),
            metadata_columns: Vec::new(),
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: ColumnRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rule_for(&self, column: &str) -> Option<&ColumnRule> {
        self.rules.iter().find(|r| r.column == column)
    }

    fn validate(&self) -> Result<(), StatsError> {
        let mut seen = HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.column.as_str()) {
                return Err(StatsError::Config(format!(
                    "Sheet '{}' has two rules for column '{}'",
                    self.name, rule.column
                )));
            }
            if rule.valid_range_min.is_some() != rule.valid_range_max.is_some() {
                tracing::warn!(
                    sheet = %self.name,
                    column = %rule.column,
                    "Valid range needs both bounds, ignoring it"
                );
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsConfig {
    #[serde(default = "default_legend_sheet")]
    pub legend_sheet: String,
    #[serde(rename = "sheet")]
    pub sheets: Vec<SheetConfig>,
}

fn default_legend_sheet() -> String {
    sheet::LEGEND.to_string()
}

impl Default for StatsConfig {
    fn default() -> Self {
        let current = || ColumnRule::categorical(sheet::CURRENT).with_valid_list(&valid::CURRENT_SETTINGS);
        let voltage = || ColumnRule::range(sheet::VOLTAGE).with_valid_range(valid::VOLTAGE_RANGE);
        let time = || ColumnRule::range(sheet::TIME).with_valid_range(valid::TIME_RANGE);

        let mut exposure_sheet = SheetConfig::new(sheet::EXPOSURE, sheet::EXPOSURE)
            .with_rule(current())
            .with_rule(voltage())
            .with_rule(time())
            .with_rule(ColumnRule::range(exposure::CHARGE))
            .with_rule(ColumnRule::range(exposure::POWER))
            .with_rule(ColumnRule::range(exposure::ENERGY))
            .with_rule(ColumnRule::categorical(exposure::CURRENT_GAIN))
            .with_rule(ColumnRule::categorical(exposure::INDUCTOR));
        exposure_sheet.sub_key_columns =
            vec![sheet::CURRENT.into(), sheet::VOLTAGE.into(), sheet::TIME.into()];
        exposure_sheet.metadata_columns = exposure::METADATA.iter().map(|c| c.to_string()).collect();

        Self {
            legend_sheet: default_legend_sheet(),
            sheets: vec![
                SheetConfig::new(sheet::CURRENT, sheet::CURRENT).with_rule(current()),
                SheetConfig::new(sheet::VOLTAGE, sheet::VOLTAGE).with_rule(voltage()),
                SheetConfig::new(sheet::TIME, sheet::TIME).with_rule(time()),
                SheetConfig::new(sheet::FAILURE, sheet::FAILURE)
                    .with_rule(ColumnRule::categorical(sheet::FAILURE)),
                SheetConfig::new(sheet::WARNING, sheet::WARNING)
                    .with_rule(ColumnRule::categorical(sheet::WARNING)),
                exposure_sheet,
            ],
        }
    }
}

impl StatsConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, StatsError> {
        let config: StatsConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, StatsError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn sheet(&self, name: &str) -> Option<&SheetConfig> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn validate(&self) -> Result<(), StatsError> {
        let mut seen = HashSet::new();
        for sheet in &self.sheets {
            if !seen.insert(sheet.name.as_str()) {
                return Err(StatsError::Config(format!("Duplicate sheet '{}'", sheet.name)));
            }
            sheet.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_covers_every_parameter_sheet() {
        let config = StatsConfig::default();
        config.validate().unwrap();
        for name in sheet::PARAMETERS {
            assert!(config.sheet(name).is_some(), "missing {name}");
        }
        let exposure = config.sheet(sheet::EXPOSURE).unwrap();
        assert_eq!(exposure.sub_key_columns, vec!["mA", "kV", "ms"]);
        assert_eq!(exposure.rules.len(), 8);
        assert_eq!(
            config.sheet(sheet::VOLTAGE).unwrap().rules[0].valid_range(),
            Some((40.0, 150.0))
        );
    }

    #[test]
    fn test_parse_sheet_toml() {
        let toml = r#"
[[sheet]]
name = "mA"
key_column = "mA"

[[sheet.rule]]
column = "mA"
kind = "categorical"
valid_selection_list = [10, 50, 100]

[[sheet]]
name = "kV"
key_column = "kV"

[[sheet.rule]]
column = "kV"
kind = "range"
valid_range_min = 40
valid_range_max = 150
restrict_to_valid = false
"#;

        let config = StatsConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.legend_sheet, "Legenda");
        assert_eq!(config.sheets.len(), 2);

        let current = config.sheet("mA").unwrap().rule_for("mA").unwrap();
        assert_eq!(current.kind, RuleKind::Categorical);
        assert!(current.restrict_to_valid);
        assert_eq!(
            current.valid_selection_list,
            Some(vec![Scalar::Number(10.0), Scalar::Number(50.0), Scalar::Number(100.0)])
        );

        let voltage = config.sheet("kV").unwrap().rule_for("kV").unwrap();
        assert_eq!(voltage.valid_range(), Some((40.0, 150.0)));
        assert!(!voltage.restrict_to_valid);
    }

    #[test]
    fn test_half_open_range_is_not_a_valid_range() {
        let mut rule = ColumnRule::range("kJ");
        rule.valid_range_min = Some(1.0);
        assert_eq!(rule.valid_range(), None);
    }

    #[test]
    fn test_duplicate_rule_rejected() {
        let toml = r#"
[[sheet]]
name = "Falha"
key_column = "Falha"

[[sheet.rule]]
column = "Falha"
kind = "categorical"

[[sheet.rule]]
column = "Falha"
kind = "range"
"#;
        let err = StatsConfig::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, StatsError::Config(_)));
    }
}
