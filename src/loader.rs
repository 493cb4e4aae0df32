use std::collections::HashMap;
use std::path::{Path, PathBuf};

use polars::prelude::*;

use crate::error::StatsError;

/// Where named sheets come from.
///
/// `Ok(None)` means the sheet does not exist; the caller decides whether that
/// is fatal.
pub trait SheetSource {
    fn read_sheet(&self, name: &str) -> Result<Option<DataFrame>, StatsError>;
}

/// Sheets already in memory, e.g. handed over from Python.
impl SheetSource for HashMap<String, DataFrame> {
    fn read_sheet(&self, name: &str) -> Result<Option<DataFrame>, StatsError> {
        Ok(self.get(name).cloned())
    }
}

/// A directory with one `<sheet name>.csv` file per sheet.
#[derive(Debug, Clone)]
pub struct CsvDirectory {
    base_path: PathBuf,
}

impl CsvDirectory {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn sheet_path(&self, name: &str) -> PathBuf {
        self.base_path.join(format!("{name}.csv"))
    }
}

impl SheetSource for CsvDirectory {
    fn read_sheet(&self, name: &str) -> Result<Option<DataFrame>, StatsError> {
        let path = self.sheet_path(name);
        if !path.is_file() {
            return Ok(None);
        }
        read_csv_as_strings(&path).map(Some)
    }
}

/// Read a CSV file with all columns as String dtype and trimmed column names.
pub fn read_csv_as_strings(path: &Path) -> Result<DataFrame, StatsError> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;

    tracing::debug!(path = %path.display(), rows = df.height(), "CSV sheet read");
    Ok(df)
}
