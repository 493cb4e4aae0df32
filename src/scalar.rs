use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use polars::prelude::{col, lit, AnyValue, DataFrame, DataType, Expr};
use serde::{Deserialize, Serialize};

use crate::error::StatsError;
use crate::schema::TOTAL;

const WHITESPACE: &str = " \t\r\n";

/// A single spreadsheet cell.
///
/// Numbers are always finite: NaN and infinities coming from a frame are read
/// as `Missing`, and text that only parses to a non-finite value stays text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
    Missing,
}

impl Scalar {
    /// Classify a raw text cell.
    pub fn parse(text: &str) -> Self {
        match text.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Scalar::Number(n),
            _ => Scalar::Text(text.to_string()),
        }
    }

    /// Read one polars cell.
    pub fn from_any_value(value: &AnyValue<'_>) -> Self {
        match value {
            AnyValue::Null => Scalar::Missing,
            AnyValue::String(s) => Scalar::parse(s),
            AnyValue::StringOwned(s) => Scalar::parse(s.as_str()),
            AnyValue::Boolean(b) => Scalar::Text(b.to_string()),
            other => match other.try_extract::<f64>() {
                Ok(n) if n.is_finite() => Scalar::Number(n),
                Ok(_) => Scalar::Missing,
                Err(_) => Scalar::Text(other.to_string()),
            },
        }
    }

    pub fn total() -> Self {
        Scalar::Text(TOTAL.to_string())
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Scalar::Number(_))
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Scalar::Missing)
    }

    /// True for the literal `TOTAL` marker.
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Scalar::Text(s) if s == TOTAL)
    }

    /// Empty or whitespace-only text.
    pub fn is_blank(&self) -> bool {
        matches!(self, Scalar::Text(s) if s.trim().is_empty())
    }

    /// Contribution of this cell to a numeric sum.
    pub fn summand(&self) -> f64 {
        self.as_number().unwrap_or(0.0)
    }

    /// Ordering between two cells of the same kind; `None` across kinds.
    pub fn cmp_same_kind(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Number(a), Scalar::Number(b)) => a.partial_cmp(b),
            (Scalar::Text(a), Scalar::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    fn normalized_bits(n: f64) -> u64 {
        if n == 0.0 {
            0.0f64.to_bits()
        } else {
            n.to_bits()
        }
    }
}

/// Sort in place when every value is a number or every value is text.
///
/// Returns `false` and leaves the order untouched for mixed kinds.
pub fn sort_if_comparable(values: &mut [Scalar]) -> bool {
    let all_numbers = values.iter().all(Scalar::is_number);
    let all_text = values.iter().all(|v| matches!(v, Scalar::Text(_)));
    if !all_numbers && !all_text {
        return false;
    }
    values.sort_by(|a, b| a.cmp_same_kind(b).unwrap_or(Ordering::Equal));
    true
}

/// Cells of `column` as text.
pub fn text_expr(column: &str) -> Expr {
    col(column).cast(DataType::String)
}

/// Cells of `column` as numbers. Text that does not parse becomes null.
pub fn numeric_expr(column: &str) -> Expr {
    text_expr(column)
        .str()
        .strip_chars(lit(WHITESPACE))
        .cast(DataType::Float64)
}

/// Every cell of one frame column, top to bottom.
pub fn column_scalars(df: &DataFrame, name: &str) -> Result<Vec<Scalar>, StatsError> {
    let column = df
        .column(name)
        .map_err(|_| StatsError::ColumnNotFound(name.to_string()))?;
    (0..column.len())
        .map(|i| Ok(Scalar::from_any_value(&column.get(i)?)))
        .collect()
}

/// Cells of row `i`, in column order.
pub fn row_scalars(df: &DataFrame, i: usize) -> Result<Vec<Scalar>, StatsError> {
    df.get_columns()
        .iter()
        .map(|column| Ok(Scalar::from_any_value(&column.get(i)?)))
        .collect()
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Scalar::Number(a), Scalar::Number(b)) => a == b,
            (Scalar::Text(a), Scalar::Text(b)) => a == b,
            (Scalar::Missing, Scalar::Missing) => true,
            _ => false,
        }
    }
}

// Numbers are finite, so equality is reflexive.
impl Eq for Scalar {}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Scalar::Number(n) => {
                0u8.hash(state);
                Self::normalized_bits(*n).hash(state);
            }
            Scalar::Text(s) => {
                1u8.hash(state);
                s.hash(state);
            }
            Scalar::Missing => 2u8.hash(state),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Text(s) => f.write_str(s),
            Scalar::Missing => Ok(()),
        }
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        if n.is_finite() {
            Scalar::Number(n)
        } else {
            Scalar::Missing
        }
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Number(n as f64)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_classifies_cells() {
        assert_eq!(Scalar::parse("100"), Scalar::Number(100.0));
        assert_eq!(Scalar::parse(" 12.5 "), Scalar::Number(12.5));
        assert_eq!(Scalar::parse("TOTAL"), Scalar::total());
        assert_eq!(Scalar::parse(" "), Scalar::Text(" ".into()));
        assert_eq!(Scalar::parse("NaN"), Scalar::Text("NaN".into()));
    }

    #[test]
    fn test_from_any_value() {
        assert_eq!(Scalar::from_any_value(&AnyValue::Null), Scalar::Missing);
        assert_eq!(Scalar::from_any_value(&AnyValue::Int64(7)), Scalar::Number(7.0));
        assert_eq!(Scalar::from_any_value(&AnyValue::Float64(f64::NAN)), Scalar::Missing);
        assert_eq!(Scalar::from_any_value(&AnyValue::String("80")), Scalar::Number(80.0));
        assert_eq!(
            Scalar::from_any_value(&AnyValue::String("E042")),
            Scalar::Text("E042".into())
        );
    }

    #[test]
    fn test_sort_if_comparable() {
        let mut numbers = vec![Scalar::from(3i64), Scalar::from(1i64), Scalar::from(2i64)];
        assert!(sort_if_comparable(&mut numbers));
        assert_eq!(numbers, vec![Scalar::from(1i64), Scalar::from(2i64), Scalar::from(3i64)]);

        let mut mixed = vec![Scalar::from("b"), Scalar::from(1i64), Scalar::from("a")];
        assert!(!sort_if_comparable(&mut mixed));
        assert_eq!(mixed, vec![Scalar::from("b"), Scalar::from(1i64), Scalar::from("a")]);
    }

    #[test]
    fn test_display_drops_integral_fraction() {
        assert_eq!(Scalar::from(100.0).to_string(), "100");
        assert_eq!(Scalar::from(0.5).to_string(), "0.5");
        assert_eq!(Scalar::Missing.to_string(), "");
    }

    #[test]
    fn test_frame_cells() {
        use polars::prelude::df;
        let df = df!(
            "mA" => ["100", "TOTAL"],
            "0" => [Some(3.0), None]
        )
        .unwrap();
        assert_eq!(
            column_scalars(&df, "mA").unwrap(),
            vec![Scalar::Number(100.0), Scalar::total()]
        );
        assert_eq!(row_scalars(&df, 1).unwrap(), vec![Scalar::total(), Scalar::Missing]);
        assert!(matches!(column_scalars(&df, "kV"), Err(StatsError::ColumnNotFound(_))));
    }

    #[test]
    fn test_numeric_expr_reads_padded_text() {
        use polars::prelude::{df, IntoLazy};
        let df = df!("kV" => [" 80 ", "n/a", "120.5"]).unwrap();
        let out = df.lazy().select([numeric_expr("kV")]).collect().unwrap();
        let values: Vec<Option<f64>> = out.column("kV").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(80.0), None, Some(120.5)]);
    }

    #[test]
    fn test_signed_zero_is_one_value() {
        use std::collections::HashSet;
        let set: HashSet<Scalar> = [Scalar::Number(0.0), Scalar::Number(-0.0)].into_iter().collect();
        assert_eq!(set.len(), 1);
    }
}
