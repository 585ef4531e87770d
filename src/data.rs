use std::{cmp::Ordering, fmt};

use serde::{Serialize, Serializer};

/// Tokens that spreadsheet exports use for an empty cell. Applies to CSV
/// fields and to workbook string cells; typed workbook cells never match.
const NA_TOKENS: &[&str] = &["", "NA", "N/A", "n/a", "NULL", "null", "NaN", "nan", "#N/A"];

/// Literal used in exported records for a missing or unparseable value.
pub const NULL_SENTINEL: &str = "Null";

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Null,
    Text(String),
    Number(f64),
}

impl Cell {
    /// Builds a cell from raw text: surrounding whitespace is trimmed, and
    /// blank values or NA tokens become [`Cell::Null`].
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if NA_TOKENS.contains(&trimmed) {
            Cell::Null
        } else {
            Cell::Text(trimmed.to_string())
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Blank text, null and the `Null` sentinel all count as missing.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Text(s) => {
                let trimmed = s.trim();
                trimmed.is_empty() || trimmed == NULL_SENTINEL
            }
            Cell::Number(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Numeric view of the cell. Text is parsed after trimming; currency
    /// symbols are not stripped here (see [`parse_amount`]).
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            Cell::Null => None,
        }
    }

    /// Converts the cell to a number in place; unparseable values become null.
    pub fn coerce_numeric(&mut self) {
        *self = match self.as_number() {
            Some(n) => Cell::Number(n),
            None => Cell::Null,
        };
    }

    /// Value-and-type equality where null never matches anything.
    pub fn matches(&self, other: &Cell) -> bool {
        match (self, other) {
            (Cell::Text(a), Cell::Text(b)) => a == b,
            (Cell::Number(a), Cell::Number(b)) => a == b,
            _ => false,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => format_number(*n),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::from_text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Null => serializer.serialize_none(),
            Cell::Text(s) => serializer.serialize_str(s),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
                serializer.serialize_i64(*n as i64)
            }
            Cell::Number(n) => serializer.serialize_f64(*n),
        }
    }
}

/// Sort key over a cell. Numbers order before text so that a column mixing
/// both still has a total order; null orders after every value.
#[derive(Debug, Clone, Copy)]
pub struct ComparableCell<'a>(pub &'a Cell);

impl Ord for ComparableCell<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0, other.0) {
            (Cell::Null, Cell::Null) => Ordering::Equal,
            (Cell::Null, _) => Ordering::Greater,
            (_, Cell::Null) => Ordering::Less,
            (Cell::Number(a), Cell::Number(b)) => a.total_cmp(b),
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            (Cell::Number(_), Cell::Text(_)) => Ordering::Less,
            (Cell::Text(_), Cell::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for ComparableCell<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ComparableCell<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ComparableCell<'_> {}

/// Whole numbers render without a fractional part.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        (value as i64).to_string()
    } else {
        value.to_string()
    }
}

fn strip_currency(value: &str) -> String {
    value.replace(['$', ','], "").trim().to_string()
}

/// Parses a money-like amount such as `$1,140.00`.
pub fn parse_amount(value: &str) -> Option<f64> {
    strip_currency(value)
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

/// Coerces an amount to a whole number. Fractional or unparseable amounts
/// yield `None`.
pub fn parse_whole_amount(cell: &Cell) -> Option<i64> {
    let amount = match cell {
        Cell::Number(n) => Some(*n),
        Cell::Text(s) => parse_amount(s),
        Cell::Null => None,
    }?;
    (amount.fract() == 0.0 && amount.abs() < i64::MAX as f64).then_some(amount as i64)
}

/// Uniform output formatting for record fields: null becomes `"Null"`,
/// numbers (after stripping `$` and `,`) render as integer or decimal strings,
/// anything else is the trimmed original text.
pub fn clean_value(cell: &Cell) -> String {
    match cell {
        Cell::Null => NULL_SENTINEL.to_string(),
        Cell::Number(n) => format_number(*n),
        Cell::Text(s) => match parse_amount(s) {
            Some(n) => format_number(n),
            None => s.trim().to_string(),
        },
    }
}
