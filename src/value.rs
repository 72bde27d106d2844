/// GridSync Cell Values
///
/// The backing store is an untyped spreadsheet, so every cell arrives as a
/// loosely-typed scalar. `CellValue` keeps the original representation and
/// offers lenient views on top of it: a cell holding the string `"200"` still
/// participates in numeric filters and numeric sorting.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A single cell's scalar value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Returns true for `Null` and for empty / whitespace-only strings.
    /// The sort engine treats both the same way (always last).
    pub fn is_empty_like(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Stringify for display, search, and substring filters.
    /// Numbers drop a trailing `.0` so `100.0` searches as `"100"`.
    pub fn to_display_string(&self) -> String {
        match self {
            CellValue::String(v) => v.clone(),
            CellValue::Number(v) => {
                if v.fract() == 0.0 && v.is_finite() && v.abs() < 1e15 {
                    format!("{}", *v as i64)
                } else {
                    format!("{}", v)
                }
            }
            CellValue::Bool(v) => v.to_string(),
            CellValue::Null => String::new(),
        }
    }

    /// Lenient numeric view: numbers pass through, strings are trimmed and
    /// parsed (currency symbols and thousands separators stripped). Returns
    /// `None` when no numeric reading exists.
    pub fn as_number_lenient(&self) -> Option<f64> {
        match self {
            CellValue::Number(v) => Some(*v),
            CellValue::String(s) => {
                let cleaned: String = s
                    .trim()
                    .chars()
                    .filter(|c| !matches!(c, '$' | ',' | '%'))
                    .collect();
                if cleaned.is_empty() {
                    return None;
                }
                cleaned.parse::<f64>().ok()
            }
            _ => None,
        }
    }

    /// Lenient date view, normalized to a comparable `YYYY-MM-DD` key.
    ///
    /// Accepts `YYYY-MM-DD` and `YYYY/MM/DD`, with any time suffix after a
    /// space or `T` ignored. Returns `None` for anything else; date filters
    /// exclude such cells rather than erroring.
    pub fn as_date_lenient(&self) -> Option<String> {
        let raw = self.as_str()?.trim();
        let date_part = raw
            .split(|c| c == ' ' || c == 'T')
            .next()
            .unwrap_or_default();
        let normalized = date_part.replace('/', "-");
        let mut parts = normalized.split('-');
        let year = parts.next()?;
        let month = parts.next()?;
        let day = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let m: u32 = month.parse().ok()?;
        let d: u32 = day.parse().ok()?;
        if !(1..=12).contains(&m) || !(1..=31).contains(&d) {
            return None;
        }
        Some(format!("{}-{:02}-{:02}", year, m, d))
    }

    /// Convert from the JSON the remote store sends.
    pub fn from_json(value: &JsonValue) -> CellValue {
        match value {
            JsonValue::Null => CellValue::Null,
            JsonValue::Bool(b) => CellValue::Bool(*b),
            JsonValue::Number(n) => n
                .as_f64()
                .map(CellValue::Number)
                .unwrap_or(CellValue::Null),
            JsonValue::String(s) => CellValue::String(s.clone()),
            other => CellValue::String(other.to_string()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}
