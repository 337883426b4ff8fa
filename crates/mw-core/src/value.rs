//! Cell values
//!
//! A cell is text, a number, or absent. The feed delivers everything as
//! text; derived columns produce numbers; failed numeric coercion
//! produces `Absent` and never an error.

use crate::normalize::normalize;

/// A single table cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    Text(String),
    Number(f64),
    #[default]
    Absent,
}

impl Value {
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    /// Coerce to a number. Text is normalized then parsed as a plain
    /// decimal; anything else yields `None`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(*n),
            Value::Number(_) => None,
            Value::Text(s) => parse_decimal(&normalize(s)),
            Value::Absent => None,
        }
    }

    /// Raw display string: text as-is, numbers via `Display`, absent as
    /// the empty string. Formatting rules for derived columns live in
    /// the view layer.
    pub fn display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Number(n) => format!("{n}"),
            Value::Absent => String::new(),
        }
    }

    /// Normalized form used for matching, search and sort keys.
    pub fn normalized(&self) -> String {
        match self {
            Value::Text(s) => normalize(s),
            Value::Number(n) => format!("{n}"),
            Value::Absent => String::new(),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<Option<f64>> for Value {
    fn from(n: Option<f64>) -> Self {
        match n {
            Some(n) => Value::Number(n),
            None => Value::Absent,
        }
    }
}

/// Parse a string that is entirely a signed decimal number
/// (`[-+]?digits[.digits]`). Rejects exponents, infinities and
/// anything with trailing garbage.
pub fn parse_decimal(s: &str) -> Option<f64> {
    let body = s.strip_prefix(['-', '+']).unwrap_or(s);
    if body.is_empty() {
        return None;
    }
    let mut parts = body.splitn(2, '.');
    let int_part = parts.next().unwrap_or("");
    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if let Some(frac) = parts.next() {
        if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }
    s.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_plain_decimals() {
        assert_eq!(Value::from("1234").as_number(), Some(1234.0));
        assert_eq!(Value::from("-12.5").as_number(), Some(-12.5));
        assert_eq!(Value::from(" ۱۲۳ ").as_number(), Some(123.0));
    }

    #[test]
    fn rejects_non_numeric_text() {
        assert_eq!(Value::from("abc").as_number(), None);
        assert_eq!(Value::from("12a").as_number(), None);
        assert_eq!(Value::from("1e5").as_number(), None);
        assert_eq!(Value::from("").as_number(), None);
        assert_eq!(Value::Absent.as_number(), None);
    }

    #[test]
    fn display_collapses_whole_numbers() {
        assert_eq!(Value::Number(1.0).display(), "1");
        assert_eq!(Value::Number(2.5).display(), "2.5");
        assert_eq!(Value::Absent.display(), "");
    }

    #[test]
    fn normalized_folds_text() {
        assert_eq!(Value::from("كتاب").normalized(), "کتاب");
    }
}
