//! Sort keys for mixed numeric/text cells
//!
//! Produces a total order where fully-numeric values sort numerically
//! ahead of text, text is compared token-wise so `"A10"` lands after
//! `"A9"`, and empty values sort last regardless of direction.

use ahash::AHashMap;

use crate::table::Table;
use crate::value::{parse_decimal, Value};

/// A comparison key over one cell.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    /// The whole value parsed as a decimal number.
    Number(f64),
    /// Alternating digit-run / non-digit-run tokens.
    Tokens(Vec<Token>),
    /// Empty after normalization; always compares last.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A digit run with leading zeros stripped. Kept as a string so
    /// runs longer than f64's 53-bit mantissa still compare exactly;
    /// numeric order over equal-base-10 strings is (length, lexical).
    Digits(String),
    Text(String),
}

impl SortKey {
    fn rank(&self) -> u8 {
        match self {
            SortKey::Number(_) => 0,
            SortKey::Tokens(_) => 1,
            SortKey::Empty => 2,
        }
    }
}

impl Eq for SortKey {}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Tokens(a), SortKey::Tokens(b)) => {
                for (ta, tb) in a.iter().zip(b.iter()) {
                    let ord = ta.cmp(tb);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Token {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Token {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self, other) {
            (Token::Digits(a), Token::Digits(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Token::Text(a), Token::Text(b)) => a.cmp(b),
            // Digit runs order before text runs.
            (Token::Digits(_), Token::Text(_)) => Ordering::Less,
            (Token::Text(_), Token::Digits(_)) => Ordering::Greater,
        }
    }
}

/// Build the sort key for one cell.
pub fn sort_key(value: &Value) -> SortKey {
    let s = value.normalized();
    if s.is_empty() {
        return SortKey::Empty;
    }
    if let Some(n) = parse_decimal(&s) {
        return SortKey::Number(n);
    }
    SortKey::Tokens(tokenize(&s.to_lowercase()))
}

fn tokenize(s: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut run = String::new();
    let mut run_is_digit = false;
    for ch in s.chars() {
        let is_digit = ch.is_ascii_digit();
        if !run.is_empty() && is_digit != run_is_digit {
            tokens.push(finish_run(std::mem::take(&mut run), run_is_digit));
        }
        run_is_digit = is_digit;
        run.push(ch);
    }
    if !run.is_empty() {
        tokens.push(finish_run(run, run_is_digit));
    }
    tokens
}

fn finish_run(run: String, is_digit: bool) -> Token {
    if is_digit {
        let trimmed = run.trim_start_matches('0');
        let digits = if trimmed.is_empty() { "0" } else { trimmed };
        Token::Digits(digits.to_string())
    } else {
        Token::Text(run)
    }
}

/// Per-table memory of sort direction, one toggle per column.
#[derive(Debug, Default)]
pub struct SortState {
    directions: AHashMap<String, bool>,
}

impl SortState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direction for the next sort on `column`: ascending on the first
    /// invocation, flipping on every repeat.
    pub fn toggle(&mut self, column: &str) -> bool {
        let ascending = self.directions.get(column).copied().unwrap_or(true);
        self.directions.insert(column.to_string(), !ascending);
        ascending
    }
}

/// Stable sort of the table's rows by one column, then renumber.
/// Empty cells stay last in both directions.
pub fn sort_table(table: &mut Table, column: &str, ascending: bool) {
    let Some(index) = table.column_index(column) else {
        return;
    };
    let keys: Vec<SortKey> = table
        .rows()
        .iter()
        .map(|row| row.get(index).map(sort_key).unwrap_or(SortKey::Empty))
        .collect();
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by(|&a, &b| {
        let (ka, kb) = (&keys[a], &keys[b]);
        // Empties pin to the end regardless of direction.
        match (ka == &SortKey::Empty, kb == &SortKey::Empty) {
            (true, true) => std::cmp::Ordering::Equal,
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            (false, false) => {
                if ascending {
                    ka.cmp(kb)
                } else {
                    kb.cmp(ka)
                }
            }
        }
    });
    table.reorder(&order);
}
