//! Projection and export
//!
//! The view keeps full-precision values; rounding happens only here,
//! when cells are rendered for display. CSV export writes the raw
//! values, so a spreadsheet sees the same precision the engine holds.

use std::io::Write;
use std::path::Path;

use ahash::AHashMap;
use tracing::info;

use mw_core::{Table, Value};

use crate::ViewError;

/// UTF-8 byte order mark, so spreadsheet tools pick up Persian text.
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

const EPSILON: f64 = 1e-6;

/// Per-column display rounding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormatRule {
    /// Always one decimal place.
    OneDecimal,
    /// Whole numbers render without a fraction, everything else with
    /// two decimal places.
    CollapseWhole,
}

/// Display formatting keyed by column key. Columns without a rule
/// render their raw value.
#[derive(Debug, Clone, Default)]
pub struct FormatRules {
    rules: AHashMap<String, FormatRule>,
}

impl FormatRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// The rounding used by the derived market columns: one decimal for
    /// market cap and P/E, whole-or-two-decimals for the queue values.
    pub fn market_defaults() -> Self {
        let mut rules = Self::new();
        rules.set("ارزش بازار همت", FormatRule::OneDecimal);
        rules.set("PE", FormatRule::OneDecimal);
        rules.set("صف خرید", FormatRule::CollapseWhole);
        rules.set("صف فروش", FormatRule::CollapseWhole);
        rules
    }

    pub fn set(&mut self, column: impl Into<String>, rule: FormatRule) {
        self.rules.insert(column.into(), rule);
    }

    pub fn rule(&self, column: &str) -> Option<FormatRule> {
        self.rules.get(column).copied()
    }

    /// Render one cell under this rule set.
    pub fn format_cell(&self, column: &str, value: &Value) -> String {
        match (self.rule(column), value) {
            (Some(FormatRule::OneDecimal), Value::Number(n)) => format!("{n:.1}"),
            (Some(FormatRule::CollapseWhole), Value::Number(n)) => {
                if (n - n.round()).abs() < EPSILON {
                    format!("{:.0}", n.round())
                } else {
                    format!("{n:.2}")
                }
            }
            _ => value.display(),
        }
    }
}

/// A view rendered to strings: visible columns only, display labels as
/// headers.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Render the visible columns of a view for display.
pub fn project(view: &Table, rules: &FormatRules) -> Projection {
    let visible: Vec<(usize, &str, &str)> = view
        .columns()
        .enumerate()
        .filter(|(_, c)| c.visible)
        .map(|(i, c)| (i, c.key.as_str(), c.label.as_str()))
        .collect();
    let headers = visible.iter().map(|(_, _, label)| label.to_string()).collect();
    let rows = view
        .rows()
        .iter()
        .map(|row| {
            visible
                .iter()
                .map(|(i, key, _)| {
                    row.get(*i)
                        .map(|v| rules.format_cell(key, v))
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect();
    Projection { headers, rows }
}

/// Export the visible columns of a view as UTF-8 CSV with a BOM.
/// Cells are written at full precision. Returns the number of data
/// rows written.
pub fn export_csv(view: &Table, path: impl AsRef<Path>) -> Result<usize, ViewError> {
    let path = path.as_ref();
    let mut file = std::fs::File::create(path)?;
    file.write_all(UTF8_BOM)?;

    let visible: Vec<usize> = view
        .columns()
        .enumerate()
        .filter(|(_, c)| c.visible)
        .map(|(i, _)| i)
        .collect();

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(
        view.columns()
            .filter(|c| c.visible)
            .map(|c| c.label.as_str()),
    )?;
    for row in view.rows() {
        writer.write_record(
            visible
                .iter()
                .map(|&i| row.get(i).map(Value::display).unwrap_or_default()),
        )?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = view.row_count(), "exported view");
    Ok(view.row_count())
}
