//! Summary statistics panel
//!
//! Per-column aggregates over the numeric cells of the current view.
//! Cells that do not coerce to a number are skipped, so a mixed column
//! still summarizes its numeric part. The robust median discards
//! values outside the 1.5-IQR fences before taking the median again,
//! which keeps one bad tick from dragging the figure.

use mw_core::Table;

/// Aggregates for one column. All figures are `None` when the column
/// has no numeric cells in the current view.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub column: String,
    /// Numeric cells that contributed.
    pub count: usize,
    pub sum: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub robust_median: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Summarize the selected columns of a view. `None` selects every
/// column; keys that are missing from the view are skipped.
pub fn summarize(view: &Table, columns: Option<&[String]>) -> Vec<ColumnSummary> {
    let keys: Vec<String> = match columns {
        Some(keys) => keys
            .iter()
            .filter(|k| view.column(k).is_some())
            .cloned()
            .collect(),
        None => view.columns().map(|c| c.key.clone()).collect(),
    };
    keys.iter()
        .map(|key| summarize_column(view, key))
        .collect()
}

fn summarize_column(view: &Table, key: &str) -> ColumnSummary {
    let mut values: Vec<f64> = match view.column_index(key) {
        Some(index) => view
            .rows()
            .iter()
            .filter_map(|row| row.get(index).and_then(|v| v.as_number()))
            .collect(),
        None => Vec::new(),
    };
    if values.is_empty() {
        return ColumnSummary {
            column: key.to_string(),
            count: 0,
            sum: None,
            mean: None,
            median: None,
            robust_median: None,
            min: None,
            max: None,
        };
    }
    values.sort_by(f64::total_cmp);
    let count = values.len();
    let sum: f64 = values.iter().sum();
    let median = quantile(&values, 0.5);
    ColumnSummary {
        column: key.to_string(),
        count,
        sum: Some(sum),
        mean: Some(sum / count as f64),
        median: Some(median),
        robust_median: Some(robust_median(&values, median)),
        min: values.first().copied(),
        max: values.last().copied(),
    }
}

/// Linear-interpolated quantile over sorted values.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = pos - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

/// Median of the values inside the 1.5-IQR fences. Falls back to the
/// plain median when every value is fenced out.
fn robust_median(sorted: &[f64], fallback: f64) -> f64 {
    let q1 = quantile(sorted, 0.25);
    let q3 = quantile(sorted, 0.75);
    let iqr = q3 - q1;
    let low = q1 - 1.5 * iqr;
    let high = q3 + 1.5 * iqr;
    let inliers: Vec<f64> = sorted
        .iter()
        .copied()
        .filter(|v| (low..=high).contains(v))
        .collect();
    if inliers.is_empty() {
        fallback
    } else {
        quantile(&inliers, 0.5)
    }
}
