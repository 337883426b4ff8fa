//! View-side computation for the market watch platform
//!
//! Applies the persisted filter pipeline to a base table, keeps the
//! live substring search index over the current view, projects and
//! formats visible columns for display and CSV export, and computes
//! the summary statistics panel.

pub mod filter;
pub mod project;
pub mod search;
pub mod stats;

use thiserror::Error;

// Re-exports
pub use filter::{FilterEntry, FilterPipeline};
pub use project::{export_csv, project, FormatRule, FormatRules, Projection};
pub use search::{Debouncer, SearchIndex};
pub use stats::{summarize, ColumnSummary};

/// Errors that can occur in view operations
#[derive(Error, Debug)]
pub enum ViewError {
    #[error("invalid relation expression: {0}")]
    Expression(String),

    #[error("filter index {0} out of range")]
    FilterIndex(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
