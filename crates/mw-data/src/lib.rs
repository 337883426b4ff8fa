//! Feed acquisition, parsing and persistence for the market watch
//! platform
//!
//! Turns the raw delimited snapshot into tables, folds the order-book
//! section into the instrument table, computes the derived analytic
//! columns, merges per-symbol client-type and closing-price histories,
//! and owns the settings file (persisted filters, column rename map,
//! visibility, data URL).

pub mod columns;
pub mod derive;
pub mod feed;
pub mod history;
pub mod merge;
pub mod parser;
pub mod settings;

use thiserror::Error;

// Re-exports
pub use columns::{ColumnRoles, FIELD_MAPPING};
pub use derive::compute_derived;
pub use feed::{FeedSource, FileFeedSource, HttpFeedSource};
pub use history::{merge_client_and_price, parse_client_history, parse_price_history};
pub use merge::merge_order_book;
pub use parser::{parse_records, split_sections};
pub use settings::{Settings, SettingsStore};

use mw_core::Table;

/// Errors that can occur in data operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("network error: {0}")]
    Network(String),

    #[error("settings parse error: {0}")]
    Persistence(#[from] serde_json::Error),

    #[error("snapshot parse error: {0}")]
    Parse(String),
}

/// Index of the primary instrument section in the raw snapshot.
pub const PRIMARY_SECTION: usize = 2;
/// Index of the per-instrument order-book detail section.
pub const DETAIL_SECTION: usize = 3;

/// Build the base table for one snapshot: split sections, parse the
/// primary instrument section with the fixed field mapping, parse the
/// order-book detail positionally, merge, and compute derived columns.
///
/// Missing sections degrade to empty tables; the result is
/// deterministic for identical input.
pub fn build_base_table(raw: &str, roles: &ColumnRoles) -> Table {
    let sections = split_sections(raw);
    let primary = sections
        .get(PRIMARY_SECTION)
        .map(|s| parse_records(s, Some(&FIELD_MAPPING)))
        .unwrap_or_default();
    let detail = sections
        .get(DETAIL_SECTION)
        .map(|s| parse_records(s, None))
        .unwrap_or_default();
    let mut base = merge_order_book(&primary, &detail, roles);
    compute_derived(&mut base, roles);
    base
}
