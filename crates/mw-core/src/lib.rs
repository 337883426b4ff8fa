//! Core table model and engines for the market watch platform
//!
//! This crate provides the tabular data model (values, columns, rows,
//! tables), Persian/Arabic text normalization, mixed numeric/text sort
//! keys, the persistable filter specification model, and the
//! synchronous view-changed event bus.

pub mod events;
pub mod filter_spec;
pub mod normalize;
pub mod sort;
pub mod table;
pub mod value;

use thiserror::Error;

// Re-export commonly used types
pub use events::{ViewEvent, ViewEventBus};
pub use filter_spec::{FilterSpec, PatternMode, RelationOp};
pub use normalize::normalize;
pub use sort::{sort_key, sort_table, SortKey, SortState};
pub use table::{Column, Row, Table, SEQ_COLUMN};
pub use value::Value;

/// Errors that can occur in table operations
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("duplicate column key: {0}")]
    DuplicateColumn(String),

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("row width {got} does not match column count {expected}")]
    RowWidth { got: usize, expected: usize },
}
