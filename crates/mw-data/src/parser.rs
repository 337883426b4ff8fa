//! Snapshot section and record parsing
//!
//! The raw feed is one UTF-8 blob: sections split on `@`, records on
//! `;`, fields on `,`. Blank records are dropped silently; trailing
//! separators are expected in the feed. An empty section parses to an
//! empty table rather than an error.

use mw_core::{Column, Row, Table, Value, SEQ_COLUMN};

pub const SECTION_SEPARATOR: char = '@';
pub const RECORD_SEPARATOR: char = ';';
pub const FIELD_SEPARATOR: char = ',';

/// Split a raw snapshot into its sections.
pub fn split_sections(raw: &str) -> Vec<&str> {
    raw.split(SECTION_SEPARATOR).collect()
}

/// Parse one section into a table.
///
/// With a mapping, only mapped indices become named columns; an index
/// past the end of a record yields the empty string. Without a
/// mapping, every field becomes a positionally-named `ستون{i}` column,
/// sized to the widest record. Every row receives the 1-based
/// sequence-ordinal column first.
pub fn parse_records(section: &str, mapping: Option<&[(usize, &str)]>) -> Table {
    let records: Vec<Vec<&str>> = section
        .split(RECORD_SEPARATOR)
        .filter(|r| !r.trim().is_empty())
        .map(|r| r.split(FIELD_SEPARATOR).collect())
        .collect();
    if records.is_empty() {
        return Table::new();
    }

    let mut table = Table::new();
    // Ordinal first, matching the feed tables' display order.
    if table.add_column(Column::base(SEQ_COLUMN)).is_err() {
        return table;
    }

    match mapping {
        Some(mapping) => {
            for (_, key) in mapping {
                if table.add_column(Column::base(*key)).is_err() {
                    tracing::warn!(column = key, "duplicate key in field mapping, section dropped");
                    return Table::new();
                }
            }
            for (i, fields) in records.iter().enumerate() {
                let mut row = Row::with_capacity(mapping.len() + 1);
                row.push(Value::Number((i + 1) as f64));
                for (index, _) in mapping {
                    row.push(Value::Text(
                        fields.get(*index).copied().unwrap_or("").to_string(),
                    ));
                }
                // Width matches the column set by construction.
                let _ = table.push_row(row);
            }
        }
        None => {
            let width = records.iter().map(Vec::len).max().unwrap_or(0);
            for i in 0..width {
                if table.add_column(Column::base(format!("ستون{i}"))).is_err() {
                    return Table::new();
                }
            }
            for (i, fields) in records.iter().enumerate() {
                let mut row = Row::with_capacity(width + 1);
                row.push(Value::Number((i + 1) as f64));
                for j in 0..width {
                    row.push(Value::Text(fields.get(j).copied().unwrap_or("").to_string()));
                }
                let _ = table.push_row(row);
            }
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_section_separator() {
        let sections = split_sections("a@b@c");
        assert_eq!(sections, vec!["a", "b", "c"]);
    }

    #[test]
    fn positional_columns_sized_to_widest_record() {
        let table = parse_records("1,2,3;4,5", None);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_count(), 4); // ردیف + 3
        assert_eq!(table.value(1, "ستون2"), Some(&Value::from("")));
        assert_eq!(table.value(0, SEQ_COLUMN), Some(&Value::Number(1.0)));
    }

    #[test]
    fn mapped_parse_uses_keys_and_pads_short_records() {
        let mapping = [(0usize, "alpha"), (5usize, "omega")];
        let table = parse_records("x,y;a,b,c,d,e,f", Some(&mapping));
        assert_eq!(table.value(0, "alpha"), Some(&Value::from("x")));
        assert_eq!(table.value(0, "omega"), Some(&Value::from("")));
        assert_eq!(table.value(1, "omega"), Some(&Value::from("f")));
    }

    #[test]
    fn blank_records_dropped_silently() {
        let table = parse_records("1,2; ;;\t;3,4;", None);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.value(1, SEQ_COLUMN), Some(&Value::Number(2.0)));
    }

    #[test]
    fn empty_section_gives_empty_table() {
        let table = parse_records("", None);
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.column_count(), 0);
        let table = parse_records("  ;  ; ", None);
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn empty_fields_are_valid_values() {
        let table = parse_records("a,,c", None);
        assert_eq!(table.value(0, "ستون1"), Some(&Value::from("")));
    }
}
