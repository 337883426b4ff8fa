//! Order-book merge
//!
//! Folds the detail section's per-instrument level rows (levels 1–5,
//! six fields each) into the primary instrument table as 30 additional
//! `S3_L{level}_C{field}` columns. Degrades gracefully: an empty input
//! or a missing key column returns the primary table unchanged, and an
//! instrument with no detail rows gets empty strings.

use ahash::AHashMap;

use mw_core::{normalize, Column, Table, Value};

use crate::columns::{order_book_column, ColumnRoles, ORDER_BOOK_FIELDS, ORDER_BOOK_LEVELS};

/// Detail keys and levels are matched on normalized strings, not
/// numbers: instrument keys may carry leading zeros.
pub fn merge_order_book(primary: &Table, detail: &Table, roles: &ColumnRoles) -> Table {
    if primary.is_empty() || detail.is_empty() {
        return primary.clone();
    }
    let key_column = if primary.column_index(&roles.instrument_key).is_some() {
        roles.instrument_key.as_str()
    } else if primary.column_index("ستون0").is_some() {
        "ستون0"
    } else {
        return primary.clone();
    };
    if detail.column_index("ستون0").is_none() {
        return primary.clone();
    }

    // instrument key -> level -> the six raw field values
    let mut levels: AHashMap<String, [Option<Vec<Value>>; 5]> = AHashMap::new();
    for row in 0..detail.row_count() {
        let key = detail
            .value(row, "ستون0")
            .map(|v| v.normalized())
            .unwrap_or_default();
        if key.is_empty() {
            continue;
        }
        let level_text = detail
            .value(row, "ستون1")
            .map(|v| v.normalized())
            .unwrap_or_default();
        if level_text.is_empty() || !level_text.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        let Ok(level) = level_text.parse::<u8>() else {
            continue;
        };
        if !ORDER_BOOK_LEVELS.contains(&level) {
            continue;
        }
        let fields: Vec<Value> = ORDER_BOOK_FIELDS
            .map(|f| {
                detail
                    .value(row, &format!("ستون{f}"))
                    .cloned()
                    .unwrap_or(Value::Text(String::new()))
            })
            .collect();
        // Duplicate (key, level) rows: last one wins.
        levels.entry(key).or_default()[(level - 1) as usize] = Some(fields);
    }

    let mut merged = primary.clone();
    let mut indices = Vec::with_capacity(30);
    for level in ORDER_BOOK_LEVELS {
        for field in ORDER_BOOK_FIELDS {
            indices.push(merged.ensure_column(Column::base(order_book_column(level, field))));
        }
    }

    let key_index = match merged.column_index(key_column) {
        Some(i) => i,
        None => return merged,
    };
    for row in merged.rows_mut() {
        let key = row
            .get(key_index)
            .map(|v| normalize(&v.display()))
            .unwrap_or_default();
        let per_level = levels.get(&key);
        let mut slot = 0;
        for level in ORDER_BOOK_LEVELS {
            let fields = per_level.and_then(|l| l[(level - 1) as usize].as_ref());
            for field_offset in 0..6 {
                let value = fields
                    .and_then(|f| f.get(field_offset).cloned())
                    .unwrap_or(Value::Text(String::new()));
                row.set(indices[slot], value);
                slot += 1;
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_records;

    fn roles() -> ColumnRoles {
        ColumnRoles::default()
    }

    fn primary() -> Table {
        let mapping = [(0usize, "کد_داخلی"), (1usize, "نماد")];
        parse_records("12345,alpha;777,beta", Some(&mapping))
    }

    #[test]
    fn merges_levels_into_named_columns() {
        let detail = parse_records("12345,1,9,4,1050,1040,100,90;12345,2,1,1,1049,1041,5,6", None);
        let merged = merge_order_book(&primary(), &detail, &roles());
        assert_eq!(merged.column_count(), 3 + 30);
        assert_eq!(merged.value(0, "S3_L1_C4"), Some(&Value::from("1050")));
        assert_eq!(merged.value(0, "S3_L2_C7"), Some(&Value::from("6")));
        // Levels without data fill with empty strings.
        assert_eq!(merged.value(0, "S3_L5_C2"), Some(&Value::from("")));
    }

    #[test]
    fn unmatched_instruments_get_empty_strings() {
        let detail = parse_records("12345,1,9,4,1050,1040,100,90", None);
        let merged = merge_order_book(&primary(), &detail, &roles());
        assert_eq!(merged.value(1, "S3_L1_C4"), Some(&Value::from("")));
    }

    #[test]
    fn invalid_levels_discarded() {
        let detail = parse_records("12345,9,a,b,c,d,e,f;12345,x,a,b,c,d,e,f;12345,0,a,b,c,d,e,f", None);
        let merged = merge_order_book(&primary(), &detail, &roles());
        assert_eq!(merged.value(0, "S3_L1_C2"), Some(&Value::from("")));
    }

    #[test]
    fn duplicate_key_level_last_wins() {
        let detail = parse_records("12345,1,1,1,1,1,1,1;12345,1,2,2,2,2,2,2", None);
        let merged = merge_order_book(&primary(), &detail, &roles());
        assert_eq!(merged.value(0, "S3_L1_C4"), Some(&Value::from("2")));
    }

    #[test]
    fn keys_match_after_normalization() {
        let mapping = [(0usize, "کد_داخلی")];
        let p = parse_records("۱۲۳۴۵", Some(&mapping));
        let detail = parse_records("12345,1,9,4,1050,1040,100,90", None);
        let merged = merge_order_book(&p, &detail, &roles());
        assert_eq!(merged.value(0, "S3_L1_C4"), Some(&Value::from("1050")));
    }

    #[test]
    fn empty_inputs_return_primary_copy() {
        let empty = Table::new();
        let p = primary();
        let merged = merge_order_book(&p, &empty, &roles());
        assert_eq!(merged.column_count(), p.column_count());
        let merged = merge_order_book(&empty, &p, &roles());
        assert_eq!(merged.row_count(), 0);
    }

    #[test]
    fn missing_key_column_returns_primary_copy() {
        let mapping = [(0usize, "نماد")];
        let p = parse_records("alpha;beta", Some(&mapping));
        let detail = parse_records("alpha,1,9,4,1050,1040,100,90", None);
        let merged = merge_order_book(&p, &detail, &roles());
        assert_eq!(merged.column_count(), p.column_count());
    }
}
