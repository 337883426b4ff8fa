//! Fixed column layout of the feed
//!
//! Section 2 of the snapshot is positional; the 26-entry mapping below
//! assigns stable keys to the indices we consume. The order-book merge
//! adds `S3_L{level}_C{field}` columns for levels 1–5, fields 2–7.

use ahash::AHashMap;
use indexmap::IndexMap;
use once_cell::sync::Lazy;

use mw_core::Table;

/// Index → stable column key for the primary instrument section.
pub static FIELD_MAPPING: [(usize, &str); 26] = [
    (0, "کد_داخلی"),
    (1, "کد_بین_المللی"),
    (2, "نماد"),
    (3, "نام_شرکت"),
    (4, "زمان_آخرین_معامله"),
    (5, "اولین_قیمت"),
    (6, "قیمت_پایانی"),
    (7, "قیمت_آخرین_معامله"),
    (8, "تعداد_معاملات"),
    (9, "حجم_معاملات"),
    (10, "ارزش_معاملات"),
    (11, "کمترین_قیمت"),
    (12, "بیشترین_قیمت"),
    (13, "قیمت_دیروز"),
    (14, "EPS"),
    (15, "حجم_مبنا"),
    (16, "تعداد_بازدید_کننده"),
    (17, "بازار_اصلی"),
    (18, "گروه_صنعت"),
    (19, "حداکثر_قیمت_مجاز"),
    (20, "حداقل_قیمت_مجاز"),
    (21, "تعداد_کل_سهام"),
    (22, "کد_بازار"),
    (23, "NAV"),
    (24, "موقعیت_های_باز"),
    (25, "دسته_بندی_تخصصی"),
];

/// Order-book levels carried by the detail section.
pub const ORDER_BOOK_LEVELS: std::ops::RangeInclusive<u8> = 1..=5;
/// Detail-section field indices folded into the merge (2..=7).
pub const ORDER_BOOK_FIELDS: std::ops::RangeInclusive<u8> = 2..=7;

/// Key of a merged order-book column, e.g. `S3_L1_C4`.
pub fn order_book_column(level: u8, field: u8) -> String {
    format!("S3_L{level}_C{field}")
}

/// Built-in display labels, overridable by the persisted rename map.
pub static DEFAULT_LABELS: Lazy<AHashMap<String, String>> = Lazy::new(|| {
    let mut map = AHashMap::new();
    let line = ["خط1", "خط2", "خط3", "خط4", "خط5"];
    let field = [
        (2u8, "تعداد فروشنده"),
        (3, "تعداد خریدار"),
        (4, "قیمت خریدار"),
        (5, "قیمت فروشنده"),
        (6, "حجم خریدار"),
        (7, "حجم فروشنده"),
    ];
    for (lv, line_label) in (1u8..=5).zip(line) {
        for (f, field_label) in field {
            map.insert(
                order_book_column(lv, f),
                format!("{field_label} {line_label}"),
            );
        }
    }
    for (key, label) in [
        ("کد_داخلی", "کد داخلی"),
        ("کد_بین_المللی", "کد بین المللی"),
        ("نام_شرکت", "نام شرکت"),
        ("قیمت_پایانی", "قیمت پایانی"),
        ("قیمت_آخرین_معامله", "قیمت آخرین معامله"),
        ("تعداد_معاملات", "تعداد معاملات"),
        ("حجم_معاملات", "حجم معاملات"),
        ("ارزش_معاملات", "ارزش معاملات"),
        ("کمترین_قیمت", "کمترین قیمت"),
        ("بیشترین_قیمت", "بیشترین قیمت"),
        ("قیمت_دیروز", "قیمت دیروز"),
        ("تعداد_کل_سهام", "تعداد کل سهام"),
        ("کد_بازار", "کد بازار"),
        ("گروه_صنعت", "گروه صنعت"),
    ] {
        map.insert(key.to_string(), label.to_string());
    }
    map
});

/// Explicit role → column-key mapping supplied at table construction.
/// Replaces name-scanning heuristics: every consumer of a role reads
/// the column named here.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRoles {
    pub instrument_key: String,
    pub closing_price: String,
    pub last_trade_price: String,
    pub eps: String,
    pub total_shares: String,
    pub industry_group: String,
    pub max_allowed_price: String,
    pub min_allowed_price: String,
}

impl Default for ColumnRoles {
    fn default() -> Self {
        Self {
            instrument_key: "کد_داخلی".to_string(),
            closing_price: "قیمت_پایانی".to_string(),
            last_trade_price: "قیمت_آخرین_معامله".to_string(),
            eps: "EPS".to_string(),
            total_shares: "تعداد_کل_سهام".to_string(),
            industry_group: "گروه_صنعت".to_string(),
            max_allowed_price: "حداکثر_قیمت_مجاز".to_string(),
            min_allowed_price: "حداقل_قیمت_مجاز".to_string(),
        }
    }
}

/// Apply display labels to a table: built-in defaults first, then the
/// persisted overrides.
pub fn apply_labels(table: &mut Table, overrides: &IndexMap<String, String>) {
    let keys: Vec<String> = table.columns().map(|c| c.key.clone()).collect();
    for key in keys {
        let label = overrides
            .get(&key)
            .cloned()
            .or_else(|| DEFAULT_LABELS.get(&key).cloned());
        if let Some(label) = label {
            // Key is known to exist.
            let _ = table.rename_column(&key, label);
        }
    }
}
