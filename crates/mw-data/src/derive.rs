//! Derived analytic columns
//!
//! Pure functions of base columns, computed once per snapshot and
//! idempotent on recomputation. A missing source column leaves the
//! table unchanged for that derivation; a non-numeric cell degrades to
//! an absent result (or zero for the queue-value columns, which feed
//! downstream sums).

use ahash::AHashMap;
use once_cell::sync::Lazy;

use mw_core::{normalize, Column, Table, Value};

use crate::columns::{order_book_column, ColumnRoles};

/// Market capitalization in hezar-milliard toman (price × shares / 1e13).
pub const MARKET_CAP: &str = "ارزش بازار همت";
/// Price / earnings ratio.
pub const PE: &str = "PE";
/// Industry label resolved from the industry-group code.
pub const INDUSTRY: &str = "نوع_صنعت";
/// Value queued at the buy side when price is pinned to the allowed max.
pub const BUY_QUEUE: &str = "صف خرید";
/// Value queued at the sell side when price is pinned to the allowed min.
pub const SELL_QUEUE: &str = "صف فروش";

/// Industry-group code → label.
pub static INDUSTRY_MAP: Lazy<AHashMap<&'static str, &'static str>> = Lazy::new(|| {
    AHashMap::from_iter([
        ("01", "زراعت و خدمات وابسته"),
        ("02", "جنگلداري و ماهيگيري"),
        ("10", "استخراج زغال سنگ"),
        ("11", "استخراج نفت گاز و خدمات جنبي جز اکتشاف"),
        ("13", "استخراج کانه هاي فلزي"),
        ("14", "استخراج ساير معادن"),
        ("15", "حذف شده- فرآورده‌هاي غذايي و آشاميدني"),
        ("17", "منسوجات"),
        ("19", "دباغي، پرداخت چرم و ساخت انواع پاپوش"),
        ("20", "محصولات چوبي"),
        ("21", "محصولات كاغذي"),
        ("22", "انتشار، چاپ و تکثير"),
        ("23", "فراورده هاي نفتي، كک و سوخت هسته اي"),
        ("24", "حذف شده-مواد و محصولات شيميايي"),
        ("25", "لاستيك و پلاستيك"),
        ("26", "توليد محصولات كامپيوتري الكترونيكي ونوري"),
        ("27", "فلزات اساسي"),
        ("28", "ساخت محصولات فلزي"),
        ("29", "ماشين آلات و تجهيزات"),
        ("31", "ماشين آلات و دستگاه‌هاي برقي"),
        ("32", "ساخت دستگاه‌ها و وسايل ارتباطي"),
        ("33", "ابزارپزشکي، اپتيکي و اندازه‌گيري"),
        ("34", "خودرو و ساخت قطعات"),
        ("35", "ساير تجهيزات حمل و نقل"),
        ("36", "مبلمان و مصنوعات ديگر"),
        ("38", "قند و شكر"),
        ("39", "شرکتهاي چند رشته اي صنعتي"),
        ("40", "عرضه برق، گاز، بخاروآب گرم"),
        ("41", "جمع آوري، تصفيه و توزيع آب"),
        ("42", "محصولات غذايي و آشاميدني به جز قند و شكر"),
        ("43", "مواد و محصولات دارويي"),
        ("44", "محصولات شيميايي"),
        ("45", "پيمانكاري صنعتي"),
        ("46", "تجارت عمده فروشي به جز وسايل نقليه موتور"),
        ("47", "خرده فروشي،باستثناي وسايل نقليه موتوري"),
        ("49", "كاشي و سراميك"),
        ("50", "تجارت عمده وخرده فروشي وسائط نقليه موتور"),
        ("51", "حمل و نقل هوايي"),
        ("52", "انبارداري و حمايت از فعاليتهاي حمل و نقل"),
        ("53", "سيمان، آهك و گچ"),
        ("54", "ساير محصولات كاني غيرفلزي"),
        ("55", "هتل و رستوران"),
        ("56", "سرمايه گذاريها"),
        ("57", "بانكها و موسسات اعتباري"),
        ("58", "ساير واسطه گريهاي مالي"),
        ("59", "اوراق حق تقدم استفاده از تسهيلات مسكن"),
        ("60", "حمل ونقل، انبارداري و ارتباطات"),
        ("61", "حمل و نقل آبی"),
        ("63", "فعاليت های پشتیبانی و کمکی حمل و نقل"),
        ("64", "مخابرات"),
        ("65", "واسطه‌گری‌های مالی و پولی"),
        ("66", "بیمه وصندوق بازنشستگی به جز تامین اجتماعی"),
        ("67", "فعالیت‌هاي کمکی به نهادهای مالی واسط"),
        ("68", "صندوق سرمایه گذاری قابل معامله"),
        ("69", "اوراق تامین مالی"),
        ("70", "انبوه سازی، املاک و مستغلات"),
        ("71", "فعالیت مهندسی، تجزیه، تحلیل و آزمایش فنی"),
        ("72", "رایانه و فعالیت‌های وابسته به آن"),
        ("73", "اطلاعات و ارتباطات"),
        ("74", "خدمات فنی و مهندسی"),
        ("76", "اوراق بهادار مبتنی بر دارایی فکری"),
        ("77", "فعالبت های اجاره و لیزینگ"),
        ("80", "تبلیغات و بازارپژوهی"),
        ("82", "فعالیت پشتیبانی اجرائی اداری و حمایت کسب"),
        ("84", "سلامت انسان و مددکاری اجتماعی"),
        ("90", "فعالیت های هنری، سرگرمی و خلاقانه"),
        ("93", "فعالیت‌های فرهنگی و ورزشی"),
        ("98", "گروه اوراق غیر فعال"),
        ("X1", "شاخص"),
    ])
});

/// Market-code → market label, used for value-filter display.
pub static MARKET_LABELS: Lazy<AHashMap<&'static str, &'static str>> = Lazy::new(|| {
    AHashMap::from_iter([
        ("300", "بورس"),
        ("303", "فرابورس"),
        ("309", "پایه"),
        ("301", "مشارکت"),
        ("304", "آتی"),
        ("305", "صندوق"),
        ("306", "مرابحه و اجاره"),
        ("307", "تسهیلات مسکن"),
        ("308", "سلف"),
        ("311", "اختیار خ ض"),
        ("312", "اختیار ف ط"),
        ("313", "بازار نوآفرین رشد پایه"),
        ("315", "صندوق کالا"),
        ("320", "اختیار خرید ض"),
        ("321", "اختیار ف ط"),
        ("380", "صندوق طلا و کالا"),
        ("400", "حق بورس"),
        ("403", "حق فرابورس"),
        ("404", "حق پایه"),
        ("701", "زعفران و سکه"),
        ("706", "مرابحه دولت اراد"),
        ("803", "بار برق"),
        ("804", "بار برق"),
        ("200", "سلف انرژی"),
        ("206", "صکوک"),
        ("201", "گواهی"),
        ("208", "صکوک"),
    ])
});

/// Compute all derived columns in place. Recomputing on an unchanged
/// table yields identical values.
pub fn compute_derived(table: &mut Table, roles: &ColumnRoles) {
    compute_market_cap(table, roles);
    compute_pe(table, roles);
    compute_industry(table, roles);
    compute_queue_values(table, roles);
}

fn numeric_column(table: &Table, key: &str) -> Option<Vec<Option<f64>>> {
    let index = table.column_index(key)?;
    Some(
        table
            .rows()
            .iter()
            .map(|row| row.get(index).and_then(Value::as_number))
            .collect(),
    )
}

fn compute_market_cap(table: &mut Table, roles: &ColumnRoles) {
    let (Some(prices), Some(shares)) = (
        numeric_column(table, &roles.closing_price),
        numeric_column(table, &roles.total_shares),
    ) else {
        return;
    };
    let index = table.ensure_column(Column::computed(MARKET_CAP));
    for (row, (price, share)) in table.rows_mut().iter_mut().zip(prices.iter().zip(&shares)) {
        let cap = match (price, share) {
            (Some(p), Some(s)) => Value::Number(p * s / 1e13),
            _ => Value::Absent,
        };
        row.set(index, cap);
    }
}

fn compute_pe(table: &mut Table, roles: &ColumnRoles) {
    let (Some(last), Some(eps)) = (
        numeric_column(table, &roles.last_trade_price),
        numeric_column(table, &roles.eps),
    ) else {
        return;
    };
    let index = table.ensure_column(Column::computed(PE));
    for (row, (price, eps)) in table.rows_mut().iter_mut().zip(last.iter().zip(&eps)) {
        let pe = match (price, eps) {
            // Zero earnings give an absent ratio, not infinity.
            (Some(_), Some(e)) if *e == 0.0 => Value::Absent,
            (Some(p), Some(e)) => Value::Number(p / e),
            _ => Value::Absent,
        };
        row.set(index, pe);
    }
}

fn compute_industry(table: &mut Table, roles: &ColumnRoles) {
    let Some(group_index) = table.column_index(&roles.industry_group) else {
        return;
    };
    let labels: Vec<String> = table
        .rows()
        .iter()
        .map(|row| {
            row.get(group_index)
                .map(|v| industry_label(&v.normalized()))
                .unwrap_or_default()
        })
        .collect();
    let index = table.ensure_column(Column::computed(INDUSTRY));
    for (row, label) in table.rows_mut().iter_mut().zip(labels) {
        row.set(index, Value::Text(label));
    }
}

/// Resolve the leading alphanumeric token of an industry-group code,
/// zero-padding a lone digit, against the static map. Unknown codes
/// resolve to the empty string.
fn industry_label(code: &str) -> String {
    let normalized = normalize(code);
    if normalized.is_empty() {
        return String::new();
    }
    let token: String = normalized
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    let key = if token.is_empty() {
        normalized
    } else if token.len() == 1 && token.bytes().all(|b| b.is_ascii_digit()) {
        format!("0{token}")
    } else {
        token
    };
    INDUSTRY_MAP
        .get(key.as_str())
        .or_else(|| INDUSTRY_MAP.get(format!("0{key}").as_str()))
        .map(|label| label.to_string())
        .unwrap_or_default()
}

fn compute_queue_values(table: &mut Table, roles: &ColumnRoles) {
    let buy_price = numeric_column(table, &order_book_column(1, 4));
    let sell_price = numeric_column(table, &order_book_column(1, 5));
    let buy_volume = numeric_column(table, &order_book_column(1, 6));
    let sell_volume = numeric_column(table, &order_book_column(1, 7));
    let max_allowed = numeric_column(table, &roles.max_allowed_price);
    let min_allowed = numeric_column(table, &roles.min_allowed_price);

    let rows = table.row_count();
    let at = |column: &Option<Vec<Option<f64>>>, row: usize| -> Option<f64> {
        column.as_ref().and_then(|c| c.get(row).copied().flatten())
    };

    let buy_index = table.ensure_column(Column::computed(BUY_QUEUE));
    let sell_index = table.ensure_column(Column::computed(SELL_QUEUE));
    for row_idx in 0..rows {
        let buy = queue_value(
            at(&buy_price, row_idx),
            at(&max_allowed, row_idx),
            at(&buy_volume, row_idx),
        );
        let sell = queue_value(
            at(&sell_price, row_idx),
            at(&min_allowed, row_idx),
            at(&sell_volume, row_idx),
        );
        if let Some(row) = table.rows_mut().get_mut(row_idx) {
            row.set(buy_index, Value::Number(buy));
            row.set(sell_index, Value::Number(sell));
        }
    }
}

/// Queue value counts only while the level-1 price is pinned to the
/// allowed band edge; defaults to zero so downstream sums stay correct.
fn queue_value(price: Option<f64>, band: Option<f64>, volume: Option<f64>) -> f64 {
    match (price, band) {
        (Some(p), Some(b)) if p == b => volume.unwrap_or(0.0) * p,
        _ => 0.0,
    }
}
