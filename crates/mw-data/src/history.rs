//! Per-symbol client-type history
//!
//! The client-type endpoint delivers daily retail/institutional
//! (حقیقی/حقوقی) buy and sell figures per instrument; the closing-price
//! endpoint the daily prices. [`merge_client_and_price`] folds the two
//! histories into one per-symbol table keyed on the record date, with a
//! positional fallback when a price row's date cannot be resolved, and
//! orders the result newest-first. A missing price day leaves the price
//! cells empty rather than dropping the client-type row.

use std::collections::VecDeque;

use ahash::AHashMap;
use chrono::{DateTime, Datelike, NaiveDate};
use serde::Deserialize;

use mw_core::{Column, Row, Table, Value};

use crate::DataError;

/// Client-type history endpoint, `{inscode}` substituted per symbol.
pub const CLIENT_URL_TEMPLATE: &str =
    "https://cdn.tsetmc.com/api/ClientType/GetClientTypeHistory/{inscode}";
/// Daily closing-price endpoint, `{inscode}` substituted per symbol.
pub const PRICE_URL_TEMPLATE: &str =
    "https://cdn.tsetmc.com/api/ClosingPrice/GetChartData/{inscode}/D";

/// One day of client-type figures, in the endpoint's field names.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientTypeRecord {
    #[serde(rename = "recDate")]
    pub rec_date: Option<i64>,
    #[serde(rename = "insCode")]
    pub ins_code: String,
    #[serde(rename = "buy_I_Volume")]
    pub buy_i_volume: Option<f64>,
    #[serde(rename = "buy_N_Volume")]
    pub buy_n_volume: Option<f64>,
    #[serde(rename = "buy_I_Value")]
    pub buy_i_value: Option<f64>,
    #[serde(rename = "buy_N_Value")]
    pub buy_n_value: Option<f64>,
    #[serde(rename = "buy_N_Count")]
    pub buy_n_count: Option<f64>,
    #[serde(rename = "sell_I_Volume")]
    pub sell_i_volume: Option<f64>,
    #[serde(rename = "buy_I_Count")]
    pub buy_i_count: Option<f64>,
    #[serde(rename = "sell_N_Volume")]
    pub sell_n_volume: Option<f64>,
    #[serde(rename = "sell_I_Value")]
    pub sell_i_value: Option<f64>,
    #[serde(rename = "sell_N_Value")]
    pub sell_n_value: Option<f64>,
    #[serde(rename = "sell_N_Count")]
    pub sell_n_count: Option<f64>,
    #[serde(rename = "sell_I_Count")]
    pub sell_i_count: Option<f64>,
}

/// One day of closing-price figures.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PriceRecord {
    #[serde(rename = "dEven")]
    pub d_even: Option<f64>,
    #[serde(rename = "priceFirst")]
    pub first: Option<f64>,
    #[serde(rename = "pDrCotVal")]
    pub closing: Option<f64>,
    #[serde(rename = "priceMin")]
    pub min: Option<f64>,
    #[serde(rename = "priceMax")]
    pub max: Option<f64>,
    #[serde(rename = "qTotTran5J")]
    pub volume: Option<f64>,
}

/// Parse a client-type history payload: either the `clientType`
/// envelope or a bare array.
pub fn parse_client_history(json: &str) -> Result<Vec<ClientTypeRecord>, DataError> {
    parse_history(json, "clientType")
}

/// Parse a closing-price history payload: either the
/// `closingPriceChartData` envelope or a bare array.
pub fn parse_price_history(json: &str) -> Result<Vec<PriceRecord>, DataError> {
    parse_history(json, "closingPriceChartData")
}

fn parse_history<T>(json: &str, envelope: &str) -> Result<Vec<T>, DataError>
where
    T: serde::de::DeserializeOwned,
{
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| DataError::Parse(e.to_string()))?;
    let list = match value {
        serde_json::Value::Array(_) => value,
        serde_json::Value::Object(map) => map
            .get(envelope)
            .cloned()
            // Unknown envelope: take the first array-valued member.
            .or_else(|| map.values().find(|v| v.is_array()).cloned())
            .unwrap_or_else(|| serde_json::Value::Array(Vec::new())),
        _ => {
            return Err(DataError::Parse(format!(
                "unexpected {envelope} payload shape"
            )))
        }
    };
    serde_json::from_value(list).map_err(|e| DataError::Parse(e.to_string()))
}

/// Client-type columns in export order; `recDate` and `insCode` have
/// their own slots.
const CLIENT_COLUMNS: [&str; 12] = [
    "buy_I_Volume",
    "buy_N_Volume",
    "buy_I_Value",
    "buy_N_Value",
    "buy_N_Count",
    "sell_I_Volume",
    "buy_I_Count",
    "sell_N_Volume",
    "sell_I_Value",
    "sell_N_Value",
    "sell_N_Count",
    "sell_I_Count",
];

/// Merge the two histories into one per-symbol table.
///
/// The price list arrives oldest-first and is reversed so the newest
/// row pairs with the newest client-type row when the date lookup
/// misses. Each resolved date consumes its price row at most once.
pub fn merge_client_and_price(
    client: &[ClientTypeRecord],
    price: &[PriceRecord],
    symbol: &str,
) -> Table {
    let mut table = Table::new();
    for key in ["ticker", "pf", "pl", "pmin", "pmax", "vol", "recDate", "jalalidate"]
        .into_iter()
        .chain(CLIENT_COLUMNS)
        .chain(["insCode", "price_date_iso", "price_date_jalali"])
    {
        // Keys are distinct literals.
        let _ = table.add_column(Column::base(key));
    }

    let price_rev: Vec<&PriceRecord> = price.iter().rev().collect();
    let mut by_date: AHashMap<String, VecDeque<usize>> = AHashMap::new();
    for (i, p) in price_rev.iter().enumerate() {
        if let Some(date) = p.d_even.and_then(timestamp_to_date) {
            by_date.entry(day_key(date)).or_default().push_back(i);
        }
    }

    let mut rows: Vec<(Option<i64>, Row)> = Vec::with_capacity(client.len());
    for (idx, record) in client.iter().enumerate() {
        let rec_date = record.rec_date.and_then(rec_date_to_date);
        let rec_iso = rec_date.map(iso).unwrap_or_default();
        let rec_jalali = rec_date.map(jalali_compact).unwrap_or_default();

        let matched = rec_date
            .and_then(|d| by_date.get_mut(&day_key(d)))
            .and_then(VecDeque::pop_front)
            .map(|i| price_rev[i])
            .or_else(|| price_rev.get(idx).copied());

        let mut row = Row::with_capacity(23);
        row.push(Value::Text(symbol.to_string()));
        match matched {
            Some(p) => {
                row.push(Value::from(p.first));
                row.push(Value::from(p.closing));
                row.push(Value::from(p.min));
                row.push(Value::from(p.max));
                row.push(Value::from(p.volume));
            }
            None => {
                for _ in 0..5 {
                    row.push(Value::Text(String::new()));
                }
            }
        }
        row.push(match record.rec_date {
            Some(r) => Value::Number(r as f64),
            None => Value::Text(String::new()),
        });
        row.push(Value::Text(rec_jalali.clone()));
        for figure in [
            record.buy_i_volume,
            record.buy_n_volume,
            record.buy_i_value,
            record.buy_n_value,
            record.buy_n_count,
            record.sell_i_volume,
            record.buy_i_count,
            record.sell_n_volume,
            record.sell_i_value,
            record.sell_n_value,
            record.sell_n_count,
            record.sell_i_count,
        ] {
            row.push(Value::from(figure));
        }
        row.push(Value::Text(record.ins_code.clone()));
        // Price-date columns fall back to the record date when the
        // price row carries no resolvable date of its own.
        let (price_iso, price_jalali) = match matched.and_then(|p| p.d_even.and_then(timestamp_to_date))
        {
            Some(date) => (iso(date), jalali_compact(date)),
            None => (rec_iso, rec_jalali),
        };
        row.push(Value::Text(price_iso));
        row.push(Value::Text(price_jalali));
        rows.push((record.rec_date, row));
    }

    // Newest first; rows without a record date sink to the bottom.
    rows.sort_by(|a, b| match (a.0, b.0) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    for (_, row) in rows {
        // Width matches the column set by construction.
        let _ = table.push_row(row);
    }
    table
}

/// `recDate` is an eight-digit YYYYMMDD integer.
fn rec_date_to_date(rec: i64) -> Option<NaiveDate> {
    let s = rec.to_string();
    if s.len() != 8 {
        return None;
    }
    let year = s[0..4].parse().ok()?;
    let month = s[4..6].parse().ok()?;
    let day = s[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// `dEven` arrives as a unix timestamp; milliseconds are tried before
/// seconds, accepting whichever lands in a plausible year.
fn timestamp_to_date(value: f64) -> Option<NaiveDate> {
    for parsed in [
        DateTime::from_timestamp_millis(value as i64),
        DateTime::from_timestamp(value as i64, 0),
    ] {
        if let Some(dt) = parsed {
            let date = dt.date_naive();
            if (1970..=2100).contains(&date.year()) {
                return Some(date);
            }
        }
    }
    None
}

fn day_key(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Compact Jalali date string (YYYYMMDD).
fn jalali_compact(date: NaiveDate) -> String {
    let (jy, jm, jd) = gregorian_to_jalali(date.year(), date.month() as i32, date.day() as i32);
    format!("{jy:04}{jm:02}{jd:02}")
}

fn gregorian_to_jalali(year: i32, month: i32, day: i32) -> (i32, i32, i32) {
    const G_MONTHS: [i32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    const J_MONTHS: [i32; 12] = [31, 31, 31, 31, 31, 31, 30, 30, 30, 30, 30, 29];

    let gy = year - 1600;
    let gm = month - 1;
    let gd = day - 1;
    let mut g_day_no = 365 * gy + (gy + 3) / 4 - (gy + 99) / 100 + (gy + 399) / 400;
    for len in &G_MONTHS[..gm as usize] {
        g_day_no += len;
    }
    if gm > 1 && ((year % 4 == 0 && year % 100 != 0) || year % 400 == 0) {
        g_day_no += 1;
    }
    g_day_no += gd;

    let mut j_day_no = g_day_no - 79;
    let j_np = j_day_no / 12053;
    j_day_no %= 12053;
    let mut jy = 979 + 33 * j_np + 4 * (j_day_no / 1461);
    j_day_no %= 1461;
    if j_day_no >= 366 {
        jy += (j_day_no - 1) / 365;
        j_day_no = (j_day_no - 1) % 365;
    }
    let mut jm = 0;
    let mut jd = 0;
    for (i, len) in J_MONTHS.iter().enumerate() {
        if j_day_no < *len {
            jm = i as i32 + 1;
            jd = j_day_no + 1;
            break;
        }
        j_day_no -= len;
    }
    (jy, jm, jd)
}
