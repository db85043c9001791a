// Utility helpers for parsing, grouping and number formatting.
//
// Loader and aggregator code lean on these so they can stay focused on the
// fleet semantics rather than on string cleanup or float ordering.
use chrono::{NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// Shown wherever a metric is undefined (empty view, zero denominator).
pub const NO_DATA: &str = "no data";

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in CSV exports.
///
/// - Trims whitespace.
/// - Strips thousands separators like `","` before parsing.
/// - Accepts exponent notation (`1e-7`), which is how very small or very
///   large floats are written back out.
/// - Returns `None` for anything that cannot be safely parsed, including
///   `NaN` and infinities.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    let s = s.replace(',', "");
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Like [`parse_f64_safe`], but only for quantities that cannot go below
/// zero (distances, costs, hours, liters).
pub fn parse_non_negative_safe(s: Option<&str>) -> Option<f64> {
    parse_f64_safe(s).filter(|v| *v >= 0.0)
}

/// Parse a non-negative whole count. Spreadsheet exports sometimes write
/// integers as `2.0`, so those are accepted too.
pub fn parse_count_safe(s: Option<&str>) -> Option<u32> {
    let s = s?.trim();
    if let Ok(n) = s.parse::<u32>() {
        return Some(n);
    }
    let f = parse_f64_safe(Some(s))?;
    if f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64 {
        Some(f as u32)
    } else {
        None
    }
}

/// Dates are `YYYY-MM-DD`; a trailing `HH:MM:SS` is tolerated and dropped.
pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .ok()
}

/// Required text field: trimmed, and must not be empty.
pub fn parse_text_safe(s: Option<&str>) -> Option<String> {
    let s = s?.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Arithmetic mean, `None` for an empty input.
pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// `numerator / denominator` when the denominator is positive, otherwise 0.
pub fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// Sum `value` per `key`. Keys come back sorted.
pub fn sum_by<T, K, FK, FV>(items: impl IntoIterator<Item = T>, key: FK, value: FV) -> BTreeMap<K, f64>
where
    K: Ord,
    FK: Fn(&T) -> K,
    FV: Fn(&T) -> f64,
{
    let mut map = BTreeMap::new();
    for item in items {
        *map.entry(key(&item)).or_insert(0.0) += value(&item);
    }
    map
}

/// Accumulators keyed by group, remembering the order in which each key was
/// first seen.
#[derive(Debug)]
pub struct OrderedGroups<K, A> {
    index: HashMap<K, usize>,
    groups: Vec<(K, A)>,
}

impl<K, A> OrderedGroups<K, A>
where
    K: Hash + Eq + Clone,
    A: Default,
{
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            groups: Vec::new(),
        }
    }

    pub fn entry(&mut self, key: K) -> &mut A {
        let idx = match self.index.get(&key) {
            Some(&i) => i,
            None => {
                let i = self.groups.len();
                self.index.insert(key.clone(), i);
                self.groups.push((key, A::default()));
                i
            }
        };
        &mut self.groups[idx].1
    }

    pub fn into_vec(self) -> Vec<(K, A)> {
        self.groups
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Stable descending sort on a float key; ties keep their current order.
pub fn sort_desc_by<T>(rows: &mut [T], key: impl Fn(&T) -> f64) {
    rows.sort_by(|a, b| cmp_f64(key(b), key(a)));
}

/// Stable ascending sort on a float key; ties keep their current order.
pub fn sort_asc_by<T>(rows: &mut [T], key: impl Fn(&T) -> f64) {
    rows.sort_by(|a, b| cmp_f64(key(a), key(b)));
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals plus locale-aware thousands separators
    // (e.g. `1,234,567.89`).
    if !n.is_finite() {
        return NO_DATA.to_string();
    }
    let s = format!("{:.*}", decimals, n.abs());
    // No sign on values that round to zero.
    let neg = n < 0.0 && s.chars().any(|c| matches!(c, '1'..='9'));
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        res.push('.');
        res.push_str(frac);
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

pub fn format_currency(symbol: &str, amount: f64) -> String {
    format!("{} {}", symbol, format_number(amount, 2))
}

/// Format an optional metric, rendering `None` as [`NO_DATA`].
pub fn format_optional(value: Option<f64>, decimals: usize, suffix: &str) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{}{}", format_number(v, decimals), suffix),
        _ => NO_DATA.to_string(),
    }
}

// Table cell renderers used by the `Tabled` derives in `types`.

pub fn display_0dp(v: &f64) -> String {
    format_number(*v, 0)
}

pub fn display_2dp(v: &f64) -> String {
    format_number(*v, 2)
}

pub fn display_opt_2dp(v: &Option<f64>) -> String {
    format_optional(*v, 2, "")
}
