//! Currency helpers shared by item, transaction and total extraction.

/// Parse the amount following the last `$` in `text`.
///
/// Thousands separators are ignored and trailing non-numeric text is
/// tolerated, so `"$1,234.50 USD"` reads as `1234.5`. Returns `None` when no
/// number follows the marker.
pub fn try_parse_dollar_amount(text: &str) -> Option<f64> {
    let tail = match text.rfind('$') {
        Some(idx) => &text[idx + 1..],
        None => text,
    };
    let cleaned: String = tail.trim().chars().filter(|c| *c != ',').collect();
    numeric_prefix(&cleaned)?.parse::<f64>().ok()
}

/// [`try_parse_dollar_amount`] with missing or malformed input read as `0`.
pub fn parse_dollar_amount(text: &str) -> f64 {
    try_parse_dollar_amount(text).unwrap_or(0.0)
}

/// Round to cents, half-up.
///
/// The value is nudged by one machine epsilon first so amounts such as
/// `1.005` that are stored just below the midpoint still round up.
pub fn round2(value: f64) -> f64 {
    ((value + f64::EPSILON) * 100.0 + 0.5).floor() / 100.0
}

/// Render an amount with exactly two decimal digits.
pub fn format_amount(value: f64) -> String {
    format!("{:.2}", round2(value))
}

fn numeric_prefix(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let mut digits = 0;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        digits += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        let mut frac_end = end + 1;
        let mut frac_digits = 0;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
            frac_digits += 1;
        }
        if frac_digits > 0 {
            end = frac_end;
            digits += frac_digits;
        }
    }
    if digits == 0 { None } else { Some(&s[..end]) }
}
