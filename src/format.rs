//! Number formatting for narrative text.

/// Formats `value` with comma thousands separators and `decimals`
/// fractional digits.
///
/// ```
/// use u_bizlens::format::format_number;
///
/// assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
/// assert_eq!(format_number(-9876.4, 0), "-9,876");
/// assert_eq!(format_number(300.0, 0), "300");
/// ```
pub fn format_number(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let fixed = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };
    let mut out = String::with_capacity(fixed.len() + int_part.len() / 3 + 1);
    // "-0" after rounding is printed as "0"
    if value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part));
    if let Some(f) = frac_part {
        out.push('.');
        out.push_str(f);
    }
    out
}

/// Formats a count with comma thousands separators.
pub fn format_count(n: usize) -> String {
    group_thousands(&n.to_string())
}

/// Percentage of `part` in `whole`, rounded to one decimal (0 when `whole` is 0).
pub fn percent_1dp(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 1000.0).round() / 10.0
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
