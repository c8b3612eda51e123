//! Number coercion and currency formatting.
//!
//! Form inputs arrive as loosely-typed text. The core never rejects a bad
//! number; it degrades to zero, the same way the entry forms always have.

/// Replaces NaN and infinities with zero.
#[must_use]
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Parses form text as a number, yielding zero for blank or malformed input.
#[must_use]
pub fn coerce(input: &str) -> f64 {
    input.trim().parse::<f64>().map_or(0.0, finite_or_zero)
}

/// Formats a currency amount as `1,234.56`: thousands separators and exactly
/// two decimals. Non-finite values format as an empty string.
#[must_use]
pub fn format_currency(amount: f64) -> String {
    if !amount.is_finite() {
        return String::new();
    }

    // Cast safety: amounts are far below 2^53 cents for any vehicle or payroll
    // figure, and rounding to whole cents is the intended behavior.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let cents = (amount.abs() * 100.0).round() as u64;
    let dollars = (cents / 100).to_string();
    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
    for (i, digit) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}{grouped}.{:02}", cents % 100)
}

/// Like [`format_currency`] but blank for zero, for fields that should stay
/// empty when there is nothing to show.
#[must_use]
pub fn format_nonzero(amount: f64) -> String {
    if amount == 0.0 {
        String::new()
    } else {
        format_currency(amount)
    }
}

/// Formats an amount with a dollar sign for terminal output, `$1,234.56`.
#[must_use]
pub fn format_money(amount: f64) -> String {
    let formatted = format_currency(amount);
    if formatted.is_empty() {
        return "—".to_string();
    }
    formatted
        .strip_prefix('-')
        .map_or_else(|| format!("${formatted}"), |rest| format!("-${rest}"))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_coerce_degrades_to_zero() {
        assert_eq!(coerce("12.5"), 12.5);
        assert_eq!(coerce("  40 "), 40.0);
        assert_eq!(coerce(""), 0.0);
        assert_eq!(coerce("abc"), 0.0);
        assert_eq!(coerce("NaN"), 0.0);
        assert_eq!(coerce("inf"), 0.0);
    }

    #[test]
    fn test_format_currency_groups_thousands() {
        assert_eq!(format_currency(10_000.0), "10,000.00");
        assert_eq!(format_currency(10_337.2), "10,337.20");
        assert_eq!(format_currency(1_234_567.891), "1,234,567.89");
        assert_eq!(format_currency(999.999), "1,000.00");
        assert_eq!(format_currency(0.0), "0.00");
        assert_eq!(format_currency(47.2), "47.20");
    }

    #[test]
    fn test_format_currency_negative_and_invalid() {
        assert_eq!(format_currency(-1_100.5), "-1,100.50");
        assert_eq!(format_currency(-0.001), "0.00");
        assert_eq!(format_currency(f64::NAN), "");
        assert_eq!(format_currency(f64::INFINITY), "");
    }

    #[test]
    fn test_format_nonzero_and_money() {
        assert_eq!(format_nonzero(0.0), "");
        assert_eq!(format_nonzero(290.0), "290.00");
        assert_eq!(format_money(1_500.0), "$1,500.00");
        assert_eq!(format_money(-25.5), "-$25.50");
        assert_eq!(format_money(f64::NAN), "—");
    }
}
