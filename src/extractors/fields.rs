//! Parsers for free-text field values

use std::sync::LazyLock;

use regex::Regex;

static CURRENCY_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:₹|Rs\.?|INR)\s*(\d[\d,]*(?:\.\d+)?)").expect("valid regex")
});
static DECIMAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("valid regex"));
static GROUPED_INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d[\d,]*").expect("valid regex"));

/// Numeric value of the first currency amount in `text`, or `0.0`.
///
/// Only the first matched token is used; grouping commas are stripped.
pub fn parse_price(text: &str) -> f64 {
    CURRENCY_AMOUNT
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().replace(',', "").parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
        .unwrap_or(0.0)
}

/// First decimal number, e.g. `4.3` from `"4.3 out of 5 stars"`
pub fn parse_rating(text: &str) -> Option<f64> {
    DECIMAL
        .find(text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// First integer with optional grouping commas, e.g. `1234` from `"(1,234)"`
pub fn parse_count(text: &str) -> Option<u64> {
    GROUPED_INTEGER
        .find(text)
        .and_then(|m| m.as_str().replace(',', "").parse::<u64>().ok())
}

/// Render an amount the way retailers print it: no decimals for whole numbers
pub fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("₹1,299.00"), 1299.0);
        assert_eq!(parse_price("₹ 45"), 45.0);
        assert_eq!(parse_price("MRP Rs. 120.5 only"), 120.5);
        assert_eq!(parse_price("₹30*MRP₹45Save 33%"), 30.0);
        assert_eq!(parse_price("Price not available"), 0.0);
        assert_eq!(parse_price("₹0"), 0.0);
        assert_eq!(parse_price("120"), 0.0);
    }

    #[test]
    fn test_parse_rating_and_count() {
        assert_eq!(parse_rating("4.3 out of 5 stars"), Some(4.3));
        assert_eq!(parse_rating("Rated 5"), Some(5.0));
        assert_eq!(parse_rating("no rating"), None);
        assert_eq!(parse_count("(1,234)"), Some(1234));
        assert_eq!(parse_count("87 ratings"), Some(87));
        assert_eq!(parse_count("none"), None);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(30.0), "30");
        assert_eq!(format_amount(30.5), "30.5");
    }
}
