use std::fmt;

/// Prices are integer cents so rental totals stay exact.
/// 1 unit = 100 cents, so a daily rate of 50.00 is 5000 cents.
pub type Cents = i64;

/// Format cents as a decimal amount.
/// Example: 5000 -> "50.00", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.abs();
    format!("{}{}.{:02}", sign, abs_cents / 100, abs_cents % 100)
}

/// Parse a non-negative price such as "50", "50.0" or "49.99" into cents.
/// Digits past the second decimal place are truncated.
pub fn parse_price(input: &str) -> Result<Cents, ParsePriceError> {
    let input = input.trim();
    if input.starts_with('-') {
        return Err(ParsePriceError::Negative);
    }

    let (units_str, decimals_str) = input.split_once('.').unwrap_or((input, ""));
    if units_str.is_empty() && decimals_str.is_empty() {
        return Err(ParsePriceError::InvalidFormat);
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        parse_digits(units_str)?
    };

    if !decimals_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParsePriceError::InvalidFormat);
    }
    let decimal_cents = match decimals_str.len() {
        0 => 0,
        1 => parse_digits(decimals_str)? * 10,
        _ => parse_digits(&decimals_str[..2])?,
    };

    units
        .checked_mul(100)
        .and_then(|c| c.checked_add(decimal_cents))
        .ok_or(ParsePriceError::TooLarge)
}

fn parse_digits(s: &str) -> Result<i64, ParsePriceError> {
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParsePriceError::InvalidFormat);
    }
    s.parse().map_err(|_| ParsePriceError::TooLarge)
}

/// Total charge for a rental: daily rate times number of days.
/// Returns `None` on overflow.
pub fn rental_total(price_per_day: Cents, days: u32) -> Option<Cents> {
    price_per_day.checked_mul(i64::from(days))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsePriceError {
    InvalidFormat,
    Negative,
    TooLarge,
}

impl fmt::Display for ParsePriceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParsePriceError::InvalidFormat => write!(f, "invalid price format"),
            ParsePriceError::Negative => write!(f, "price cannot be negative"),
            ParsePriceError::TooLarge => write!(f, "price is too large"),
        }
    }
}

impl std::error::Error for ParsePriceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(15000), "150.00");
        assert_eq!(format_cents(1999), "19.99");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(-250), "-2.50");
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("50"), Ok(5000));
        assert_eq!(parse_price(" 50.00 "), Ok(5000));
        assert_eq!(parse_price("49.9"), Ok(4990));
        assert_eq!(parse_price(".75"), Ok(75));
        assert_eq!(parse_price("10.129"), Ok(1012));
    }

    #[test]
    fn test_parse_price_rejects_garbage() {
        assert_eq!(parse_price("abc"), Err(ParsePriceError::InvalidFormat));
        assert_eq!(parse_price("1.2.3"), Err(ParsePriceError::InvalidFormat));
        assert_eq!(parse_price("."), Err(ParsePriceError::InvalidFormat));
        assert_eq!(parse_price("+5"), Err(ParsePriceError::InvalidFormat));
        assert_eq!(parse_price("-5"), Err(ParsePriceError::Negative));
    }

    #[test]
    fn test_rental_total() {
        assert_eq!(rental_total(5000, 3), Some(15000));
        assert_eq!(rental_total(5000, 0), Some(0));
        assert_eq!(rental_total(i64::MAX, 2), None);
    }
}
