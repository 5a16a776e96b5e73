use std::str::FromStr;

use rust_decimal::Decimal;

pub const DEFAULT_CURRENCY_SYMBOLS: &str = "$€£₹,";

/// Parses a currency string. Configured symbols and all whitespace are
/// stripped; `(200)` is read as `-200`.
pub fn parse_amount(value: &str, strip: &[char]) -> Option<Decimal> {
    let cleaned: String =
        value.chars().filter(|ch| !ch.is_whitespace() && !strip.contains(ch)).collect();

    let (negative, body) = match cleaned.strip_prefix('(').and_then(|rest| rest.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, cleaned.as_str()),
    };

    if body.is_empty() || (negative && body.starts_with('-')) {
        return None;
    }

    let amount = parse_decimal(body)?;
    Some(if negative { -amount } else { amount })
}

pub(crate) fn parse_decimal(value: &str) -> Option<Decimal> {
    Decimal::from_str(value).ok().or_else(|| Decimal::from_scientific(value).ok())
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{parse_amount, DEFAULT_CURRENCY_SYMBOLS};

    fn strip() -> Vec<char> {
        DEFAULT_CURRENCY_SYMBOLS.chars().collect()
    }

    #[test]
    fn strips_symbols_and_thousands_separators() {
        assert_eq!(parse_amount("$1,234.50", &strip()), Some(Decimal::new(123450, 2)));
        assert_eq!(parse_amount(" € 2 500 ", &strip()), Some(Decimal::new(2500, 0)));
        assert_eq!(parse_amount("₹1,00,000", &strip()), Some(Decimal::new(100_000, 0)));
    }

    #[test]
    fn parentheses_mean_negative() {
        assert_eq!(parse_amount("(200)", &strip()), Some(Decimal::new(-200, 0)));
        assert_eq!(parse_amount("($1,200.75)", &strip()), Some(Decimal::new(-120075, 2)));
        assert_eq!(parse_amount("(-5)", &strip()), None);
    }

    #[test]
    fn leading_minus_and_scientific_notation() {
        assert_eq!(parse_amount("-$40", &strip()), Some(Decimal::new(-40, 0)));
        assert_eq!(parse_amount("1.5e3", &strip()), Some(Decimal::new(1500, 0)));
    }

    #[test]
    fn rejects_non_numeric_text() {
        assert_eq!(parse_amount("TBD", &strip()), None);
        assert_eq!(parse_amount("$", &strip()), None);
        assert_eq!(parse_amount("12 apples", &strip()), None);
    }

    #[test]
    fn only_configured_symbols_are_stripped() {
        assert_eq!(parse_amount("$10", &[]), None);
        assert_eq!(parse_amount("USD10", &['U', 'S', 'D']), Some(Decimal::new(10, 0)));
    }
}
