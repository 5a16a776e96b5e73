use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDate;

use crate::errors::DomainError;

pub const DEFAULT_DATE_PATTERNS: [&str; 5] =
    ["YYYY-MM-DD", "DD/MM/YYYY", "MM-DD-YYYY", "DD MMM YYYY", "MMM DD, YYYY"];

/// A date layout written with `YYYY`/`YY`/`MMM`/`MM`/`DD` tokens, or a raw
/// chrono format when the pattern starts with `%`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatePattern {
    source: String,
    chrono_format: String,
}

impl DatePattern {
    pub fn parse(pattern: &str) -> Result<Self, DomainError> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            return Err(invalid(pattern, "pattern must not be empty"));
        }

        let chrono_format =
            if trimmed.starts_with('%') { trimmed.to_string() } else { translate(trimmed)? };

        if StrftimeItems::new(&chrono_format).any(|item| matches!(item, Item::Error)) {
            return Err(invalid(pattern, "pattern contains an unsupported format specifier"));
        }

        // Time and offset specifiers cannot be rendered from a plain date.
        let mut rendered = String::new();
        if write!(rendered, "{}", NaiveDate::default().format(&chrono_format)).is_err() {
            return Err(invalid(pattern, "pattern must only use date fields"));
        }

        Ok(Self { source: trimmed.to_string(), chrono_format })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn chrono_format(&self) -> &str {
        &self.chrono_format
    }

    pub fn parse_date(&self, value: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(value, &self.chrono_format).ok()
    }

    pub fn format(&self, date: NaiveDate) -> String {
        date.format(&self.chrono_format).to_string()
    }
}

/// Tries each pattern in order; first match wins. Timestamps such as
/// `2024-03-01T10:00:00Z` or `Mar 05, 2024 10:00` are retried on their date
/// part, dropping trailing time components one at a time.
pub fn parse_date(value: &str, patterns: &[DatePattern]) -> Option<NaiveDate> {
    let value = value.trim();
    if let Some(date) = patterns.iter().find_map(|pattern| pattern.parse_date(value)) {
        return Some(date);
    }

    value
        .rmatch_indices(['T', ' '])
        .map(|(index, _)| value[..index].trim_end())
        .filter(|part| !part.is_empty())
        .find_map(|part| patterns.iter().find_map(|pattern| pattern.parse_date(part)))
}

fn translate(pattern: &str) -> Result<String, DomainError> {
    let mut output = String::with_capacity(pattern.len() + 4);
    let mut rest = pattern;
    let (mut year, mut month, mut day) = (false, false, false);

    while let Some(ch) = rest.chars().next() {
        let token = [("YYYY", "%Y"), ("YY", "%y"), ("MMM", "%b"), ("MM", "%m"), ("DD", "%d")]
            .into_iter()
            .find(|(token, _)| rest.starts_with(token));

        if let Some((token, spec)) = token {
            match token {
                "YYYY" | "YY" => year = true,
                "MMM" | "MM" => month = true,
                _ => day = true,
            }
            output.push_str(spec);
            rest = &rest[token.len()..];
            continue;
        }

        if ch.is_alphanumeric() {
            return Err(invalid(pattern, &format!("unexpected character `{ch}`")));
        }
        if ch == '%' {
            output.push_str("%%");
        } else {
            output.push(ch);
        }
        rest = &rest[ch.len_utf8()..];
    }

    if !(year && month && day) {
        return Err(invalid(pattern, "pattern must contain year, month and day tokens"));
    }

    Ok(output)
}

fn invalid(pattern: &str, reason: &str) -> DomainError {
    DomainError::InvalidDatePattern { pattern: pattern.to_string(), reason: reason.to_string() }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use proptest::prelude::*;

    use super::{parse_date, DatePattern, DEFAULT_DATE_PATTERNS};

    fn defaults() -> Vec<DatePattern> {
        DEFAULT_DATE_PATTERNS
            .iter()
            .map(|pattern| DatePattern::parse(pattern).expect("default pattern"))
            .collect()
    }

    #[test]
    fn translates_tokens_to_chrono_format() {
        let pattern = DatePattern::parse("DD/MM/YYYY").expect("pattern");
        assert_eq!(pattern.chrono_format(), "%d/%m/%Y");
        assert_eq!(DatePattern::parse("MMM DD, YYYY").expect("pattern").chrono_format(), "%b %d, %Y");
        assert_eq!(DatePattern::parse("%Y%m%d").expect("raw").chrono_format(), "%Y%m%d");
    }

    #[test]
    fn rejects_incomplete_or_unknown_patterns() {
        assert!(DatePattern::parse("MM/YYYY").is_err());
        assert!(DatePattern::parse("DD/MM/YYYY hh").is_err());
        assert!(DatePattern::parse("").is_err());
        assert!(DatePattern::parse("%Q").is_err());
    }

    #[test]
    fn rejects_patterns_with_time_fields() {
        assert!(DatePattern::parse("%Y-%m-%d %H:%M").is_err());
        assert!(DatePattern::parse("%Y-%m-%dT%H:%M:%S%z").is_err());
        assert!(DatePattern::parse("%d.%m.%Y").is_ok());
    }

    #[test]
    fn first_matching_pattern_wins() {
        let day_first = vec![
            DatePattern::parse("DD-MM-YYYY").expect("pattern"),
            DatePattern::parse("MM-DD-YYYY").expect("pattern"),
        ];
        assert_eq!(parse_date("03-04-2024", &day_first), NaiveDate::from_ymd_opt(2024, 4, 3));

        let month_first: Vec<_> = day_first.into_iter().rev().collect();
        assert_eq!(parse_date("03-04-2024", &month_first), NaiveDate::from_ymd_opt(2024, 3, 4));
    }

    #[test]
    fn falls_through_to_later_patterns() {
        assert_eq!(parse_date("12-31-2023", &defaults()), NaiveDate::from_ymd_opt(2023, 12, 31));
        assert_eq!(parse_date("31/12/2023", &defaults()), NaiveDate::from_ymd_opt(2023, 12, 31));
        assert_eq!(parse_date("5 Mar 2024", &defaults()), NaiveDate::from_ymd_opt(2024, 3, 5));
    }

    #[test]
    fn timestamps_use_their_date_part() {
        assert_eq!(
            parse_date("2024-03-01T10:15:00Z", &defaults()),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        assert_eq!(parse_date("2024-03-01 10:15", &defaults()), NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(
            parse_date("Mar 05, 2024 10:00", &defaults()),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
        assert_eq!(
            parse_date("5 Mar 2024 10:00:00 +0000", &defaults()),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
    }

    #[test]
    fn garbage_does_not_parse() {
        assert_eq!(parse_date("next tuesday", &defaults()), None);
        assert_eq!(parse_date("2024-13-40", &defaults()), None);
    }

    proptest! {
        #[test]
        fn every_default_pattern_round_trips(days in 0i64..40_000, index in 0usize..DEFAULT_DATE_PATTERNS.len()) {
            let base = NaiveDate::from_ymd_opt(1950, 1, 1).expect("base date");
            let date = base + chrono::Duration::days(days);
            let pattern = DatePattern::parse(DEFAULT_DATE_PATTERNS[index]).expect("pattern");

            let rendered = pattern.format(date);
            prop_assert_eq!(parse_date(&rendered, std::slice::from_ref(&pattern)), Some(date));
        }
    }
}
