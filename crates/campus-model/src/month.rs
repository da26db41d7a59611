// Month normalization for attendance queries.
//
// The portal expects a numeric month; callers pass "Oct", "october", or "10".

use chrono::Month;

/// Month used when the caller's value cannot be interpreted.
pub const DEFAULT_MONTH: Month = Month::October;

/// Interpret a month given as a number (1–12), a full name, or a
/// three-letter abbreviation.
pub fn parse_month(input: &str) -> Option<Month> {
    let input = input.trim();
    if let Ok(n) = input.parse::<u8>() {
        return Month::try_from(n).ok();
    }
    input.parse::<Month>().ok()
}

/// Numeric month (1–12) for the portal form, falling back to `DEFAULT_MONTH`.
pub fn month_number_or_default(input: &str) -> u32 {
    parse_month(input)
        .unwrap_or(DEFAULT_MONTH)
        .number_from_month()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_month_forms() {
        assert_eq!(parse_month("Oct"), Some(Month::October));
        assert_eq!(parse_month("october"), Some(Month::October));
        assert_eq!(parse_month("10"), Some(Month::October));
        assert_eq!(parse_month(" 3 "), Some(Month::March));
        assert_eq!(parse_month("13"), None);
        assert_eq!(parse_month("0"), None);
        assert_eq!(parse_month("Smarch"), None);
    }

    #[test]
    fn test_month_default() {
        assert_eq!(month_number_or_default("Jan"), 1);
        assert_eq!(month_number_or_default("garbage"), 10);
    }
}
