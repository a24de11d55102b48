//! Normalization and syntactic validation of contact numbers.

/// Calling code substituted for a national trunk prefix (Philippines).
pub const DEFAULT_COUNTRY_CODE: &str = "+63";

/// Shortest string accepted as an international number, `+` included.
pub const MIN_NUMBER_LEN: usize = 10;

/// Convert a national number into international form using [`DEFAULT_COUNTRY_CODE`].
///
/// `"0998150000"` becomes `"+63998150000"`. Anything not starting with `0`
/// is assumed to be E.164 already and returned unchanged.
#[must_use]
pub fn format_phone_number(raw: &str) -> String {
    format_with_country_code(raw, DEFAULT_COUNTRY_CODE)
}

/// Replace a leading `0` with `country_code`.
#[must_use]
pub fn format_with_country_code(raw: &str, country_code: &str) -> String {
    match raw.strip_prefix('0') {
        Some(national) => format!("{country_code}{national}"),
        None => raw.to_owned(),
    }
}

/// Purely syntactic check: non-empty, starts with `+`, at least [`MIN_NUMBER_LEN`] characters.
///
/// Length is counted in Unicode scalar values. Stored numbers are ASCII, where
/// that equals both the byte and the UTF-16 length.
#[must_use]
pub fn is_valid_phone_number(number: &str) -> bool {
    number.starts_with('+') && number.chars().count() >= MIN_NUMBER_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn national_numbers_get_country_code() {
        assert_eq!(format_phone_number("0998150000"), "+63998150000");
        assert_eq!(format_phone_number("09981500001"), "+639981500001");
    }

    #[test]
    fn international_numbers_are_untouched() {
        assert_eq!(format_phone_number("+639981500001"), "+639981500001");
        assert_eq!(format_phone_number("998150000"), "998150000");
        assert_eq!(format_phone_number(""), "");
    }

    #[test]
    fn only_the_first_zero_is_replaced() {
        assert_eq!(format_with_country_code("00123", "+1"), "+10123");
    }

    #[test]
    fn validation_rules() {
        assert!(is_valid_phone_number("+639981500001"));
        assert!(is_valid_phone_number("+123456789"));
        assert!(!is_valid_phone_number("0998150000"));
        assert!(!is_valid_phone_number(""));
        assert!(!is_valid_phone_number("+123"));
        assert!(!is_valid_phone_number("+12345678"));
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        // Fullwidth digits take three bytes each.
        assert!(!is_valid_phone_number("+６３９９８"));
        assert!(is_valid_phone_number("+６３９９８１５０００"));
    }
}
