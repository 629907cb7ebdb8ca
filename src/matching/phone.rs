// src/matching/phone.rs

use log::debug;
use phonenumber::country;
use phonenumber::Mode;

/// Canonical phone form: E.164 when the number parses as valid in
/// `default_region` (or carries its own country code), otherwise the bare digits.
pub fn normalize_phone(phone: &str, default_region: &str) -> String {
    let trimmed = phone.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let region = default_region
        .trim()
        .to_uppercase()
        .parse::<country::Id>()
        .ok();

    if let Some(e164) = parse_e164(trimmed, region) {
        return e164;
    }

    let digits_only: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits_only.is_empty() {
        debug!("Phone '{}' has no digits, normalized to empty", phone);
        return String::new();
    }
    // a digit string that parses is reported in E.164 so a second pass agrees
    parse_e164(&digits_only, region).unwrap_or(digits_only)
}

fn parse_e164(raw: &str, region: Option<country::Id>) -> Option<String> {
    let number = phonenumber::parse(region, raw).ok()?;
    if !phonenumber::is_valid(&number) {
        return None;
    }
    Some(number.format().mode(Mode::E164).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_valid_us_numbers_as_e164() {
        assert_eq!(normalize_phone("(415) 555-2671", "US"), "+14155552671");
        assert_eq!(normalize_phone("+1 415 555 2671", "US"), "+14155552671");
        assert_eq!(normalize_phone("415.555.2671", "US"), "+14155552671");
    }

    #[test]
    fn explicit_country_code_overrides_region() {
        assert_eq!(normalize_phone("+44 121 234 5678", "US"), "+441212345678");
    }

    #[test]
    fn unparseable_numbers_fall_back_to_digits() {
        assert_eq!(normalize_phone("ext 12-34", "US"), "1234");
        assert_eq!(normalize_phone("call me", "US"), "");
        assert_eq!(normalize_phone("", "US"), "");
    }

    #[test]
    fn unknown_region_still_normalizes() {
        assert_eq!(normalize_phone("+1 415 555 2671", "ZZ"), "+14155552671");
        assert_eq!(normalize_phone("12-34", "??"), "1234");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["(415) 555-2671", "+44 121 234 5678", "ext 12-34", "555", "call me", ""] {
            let once = normalize_phone(raw, "US");
            assert_eq!(normalize_phone(&once, "US"), once, "input {:?}", raw);
        }
    }
}
