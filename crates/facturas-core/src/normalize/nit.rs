//! NIT (Colombian tax identification number) cleaning and check digit.

use crate::error::ExtractionError;
use crate::models::RawValue;

/// DIAN weights, right-aligned to the number being checked.
const NIT_WEIGHTS: [u32; 15] = [71, 67, 59, 53, 47, 43, 41, 37, 29, 23, 19, 17, 13, 7, 3];

/// Sentinel stored when the check digit cannot be computed.
pub const UNKNOWN_CHECK_DIGIT: &str = "?";

/// Strip thousand-separator dots and spaces, keeping hyphens.
///
/// "900.123.456-1" becomes "900123456-1".
pub fn clean_identifier(raw: Option<&RawValue>) -> String {
    match raw {
        None => String::new(),
        Some(value) => value
            .as_text()
            .chars()
            .filter(|c| *c != '.' && !c.is_whitespace())
            .collect(),
    }
}

/// Split a cleaned identifier into its number and the check digit written in
/// the source.
///
/// Only an explicit hyphen separates a check digit; "9001234561" is never split.
pub fn split_identifier(clean: &str) -> (String, Option<String>) {
    match (clean.split_once('-'), clean.rsplit_once('-')) {
        (Some((number, _)), Some((_, dv))) => {
            let dv = (!dv.is_empty()).then(|| dv.to_string());
            (number.to_string(), dv)
        }
        _ => (clean.to_string(), None),
    }
}

/// Compute the DIAN modulus-11 check digit of a NIT number.
pub fn check_digit(number: &str) -> Result<u8, ExtractionError> {
    if number.is_empty()
        || number.len() > NIT_WEIGHTS.len()
        || !number.chars().all(|c| c.is_ascii_digit())
    {
        return Err(ExtractionError::InvalidIdentifier(number.to_string()));
    }

    let weights = &NIT_WEIGHTS[NIT_WEIGHTS.len() - number.len()..];
    let total: u32 = number
        .chars()
        .filter_map(|c| c.to_digit(10))
        .zip(weights.iter())
        .map(|(d, w)| d * w)
        .sum();

    let remainder = total % 11;
    let digit = if remainder <= 1 { remainder } else { 11 - remainder };
    Ok(digit as u8)
}

/// Check digit as text, or [`UNKNOWN_CHECK_DIGIT`] when it cannot be computed.
pub fn check_digit_or_unknown(number: &str) -> String {
    check_digit(number)
        .map(|d| d.to_string())
        .unwrap_or_else(|_| UNKNOWN_CHECK_DIGIT.to_string())
}

/// Validate a full NIT written as "number-dv".
pub fn validate_nit(nit: &str) -> bool {
    let clean = clean_identifier(Some(&RawValue::from(nit)));
    match split_identifier(&clean) {
        (number, Some(dv)) => check_digit(&number).is_ok_and(|d| d.to_string() == dv),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_digit_known_nits() {
        assert_eq!(check_digit("890903938"), Ok(8));
        assert_eq!(check_digit("800220154"), Ok(1));
        assert_eq!(check_digit("800197268"), Ok(4));
        assert_eq!(check_digit("860002964"), Ok(4));
        assert_eq!(check_digit("1032443194"), Ok(9));
    }

    #[test]
    fn test_check_digit_invalid() {
        assert!(matches!(check_digit(""), Err(ExtractionError::InvalidIdentifier(_))));
        assert!(check_digit("90012A456").is_err());
        assert!(check_digit("1234567890123456").is_err());
        assert_eq!(check_digit_or_unknown("abc"), "?");
    }

    #[test]
    fn test_clean_identifier() {
        assert_eq!(clean_identifier(Some(&RawValue::from("900.123.456-1"))), "900123456-1");
        assert_eq!(clean_identifier(Some(&RawValue::from("1.032.443.194"))), "1032443194");
        assert_eq!(clean_identifier(Some(&RawValue::from("900 123 456"))), "900123456");
        assert_eq!(clean_identifier(Some(&RawValue::Number(900123456.0))), "900123456");
        assert_eq!(clean_identifier(None), "");
    }

    #[test]
    fn test_split_identifier() {
        assert_eq!(
            split_identifier("900123456-1"),
            ("900123456".to_string(), Some("1".to_string()))
        );
        assert_eq!(split_identifier("9001234561"), ("9001234561".to_string(), None));
        assert_eq!(
            split_identifier("900-123-7"),
            ("900".to_string(), Some("7".to_string()))
        );
        assert_eq!(split_identifier("900123456-"), ("900123456".to_string(), None));
    }

    #[test]
    fn test_validate_nit() {
        assert!(validate_nit("890.903.938-8"));
        assert!(!validate_nit("890.903.938-1"));
        assert!(!validate_nit("890903938"));
    }
}
