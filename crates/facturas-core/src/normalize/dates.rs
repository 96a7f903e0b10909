//! Date canonicalization to `DD/MM/YYYY`.

use crate::models::RawValue;

use super::patterns::{DATE_DMY, DATE_YMD};

/// Canonicalize a raw date to `DD/MM/YYYY`.
///
/// Accepts `YYYY-MM-DD` (also with `/` and a trailing time or offset) and
/// `DD-MM-YYYY` / `DD/MM/YYYY`. Anything else is returned as-is, trimmed.
/// Absent input becomes an empty string.
pub fn canonicalize_date(raw: Option<&RawValue>) -> String {
    match raw {
        None => String::new(),
        Some(value) => canonicalize_date_str(&value.as_text()),
    }
}

/// String form of [`canonicalize_date`].
pub fn canonicalize_date_str(s: &str) -> String {
    let text = s.trim();
    if text.is_empty() {
        return String::new();
    }

    if let Some(caps) = DATE_YMD.captures(text) {
        return format!("{}/{}/{}", &caps[3], &caps[2], &caps[1]);
    }

    if let Some(caps) = DATE_DMY.captures(text) {
        return format!("{}/{}/{}", &caps[1], &caps[2], &caps[3]);
    }

    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_dates() {
        assert_eq!(canonicalize_date_str("2026-02-11"), "11/02/2026");
        assert_eq!(canonicalize_date_str("2026/02/08"), "08/02/2026");
        assert_eq!(canonicalize_date_str("2026-01-31T10:15:00-05:00"), "31/01/2026");
    }

    #[test]
    fn test_day_first_dates() {
        assert_eq!(canonicalize_date_str("11/02/2026"), "11/02/2026");
        assert_eq!(canonicalize_date_str("11-02-2026"), "11/02/2026");
    }

    #[test]
    fn test_idempotent() {
        let once = canonicalize_date_str("2026-02-11");
        assert_eq!(canonicalize_date_str(&once), once);
    }

    #[test]
    fn test_unrecognized_passthrough() {
        assert_eq!(canonicalize_date_str(" 11 de febrero "), "11 de febrero");
        assert_eq!(canonicalize_date(None), "");
        assert_eq!(canonicalize_date(Some(&RawValue::from(""))), "");
    }
}
