//! Amount parsing for Colombian invoices.

use crate::models::RawValue;

use super::patterns::AMOUNT_NOISE;

/// Parse a raw amount. Numbers pass through; text follows Colombian formatting.
pub fn parse_amount(raw: Option<&RawValue>) -> f64 {
    match raw {
        None => 0.0,
        Some(RawValue::Number(n)) => *n,
        Some(RawValue::Text(s)) => parse_colombian_amount(s),
    }
}

/// Parse a Colombian-formatted amount (e.g., "$ 33.613,45" or "40.000").
///
/// A dot without a comma is always a thousands separator, so "40.000" is
/// forty thousand. Unparsable input yields 0.0.
pub fn parse_colombian_amount(s: &str) -> f64 {
    let cleaned = AMOUNT_NOISE.replace_all(s.trim(), "");
    if cleaned.is_empty() {
        return 0.0;
    }

    let has_dot = cleaned.contains('.');
    let has_comma = cleaned.contains(',');
    let normalized = match (has_dot, has_comma) {
        (true, true) => cleaned.replace('.', "").replace(',', "."),
        (true, false) => cleaned.replace('.', ""),
        (false, true) => cleaned.replace(',', "."),
        (false, false) => cleaned.into_owned(),
    };

    normalized.parse::<f64>().unwrap_or(0.0)
}

/// Scale up a positive amount below `threshold`, assumed to have lost its
/// thousands (6.8 read instead of 6.800).
pub fn correct_implausible_amount(value: f64, threshold: f64, multiplier: f64) -> f64 {
    if value > 0.0 && value < threshold {
        value * multiplier
    } else {
        value
    }
}

/// Format an amount in Colombian style (1.234.567,89).
pub fn format_colombian_amount(amount: f64) -> String {
    let s = format!("{:.2}", amount.abs());
    let (integer_part, decimal_part) = s.split_once('.').unwrap_or((s.as_str(), "00"));

    let chars: Vec<char> = integer_part.chars().collect();
    let mut formatted = String::new();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            formatted.push('.');
        }
        formatted.push(*c);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{}{},{}", sign, formatted, decimal_part)
}
