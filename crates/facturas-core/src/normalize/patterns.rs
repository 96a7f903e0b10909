//! Common regex patterns for invoice field normalization.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Everything that cannot be part of an amount
    pub static ref AMOUNT_NOISE: Regex = Regex::new(
        r"[^\d.,\-]"
    ).unwrap();

    // ISO dates as emitted by UBL documents, optionally followed by a time
    pub static ref DATE_YMD: Regex = Regex::new(
        r"^(\d{4})[-/](\d{2})[-/](\d{2})"
    ).unwrap();

    // Day-first dates (DD-MM-YYYY or DD/MM/YYYY)
    pub static ref DATE_DMY: Regex = Regex::new(
        r"^(\d{2})[-/](\d{2})[-/](\d{4})"
    ).unwrap();
}
