//! Text normalization shared by matching and cache keys.
//!
//! # Invariants
//! - `normalize` is idempotent.
//! - Every text comparison in the crate goes through `normalize` so that
//!   `Kavárna` and `kavarna` compare equal everywhere.

use unicode_normalization::UnicodeNormalization;

/// Lower-cases `text`, decomposes it to NFD and strips combining diacritical
/// marks (U+0300..=U+036F).
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_diacritic(*c))
        .collect()
}

/// Normalizes an optional value; `None` yields an empty string.
pub fn normalize_opt(text: Option<&str>) -> String {
    text.map(normalize).unwrap_or_default()
}

/// Returns whether the normalized `haystack` contains the already-normalized
/// `needle`.
pub fn contains_normalized(haystack: &str, needle: &str) -> bool {
    normalize(haystack).contains(needle)
}

fn is_combining_diacritic(c: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&c)
}
