//! Text folding for keyword and greeting comparisons.

use unicode_normalization::UnicodeNormalization;

/// Fold text for comparison: lowercase, canonical decomposition, and
/// stripped combining diacritical marks (U+0300–U+036F).
///
/// Accented and unaccented spellings compare equal after folding, so
/// "degradación" and "degradacion" hit the same keyword entry.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .nfd()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .collect()
}
