use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Canonical form used for every ingredient comparison: lower-cased,
/// diacritics stripped, whitespace collapsed and trimmed.
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .nfc()
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}
