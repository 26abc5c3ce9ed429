use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Characters rejected by at least one common filesystem.
const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

const MAX_FILENAME_CHARS: usize = 80;

const FALLBACK_FILENAME: &str = "subject";

/// Removes accents, leaving the base Latin letter (`ș` -> `s`, `Ă` -> `A`).
pub fn strip_diacritics(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).nfc().collect()
}

/// Uppercase, accent-free form used for keyword comparisons.
pub fn fold(s: &str) -> String {
    strip_diacritics(s).to_uppercase()
}

/// Collapses every whitespace run into a single space and trims the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Deduplication key for subject names: letters only, case-folded.
///
/// Digits and punctuation are dropped, so "Algebra I" and "Algebra 2" share
/// a key with "Algebra" and with each other.
pub fn subject_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Turns a subject name into a file stem that is safe on Windows, macOS and
/// Linux. The result is never empty.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = strip_diacritics(name)
        .chars()
        .map(|c| {
            if FORBIDDEN.contains(&c) || (c.is_control() && !c.is_whitespace()) {
                '_'
            } else {
                c
            }
        })
        .collect();

    let joined = replaced.split_whitespace().collect::<Vec<_>>().join("_");
    let trimmed = trim_edges(&joined);
    let capped: String = trimmed.chars().take(MAX_FILENAME_CHARS).collect();
    let capped = trim_edges(&capped);

    if capped.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        capped.to_string()
    }
}

fn trim_edges(s: &str) -> &str {
    s.trim_matches(|c| c == '_' || c == '.')
}
