//! District name normalization.
//!
//! Names are compared after stripping diacritics, uppercasing and
//! collapsing whitespace, so that "Aclimação", "ACLIMACAO" and
//! " aclimação " all refer to the same district.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization as _;
use unicode_normalization::char::is_combining_mark;

/// Regex to collapse runs of whitespace into a single space.
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Normalizes a district name for comparison.
///
/// The pipeline:
/// 1. Unicode canonical decomposition (NFD)
/// 2. Drop combining marks (accents, cedillas, tildes)
/// 3. Trim and collapse whitespace
/// 4. Uppercase
#[must_use]
pub fn normalize_name(input: &str) -> String {
    let stripped: String = input.nfd().filter(|c| !is_combining_mark(*c)).collect();
    WHITESPACE_RE
        .replace_all(stripped.trim(), " ")
        .to_uppercase()
}
