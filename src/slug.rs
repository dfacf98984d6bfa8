//! URL slugs for artist names, album titles and song titles.
//!
//! The slug is cosmetic: routing pairs it with the entity's stable id, so two
//! entities may share a slug. What matters is that the same input always yields
//! the same output and that the output can be dropped into a URL path segment
//! as-is.
//!
//! CRITICAL: stored slugs must stay stable once assigned. Changing any step
//! below changes URLs that are already published.

use unicode_normalization::UnicodeNormalization;

/// Maximum slug length in characters (hard cut).
pub const MAX_SLUG_LEN: usize = 50;

/// Returned when nothing survives normalization.
pub const FALLBACK_SLUG: &str = "item";

/// Check if a character is a Unicode combining diacritical mark.
/// Only the base block U+0300..U+036F is stripped; everything else that is not
/// ASCII is deleted outright a step later.
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F)
}

/// Build a slug from a display string.
///
/// Lower-case, NFD-decompose and drop combining marks ("ö" → "o"), keep only
/// `[a-z0-9 -]`, turn runs of whitespace and hyphens into single hyphens, trim
/// hyphens, cut to [`MAX_SLUG_LEN`] characters, and fall back to
/// [`FALLBACK_SLUG`] when empty. Non-Latin scripts, emoji and symbols are
/// deleted, never transliterated. An existing hyphen is a separator, so a
/// slug maps to itself.
///
/// e.g. "Mötley Crüe" → "motley-crue", "alt-J" → "alt-j", "!!!" → "item"
pub fn create_slug(text: &str) -> String {
    let kept: String = text
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| matches!(c, 'a'..='z' | '0'..='9' | '-') || c.is_whitespace())
        .collect();

    // Skipping empty parts collapses runs and trims both ends.
    let joined = kept
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let slug: String = joined.chars().take(MAX_SLUG_LEN).collect();

    // A cut can land right after a hyphen.
    let slug = slug.trim_end_matches('-');

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

/// True if `slug` already satisfies every output constraint of [`create_slug`].
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.chars().count() <= MAX_SLUG_LEN
        && slug
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '-'))
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
}

/// Slug paired with the entity's surrogate id, for routes that need uniqueness.
pub fn slug_with_id(text: &str, id: i64) -> String {
    format!("{}-{}", create_slug(text), id)
}

// ============================================================================
// TESTS
// ============================================================================
