//! Title qualifier vocabulary.
//!
//! One authoritative table of tagged patterns decides whether a track title
//! names an alternate version (remix, live take, bonus track, re-recording...).
//! The canonical selector rejects any title that matches, and the duplicate
//! grouper strips the version groups to find a song's base title.
//!
//! CRITICAL: both the import filter and the dedup pass read this table. Adding
//! a pattern changes what future imports keep and which stored songs collapse
//! into one another on the next cleanup run.

use once_cell::sync::Lazy;
use regex::Regex;

/// Words that mark a parenthesized/bracketed group or " - suffix" as a version qualifier.
pub const VERSION_WORDS: &[&str] = &[
    "remix",
    "mix",
    "version",
    "live",
    "acoustic",
    "demo",
    "instrumental",
    "radio",
    "single",
    "edit",
    "vocal",
    "alternate",
    "extended",
    "dub",
    "reprise",
    "interlude",
    "intro",
    "outro",
    "skit",
];

/// Edition words that, followed by "track" or "edition", mark a bonus/regional cut.
pub const EDITION_WORDS: &[&str] = &[
    "bonus", "hidden", "secret", "japan", "japanese", "jp", "uk", "us", "eu", "deluxe", "special",
    "vault",
];

/// Producer tags that show up as "(<tag> Mix)" / "(<tag> Remix)".
pub const PRODUCER_TAGS: &[&str] = &["lange", "spinna", "neptunes?", "timbaland"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualifierKind {
    /// "(Radio Edit)", "(Live at Wembley)"
    VersionParenthetical,
    /// "[Extended Mix]"
    VersionBracketed,
    /// "Song - Live"
    VersionSuffix,
    /// "(Bonus Track)", "(Japan Edition)"
    EditionMarker,
    /// "(Club Mix)", "(Original Mix)"
    NamedMix,
    /// "(Neptunes Remix)"
    ProducerMix,
    /// "(Taylor's Version)"
    ReRecording,
    /// "(From The Vault)"
    VaultMarker,
    /// "(Piano/Vocal)"
    PianoVocal,
    /// A whole title that is just "Intro", "Outro", "Interlude", "Skit" or "Reprise".
    Interstitial,
}

impl QualifierKind {
    /// Group qualifiers that are cut out of a title to get its base title.
    pub fn is_version_group(self) -> bool {
        matches!(
            self,
            QualifierKind::VersionParenthetical | QualifierKind::VersionBracketed
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            QualifierKind::VersionParenthetical => "version (parenthesized)",
            QualifierKind::VersionBracketed => "version (bracketed)",
            QualifierKind::VersionSuffix => "version suffix",
            QualifierKind::EditionMarker => "bonus/edition marker",
            QualifierKind::NamedMix => "named mix",
            QualifierKind::ProducerMix => "producer mix",
            QualifierKind::ReRecording => "re-recording",
            QualifierKind::VaultMarker => "vault track",
            QualifierKind::PianoVocal => "piano/vocal",
            QualifierKind::Interstitial => "interstitial",
        }
    }
}

pub struct QualifierPattern {
    pub kind: QualifierKind,
    pub regex: Regex,
}

fn alternation(words: &[&str]) -> String {
    words.join("|")
}

fn pattern(kind: QualifierKind, source: &str) -> QualifierPattern {
    QualifierPattern {
        kind,
        regex: Regex::new(source).unwrap(),
    }
}

/// Qualifier patterns, checked in order. Matching is case-insensitive.
pub static QUALIFIER_PATTERNS: Lazy<Vec<QualifierPattern>> = Lazy::new(|| {
    let version = alternation(VERSION_WORDS);
    let edition = alternation(EDITION_WORDS);
    let producers = alternation(PRODUCER_TAGS);
    vec![
        // Leading \s* so the same regex can cut the group out of a title cleanly
        pattern(
            QualifierKind::VersionParenthetical,
            &format!(r"(?i)\s*\([^)]*(?:{version})[^)]*\)"),
        ),
        pattern(
            QualifierKind::VersionBracketed,
            &format!(r"(?i)\s*\[[^\]]*(?:{version})[^\]]*\]"),
        ),
        pattern(
            QualifierKind::VersionSuffix,
            &format!(r"(?i)\s+[-–—]\s+(?:{version})$"),
        ),
        pattern(
            QualifierKind::EditionMarker,
            &format!(r"(?i)\((?:{edition})\s+(?:track|edition)\)"),
        ),
        pattern(
            QualifierKind::NamedMix,
            r"(?i)\((?:\w+\s+)?(?:vocal|instrumental|club|dance|extended|original|piano)\s+mix\)",
        ),
        pattern(
            QualifierKind::ProducerMix,
            &format!(r"(?i)\((?:\w+\s+)?(?:{producers})\s+(?:mix|remix)\)"),
        ),
        pattern(
            QualifierKind::ReRecording,
            r"(?i)\(.*taylor['’]?s?\s+version.*\)",
        ),
        pattern(QualifierKind::VaultMarker, r"(?i)\(from the vault\)"),
        pattern(QualifierKind::PianoVocal, r"(?i)\(piano\s*/\s*vocal\)"),
        pattern(
            QualifierKind::Interstitial,
            r"(?i)^\s*(?:intro|outro|interlude|skit|reprise)\s*$",
        ),
    ]
});

/// First qualifier a title matches, if any.
pub fn classify(title: &str) -> Option<QualifierKind> {
    QUALIFIER_PATTERNS
        .iter()
        .find(|p| p.regex.is_match(title))
        .map(|p| p.kind)
}

/// Remove every parenthesized or bracketed version group, then trim.
/// e.g. "Title (Live) [Radio Edit]" → "Title"
pub fn strip_version_groups(title: &str) -> String {
    let mut result = title.to_string();
    for p in QUALIFIER_PATTERNS.iter().filter(|p| p.kind.is_version_group()) {
        result = p.regex.replace_all(&result, "").to_string();
    }
    result.trim().to_string()
}

/// True if the title carries any parenthesized or bracketed group at all.
pub fn has_bracketed_group(title: &str) -> bool {
    title.contains('(') || title.contains('[')
}
