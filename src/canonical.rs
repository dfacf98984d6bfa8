//! Canonical release and track selection.
//!
//! Pure functions over already-fetched provider data: pick the one release of
//! a release-group to import, drop alternate-version tracks from its listing,
//! and narrow an artist's release-groups down to studio albums. No I/O.

use std::cmp::Ordering;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{ReleaseGroupSummary, ReleaseSummary, TrackCandidate};
use crate::qualifiers::{self, QualifierKind};

/// Per-artist album cap for `collect`.
pub const DEFAULT_ALBUM_LIMIT: usize = 10;

// ============================================================================
// Release Selection
// ============================================================================

/// Order two optional ISO dates ascending, missing dates last.
pub fn compare_dates(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn status_is(release: &ReleaseSummary, status: &str) -> bool {
    release
        .status
        .as_deref()
        .is_some_and(|s| s.eq_ignore_ascii_case(status))
}

/// Pick the authoritative release of a release-group.
///
/// Candidates are the official releases if any exist, else the non-bootleg
/// ones, else all of them. The earliest-dated candidate wins; undated releases
/// sort last and ties keep input order. Returns `None` for an empty list.
pub fn select_release(releases: &[ReleaseSummary]) -> Option<&ReleaseSummary> {
    let official: Vec<&ReleaseSummary> =
        releases.iter().filter(|r| status_is(r, "official")).collect();

    let mut candidates = if !official.is_empty() {
        official
    } else {
        let non_bootleg: Vec<&ReleaseSummary> =
            releases.iter().filter(|r| !status_is(r, "bootleg")).collect();
        if non_bootleg.is_empty() {
            releases.iter().collect()
        } else {
            non_bootleg
        }
    };

    // sort_by is stable
    candidates.sort_by(|a, b| compare_dates(a.date.as_deref(), b.date.as_deref()));
    candidates.into_iter().next()
}

// ============================================================================
// Track Canonicality
// ============================================================================

/// Anything with a title can be run through the canonicality filter.
pub trait Titled {
    fn title(&self) -> &str;
}

impl Titled for TrackCandidate {
    fn title(&self) -> &str {
        &self.title
    }
}

impl Titled for String {
    fn title(&self) -> &str {
        self
    }
}

impl Titled for &str {
    fn title(&self) -> &str {
        self
    }
}

/// True if no qualifier pattern matches the title.
pub fn is_canonical_title(title: &str) -> bool {
    qualifiers::classify(title).is_none()
}

/// Result of filtering a track listing.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackFilter<T> {
    pub canonical: Vec<T>,
    pub excluded: Vec<(T, QualifierKind)>,
}

impl<T> TrackFilter<T> {
    pub fn excluded_count(&self) -> usize {
        self.excluded.len()
    }
}

/// Split a track listing into canonical tracks and excluded alternates,
/// preserving order on both sides.
pub fn filter_canonical_tracks<T: Titled>(tracks: Vec<T>) -> TrackFilter<T> {
    let mut canonical = Vec::with_capacity(tracks.len());
    let mut excluded = Vec::new();
    for track in tracks {
        match qualifiers::classify(track.title()) {
            None => canonical.push(track),
            Some(kind) => excluded.push((track, kind)),
        }
    }
    TrackFilter {
        canonical,
        excluded,
    }
}

// ============================================================================
// Studio Albums
// ============================================================================

/// Secondary release-group types that disqualify a studio album.
pub const EXCLUDED_SECONDARY_TYPES: &[&str] = &[
    "Compilation",
    "Live",
    "Soundtrack",
    "Remix",
    "Demo",
    "Mixtape/Street",
    "Interview",
];

/// Album titles that mark re-recordings, live sets, radio shows and unreleased material.
static NON_STUDIO_TITLE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)taylor['’]?s\s+version").unwrap(),
        Regex::new(r"(?i)\(re-?recorded\)").unwrap(),
        Regex::new(r"(?i)\binterview\b").unwrap(),
        Regex::new(r"(?i)\bradio\s+show\b").unwrap(),
        Regex::new(r"(?i)\blive\b").unwrap(),
        Regex::new(r"@").unwrap(),
        Regex::new(r"(?i)\bmashup\b").unwrap(),
        Regex::new(r"(?i)\bbeta\s+version\b").unwrap(),
        Regex::new(r"(?i)\bdemos?\b").unwrap(),
        Regex::new(r"(?i)\bunreleased\b").unwrap(),
    ]
});

/// Why a release-group is not a studio album, or `None` if it is one.
pub fn studio_album_rejection(group: &ReleaseGroupSummary) -> Option<String> {
    match group.primary_type.as_deref() {
        Some("Album") => {}
        Some(other) => return Some(format!("primary type {other}")),
        None => return Some("no primary type".to_string()),
    }
    if let Some(t) = group
        .secondary_types
        .iter()
        .find(|t| EXCLUDED_SECONDARY_TYPES.contains(&t.as_str()))
    {
        return Some(format!("secondary type {t}"));
    }
    if NON_STUDIO_TITLE_PATTERNS
        .iter()
        .any(|re| re.is_match(&group.title))
    {
        return Some("non-studio title".to_string());
    }
    None
}

/// Studio albums sorted by first release date (undated last), capped at `limit`.
/// Returns the kept albums and how many release-groups were rejected.
pub fn select_studio_albums(
    groups: Vec<ReleaseGroupSummary>,
    limit: usize,
) -> (Vec<ReleaseGroupSummary>, usize) {
    let total = groups.len();
    let mut albums: Vec<ReleaseGroupSummary> = groups
        .into_iter()
        .filter(|g| studio_album_rejection(g).is_none())
        .collect();
    let rejected = total - albums.len();

    albums.sort_by(|a, b| {
        compare_dates(
            a.first_release_date.as_deref(),
            b.first_release_date.as_deref(),
        )
    });
    albums.truncate(limit);
    (albums, rejected)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn release(id: &str, status: Option<&str>, date: Option<&str>) -> ReleaseSummary {
        ReleaseSummary {
            mbid: id.to_string(),
            title: "Discovery".to_string(),
            status: status.map(String::from),
            date: date.map(String::from),
        }
    }

    fn group(title: &str, primary: Option<&str>, secondary: &[&str], date: Option<&str>) -> ReleaseGroupSummary {
        ReleaseGroupSummary {
            mbid: format!("rg-{title}"),
            title: title.to_string(),
            primary_type: primary.map(String::from),
            secondary_types: secondary.iter().map(|s| s.to_string()).collect(),
            first_release_date: date.map(String::from),
        }
    }

    #[test]
    fn test_select_earliest_official() {
        let releases = vec![
            release("a", Some("Official"), Some("2001-03-01")),
            release("b", Some("Official"), Some("2001-02-26")),
        ];
        assert_eq!(select_release(&releases).unwrap().mbid, "b");
    }

    #[test]
    fn test_official_beats_earlier_promotion() {
        let releases = vec![
            release("promo", Some("Promotion"), Some("2000-11-01")),
            release("official", Some("Official"), Some("2001-03-12")),
        ];
        assert_eq!(select_release(&releases).unwrap().mbid, "official");
    }

    #[test]
    fn test_fallback_to_non_bootleg_then_all() {
        let releases = vec![
            release("boot", Some("Bootleg"), Some("1999-01-01")),
            release("promo", Some("Promotion"), Some("2001-01-01")),
        ];
        assert_eq!(select_release(&releases).unwrap().mbid, "promo");

        let bootlegs = vec![
            release("late", Some("Bootleg"), Some("2005")),
            release("early", Some("Bootleg"), Some("1999")),
        ];
        assert_eq!(select_release(&bootlegs).unwrap().mbid, "early");
    }

    #[test]
    fn test_missing_status_counts_as_non_bootleg() {
        let releases = vec![
            release("boot", Some("Bootleg"), Some("1999-01-01")),
            release("unknown", None, Some("2003-01-01")),
        ];
        assert_eq!(select_release(&releases).unwrap().mbid, "unknown");
    }

    #[test]
    fn test_undated_sort_last_and_ties_keep_order() {
        let releases = vec![
            release("undated", Some("Official"), None),
            release("first", Some("Official"), Some("2001")),
            release("second", Some("Official"), Some("2001")),
        ];
        assert_eq!(select_release(&releases).unwrap().mbid, "first");

        let all_undated = vec![
            release("x", Some("Official"), None),
            release("y", Some("Official"), None),
        ];
        assert_eq!(select_release(&all_undated).unwrap().mbid, "x");
    }

    #[test]
    fn test_empty_releases() {
        assert!(select_release(&[]).is_none());
    }

    #[test]
    fn test_filter_keeps_order_and_counts_exclusions() {
        let tracks = vec![
            "Intro",
            "Song A",
            "Song A (Radio Edit)",
            "Song B",
            "Outro (Live)",
            "Song C - Acoustic",
        ];
        let result = filter_canonical_tracks(tracks);
        assert_eq!(result.canonical, vec!["Song A", "Song B"]);
        assert_eq!(result.excluded_count(), 4);
        assert_eq!(
            result.excluded.iter().map(|(_, k)| *k).collect::<Vec<_>>(),
            vec![
                QualifierKind::Interstitial,
                QualifierKind::VersionParenthetical,
                QualifierKind::VersionParenthetical,
                QualifierKind::VersionSuffix,
            ]
        );
    }

    #[test]
    fn test_is_canonical_title() {
        assert!(is_canonical_title("One More Time"));
        assert!(is_canonical_title("Harder, Better, Faster, Stronger"));
        assert!(!is_canonical_title("One More Time (Radio Edit)"));
        assert!(!is_canonical_title("Love Story (Taylor's Version)"));
        assert!(!is_canonical_title("Interlude"));
    }

    #[test]
    fn test_filter_is_idempotent() {
        let tracks: Vec<String> = [
            "One More Time",
            "Aerodynamic",
            "Digital Love (Live)",
            "Harder, Better, Faster, Stronger [Extended Mix]",
            "Something About Us (Bonus Track)",
            "Veridis Quo",
            "Short Circuit - Demo",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let once = filter_canonical_tracks(tracks).canonical;
        let twice = filter_canonical_tracks(once.clone());
        assert_eq!(twice.canonical, once);
        assert_eq!(twice.excluded_count(), 0);
    }

    #[test]
    fn test_filter_on_track_candidates() {
        let tracks = vec![
            TrackCandidate {
                title: "Love Story (Taylor's Version)".to_string(),
                ..Default::default()
            },
            TrackCandidate {
                title: "Love Story".to_string(),
                ..Default::default()
            },
        ];
        let result = filter_canonical_tracks(tracks);
        assert_eq!(result.canonical.len(), 1);
        assert_eq!(result.canonical[0].title, "Love Story");
    }

    #[test]
    fn test_studio_album_rejections() {
        assert_eq!(studio_album_rejection(&group("Discovery", Some("Album"), &[], None)), None);
        assert!(studio_album_rejection(&group("Around the World", Some("Single"), &[], None)).is_some());
        assert!(studio_album_rejection(&group("Untyped", None, &[], None)).is_some());
        assert!(studio_album_rejection(&group("Alive 2007", Some("Album"), &["Live"], None)).is_some());
        assert!(studio_album_rejection(&group("Musique", Some("Album"), &["Compilation"], None)).is_some());
        assert!(studio_album_rejection(&group("Red (Taylor's Version)", Some("Album"), &[], None)).is_some());
        assert!(studio_album_rejection(&group("Live at Wembley", Some("Album"), &[], None)).is_some());
        assert!(studio_album_rejection(&group("Daft Punk @ Coachella", Some("Album"), &[], None)).is_some());
        assert!(studio_album_rejection(&group("The Unreleased Tapes", Some("Album"), &[], None)).is_some());
        // Substrings do not trigger word patterns
        assert_eq!(studio_album_rejection(&group("Alive", Some("Album"), &[], None)), None);
        assert_eq!(studio_album_rejection(&group("Democracy", Some("Album"), &[], None)), None);
    }

    #[test]
    fn test_select_studio_albums_sorts_and_caps() {
        let groups = vec![
            group("Random Access Memories", Some("Album"), &[], Some("2013-05-17")),
            group("Homework", Some("Album"), &[], Some("1997-01-20")),
            group("Alive 1997", Some("Album"), &["Live"], Some("2001-10-01")),
            group("Undated", Some("Album"), &[], None),
            group("Discovery", Some("Album"), &[], Some("2001-03-12")),
        ];
        let (albums, rejected) = select_studio_albums(groups.clone(), 10);
        assert_eq!(rejected, 1);
        assert_eq!(
            albums.iter().map(|g| g.title.as_str()).collect::<Vec<_>>(),
            vec!["Homework", "Discovery", "Random Access Memories", "Undated"]
        );

        let (capped, _) = select_studio_albums(groups, 2);
        assert_eq!(
            capped.iter().map(|g| g.title.as_str()).collect::<Vec<_>>(),
            vec!["Homework", "Discovery"]
        );
    }
}
