//! Core data models for the catalog pipeline.
//!
//! Catalog rows (artists, albums, songs), the provider-neutral shapes the
//! selector works on, and the typed fields that are persisted as JSON text
//! columns.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// ============================================================================
// Type Aliases
// ============================================================================

pub type ArtistId = i64;
pub type AlbumId = i64;
pub type SongId = i64;

// ============================================================================
// Identifiers
// ============================================================================

static MBID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap()
});

/// True if `s` looks like a MusicBrainz identifier (lower-case UUID).
pub fn is_mbid(s: &str) -> bool {
    MBID_RE.is_match(s)
}

/// Parse a MusicBrainz partial date ("1997", "1997-05", "1997-05-21") into
/// unix seconds at midnight UTC. Anything else yields `None`.
pub fn release_timestamp(date: &str) -> Option<i64> {
    let date = date.trim();
    let full = match date.len() {
        4 => format!("{date}-01-01"),
        7 => format!("{date}-01"),
        10 => date.to_string(),
        _ => return None,
    };
    NaiveDate::parse_from_str(&full, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

/// Year part of a partial date, e.g. "1993-02" → 1993.
pub fn year_of(date: &str) -> Option<i32> {
    date.get(..4).and_then(|y| y.parse().ok())
}

// ============================================================================
// JSON Text Columns
// ============================================================================

/// Cross-service identifiers, stored in the `external_ids` column.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spotify: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discogs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wikidata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastfm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genius: Option<String>,
}

impl ExternalIds {
    pub fn is_empty(&self) -> bool {
        *self == ExternalIds::default()
    }
}

/// Look up the first string-valued key among `keys` in a JSON object blob.
/// Numbers are rendered as strings (Discogs ids are often stored as numbers).
pub fn json_blob_field(blob: Option<&str>, keys: &[&str]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(blob?).ok()?;
    let object = value.as_object()?;
    keys.iter().find_map(|key| match object.get(*key)? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Serialize a list for a JSON text column; empty lists become NULL.
pub fn json_list(values: &[String]) -> Option<String> {
    if values.is_empty() {
        None
    } else {
        serde_json::to_string(values).ok()
    }
}

// ============================================================================
// Provider-Neutral Shapes
// ============================================================================

/// Artist search hit.
#[derive(Clone, Debug, PartialEq)]
pub struct ArtistCandidate {
    pub mbid: String,
    pub name: String,
}

/// Artist lookup with URL relations and tags.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArtistDetails {
    pub mbid: String,
    pub name: String,
    pub country: Option<String>,
    pub begin_date: Option<String>,
    pub relation_urls: Vec<String>,
    pub tags: Vec<String>,
}

/// Release-group (album concept) as listed under an artist.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReleaseGroupSummary {
    pub mbid: String,
    pub title: String,
    pub primary_type: Option<String>,
    pub secondary_types: Vec<String>,
    pub first_release_date: Option<String>,
}

/// One edition of a release-group.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReleaseSummary {
    pub mbid: String,
    pub title: String,
    pub status: Option<String>,
    pub date: Option<String>,
}

/// A release with its track listing, one Vec per medium.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReleaseDetails {
    pub mbid: String,
    pub media: Vec<Vec<TrackCandidate>>,
}

/// One track on a release, joined with its recording.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackCandidate {
    pub title: String,
    pub recording_mbid: String,
    pub length_ms: Option<u64>,
    pub isrcs: Vec<String>,
}

impl TrackCandidate {
    /// Length in whole seconds, floored.
    pub fn duration_secs(&self) -> Option<i64> {
        self.length_ms.map(|ms| (ms / 1000) as i64)
    }
}

/// Last.fm artist.getinfo, already cleaned.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArtistInfo {
    pub bio: Option<String>,
    pub images: Vec<String>,
    pub tags: Vec<String>,
}

// ============================================================================
// Catalog Rows
// ============================================================================

#[derive(Clone, Debug, Default)]
pub struct NewArtist {
    pub name: String,
    pub musicbrainz_id: Option<String>,
    pub country: Option<String>,
    pub formed_year: Option<i32>,
    pub genres: Vec<String>,
    pub external_ids: ExternalIds,
}

#[derive(Clone, Debug, Default)]
pub struct NewAlbum {
    pub title: String,
    pub artist_id: ArtistId,
    pub musicbrainz_id: Option<String>,
    pub release_date: Option<i64>,
    pub track_count: i64,
}

#[derive(Clone, Debug, Default)]
pub struct NewSong {
    pub title: String,
    pub artist_id: ArtistId,
    pub album_id: Option<AlbumId>,
    pub musicbrainz_id: Option<String>,
    pub duration: Option<i64>,
    pub release_date: Option<i64>,
    pub isrc: Option<String>,
    pub is_instrumental: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ArtistRow {
    pub id: ArtistId,
    pub name: String,
    pub musicbrainz_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AlbumRow {
    pub id: AlbumId,
    pub title: String,
    pub musicbrainz_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SongRow {
    pub id: SongId,
    pub title: String,
    pub artist_name: String,
    pub musicbrainz_id: Option<String>,
    pub isrc: Option<String>,
}

/// Row counts and gaps, for the `report` command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogCounts {
    pub artists: i64,
    pub albums: i64,
    pub songs: i64,
    pub artists_without_bio: i64,
    pub artists_without_images: i64,
    pub artists_without_genres: i64,
    pub albums_without_cover_art: i64,
    pub songs_without_lyrics: i64,
    pub songs_without_duration: i64,
    pub songs_without_isrc: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_mbid() {
        assert!(is_mbid("056e4f3e-d505-4dad-8ec1-d04f521cbb56"));
        assert!(!is_mbid("056E4F3E-D505-4DAD-8EC1-D04F521CBB56"));
        assert!(!is_mbid("daft-punk"));
        assert!(!is_mbid(""));
    }

    #[test]
    fn test_release_timestamp_partial_dates() {
        assert_eq!(release_timestamp("1970-01-01"), Some(0));
        assert_eq!(release_timestamp("1970"), Some(0));
        assert_eq!(release_timestamp("1970-02"), Some(31 * 86400));
        assert_eq!(release_timestamp("2001-03-12"), Some(984355200));
        assert_eq!(release_timestamp("2001-02-30"), None);
        assert_eq!(release_timestamp("soon"), None);
        assert_eq!(release_timestamp(""), None);
    }

    #[test]
    fn test_year_of() {
        assert_eq!(year_of("1993-02"), Some(1993));
        assert_eq!(year_of("1993"), Some(1993));
        assert_eq!(year_of("93"), None);
    }

    #[test]
    fn test_json_blob_field() {
        let blob = r#"{"spotify":"4tZwfgrHOc3mvqYlEYSvVi","discogs":1289}"#;
        assert_eq!(
            json_blob_field(Some(blob), &["spotify_id", "spotify"]),
            Some("4tZwfgrHOc3mvqYlEYSvVi".to_string())
        );
        assert_eq!(json_blob_field(Some(blob), &["discogs"]), Some("1289".to_string()));
        assert_eq!(json_blob_field(Some(blob), &["genius"]), None);
        assert_eq!(json_blob_field(Some("not json"), &["spotify"]), None);
        assert_eq!(json_blob_field(None, &["spotify"]), None);
    }

    #[test]
    fn test_external_ids_serialization_skips_missing() {
        let ids = ExternalIds {
            spotify: Some("abc".to_string()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&ids).unwrap(), r#"{"spotify":"abc"}"#);
        assert!(ExternalIds::default().is_empty());
    }

    #[test]
    fn test_duration_is_floored() {
        let track = TrackCandidate {
            length_ms: Some(215_999),
            ..Default::default()
        };
        assert_eq!(track.duration_secs(), Some(215));
        assert_eq!(TrackCandidate::default().duration_secs(), None);
    }

    #[test]
    fn test_json_list() {
        assert_eq!(json_list(&[]), None);
        assert_eq!(
            json_list(&["house".to_string(), "french house".to_string()]),
            Some(r#"["house","french house"]"#.to_string())
        );
    }
}
