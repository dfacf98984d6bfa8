//! MusicBrainz web service client (`/ws/2`, JSON).

use serde::Deserialize;

use super::{encode, IsrcSource, JsonClient, MetadataSource};
use crate::error::Result;
use crate::models::{
    ArtistCandidate, ArtistDetails, ExternalIds, ReleaseDetails, ReleaseGroupSummary,
    ReleaseSummary, TrackCandidate,
};

pub const MUSICBRAINZ_API_URL: &str = "https://musicbrainz.org/ws/2";

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ArtistSearch {
    #[serde(default)]
    artists: Vec<MbArtist>,
}

#[derive(Debug, Deserialize)]
struct MbArtist {
    id: String,
    name: String,
    country: Option<String>,
    #[serde(rename = "life-span")]
    life_span: Option<LifeSpan>,
    #[serde(default)]
    relations: Vec<Relation>,
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
struct LifeSpan {
    begin: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Relation {
    url: Option<RelationUrl>,
}

#[derive(Debug, Deserialize)]
struct RelationUrl {
    resource: String,
}

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
    #[serde(default)]
    count: i64,
}

#[derive(Debug, Deserialize)]
struct ReleaseGroupBrowse {
    #[serde(rename = "release-groups", default)]
    release_groups: Vec<MbReleaseGroup>,
}

#[derive(Debug, Deserialize)]
struct MbReleaseGroup {
    id: String,
    title: String,
    #[serde(rename = "primary-type")]
    primary_type: Option<String>,
    #[serde(rename = "secondary-types", default)]
    secondary_types: Vec<String>,
    #[serde(rename = "first-release-date")]
    first_release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseBrowse {
    #[serde(default)]
    releases: Vec<MbRelease>,
}

#[derive(Debug, Deserialize)]
struct MbRelease {
    id: String,
    title: String,
    status: Option<String>,
    date: Option<String>,
    #[serde(default)]
    media: Vec<Medium>,
}

#[derive(Debug, Deserialize)]
struct Medium {
    #[serde(default)]
    tracks: Vec<MbTrack>,
}

#[derive(Debug, Deserialize)]
struct MbTrack {
    title: String,
    recording: MbRecording,
}

#[derive(Debug, Deserialize)]
struct MbRecording {
    id: String,
    length: Option<u64>,
    #[serde(default)]
    isrcs: Vec<String>,
}

/// Empty strings from the web service mean "unknown".
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

// ============================================================================
// Relations
// ============================================================================

/// Pull cross-service identifiers out of an artist's URL relations.
///
/// e.g. "https://open.spotify.com/artist/4tZwfgrHOc3mvqYlEYSvVi" → spotify "4tZwfgrHOc3mvqYlEYSvVi",
/// "https://www.discogs.com/artist/1289-Daft-Punk" → discogs "1289"
pub fn external_ids_from_urls<S: AsRef<str>>(urls: &[S]) -> ExternalIds {
    fn after<'a>(url: &'a str, marker: &str) -> Option<&'a str> {
        let start = url.find(marker)? + marker.len();
        let rest = &url[start..];
        let id = rest.split(['/', '?', '#']).next().unwrap_or("");
        if id.is_empty() {
            None
        } else {
            Some(id)
        }
    }

    let mut ids = ExternalIds::default();
    for url in urls {
        let url = url.as_ref();
        if let Some(id) = after(url, "spotify.com/artist/") {
            ids.spotify.get_or_insert_with(|| id.to_string());
        } else if let Some(id) = after(url, "discogs.com/artist/") {
            let numeric = id.split('-').next().unwrap_or(id);
            ids.discogs.get_or_insert_with(|| numeric.to_string());
        } else if let Some(id) = after(url, "wikidata.org/wiki/") {
            ids.wikidata.get_or_insert_with(|| id.to_string());
        } else if url.contains("last.fm/music/") {
            ids.lastfm.get_or_insert_with(|| url.to_string());
        } else if let Some(id) = after(url, "genius.com/artists/") {
            ids.genius.get_or_insert_with(|| id.to_string());
        }
    }
    ids
}

// ============================================================================
// Client
// ============================================================================

pub struct MusicBrainzClient {
    http: JsonClient,
}

impl MusicBrainzClient {
    pub fn new(http: JsonClient) -> Self {
        Self { http }
    }
}

impl MetadataSource for MusicBrainzClient {
    fn search_artists(&mut self, name: &str, limit: usize) -> Result<Vec<ArtistCandidate>> {
        let url = format!(
            "{MUSICBRAINZ_API_URL}/artist?query={}&fmt=json&limit={limit}",
            encode(name)
        );
        let search: ArtistSearch = self.http.get_json(&url)?;
        Ok(search
            .artists
            .into_iter()
            .map(|a| ArtistCandidate {
                mbid: a.id,
                name: a.name,
            })
            .collect())
    }

    fn artist(&mut self, mbid: &str) -> Result<ArtistDetails> {
        let url = format!("{MUSICBRAINZ_API_URL}/artist/{mbid}?fmt=json&inc=url-rels+tags");
        let artist: MbArtist = self.http.get_json(&url)?;

        let mut tags = artist.tags;
        tags.sort_by(|a, b| b.count.cmp(&a.count));
        Ok(ArtistDetails {
            mbid: artist.id,
            name: artist.name,
            country: non_empty(artist.country),
            begin_date: non_empty(artist.life_span.and_then(|l| l.begin)),
            relation_urls: artist
                .relations
                .into_iter()
                .filter_map(|r| r.url.map(|u| u.resource))
                .collect(),
            tags: tags.into_iter().map(|t| t.name).collect(),
        })
    }

    fn release_groups(&mut self, artist_mbid: &str) -> Result<Vec<ReleaseGroupSummary>> {
        let url = format!(
            "{MUSICBRAINZ_API_URL}/release-group?artist={artist_mbid}&type=album&fmt=json&limit=100"
        );
        let browse: ReleaseGroupBrowse = self.http.get_json(&url)?;
        Ok(browse
            .release_groups
            .into_iter()
            .map(|g| ReleaseGroupSummary {
                mbid: g.id,
                title: g.title,
                primary_type: non_empty(g.primary_type),
                secondary_types: g.secondary_types,
                first_release_date: non_empty(g.first_release_date),
            })
            .collect())
    }

    fn releases(&mut self, release_group_mbid: &str) -> Result<Vec<ReleaseSummary>> {
        let url = format!(
            "{MUSICBRAINZ_API_URL}/release?release-group={release_group_mbid}&fmt=json&limit=100"
        );
        let browse: ReleaseBrowse = self.http.get_json(&url)?;
        Ok(browse
            .releases
            .into_iter()
            .map(|r| ReleaseSummary {
                mbid: r.id,
                title: r.title,
                status: non_empty(r.status),
                date: non_empty(r.date),
            })
            .collect())
    }

    fn release(&mut self, release_mbid: &str) -> Result<ReleaseDetails> {
        let url = format!("{MUSICBRAINZ_API_URL}/release/{release_mbid}?fmt=json&inc=recordings+isrcs");
        let release: MbRelease = self.http.get_json(&url)?;
        Ok(ReleaseDetails {
            mbid: release.id,
            media: release
                .media
                .into_iter()
                .map(|m| {
                    m.tracks
                        .into_iter()
                        .map(|t| TrackCandidate {
                            title: t.title,
                            recording_mbid: t.recording.id,
                            length_ms: t.recording.length,
                            isrcs: t.recording.isrcs,
                        })
                        .collect()
                })
                .collect(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RecordingIsrcs {
    #[serde(default)]
    isrcs: Vec<String>,
}

impl IsrcSource for MusicBrainzClient {
    fn recording_isrcs(&mut self, recording_mbid: &str) -> Result<Vec<String>> {
        let url = format!("{MUSICBRAINZ_API_URL}/recording/{recording_mbid}?fmt=json&inc=isrcs");
        let recording: RecordingIsrcs = self.http.get_json(&url)?;
        Ok(recording.isrcs)
    }
}
