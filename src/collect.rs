//! Import job: provider → canonical selector → slugs → catalog.
//!
//! For each requested artist: resolve it on MusicBrainz, store it once per
//! MBID, narrow its release-groups to studio albums, select each album's
//! canonical release, filter its first medium down to canonical tracks and
//! store album and songs. Provider failures skip the artist or album at hand;
//! database failures abort the run.

use std::time::Instant;

use log::{info, warn};
use rusqlite::Connection;

use crate::canonical::{filter_canonical_tracks, select_release, select_studio_albums, DEFAULT_ALBUM_LIMIT};
use crate::error::{PipelineError, Result};
use crate::models::{release_timestamp, year_of, ArtistId, NewAlbum, NewArtist, NewSong, ReleaseGroupSummary};
use crate::progress::{create_progress_bar, log_progress};
use crate::providers::musicbrainz::external_ids_from_urls;
use crate::providers::{InstrumentalSource, MetadataSource};
use crate::store;

/// Search hits considered when resolving an artist name.
const SEARCH_LIMIT: usize = 5;
const MAX_GENRES: usize = 10;

#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub albums_per_artist: usize,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            albums_per_artist: DEFAULT_ALBUM_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectStats {
    pub artists: u64,
    pub albums: u64,
    pub songs: u64,
    pub instrumental: u64,
    /// Artists already in the catalog.
    pub existing_artists: u64,
    /// Release-groups that are not studio albums, or already stored.
    pub skipped_albums: u64,
    /// Tracks dropped by the canonicality filter.
    pub excluded_tracks: u64,
    pub failed_artists: u64,
    pub failed_albums: u64,
}

impl CollectStats {
    pub fn report_lines(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Artists", self.artists.to_string()),
            ("Existing artists", self.existing_artists.to_string()),
            ("Albums", self.albums.to_string()),
            ("Songs", self.songs.to_string()),
            ("Instrumental", self.instrumental.to_string()),
            ("Skipped albums", self.skipped_albums.to_string()),
            ("Excluded tracks", self.excluded_tracks.to_string()),
            ("Failed artists", self.failed_artists.to_string()),
            ("Failed albums", self.failed_albums.to_string()),
        ]
    }
}

/// Import every artist in `names`.
pub fn collect_artists(
    conn: &Connection,
    source: &mut dyn MetadataSource,
    mut instrumental: Option<&mut (dyn InstrumentalSource + '_)>,
    names: &[String],
    options: &CollectOptions,
) -> Result<CollectStats> {
    let start = Instant::now();
    let mut stats = CollectStats::default();
    let pb = create_progress_bar(names.len() as u64, "Collecting artists");

    for (i, name) in names.iter().enumerate() {
        pb.set_message(name.clone());
        let result = import_artist(conn, source, instrumental.as_deref_mut(), name, options, &mut stats);
        match result {
            Ok(()) => {}
            Err(e) if e.is_transient() => {
                warn!("Skipping artist {name}: {e}");
                stats.failed_artists += 1;
            }
            Err(e) => {
                pb.abandon();
                return Err(e);
            }
        }
        pb.inc(1);
        log_progress("collect", i as u64 + 1, names.len() as u64, 1);
    }

    pb.finish_and_clear();
    info!(
        "Collected {} artists, {} albums, {} songs in {:.1}s",
        stats.artists,
        stats.albums,
        stats.songs,
        start.elapsed().as_secs_f64()
    );
    Ok(stats)
}

fn import_artist(
    conn: &Connection,
    source: &mut dyn MetadataSource,
    mut instrumental: Option<&mut (dyn InstrumentalSource + '_)>,
    name: &str,
    options: &CollectOptions,
    stats: &mut CollectStats,
) -> Result<()> {
    let candidates = source.search_artists(name, SEARCH_LIMIT)?;
    let Some(candidate) = candidates
        .iter()
        .find(|c| c.name.to_lowercase() == name.to_lowercase())
        .or_else(|| candidates.first())
    else {
        return Err(PipelineError::provider("musicbrainz", format!("no artist found for {name:?}")));
    };

    if store::find_artist_by_mbid(conn, &candidate.mbid)?.is_some() {
        info!("{} already in catalog, skipping", candidate.name);
        stats.existing_artists += 1;
        return Ok(());
    }

    let details = source.artist(&candidate.mbid)?;
    let artist_id = store::insert_artist(
        conn,
        &NewArtist {
            name: details.name.clone(),
            musicbrainz_id: Some(details.mbid.clone()),
            country: details.country.clone(),
            formed_year: details.begin_date.as_deref().and_then(year_of),
            genres: details.tags.iter().take(MAX_GENRES).cloned().collect(),
            external_ids: external_ids_from_urls(&details.relation_urls),
        },
    )?;
    stats.artists += 1;
    info!("Stored artist {} ({})", details.name, details.mbid);

    let groups = source.release_groups(&details.mbid)?;
    let (albums, rejected) = select_studio_albums(groups, options.albums_per_artist);
    stats.skipped_albums += rejected as u64;
    info!("{}: {} studio albums selected, {} release-groups skipped", details.name, albums.len(), rejected);

    for group in &albums {
        match import_album(conn, source, instrumental.as_deref_mut(), artist_id, &details.name, group, stats) {
            Ok(()) => {}
            Err(e) if e.is_transient() => {
                warn!("Skipping album {} / {}: {e}", details.name, group.title);
                stats.failed_albums += 1;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Import one release-group as an album with its canonical tracks.
pub fn import_album(
    conn: &Connection,
    source: &mut dyn MetadataSource,
    mut instrumental: Option<&mut (dyn InstrumentalSource + '_)>,
    artist_id: ArtistId,
    artist_name: &str,
    group: &ReleaseGroupSummary,
    stats: &mut CollectStats,
) -> Result<()> {
    if store::find_album_by_mbid(conn, &group.mbid)?.is_some() {
        stats.skipped_albums += 1;
        return Ok(());
    }

    let releases = source.releases(&group.mbid)?;
    let Some(release) = select_release(&releases) else {
        warn!("No releases for {} / {}, skipping", artist_name, group.title);
        stats.skipped_albums += 1;
        return Ok(());
    };
    let details = source.release(&release.mbid)?;

    // Only the first medium; later discs are bonus material
    let tracks = details.media.into_iter().next().unwrap_or_default();
    let filtered = filter_canonical_tracks(tracks);
    stats.excluded_tracks += filtered.excluded_count() as u64;
    for (track, kind) in &filtered.excluded {
        info!("  excluded {:?} ({})", track.title, kind.label());
    }

    let release_date = group.first_release_date.as_deref().and_then(release_timestamp);
    let album_id = store::insert_album(
        conn,
        &NewAlbum {
            title: group.title.clone(),
            artist_id,
            musicbrainz_id: Some(group.mbid.clone()),
            release_date,
            track_count: filtered.canonical.len() as i64,
        },
    )?;
    stats.albums += 1;

    let mut stored = 0usize;
    for track in &filtered.canonical {
        let isrc = track.isrcs.first().cloned();
        let is_instrumental = match instrumental.as_deref_mut() {
            Some(lookup) => match lookup.is_instrumental(&track.title, artist_name, isrc.as_deref()) {
                Ok(flag) => flag.unwrap_or(false),
                Err(e) => {
                    warn!("Instrumental check failed for {:?}: {e}", track.title);
                    false
                }
            },
            None => false,
        };
        let inserted = store::insert_song(
            conn,
            &NewSong {
                title: track.title.clone(),
                artist_id,
                album_id: Some(album_id),
                musicbrainz_id: Some(track.recording_mbid.clone()),
                duration: track.duration_secs(),
                release_date,
                isrc,
                is_instrumental,
            },
        )?;
        if inserted {
            stored += 1;
            stats.songs += 1;
            if is_instrumental {
                stats.instrumental += 1;
            }
        } else {
            info!("  recording {} already stored, skipping {:?}", track.recording_mbid, track.title);
        }
    }

    // Repeated or already-stored recordings were ignored; count what is there
    if stored != filtered.canonical.len() {
        let actual = store::count_album_songs(conn, album_id)?;
        store::set_album_track_count(conn, album_id, actual)?;
    }

    info!(
        "Stored album {} / {}: {} tracks ({} excluded)",
        artist_name,
        group.title,
        stored,
        filtered.excluded_count()
    );
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
