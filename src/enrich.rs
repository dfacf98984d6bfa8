//! Batch enrichment jobs over an existing catalog.
//!
//! Each job selects rows with a gap, asks one provider per row and writes
//! what comes back. A provider failure skips the row; database failures
//! abort the job.

use log::{debug, warn};
use rusqlite::Connection;

use crate::error::Result;
use crate::models::is_mbid;
use crate::progress::{create_progress_bar, log_progress, BatchStats};
use crate::providers::{ArtistInfoSource, CoverArtSource, InstrumentalSource, IsrcSource};
use crate::store;

const LOG_INTERVAL: u64 = 25;

/// Fill `albums.cover_art` from the Cover Art Archive.
pub fn enrich_covers(
    conn: &Connection,
    source: &mut dyn CoverArtSource,
    limit: Option<usize>,
) -> Result<BatchStats> {
    let albums = store::albums_missing_cover_art(conn, limit)?;
    let total = albums.len() as u64;
    let pb = create_progress_bar(total, "Cover art");
    let mut stats = BatchStats::default();

    for album in &albums {
        stats.processed += 1;
        let mbid = album.musicbrainz_id.as_deref().unwrap_or_default();
        if !is_mbid(mbid) {
            debug!("Album {} has no MusicBrainz id, skipping", album.id);
            stats.skipped += 1;
        } else {
            match source.front_cover(mbid) {
                Ok(urls) if urls.is_empty() => stats.skipped += 1,
                Ok(urls) => {
                    store::set_album_cover_art(conn, album.id, &urls)?;
                    stats.updated += 1;
                }
                Err(e) if e.is_transient() => {
                    warn!("Cover art failed for {:?}: {e}", album.title);
                    stats.failed += 1;
                }
                Err(e) => return Err(e),
            }
        }
        pb.inc(1);
        pb.set_message(stats.summary());
        log_progress("covers", stats.processed, total, LOG_INTERVAL);
    }

    pb.finish_and_clear();
    Ok(stats)
}

/// Fill artist bio, images and (empty) genres from Last.fm.
pub fn enrich_artist_info(
    conn: &Connection,
    source: &mut dyn ArtistInfoSource,
    limit: Option<usize>,
) -> Result<BatchStats> {
    let artists = store::artists_missing_info(conn, limit)?;
    let total = artists.len() as u64;
    let pb = create_progress_bar(total, "Artist info");
    let mut stats = BatchStats::default();

    for artist in &artists {
        stats.processed += 1;
        match source.artist_info(&artist.name) {
            Ok(Some(info)) => {
                if store::update_artist_info(conn, artist.id, &info)? {
                    stats.updated += 1;
                } else {
                    stats.skipped += 1;
                }
            }
            Ok(None) => stats.skipped += 1,
            Err(e) if e.is_transient() => {
                warn!("Artist info failed for {:?}: {e}", artist.name);
                stats.failed += 1;
            }
            Err(e) => return Err(e),
        }
        pb.inc(1);
        pb.set_message(stats.summary());
        log_progress("artist-info", stats.processed, total, LOG_INTERVAL);
    }

    pb.finish_and_clear();
    Ok(stats)
}

/// Fill missing song ISRCs from the song's MusicBrainz recording.
pub fn enrich_isrcs(
    conn: &Connection,
    source: &mut dyn IsrcSource,
    limit: Option<usize>,
) -> Result<BatchStats> {
    let songs = store::songs_missing_isrc(conn, limit)?;
    let total = songs.len() as u64;
    let pb = create_progress_bar(total, "ISRCs");
    let mut stats = BatchStats::default();

    for song in &songs {
        stats.processed += 1;
        let mbid = song.musicbrainz_id.as_deref().unwrap_or_default();
        if !is_mbid(mbid) {
            stats.skipped += 1;
        } else {
            match source.recording_isrcs(mbid) {
                Ok(isrcs) => match isrcs.first() {
                    Some(isrc) => {
                        store::set_song_isrc(conn, song.id, isrc)?;
                        stats.updated += 1;
                    }
                    None => stats.skipped += 1,
                },
                Err(e) if e.is_transient() => {
                    warn!("ISRC lookup failed for {:?}: {e}", song.title);
                    stats.failed += 1;
                }
                Err(e) => return Err(e),
            }
        }
        pb.inc(1);
        pb.set_message(stats.summary());
        log_progress("isrc", stats.processed, total, LOG_INTERVAL);
    }

    pb.finish_and_clear();
    Ok(stats)
}

/// Flag instrumental songs via Musixmatch. Only ever sets the flag; a
/// "has lyrics" answer leaves the row untouched.
pub fn enrich_instrumental(
    conn: &Connection,
    source: &mut dyn InstrumentalSource,
    limit: Option<usize>,
) -> Result<BatchStats> {
    let songs = store::songs_for_instrumental_check(conn, limit)?;
    let total = songs.len() as u64;
    let pb = create_progress_bar(total, "Instrumental");
    let mut stats = BatchStats::default();

    for song in &songs {
        stats.processed += 1;
        match source.is_instrumental(&song.title, &song.artist_name, song.isrc.as_deref()) {
            Ok(Some(true)) => {
                store::set_song_instrumental(conn, song.id, true)?;
                stats.updated += 1;
            }
            Ok(_) => stats.skipped += 1,
            Err(e) if e.is_transient() => {
                warn!("Instrumental check failed for {:?}: {e}", song.title);
                stats.failed += 1;
            }
            Err(e) => return Err(e),
        }
        pb.inc(1);
        pb.set_message(stats.summary());
        log_progress("instrumental", stats.processed, total, LOG_INTERVAL);
    }

    pb.finish_and_clear();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::models::{ArtistInfo, NewAlbum, NewArtist, NewSong};
    use crate::schema;
    use pretty_assertions::assert_eq;

    const RG_OK: &str = "11111111-1111-1111-1111-111111111111";
    const RG_FAIL: &str = "22222222-2222-2222-2222-222222222222";
    const REC_1: &str = "33333333-3333-3333-3333-333333333333";
    const REC_2: &str = "44444444-4444-4444-4444-444444444444";

    fn catalog() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::ensure_catalog_schema(&conn).unwrap();
        let artist_id = store::insert_artist(
            &conn,
            &NewArtist {
                name: "Daft Punk".to_string(),
                musicbrainz_id: Some("artist".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        for (title, mbid) in [("Discovery", RG_OK), ("Homework", RG_FAIL), ("Bootleg", "not-an-mbid")] {
            store::insert_album(
                &conn,
                &NewAlbum {
                    title: title.to_string(),
                    artist_id,
                    musicbrainz_id: Some(mbid.to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        }
        for (title, mbid, isrc) in [
            ("One More Time", REC_1, None),
            ("Aerodynamic", REC_2, None),
            ("Voyager", "bad", Some("GBDUW0000059")),
        ] {
            store::insert_song(
                &conn,
                &NewSong {
                    title: title.to_string(),
                    artist_id,
                    musicbrainz_id: Some(mbid.to_string()),
                    isrc: isrc.map(str::to_string),
                    ..Default::default()
                },
            )
            .unwrap();
        }
        conn
    }

    struct FakeCovers;

    impl CoverArtSource for FakeCovers {
        fn front_cover(&mut self, mbid: &str) -> Result<Vec<String>> {
            if mbid == RG_FAIL {
                return Err(PipelineError::provider("coverartarchive", "HTTP 503"));
            }
            Ok(vec![format!("https://img/{mbid}.jpg")])
        }
    }

    #[test]
    fn test_covers_skip_invalid_and_failed() {
        let conn = catalog();
        let stats = enrich_covers(&conn, &mut FakeCovers, None).unwrap();
        assert_eq!(
            stats,
            BatchStats {
                processed: 3,
                updated: 1,
                skipped: 1,
                failed: 1
            }
        );
        let cover: String = conn
            .query_row("SELECT cover_art FROM albums WHERE title = 'Discovery'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(cover, format!("[\"https://img/{RG_OK}.jpg\"]"));

        // Only the failed and invalid albums are left
        let again = enrich_covers(&conn, &mut FakeCovers, None).unwrap();
        assert_eq!(again.processed, 2);
    }

    #[test]
    fn test_covers_limit() {
        let conn = catalog();
        let stats = enrich_covers(&conn, &mut FakeCovers, Some(1)).unwrap();
        assert_eq!(stats.processed, 1);
    }

    struct FakeLastFm;

    impl ArtistInfoSource for FakeLastFm {
        fn artist_info(&mut self, _name: &str) -> Result<Option<ArtistInfo>> {
            Ok(Some(ArtistInfo {
                bio: Some("French duo.".to_string()),
                images: vec!["https://img/dp.png".to_string()],
                tags: vec!["house".to_string()],
            }))
        }
    }

    #[test]
    fn test_artist_info() {
        let conn = catalog();
        let stats = enrich_artist_info(&conn, &mut FakeLastFm, None).unwrap();
        assert_eq!(stats.updated, 1);
        let (bio, genres): (String, String) = conn
            .query_row("SELECT bio, genres FROM artists", [], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap();
        assert_eq!(bio, "French duo.");
        assert_eq!(genres, "[\"house\"]");
        assert!(store::artists_missing_info(&conn, None).unwrap().is_empty());
    }

    struct FakeIsrcs;

    impl IsrcSource for FakeIsrcs {
        fn recording_isrcs(&mut self, mbid: &str) -> Result<Vec<String>> {
            if mbid == REC_1 {
                Ok(vec!["GBDUW0000053".to_string(), "GBDUW0000099".to_string()])
            } else {
                Ok(Vec::new())
            }
        }
    }

    #[test]
    fn test_isrcs_take_first() {
        let conn = catalog();
        let stats = enrich_isrcs(&conn, &mut FakeIsrcs, None).unwrap();
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.skipped, 1);
        let isrc: String = conn
            .query_row("SELECT isrc FROM songs WHERE title = 'One More Time'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(isrc, "GBDUW0000053");
    }

    struct IsrcMeansInstrumental;

    impl InstrumentalSource for IsrcMeansInstrumental {
        fn is_instrumental(&mut self, _title: &str, _artist: &str, isrc: Option<&str>) -> Result<Option<bool>> {
            Ok(Some(isrc.is_some()))
        }
    }

    #[test]
    fn test_instrumental_only_sets_flag() {
        let conn = catalog();
        let stats = enrich_instrumental(&conn, &mut IsrcMeansInstrumental, None).unwrap();
        assert_eq!(stats.processed, 3);
        assert_eq!(stats.updated, 1);
        let flagged: Vec<String> = conn
            .prepare("SELECT title FROM songs WHERE is_instrumental = 1")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(flagged, vec!["Voyager"]);
    }
}
