//! Catalog reads and writes.
//!
//! Plain parameterized statements over the surrogate-keyed schema. Every
//! function takes a `&Connection`, so callers decide whether it runs inside a
//! transaction (a `Transaction` derefs to `Connection`).

use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{
    json_list, AlbumId, AlbumRow, ArtistId, ArtistInfo, ArtistRow, CatalogCounts, NewAlbum,
    NewArtist, NewSong, SongId, SongRow,
};
use crate::schema;
use crate::slug::create_slug;

pub fn now_ts() -> i64 {
    Utc::now().timestamp()
}

/// Open (or create) a catalog database file and make sure the schema exists.
pub fn open_catalog(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
    schema::ensure_catalog_schema(&conn)?;
    Ok(conn)
}

// ============================================================================
// Import
// ============================================================================

pub fn find_artist_by_mbid(conn: &Connection, mbid: &str) -> Result<Option<ArtistId>> {
    let id = conn
        .query_row(
            "SELECT id FROM artists WHERE musicbrainz_id = ?1",
            [mbid],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub fn find_album_by_mbid(conn: &Connection, mbid: &str) -> Result<Option<AlbumId>> {
    let id = conn
        .query_row(
            "SELECT id FROM albums WHERE musicbrainz_id = ?1",
            [mbid],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub fn insert_artist(conn: &Connection, artist: &NewArtist) -> Result<ArtistId> {
    let slug = create_slug(&artist.name);
    let now = now_ts();
    let ids = &artist.external_ids;
    let external_ids = if ids.is_empty() {
        None
    } else {
        Some(serde_json::to_string(ids)?)
    };
    conn.execute(
        "INSERT INTO artists (
            name, slug, url_slug, country, formed_year, genres, musicbrainz_id,
            wikidata_id, discogs_artist_id, spotify_artist_id, lastfm_url, genius_artist_id,
            external_ids, created_at, updated_at
         ) VALUES (?1, ?2, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
        params![
            artist.name,
            slug,
            artist.country,
            artist.formed_year,
            json_list(&artist.genres),
            artist.musicbrainz_id,
            ids.wikidata,
            ids.discogs,
            ids.spotify,
            ids.lastfm,
            ids.genius,
            external_ids,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_album(conn: &Connection, album: &NewAlbum) -> Result<AlbumId> {
    let now = now_ts();
    conn.execute(
        "INSERT INTO albums (
            title, slug, artist_id, release_date, track_count, musicbrainz_id,
            created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            album.title,
            create_slug(&album.title),
            album.artist_id,
            album.release_date,
            album.track_count,
            album.musicbrainz_id,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Insert a song unless its recording id is already stored. Returns true if a row was added.
pub fn insert_song(conn: &Connection, song: &NewSong) -> Result<bool> {
    let now = now_ts();
    let changed = conn.execute(
        "INSERT OR IGNORE INTO songs (
            title, slug, duration, artist_id, album_id, release_date, isrc,
            is_instrumental, musicbrainz_id, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        params![
            song.title,
            create_slug(&song.title),
            song.duration,
            song.artist_id,
            song.album_id,
            song.release_date,
            song.isrc,
            song.is_instrumental,
            song.musicbrainz_id,
            now,
        ],
    )?;
    Ok(changed > 0)
}

pub fn set_album_track_count(conn: &Connection, album_id: AlbumId, count: i64) -> Result<()> {
    conn.execute(
        "UPDATE albums SET track_count = ?1, updated_at = ?2 WHERE id = ?3",
        params![count, now_ts(), album_id],
    )?;
    Ok(())
}

/// Titles of an album's songs, ordered by title.
pub fn album_song_titles(conn: &Connection, album_id: AlbumId) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT title FROM songs WHERE album_id = ?1 ORDER BY title")?;
    let titles = stmt
        .query_map([album_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(titles)
}

pub fn count_album_songs(conn: &Connection, album_id: AlbumId) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM songs WHERE album_id = ?1",
        [album_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

// ============================================================================
// Enrichment
// ============================================================================

/// Albums without cover art whose MusicBrainz id is set.
pub fn albums_missing_cover_art(conn: &Connection, limit: Option<usize>) -> Result<Vec<AlbumRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, musicbrainz_id FROM albums
         WHERE (cover_art IS NULL OR cover_art = '' OR cover_art = '[]')
           AND musicbrainz_id IS NOT NULL
         ORDER BY id
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([sql_limit(limit)], |row| {
            Ok(AlbumRow {
                id: row.get(0)?,
                title: row.get(1)?,
                musicbrainz_id: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn set_album_cover_art(conn: &Connection, album_id: AlbumId, urls: &[String]) -> Result<()> {
    conn.execute(
        "UPDATE albums SET cover_art = ?1, updated_at = ?2 WHERE id = ?3",
        params![json_list(urls), now_ts(), album_id],
    )?;
    Ok(())
}

/// Artists with no bio or no images.
pub fn artists_missing_info(conn: &Connection, limit: Option<usize>) -> Result<Vec<ArtistRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, musicbrainz_id FROM artists
         WHERE bio IS NULL OR bio = '' OR images IS NULL OR images = '' OR images = '[]'
         ORDER BY id
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([sql_limit(limit)], |row| {
            Ok(ArtistRow {
                id: row.get(0)?,
                name: row.get(1)?,
                musicbrainz_id: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Fill bio and images where the fetched info has them; genres only when the
/// artist has none. Returns true if any column changed.
pub fn update_artist_info(conn: &Connection, artist_id: ArtistId, info: &ArtistInfo) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE artists SET
            bio = COALESCE(?1, bio),
            images = COALESCE(?2, images),
            genres = CASE WHEN genres IS NULL OR genres = '' OR genres = '[]' THEN COALESCE(?3, genres) ELSE genres END,
            updated_at = ?4
         WHERE id = ?5
           AND (?1 IS NOT NULL OR ?2 IS NOT NULL OR ?3 IS NOT NULL)",
        params![
            info.bio,
            json_list(&info.images),
            json_list(&info.tags),
            now_ts(),
            artist_id,
        ],
    )?;
    Ok(changed > 0)
}

fn song_rows(conn: &Connection, sql: &str, limit: Option<usize>) -> Result<Vec<SongRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([sql_limit(limit)], |row| {
            Ok(SongRow {
                id: row.get(0)?,
                title: row.get(1)?,
                artist_name: row.get(2)?,
                musicbrainz_id: row.get(3)?,
                isrc: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn songs_missing_isrc(conn: &Connection, limit: Option<usize>) -> Result<Vec<SongRow>> {
    song_rows(
        conn,
        "SELECT s.id, s.title, ar.name, s.musicbrainz_id, s.isrc
         FROM songs s JOIN artists ar ON ar.id = s.artist_id
         WHERE (s.isrc IS NULL OR s.isrc = '') AND s.musicbrainz_id IS NOT NULL
         ORDER BY s.id
         LIMIT ?1",
        limit,
    )
}

/// Songs not yet flagged instrumental.
pub fn songs_for_instrumental_check(conn: &Connection, limit: Option<usize>) -> Result<Vec<SongRow>> {
    song_rows(
        conn,
        "SELECT s.id, s.title, ar.name, s.musicbrainz_id, s.isrc
         FROM songs s JOIN artists ar ON ar.id = s.artist_id
         WHERE s.is_instrumental = 0
         ORDER BY s.id
         LIMIT ?1",
        limit,
    )
}

pub fn set_song_isrc(conn: &Connection, song_id: SongId, isrc: &str) -> Result<()> {
    conn.execute(
        "UPDATE songs SET isrc = ?1, updated_at = ?2 WHERE id = ?3",
        params![isrc, now_ts(), song_id],
    )?;
    Ok(())
}

pub fn set_song_instrumental(conn: &Connection, song_id: SongId, instrumental: bool) -> Result<()> {
    conn.execute(
        "UPDATE songs SET is_instrumental = ?1, updated_at = ?2 WHERE id = ?3",
        params![instrumental, now_ts(), song_id],
    )?;
    Ok(())
}

/// LIMIT -1 means no limit in SQLite.
fn sql_limit(limit: Option<usize>) -> i64 {
    limit.map(|n| n as i64).unwrap_or(-1)
}

// ============================================================================
// Reporting and Reset
// ============================================================================

fn count(conn: &Connection, sql: &str) -> Result<i64> {
    Ok(conn.query_row(sql, [], |row| row.get(0))?)
}

pub fn catalog_counts(conn: &Connection) -> Result<CatalogCounts> {
    Ok(CatalogCounts {
        artists: count(conn, "SELECT COUNT(*) FROM artists")?,
        albums: count(conn, "SELECT COUNT(*) FROM albums")?,
        songs: count(conn, "SELECT COUNT(*) FROM songs")?,
        artists_without_bio: count(conn, "SELECT COUNT(*) FROM artists WHERE bio IS NULL OR bio = ''")?,
        artists_without_images: count(
            conn,
            "SELECT COUNT(*) FROM artists WHERE images IS NULL OR images = '' OR images = '[]'",
        )?,
        artists_without_genres: count(
            conn,
            "SELECT COUNT(*) FROM artists WHERE genres IS NULL OR genres = '' OR genres = '[]'",
        )?,
        albums_without_cover_art: count(
            conn,
            "SELECT COUNT(*) FROM albums WHERE cover_art IS NULL OR cover_art = '' OR cover_art = '[]'",
        )?,
        songs_without_lyrics: count(conn, "SELECT COUNT(*) FROM songs WHERE lyrics IS NULL OR lyrics = ''")?,
        songs_without_duration: count(conn, "SELECT COUNT(*) FROM songs WHERE duration IS NULL")?,
        songs_without_isrc: count(conn, "SELECT COUNT(*) FROM songs WHERE isrc IS NULL OR isrc = ''")?,
    })
}

/// Delete every catalog row and reset the autoincrement counters.
pub fn wipe(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        "DELETE FROM songs;
         DELETE FROM albums;
         DELETE FROM artists;",
    )?;
    if schema::table_exists(&tx, "sqlite_sequence")? {
        tx.execute(
            "DELETE FROM sqlite_sequence WHERE name IN ('artists', 'albums', 'songs')",
            [],
        )?;
    }
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExternalIds;

    fn catalog() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::ensure_catalog_schema(&conn).unwrap();
        conn
    }

    fn artist(conn: &Connection, name: &str, mbid: &str) -> ArtistId {
        insert_artist(
            conn,
            &NewArtist {
                name: name.to_string(),
                musicbrainz_id: Some(mbid.to_string()),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_insert_artist_assigns_slug_and_ids() {
        let conn = catalog();
        let id = insert_artist(
            &conn,
            &NewArtist {
                name: "Sigur Rós".to_string(),
                musicbrainz_id: Some("f6f2a6e4-4a55-4f8a-b3c2-b0e3e4c5c5a1".to_string()),
                country: Some("IS".to_string()),
                formed_year: Some(1994),
                genres: vec!["post-rock".to_string()],
                external_ids: ExternalIds {
                    spotify: Some("6UUrUCIZtQeOf8tC0WuzRy".to_string()),
                    ..Default::default()
                },
            },
        )
        .unwrap();
        let (slug, genres, spotify, blob): (String, String, String, String) = conn
            .query_row(
                "SELECT slug, genres, spotify_artist_id, external_ids FROM artists WHERE id = ?1",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .unwrap();
        assert_eq!(slug, "sigur-ros");
        assert_eq!(genres, r#"["post-rock"]"#);
        assert_eq!(spotify, "6UUrUCIZtQeOf8tC0WuzRy");
        assert_eq!(blob, r#"{"spotify":"6UUrUCIZtQeOf8tC0WuzRy"}"#);
        assert_eq!(
            find_artist_by_mbid(&conn, "f6f2a6e4-4a55-4f8a-b3c2-b0e3e4c5c5a1").unwrap(),
            Some(id)
        );
        assert_eq!(find_artist_by_mbid(&conn, "missing").unwrap(), None);
    }

    #[test]
    fn test_duplicate_recording_is_ignored() {
        let conn = catalog();
        let artist_id = artist(&conn, "Daft Punk", "a");
        let album_id = insert_album(
            &conn,
            &NewAlbum {
                title: "Discovery".to_string(),
                artist_id,
                musicbrainz_id: Some("rg".to_string()),
                track_count: 1,
                ..Default::default()
            },
        )
        .unwrap();
        let song = NewSong {
            title: "One More Time".to_string(),
            artist_id,
            album_id: Some(album_id),
            musicbrainz_id: Some("rec".to_string()),
            ..Default::default()
        };
        assert!(insert_song(&conn, &song).unwrap());
        assert!(!insert_song(&conn, &song).unwrap());
        assert_eq!(count_album_songs(&conn, album_id).unwrap(), 1);
        assert_eq!(album_song_titles(&conn, album_id).unwrap(), vec!["One More Time"]);
    }

    #[test]
    fn test_update_artist_info_keeps_existing_genres() {
        let conn = catalog();
        let id = insert_artist(
            &conn,
            &NewArtist {
                name: "Air".to_string(),
                genres: vec!["downtempo".to_string()],
                ..Default::default()
            },
        )
        .unwrap();
        let info = ArtistInfo {
            bio: Some("French duo.".to_string()),
            images: vec!["https://img/a.png".to_string()],
            tags: vec!["electronic".to_string()],
        };
        assert!(update_artist_info(&conn, id, &info).unwrap());
        let (bio, genres): (String, String) = conn
            .query_row("SELECT bio, genres FROM artists WHERE id = ?1", [id], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(bio, "French duo.");
        assert_eq!(genres, r#"["downtempo"]"#);
        assert!(artists_missing_info(&conn, None).unwrap().is_empty());

        // Nothing to write
        assert!(!update_artist_info(&conn, id, &ArtistInfo::default()).unwrap());
    }

    #[test]
    fn test_counts_and_wipe() {
        let mut conn = catalog();
        let artist_id = artist(&conn, "Justice", "j");
        insert_song(
            &conn,
            &NewSong {
                title: "Genesis".to_string(),
                artist_id,
                ..Default::default()
            },
        )
        .unwrap();

        let counts = catalog_counts(&conn).unwrap();
        assert_eq!(counts.artists, 1);
        assert_eq!(counts.songs, 1);
        assert_eq!(counts.artists_without_bio, 1);
        assert_eq!(counts.songs_without_isrc, 1);
        assert_eq!(songs_missing_isrc(&conn, None).unwrap().len(), 0);
        assert_eq!(songs_for_instrumental_check(&conn, Some(10)).unwrap().len(), 1);

        wipe(&mut conn).unwrap();
        assert_eq!(catalog_counts(&conn).unwrap(), CatalogCounts::default());
        // Counters restart
        assert_eq!(artist(&conn, "Justice", "j"), 1);
    }

    #[test]
    fn test_open_catalog_creates_file_and_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("catalog.sqlite3");
        let conn = open_catalog(&path).unwrap();
        assert!(path.exists());
        assert!(schema::table_exists(&conn, "songs").unwrap());
    }
}
