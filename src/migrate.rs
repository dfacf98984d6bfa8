//! MusicBrainz-keyed catalog → surrogate-keyed catalog.
//!
//! Runs once per database. New `*_new` tables are created next to the legacy
//! ones, rows are copied parent-first while old → new key maps are built from
//! each insert's rowid, indexes are built, and the new tables are swapped into
//! place. Everything happens inside a single transaction; any failure leaves
//! the legacy tables exactly as they were.

use log::{info, warn};
use rusqlite::{params, Connection, Transaction};
use rustc_hash::FxHashMap;

use crate::error::{PipelineError, Result};
use crate::models::{json_blob_field, AlbumId, ArtistId};
use crate::schema::{self, CATALOG_TABLES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    NotStarted,
    TablesCreated,
    ArtistsCopied,
    AlbumsCopied,
    SongsCopied,
    IndexesBuilt,
    TablesSwapped,
    Committed,
    RolledBack,
}

impl MigrationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, MigrationState::Committed | MigrationState::RolledBack)
    }
}

/// Old MusicBrainz key → new surrogate key.
pub type KeyMap = FxHashMap<String, i64>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    pub artists: usize,
    pub albums: usize,
    pub songs: usize,
    /// Albums dropped because their artist was never migrated.
    pub skipped_albums: usize,
    /// Songs dropped because their artist was never migrated.
    pub skipped_songs: usize,
    /// Songs kept as singles because their album was never migrated.
    pub detached_songs: usize,
    pub warnings: Vec<String>,
}

/// Observer hook, called on every forward transition. Returning an error
/// aborts the run at that point.
pub type Observer<'a> = dyn FnMut(MigrationState) -> std::result::Result<(), String> + 'a;

/// Migrate with state transitions logged at info level.
pub fn migrate(conn: &mut Connection) -> Result<MigrationReport> {
    migrate_with(conn, &mut |state| {
        info!("Migration state: {state:?}");
        Ok(())
    })
}

/// Migrate, reporting each state transition to `observer`.
pub fn migrate_with(conn: &mut Connection, observer: &mut Observer) -> Result<MigrationReport> {
    if !schema::table_exists(conn, "artists")? || !schema::is_legacy_schema(conn)? {
        return Err(PipelineError::Config(
            "catalog is not keyed by MusicBrainz ids; nothing to migrate".to_string(),
        ));
    }

    let mut migration = Migration {
        state: MigrationState::NotStarted,
        report: MigrationReport::default(),
    };

    let tx = conn.transaction()?;
    let outcome = migration.run(&tx, observer).and_then(|_| {
        tx.commit().map_err(|e| migration.fail(e.to_string()))
    });

    match outcome {
        Ok(()) => {
            migration.state = MigrationState::Committed;
            // Committed is terminal: the observer cannot undo it.
            let _ = observer(MigrationState::Committed);
            info!(
                "Migrated {} artists, {} albums, {} songs",
                migration.report.artists, migration.report.albums, migration.report.songs
            );
            Ok(migration.report)
        }
        Err(e) => {
            // `tx` was either consumed by a failed commit or is dropped here;
            // both roll back.
            warn!("Migration rolled back: {e}");
            let _ = observer(MigrationState::RolledBack);
            Err(e)
        }
    }
}

struct Migration {
    state: MigrationState,
    report: MigrationReport,
}

impl Migration {
    fn fail(&self, message: String) -> PipelineError {
        PipelineError::Migration {
            state: self.state,
            message,
        }
    }

    /// Record `next` as reached, then report it. The step's work is already
    /// done, so an observer veto fails the run from `next`.
    fn advance(&mut self, next: MigrationState, observer: &mut Observer) -> Result<()> {
        self.state = next;
        observer(next).map_err(|message| self.fail(message))
    }

    /// Tag a step's error with the last state reached.
    fn guard<T>(&self, r: Result<T>) -> Result<T> {
        r.map_err(|e| self.fail(e.to_string()))
    }

    fn run(&mut self, tx: &Transaction, observer: &mut Observer) -> Result<()> {
        let r = tx
            .execute_batch(&schema::catalog_schema_sql("_new"))
            .map_err(PipelineError::from);
        self.guard(r)?;
        self.advance(MigrationState::TablesCreated, observer)?;

        let r = copy_artists(tx, &mut self.report);
        let artist_map = self.guard(r)?;
        self.advance(MigrationState::ArtistsCopied, observer)?;

        let r = copy_albums(tx, &artist_map, &mut self.report);
        let album_map = self.guard(r)?;
        self.advance(MigrationState::AlbumsCopied, observer)?;

        let r = copy_songs(tx, &artist_map, &album_map, &mut self.report);
        self.guard(r)?;
        self.advance(MigrationState::SongsCopied, observer)?;

        let r = tx
            .execute_batch(&schema::catalog_index_sql("_new"))
            .map_err(PipelineError::from);
        self.guard(r)?;
        self.advance(MigrationState::IndexesBuilt, observer)?;

        let r = swap_tables(tx);
        self.guard(r)?;
        self.advance(MigrationState::TablesSwapped, observer)?;
        Ok(())
    }
}

// ============================================================================
// Copy steps
// ============================================================================

struct LegacyArtist {
    id: String,
    name: String,
    slug: String,
    url_slug: Option<String>,
    country: Option<String>,
    formed_year: Option<i64>,
    genres: Option<String>,
    members: Option<String>,
    bio: Option<String>,
    images: Option<String>,
    wikidata_id: Option<String>,
    external_ids: Option<String>,
    created_at: i64,
    updated_at: i64,
}

fn copy_artists(tx: &Transaction, report: &mut MigrationReport) -> Result<KeyMap> {
    let artists = {
        let mut stmt = tx.prepare(
            "SELECT id, name, slug, url_slug, country, formed_year, genres, members, bio,
                    images, wikidata_id, external_ids, created_at, updated_at
             FROM artists ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(LegacyArtist {
                id: row.get(0)?,
                name: row.get(1)?,
                slug: row.get(2)?,
                url_slug: row.get(3)?,
                country: row.get(4)?,
                formed_year: row.get(5)?,
                genres: row.get(6)?,
                members: row.get(7)?,
                bio: row.get(8)?,
                images: row.get(9)?,
                wikidata_id: row.get(10)?,
                external_ids: row.get(11)?,
                created_at: row.get(12)?,
                updated_at: row.get(13)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()?
    };

    let mut map = KeyMap::default();
    let mut insert = tx.prepare(
        "INSERT INTO artists_new (
            name, slug, url_slug, country, formed_year, genres, members, bio, images,
            musicbrainz_id, wikidata_id, discogs_artist_id, spotify_artist_id, lastfm_url,
            genius_artist_id, isni, external_ids, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
    )?;
    for a in &artists {
        let blob = a.external_ids.as_deref();
        insert.execute(params![
            a.name,
            a.slug,
            a.url_slug.as_deref().unwrap_or(&a.slug),
            a.country,
            a.formed_year,
            a.genres,
            a.members,
            a.bio,
            a.images,
            a.id,
            a.wikidata_id,
            json_blob_field(blob, &["discogs", "discogs_artist_id", "discogs_id"]),
            json_blob_field(blob, &["spotify", "spotify_artist_id", "spotify_id"]),
            json_blob_field(blob, &["lastfm", "lastfm_url"]),
            json_blob_field(blob, &["genius", "genius_artist_id", "genius_id"]),
            json_blob_field(blob, &["isni"]),
            a.external_ids,
            a.created_at,
            a.updated_at,
        ])?;
        let new_id: ArtistId = tx.last_insert_rowid();
        map.insert(a.id.clone(), new_id);
    }
    report.artists = map.len();
    Ok(map)
}

struct LegacyAlbum {
    id: String,
    title: String,
    slug: String,
    artist_id: String,
    release_date: Option<i64>,
    track_count: Option<i64>,
    genres: Option<String>,
    cover_art: Option<String>,
    credits: Option<String>,
    wikidata_id: Option<String>,
    external_ids: Option<String>,
    created_at: i64,
    updated_at: i64,
}

fn copy_albums(
    tx: &Transaction,
    artist_map: &KeyMap,
    report: &mut MigrationReport,
) -> Result<KeyMap> {
    let albums = {
        let mut stmt = tx.prepare(
            "SELECT id, title, slug, artist_id, release_date, track_count, genres, cover_art,
                    credits, wikidata_id, external_ids, created_at, updated_at
             FROM albums ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(LegacyAlbum {
                id: row.get(0)?,
                title: row.get(1)?,
                slug: row.get(2)?,
                artist_id: row.get(3)?,
                release_date: row.get(4)?,
                track_count: row.get(5)?,
                genres: row.get(6)?,
                cover_art: row.get(7)?,
                credits: row.get(8)?,
                wikidata_id: row.get(9)?,
                external_ids: row.get(10)?,
                created_at: row.get(11)?,
                updated_at: row.get(12)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()?
    };

    let mut map = KeyMap::default();
    let mut insert = tx.prepare(
        "INSERT INTO albums_new (
            title, slug, artist_id, release_date, track_count, genres, cover_art, credits,
            musicbrainz_id, wikidata_id, discogs_master_id, spotify_album_id, barcode,
            catalog_number, external_ids, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
    )?;
    for a in &albums {
        let Some(&artist_id) = artist_map.get(&a.artist_id) else {
            let message = format!(
                "album {} ({}) skipped: artist {} was not migrated",
                a.id, a.title, a.artist_id
            );
            warn!("{message}");
            report.warnings.push(message);
            report.skipped_albums += 1;
            continue;
        };
        let blob = a.external_ids.as_deref();
        insert.execute(params![
            a.title,
            a.slug,
            artist_id,
            a.release_date,
            a.track_count,
            a.genres,
            a.cover_art,
            a.credits,
            a.id,
            a.wikidata_id,
            json_blob_field(blob, &["discogs", "discogs_master_id"]),
            json_blob_field(blob, &["spotify", "spotify_album_id", "spotify_id"]),
            json_blob_field(blob, &["barcode"]),
            json_blob_field(blob, &["catalog_number", "catalogNumber"]),
            a.external_ids,
            a.created_at,
            a.updated_at,
        ])?;
        let new_id: AlbumId = tx.last_insert_rowid();
        map.insert(a.id.clone(), new_id);
    }
    report.albums = map.len();
    Ok(map)
}

struct LegacySong {
    id: String,
    title: String,
    slug: String,
    duration: Option<i64>,
    artist_id: String,
    album_id: Option<String>,
    release_date: Option<i64>,
    lyrics: Option<String>,
    annotations: Option<String>,
    credits: Option<String>,
    wikidata_id: Option<String>,
    isrc: Option<String>,
    external_ids: Option<String>,
    created_at: i64,
    updated_at: i64,
}

fn copy_songs(
    tx: &Transaction,
    artist_map: &KeyMap,
    album_map: &KeyMap,
    report: &mut MigrationReport,
) -> Result<()> {
    let songs = {
        let mut stmt = tx.prepare(
            "SELECT id, title, slug, duration, artist_id, album_id, release_date, lyrics,
                    annotations, credits, wikidata_id, isrc, external_ids, created_at, updated_at
             FROM songs ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(LegacySong {
                id: row.get(0)?,
                title: row.get(1)?,
                slug: row.get(2)?,
                duration: row.get(3)?,
                artist_id: row.get(4)?,
                album_id: row.get(5)?,
                release_date: row.get(6)?,
                lyrics: row.get(7)?,
                annotations: row.get(8)?,
                credits: row.get(9)?,
                wikidata_id: row.get(10)?,
                isrc: row.get(11)?,
                external_ids: row.get(12)?,
                created_at: row.get(13)?,
                updated_at: row.get(14)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()?
    };

    let mut insert = tx.prepare(
        "INSERT INTO songs_new (
            title, slug, duration, artist_id, album_id, release_date, lyrics, annotations,
            credits, musicbrainz_id, wikidata_id, isrc, spotify_track_id, genius_song_id,
            acoustid, external_ids, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
    )?;
    for s in &songs {
        let Some(&artist_id) = artist_map.get(&s.artist_id) else {
            let message = format!(
                "song {} ({}) skipped: artist {} was not migrated",
                s.id, s.title, s.artist_id
            );
            warn!("{message}");
            report.warnings.push(message);
            report.skipped_songs += 1;
            continue;
        };
        let album_id = match s.album_id.as_deref() {
            None => None,
            Some(old) => match album_map.get(old) {
                Some(&id) => Some(id),
                None => {
                    let message = format!(
                        "song {} ({}) kept as single: album {} was not migrated",
                        s.id, s.title, old
                    );
                    warn!("{message}");
                    report.warnings.push(message);
                    report.detached_songs += 1;
                    None
                }
            },
        };
        let blob = s.external_ids.as_deref();
        insert.execute(params![
            s.title,
            s.slug,
            s.duration,
            artist_id,
            album_id,
            s.release_date,
            s.lyrics,
            s.annotations,
            s.credits,
            s.id,
            s.wikidata_id,
            s.isrc,
            json_blob_field(blob, &["spotify", "spotify_track_id", "spotify_id"]),
            json_blob_field(blob, &["genius", "genius_song_id", "genius_id"]),
            json_blob_field(blob, &["acoustid"]),
            s.external_ids,
            s.created_at,
            s.updated_at,
        ])?;
        report.songs += 1;
    }
    Ok(())
}

fn swap_tables(tx: &Transaction) -> Result<()> {
    // Children first
    for table in CATALOG_TABLES.iter().rev() {
        tx.execute_batch(&format!("DROP TABLE {table};"))?;
    }
    for table in CATALOG_TABLES {
        tx.execute_batch(&format!("ALTER TABLE {table}_new RENAME TO {table};"))?;
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DAFT: &str = "056e4f3e-d505-4dad-8ec1-d04f521cbb56";
    const AIR: &str = "cb67438a-7f50-4f2b-a6f1-2bb2729fd538";
    const DISCOVERY: &str = "48117b90-a16e-34ca-a514-19c702df1158";
    const MOON: &str = "9d0d0a7e-ec0f-3b1f-8f7f-6d0c9e9f1a2b";

    fn legacy_catalog() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(schema::LEGACY_SCHEMA).unwrap();
        conn.execute_batch(&format!(
            "INSERT INTO artists (id, name, slug, url_slug, external_ids, created_at, updated_at) VALUES
                ('{DAFT}', 'Daft Punk', 'daft-punk', 'daft-punk', '{{\"spotify\":\"4tZwfgrHOc3mvqYlEYSvVi\",\"discogs\":1289}}', 1, 1),
                ('{AIR}', 'Air', 'air', NULL, NULL, 2, 2);
             INSERT INTO albums (id, title, slug, artist_id, track_count, created_at, updated_at) VALUES
                ('{DISCOVERY}', 'Discovery', 'discovery', '{DAFT}', 2, 1, 1),
                ('{MOON}', 'Moon Safari', 'moon-safari', '{AIR}', 1, 2, 2),
                ('orphan-album', 'Lost', 'lost', 'missing-artist', 1, 3, 3);
             INSERT INTO songs (id, title, slug, artist_id, album_id, isrc, created_at, updated_at) VALUES
                ('rec-1', 'One More Time', 'one-more-time', '{DAFT}', '{DISCOVERY}', 'GBDUW0000053', 1, 1),
                ('rec-2', 'Aerodynamic', 'aerodynamic', '{DAFT}', '{DISCOVERY}', NULL, 1, 1),
                ('rec-3', 'La Femme d''Argent', 'la-femme-dargent', '{AIR}', '{MOON}', NULL, 2, 2),
                ('rec-4', 'Da Funk', 'da-funk', '{DAFT}', NULL, NULL, 1, 1),
                ('rec-5', 'Lost Track', 'lost-track', '{DAFT}', 'orphan-album', NULL, 3, 3),
                ('rec-6', 'Ghost', 'ghost', 'missing-artist', NULL, NULL, 3, 3);"
        ))
        .unwrap();
        conn
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_migration_walks_every_state() {
        let mut conn = legacy_catalog();
        let mut seen = Vec::new();
        let report = migrate_with(&mut conn, &mut |state| {
            seen.push(state);
            Ok(())
        })
        .unwrap();

        assert_eq!(
            seen,
            vec![
                MigrationState::TablesCreated,
                MigrationState::ArtistsCopied,
                MigrationState::AlbumsCopied,
                MigrationState::SongsCopied,
                MigrationState::IndexesBuilt,
                MigrationState::TablesSwapped,
                MigrationState::Committed,
            ]
        );
        assert_eq!(report.artists, 2);
        assert_eq!(report.albums, 2);
        assert_eq!(report.songs, 5);
        assert_eq!(report.skipped_albums, 1);
        assert_eq!(report.skipped_songs, 1);
        assert_eq!(report.detached_songs, 1);
        assert_eq!(report.warnings.len(), 3);
        assert!(!schema::is_legacy_schema(&conn).unwrap());
        assert!(!schema::table_exists(&conn, "artists_new").unwrap());
    }

    #[test]
    fn test_migration_referential_integrity() {
        let mut conn = legacy_catalog();
        migrate(&mut conn).unwrap();

        let dangling_albums: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM albums al LEFT JOIN artists ar ON ar.id = al.artist_id WHERE ar.id IS NULL",
                [],
                |row| row.get(0),
            )
            .unwrap();
        let dangling_songs: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM songs s
                 LEFT JOIN artists ar ON ar.id = s.artist_id
                 LEFT JOIN albums al ON al.id = s.album_id
                 WHERE ar.id IS NULL OR (s.album_id IS NOT NULL AND al.id IS NULL)",
                [],
                |row| row.get(0),
            )
            .unwrap();
        let mismatched: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM songs s JOIN albums al ON al.id = s.album_id
                 WHERE al.artist_id != s.artist_id",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(dangling_albums, 0);
        assert_eq!(dangling_songs, 0);
        assert_eq!(mismatched, 0);

        // Old keys survive as the unique secondary column
        let (album_artist, discovery_artist): (i64, String) = conn
            .query_row(
                "SELECT al.artist_id, ar.musicbrainz_id FROM albums al JOIN artists ar ON ar.id = al.artist_id
                 WHERE al.musicbrainz_id = ?1",
                [DISCOVERY],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(album_artist, 1);
        assert_eq!(discovery_artist, DAFT);
    }

    #[test]
    fn test_migration_fills_typed_columns() {
        let mut conn = legacy_catalog();
        migrate(&mut conn).unwrap();
        let (spotify, discogs, url_slug): (String, String, String) = conn
            .query_row(
                "SELECT spotify_artist_id, discogs_artist_id, url_slug FROM artists WHERE musicbrainz_id = ?1",
                [DAFT],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(spotify, "4tZwfgrHOc3mvqYlEYSvVi");
        assert_eq!(discogs, "1289");
        assert_eq!(url_slug, "daft-punk");

        // Missing url_slug falls back to slug
        let air_slug: String = conn
            .query_row("SELECT url_slug FROM artists WHERE musicbrainz_id = ?1", [AIR], |row| row.get(0))
            .unwrap();
        assert_eq!(air_slug, "air");

        let detached: Option<i64> = conn
            .query_row("SELECT album_id FROM songs WHERE musicbrainz_id = 'rec-5'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(detached, None);
    }

    #[test]
    fn test_fault_after_albums_rolls_back() {
        let mut conn = legacy_catalog();
        let mut seen = Vec::new();
        let err = migrate_with(&mut conn, &mut |state| {
            seen.push(state);
            if state == MigrationState::AlbumsCopied {
                Err("forced fault".to_string())
            } else {
                Ok(())
            }
        })
        .unwrap_err();

        match err {
            PipelineError::Migration { state, message } => {
                // Albums were copied when the fault hit
                assert_eq!(state, MigrationState::AlbumsCopied);
                assert_eq!(message, "forced fault");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(seen.last(), Some(&MigrationState::RolledBack));

        assert!(schema::is_legacy_schema(&conn).unwrap());
        for table in CATALOG_TABLES {
            assert!(!schema::table_exists(&conn, &format!("{table}_new")).unwrap());
        }
        assert_eq!(count(&conn, "artists"), 2);
        assert_eq!(count(&conn, "albums"), 3);
        assert_eq!(count(&conn, "songs"), 6);
        let title: String = conn
            .query_row("SELECT title FROM albums WHERE id = ?1", [DISCOVERY], |row| row.get(0))
            .unwrap();
        assert_eq!(title, "Discovery");
    }

    #[test]
    fn test_refuses_current_schema() {
        let mut conn = Connection::open_in_memory().unwrap();
        schema::ensure_catalog_schema(&conn).unwrap();
        assert!(matches!(migrate(&mut conn), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_terminal_states() {
        assert!(MigrationState::Committed.is_terminal());
        assert!(MigrationState::RolledBack.is_terminal());
        assert!(!MigrationState::SongsCopied.is_terminal());
    }
}
