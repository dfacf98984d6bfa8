//! Catalog DDL.
//!
//! Two schemas exist. The legacy one keys every table by the MusicBrainz id
//! (`id TEXT`); the current one uses surrogate `INTEGER` keys and keeps the
//! MusicBrainz id as a unique secondary column. Both are created without
//! REFERENCES clauses: parent links are checked by staging validation instead.

use rusqlite::Connection;

use crate::error::Result;

/// Catalog tables in parent → child order.
pub const CATALOG_TABLES: [&str; 3] = ["artists", "albums", "songs"];

/// Legacy MBID-keyed schema, as produced by the first import scripts.
pub const LEGACY_SCHEMA: &str = "
    CREATE TABLE artists (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        slug TEXT NOT NULL,
        url_slug TEXT,
        country TEXT,
        formed_year INTEGER,
        genres TEXT,
        members TEXT,
        bio TEXT,
        images TEXT,
        wikidata_id TEXT,
        external_ids TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE TABLE albums (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        slug TEXT NOT NULL,
        artist_id TEXT NOT NULL,
        release_date INTEGER,
        track_count INTEGER,
        genres TEXT,
        cover_art TEXT,
        credits TEXT,
        wikidata_id TEXT,
        external_ids TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE TABLE songs (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        slug TEXT NOT NULL,
        duration INTEGER,
        artist_id TEXT NOT NULL,
        album_id TEXT,
        release_date INTEGER,
        lyrics TEXT,
        annotations TEXT,
        credits TEXT,
        wikidata_id TEXT,
        isrc TEXT,
        external_ids TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
";

/// Surrogate-keyed schema. `{s}` is replaced by the table suffix ("" or "_new").
const CATALOG_SCHEMA_TEMPLATE: &str = "
    CREATE TABLE artists{s} (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        slug TEXT NOT NULL,
        url_slug TEXT NOT NULL,
        country TEXT,
        formed_year INTEGER,
        genres TEXT,
        members TEXT,
        bio TEXT,
        images TEXT,
        musicbrainz_id TEXT UNIQUE,
        wikidata_id TEXT,
        discogs_artist_id TEXT,
        spotify_artist_id TEXT,
        lastfm_url TEXT,
        genius_artist_id TEXT,
        isni TEXT,
        external_ids TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE TABLE albums{s} (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        slug TEXT NOT NULL,
        artist_id INTEGER NOT NULL,
        release_date INTEGER,
        track_count INTEGER,
        genres TEXT,
        cover_art TEXT,
        credits TEXT,
        musicbrainz_id TEXT UNIQUE,
        wikidata_id TEXT,
        discogs_master_id TEXT,
        spotify_album_id TEXT,
        barcode TEXT,
        catalog_number TEXT,
        external_ids TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE TABLE songs{s} (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        slug TEXT NOT NULL,
        duration INTEGER,
        artist_id INTEGER NOT NULL,
        album_id INTEGER,
        release_date INTEGER,
        lyrics TEXT,
        annotations TEXT,
        credits TEXT,
        is_instrumental INTEGER NOT NULL DEFAULT 0,
        musicbrainz_id TEXT UNIQUE,
        wikidata_id TEXT,
        isrc TEXT,
        spotify_track_id TEXT,
        genius_song_id TEXT,
        acoustid TEXT,
        external_ids TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
";

/// Secondary-lookup and foreign-key indexes: (name, table, column).
pub const CATALOG_INDEXES: &[(&str, &str, &str)] = &[
    ("idx_artists_musicbrainz", "artists", "musicbrainz_id"),
    ("idx_artists_spotify", "artists", "spotify_artist_id"),
    ("idx_artists_discogs", "artists", "discogs_artist_id"),
    ("idx_artists_slug", "artists", "slug"),
    ("idx_albums_musicbrainz", "albums", "musicbrainz_id"),
    ("idx_albums_artist", "albums", "artist_id"),
    ("idx_albums_spotify", "albums", "spotify_album_id"),
    ("idx_albums_barcode", "albums", "barcode"),
    ("idx_albums_slug", "albums", "slug"),
    ("idx_songs_musicbrainz", "songs", "musicbrainz_id"),
    ("idx_songs_artist", "songs", "artist_id"),
    ("idx_songs_album", "songs", "album_id"),
    ("idx_songs_isrc", "songs", "isrc"),
    ("idx_songs_spotify", "songs", "spotify_track_id"),
    ("idx_songs_slug", "songs", "slug"),
];

/// Current-schema DDL for tables named `<table><suffix>`.
pub fn catalog_schema_sql(suffix: &str) -> String {
    CATALOG_SCHEMA_TEMPLATE.replace("{s}", suffix)
}

/// Index DDL for tables named `<table><suffix>`. Index names do not carry the
/// suffix, so they keep their final names after a rename.
pub fn catalog_index_sql(suffix: &str) -> String {
    CATALOG_INDEXES
        .iter()
        .map(|(name, table, column)| {
            format!("CREATE INDEX IF NOT EXISTS {name} ON {table}{suffix}({column});\n")
        })
        .collect()
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Declared type of a column, upper-cased, or `None` if the column is absent.
pub fn column_type(conn: &Connection, table: &str, column: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            let ty: String = row.get(2)?;
            return Ok(Some(ty.to_uppercase()));
        }
    }
    Ok(None)
}

/// Column names of a table in declaration order.
pub fn column_names(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
}

/// True if the catalog still uses MusicBrainz ids as primary keys.
pub fn is_legacy_schema(conn: &Connection) -> Result<bool> {
    Ok(column_type(conn, "artists", "id")?.as_deref() == Some("TEXT"))
}

/// Create the current schema and its indexes unless a catalog already exists.
pub fn ensure_catalog_schema(conn: &Connection) -> Result<()> {
    if table_exists(conn, "artists")? {
        return Ok(());
    }
    conn.execute_batch(&catalog_schema_sql(""))?;
    conn.execute_batch(&catalog_index_sql(""))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_schema_creates_tables_and_indexes() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_catalog_schema(&conn).unwrap();
        for table in CATALOG_TABLES {
            assert!(table_exists(&conn, table).unwrap());
        }
        let index_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(index_count as usize, CATALOG_INDEXES.len());
        assert!(!is_legacy_schema(&conn).unwrap());
        // Second call is a no-op
        ensure_catalog_schema(&conn).unwrap();
    }

    #[test]
    fn test_suffixed_schema() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&catalog_schema_sql("_new")).unwrap();
        assert!(table_exists(&conn, "songs_new").unwrap());
        assert!(!table_exists(&conn, "songs").unwrap());
    }

    #[test]
    fn test_legacy_detection() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(LEGACY_SCHEMA).unwrap();
        assert!(is_legacy_schema(&conn).unwrap());
        assert_eq!(column_type(&conn, "songs", "album_id").unwrap().as_deref(), Some("TEXT"));
        assert_eq!(column_type(&conn, "songs", "missing").unwrap(), None);
    }

    #[test]
    fn test_column_names_in_order() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_catalog_schema(&conn).unwrap();
        let columns = column_names(&conn, "albums").unwrap();
        assert_eq!(&columns[..4], &["id", "title", "slug", "artist_id"]);
        assert!(columns.contains(&"barcode".to_string()));
    }
}
