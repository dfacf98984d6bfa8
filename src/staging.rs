//! Staging copy workflow.
//!
//! Batches are written into a staging database with the primary's schema,
//! validated, and only then promoted over the primary. Promotion always takes
//! a timestamped backup of the primary first and replaces its contents inside
//! one transaction.

use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{info, warn};
use rusqlite::Connection;

use crate::error::{PipelineError, Result};
use crate::models::CatalogCounts;
use crate::safety::{validate_backup_path, validate_staging_path};
use crate::schema::{self, CATALOG_TABLES};
use crate::store;

// ============================================================================
// Schema sync
// ============================================================================

/// Recreate every primary table and index in the staging database.
/// Existing staging tables are dropped first. Returns the number of
/// statements replayed.
pub fn sync_schema(primary: &Connection, staging: &mut Connection) -> Result<usize> {
    let statements: Vec<(String, String)> = {
        let mut stmt = primary.prepare(
            "SELECT type, sql FROM sqlite_master
             WHERE sql IS NOT NULL
               AND type IN ('table', 'index')
               AND name NOT LIKE 'sqlite_%'
             ORDER BY CASE type WHEN 'table' THEN 0 ELSE 1 END, rowid",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()?
    };

    let existing: Vec<String> = {
        let mut stmt = staging.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()?
    };

    let tx = staging.transaction()?;
    for table in &existing {
        tx.execute_batch(&format!("DROP TABLE IF EXISTS \"{table}\";"))?;
    }
    for (_, sql) in &statements {
        tx.execute_batch(sql)?;
    }
    tx.commit()?;

    let tables = statements.iter().filter(|(ty, _)| ty == "table").count();
    info!(
        "Synced staging schema: {} tables, {} indexes",
        tables,
        statements.len() - tables
    );
    Ok(statements.len())
}

// ============================================================================
// Validation
// ============================================================================

fn count(conn: &Connection, sql: &str) -> Result<i64> {
    Ok(conn.query_row(sql, [], |row| row.get(0))?)
}

/// Pre-flight integrity findings; empty means the database may be promoted.
pub fn integrity_findings(conn: &Connection) -> Result<Vec<String>> {
    let mut findings = Vec::new();

    let orphaned_albums = count(
        conn,
        "SELECT COUNT(*) FROM albums al LEFT JOIN artists ar ON ar.id = al.artist_id WHERE ar.id IS NULL",
    )?;
    if orphaned_albums > 0 {
        findings.push(format!("Found {orphaned_albums} orphaned albums (missing artist)"));
    }

    let orphaned_songs = count(
        conn,
        "SELECT COUNT(*) FROM songs s
         LEFT JOIN artists ar ON ar.id = s.artist_id
         LEFT JOIN albums al ON al.id = s.album_id
         WHERE ar.id IS NULL OR (s.album_id IS NOT NULL AND al.id IS NULL)",
    )?;
    if orphaned_songs > 0 {
        findings.push(format!("Found {orphaned_songs} orphaned songs (missing artist or album)"));
    }

    for table in CATALOG_TABLES {
        let duplicates = count(
            conn,
            &format!(
                "SELECT COUNT(*) FROM (
                    SELECT musicbrainz_id FROM {table}
                    WHERE musicbrainz_id IS NOT NULL
                    GROUP BY musicbrainz_id HAVING COUNT(*) > 1
                 )"
            ),
        )?;
        if duplicates > 0 {
            findings.push(format!("Found {duplicates} duplicate MusicBrainz ids in {table}"));
        }
    }
    Ok(findings)
}

/// Fail with [`PipelineError::Integrity`] if any finding exists.
pub fn validate(conn: &Connection) -> Result<()> {
    let findings = integrity_findings(conn)?;
    if findings.is_empty() {
        Ok(())
    } else {
        for finding in &findings {
            warn!("{finding}");
        }
        Err(PipelineError::Integrity(findings))
    }
}

/// Row counts of both copies, for the validate report.
pub fn compare_counts(primary: &Connection, staging: &Connection) -> Result<(CatalogCounts, CatalogCounts)> {
    Ok((store::catalog_counts(primary)?, store::catalog_counts(staging)?))
}

// ============================================================================
// Backup and promotion
// ============================================================================

/// Backup file name for a given instant, e.g. `catalog-2026-10-19T08-30-00.123Z.sqlite3`.
pub fn backup_file_name(now: chrono::DateTime<Utc>) -> String {
    format!("catalog-{}.sqlite3", now.format("%Y-%m-%dT%H-%M-%S%.3fZ"))
}

/// Write a consistent copy of `primary` into `backup_dir`. Returns the backup path.
pub fn backup(primary: &Connection, primary_path: &Path, backup_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(backup_dir)?;
    let target = backup_dir.join(backup_file_name(Utc::now()));
    validate_backup_path(&target, &[primary_path])?;

    let target_str = target.to_str().ok_or_else(|| PipelineError::Unsafe {
        path: target.clone(),
        reason: "backup path is not valid UTF-8".to_string(),
    })?;
    primary.execute("VACUUM INTO ?1", [target_str])?;
    info!("Backed up {} to {}", primary_path.display(), target.display());
    Ok(target)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromotionReport {
    pub backup: PathBuf,
    pub counts: CatalogCounts,
}

/// Replace the primary catalog's rows with the staging copy's.
///
/// Refuses when staging fails validation unless `force` is set. The backup is
/// taken before anything is written.
pub fn promote(
    primary_path: &Path,
    staging_path: &Path,
    backup_dir: &Path,
    force: bool,
) -> Result<PromotionReport> {
    validate_staging_path(primary_path, staging_path)?;
    if !staging_path.exists() {
        return Err(PipelineError::Config(format!(
            "staging database {} does not exist",
            staging_path.display()
        )));
    }

    {
        let staging = Connection::open(staging_path)?;
        match validate(&staging) {
            Ok(()) => {}
            Err(e) if force => warn!("Promoting despite failed validation: {e}"),
            Err(e) => return Err(e),
        }
    }

    let mut primary = store::open_catalog(primary_path)?;
    let backup_path = backup(&primary, primary_path, backup_dir)?;

    let staging_str = staging_path.to_str().ok_or_else(|| PipelineError::Unsafe {
        path: staging_path.to_path_buf(),
        reason: "staging path is not valid UTF-8".to_string(),
    })?;
    primary.execute("ATTACH DATABASE ?1 AS staging", [staging_str])?;

    let result = copy_from_attached(&mut primary);
    primary.execute_batch("DETACH DATABASE staging")?;
    result?;

    let counts = store::catalog_counts(&primary)?;
    info!(
        "Promoted staging: {} artists, {} albums, {} songs",
        counts.artists, counts.albums, counts.songs
    );
    Ok(PromotionReport {
        backup: backup_path,
        counts,
    })
}

fn copy_from_attached(primary: &mut Connection) -> Result<()> {
    let tx = primary.transaction()?;
    for table in CATALOG_TABLES.iter().rev() {
        tx.execute(&format!("DELETE FROM main.{table}"), [])?;
    }
    for table in CATALOG_TABLES {
        let columns = schema::column_names(&tx, table)?.join(", ");
        tx.execute(
            &format!("INSERT INTO main.{table} ({columns}) SELECT {columns} FROM staging.{table}"),
            [],
        )?;
    }
    tx.commit()?;
    Ok(())
}
