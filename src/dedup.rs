//! Duplicate grouping and merging inside imported albums.
//!
//! Albums whose stored song count exceeds their expected track count (or a
//! sanity ceiling) usually carry several versions of the same song. Songs are
//! grouped by base title, one survivor per group is kept, and the album's
//! `track_count` is reset to what actually remains.
//!
//! The whole batch runs in one transaction: a failure anywhere rolls back
//! every album touched so far.

use std::cmp::Ordering;

use log::{debug, info};
use rusqlite::{params, Connection};
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::models::{AlbumId, SongId};
use crate::qualifiers::{has_bracketed_group, strip_version_groups};
use crate::store;

/// Albums with more stored songs than this are checked regardless of their expected count.
pub const TRACK_CEILING: i64 = 20;

/// Index mapping base title to group index in Vec<TitleGroup>
pub type BaseTitleIndex = FxHashMap<String, usize>;

#[derive(Clone, Debug, PartialEq)]
pub struct SongEntry {
    pub id: SongId,
    pub title: String,
}

/// Songs sharing one base title, in load order.
#[derive(Clone, Debug, PartialEq)]
pub struct TitleGroup {
    pub base_title: String,
    pub songs: Vec<SongEntry>,
}

/// A group that collapses to one survivor.
#[derive(Clone, Debug, PartialEq)]
pub struct DuplicateGroup {
    pub base_title: String,
    pub survivor: SongEntry,
    pub removed: Vec<SongEntry>,
}

/// Album picked by the selection query.
#[derive(Clone, Debug, PartialEq)]
pub struct FlaggedAlbum {
    pub id: AlbumId,
    pub title: String,
    pub artist_name: String,
    pub expected_tracks: Option<i64>,
    pub stored_songs: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AlbumCleanup {
    pub album: FlaggedAlbum,
    pub groups: Vec<DuplicateGroup>,
    pub remaining: i64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DedupReport {
    pub albums: Vec<AlbumCleanup>,
    pub deleted: usize,
    pub committed: bool,
}

// ============================================================================
// Grouping (pure)
// ============================================================================

/// Title with every parenthesized/bracketed version qualifier removed.
/// e.g. "Title (Live)" → "Title"
pub fn base_title(title: &str) -> String {
    strip_version_groups(title)
}

/// Group songs by base title. Groups appear in order of first occurrence and
/// keep the input order of their members.
pub fn group_by_base_title(songs: Vec<SongEntry>) -> Vec<TitleGroup> {
    let mut groups: Vec<TitleGroup> = Vec::new();
    let mut index: BaseTitleIndex = FxHashMap::default();

    for song in songs {
        let base = base_title(&song.title);
        match index.get(&base) {
            Some(&idx) => groups[idx].songs.push(song),
            None => {
                index.insert(base.clone(), groups.len());
                groups.push(TitleGroup {
                    base_title: base,
                    songs: vec![song],
                });
            }
        }
    }
    groups
}

/// Survivor preference: no bracketed group at all, then shorter title, then
/// alphabetical (case-insensitive, then raw). `Less` means `a` is preferred.
pub fn compare_candidates(a: &str, b: &str) -> Ordering {
    has_bracketed_group(a)
        .cmp(&has_bracketed_group(b))
        .then_with(|| a.chars().count().cmp(&b.chars().count()))
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
        .then_with(|| a.cmp(b))
}

/// Index of the preferred title, or `None` for an empty slice.
pub fn select_survivor<S: AsRef<str>>(titles: &[S]) -> Option<usize> {
    titles
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| compare_candidates(a.as_ref(), b.as_ref()))
        .map(|(i, _)| i)
}

/// Duplicate groups for one album's songs; singletons are left out.
pub fn plan_album(songs: Vec<SongEntry>) -> Vec<DuplicateGroup> {
    group_by_base_title(songs)
        .into_iter()
        .filter(|g| g.songs.len() > 1)
        .filter_map(|g| {
            let titles: Vec<&str> = g.songs.iter().map(|s| s.title.as_str()).collect();
            let keep = select_survivor(&titles)?;
            let mut songs = g.songs;
            let survivor = songs.remove(keep);
            Some(DuplicateGroup {
                base_title: g.base_title,
                survivor,
                removed: songs,
            })
        })
        .collect()
}

// ============================================================================
// Database pass
// ============================================================================

/// Albums whose stored song count differs from the expected count or exceeds
/// [`TRACK_CEILING`], largest first.
pub fn find_flagged_albums(conn: &Connection) -> Result<Vec<FlaggedAlbum>> {
    let mut stmt = conn.prepare(
        "SELECT al.id, al.title, ar.name, al.track_count, COUNT(s.id) AS stored
         FROM albums al
         JOIN artists ar ON ar.id = al.artist_id
         LEFT JOIN songs s ON s.album_id = al.id
         GROUP BY al.id
         HAVING stored <> COALESCE(al.track_count, 0) OR stored > ?1
         ORDER BY stored DESC, al.id",
    )?;
    let albums = stmt
        .query_map([TRACK_CEILING], |row| {
            Ok(FlaggedAlbum {
                id: row.get(0)?,
                title: row.get(1)?,
                artist_name: row.get(2)?,
                expected_tracks: row.get(3)?,
                stored_songs: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(albums)
}

fn load_album_songs(conn: &Connection, album_id: AlbumId) -> Result<Vec<SongEntry>> {
    let mut stmt = conn.prepare("SELECT id, title FROM songs WHERE album_id = ?1 ORDER BY title, id")?;
    let songs = stmt
        .query_map([album_id], |row| {
            Ok(SongEntry {
                id: row.get(0)?,
                title: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(songs)
}

/// Run the cleanup over every flagged album in one transaction.
///
/// With `dry_run` the planned deletions are reported and the transaction is
/// rolled back. Any error rolls back the whole batch.
pub fn run_dedup(conn: &mut Connection, dry_run: bool) -> Result<DedupReport> {
    let tx = conn.transaction()?;
    let mut report = DedupReport::default();

    let flagged = find_flagged_albums(&tx)?;
    info!("{} albums flagged for duplicate check", flagged.len());

    for album in flagged {
        let songs = load_album_songs(&tx, album.id)?;
        let groups = plan_album(songs);

        for group in &groups {
            debug!(
                "{} / {}: keeping {:?}, removing {:?}",
                album.artist_name,
                album.title,
                group.survivor.title,
                group.removed.iter().map(|s| s.title.as_str()).collect::<Vec<_>>()
            );
            for song in &group.removed {
                tx.execute("DELETE FROM songs WHERE id = ?1", params![song.id])?;
                report.deleted += 1;
            }
        }

        let remaining = store::count_album_songs(&tx, album.id)?;
        store::set_album_track_count(&tx, album.id, remaining)?;
        if !groups.is_empty() || album.expected_tracks != Some(remaining) {
            info!(
                "{} / {}: {} stored, expected {}, {} remain",
                album.artist_name,
                album.title,
                album.stored_songs,
                album.expected_tracks.map_or("?".to_string(), |n| n.to_string()),
                remaining
            );
        }

        report.albums.push(AlbumCleanup {
            album,
            groups,
            remaining,
        });
    }

    if dry_run {
        tx.rollback()?;
        info!("Dry run: rolled back {} planned deletions", report.deleted);
    } else {
        tx.commit()?;
        report.committed = true;
    }
    Ok(report)
}

// ============================================================================
// TESTS
// ============================================================================
