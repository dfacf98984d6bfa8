use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn, LevelFilter};
use rusqlite::Connection;
use std::path::PathBuf;
use std::time::Instant;

use daftfm_pipeline::canonical::DEFAULT_ALBUM_LIMIT;
use daftfm_pipeline::collect::{collect_artists, CollectOptions};
use daftfm_pipeline::config::{
    DbPaths, ProviderConfig, DEFAULT_ARTISTS, DEFAULT_BACKUP_DIR, DEFAULT_DB_PATH, DEFAULT_STAGING_PATH,
};
use daftfm_pipeline::dedup::run_dedup;
use daftfm_pipeline::enrich;
use daftfm_pipeline::migrate::migrate;
use daftfm_pipeline::models::CatalogCounts;
use daftfm_pipeline::progress::{create_spinner, print_batch_report, print_report, set_log_only};
use daftfm_pipeline::providers::{
    CoverArtClient, InstrumentalSource, LastFmClient, MusicBrainzClient, MusixmatchClient,
};
use daftfm_pipeline::safety::validate_staging_path;
use daftfm_pipeline::{staging, store};

#[derive(Parser, Debug)]
#[command(name = "daftfm-pipeline")]
#[command(about = "Build and maintain the daft.fm music catalog")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Primary catalog database
    #[arg(long, global = true, default_value = DEFAULT_DB_PATH)]
    db: PathBuf,

    /// Run against the staging copy instead of the primary
    #[arg(long, global = true)]
    staging: bool,

    /// Staging catalog database
    #[arg(long, global = true, default_value = DEFAULT_STAGING_PATH)]
    staging_db: PathBuf,

    /// Directory for pre-promotion backups
    #[arg(long, global = true, default_value = DEFAULT_BACKUP_DIR)]
    backup_dir: PathBuf,

    /// Hide progress bars and print periodic progress lines instead
    #[arg(long, global = true)]
    log_only: bool,

    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import artists, their studio albums and canonical tracks from MusicBrainz
    Collect {
        /// Artist names (comma-separated); defaults to the built-in list
        #[arg(long, value_delimiter = ',')]
        artists: Vec<String>,

        #[arg(long, default_value_t = DEFAULT_ALBUM_LIMIT)]
        albums_per_artist: usize,

        /// Do not query Musixmatch for instrumental flags
        #[arg(long)]
        skip_instrumental: bool,
    },
    /// Collapse duplicate tracks and resync album track counts
    Dedup {
        /// Report planned deletions and roll back
        #[arg(long)]
        dry_run: bool,
    },
    /// Move a MusicBrainz-keyed catalog onto integer keys
    Migrate,
    /// Backfill missing metadata
    Enrich {
        #[command(subcommand)]
        job: EnrichJob,

        /// Maximum rows to process
        #[arg(long, global = true)]
        limit: Option<usize>,
    },
    /// Staging copy workflow
    Staging {
        #[command(subcommand)]
        action: StagingAction,
    },
    /// Row counts and missing-data counts
    Report,
    /// Delete every artist, album and song
    Wipe {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum EnrichJob {
    /// Album cover art from the Cover Art Archive
    Covers,
    /// Artist bio, images and genres from Last.fm
    ArtistInfo,
    /// Song ISRCs from MusicBrainz recordings
    Isrc,
    /// Instrumental flags from Musixmatch
    Instrumental,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum StagingAction {
    /// Copy the primary schema into the staging database
    Setup,
    /// Compare counts and run integrity checks on staging
    Validate,
    /// Back up the primary and replace its rows with staging's
    Promote {
        /// Promote even if validation fails
        #[arg(long)]
        force: bool,
    },
}

fn init_logging(verbose: bool) {
    let mut clog = colog::default_builder();
    match std::env::var("RUST_LOG") {
        Ok(filters) if !filters.trim().is_empty() => {
            clog.parse_filters(&filters);
        }
        _ => {
            let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
            clog.filter(None, level);
        }
    }
    clog.init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    set_log_only(cli.log_only);

    let paths = DbPaths {
        primary: cli.db.clone(),
        staging: cli.staging_db.clone(),
        backup_dir: cli.backup_dir.clone(),
        use_staging: cli.staging,
    };
    let start = Instant::now();

    match cli.command {
        Command::Collect {
            artists,
            albums_per_artist,
            skip_instrumental,
        } => run_collect(&paths, artists, albums_per_artist, skip_instrumental, start),
        Command::Dedup { dry_run } => run_dedup_cmd(&paths, dry_run, start),
        Command::Migrate => run_migrate(&paths, start),
        Command::Enrich { job, limit } => run_enrich(&paths, job, limit, start),
        Command::Staging { action } => run_staging(&paths, action, start),
        Command::Report => run_report(&paths, start),
        Command::Wipe { yes } => run_wipe(&paths, yes, start),
    }
}

fn open_target(paths: &DbPaths) -> Result<Connection> {
    let target = paths.target();
    if paths.use_staging {
        validate_staging_path(&paths.primary, &paths.staging)?;
    }
    info!("Opening catalog: {}", target.display());
    store::open_catalog(target).with_context(|| format!("Failed to open catalog {}", target.display()))
}

fn run_collect(
    paths: &DbPaths,
    artists: Vec<String>,
    albums_per_artist: usize,
    skip_instrumental: bool,
    start: Instant,
) -> Result<()> {
    let conn = open_target(paths)?;
    let config = ProviderConfig::from_env();
    let names: Vec<String> = if artists.is_empty() {
        DEFAULT_ARTISTS.iter().map(|s| s.to_string()).collect()
    } else {
        artists.into_iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
    };
    info!("Collecting {} artists: {:?}", names.len(), names);

    let mut musicbrainz = MusicBrainzClient::new(config.musicbrainz_http());
    let mut musixmatch = match (&config.musixmatch_api_key, skip_instrumental) {
        (_, true) => None,
        (Some(key), false) => Some(MusixmatchClient::new(config.musixmatch_http(), key.clone())),
        (None, false) => {
            info!("MUSIXMATCH_API_KEY not set; instrumental flags disabled");
            None
        }
    };
    let instrumental = musixmatch.as_mut().map(|m| m as &mut dyn InstrumentalSource);

    let options = CollectOptions { albums_per_artist };
    let stats = collect_artists(&conn, &mut musicbrainz, instrumental, &names, &options)
        .context("Collect failed")?;

    print_report("Collect complete!", &stats.report_lines(), start.elapsed());
    Ok(())
}

fn run_dedup_cmd(paths: &DbPaths, dry_run: bool, start: Instant) -> Result<()> {
    let mut conn = open_target(paths)?;
    let report = run_dedup(&mut conn, dry_run).context("Dedup failed")?;

    for cleanup in &report.albums {
        println!(
            "{} / {} ({} stored, {} expected) → {} remaining",
            cleanup.album.artist_name,
            cleanup.album.title,
            cleanup.album.stored_songs,
            cleanup
                .album
                .expected_tracks
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".to_string()),
            cleanup.remaining
        );
        for group in &cleanup.groups {
            let removed: Vec<&str> = group.removed.iter().map(|s| s.title.as_str()).collect();
            println!("  keep {:?}, delete {:?}", group.survivor.title, removed);
        }
    }

    let outcome = if report.committed {
        "committed"
    } else {
        "rolled back (dry run)"
    };
    print_report(
        "Dedup complete!",
        &[
            ("Albums", report.albums.len().to_string()),
            ("Songs deleted", report.deleted.to_string()),
            ("Outcome", outcome.to_string()),
        ],
        start.elapsed(),
    );
    Ok(())
}

fn run_migrate(paths: &DbPaths, start: Instant) -> Result<()> {
    let target = paths.target();
    if !target.exists() {
        bail!("Catalog {} does not exist", target.display());
    }
    if paths.use_staging {
        validate_staging_path(&paths.primary, &paths.staging)?;
    }
    let mut conn = Connection::open(target)
        .with_context(|| format!("Failed to open catalog {}", target.display()))?;
    let spinner = create_spinner("Migrating to integer keys");
    let result = migrate(&mut conn);
    spinner.finish_and_clear();
    let report = result.context("Migration failed")?;

    for warning in &report.warnings {
        warn!("{warning}");
    }
    print_report(
        "Migration complete!",
        &[
            ("Artists", report.artists.to_string()),
            ("Albums", report.albums.to_string()),
            ("Songs", report.songs.to_string()),
            ("Skipped albums", report.skipped_albums.to_string()),
            ("Skipped songs", report.skipped_songs.to_string()),
            ("Detached songs", report.detached_songs.to_string()),
        ],
        start.elapsed(),
    );
    Ok(())
}

fn run_enrich(paths: &DbPaths, job: EnrichJob, limit: Option<usize>, start: Instant) -> Result<()> {
    let conn = open_target(paths)?;
    let config = ProviderConfig::from_env();

    let (title, stats) = match job {
        EnrichJob::Covers => {
            let mut source = CoverArtClient::new(config.coverart_http());
            ("Cover art", enrich::enrich_covers(&conn, &mut source, limit)?)
        }
        EnrichJob::ArtistInfo => {
            let Some(key) = config.lastfm_api_key.clone() else {
                info!("LASTFM_API_KEY not set; skipping artist info");
                return Ok(());
            };
            let mut source = LastFmClient::new(config.lastfm_http(), key);
            ("Artist info", enrich::enrich_artist_info(&conn, &mut source, limit)?)
        }
        EnrichJob::Isrc => {
            let mut source = MusicBrainzClient::new(config.musicbrainz_http());
            ("ISRC", enrich::enrich_isrcs(&conn, &mut source, limit)?)
        }
        EnrichJob::Instrumental => {
            let Some(key) = config.musixmatch_api_key.clone() else {
                info!("MUSIXMATCH_API_KEY not set; skipping instrumental flags");
                return Ok(());
            };
            let mut source = MusixmatchClient::new(config.musixmatch_http(), key);
            ("Instrumental", enrich::enrich_instrumental(&conn, &mut source, limit)?)
        }
    };

    print_batch_report(&format!("{title} enrichment complete!"), &stats, start.elapsed());
    Ok(())
}

fn open_staging(paths: &DbPaths) -> Result<Connection> {
    validate_staging_path(&paths.primary, &paths.staging)?;
    if let Some(parent) = paths.staging.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Connection::open(&paths.staging)
        .with_context(|| format!("Failed to open staging {}", paths.staging.display()))
}

fn run_staging(paths: &DbPaths, action: StagingAction, start: Instant) -> Result<()> {
    match action {
        StagingAction::Setup => {
            let primary = store::open_catalog(&paths.primary)?;
            let mut staging_conn = open_staging(paths)?;
            let statements = staging::sync_schema(&primary, &mut staging_conn).context("Schema sync failed")?;
            print_report(
                "Staging setup complete!",
                &[
                    ("Staging", paths.staging.display().to_string()),
                    ("Statements", statements.to_string()),
                ],
                start.elapsed(),
            );
        }
        StagingAction::Validate => {
            if !paths.staging.exists() {
                bail!("Staging database {} does not exist; run `staging setup`", paths.staging.display());
            }
            let primary = store::open_catalog(&paths.primary)?;
            let staging_conn = open_staging(paths)?;
            let (before, after) = staging::compare_counts(&primary, &staging_conn)?;
            print_counts_diff(&before, &after);
            staging::validate(&staging_conn).context("Staging validation failed")?;
            print_report("Staging is valid", &[], start.elapsed());
        }
        StagingAction::Promote { force } => {
            let spinner = create_spinner("Promoting staging");
            let result = staging::promote(&paths.primary, &paths.staging, &paths.backup_dir, force);
            spinner.finish_and_clear();
            let report = result.context("Promotion failed")?;
            print_report(
                "Promotion complete!",
                &[
                    ("Backup", report.backup.display().to_string()),
                    ("Artists", report.counts.artists.to_string()),
                    ("Albums", report.counts.albums.to_string()),
                    ("Songs", report.counts.songs.to_string()),
                ],
                start.elapsed(),
            );
        }
    }
    Ok(())
}

fn print_counts_diff(primary: &CatalogCounts, staging: &CatalogCounts) {
    println!("{:<10} {:>10} {:>10} {:>8}", "table", "primary", "staging", "diff");
    for (table, a, b) in [
        ("artists", primary.artists, staging.artists),
        ("albums", primary.albums, staging.albums),
        ("songs", primary.songs, staging.songs),
    ] {
        println!("{:<10} {:>10} {:>10} {:>+8}", table, a, b, b - a);
    }
}

fn run_report(paths: &DbPaths, start: Instant) -> Result<()> {
    let conn = open_target(paths)?;
    let counts = store::catalog_counts(&conn)?;
    print_report(
        &format!("Catalog report: {}", paths.target().display()),
        &[
            ("Artists", counts.artists.to_string()),
            ("Albums", counts.albums.to_string()),
            ("Songs", counts.songs.to_string()),
            ("Artists without bio", counts.artists_without_bio.to_string()),
            ("Artists without images", counts.artists_without_images.to_string()),
            ("Artists without genres", counts.artists_without_genres.to_string()),
            ("Albums without cover art", counts.albums_without_cover_art.to_string()),
            ("Songs without lyrics", counts.songs_without_lyrics.to_string()),
            ("Songs without duration", counts.songs_without_duration.to_string()),
            ("Songs without ISRC", counts.songs_without_isrc.to_string()),
        ],
        start.elapsed(),
    );
    Ok(())
}

fn run_wipe(paths: &DbPaths, yes: bool, start: Instant) -> Result<()> {
    if !yes {
        bail!("Refusing to wipe {} without --yes", paths.target().display());
    }
    let mut conn = open_target(paths)?;
    let before = store::catalog_counts(&conn)?;
    store::wipe(&mut conn).context("Wipe failed")?;
    warn!("Wiped {}", paths.target().display());
    print_report(
        "Wipe complete!",
        &[
            ("Artists deleted", before.artists.to_string()),
            ("Albums deleted", before.albums.to_string()),
            ("Songs deleted", before.songs.to_string()),
        ],
        start.elapsed(),
    );
    Ok(())
}

