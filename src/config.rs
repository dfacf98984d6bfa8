//! Paths, credentials and provider intervals.

use std::path::PathBuf;
use std::time::Duration;

use log::info;

use crate::providers::JsonClient;

pub const DEFAULT_DB_PATH: &str = "data/catalog.sqlite3";
pub const DEFAULT_STAGING_PATH: &str = "data/staging.sqlite3";
pub const DEFAULT_BACKUP_DIR: &str = "data/backups";
pub const DEFAULT_USER_AGENT: &str = "daft.fm/1.0.0 (https://daft.fm)";

/// Artists imported by `collect` when none are given.
pub const DEFAULT_ARTISTS: &[&str] = &["The Beatles", "Daft Punk", "Radiohead", "Miles Davis"];

/// Where the catalog lives.
#[derive(Debug, Clone, PartialEq)]
pub struct DbPaths {
    pub primary: PathBuf,
    pub staging: PathBuf,
    pub backup_dir: PathBuf,
    /// Jobs write to the staging copy instead of the primary.
    pub use_staging: bool,
}

impl DbPaths {
    /// Database the current job reads and writes.
    pub fn target(&self) -> &PathBuf {
        if self.use_staging {
            &self.staging
        } else {
            &self.primary
        }
    }
}

impl Default for DbPaths {
    fn default() -> Self {
        Self {
            primary: PathBuf::from(DEFAULT_DB_PATH),
            staging: PathBuf::from(DEFAULT_STAGING_PATH),
            backup_dir: PathBuf::from(DEFAULT_BACKUP_DIR),
            use_staging: false,
        }
    }
}

/// Provider credentials and request intervals.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub user_agent: String,
    pub lastfm_api_key: Option<String>,
    pub musixmatch_api_key: Option<String>,
    pub musicbrainz_interval: Duration,
    pub coverart_interval: Duration,
    pub lastfm_interval: Duration,
    pub musixmatch_interval: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            lastfm_api_key: None,
            musixmatch_api_key: None,
            musicbrainz_interval: Duration::from_millis(1000),
            coverart_interval: Duration::from_millis(1000),
            lastfm_interval: Duration::from_millis(200),
            musixmatch_interval: Duration::from_millis(200),
        }
    }
}

impl ProviderConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            info!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            user_agent: get("MUSICBRAINZ_USER_AGENT").unwrap_or(defaults.user_agent),
            lastfm_api_key: get("LASTFM_API_KEY"),
            musixmatch_api_key: get("MUSIXMATCH_API_KEY"),
            ..defaults
        }
    }

    pub fn musicbrainz_http(&self) -> JsonClient {
        JsonClient::new("musicbrainz", &self.user_agent, self.musicbrainz_interval)
    }

    pub fn coverart_http(&self) -> JsonClient {
        JsonClient::new("coverartarchive", &self.user_agent, self.coverart_interval)
    }

    pub fn lastfm_http(&self) -> JsonClient {
        JsonClient::new("lastfm", &self.user_agent, self.lastfm_interval)
    }

    pub fn musixmatch_http(&self) -> JsonClient {
        JsonClient::new("musixmatch", &self.user_agent, self.musixmatch_interval)
    }
}
