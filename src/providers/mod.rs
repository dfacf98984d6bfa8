//! Metadata provider clients.
//!
//! Every client wraps a [`JsonClient`]: one `ureq` agent plus the client's own
//! [`Throttle`]. Jobs talk to providers through the traits below, so tests can
//! drive them with in-memory fakes.

pub mod coverart;
pub mod lastfm;
pub mod musicbrainz;
pub mod musixmatch;

use std::time::Duration;

use log::debug;
use serde::de::DeserializeOwned;

use crate::error::{PipelineError, Result};
use crate::models::{
    ArtistCandidate, ArtistDetails, ArtistInfo, ReleaseDetails, ReleaseGroupSummary,
    ReleaseSummary,
};
use crate::throttle::Throttle;

pub use coverart::CoverArtClient;
pub use lastfm::LastFmClient;
pub use musicbrainz::MusicBrainzClient;
pub use musixmatch::MusixmatchClient;

// ============================================================================
// Source traits
// ============================================================================

/// Artist, release-group and release lookups used by the import job.
pub trait MetadataSource {
    fn search_artists(&mut self, name: &str, limit: usize) -> Result<Vec<ArtistCandidate>>;
    fn artist(&mut self, mbid: &str) -> Result<ArtistDetails>;
    fn release_groups(&mut self, artist_mbid: &str) -> Result<Vec<ReleaseGroupSummary>>;
    fn releases(&mut self, release_group_mbid: &str) -> Result<Vec<ReleaseSummary>>;
    fn release(&mut self, release_mbid: &str) -> Result<ReleaseDetails>;
}

/// Front cover URLs for an album (full size first).
pub trait CoverArtSource {
    fn front_cover(&mut self, release_group_mbid: &str) -> Result<Vec<String>>;
}

/// Bio, images and tags for an artist name. `None` when the provider has no entry.
pub trait ArtistInfoSource {
    fn artist_info(&mut self, name: &str) -> Result<Option<ArtistInfo>>;
}

/// ISRCs recorded for a recording.
pub trait IsrcSource {
    fn recording_isrcs(&mut self, recording_mbid: &str) -> Result<Vec<String>>;
}

/// Instrumental status of a track. `None` when the provider has no match.
pub trait InstrumentalSource {
    fn is_instrumental(&mut self, title: &str, artist: &str, isrc: Option<&str>)
        -> Result<Option<bool>>;
}

// ============================================================================
// HTTP
// ============================================================================

/// Blocking JSON-over-HTTPS client with its own throttle.
pub struct JsonClient {
    provider: &'static str,
    agent: ureq::Agent,
    throttle: Throttle,
}

impl JsonClient {
    pub fn new(provider: &'static str, user_agent: &str, interval: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(30))
            .timeout_write(Duration::from_secs(30))
            .user_agent(user_agent)
            .build();
        Self {
            provider,
            agent,
            throttle: Throttle::new(interval),
        }
    }

    pub fn provider(&self) -> &'static str {
        self.provider
    }

    /// GET and decode JSON. Any non-2xx status is an error.
    pub fn get_json<T: DeserializeOwned>(&mut self, url: &str) -> Result<T> {
        match self.get_json_opt(url)? {
            Some(value) => Ok(value),
            None => Err(PipelineError::provider(self.provider, "HTTP 404")),
        }
    }

    /// GET and decode JSON, mapping 404 to `None`.
    pub fn get_json_opt<T: DeserializeOwned>(&mut self, url: &str) -> Result<Option<T>> {
        self.throttle.wait();
        debug!("[{}] GET {}", self.provider, url);
        match self.agent.get(url).set("Accept", "application/json").call() {
            Ok(response) => response
                .into_json::<T>()
                .map(Some)
                .map_err(|e| PipelineError::provider(self.provider, format!("invalid JSON: {e}"))),
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(e) => Err(PipelineError::provider(self.provider, describe_ureq_failure(&e))),
        }
    }
}

fn describe_ureq_failure(error: &ureq::Error) -> String {
    match error {
        ureq::Error::Status(429, _) => "HTTP 429 (rate limited)".to_string(),
        ureq::Error::Status(code, _) => format!("HTTP {code}"),
        ureq::Error::Transport(transport) => {
            let message = transport.to_string();
            if message.to_ascii_lowercase().contains("timed out") {
                format!("timeout: {message}")
            } else {
                format!("transport: {message}")
            }
        }
    }
}

/// Percent-encode one query-string value.
pub fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        assert_eq!(encode("Sigur Rós"), "Sigur%20R%C3%B3s");
        assert_eq!(encode("AC/DC"), "AC%2FDC");
    }
}
