//! Last.fm `artist.getinfo` client.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use super::{encode, ArtistInfoSource, JsonClient};
use crate::error::Result;
use crate::models::ArtistInfo;

pub const LASTFM_API_URL: &str = "https://ws.audioscrobbler.com/2.0/";

/// Largest first.
const IMAGE_SIZES: &[&str] = &["mega", "extralarge", "large", "medium", "small"];
const MAX_IMAGES: usize = 3;
const MAX_TAGS: usize = 10;

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static ATTRIBUTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)Read more on Last\.fm.*$").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Deserialize)]
struct GetInfoResponse {
    artist: Option<LastFmArtist>,
}

#[derive(Debug, Deserialize)]
struct LastFmArtist {
    bio: Option<Bio>,
    #[serde(default)]
    image: Vec<Image>,
    /// `{"tag": [...]}` or an empty string when the artist has no tags.
    #[serde(default)]
    tags: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct Bio {
    summary: Option<String>,
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Image {
    #[serde(rename = "#text", default)]
    pub url: String,
    #[serde(default)]
    pub size: String,
}

/// Strip HTML tags and the "Read more on Last.fm" attribution, collapse whitespace.
pub fn clean_bio(raw: &str) -> Option<String> {
    let text = HTML_TAG.replace_all(raw, "");
    let text = ATTRIBUTION.replace(&text, "");
    let text = WHITESPACE.replace_all(&text, " ");
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Non-empty image URLs, largest size first, at most three.
pub fn pick_images(images: &[Image]) -> Vec<String> {
    let rank = |size: &str| {
        IMAGE_SIZES
            .iter()
            .position(|s| *s == size)
            .unwrap_or(IMAGE_SIZES.len())
    };
    let mut sized: Vec<&Image> = images.iter().filter(|img| !img.url.is_empty()).collect();
    sized.sort_by_key(|img| rank(&img.size));
    sized
        .into_iter()
        .take(MAX_IMAGES)
        .map(|img| img.url.clone())
        .collect()
}

fn tag_names(tags: &serde_json::Value) -> Vec<String> {
    let list = match tags.get("tag") {
        Some(serde_json::Value::Array(list)) => list.as_slice(),
        // A single tag comes back as an object
        Some(single @ serde_json::Value::Object(_)) => std::slice::from_ref(single),
        _ => &[],
    };
    list.iter()
        .filter_map(|t| t.get("name").and_then(|n| n.as_str()))
        .take(MAX_TAGS)
        .map(String::from)
        .collect()
}

fn artist_info_from(artist: LastFmArtist) -> ArtistInfo {
    let bio = artist
        .bio
        .and_then(|b| b.content.filter(|c| !c.trim().is_empty()).or(b.summary))
        .and_then(|raw| clean_bio(&raw));
    ArtistInfo {
        bio,
        images: pick_images(&artist.image),
        tags: tag_names(&artist.tags),
    }
}

pub struct LastFmClient {
    http: JsonClient,
    api_key: String,
}

impl LastFmClient {
    pub fn new(http: JsonClient, api_key: String) -> Self {
        Self { http, api_key }
    }
}

impl ArtistInfoSource for LastFmClient {
    fn artist_info(&mut self, name: &str) -> Result<Option<ArtistInfo>> {
        let url = format!(
            "{LASTFM_API_URL}?method=artist.getinfo&artist={}&api_key={}&format=json",
            encode(name),
            encode(&self.api_key)
        );
        // Unknown artists come back as {"error": 6, "message": ...} with no artist key
        let response: Option<GetInfoResponse> = self.http.get_json_opt(&url)?;
        Ok(response.and_then(|r| r.artist).map(artist_info_from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clean_bio() {
        let raw = "Daft Punk were a <b>French</b>\n\n electronic duo. <a href=\"https://www.last.fm/music/Daft+Punk\">Read more on Last.fm</a>. User-contributed text.";
        assert_eq!(
            clean_bio(raw).as_deref(),
            Some("Daft Punk were a French electronic duo.")
        );
        assert_eq!(clean_bio("<a href=\"x\">Read more on Last.fm</a>"), None);
        assert_eq!(clean_bio("   "), None);
    }

    #[test]
    fn test_pick_images_largest_first() {
        let images: Vec<Image> = serde_json::from_str(
            r##"[
                {"#text": "https://img/s.png", "size": "small"},
                {"#text": "https://img/m.png", "size": "medium"},
                {"#text": "", "size": "mega"},
                {"#text": "https://img/xl.png", "size": "extralarge"},
                {"#text": "https://img/l.png", "size": "large"}
            ]"##,
        )
        .unwrap();
        assert_eq!(
            pick_images(&images),
            vec!["https://img/xl.png", "https://img/l.png", "https://img/m.png"]
        );
    }

    #[test]
    fn test_response_parsing() {
        let json = r##"{"artist": {
            "name": "Air",
            "image": [{"#text": "https://img/air.png", "size": "large"}],
            "tags": {"tag": [{"name": "electronic"}, {"name": "downtempo"}]},
            "bio": {"summary": "Short", "content": "Air is a French duo."}
        }}"##;
        let response: GetInfoResponse = serde_json::from_str(json).unwrap();
        let info = artist_info_from(response.artist.unwrap());
        assert_eq!(info.bio.as_deref(), Some("Air is a French duo."));
        assert_eq!(info.images, vec!["https://img/air.png"]);
        assert_eq!(info.tags, vec!["electronic", "downtempo"]);
    }

    #[test]
    fn test_tags_edge_shapes() {
        assert!(tag_names(&serde_json::json!("")).is_empty());
        assert_eq!(tag_names(&serde_json::json!({"tag": {"name": "house"}})), vec!["house"]);
        let many: Vec<_> = (0..15).map(|i| serde_json::json!({"name": format!("t{i}")})).collect();
        assert_eq!(tag_names(&serde_json::json!({ "tag": many })).len(), MAX_TAGS);
    }

    #[test]
    fn test_error_payload_has_no_artist() {
        let response: GetInfoResponse =
            serde_json::from_str(r#"{"error": 6, "message": "The artist you supplied could not be found"}"#).unwrap();
        assert!(response.artist.is_none());
    }
}
