//! Musixmatch `track.search` client, used only for the instrumental flag.

use serde_json::Value;

use super::{encode, InstrumentalSource, JsonClient};
use crate::error::Result;

pub const MUSIXMATCH_API_URL: &str = "https://api.musixmatch.com/ws/1.1";

/// Instrumental status from a track.search payload.
///
/// `None` when the header status is not 200 or no track matched. A match is
/// instrumental if `instrumental == 1` or `has_lyrics == 0`. The body is an
/// empty array rather than an object when nothing matched.
pub fn instrumental_from_response(response: &Value) -> Option<bool> {
    let message = response.get("message")?;
    let status = message.pointer("/header/status_code")?.as_i64()?;
    if status != 200 {
        return None;
    }
    let track = message.pointer("/body/track_list/0/track")?;
    let instrumental = track.get("instrumental").and_then(Value::as_i64) == Some(1);
    let has_lyrics = track.get("has_lyrics").and_then(Value::as_i64).unwrap_or(1) == 1;
    Some(instrumental || !has_lyrics)
}

pub struct MusixmatchClient {
    http: JsonClient,
    api_key: String,
}

impl MusixmatchClient {
    pub fn new(http: JsonClient, api_key: String) -> Self {
        Self { http, api_key }
    }

    fn search_url(&self, title: &str, artist: &str, isrc: Option<&str>) -> String {
        let mut url = format!(
            "{MUSIXMATCH_API_URL}/track.search?apikey={}&format=json&page_size=1",
            encode(&self.api_key)
        );
        match isrc.filter(|i| !i.is_empty()) {
            Some(isrc) => url.push_str(&format!("&track_isrc={}", encode(isrc))),
            None => url.push_str(&format!(
                "&q_track={}&q_artist={}",
                encode(title),
                encode(artist)
            )),
        }
        url
    }
}

impl InstrumentalSource for MusixmatchClient {
    fn is_instrumental(
        &mut self,
        title: &str,
        artist: &str,
        isrc: Option<&str>,
    ) -> Result<Option<bool>> {
        let url = self.search_url(title, artist, isrc);
        let response: Option<Value> = self.http.get_json_opt(&url)?;
        Ok(response.as_ref().and_then(instrumental_from_response))
    }
}
