//! Cover Art Archive client.

use serde::Deserialize;

use super::{CoverArtSource, JsonClient};
use crate::error::Result;

pub const COVER_ART_API_URL: &str = "https://coverartarchive.org";

#[derive(Debug, Clone, Deserialize)]
pub struct CoverArtListing {
    #[serde(default)]
    pub images: Vec<CoverImage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoverImage {
    #[serde(default)]
    pub id: u64,
    pub image: String,
    #[serde(default)]
    pub front: bool,
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub thumbnails: Thumbnails,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thumbnails {
    #[serde(rename = "500")]
    pub medium: Option<String>,
    #[serde(rename = "250")]
    pub small: Option<String>,
}

/// Pick the front cover from a listing.
///
/// The newest approved front image wins and yields [full, 500px, 250px].
/// Without an approved one, the first front image yields [full, 500px].
/// Missing thumbnails are left out.
pub fn pick_front_cover(listing: &CoverArtListing) -> Vec<String> {
    let approved = listing
        .images
        .iter()
        .filter(|img| img.front && img.approved)
        .max_by_key(|img| img.id);

    let urls = match approved {
        Some(img) => vec![
            Some(img.image.clone()),
            img.thumbnails.medium.clone(),
            img.thumbnails.small.clone(),
        ],
        None => match listing.images.iter().find(|img| img.front) {
            Some(img) => vec![Some(img.image.clone()), img.thumbnails.medium.clone()],
            None => Vec::new(),
        },
    };
    urls.into_iter().flatten().filter(|u| !u.is_empty()).collect()
}

pub struct CoverArtClient {
    http: JsonClient,
}

impl CoverArtClient {
    pub fn new(http: JsonClient) -> Self {
        Self { http }
    }
}

impl CoverArtSource for CoverArtClient {
    /// Release-group listing first, then the release with the same id.
    fn front_cover(&mut self, mbid: &str) -> Result<Vec<String>> {
        let group_url = format!("{COVER_ART_API_URL}/release-group/{mbid}");
        let listing = match self.http.get_json_opt::<CoverArtListing>(&group_url)? {
            Some(listing) => Some(listing),
            None => {
                let release_url = format!("{COVER_ART_API_URL}/release/{mbid}");
                self.http.get_json_opt::<CoverArtListing>(&release_url)?
            }
        };
        Ok(listing.map(|l| pick_front_cover(&l)).unwrap_or_default())
    }
}
