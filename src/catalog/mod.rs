mod client;
mod resource;

use async_trait::async_trait;

use crate::error::CatalogError;

pub use client::AppleMusicClient;

/// Catalog kind of a collection entry
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ItemKind {
    #[default]
    Song,
    MusicVideo,
    Other(String),
}

impl ItemKind {
    fn from_resource_type(kind: &str) -> Self {
        match kind {
            "songs" | "library-songs" => Self::Song,
            "music-videos" => Self::MusicVideo,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Content advisory of a song or album
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentRating {
    Explicit,
    Clean,
    #[default]
    None,
}

impl ContentRating {
    fn from_attribute(value: Option<&str>) -> Self {
        match value {
            Some("explicit") => Self::Explicit,
            Some("clean") => Self::Clean,
            _ => Self::None,
        }
    }
}

/// A song or music video as the catalog describes it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SongInfo {
    pub id: String,
    pub kind: ItemKind,
    pub name: String,
    pub artist_name: String,
    pub album_name: String,
    pub album_id: Option<String>,
    pub artist_id: Option<String>,
    pub composer_name: String,
    /// First listed genre
    pub genre: String,
    pub release_date: String,
    pub isrc: String,
    pub disc_number: u32,
    pub track_number: u32,
    pub content_rating: ContentRating,
    pub is_apple_digital_master: bool,
    pub audio_traits: Vec<String>,
    /// Artwork URL template containing `{w}x{h}`
    pub artwork_url: String,
    /// Enhanced (lossless/spatial) manifest, absent for AAC-only items
    pub enhanced_hls: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlbumInfo {
    pub id: String,
    pub name: String,
    pub artist_name: String,
    pub artist_id: Option<String>,
    pub artist_artwork_url: Option<String>,
    pub release_date: String,
    pub upc: String,
    pub record_label: String,
    pub copyright: String,
    pub content_rating: ContentRating,
    pub is_apple_digital_master: bool,
    pub is_mastered_for_itunes: bool,
    pub track_count: u32,
    pub artwork_url: String,
    /// Square motion artwork manifest
    pub motion_square_video: Option<String>,
    /// Tracks in catalog order
    pub tracks: Vec<SongInfo>,
}

impl AlbumInfo {
    /// Highest disc number among the tracks
    pub fn disc_total(&self) -> u32 {
        self.tracks
            .iter()
            .map(|t| t.disc_number)
            .max()
            .unwrap_or(1)
            .max(1)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaylistInfo {
    pub id: String,
    pub name: String,
    /// Curator, recorded as album artist of playlist items
    pub artist_name: String,
    pub artwork_url: Option<String>,
    pub tracks: Vec<SongInfo>,
}

/// A station's upcoming tracks are fetched with the media-user-token
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationInfo {
    pub id: String,
    pub name: String,
    pub artwork_url: Option<String>,
    pub tracks: Vec<SongInfo>,
}

/// Which of an artist's catalog items to list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtistRelation {
    Albums,
    MusicVideos,
}

impl ArtistRelation {
    pub fn path(self) -> &'static str {
        match self {
            Self::Albums => "albums",
            Self::MusicVideos => "music-videos",
        }
    }
}

/// One album or music video of an artist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistItem {
    pub id: String,
    pub name: String,
    pub release_date: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SearchKind {
    Album,
    Song,
    Artist,
}

impl SearchKind {
    fn resource_type(self) -> &'static str {
        match self {
            Self::Album => "albums",
            Self::Song => "songs",
            Self::Artist => "artists",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub kind: SearchKind,
    pub id: String,
    pub name: String,
    pub detail: String,
    pub url: String,
}

/// Catalog lookups needed by the download core
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn song(&self, storefront: &str, id: &str) -> Result<SongInfo, CatalogError>;

    /// Album with its complete track list
    async fn album(&self, storefront: &str, id: &str) -> Result<AlbumInfo, CatalogError>;

    /// Playlist with its complete track list
    async fn playlist(&self, storefront: &str, id: &str) -> Result<PlaylistInfo, CatalogError>;

    async fn station(&self, storefront: &str, id: &str) -> Result<StationInfo, CatalogError>;

    async fn music_video(&self, storefront: &str, id: &str) -> Result<SongInfo, CatalogError>;

    async fn artist_name(&self, storefront: &str, id: &str) -> Result<String, CatalogError>;

    async fn artist_items(
        &self,
        storefront: &str,
        id: &str,
        relation: ArtistRelation,
    ) -> Result<Vec<ArtistItem>, CatalogError>;

    async fn search(
        &self,
        storefront: &str,
        kind: SearchKind,
        query: &str,
    ) -> Result<Vec<SearchHit>, CatalogError>;

    /// Raw TTML lyrics of a song
    async fn lyrics(&self, storefront: &str, id: &str) -> Result<String, CatalogError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disc_total_is_highest_disc_number() {
        let album = AlbumInfo {
            tracks: vec![
                SongInfo {
                    disc_number: 1,
                    ..Default::default()
                },
                SongInfo {
                    disc_number: 2,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(album.disc_total(), 2);
        assert_eq!(AlbumInfo::default().disc_total(), 1);
    }

    #[test]
    fn resource_types_map_to_item_kinds() {
        assert_eq!(ItemKind::from_resource_type("songs"), ItemKind::Song);
        assert_eq!(
            ItemKind::from_resource_type("music-videos"),
            ItemKind::MusicVideo
        );
        assert_eq!(
            ItemKind::from_resource_type("uploaded-videos"),
            ItemKind::Other("uploaded-videos".to_string())
        );
    }
}
