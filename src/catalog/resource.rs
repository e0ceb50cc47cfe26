use serde::Deserialize;

use crate::catalog::{
    AlbumInfo, ArtistItem, ContentRating, ItemKind, PlaylistInfo, SearchHit, SearchKind, SongInfo,
};

#[derive(Debug, Deserialize)]
pub(crate) struct Document<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Relationship<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    pub next: Option<String>,
}

impl<T> Default for Relationship<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            next: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Artwork {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExtendedAssetUrls {
    pub enhanced_hls: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Reference {
    pub id: String,
}

/// A song or music video
#[derive(Debug, Deserialize)]
pub(crate) struct SongResource {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: Option<SongAttributes>,
    #[serde(default)]
    pub relationships: SongRelationships,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct SongAttributes {
    pub name: String,
    pub artist_name: String,
    pub album_name: String,
    pub composer_name: String,
    pub genre_names: Vec<String>,
    pub release_date: String,
    pub isrc: String,
    pub disc_number: u32,
    pub track_number: u32,
    pub content_rating: Option<String>,
    pub is_apple_digital_master: bool,
    pub audio_traits: Vec<String>,
    pub artwork: Artwork,
    pub extended_asset_urls: ExtendedAssetUrls,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SongRelationships {
    pub albums: Relationship<Reference>,
    pub artists: Relationship<Reference>,
}

impl From<SongResource> for SongInfo {
    fn from(resource: SongResource) -> Self {
        let attributes = resource.attributes.unwrap_or_default();
        Self {
            kind: ItemKind::from_resource_type(&resource.kind),
            id: resource.id,
            name: attributes.name,
            artist_name: attributes.artist_name,
            album_name: attributes.album_name,
            album_id: resource
                .relationships
                .albums
                .data
                .into_iter()
                .next()
                .map(|r| r.id),
            artist_id: resource
                .relationships
                .artists
                .data
                .into_iter()
                .next()
                .map(|r| r.id),
            composer_name: attributes.composer_name,
            genre: attributes.genre_names.into_iter().next().unwrap_or_default(),
            release_date: attributes.release_date,
            isrc: attributes.isrc,
            disc_number: attributes.disc_number,
            track_number: attributes.track_number,
            content_rating: ContentRating::from_attribute(attributes.content_rating.as_deref()),
            is_apple_digital_master: attributes.is_apple_digital_master,
            audio_traits: attributes.audio_traits,
            artwork_url: attributes.artwork.url,
            enhanced_hls: attributes
                .extended_asset_urls
                .enhanced_hls
                .filter(|url| !url.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AlbumResource {
    pub id: String,
    pub attributes: Option<AlbumAttributes>,
    #[serde(default)]
    pub relationships: AlbumRelationships,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct AlbumAttributes {
    pub name: String,
    pub artist_name: String,
    pub release_date: String,
    pub upc: String,
    pub record_label: String,
    pub copyright: String,
    pub content_rating: Option<String>,
    pub is_apple_digital_master: bool,
    pub is_mastered_for_itunes: bool,
    pub track_count: u32,
    pub artwork: Artwork,
    pub editorial_video: EditorialVideo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct EditorialVideo {
    pub motion_detail_square: MotionVideo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct MotionVideo {
    pub video: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AlbumRelationships {
    pub tracks: Relationship<SongResource>,
    pub artists: Relationship<ArtistResource>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ArtistResource {
    pub id: String,
    pub attributes: Option<ArtistAttributes>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct ArtistAttributes {
    pub name: String,
    pub artwork: Artwork,
}

impl AlbumResource {
    /// Map onto [`AlbumInfo`] with an already complete track list
    pub fn into_album(self, tracks: Vec<SongResource>) -> AlbumInfo {
        let attributes = self.attributes.unwrap_or_default();
        let artist = self.relationships.artists.data.into_iter().next();

        AlbumInfo {
            id: self.id,
            name: attributes.name,
            artist_name: attributes.artist_name,
            artist_id: artist.as_ref().map(|a| a.id.clone()),
            artist_artwork_url: artist
                .and_then(|a| a.attributes)
                .map(|a| a.artwork.url)
                .filter(|url| !url.is_empty()),
            release_date: attributes.release_date,
            upc: attributes.upc,
            record_label: attributes.record_label,
            copyright: attributes.copyright,
            content_rating: ContentRating::from_attribute(attributes.content_rating.as_deref()),
            is_apple_digital_master: attributes.is_apple_digital_master,
            is_mastered_for_itunes: attributes.is_mastered_for_itunes,
            track_count: attributes.track_count,
            artwork_url: attributes.artwork.url,
            motion_square_video: Some(attributes.editorial_video.motion_detail_square.video)
                .filter(|url| !url.is_empty()),
            tracks: tracks.into_iter().map(SongInfo::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlaylistResource {
    pub id: String,
    pub attributes: Option<PlaylistAttributes>,
    #[serde(default)]
    pub relationships: PlaylistRelationships,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct PlaylistAttributes {
    pub name: String,
    pub curator_name: String,
    pub artwork: Artwork,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct PlaylistRelationships {
    pub tracks: Relationship<SongResource>,
}

/// Album artist recorded for playlist items
const PLAYLIST_ARTIST: &str = "Apple Music";

impl PlaylistResource {
    pub fn into_playlist(self, tracks: Vec<SongResource>) -> PlaylistInfo {
        let attributes = self.attributes.unwrap_or_default();
        PlaylistInfo {
            id: self.id,
            name: attributes.name,
            artist_name: if attributes.curator_name.is_empty() {
                PLAYLIST_ARTIST.to_string()
            } else {
                attributes.curator_name
            },
            artwork_url: Some(attributes.artwork.url).filter(|url| !url.is_empty()),
            tracks: tracks.into_iter().map(SongInfo::from).collect(),
        }
    }
}

/// Stations only need a name and artwork from their own resource
#[derive(Debug, Deserialize)]
pub(crate) struct StationResource {
    pub attributes: Option<PlaylistAttributes>,
}

/// Entries of an artist's albums or music videos
#[derive(Debug, Deserialize)]
pub(crate) struct ArtistItemResource {
    pub id: String,
    pub attributes: Option<ArtistItemAttributes>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct ArtistItemAttributes {
    pub name: String,
    pub release_date: String,
    pub url: String,
}

impl From<ArtistItemResource> for ArtistItem {
    fn from(resource: ArtistItemResource) -> Self {
        let attributes = resource.attributes.unwrap_or_default();
        Self {
            id: resource.id,
            name: attributes.name,
            release_date: attributes.release_date,
            url: attributes.url,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LyricsResource {
    pub attributes: Option<LyricsAttributes>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct LyricsAttributes {
    pub ttml: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub results: SearchResults,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SearchResults {
    pub albums: Relationship<SearchResource>,
    pub songs: Relationship<SearchResource>,
    pub artists: Relationship<SearchResource>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResource {
    pub id: String,
    pub attributes: Option<SearchAttributes>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct SearchAttributes {
    pub name: String,
    pub artist_name: String,
    pub album_name: String,
    pub release_date: String,
    pub genre_names: Vec<String>,
    pub url: String,
}

impl SearchResults {
    pub fn into_hits(self, kind: SearchKind) -> Vec<SearchHit> {
        let resources = match kind {
            SearchKind::Album => self.albums,
            SearchKind::Song => self.songs,
            SearchKind::Artist => self.artists,
        };

        resources
            .data
            .into_iter()
            .map(|resource| {
                let attributes = resource.attributes.unwrap_or_default();
                let detail = match kind {
                    SearchKind::Album => {
                        let year = attributes.release_date.get(..4).unwrap_or_default();
                        format!("{} ({})", attributes.artist_name, year)
                    }
                    SearchKind::Song => {
                        format!("{} - {}", attributes.artist_name, attributes.album_name)
                    }
                    SearchKind::Artist => attributes.genre_names.join(", "),
                };
                SearchHit {
                    kind,
                    id: resource.id,
                    name: attributes.name,
                    detail,
                    url: attributes.url,
                }
            })
            .collect()
    }
}
