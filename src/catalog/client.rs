use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::catalog::resource::{
    AlbumResource, ArtistItemResource, ArtistResource, Document, LyricsResource, PlaylistResource,
    SearchResponse, SongResource, StationResource,
};
use crate::catalog::{
    AlbumInfo, ArtistItem, ArtistRelation, CatalogClient, PlaylistInfo, SearchHit, SearchKind,
    SongInfo, StationInfo,
};
use crate::config::{Config, LrcType};
use crate::error::CatalogError;

const ORIGIN: &str = "https://music.apple.com";
const SEARCH_LIMIT: u32 = 25;
const ARTIST_PAGE_LIMIT: u32 = 100;

/// Catalog client for the Apple Music web API
#[derive(Clone)]
pub struct AppleMusicClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    media_user_token: String,
    language: String,
    lyrics_kind: LrcType,
}

impl AppleMusicClient {
    pub fn new(config: &Config, token: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), config, token)
    }

    /// Create a client sharing an existing reqwest::Client
    pub fn with_client(client: reqwest::Client, config: &Config, token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: config.catalog_base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            media_user_token: config.media_user_token.clone(),
            language: config.language.clone(),
            lyrics_kind: config.lrc_type,
        }
    }

    /// Build an absolute endpoint URL from a path and query pairs
    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<String, CatalogError> {
        let raw = format!("{}{}", self.base_url, path);
        let mut url = Url::parse(&raw).map_err(|e| CatalogError::InvalidUrl {
            url: raw.clone(),
            source: e,
        })?;
        if !query.is_empty() || !self.language.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            if !self.language.is_empty() {
                pairs.append_pair("l", &self.language);
            }
        }
        Ok(url.into())
    }

    /// Resolve a relative `next` link from a paged relationship
    fn next_page(&self, next: &str) -> String {
        format!("{}{}", self.base_url, next)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, CatalogError> {
        self.send_json(self.client.get(url), url).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<T, CatalogError> {
        debug!(%url, "catalog request");

        let mut request = request
            .bearer_auth(&self.token)
            .header(reqwest::header::ORIGIN, ORIGIN);
        if !self.media_user_token.is_empty() {
            request = request.header("Media-User-Token", &self.media_user_token);
        }

        let response = request.send().await.map_err(|e| CatalogError::RequestFailed {
            url: url.to_string(),
            source: e,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| CatalogError::RequestFailed {
                url: url.to_string(),
                source: e,
            })?;

        serde_json::from_slice(&body).map_err(|e| CatalogError::DecodeFailed {
            url: url.to_string(),
            source: e,
        })
    }

    /// Follow `next` links until the relationship is exhausted
    async fn remaining_tracks(
        &self,
        mut next: Option<String>,
        tracks: &mut Vec<SongResource>,
    ) -> Result<(), CatalogError> {
        while let Some(path) = next {
            let page: Document<SongResource> = self.get_json(&self.next_page(&path)).await?;
            tracks.extend(page.data);
            next = page.next;
        }
        Ok(())
    }
}

fn first<T>(document: Document<T>, kind: &'static str, id: &str) -> Result<T, CatalogError> {
    document
        .data
        .into_iter()
        .next()
        .ok_or_else(|| CatalogError::NotFound {
            kind,
            id: id.to_string(),
        })
}

#[async_trait]
impl CatalogClient for AppleMusicClient {
    async fn song(&self, storefront: &str, id: &str) -> Result<SongInfo, CatalogError> {
        let url = self.endpoint(
            &format!("/v1/catalog/{storefront}/songs/{id}"),
            &[("include", "albums,artists"), ("extend", "extendedAssetUrls")],
        )?;
        let document: Document<SongResource> = self.get_json(&url).await?;
        Ok(first(document, "song", id)?.into())
    }

    async fn album(&self, storefront: &str, id: &str) -> Result<AlbumInfo, CatalogError> {
        let url = self.endpoint(
            &format!("/v1/catalog/{storefront}/albums/{id}"),
            &[
                ("include", "tracks,artists"),
                ("include[songs]", "artists"),
                ("extend", "editorialVideo,extendedAssetUrls"),
            ],
        )?;
        let document: Document<AlbumResource> = self.get_json(&url).await?;
        let mut album = first(document, "album", id)?;

        let mut tracks = std::mem::take(&mut album.relationships.tracks.data);
        let next = album.relationships.tracks.next.take();
        self.remaining_tracks(next, &mut tracks).await?;

        Ok(album.into_album(tracks))
    }

    async fn playlist(&self, storefront: &str, id: &str) -> Result<PlaylistInfo, CatalogError> {
        let url = self.endpoint(
            &format!("/v1/catalog/{storefront}/playlists/{id}"),
            &[("include", "tracks"), ("extend", "extendedAssetUrls")],
        )?;
        let document: Document<PlaylistResource> = self.get_json(&url).await?;
        let mut playlist = first(document, "playlist", id)?;

        let mut tracks = std::mem::take(&mut playlist.relationships.tracks.data);
        let next = playlist.relationships.tracks.next.take();
        self.remaining_tracks(next, &mut tracks).await?;

        Ok(playlist.into_playlist(tracks))
    }

    async fn station(&self, storefront: &str, id: &str) -> Result<StationInfo, CatalogError> {
        let url = self.endpoint(&format!("/v1/catalog/{storefront}/stations/{id}"), &[])?;
        let document: Document<StationResource> = self.get_json(&url).await?;
        let attributes = first(document, "station", id)?
            .attributes
            .unwrap_or_default();

        let tracks_url = self.endpoint(
            &format!("/v1/me/stations/next-tracks/{id}"),
            &[("extend", "extendedAssetUrls")],
        )?;
        let tracks: Document<SongResource> = self
            .send_json(self.client.post(&tracks_url), &tracks_url)
            .await?;

        Ok(StationInfo {
            id: id.to_string(),
            name: attributes.name,
            artwork_url: Some(attributes.artwork.url).filter(|url| !url.is_empty()),
            tracks: tracks.data.into_iter().map(SongInfo::from).collect(),
        })
    }

    async fn music_video(&self, storefront: &str, id: &str) -> Result<SongInfo, CatalogError> {
        let url = self.endpoint(&format!("/v1/catalog/{storefront}/music-videos/{id}"), &[])?;
        let document: Document<SongResource> = self.get_json(&url).await?;
        Ok(first(document, "music video", id)?.into())
    }

    async fn artist_name(&self, storefront: &str, id: &str) -> Result<String, CatalogError> {
        let url = self.endpoint(&format!("/v1/catalog/{storefront}/artists/{id}"), &[])?;
        let document: Document<ArtistResource> = self.get_json(&url).await?;
        Ok(first(document, "artist", id)?
            .attributes
            .unwrap_or_default()
            .name)
    }

    async fn artist_items(
        &self,
        storefront: &str,
        id: &str,
        relation: ArtistRelation,
    ) -> Result<Vec<ArtistItem>, CatalogError> {
        let limit = ARTIST_PAGE_LIMIT.to_string();
        let mut items = Vec::new();
        let mut offset = 0usize;

        loop {
            let offset_param = offset.to_string();
            let url = self.endpoint(
                &format!("/v1/catalog/{storefront}/artists/{id}/{}", relation.path()),
                &[("limit", &limit), ("offset", &offset_param)],
            )?;
            let page: Document<ArtistItemResource> = self.get_json(&url).await?;
            let fetched = page.data.len();
            items.extend(page.data.into_iter().map(ArtistItem::from));

            if page.next.is_none() || fetched == 0 {
                break;
            }
            offset += fetched;
        }

        Ok(items)
    }

    async fn search(
        &self,
        storefront: &str,
        kind: SearchKind,
        query: &str,
    ) -> Result<Vec<SearchHit>, CatalogError> {
        let limit = SEARCH_LIMIT.to_string();
        let url = self.endpoint(
            &format!("/v1/catalog/{storefront}/search"),
            &[
                ("term", query),
                ("types", kind.resource_type()),
                ("limit", &limit),
            ],
        )?;
        let response: SearchResponse = self.get_json(&url).await?;
        Ok(response.results.into_hits(kind))
    }

    async fn lyrics(&self, storefront: &str, id: &str) -> Result<String, CatalogError> {
        let path = format!("/v1/catalog/{storefront}/songs/{id}/{}", self.lyrics_kind.path());
        let url = self.endpoint(&path, &[])?;
        let document: Document<LyricsResource> = self.get_json(&url).await?;
        let ttml = first(document, "lyrics", id)?
            .attributes
            .unwrap_or_default()
            .ttml;

        if ttml.is_empty() {
            return Err(CatalogError::NotFound {
                kind: "lyrics",
                id: id.to_string(),
            });
        }
        Ok(ttml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(language: &str) -> AppleMusicClient {
        let config = Config {
            catalog_base_url: "https://api.example.com/".to_string(),
            language: language.to_string(),
            ..Default::default()
        };
        AppleMusicClient::new(&config, "token")
    }

    #[test]
    fn endpoint_encodes_query_and_language() {
        let url = client("en-GB")
            .endpoint("/v1/catalog/gb/search", &[("term", "taylor swift"), ("types", "songs")])
            .unwrap();

        assert_eq!(
            url,
            "https://api.example.com/v1/catalog/gb/search?term=taylor+swift&types=songs&l=en-GB"
        );
    }

    #[test]
    fn endpoint_without_language_has_no_l_param() {
        let url = client("").endpoint("/v1/catalog/us/songs/1", &[]).unwrap();
        assert_eq!(url, "https://api.example.com/v1/catalog/us/songs/1");
    }

    #[test]
    fn next_page_is_resolved_against_base() {
        assert_eq!(
            client("").next_page("/v1/catalog/us/albums/1/tracks?offset=300"),
            "https://api.example.com/v1/catalog/us/albums/1/tracks?offset=300"
        );
    }
}
