use std::fmt;

use url::Url;

const CATALOG_HOST_SUFFIX: &str = "music.apple.com";

/// Discriminant of a [`CatalogLink`], used for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    MusicVideo,
    Song,
    Album,
    Playlist,
    Station,
    Artist,
    Invalid,
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MusicVideo => "Music Video",
            Self::Song => "Song",
            Self::Album => "Album",
            Self::Playlist => "Playlist",
            Self::Station => "Station",
            Self::Artist => "Artist",
            Self::Invalid => "Invalid",
        };
        f.write_str(name)
    }
}

/// A classified catalog link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogLink {
    MusicVideo {
        storefront: String,
        id: String,
    },
    Song {
        storefront: String,
        id: String,
    },
    Album {
        storefront: String,
        id: String,
        /// Song addressed through `?i=`
        song: Option<String>,
    },
    Playlist {
        storefront: String,
        id: String,
    },
    Station {
        storefront: String,
        id: String,
    },
    Artist {
        storefront: String,
        id: String,
    },
    Invalid,
}

impl CatalogLink {
    /// Classify a raw link. Anything unrecognised is [`CatalogLink::Invalid`].
    pub fn parse(raw: &str) -> Self {
        let Ok(url) = Url::parse(raw.trim()) else {
            return Self::Invalid;
        };
        if !url
            .host_str()
            .is_some_and(|host| host.ends_with(CATALOG_HOST_SUFFIX))
        {
            return Self::Invalid;
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let [storefront, kind, .., last] = segments.as_slice() else {
            return Self::Invalid;
        };
        if storefront.len() != 2 || !storefront.chars().all(|c| c.is_ascii_alphabetic()) {
            return Self::Invalid;
        }

        let storefront = storefront.to_string();
        let numeric_id = || {
            let id = last.strip_prefix("id").unwrap_or(*last);
            (!id.is_empty() && id.chars().all(|c| c.is_ascii_digit())).then(|| id.to_string())
        };
        let prefixed_id = |prefix: &str| last.starts_with(prefix).then(|| last.to_string());

        let link = match *kind {
            "music-video" => numeric_id().map(|id| Self::MusicVideo { storefront, id }),
            "song" => numeric_id().map(|id| Self::Song { storefront, id }),
            "album" => numeric_id().map(|id| {
                let song = url
                    .query_pairs()
                    .find(|(key, _)| key == "i")
                    .map(|(_, value)| value.into_owned())
                    .filter(|value| !value.is_empty());
                Self::Album {
                    storefront,
                    id,
                    song,
                }
            }),
            "playlist" => prefixed_id("pl.").map(|id| Self::Playlist { storefront, id }),
            "station" => prefixed_id("ra.").map(|id| Self::Station { storefront, id }),
            "artist" => numeric_id().map(|id| Self::Artist { storefront, id }),
            _ => None,
        };

        link.unwrap_or(Self::Invalid)
    }

    pub fn kind(&self) -> LinkKind {
        match self {
            Self::MusicVideo { .. } => LinkKind::MusicVideo,
            Self::Song { .. } => LinkKind::Song,
            Self::Album { .. } => LinkKind::Album,
            Self::Playlist { .. } => LinkKind::Playlist,
            Self::Station { .. } => LinkKind::Station,
            Self::Artist { .. } => LinkKind::Artist,
            Self::Invalid => LinkKind::Invalid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_album_with_slug() {
        let link = CatalogLink::parse("https://music.apple.com/us/album/1989-taylors-version/1708308989");
        assert_eq!(
            link,
            CatalogLink::Album {
                storefront: "us".to_string(),
                id: "1708308989".to_string(),
                song: None,
            }
        );
    }

    #[test]
    fn album_song_query_selects_single_song() {
        let link = CatalogLink::parse("https://music.apple.com/jp/album/x/1552791073?i=1552791427");
        assert_eq!(
            link,
            CatalogLink::Album {
                storefront: "jp".to_string(),
                id: "1552791073".to_string(),
                song: Some("1552791427".to_string()),
            }
        );
    }

    #[test]
    fn classifies_playlist_and_station_ids() {
        assert_eq!(
            CatalogLink::parse("https://music.apple.com/us/playlist/todays-hits/pl.f4d106fed2bd41149aaacabb233eb5eb"),
            CatalogLink::Playlist {
                storefront: "us".to_string(),
                id: "pl.f4d106fed2bd41149aaacabb233eb5eb".to_string(),
            }
        );
        assert_eq!(
            CatalogLink::parse("https://music.apple.com/us/station/some-radio/ra.978194965").kind(),
            LinkKind::Station
        );
    }

    #[test]
    fn classifies_song_video_and_artist() {
        assert_eq!(
            CatalogLink::parse("https://music.apple.com/us/song/love-story/1440857786").kind(),
            LinkKind::Song
        );
        assert_eq!(
            CatalogLink::parse("https://music.apple.com/us/music-video/gimme-gimme/1544566520").kind(),
            LinkKind::MusicVideo
        );
        assert_eq!(
            CatalogLink::parse("https://music.apple.com/us/artist/taylor-swift/159260351").kind(),
            LinkKind::Artist
        );
    }

    #[test]
    fn slugless_links_are_accepted() {
        assert_eq!(
            CatalogLink::parse("https://music.apple.com/gb/album/1440857781").kind(),
            LinkKind::Album
        );
    }

    #[test]
    fn rejects_foreign_hosts_and_malformed_paths() {
        for raw in [
            "not a url",
            "https://example.com/us/album/x/123",
            "https://music.apple.com/us/album/x/abc",
            "https://music.apple.com/usa/album/x/123",
            "https://music.apple.com/us/playlist/x/123",
            "https://music.apple.com/us/curator/x/123",
            "https://music.apple.com/us",
        ] {
            assert_eq!(CatalogLink::parse(raw), CatalogLink::Invalid, "{raw}");
        }
    }
}
