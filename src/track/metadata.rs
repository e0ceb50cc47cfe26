use std::path::PathBuf;

use crate::catalog::{ContentRating, SongInfo};
use crate::config::Config;
use crate::track::{Origin, Track};

/// Structured tags written into a finished file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataRecord {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub album_artist: String,
    pub composer: String,
    pub genre: String,
    pub release_date: String,
    pub copyright: String,
    pub record_label: String,
    pub upc: String,
    pub isrc: String,
    pub lyrics: Option<String>,
    pub track_number: u32,
    pub track_total: u32,
    pub disc_number: u32,
    pub disc_total: u32,
    pub content_rating: ContentRating,
    pub song_id: Option<String>,
    pub album_id: Option<String>,
    pub artist_id: Option<String>,
    /// Image embedded as cover art
    pub cover: Option<PathBuf>,
}

/// Where a track sits: its album fields and numbering.
///
/// Albums and resolved albums number tracks as the catalog does. Playlist
/// entries without song info are numbered by position on a single disc.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placement {
    pub album: String,
    pub album_artist: String,
    pub track_number: u32,
    pub track_total: u32,
    pub disc_number: u32,
    pub disc_total: u32,
    pub upc: String,
    pub record_label: String,
    pub copyright: String,
    pub release_date: String,
    pub album_id: Option<String>,
}

fn position(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

impl Placement {
    pub fn for_track(track: &Track, config: &Config) -> Self {
        let song = &track.song;
        let use_album = match &track.origin {
            Origin::Album { .. } | Origin::Station { .. } => true,
            Origin::Playlist { .. } => config.use_songinfo_for_playlist,
            Origin::Standalone => false,
        };

        if use_album && let Some(album) = &track.album {
            let name = match &track.origin {
                Origin::Album { .. } if !song.album_name.is_empty() => song.album_name.clone(),
                _ => album.name.clone(),
            };
            return Self {
                album: name,
                album_artist: album.artist_name.clone(),
                track_number: song.track_number,
                track_total: album.track_count,
                disc_number: song.disc_number,
                disc_total: album.disc_total(),
                upc: album.upc.clone(),
                record_label: album.record_label.clone(),
                copyright: album.copyright.clone(),
                release_date: album.release_date.clone(),
                album_id: Some(album.id.clone()),
            };
        }

        let collection = match &track.origin {
            Origin::Playlist { name, curator, .. } => Some((name.clone(), curator.clone())),
            Origin::Station { name, .. } => Some((name.clone(), "Apple Music".to_string())),
            Origin::Album { .. } | Origin::Standalone => None,
        };

        match collection {
            Some((album, album_artist)) => Self {
                album,
                album_artist,
                track_number: position(track.ordinal),
                track_total: position(track.total),
                disc_number: 1,
                disc_total: 1,
                release_date: song.release_date.clone(),
                ..Default::default()
            },
            None => Self {
                album: song.album_name.clone(),
                track_number: song.track_number,
                disc_number: song.disc_number,
                release_date: song.release_date.clone(),
                ..Default::default()
            },
        }
    }
}

impl MetadataRecord {
    pub fn new(
        song: &SongInfo,
        placement: Placement,
        lyrics: Option<String>,
        cover: Option<PathBuf>,
    ) -> Self {
        Self {
            title: song.name.clone(),
            artist: song.artist_name.clone(),
            album: placement.album,
            album_artist: placement.album_artist,
            composer: song.composer_name.clone(),
            genre: song.genre.clone(),
            release_date: placement.release_date,
            copyright: placement.copyright,
            record_label: placement.record_label,
            upc: placement.upc,
            isrc: song.isrc.clone(),
            lyrics,
            track_number: placement.track_number,
            track_total: placement.track_total,
            disc_number: placement.disc_number,
            disc_total: placement.disc_total,
            content_rating: song.content_rating,
            song_id: Some(song.id.clone()).filter(|id| !id.is_empty()),
            album_id: placement.album_id,
            artist_id: song.artist_id.clone(),
            cover,
        }
    }
}

fn numbered(number: u32, total: u32) -> String {
    if total > 0 {
        format!("{number}/{total}")
    } else {
        number.to_string()
    }
}

/// `key=value` tags for a muxed music video
pub fn video_tags(video: &SongInfo, placement: &Placement) -> Vec<(String, String)> {
    let rating = match video.content_rating {
        ContentRating::Explicit => "1",
        ContentRating::Clean => "2",
        ContentRating::None => "0",
    };

    let mut tags = vec![
        ("tool".to_string(), String::new()),
        ("artist".to_string(), video.artist_name.clone()),
        ("title".to_string(), video.name.clone()),
        ("genre".to_string(), video.genre.clone()),
        ("created".to_string(), video.release_date.clone()),
        ("ISRC".to_string(), video.isrc.clone()),
        ("rating".to_string(), rating.to_string()),
        ("album".to_string(), placement.album.clone()),
        (
            "disk".to_string(),
            numbered(placement.disc_number, placement.disc_total),
        ),
        ("track".to_string(), placement.track_number.to_string()),
        (
            "tracknum".to_string(),
            numbered(placement.track_number, placement.track_total),
        ),
    ];

    let optional = [
        ("album_artist", &placement.album_artist),
        ("performer", &video.artist_name),
        ("copyright", &placement.copyright),
        ("UPC", &placement.upc),
    ];
    tags.extend(
        optional
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| (key.to_string(), value.clone())),
    );
    tags
}
