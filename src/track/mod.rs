mod metadata;
pub mod naming;
mod pipeline;

use std::path::PathBuf;
use std::sync::Arc;

use crate::catalog::{AlbumInfo, SongInfo};

pub use metadata::{MetadataRecord, Placement, video_tags};
pub use pipeline::TrackPipeline;

/// The collection a track was reached through
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Album {
        id: String,
    },
    Playlist {
        id: String,
        name: String,
        /// Recorded as album artist when song info is not used
        curator: String,
    },
    Station {
        id: String,
        name: String,
    },
    /// A music video requested on its own
    Standalone,
}

impl Origin {
    pub fn collection_id(&self) -> Option<&str> {
        match self {
            Self::Album { id } | Self::Playlist { id, .. } | Self::Station { id, .. } => Some(id),
            Self::Standalone => None,
        }
    }

    /// Playlist and station entries may carry their own cover art
    pub fn has_track_covers(&self) -> bool {
        matches!(self, Self::Playlist { .. } | Self::Station { .. })
    }
}

/// A catalog item being processed. Owned by the orchestrator that created it.
#[derive(Debug, Clone)]
pub struct Track {
    /// 1-based position in the collection
    pub ordinal: usize,
    pub total: usize,
    pub storefront: String,
    pub song: SongInfo,
    pub origin: Origin,
    pub save_dir: PathBuf,
    /// Collection cover to embed, if one was saved
    pub cover_path: Option<PathBuf>,
    /// Album the track belongs to, once resolved
    pub album: Option<Arc<AlbumInfo>>,
}

impl Track {
    pub fn new(song: SongInfo, ordinal: usize, total: usize, origin: Origin) -> Self {
        Self {
            ordinal,
            total,
            storefront: String::new(),
            song,
            origin,
            save_dir: PathBuf::new(),
            cover_path: None,
            album: None,
        }
    }

    /// Key under which this track's success is remembered
    pub fn memo_key(&self) -> &str {
        self.origin.collection_id().unwrap_or(&self.song.id)
    }
}
