// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::catalog::{AlbumInfo, ItemKind, SongInfo};
use crate::config::Settings;
use crate::manifest::{
    AudioConstraints, enumerate_audio_formats, fetch_manifest, select_audio_variant,
    select_video_variant, wants_device_upgrade,
};
use crate::progress::{ProgressEvent, SkipReason};
use crate::services::Services;
use crate::state::{Outcome, RunState};
use crate::tools::download_artwork;
use crate::track::naming::{
    album_folder, artist_folder, limit, needs_quality, playlist_folder, sanitize, trim_folder_name,
};
use crate::track::{Origin, Track, TrackPipeline};

const ANIMATED_ARTWORK_FILE: &str = "square_animated_artwork.mp4";

/// Quality label and codec of an album whose first track has no enhanced manifest
const AAC_ONLY: (&str, &str) = ("256Kbps", "AAC");

/// Which ordinals of a collection to process
enum Selection {
    All,
    Only(Vec<usize>),
}

impl Selection {
    fn contains(&self, ordinal: usize) -> bool {
        match self {
            Self::All => true,
            Self::Only(ordinals) => ordinals.contains(&ordinal),
        }
    }
}

pub struct CollectionOrchestrator<'a> {
    settings: &'a Settings,
    services: &'a Services,
}

impl<'a> CollectionOrchestrator<'a> {
    pub fn new(settings: &'a Settings, services: &'a Services) -> Self {
        Self { settings, services }
    }

    /// Download an album, or only `only_song` of it when given
    pub async fn album(
        &self,
        storefront: &str,
        id: &str,
        only_song: Option<&str>,
        state: &mut RunState,
    ) {
        let album = match self.services.catalog.album(storefront, id).await {
            Ok(album) => Arc::new(album),
            Err(e) => return self.resolution_failed("album", id, &e, state),
        };
        self.services.reporter.report(ProgressEvent::CollectionResolved {
            name: album.name.clone(),
            artist: album.artist_name.clone(),
            track_count: album.tracks.len(),
        });

        if self.settings.debug {
            return self.enumerate(&album.tracks).await;
        }

        let album_dir = match self.album_dirs(&album).await {
            Ok(dir) => dir,
            Err(e) => return self.resolution_failed("album", id, &e, state),
        };
        let cover = self
            .save_cover(&album.artwork_url, &album_dir, "cover")
            .await;
        if self.settings.config.save_animated_artwork
            && let Some(motion) = &album.motion_square_video
        {
            self.save_animated_artwork(motion, &album_dir).await;
        }

        let selection = match only_song {
            Some(song_id) => match album.tracks.iter().position(|song| song.id == song_id) {
                Some(index) => Selection::Only(vec![index + 1]),
                None => {
                    self.services.reporter.report(ProgressEvent::Notice {
                        message: format!("Song {song_id} is not part of album {}", album.name),
                    });
                    return;
                }
            },
            None if self.settings.select => Selection::Only(
                self.services
                    .prompter
                    .select_tracks(&album.name, &album.tracks),
            ),
            None => Selection::All,
        };

        let total = album.tracks.len();
        let tracks: Vec<Track> = album
            .tracks
            .iter()
            .enumerate()
            .map(|(index, song)| {
                let mut track = Track::new(
                    song.clone(),
                    index + 1,
                    total,
                    Origin::Album {
                        id: album.id.clone(),
                    },
                );
                track.storefront = storefront.to_string();
                track.save_dir = album_dir.clone();
                track.cover_path = cover.clone();
                track.album = Some(album.clone());
                track
            })
            // A song addressed through its album leaves the other tracks untouched
            .filter(|track| only_song.is_none() || selection.contains(track.ordinal))
            .collect();
        self.run_tracks(tracks, &selection, state).await;
    }

    pub async fn playlist(&self, storefront: &str, id: &str, state: &mut RunState) {
        let playlist = match self.services.catalog.playlist(storefront, id).await {
            Ok(playlist) => playlist,
            Err(e) => return self.resolution_failed("playlist", id, &e, state),
        };
        self.services.reporter.report(ProgressEvent::CollectionResolved {
            name: playlist.name.clone(),
            artist: playlist.artist_name.clone(),
            track_count: playlist.tracks.len(),
        });

        if self.settings.debug {
            return self.enumerate(&playlist.tracks).await;
        }

        let config = &self.settings.config;
        let save_dir = self
            .settings
            .codec
            .save_root(config)
            .join(playlist_folder(config, &playlist.name, &playlist.id));
        if let Err(e) = tokio::fs::create_dir_all(&save_dir).await {
            return self.folder_failed(&save_dir, &e, state);
        }

        let cover = match &playlist.artwork_url {
            Some(url) => self.save_cover(url, &save_dir, "cover").await,
            None => None,
        };

        let origin = Origin::Playlist {
            id: playlist.id.clone(),
            name: playlist.name.clone(),
            curator: playlist.artist_name.clone(),
        };
        let tracks = self.collection_tracks(playlist.tracks, storefront, &origin, &save_dir, cover);
        self.run_tracks(tracks, &Selection::All, state).await;
    }

    pub async fn station(&self, storefront: &str, id: &str, state: &mut RunState) {
        let station = match self.services.catalog.station(storefront, id).await {
            Ok(station) => station,
            Err(e) => return self.resolution_failed("station", id, &e, state),
        };
        self.services.reporter.report(ProgressEvent::CollectionResolved {
            name: station.name.clone(),
            artist: String::new(),
            track_count: station.tracks.len(),
        });

        if self.settings.debug {
            return self.enumerate(&station.tracks).await;
        }

        let save_dir = self
            .settings
            .codec
            .save_root(&self.settings.config)
            .join(sanitize(&trim_folder_name(&limit(
                &station.name,
                self.settings.config.limit_max,
            ))));
        if let Err(e) = tokio::fs::create_dir_all(&save_dir).await {
            return self.folder_failed(&save_dir, &e, state);
        }

        let origin = Origin::Station {
            id: station.id.clone(),
            name: station.name.clone(),
        };
        let tracks = self.collection_tracks(station.tracks, storefront, &origin, &save_dir, None);
        self.run_tracks(tracks, &Selection::All, state).await;
    }

    fn collection_tracks(
        &self,
        songs: Vec<SongInfo>,
        storefront: &str,
        origin: &Origin,
        save_dir: &Path,
        cover: Option<PathBuf>,
    ) -> Vec<Track> {
        let total = songs.len();
        songs
            .into_iter()
            .enumerate()
            .map(|(index, song)| {
                let mut track = Track::new(song, index + 1, total, origin.clone());
                track.storefront = storefront.to_string();
                track.save_dir = save_dir.to_path_buf();
                track.cover_path = cover.clone();
                track
            })
            .collect()
    }

    async fn run_tracks(&self, tracks: Vec<Track>, selection: &Selection, state: &mut RunState) {
        let pipeline = TrackPipeline::new(self.settings, self.services);

        for mut track in tracks {
            if let ItemKind::Other(kind) = &track.song.kind {
                debug!(id = %track.song.id, %kind, "not a song");
                state.counter.record_not_song();
                continue;
            }

            if state.memo.contains(track.memo_key(), track.ordinal) {
                state.counter.tally(Outcome::Success);
                self.services.reporter.report(ProgressEvent::TrackSkipped {
                    ordinal: track.ordinal,
                    total: track.total,
                    name: track.song.name.clone(),
                    reason: SkipReason::Remembered,
                });
                continue;
            }

            if selection.contains(track.ordinal) {
                pipeline.run(&mut track, state).await;
            }
        }
    }

    /// Create `<root>/<artist>/<album>` and save the artist cover. Returns the album folder.
    async fn album_dirs(&self, album: &AlbumInfo) -> Result<PathBuf, std::io::Error> {
        let config = &self.settings.config;
        let root = self.settings.codec.save_root(config);

        let artist_dir = if config.artist_folder_format.is_empty() {
            root.to_path_buf()
        } else {
            let artist_id = album.artist_id.as_deref().unwrap_or_default();
            root.join(artist_folder(config, &album.artist_name, artist_id))
        };

        let (quality, codec) = if needs_quality(&config.album_folder_format) {
            self.probe_quality(album).await
        } else {
            (String::new(), self.settings.codec.label().to_string())
        };
        let album_dir = artist_dir.join(album_folder(config, album, &quality, &codec));
        tokio::fs::create_dir_all(&album_dir).await?;

        if config.save_artist_cover
            && let Some(url) = &album.artist_artwork_url
        {
            self.save_cover(url, &artist_dir, "folder").await;
        }

        Ok(album_dir)
    }

    /// Quality label and codec of the album, judged from its first track
    async fn probe_quality(&self, album: &AlbumInfo) -> (String, String) {
        let codec = self.settings.codec.label().to_string();
        if self.settings.wants_aac_lc() {
            return (AAC_ONLY.0.to_string(), codec);
        }
        let Some(first) = album.tracks.first() else {
            return (String::new(), codec);
        };
        let Some(mut url) = first.enhanced_hls.clone() else {
            return (AAC_ONLY.0.to_string(), AAC_ONLY.1.to_string());
        };

        let config = &self.settings.config;
        if wants_device_upgrade(config, &first.audio_traits)
            && let Ok(Some(upgraded)) = self.services.upgrader.upgrade(&first.id).await
        {
            url = upgraded;
        }

        let selection = match fetch_manifest(self.services.http.as_ref(), &url).await {
            Ok(manifest) => select_audio_variant(
                &manifest.body,
                &manifest.base_url,
                self.settings.codec,
                &AudioConstraints::from_config(config),
            )
            .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match selection {
            Ok(Some(selection)) => (selection.quality, codec),
            Ok(None) => (String::new(), codec),
            Err(e) => {
                warn!(album = %album.id, error = %e, "quality probe failed");
                (String::new(), codec)
            }
        }
    }

    async fn save_cover(&self, template: &str, dir: &Path, stem: &str) -> Option<PathBuf> {
        if template.is_empty() {
            return None;
        }
        match download_artwork(
            self.services.http.as_ref(),
            template,
            &self.settings.config,
            dir,
            stem,
        )
        .await
        {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(dir = %dir.display(), %stem, error = %e, "failed to save cover");
                None
            }
        }
    }

    async fn save_animated_artwork(&self, manifest_url: &str, album_dir: &Path) {
        let target = album_dir.join(ANIMATED_ARTWORK_FILE);
        if target.exists() {
            return;
        }

        let stream = match fetch_manifest(self.services.http.as_ref(), manifest_url).await {
            Ok(manifest) => select_video_variant(
                &manifest.body,
                &manifest.base_url,
                self.settings.config.mv_max,
            )
            .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        let url = match stream {
            Ok(Some(url)) => url,
            Ok(None) => {
                debug!(%manifest_url, "no usable motion artwork rendition");
                return;
            }
            Err(e) => {
                warn!(%manifest_url, error = %e, "motion artwork manifest failed");
                return;
            }
        };

        if let Err(e) = self
            .services
            .transcoder
            .copy_stream(url.as_str(), &target)
            .await
        {
            warn!(path = %target.display(), error = %e, "failed to save animated artwork");
        }
    }

    /// Report the available formats of every track instead of downloading
    async fn enumerate(&self, tracks: &[SongInfo]) {
        for song in tracks {
            let Some(url) = &song.enhanced_hls else {
                continue;
            };
            let summary = match fetch_manifest(self.services.http.as_ref(), url).await {
                Ok(manifest) => enumerate_audio_formats(&manifest.body).map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            match summary {
                Ok(summary) => self.services.reporter.report(ProgressEvent::QualitySummary {
                    name: song.name.clone(),
                    summary: summary.to_string(),
                }),
                Err(e) => warn!(id = %song.id, error = %e, "format enumeration failed"),
            }
        }
    }

    fn resolution_failed(
        &self,
        kind: &str,
        id: &str,
        err: &dyn std::fmt::Display,
        state: &mut RunState,
    ) {
        warn!(%kind, %id, error = %err, "collection could not be resolved");
        self.services.reporter.report(ProgressEvent::Notice {
            message: format!("Failed to get {kind} {id}: {err}"),
        });
        state.counter.tally(Outcome::Error);
    }

    fn folder_failed(&self, dir: &Path, err: &std::io::Error, state: &mut RunState) {
        warn!(dir = %dir.display(), error = %err, "failed to create folder");
        self.services.reporter.report(ProgressEvent::Notice {
            message: format!("Failed to create {}: {err}", dir.display()),
        });
        state.counter.tally(Outcome::Error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{PlaylistInfo, StationInfo};
    use crate::config::{CodecMode, Config};
    use crate::services::tests::{Harness, MockCatalog, MockDecryptor, MockPrompter};
    use crate::state::Counter;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn song(id: &str, number: u32) -> SongInfo {
        SongInfo {
            id: id.to_string(),
            name: format!("Song {number}"),
            artist_name: "Artist".to_string(),
            album_id: Some("100".to_string()),
            disc_number: 1,
            track_number: number,
            enhanced_hls: Some(format!("https://aod.example.com/{id}/master.m3u8")),
            ..Default::default()
        }
    }

    fn album() -> AlbumInfo {
        AlbumInfo {
            id: "100".to_string(),
            name: "Album".to_string(),
            artist_name: "Artist".to_string(),
            artwork_url: "https://img.example.com/a/{w}x{h}bb.jpg".to_string(),
            track_count: 3,
            tracks: vec![song("1", 1), song("2", 2), song("3", 3)],
            ..Default::default()
        }
    }

    fn catalog() -> MockCatalog {
        MockCatalog {
            albums: HashMap::from([("100".to_string(), album())]),
            ..Default::default()
        }
    }

    fn settings(root: &Path) -> Settings {
        Settings::new(
            Config {
                alac_save_folder: root.to_path_buf(),
                embed_lrc: false,
                ..Default::default()
            },
            CodecMode::Lossless,
        )
    }

    fn harness(catalog: MockCatalog, prompter: MockPrompter) -> Harness {
        Harness::new(catalog, MockDecryptor::default(), prompter)
    }

    #[tokio::test]
    async fn album_is_laid_out_under_artist_folder() {
        let root = tempdir().unwrap();
        let harness = harness(catalog(), MockPrompter::default());
        let settings = settings(root.path());
        let mut state = RunState::new();

        CollectionOrchestrator::new(&settings, &harness.services)
            .album("us", "100", None, &mut state)
            .await;

        let album_dir = root.path().join("Artist").join("Album");
        assert!(album_dir.join("cover.jpg").exists());
        for name in ["01. Song 1.m4a", "02. Song 2.m4a", "03. Song 3.m4a"] {
            assert!(album_dir.join(name).exists(), "{name} missing");
        }
        assert_eq!(state.counter.total, 3);
        assert_eq!(state.counter.success, 3);
        assert!(state.counter.is_balanced());
        assert_eq!(state.memo.len(), 3);

        let records = harness.tagger.records.lock().unwrap();
        assert!(records.iter().all(|r| r.cover.is_some()));
    }

    #[tokio::test]
    async fn remembered_ordinals_count_without_running_the_pipeline() {
        let root = tempdir().unwrap();
        let harness = harness(catalog(), MockPrompter::default());
        let settings = settings(root.path());
        let mut state = RunState::new();
        state.memo.remember("100", 1);
        state.memo.remember("100", 2);

        CollectionOrchestrator::new(&settings, &harness.services)
            .album("us", "100", None, &mut state)
            .await;

        assert_eq!(harness.log.count("decrypt.stream"), 1);
        assert_eq!(harness.log.count("decrypt.stream 3"), 1);
        assert_eq!(state.counter.total, 3);
        assert_eq!(state.counter.success, 3);
        assert_eq!(
            harness.reporter.skips(),
            vec![(1, SkipReason::Remembered), (2, SkipReason::Remembered)]
        );
    }

    #[tokio::test]
    async fn song_through_album_runs_only_that_track() {
        let root = tempdir().unwrap();
        let harness = harness(catalog(), MockPrompter::default());
        let settings = settings(root.path());
        let mut state = RunState::new();

        CollectionOrchestrator::new(&settings, &harness.services)
            .album("us", "100", Some("2"), &mut state)
            .await;

        assert_eq!(harness.log.count("decrypt.stream"), 1);
        assert_eq!(harness.log.count("decrypt.stream 2"), 1);
        assert_eq!(state.counter.total, 1);
        assert!(state.memo.contains("100", 2));
        assert!(!root.path().join("Artist/Album/01. Song 1.m4a").exists());
    }

    #[tokio::test]
    async fn song_missing_from_album_is_a_notice() {
        let root = tempdir().unwrap();
        let harness = harness(catalog(), MockPrompter::default());
        let settings = settings(root.path());
        let mut state = RunState::new();

        CollectionOrchestrator::new(&settings, &harness.services)
            .album("us", "100", Some("42"), &mut state)
            .await;

        assert_eq!(state.counter, Counter::default());
        assert_eq!(harness.log.count("decrypt"), 0);
        let events = harness.reporter.events.lock().unwrap();
        assert!(
            events
                .iter()
                .any(|e| matches!(e, ProgressEvent::Notice { message } if message.contains("42")))
        );
    }

    #[tokio::test]
    async fn select_mode_checks_memo_before_selection() {
        let root = tempdir().unwrap();
        let harness = harness(
            catalog(),
            MockPrompter {
                tracks: vec![2],
                ..Default::default()
            },
        );
        let mut settings = settings(root.path());
        settings.select = true;
        let mut state = RunState::new();
        state.memo.remember("100", 1);

        CollectionOrchestrator::new(&settings, &harness.services)
            .album("us", "100", None, &mut state)
            .await;

        assert_eq!(harness.log.count("prompt.tracks Album"), 1);
        assert_eq!(harness.log.count("decrypt.stream"), 1);
        assert_eq!(harness.log.count("decrypt.stream 2"), 1);
        // Ordinal 1 is remembered, 3 was not selected
        assert_eq!(state.counter.total, 2);
        assert_eq!(state.counter.success, 2);
    }

    #[tokio::test]
    async fn quality_in_album_folder_is_probed_from_first_track() {
        let root = tempdir().unwrap();
        let harness = harness(catalog(), MockPrompter::default());
        let mut settings = settings(root.path());
        settings.config.album_folder_format = "{AlbumName} [{Quality}]".to_string();
        let mut state = RunState::new();

        CollectionOrchestrator::new(&settings, &harness.services)
            .album("us", "100", None, &mut state)
            .await;

        assert!(
            root.path()
                .join("Artist/Album [16B-44.1kHz]/01. Song 1.m4a")
                .exists()
        );
        assert_eq!(
            harness
                .log
                .count("http.get https://aod.example.com/1/master.m3u8"),
            2
        );
    }

    #[tokio::test]
    async fn animated_artwork_is_copied_once() {
        let root = tempdir().unwrap();
        let mut catalog = catalog();
        if let Some(album) = catalog.albums.get_mut("100") {
            album.motion_square_video =
                Some("https://video.example.com/mv/motion/master.m3u8".to_string());
        }
        let harness = harness(catalog, MockPrompter::default());
        let mut settings = settings(root.path());
        settings.config.save_animated_artwork = true;
        let orchestrator = CollectionOrchestrator::new(&settings, &harness.services);

        let mut state = RunState::new();
        orchestrator.album("us", "100", None, &mut state).await;
        orchestrator.album("us", "100", None, &mut state).await;

        assert!(
            root.path()
                .join("Artist/Album")
                .join(ANIMATED_ARTWORK_FILE)
                .exists()
        );
        assert_eq!(harness.log.count("ffmpeg.copy"), 1);
    }

    #[tokio::test]
    async fn unresolved_album_counts_one_error() {
        let root = tempdir().unwrap();
        let harness = harness(MockCatalog::default(), MockPrompter::default());
        let settings = settings(root.path());
        let mut state = RunState::new();

        CollectionOrchestrator::new(&settings, &harness.services)
            .album("us", "404", None, &mut state)
            .await;

        assert_eq!(state.counter.total, 1);
        assert_eq!(state.counter.error, 1);
        assert!(state.counter.is_balanced());
    }

    #[tokio::test]
    async fn debug_mode_enumerates_without_counting() {
        let root = tempdir().unwrap();
        let harness = harness(catalog(), MockPrompter::default());
        let mut settings = settings(root.path());
        settings.debug = true;
        let mut state = RunState::new();

        CollectionOrchestrator::new(&settings, &harness.services)
            .album("us", "100", None, &mut state)
            .await;

        let summaries = harness
            .reporter
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, ProgressEvent::QualitySummary { .. }))
            .count();
        assert_eq!(summaries, 3);
        assert_eq!(state.counter, Counter::default());
        assert_eq!(harness.log.count("decrypt"), 0);
        assert!(!root.path().join("Artist").exists());
    }

    #[tokio::test]
    async fn playlist_counts_non_song_entries_apart() {
        let root = tempdir().unwrap();
        let playlist = PlaylistInfo {
            id: "pl.1".to_string(),
            name: "Mix".to_string(),
            artist_name: "Curator".to_string(),
            artwork_url: None,
            tracks: vec![
                song("1", 1),
                SongInfo {
                    id: "x".to_string(),
                    kind: ItemKind::Other("uploaded-videos".to_string()),
                    ..Default::default()
                },
                song("3", 3),
            ],
        };
        let harness = harness(
            MockCatalog {
                playlists: HashMap::from([("pl.1".to_string(), playlist)]),
                ..Default::default()
            },
            MockPrompter::default(),
        );
        let settings = settings(root.path());
        let mut state = RunState::new();

        CollectionOrchestrator::new(&settings, &harness.services)
            .playlist("us", "pl.1", &mut state)
            .await;

        assert!(root.path().join("Mix/01. Song 1.m4a").exists());
        assert!(root.path().join("Mix/03. Song 3.m4a").exists());
        assert_eq!(state.counter.total, 2);
        assert_eq!(state.counter.not_song, 1);
        assert_eq!(state.counter.warnings(), 1);
        assert!(state.memo.contains("pl.1", 3));
        assert_eq!(harness.log.count("http.stream"), 0);

        let records = harness.tagger.records.lock().unwrap();
        assert_eq!(records[1].album, "Mix");
        assert_eq!(records[1].album_artist, "Curator");
        assert_eq!(records[1].track_number, 3);
    }

    #[tokio::test]
    async fn station_tracks_fall_back_to_station_album() {
        let root = tempdir().unwrap();
        let station = StationInfo {
            id: "ra.1".to_string(),
            name: "Radio".to_string(),
            artwork_url: Some("https://img.example.com/r/{w}x{h}.jpg".to_string()),
            tracks: vec![song("1", 1)],
        };
        let harness = harness(
            MockCatalog {
                stations: HashMap::from([("ra.1".to_string(), station)]),
                ..Default::default()
            },
            MockPrompter::default(),
        );
        let settings = settings(root.path());
        let mut state = RunState::new();

        CollectionOrchestrator::new(&settings, &harness.services)
            .station("us", "ra.1", &mut state)
            .await;

        assert!(root.path().join("Radio/01. Song 1.m4a").exists());
        assert!(!root.path().join("Radio/cover.jpg").exists());
        assert_eq!(state.counter.success, 1);

        let records = harness.tagger.records.lock().unwrap();
        assert_eq!(records[0].album, "Radio");
        assert_eq!(records[0].album_artist, "Apple Music");
    }
}
