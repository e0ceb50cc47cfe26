use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::catalog::ItemKind;
use crate::config::{CodecMode, LrcFormat, Settings};
use crate::error::DecryptError;
use crate::manifest::{
    AudioConstraints, AudioSelection, fetch_manifest, select_audio_for_video,
    select_audio_variant, select_video_variant, wants_device_upgrade,
};
use crate::progress::{ProgressEvent, SkipReason};
use crate::services::Services;
use crate::state::{Outcome, RunState};
use crate::tools::{convert_if_needed, converted_path, download_artwork, join_tags, ttml_to_lrc};
use crate::track::naming::{needs_quality, song_file_stem, video_file_stem};
use crate::track::{MetadataRecord, Origin, Placement, Track, video_tags};

/// Quality label used for whole-file AAC-LC downloads
const AAC_LC_QUALITY: &str = "256Kbps";

/// Why a track did not finish
enum Failure {
    Unavailable(String),
    Error(String),
}

impl Failure {
    fn error(err: impl fmt::Display) -> Self {
        Self::Error(err.to_string())
    }
}

impl From<DecryptError> for Failure {
    fn from(err: DecryptError) -> Self {
        match err {
            err @ DecryptError::Unavailable => Self::Unavailable(err.to_string()),
            other => Self::Error(other.to_string()),
        }
    }
}

enum Finished {
    Downloaded(PathBuf),
    Skipped(SkipReason),
}

/// Where the audio comes from
enum Source {
    /// Whole-file AAC-LC through the decrypt helper
    AacLc,
    /// Segment stream picked from this master manifest
    Manifest(String),
}

pub struct TrackPipeline<'a> {
    settings: &'a Settings,
    services: &'a Services,
}

impl<'a> TrackPipeline<'a> {
    pub fn new(settings: &'a Settings, services: &'a Services) -> Self {
        Self { settings, services }
    }

    /// Process one track and record its outcome.
    ///
    /// Successes are remembered under the track's collection so later passes
    /// skip them.
    pub async fn run(&self, track: &mut Track, state: &mut RunState) -> Outcome {
        state.counter.enter();

        let reporter = &self.services.reporter;
        let name = track.song.name.clone();
        reporter.report(ProgressEvent::TrackStarted {
            ordinal: track.ordinal,
            total: track.total,
            name: name.clone(),
        });

        let result = match track.song.kind {
            ItemKind::MusicVideo => self.run_video(track).await,
            _ => self.run_song(track).await,
        };

        let outcome = match result {
            Ok(Finished::Skipped(reason)) => {
                reporter.report(ProgressEvent::TrackSkipped {
                    ordinal: track.ordinal,
                    total: track.total,
                    name,
                    reason,
                });
                Outcome::Success
            }
            Ok(Finished::Downloaded(path)) => {
                info!(id = %track.song.id, path = %path.display(), "track finished");
                reporter.report(ProgressEvent::TrackFinished {
                    ordinal: track.ordinal,
                    total: track.total,
                    name,
                    outcome: Outcome::Success,
                    detail: None,
                });
                Outcome::Success
            }
            Err(failure) => {
                let (outcome, detail) = match failure {
                    Failure::Unavailable(detail) => (Outcome::Unavailable, detail),
                    Failure::Error(detail) => {
                        warn!(id = %track.song.id, error = %detail, "track failed");
                        (Outcome::Error, detail)
                    }
                };
                reporter.report(ProgressEvent::TrackFinished {
                    ordinal: track.ordinal,
                    total: track.total,
                    name,
                    outcome,
                    detail: Some(detail),
                });
                outcome
            }
        };

        state.counter.record(outcome);
        if outcome == Outcome::Success {
            state.memo.remember(track.memo_key(), track.ordinal);
        }
        outcome
    }

    async fn run_song(&self, track: &mut Track) -> Result<Finished, Failure> {
        let config = &self.settings.config;
        let codec = self.settings.codec;

        let source = match track.song.enhanced_hls.clone() {
            _ if self.settings.wants_aac_lc() => Source::AacLc,
            Some(url) => Source::Manifest(url),
            None if codec == CodecMode::Atmos => {
                return Err(Failure::Unavailable(
                    "No enhanced manifest for Atmos".to_string(),
                ));
            }
            None => {
                debug!(id = %track.song.id, "no enhanced manifest, falling back to AAC-LC");
                Source::AacLc
            }
        };
        let source = self.upgrade_source(track, source).await;

        let mut selection = None;
        let quality = if !needs_quality(&config.song_file_format) {
            String::new()
        } else {
            match &source {
                Source::AacLc => AAC_LC_QUALITY.to_string(),
                Source::Manifest(url) => {
                    let picked = self.select_audio(url).await?;
                    let quality = picked.quality.clone();
                    selection = Some(picked);
                    quality
                }
            }
        };

        let stem = song_file_stem(config, &track.song, track.ordinal, &quality, codec.label());
        let path = track.save_dir.join(format!("{stem}.m4a"));

        if path.exists()
            || (config.converts_in_place()
                && converted_path(&path, config.convert_format).exists())
        {
            return Ok(Finished::Skipped(SkipReason::AlreadyPresent));
        }

        let lyrics = if config.embed_lrc || config.save_lrc_file {
            self.lyrics(track, &stem).await
        } else {
            None
        };

        match source {
            Source::AacLc => {
                if !config.has_media_user_token() {
                    return Err(Failure::Error(
                        "AAC-LC downloads need a valid media-user-token".to_string(),
                    ));
                }
                self.services
                    .decryptor
                    .fetch_and_decrypt(&track.song.id, &path)
                    .await?;
            }
            Source::Manifest(url) => {
                let selection = match selection {
                    Some(selection) => selection,
                    None => self.select_audio(&url).await?,
                };
                self.services
                    .decryptor
                    .stream_decrypt(&track.song.id, &selection.stream_url, &path)
                    .await?;
            }
        }

        let track_cover = self.track_cover(track).await;
        let tagged = self.tag(track, &path, lyrics, track_cover.as_deref()).await;
        if let Some(cover) = &track_cover
            && let Err(e) = tokio::fs::remove_file(cover).await
        {
            warn!(path = %cover.display(), error = %e, "failed to remove track cover");
        }
        tagged?;

        let path = convert_if_needed(
            self.services.transcoder.as_ref(),
            config,
            &path,
            codec,
            &self.services.reporter,
        )
        .await;
        Ok(Finished::Downloaded(path))
    }

    /// Ask the device for a better manifest when configured for this track
    async fn upgrade_source(&self, track: &Track, source: Source) -> Source {
        let Source::Manifest(url) = source else {
            return source;
        };
        if !wants_device_upgrade(&self.settings.config, &track.song.audio_traits) {
            return Source::Manifest(url);
        }

        match self.services.upgrader.upgrade(&track.song.id).await {
            Ok(Some(upgraded)) => {
                debug!(id = %track.song.id, %upgraded, "using device manifest");
                Source::Manifest(upgraded)
            }
            Ok(None) => Source::Manifest(url),
            Err(e) => {
                warn!(id = %track.song.id, error = %e, "device manifest check failed");
                Source::Manifest(url)
            }
        }
    }

    async fn select_audio(&self, url: &str) -> Result<AudioSelection, Failure> {
        let manifest = fetch_manifest(self.services.http.as_ref(), url)
            .await
            .map_err(Failure::error)?;
        let constraints = AudioConstraints::from_config(&self.settings.config);

        select_audio_variant(
            &manifest.body,
            &manifest.base_url,
            self.settings.codec,
            &constraints,
        )
        .map_err(Failure::error)?
        .ok_or_else(|| {
            Failure::Unavailable(format!(
                "No {} variant within the configured limits",
                self.settings.codec.label()
            ))
        })
    }

    /// Fetch lyrics, saving them next to the track when configured.
    ///
    /// Returns the text to embed. Lookup failures only mean "no lyrics".
    async fn lyrics(&self, track: &Track, stem: &str) -> Option<String> {
        let config = &self.settings.config;

        let ttml = match self
            .services
            .catalog
            .lyrics(&track.storefront, &track.song.id)
            .await
        {
            Ok(ttml) => ttml,
            Err(e) => {
                debug!(id = %track.song.id, error = %e, "no lyrics");
                return None;
            }
        };
        let text = match config.lrc_format {
            LrcFormat::Lrc => ttml_to_lrc(&ttml),
            LrcFormat::Ttml => ttml,
        };

        if config.save_lrc_file {
            let lrc_path = track
                .save_dir
                .join(format!("{stem}.{}", config.lrc_format.extension()));
            if let Err(e) = tokio::fs::write(&lrc_path, &text).await {
                warn!(path = %lrc_path.display(), error = %e, "failed to save lyrics");
            }
        }

        config.embed_lrc.then_some(text)
    }

    /// Download the track's own artwork for playlist and station entries
    async fn track_cover(&self, track: &Track) -> Option<PathBuf> {
        let config = &self.settings.config;
        if !config.embed_cover
            || !config.dl_albumcover_for_playlist
            || !track.origin.has_track_covers()
        {
            return None;
        }

        let downloaded = download_artwork(
            self.services.http.as_ref(),
            &track.song.artwork_url,
            config,
            &track.save_dir,
            &track.song.id,
        )
        .await;
        match downloaded {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(id = %track.song.id, error = %e, "failed to download track cover");
                None
            }
        }
    }

    async fn tag(
        &self,
        track: &mut Track,
        path: &Path,
        lyrics: Option<String>,
        track_cover: Option<&Path>,
    ) -> Result<(), Failure> {
        let config = &self.settings.config;
        let cover = config
            .embed_cover
            .then(|| {
                track_cover
                    .map(Path::to_path_buf)
                    .or_else(|| track.cover_path.clone())
            })
            .flatten();

        let mut tags = vec![("tool", String::new()), ("artist", "AppleMusic".to_string())];
        if let Some(cover) = &cover {
            tags.push(("cover", cover.display().to_string()));
        }
        self.services
            .tagger
            .embed_tags(path, &join_tags(&tags))
            .await
            .map_err(Failure::error)?;

        self.resolve_album(track).await;
        let placement = Placement::for_track(track, config);
        let record = MetadataRecord::new(&track.song, placement, lyrics, cover);
        self.services
            .tagger
            .write_metadata(path, &record)
            .await
            .map_err(Failure::error)
    }

    /// Look up the album of a station entry, or of a playlist entry tagged
    /// from song info. Failure leaves the collection's own fields in place.
    async fn resolve_album(&self, track: &mut Track) {
        let wanted = match track.origin {
            Origin::Station { .. } => true,
            Origin::Playlist { .. } => self.settings.config.use_songinfo_for_playlist,
            Origin::Album { .. } | Origin::Standalone => false,
        };
        if !wanted || track.album.is_some() {
            return;
        }
        let Some(album_id) = track.song.album_id.clone() else {
            return;
        };

        match self
            .services
            .catalog
            .album(&track.storefront, &album_id)
            .await
        {
            Ok(album) => track.album = Some(Arc::new(album)),
            Err(e) => warn!(id = %track.song.id, %album_id, error = %e, "album lookup failed"),
        }
    }

    async fn run_video(&self, track: &mut Track) -> Result<Finished, Failure> {
        let config = &self.settings.config;
        if !config.has_media_user_token() || !self.services.video_toolchain {
            self.services.reporter.report(ProgressEvent::Notice {
                message: "Music videos need a media-user-token, mp4decrypt and MP4Box; skipping"
                    .to_string(),
            });
            return Ok(Finished::Skipped(SkipReason::MvUnsupported));
        }

        let ordinal = match track.origin {
            Origin::Standalone => None,
            _ => Some(track.ordinal),
        };
        let stem = video_file_stem(&track.song, ordinal);
        let out = track.save_dir.join(format!("{stem}.mp4"));
        if out.exists() {
            return Ok(Finished::Skipped(SkipReason::AlreadyPresent));
        }

        let id = track.song.id.clone();
        let master_url = self.services.decryptor.video_manifest(&id).await?;
        let master = fetch_manifest(self.services.http.as_ref(), &master_url)
            .await
            .map_err(Failure::error)?;
        let video_url = select_video_variant(&master.body, &master.base_url, config.mv_max)
            .map_err(Failure::error)?
            .ok_or_else(|| {
                Failure::Unavailable(format!("No video rendition up to {}p", config.mv_max))
            })?;
        let audio_url =
            select_audio_for_video(&master.body, &master.base_url, config.mv_audio_type)
                .map_err(Failure::error)?
                .ok_or_else(|| Failure::Unavailable("No matching video audio track".to_string()))?;

        tokio::fs::create_dir_all(&track.save_dir)
            .await
            .map_err(Failure::error)?;

        let video_path = track.save_dir.join(format!("{id}_vid.mp4"));
        let audio_path = track.save_dir.join(format!("{id}_aud.mp4"));
        let thumbnail = download_artwork(
            self.services.http.as_ref(),
            &track.song.artwork_url,
            config,
            &track.save_dir,
            &format!("{stem}_thumbnail"),
        )
        .await
        .inspect_err(|e| warn!(%id, error = %e, "failed to save video thumbnail"))
        .ok();

        let muxed = async {
            let decryptor = &self.services.decryptor;
            decryptor
                .decrypt_video_stream(&id, &video_url, &video_path)
                .await?;
            decryptor
                .decrypt_video_stream(&id, &audio_url, &audio_path)
                .await?;

            self.resolve_album(track).await;
            let placement = Placement::for_track(track, config);
            let mut tags = video_tags(&track.song, &placement);
            if let Some(thumbnail) = &thumbnail {
                tags.push(("cover".to_string(), thumbnail.display().to_string()));
            }

            self.services
                .tagger
                .mux_video(&video_path, &audio_path, &join_tags(&tags), &out)
                .await
                .map_err(Failure::error)
        }
        .await;

        let leftovers = [Some(video_path), Some(audio_path), thumbnail];
        for path in leftovers.iter().flatten() {
            if let Err(e) = tokio::fs::remove_file(path).await {
                debug!(path = %path.display(), error = %e, "temporary file not removed");
            }
        }

        muxed.map(|()| Finished::Downloaded(out))
    }
}
