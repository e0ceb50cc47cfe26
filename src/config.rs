use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Minimum length of a usable media-user-token. Shorter values are placeholders.
const MEDIA_USER_TOKEN_MIN_LEN: usize = 50;

/// Placeholder shipped in sample configs
const TOKEN_PLACEHOLDER: &str = "your-authorization-token";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub authorization_token: String,
    pub media_user_token: String,
    pub storefront: String,
    pub language: String,
    pub catalog_base_url: String,

    pub alac_save_folder: PathBuf,
    pub atmos_save_folder: PathBuf,
    pub aac_save_folder: PathBuf,

    pub alac_max: u32,
    pub atmos_max: u32,
    pub aac_type: AacType,
    pub mv_audio_type: MvAudioType,
    pub mv_max: u32,

    pub album_folder_format: String,
    pub playlist_folder_format: String,
    pub artist_folder_format: String,
    pub song_file_format: String,
    pub explicit_choice: String,
    pub clean_choice: String,
    pub apple_master_choice: String,
    pub limit_max: usize,

    pub embed_lrc: bool,
    pub save_lrc_file: bool,
    pub lrc_type: LrcType,
    pub lrc_format: LrcFormat,

    pub embed_cover: bool,
    pub cover_size: String,
    pub cover_format: CoverFormat,
    pub save_artist_cover: bool,
    pub save_animated_artwork: bool,
    pub dl_albumcover_for_playlist: bool,
    pub use_songinfo_for_playlist: bool,

    pub get_m3u8_from_device: bool,
    pub get_m3u8_port: String,
    pub get_m3u8_mode: DeviceCheckMode,

    pub decrypt_command: String,
    pub decrypt_m3u8_port: String,
    pub mp4box_path: String,
    pub mp4decrypt_path: String,

    pub convert_after_download: bool,
    pub convert_format: ConvertFormat,
    pub convert_keep_original: bool,
    pub convert_skip_if_source_match: bool,
    pub convert_skip_lossy_to_lossless: bool,
    pub convert_warn_lossy_to_lossless: bool,
    pub convert_extra_args: String,
    pub ffmpeg_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            authorization_token: String::new(),
            media_user_token: String::new(),
            storefront: "us".to_string(),
            language: String::new(),
            catalog_base_url: "https://amp-api.music.apple.com".to_string(),

            alac_save_folder: PathBuf::from("AM-DL downloads"),
            atmos_save_folder: PathBuf::from("AM-DL-Atmos downloads"),
            aac_save_folder: PathBuf::from("AM-DL-AAC downloads"),

            alac_max: 192_000,
            atmos_max: 2768,
            aac_type: AacType::AacLc,
            mv_audio_type: MvAudioType::Atmos,
            mv_max: 2160,

            album_folder_format: "{AlbumName}".to_string(),
            playlist_folder_format: "{PlaylistName}".to_string(),
            artist_folder_format: "{UrlArtistName}".to_string(),
            song_file_format: "{SongNumer}. {SongName}".to_string(),
            explicit_choice: "[E]".to_string(),
            clean_choice: "[C]".to_string(),
            apple_master_choice: "[M]".to_string(),
            limit_max: 200,

            embed_lrc: true,
            save_lrc_file: false,
            lrc_type: LrcType::Lyrics,
            lrc_format: LrcFormat::Lrc,

            embed_cover: true,
            cover_size: "5000x5000".to_string(),
            cover_format: CoverFormat::Jpg,
            save_artist_cover: false,
            save_animated_artwork: false,
            dl_albumcover_for_playlist: false,
            use_songinfo_for_playlist: false,

            get_m3u8_from_device: false,
            get_m3u8_port: "127.0.0.1:20020".to_string(),
            get_m3u8_mode: DeviceCheckMode::Hires,

            decrypt_command: "amdl-decrypt".to_string(),
            decrypt_m3u8_port: "127.0.0.1:10020".to_string(),
            mp4box_path: "MP4Box".to_string(),
            mp4decrypt_path: "mp4decrypt".to_string(),

            convert_after_download: false,
            convert_format: ConvertFormat::Flac,
            convert_keep_original: false,
            convert_skip_if_source_match: true,
            convert_skip_lossy_to_lossless: true,
            convert_warn_lossy_to_lossless: true,
            convert_extra_args: String::new(),
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }
}

/// AAC flavour fetched in AAC mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AacType {
    /// Whole-file download through the decrypt helper
    AacLc,
    Aac,
    AacBinaural,
    AacDownmix,
}

impl AacType {
    /// Audio group name as it appears in manifests once the bitrate is stripped
    pub fn group_name(self) -> &'static str {
        match self {
            Self::AacLc => "aac-lc",
            Self::Aac => "aac",
            Self::AacBinaural => "aac-binaural",
            Self::AacDownmix => "aac-downmix",
        }
    }
}

/// Lyrics endpoint flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LrcType {
    Lyrics,
    SyllableLyrics,
}

impl LrcType {
    pub fn path(self) -> &'static str {
        match self {
            Self::Lyrics => "lyrics",
            Self::SyllableLyrics => "syllable-lyrics",
        }
    }
}

/// Audio rendition muxed into music videos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MvAudioType {
    Atmos,
    Ac3,
    Aac,
}

/// When to ask the device for an upgraded manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceCheckMode {
    All,
    Hires,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvertFormat {
    Flac,
    Mp3,
    Opus,
    Wav,
    Copy,
}

impl ConvertFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Flac => "flac",
            Self::Mp3 => "mp3",
            Self::Opus => "opus",
            Self::Wav => "wav",
            Self::Copy => "copy",
        }
    }

    pub fn is_lossless(self) -> bool {
        matches!(self, Self::Flac | Self::Wav)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverFormat {
    Jpg,
    Png,
}

impl CoverFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpg => "jpg",
            Self::Png => "png",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LrcFormat {
    Lrc,
    Ttml,
}

impl LrcFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Lrc => "lrc",
            Self::Ttml => "ttml",
        }
    }
}

impl Config {
    /// Load the configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_yaml(&raw, path)
    }

    fn from_yaml(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut config: Config =
            serde_yaml::from_str(raw).map_err(|e| ConfigError::ParseFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        if config.storefront.len() != 2 {
            config.storefront = "us".to_string();
        }

        Ok(config)
    }

    /// The bearer token for catalog calls, without any `Bearer ` prefix
    pub fn bearer_token(&self) -> Option<String> {
        let token = self.authorization_token.replace("Bearer ", "");
        let token = token.trim();
        if token.is_empty() || token == TOKEN_PLACEHOLDER {
            None
        } else {
            Some(token.to_string())
        }
    }

    pub fn has_media_user_token(&self) -> bool {
        self.media_user_token.len() > MEDIA_USER_TOKEN_MIN_LEN
    }

    /// Whether converted output replaces the downloaded container
    pub fn converts_in_place(&self) -> bool {
        self.convert_after_download
            && self.convert_format != ConvertFormat::Copy
            && !self.convert_keep_original
    }
}

/// The codec family requested for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodecMode {
    #[default]
    Lossless,
    Aac,
    Atmos,
}

impl CodecMode {
    /// Label used for the `{Codec}` placeholder
    pub fn label(self) -> &'static str {
        match self {
            Self::Lossless => "ALAC",
            Self::Aac => "AAC",
            Self::Atmos => "ATMOS",
        }
    }

    /// Root folder collections of this codec are saved under
    pub fn save_root(self, config: &Config) -> &Path {
        match self {
            Self::Lossless => &config.alac_save_folder,
            Self::Aac => &config.aac_save_folder,
            Self::Atmos => &config.atmos_save_folder,
        }
    }
}

/// Immutable settings for one process run: configuration plus run flags
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub config: Config,
    pub codec: CodecMode,
    /// Let the operator pick a subset of album tracks
    pub select: bool,
    /// Expand artist URLs to every album without prompting
    pub all_albums: bool,
    /// Enumerate available qualities instead of downloading
    pub debug: bool,
}

impl Settings {
    pub fn new(config: Config, codec: CodecMode) -> Self {
        Self {
            config,
            codec,
            ..Default::default()
        }
    }

    /// AAC-LC is fetched as a whole file instead of through the manifest
    pub fn wants_aac_lc(&self) -> bool {
        self.codec == CodecMode::Aac && self.config.aac_type == AacType::AacLc
    }
}
