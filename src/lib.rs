pub mod batch;
pub mod catalog;
pub mod collection;
pub mod config;
pub mod error;
pub mod http;
pub mod link;
pub mod manifest;
pub mod progress;
pub mod prompt;
pub mod services;
pub mod state;
pub mod tools;
pub mod track;

// Re-export main types for convenience
pub use batch::{BatchReport, BatchRunner};
pub use catalog::{AppleMusicClient, CatalogClient, SearchKind};
pub use collection::CollectionOrchestrator;
pub use config::{AacType, CodecMode, Config, LrcType, MvAudioType, Settings};
pub use error::{
    ArtworkError, CatalogError, ConfigError, DecryptError, DeviceError, ManifestError, TagError,
    ToolError,
};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use link::{CatalogLink, LinkKind};
pub use manifest::{DeviceUpgrader, ManifestUpgrader, select_audio_variant};
pub use progress::{
    NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter, SkipReason,
};
pub use prompt::{ConsolePrompter, Prompter};
pub use services::{Services, video_toolchain_present};
pub use state::{Counter, Outcome, RunState, SkipMemo};
pub use tools::{ExternalDecryptor, FfmpegTranscoder, Mp4Tagger};
pub use track::TrackPipeline;
