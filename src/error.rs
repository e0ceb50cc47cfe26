use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading the YAML configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("No authorization token configured (set `authorization-token` in {path})")]
    MissingAuthorizationToken { path: PathBuf },
}

/// Errors that can occur when fetching or decoding an adaptive-bitrate manifest
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to fetch manifest from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid manifest URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Failed to parse manifest: {0}")]
    ParseFailed(String),

    #[error("Manifest is not a variant list (master) playlist")]
    NotMaster,
}

/// Errors returned by the catalog API client
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog request failed for {url}: {source}")]
    RequestFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid catalog URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Catalog returned HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to decode catalog response from {url}: {source}")]
    DecodeFailed {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Catalog has no {kind} with id {id}")]
    NotFound { kind: &'static str, id: String },
}

/// Errors raised by external command-line tools (MP4Box, ffmpeg, decrypt helper)
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Failed to start {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Errors from the decrypt collaborators
#[derive(Error, Debug)]
pub enum DecryptError {
    /// The content is not offered for the requested codec
    #[error("Unavailable")]
    Unavailable,

    #[error("No playback manifest for {id}; the media-user-token may be wrong or expired")]
    NoPlayback { id: String },

    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Errors from the device-assisted manifest upgrade connection
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Failed to connect to device at {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Device I/O failed at {addr}: {source}")]
    Io {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Identifier '{id}' is too long for a one-byte length prefix")]
    IdTooLong { id: String },
}

/// Errors that can occur while downloading artwork
#[derive(Error, Debug)]
pub enum ArtworkError {
    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors that can occur while writing container tags
#[derive(Error, Debug)]
pub enum TagError {
    #[error("Failed to read cover {path}: {source}")]
    CoverReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported cover image {path}: {source}")]
    CoverDecodeFailed {
        path: PathBuf,
        #[source]
        source: lofty::error::LoftyError,
    },

    #[error("Failed to write tags to {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: lofty::error::LoftyError,
    },

    #[error(transparent)]
    Tool(#[from] ToolError),
}
