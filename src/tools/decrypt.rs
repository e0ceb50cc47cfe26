use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::error::{DecryptError, ToolError};
use crate::tools::run_command;

/// Exit status the helper uses for "not offered in this codec"
pub const UNAVAILABLE_EXIT_CODE: i32 = 2;

/// Environment variable carrying the media-user-token to the helper
const MEDIA_USER_TOKEN_ENV: &str = "AMDL_MEDIA_USER_TOKEN";

#[async_trait]
pub trait Decryptor: Send + Sync {
    /// Fetch a whole AAC-LC file and decrypt it to `out`
    async fn fetch_and_decrypt(&self, id: &str, out: &Path) -> Result<(), DecryptError>;

    /// Download the segments behind `stream` and decrypt them into `out`
    async fn stream_decrypt(&self, id: &str, stream: &Url, out: &Path) -> Result<(), DecryptError>;

    /// Master manifest URL of a music video
    async fn video_manifest(&self, id: &str) -> Result<String, DecryptError>;

    /// Download and decrypt one music-video rendition into `out`
    async fn decrypt_video_stream(
        &self,
        id: &str,
        stream: &Url,
        out: &Path,
    ) -> Result<(), DecryptError>;
}

/// [`Decryptor`] backed by the configured helper program
#[derive(Debug, Clone)]
pub struct ExternalDecryptor {
    program: String,
    decrypt_port: String,
    mp4decrypt: String,
    media_user_token: String,
}

impl ExternalDecryptor {
    pub fn new(config: &Config) -> Self {
        Self {
            program: config.decrypt_command.clone(),
            decrypt_port: config.decrypt_m3u8_port.clone(),
            mp4decrypt: config.mp4decrypt_path.clone(),
            media_user_token: config.media_user_token.clone(),
        }
    }

    fn aac_lc_args(id: &str, out: &Path) -> Vec<String> {
        vec![
            "aac-lc".to_string(),
            "--id".to_string(),
            id.to_string(),
            "--out".to_string(),
            out.display().to_string(),
        ]
    }

    fn stream_args(&self, id: &str, stream: &Url, out: &Path) -> Vec<String> {
        vec![
            "stream".to_string(),
            "--id".to_string(),
            id.to_string(),
            "--url".to_string(),
            stream.to_string(),
            "--port".to_string(),
            self.decrypt_port.clone(),
            "--out".to_string(),
            out.display().to_string(),
        ]
    }

    fn video_stream_args(&self, id: &str, stream: &Url, out: &Path) -> Vec<String> {
        vec![
            "mv-stream".to_string(),
            "--id".to_string(),
            id.to_string(),
            "--url".to_string(),
            stream.to_string(),
            "--mp4decrypt".to_string(),
            self.mp4decrypt.clone(),
            "--out".to_string(),
            out.display().to_string(),
        ]
    }

    async fn run(&self, args: Vec<String>) -> Result<String, DecryptError> {
        debug!(program = %self.program, subcommand = %args[0], "invoking decrypt helper");
        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .env(MEDIA_USER_TOKEN_ENV, &self.media_user_token);
        run_command(&self.program, command)
            .await
            .map_err(classify)
    }
}

/// Map the helper's dedicated exit status to [`DecryptError::Unavailable`]
fn classify(err: ToolError) -> DecryptError {
    match err {
        ToolError::Failed {
            code: Some(UNAVAILABLE_EXIT_CODE),
            ..
        } => DecryptError::Unavailable,
        other => DecryptError::Tool(other),
    }
}

#[async_trait]
impl Decryptor for ExternalDecryptor {
    async fn fetch_and_decrypt(&self, id: &str, out: &Path) -> Result<(), DecryptError> {
        self.run(Self::aac_lc_args(id, out)).await.map(drop)
    }

    async fn stream_decrypt(&self, id: &str, stream: &Url, out: &Path) -> Result<(), DecryptError> {
        self.run(self.stream_args(id, stream, out)).await.map(drop)
    }

    async fn video_manifest(&self, id: &str) -> Result<String, DecryptError> {
        let stdout = self
            .run(vec!["mv-manifest".to_string(), "--id".to_string(), id.to_string()])
            .await?;
        let url = stdout.trim();
        if url.is_empty() {
            return Err(DecryptError::NoPlayback { id: id.to_string() });
        }
        Ok(url.to_string())
    }

    async fn decrypt_video_stream(
        &self,
        id: &str,
        stream: &Url,
        out: &Path,
    ) -> Result<(), DecryptError> {
        self.run(self.video_stream_args(id, stream, out))
            .await
            .map(drop)
    }
}
