mod artwork;
mod convert;
mod decrypt;
mod lyrics;
mod tagger;

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::ToolError;

pub use artwork::{cover_url, download_artwork};
pub use convert::{ConversionPlan, FfmpegTranscoder, Transcoder, ffmpeg_args, plan_conversion};
pub(crate) use convert::{convert_if_needed, converted_path};
pub use decrypt::{Decryptor, ExternalDecryptor, UNAVAILABLE_EXIT_CODE};
pub use lyrics::ttml_to_lrc;
pub use tagger::{Mp4Tagger, Tagger, join_tags};

/// Look a program up the way a shell would
pub fn find_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).find_map(|dir| {
        let full = dir.join(program);
        if full.is_file() {
            return Some(full);
        }
        let exe = full.with_extension(std::env::consts::EXE_EXTENSION);
        (!std::env::consts::EXE_EXTENSION.is_empty() && exe.is_file()).then_some(exe)
    })
}

/// Run a program to completion, returning its stdout.
///
/// A non-zero exit becomes [`ToolError::Failed`] carrying the captured stderr.
pub(crate) async fn run_tool<I, S>(program: &str, args: I) -> Result<String, ToolError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command.args(args);
    run_command(program, command).await
}

pub(crate) async fn run_command(program: &str, mut command: Command) -> Result<String, ToolError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(program, "running external tool");
    let output = command
        .output()
        .await
        .map_err(|e| ToolError::SpawnFailed {
            program: program.to_string(),
            source: e,
        })?;

    if !output.status.success() {
        return Err(ToolError::Failed {
            program: program.to_string(),
            status: output.status.to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
