use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::{CodecMode, Config, ConvertFormat};
use crate::error::ToolError;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::tools::{find_program, run_tool};

#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Whether the transcoder binary can be found
    fn is_available(&self) -> bool;

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        format: ConvertFormat,
        extra_args: &str,
    ) -> Result<(), ToolError>;

    /// Copy a remote stream into a local container without re-encoding
    async fn copy_stream(&self, url: &str, output: &Path) -> Result<(), ToolError>;
}

#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: String,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn is_available(&self) -> bool {
        find_program(&self.program).is_some()
    }

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        format: ConvertFormat,
        extra_args: &str,
    ) -> Result<(), ToolError> {
        run_tool(&self.program, ffmpeg_args(input, output, format, extra_args)).await?;
        Ok(())
    }

    async fn copy_stream(&self, url: &str, output: &Path) -> Result<(), ToolError> {
        let args: [OsString; 8] = [
            "-loglevel".into(),
            "quiet".into(),
            "-y".into(),
            "-i".into(),
            url.into(),
            "-c".into(),
            "copy".into(),
            output.into(),
        ];
        run_tool(&self.program, args).await?;
        Ok(())
    }
}

/// ffmpeg arguments for converting `input` into `output`
pub fn ffmpeg_args(
    input: &Path,
    output: &Path,
    format: ConvertFormat,
    extra_args: &str,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), input.into(), "-vn".into()];

    let codec: &[&str] = match format {
        ConvertFormat::Flac => &["-c:a", "flac"],
        ConvertFormat::Mp3 => &["-c:a", "libmp3lame", "-qscale:a", "2"],
        ConvertFormat::Opus => &["-c:a", "libopus", "-b:a", "192k", "-vbr", "on"],
        ConvertFormat::Wav => &["-c:a", "pcm_s16le"],
        ConvertFormat::Copy => &["-c", "copy"],
    };
    args.extend(codec.iter().map(OsString::from));
    args.extend(extra_args.split_whitespace().map(OsString::from));
    args.push(output.into());
    args
}

/// Path a source file ends up at after converting to `format`
pub(crate) fn converted_path(source: &Path, format: ConvertFormat) -> PathBuf {
    source.with_extension(format.extension())
}

fn is_lossy_source(extension: &str, codec: CodecMode) -> bool {
    match extension {
        "m4a" => matches!(codec, CodecMode::Aac | CodecMode::Atmos),
        "mp3" | "opus" | "ogg" => true,
        _ => false,
    }
}

/// What to do with a finished download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionPlan {
    Skip { reason: String },
    Convert { target: PathBuf, lossy_warning: bool },
}

/// Decide whether and where a downloaded file gets converted
pub fn plan_conversion(config: &Config, source: &Path, codec: CodecMode) -> ConversionPlan {
    let format = config.convert_format;
    if format == ConvertFormat::Copy {
        return ConversionPlan::Skip {
            reason: "copy produces no new format".to_string(),
        };
    }

    let extension = source
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if config.convert_skip_if_source_match && extension == format.extension() {
        return ConversionPlan::Skip {
            reason: format!("already {}", format.extension()),
        };
    }

    let lossy_to_lossless = format.is_lossless() && is_lossy_source(&extension, codec);
    if lossy_to_lossless && config.convert_skip_lossy_to_lossless {
        return ConversionPlan::Skip {
            reason: "source is lossy and target is lossless".to_string(),
        };
    }

    ConversionPlan::Convert {
        target: converted_path(source, format),
        lossy_warning: lossy_to_lossless && config.convert_warn_lossy_to_lossless,
    }
}

/// Convert a downloaded file when configured.
///
/// Returns the path the track should be tracked under afterwards. Conversion
/// problems never fail the track; the original file is kept instead.
pub(crate) async fn convert_if_needed(
    transcoder: &dyn Transcoder,
    config: &Config,
    source: &Path,
    codec: CodecMode,
    reporter: &SharedProgressReporter,
) -> PathBuf {
    if !config.convert_after_download {
        return source.to_path_buf();
    }

    let target = match plan_conversion(config, source, codec) {
        ConversionPlan::Skip { reason } => {
            debug!(path = %source.display(), %reason, "conversion skipped");
            return source.to_path_buf();
        }
        ConversionPlan::Convert {
            target,
            lossy_warning,
        } => {
            if lossy_warning {
                reporter.report(ProgressEvent::Notice {
                    message: "Converting a lossy source to a lossless format will not improve quality"
                        .to_string(),
                });
            }
            target
        }
    };

    if !transcoder.is_available() {
        reporter.report(ProgressEvent::Notice {
            message: format!("ffmpeg not found at '{}'; skipping conversion", config.ffmpeg_path),
        });
        return source.to_path_buf();
    }

    let started = Instant::now();
    if let Err(e) = transcoder
        .transcode(source, &target, config.convert_format, &config.convert_extra_args)
        .await
    {
        warn!(path = %source.display(), error = %e, "conversion failed, keeping original");
        reporter.report(ProgressEvent::Notice {
            message: format!("Conversion failed: {e}"),
        });
        return source.to_path_buf();
    }
    debug!(target = %target.display(), elapsed = ?started.elapsed(), "conversion completed");

    if !config.convert_keep_original
        && let Err(e) = tokio::fs::remove_file(source).await
    {
        warn!(
            path = %source.display(),
            target = %target.display(),
            error = %e,
            "failed to remove original after conversion, both files kept"
        );
        reporter.report(ProgressEvent::Notice {
            message: format!(
                "Could not remove {} after conversion; keeping it alongside {}",
                source.display(),
                target.display()
            ),
        });
        return source.to_path_buf();
    }

    target
}
