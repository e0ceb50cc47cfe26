use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use amdl::{
    AacType, AppleMusicClient, BatchRunner, CodecMode, Config, ConsolePrompter, DeviceUpgrader,
    ExternalDecryptor, FfmpegTranscoder, LinkKind, Mp4Tagger, MvAudioType, NoopReporter, Outcome,
    ProgressEvent, ProgressReporter, ReqwestClient, SearchKind, Services, Settings,
    SharedProgressReporter, SkipReason, video_toolchain_present,
};

// Emoji with fallback for terminals without Unicode support
static NOTES: Emoji<'_, '_> = Emoji("🎶 ", "");
static QUEUE: Emoji<'_, '_> = Emoji("📋 ", "[>] ");
static DISC: Emoji<'_, '_> = Emoji("💿 ", "[i] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static SKIPPED: Emoji<'_, '_> = Emoji("⏭️  ", "[=] ");
static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "[?] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static RETRY: Emoji<'_, '_> = Emoji("🔁 ", "[~] ");

/// Download tracks, albums, playlists, stations and music videos from the catalog
#[derive(Parser, Debug)]
#[command(name = "amdl")]
#[command(about = "Download tracks, albums, playlists and music videos from the catalog")]
#[command(version)]
struct Args {
    /// Catalog links, or the search query when --search is given
    urls: Vec<String>,

    /// Search the catalog instead of downloading links
    #[arg(long, value_enum)]
    search: Option<SearchKind>,

    /// Configuration file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Download Dolby Atmos
    #[arg(long, conflicts_with = "aac")]
    atmos: bool,

    /// Download AAC
    #[arg(long)]
    aac: bool,

    /// Highest ALAC sample rate
    #[arg(long)]
    alac_max: Option<u32>,

    /// Highest Atmos bitrate
    #[arg(long)]
    atmos_max: Option<u32>,

    /// AAC flavour
    #[arg(long, value_enum)]
    aac_type: Option<AacType>,

    /// Audio muxed into music videos
    #[arg(long, value_enum)]
    mv_audio_type: Option<MvAudioType>,

    /// Highest music video height
    #[arg(long)]
    mv_max: Option<u32>,

    /// Pick album tracks interactively
    #[arg(long)]
    select: bool,

    /// Take every album of an artist without asking
    #[arg(long)]
    all_album: bool,

    /// Show available qualities instead of downloading
    #[arg(long)]
    debug: bool,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn codec(&self) -> CodecMode {
        if self.atmos {
            CodecMode::Atmos
        } else if self.aac {
            CodecMode::Aac
        } else {
            CodecMode::Lossless
        }
    }

    fn apply_overrides(&self, config: &mut Config) {
        if let Some(value) = self.alac_max {
            config.alac_max = value;
        }
        if let Some(value) = self.atmos_max {
            config.atmos_max = value;
        }
        if let Some(value) = self.aac_type {
            config.aac_type = value;
        }
        if let Some(value) = self.mv_audio_type {
            config.mv_audio_type = value;
        }
        if let Some(value) = self.mv_max {
            config.mv_max = value;
        }
    }
}

/// Console reporter: one line per event, plus a bar while a collection runs
struct ConsoleReporter {
    multi: MultiProgress,
    collection: Mutex<Option<ProgressBar>>,
}

impl ConsoleReporter {
    fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            collection: Mutex::new(None),
        }
    }

    fn line(&self, message: String) {
        self.multi.suspend(|| println!("{message}"));
    }

    fn start_collection(&self, track_count: usize) {
        let style = ProgressStyle::default_bar()
            .template("  {spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
            .expect("valid progress template")
            .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(track_count as u64));
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));

        if let Ok(mut current) = self.collection.lock()
            && let Some(previous) = current.replace(bar)
        {
            previous.finish_and_clear();
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(current) = self.collection.lock()
            && let Some(bar) = current.as_ref()
        {
            f(bar);
        }
    }

    fn finish_collection(&self) {
        if let Ok(mut current) = self.collection.lock()
            && let Some(bar) = current.take()
        {
            bar.finish_and_clear();
        }
    }
}

impl ProgressReporter for ConsoleReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::QueueItem {
                position,
                total,
                url,
                kind,
            } => {
                self.finish_collection();
                let kind = match kind {
                    LinkKind::Invalid => kind.to_string().red(),
                    _ => kind.to_string().bold(),
                };
                self.line(format!(
                    "{QUEUE}Queue {} of {}: {} {}",
                    position.to_string().cyan(),
                    total.to_string().cyan(),
                    kind,
                    url.dimmed()
                ));
            }

            ProgressEvent::InvalidLink { url } => {
                self.line(format!("{WARNING}{} {}", "Invalid link, skipped:".yellow(), url));
            }

            ProgressEvent::CollectionResolved {
                name,
                artist,
                track_count,
            } => {
                let by = if artist.is_empty() {
                    String::new()
                } else {
                    format!(" by {}", artist.green())
                };
                self.line(format!(
                    "{DISC}{}{} • {} tracks",
                    name.bold().green(),
                    by,
                    track_count.to_string().cyan()
                ));
                self.start_collection(track_count);
            }

            ProgressEvent::TrackStarted {
                ordinal,
                total,
                name,
            } => {
                self.with_bar(|bar| bar.set_message(format!("[{ordinal}/{total}] {name}")));
            }

            ProgressEvent::TrackSkipped {
                ordinal,
                total,
                name,
                reason,
            } => {
                let why = match reason {
                    SkipReason::AlreadyPresent => "already present",
                    SkipReason::Remembered => "done earlier in this run",
                    SkipReason::MvUnsupported => "music videos are not supported here",
                };
                self.line(format!(
                    "  {SKIPPED}[{ordinal}/{total}] {} {}",
                    truncate_title(&name, 50),
                    format!("({why})").dimmed()
                ));
                self.with_bar(|bar| bar.inc(1));
            }

            ProgressEvent::TrackFinished {
                ordinal,
                total,
                name,
                outcome,
                detail,
            } => {
                let detail = detail.unwrap_or_default();
                let message = match outcome {
                    Outcome::Success => {
                        format!("  {SUCCESS}[{ordinal}/{total}] {}", truncate_title(&name, 50).green())
                    }
                    Outcome::Unavailable => format!(
                        "  {WARNING}[{ordinal}/{total}] {} - {}",
                        truncate_title(&name, 40).yellow(),
                        detail.dimmed()
                    ),
                    Outcome::Error => format!(
                        "  {FAILURE}[{ordinal}/{total}] {} - {}",
                        truncate_title(&name, 40).red(),
                        detail.red()
                    ),
                };
                self.line(message);
                self.with_bar(|bar| bar.inc(1));
            }

            ProgressEvent::QualitySummary { name, summary } => {
                self.line(format!("{}\n{summary}", name.bold()));
            }

            ProgressEvent::PassCompleted { counter, .. } => {
                self.finish_collection();
                let errors = if counter.error > 0 {
                    counter.error.to_string().red().bold()
                } else {
                    counter.error.to_string().green()
                };
                self.line(format!(
                    "\n=======  [{}] Completed: {}/{}  |  [{}] Warnings: {}  |  [{}] Errors: {}  =======",
                    "✔".green(),
                    counter.success.to_string().green().bold(),
                    counter.total,
                    "⚠".yellow(),
                    counter.warnings().to_string().yellow(),
                    "✖".red(),
                    errors
                ));
            }

            ProgressEvent::RetryScheduled { pass } => {
                self.line(format!("{RETRY}{} (pass {pass})", "Trying again...".bold()));
            }

            ProgressEvent::Notice { message } => {
                self.line(format!("{WARNING}{}", message.yellow()));
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let kept: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("amdl=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    args.apply_overrides(&mut config);
    let token = config
        .bearer_token()
        .context("authorization-token is not set in the configuration")?;

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            NOTES,
            "amdl".bold().magenta(),
            "- Catalog Downloader".dimmed()
        );
    }

    let settings = Settings {
        select: args.select,
        all_albums: args.all_album,
        debug: args.debug,
        ..Settings::new(config, args.codec())
    };
    let config = &settings.config;

    let reporter: SharedProgressReporter = if args.quiet {
        NoopReporter::shared()
    } else {
        Arc::new(ConsoleReporter::new())
    };

    let services = Services {
        catalog: Arc::new(AppleMusicClient::new(config, token)),
        http: Arc::new(ReqwestClient::new()),
        decryptor: Arc::new(ExternalDecryptor::new(config)),
        tagger: Arc::new(Mp4Tagger::new(config.mp4box_path.clone())),
        transcoder: Arc::new(FfmpegTranscoder::new(config.ffmpeg_path.clone())),
        upgrader: Arc::new(DeviceUpgrader::new(config.get_m3u8_port.clone())),
        prompter: Arc::new(ConsolePrompter::new()),
        reporter,
        video_toolchain: video_toolchain_present(config),
    };
    let runner = BatchRunner::new(&settings, &services);

    let urls = match args.search {
        Some(kind) => {
            if args.urls.is_empty() {
                bail!("--search needs a query");
            }
            let query = args.urls.join(" ");
            match runner.search(kind, &query).await.context("Search failed")? {
                Some(url) => vec![url],
                None => {
                    println!("\nExiting.");
                    return Ok(());
                }
            }
        }
        None if args.urls.is_empty() => bail!("No URLs provided. Please provide at least one URL."),
        None => args.urls.clone(),
    };

    let report = runner.run(&urls).await;

    if report.counter.error > 0 {
        std::process::exit(1);
    }

    Ok(())
}
