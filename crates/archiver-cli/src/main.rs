mod logging;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use archiver_core::{
    ArchiveControl, ArchiveOptions, CancellationToken, DeviceType, DuplicatePolicy, NamingMode, RunSummary,
    Settings,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};

const EXIT_SUCCESS: u8 = 0;
/// Precondition or configuration error, nothing was processed
const EXIT_FAILURE: u8 = 1;
/// Run stopped with Ctrl-C
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser)]
#[command(
    name = "media-archiver",
    version,
    about = "Copy camera, drone and recorder media into a dated archive (YYYY/MM/DD/YYYYMMDD-HHMMSS-<device>.ext)"
)]
struct Cli {
    /// Directory containing media files to archive
    #[arg(long)]
    source: PathBuf,

    /// Root of the archive tree, created if missing
    #[arg(long)]
    destination: PathBuf,

    /// Skip raw still formats (.raw .dng .cr2 .nef .arw .gpr)
    #[arg(long)]
    skip_raw: bool,

    /// Skip .srt subtitle/telemetry sidecars
    #[arg(long)]
    ignore_srt: bool,

    /// Also scan subdirectories of the source
    #[arg(long)]
    recursive: bool,

    /// Only archive files modified in the last DAYS calendar days (1 = today)
    #[arg(long, value_name = "DAYS")]
    recent: Option<u32>,

    /// Filename scheme: "device" (YYYYMMDD-HHMMSS-<device>) or "flat" (YYYYMMDD-HHMMSS.sss)
    #[arg(long, value_enum)]
    naming: Option<NamingMode>,

    /// Extra label appended after the device type, e.g. "gopro-a"
    #[arg(long, value_name = "TAG")]
    device_tag: Option<String>,

    /// Device type for video files no rule matched
    #[arg(long, value_enum)]
    video_default: Option<DeviceType>,

    /// Treat an existing destination as a duplicate only if its content is identical
    #[arg(long)]
    verify_content: bool,

    /// Replace existing destination files whose content differs (implies --verify-content)
    #[arg(long)]
    overwrite: bool,

    /// Skip the SHA-256 check after each copy
    #[arg(long)]
    no_verify: bool,

    /// Try date patterns in filenames before falling back to modification time
    #[arg(long)]
    guess_from_filename: bool,

    /// JSON settings file; flags given on the command line take precedence
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log reader fall-through and discovery decisions
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Layer the flags that were given on top of `settings`.
    fn apply(&self, settings: &mut Settings) {
        settings.skip_raw |= self.skip_raw;
        settings.ignore_srt |= self.ignore_srt;
        settings.recursive |= self.recursive;
        settings.overwrite |= self.overwrite;
        settings.guess_from_filename |= self.guess_from_filename;
        if let Some(days) = self.recent {
            settings.recent_days = days;
        }
        if let Some(naming) = self.naming {
            settings.naming = naming;
        }
        if let Some(tag) = &self.device_tag {
            settings.device_tag = Some(tag.clone());
        }
        if let Some(device) = self.video_default {
            settings.devices.video_default = device;
        }
        if self.verify_content {
            settings.duplicates = DuplicatePolicy::Content;
        }
        if self.no_verify {
            settings.verify_copy = false;
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let bar = ProgressBar::new(0);
    logging::init(cli.verbose, &bar);

    let token = CancellationToken::new();
    let handler_token = token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        warn!("Interrupt received, stopping after the current file");
        handler_token.cancel();
    }) {
        warn!("Ctrl-C handler not installed: {}", e);
    }

    ExitCode::from(run(cli, &bar, token))
}

/// Run one archive pass and map its result to a process exit status.
fn run(cli: Cli, bar: &ProgressBar, token: CancellationToken) -> u8 {
    match execute(cli, bar, token) {
        Ok(summary) => exit_status(&summary),
        Err(e) => {
            bar.finish_and_clear();
            error!("{:#}", e);
            EXIT_FAILURE
        }
    }
}

/// Per-file failures never change the exit status; only cancellation does.
fn exit_status(summary: &RunSummary) -> u8 {
    if summary.cancelled {
        EXIT_CANCELLED
    } else {
        EXIT_SUCCESS
    }
}

fn execute(cli: Cli, bar: &ProgressBar, token: CancellationToken) -> anyhow::Result<RunSummary> {
    let t_total = Instant::now();

    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    cli.apply(&mut settings);

    bar.set_style(ProgressStyle::default_bar().template("[{bar:40}] {pos}/{len} {msg}")?);

    let options = ArchiveOptions {
        source: cli.source,
        destination: cli.destination,
        settings,
    };
    let control = ArchiveControl::new().with_cancel_token(token);

    let summary = archiver_core::archive_with_control(&options, &control, &|current, total, name| {
        bar.set_length(total);
        bar.set_position(current);
        bar.set_message(name.to_string());
    })?;
    bar.finish_and_clear();

    info!(
        "Summary: {} found, {} copied, {} skipped, {} failed",
        summary.found, summary.copied, summary.skipped, summary.failed
    );
    debug!("Finished in {:.2}s", t_total.elapsed().as_secs_f64());

    if summary.cancelled {
        warn!(
            "Cancelled: {} file(s) left unprocessed",
            summary.found - summary.processed()
        );
    }
    Ok(summary)
}
