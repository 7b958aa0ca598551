pub mod cancel;
pub mod copy;
pub mod date;
pub mod device;
pub mod error;
pub mod media;
pub mod naming;
pub mod pipeline;
pub mod scan;

#[cfg(test)]
pub(crate) mod test_fixtures;

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::info;

pub use cancel::{CancellationToken, CancelledError};
pub use device::{ClassifierConfig, DeviceType};
pub use error::ArchiveError;
pub use naming::NamingMode;
pub use pipeline::{DuplicatePolicy, FileReport, Outcome, Pipeline, RunSummary};

/// Scratch file used to check that the destination is writable
pub const WRITE_CHECK: &str = ".write_test";

fn default_true() -> bool {
    true
}

fn default_copy_retries() -> u32 {
    3
}

/// Every tunable of a run. Loadable from JSON; missing fields take defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub skip_raw: bool,
    #[serde(default)]
    pub ignore_srt: bool,
    #[serde(default)]
    pub recursive: bool,
    /// Only files modified in the last N calendar days (0 = all)
    #[serde(default)]
    pub recent_days: u32,
    #[serde(default)]
    pub naming: NamingMode,
    /// Free-form label appended after the device type
    #[serde(default)]
    pub device_tag: Option<String>,
    #[serde(default)]
    pub duplicates: DuplicatePolicy,
    /// Replace existing files whose content differs; implies content duplicates
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default = "default_true")]
    pub verify_copy: bool,
    /// Total copy attempts per file
    #[serde(default = "default_copy_retries")]
    pub copy_retries: u32,
    #[serde(default)]
    pub guess_from_filename: bool,
    /// Fall back to the first track's header time for video
    #[serde(default = "default_true")]
    pub read_track_headers: bool,
    #[serde(default)]
    pub devices: ClassifierConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            skip_raw: false,
            ignore_srt: false,
            recursive: false,
            recent_days: 0,
            naming: NamingMode::Device,
            device_tag: None,
            duplicates: DuplicatePolicy::Name,
            overwrite: false,
            verify_copy: true,
            copy_retries: default_copy_retries(),
            guess_from_filename: false,
            read_track_headers: true,
            devices: ClassifierConfig::default(),
        }
    }
}

impl Settings {
    /// Read settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ArchiveError> {
        let config_error = |reason: String| ArchiveError::Config {
            path: path.to_path_buf(),
            reason,
        };
        let file = File::open(path).map_err(|e| config_error(e.to_string()))?;
        serde_json::from_reader(std::io::BufReader::new(file)).map_err(|e| config_error(e.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub settings: Settings,
}

/// Control options for a run (cancellation).
#[derive(Debug, Clone, Default)]
pub struct ArchiveControl {
    pub cancel_token: Option<CancellationToken>,
}

impl ArchiveControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }
}

/// Progress callback: (index, total, file name)
pub type ProgressCallback<'a> = dyn Fn(u64, u64, &str) + Send + Sync + 'a;

/// Run the full archive pipeline with progress reporting.
pub fn archive(options: &ArchiveOptions, progress: &ProgressCallback<'_>) -> Result<RunSummary, ArchiveError> {
    archive_with_control(options, &ArchiveControl::default(), progress)
}

/// Run the full archive pipeline with progress reporting and cancellation.
///
/// Only precondition failures are errors; per-file problems end up in the
/// returned summary.
pub fn archive_with_control(
    options: &ArchiveOptions,
    control: &ArchiveControl,
    progress: &ProgressCallback<'_>,
) -> Result<RunSummary, ArchiveError> {
    validate_preconditions(&options.source, &options.destination)?;
    info!(
        "Starting archiver: {} -> {}",
        options.source.display(),
        options.destination.display()
    );

    let settings = &options.settings;
    let scan_options = scan::ScanOptions {
        recursive: settings.recursive,
        skip_raw: settings.skip_raw,
        ignore_srt: settings.ignore_srt,
        recent_days: settings.recent_days,
        exclude: Some(options.destination.clone()),
    };
    let files = scan::scan_source(&options.source, &scan_options, Local::now().date_naive())?;
    if files.is_empty() {
        info!("No media files found in source directory");
        return Ok(RunSummary::default());
    }
    info!("Found {} media file(s) to process", files.len());

    let mut pipeline = Pipeline::from_settings(options.destination.clone(), settings);
    Ok(pipeline.run(&files, control.cancel_token.as_ref(), progress))
}

/// Source must be a readable directory; destination is created if missing and
/// must accept a new file.
pub fn validate_preconditions(source: &Path, destination: &Path) -> Result<(), ArchiveError> {
    if !source.exists() {
        return Err(ArchiveError::SourceMissing(source.to_path_buf()));
    }
    if !source.is_dir() {
        return Err(ArchiveError::SourceNotDirectory(source.to_path_buf()));
    }
    fs::read_dir(source).map_err(|e| ArchiveError::SourceUnreadable {
        path: source.to_path_buf(),
        source: e,
    })?;

    if !destination.exists() {
        fs::create_dir_all(destination).map_err(|e| ArchiveError::DestinationCreate {
            path: destination.to_path_buf(),
            source: e,
        })?;
        info!("Created destination directory: {}", destination.display());
    }
    if !destination.is_dir() {
        return Err(ArchiveError::DestinationNotDirectory(destination.to_path_buf()));
    }

    let scratch = destination.join(WRITE_CHECK);
    File::create(&scratch)
        .and_then(|_| fs::remove_file(&scratch))
        .map_err(|e| ArchiveError::DestinationNotWritable {
            path: destination.to_path_buf(),
            source: e,
        })?;
    Ok(())
}
