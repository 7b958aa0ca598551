use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov"];
pub const AUDIO_EXTENSIONS: &[&str] = &["m4a", "wav", "aac"];
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
/// Raw still formats, dropped by `--skip-raw`
pub const RAW_EXTENSIONS: &[&str] = &["raw", "dng", "cr2", "nef", "arw", "gpr"];
/// Telemetry/subtitle sidecars written next to drone footage
pub const SIDECAR_EXTENSIONS: &[&str] = &["srt"];

/// Media family, decides which metadata readers apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Video,
    Audio,
    Image,
    Sidecar,
}

impl Category {
    /// Map a lowercased extension (without the dot) to its category.
    pub fn from_extension(ext: &str) -> Option<Self> {
        if VIDEO_EXTENSIONS.contains(&ext) {
            Some(Category::Video)
        } else if AUDIO_EXTENSIONS.contains(&ext) {
            Some(Category::Audio)
        } else if IMAGE_EXTENSIONS.contains(&ext) || RAW_EXTENSIONS.contains(&ext) {
            Some(Category::Image)
        } else if SIDECAR_EXTENSIONS.contains(&ext) {
            Some(Category::Sidecar)
        } else {
            None
        }
    }
}

pub fn is_raw_extension(ext: &str) -> bool {
    RAW_EXTENSIONS.contains(&ext)
}

/// One discovered source file. Built by discovery, read-only afterwards.
#[derive(Debug, Clone)]
pub struct MediaFile {
    /// Absolute path of the source file
    pub path: PathBuf,
    /// Just the filename, as found on disk
    pub filename: String,
    /// Lowercased extension without the dot
    pub extension: String,
    pub category: Category,
    /// File size in bytes
    pub size: u64,
    /// Modification time as local wall clock, captured at discovery
    pub modified: NaiveDateTime,
}

impl MediaFile {
    /// Build a record for `path`, or `None` when the extension is not supported.
    pub fn new(path: PathBuf, size: u64, modified: NaiveDateTime) -> Option<Self> {
        let filename = path.file_name()?.to_str()?.to_string();
        let extension = Path::new(&filename)
            .extension()
            .and_then(|e| e.to_str())?
            .to_ascii_lowercase();
        let category = Category::from_extension(&extension)?;
        Some(Self {
            path,
            filename,
            extension,
            category,
            size,
            modified,
        })
    }
}
