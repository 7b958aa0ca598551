pub mod audio;
pub mod exif;
pub mod guess;
pub mod video;

use std::fmt;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::media::{Category, MediaFile};

/// Where a resolved timestamp came from (0 = best, higher = less accurate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DateSource {
    /// Container metadata box (`mvhd`, QuickTime creation date)
    Container,
    /// First track header, structural fallback for video
    TrackHeader,
    /// Audio tag item (RIFF INFO, ID3, MP4 `ilst`)
    AudioTag,
    /// Embedded image tags (EXIF)
    Exif,
    /// Date pattern found in the filename
    FileName,
    /// Filesystem modification time
    ModifiedTime,
}

impl fmt::Display for DateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DateSource::Container => "container metadata",
            DateSource::TrackHeader => "track header",
            DateSource::AudioTag => "audio tags",
            DateSource::Exif => "exif",
            DateSource::FileName => "filename",
            DateSource::ModifiedTime => "modification time",
        };
        f.write_str(s)
    }
}

/// Local wall-clock instant plus its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub datetime: NaiveDateTime,
    pub source: DateSource,
}

/// What a reader could pull out of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub created: Option<NaiveDateTime>,
    pub make: Option<String>,
    pub model: Option<String>,
}

impl Metadata {
    /// Make and model joined into one free-text field, if either is present.
    pub fn manufacturer_text(&self) -> Option<String> {
        let parts: Vec<&str> = [self.make.as_deref(), self.model.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    /// Fill manufacturer fields that are still empty from `other`.
    fn absorb(&mut self, other: &Metadata) {
        if self.make.is_none() {
            self.make = other.make.clone();
        }
        if self.model.is_none() {
            self.model = other.model.clone();
        }
    }

    fn is_empty(&self) -> bool {
        self.created.is_none() && self.make.is_none() && self.model.is_none()
    }
}

/// One metadata backend for a media family.
///
/// Implementations never fail: malformed, truncated or unsupported input
/// yields `None`.
pub trait MetadataReader {
    fn name(&self) -> &'static str;

    fn source(&self) -> DateSource;

    /// Read whatever this backend understands from `path`.
    fn read(&self, path: &Path) -> Option<Metadata>;

    fn attempt_extract(&self, path: &Path) -> Option<NaiveDateTime> {
        self.read(path)?.created
    }
}

/// Outcome of [`TimestampResolver::resolve`]: always carries a timestamp.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub timestamp: Timestamp,
    /// Manufacturer/model text seen by any reader, for the device classifier
    pub metadata: Option<Metadata>,
}

/// Tries readers in a fixed order per category, then falls back to mtime.
pub struct TimestampResolver {
    video: Vec<Box<dyn MetadataReader>>,
    audio: Vec<Box<dyn MetadataReader>>,
    image: Vec<Box<dyn MetadataReader>>,
    guess_from_filename: bool,
}

impl TimestampResolver {
    pub fn new(read_track_headers: bool, guess_from_filename: bool) -> Self {
        let mut video: Vec<Box<dyn MetadataReader>> = vec![Box::new(video::ContainerReader)];
        if read_track_headers {
            video.push(Box::new(video::TrackHeaderReader));
        }
        Self {
            video,
            audio: vec![Box::new(audio::TagReader)],
            image: vec![Box::new(exif::ExifReader)],
            guess_from_filename,
        }
    }

    /// Build a resolver with an explicit reader list per category.
    pub fn with_readers(
        video: Vec<Box<dyn MetadataReader>>,
        audio: Vec<Box<dyn MetadataReader>>,
        image: Vec<Box<dyn MetadataReader>>,
    ) -> Self {
        Self {
            video,
            audio,
            image,
            guess_from_filename: false,
        }
    }

    pub fn readers_for(&self, category: Category) -> &[Box<dyn MetadataReader>] {
        match category {
            Category::Video => &self.video,
            Category::Audio => &self.audio,
            Category::Image => &self.image,
            Category::Sidecar => &[],
        }
    }

    /// Resolve the creation instant of `file`. Total: the discovery-time mtime
    /// is the last resort and is always present.
    pub fn resolve(&self, file: &MediaFile) -> Resolved {
        let mut seen = Metadata::default();

        for reader in self.readers_for(file.category) {
            let Some(meta) = reader.read(&file.path) else {
                debug!("{}: no metadata from {}", file.filename, reader.name());
                continue;
            };
            seen.absorb(&meta);
            if let Some(datetime) = meta.created {
                return Resolved {
                    timestamp: Timestamp {
                        datetime,
                        source: reader.source(),
                    },
                    metadata: Some(seen),
                };
            }
            debug!("{}: {} has no creation time", file.filename, reader.name());
        }

        let metadata = if seen.is_empty() { None } else { Some(seen) };

        if self.guess_from_filename {
            if let Some(datetime) = guess::guess_date_from_filename(&file.filename) {
                return Resolved {
                    timestamp: Timestamp {
                        datetime,
                        source: DateSource::FileName,
                    },
                    metadata,
                };
            }
        }

        debug!("{}: using modification time", file.filename);
        Resolved {
            timestamp: Timestamp {
                datetime: file.modified,
                source: DateSource::ModifiedTime,
            },
            metadata,
        }
    }
}

/// Parse the free-form date strings found in tags.
///
/// The wall clock is kept verbatim; any UTC offset is dropped, not applied.
pub fn parse_datetime_text(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim().trim_end_matches('\0').trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.naive_local());
        }
    }

    let naive = s.trim_end_matches(|c: char| c == 'Z' || c == 'z');
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y:%m:%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(dt);
        }
    }

    for fmt in ["%Y-%m-%d", "%Y:%m:%d", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(naive, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }

    // Partial dates: "YYYY-MM" and "YYYY"
    let mut parts = naive.splitn(2, '-');
    let year = parts.next()?;
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = year.parse().ok()?;
    let month: u32 = match parts.next() {
        Some(m) if m.len() == 2 => m.parse().ok()?,
        Some(_) => return None,
        None => 1,
    };
    NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)
}
