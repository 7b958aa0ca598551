use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta};
use nom_exif::{EntryValue, MediaParser, MediaSource, TrackInfo, TrackInfoTag};
use tracing::debug;

use super::{parse_datetime_text, DateSource, Metadata, MetadataReader};

fn track_info(path: &Path) -> nom_exif::Result<Option<TrackInfo>> {
    let ms = MediaSource::file_path(path)?;
    if !ms.has_track() {
        return Ok(None);
    }
    let mut parser = MediaParser::new();
    parser.parse(ms).map(Some)
}

fn entry_datetime(value: &EntryValue) -> Option<NaiveDateTime> {
    let datetime = match value {
        EntryValue::Time(t) => t.naive_local(),
        EntryValue::Text(s) => parse_datetime_text(s)?,
        _ => return None,
    };
    // A zero `mvhd` time decodes to the 1904 epoch, which means "unset"
    (datetime.year() > 1904).then_some(datetime)
}

fn entry_text(value: &EntryValue) -> Option<String> {
    match value {
        EntryValue::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Container-metadata reader for MP4/MOV.
///
/// `nom-exif` prefers the QuickTime `com.apple.quicktime.creationdate` key and
/// falls back to the `mvhd` creation time; both are kept as wall clock.
pub struct ContainerReader;

impl MetadataReader for ContainerReader {
    fn name(&self) -> &'static str {
        "container metadata"
    }

    fn source(&self) -> DateSource {
        DateSource::Container
    }

    fn read(&self, path: &Path) -> Option<Metadata> {
        let info = track_info(path)
            .inspect_err(|e| debug!("{}: unreadable container: {}", path.display(), e))
            .ok()??;
        Some(Metadata {
            created: info.get(TrackInfoTag::CreateDate).and_then(entry_datetime),
            make: info.get(TrackInfoTag::Make).and_then(entry_text),
            model: info.get(TrackInfoTag::Model).and_then(entry_text),
        })
    }
}

/// Seconds since 1904-01-01, the ISO base media epoch. Zero means unset.
pub fn mac_seconds_to_datetime(secs: u64) -> Option<NaiveDateTime> {
    if secs == 0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1904, 1, 1)?.and_hms_opt(0, 0, 0)?;
    epoch.checked_add_signed(TimeDelta::try_seconds(i64::try_from(secs).ok()?)?)
}

fn first_track_created(path: &Path) -> mp4::Result<Option<NaiveDateTime>> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    let reader = mp4::Mp4Reader::read_header(BufReader::new(file), size)?;
    let created = reader
        .tracks()
        .values()
        .min_by_key(|track| track.track_id())
        .and_then(|track| {
            [track.trak.mdia.mdhd.creation_time, track.trak.tkhd.creation_time]
                .into_iter()
                .find_map(mac_seconds_to_datetime)
        });
    Ok(created)
}

/// Structural fallback: the first track's media or track header creation
/// time. The stricter `mp4` parse doubles as a validity check of the file.
pub struct TrackHeaderReader;

impl MetadataReader for TrackHeaderReader {
    fn name(&self) -> &'static str {
        "track header"
    }

    fn source(&self) -> DateSource {
        DateSource::TrackHeader
    }

    fn read(&self, path: &Path) -> Option<Metadata> {
        let created = first_track_created(path)
            .inspect_err(|e| debug!("{}: unreadable track header: {}", path.display(), e))
            .ok()?;
        Some(Metadata {
            created,
            ..Default::default()
        })
    }
}
