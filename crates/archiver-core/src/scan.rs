use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Days, Local, NaiveDate};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::ArchiveError;
use crate::media::{is_raw_extension, Category, MediaFile};

/// Discovery filters.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub recursive: bool,
    pub skip_raw: bool,
    pub ignore_srt: bool,
    /// Keep files modified within this many calendar days (0 = no filter)
    pub recent_days: u32,
    /// Directory never descended into, normally the destination
    pub exclude: Option<PathBuf>,
}

/// Enumerate supported media under `source`, sorted by path.
///
/// Only an unreadable `source` itself is an error; unreadable entries below it
/// are logged and skipped.
pub fn scan_source(
    source: &Path,
    options: &ScanOptions,
    today: NaiveDate,
) -> Result<Vec<MediaFile>, ArchiveError> {
    fs::read_dir(source).map_err(|e| ArchiveError::SourceUnreadable {
        path: source.to_path_buf(),
        source: e,
    })?;

    let exclude = options.exclude.as_deref().and_then(|p| fs::canonicalize(p).ok());
    let cutoff = recent_cutoff(options.recent_days, today);

    let walker = WalkDir::new(source)
        .min_depth(1)
        .max_depth(if options.recursive { usize::MAX } else { 1 })
        .follow_links(true);

    let mut media = Vec::new();
    for entry in walker
        .into_iter()
        .filter_entry(|e| !is_excluded(e, exclude.as_deref()))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Cannot read {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let Some(filename) = entry.file_name().to_str() else {
            debug!("Skipping non UTF-8 filename: {}", entry.path().display());
            continue;
        };
        // AppleDouble resource forks left by macOS on FAT cards
        if filename.starts_with("._") {
            debug!("Skipping macOS metadata file: {}", filename);
            continue;
        }

        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(e) => {
                warn!("Cannot stat {}: {}", entry.path().display(), e);
                continue;
            }
        };
        let modified = match meta.modified() {
            Ok(t) => DateTime::<Local>::from(t).naive_local(),
            Err(e) => {
                warn!("No modification time for {}: {}", entry.path().display(), e);
                continue;
            }
        };

        let Some(file) = MediaFile::new(entry.path().to_path_buf(), meta.len(), modified) else {
            continue;
        };

        if options.skip_raw && is_raw_extension(&file.extension) {
            debug!("Skipping raw file (--skip-raw enabled): {}", file.filename);
            continue;
        }
        if options.ignore_srt && file.category == Category::Sidecar {
            debug!("Skipping sidecar file (--ignore-srt enabled): {}", file.filename);
            continue;
        }
        if let Some(cutoff) = cutoff {
            if file.modified.date() < cutoff {
                debug!("Skipping {}: modified before {}", file.filename, cutoff);
                continue;
            }
        }

        media.push(file);
    }

    media.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(media)
}

/// First day still inside a `days`-day window ending today.
fn recent_cutoff(days: u32, today: NaiveDate) -> Option<NaiveDate> {
    if days == 0 {
        return None;
    }
    today.checked_sub_days(Days::new(u64::from(days - 1)))
}

fn is_excluded(entry: &DirEntry, exclude: Option<&Path>) -> bool {
    let Some(exclude) = exclude else {
        return false;
    };
    entry.file_type().is_dir()
        && fs::canonicalize(entry.path()).is_ok_and(|p| p == exclude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{dt, set_mtime};
    use tempfile::tempdir;

    fn names(media: &[MediaFile]) -> Vec<&str> {
        media.iter().map(|m| m.filename.as_str()).collect()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 22).unwrap()
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, name.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = tempdir().unwrap();
        for name in [
            "b.mov", "A.MP4", "notes.txt", "._A.MP4", "memo.m4a", "IMG_1.DNG", "flight.srt", "README",
        ] {
            touch(dir.path(), name);
        }
        fs::create_dir(dir.path().join("sub")).unwrap();
        touch(&dir.path().join("sub"), "deep.mp4");

        let media = scan_source(dir.path(), &ScanOptions::default(), today()).unwrap();
        assert_eq!(names(&media), vec!["A.MP4", "IMG_1.DNG", "b.mov", "flight.srt", "memo.m4a"]);
        assert_eq!(media[0].size, 5);
    }

    #[test]
    fn test_skip_raw_and_ignore_srt() {
        let dir = tempdir().unwrap();
        for name in ["a.mp4", "b.dng", "c.GPR", "d.jpg", "a.srt"] {
            touch(dir.path(), name);
        }
        let options = ScanOptions {
            skip_raw: true,
            ignore_srt: true,
            ..Default::default()
        };
        let media = scan_source(dir.path(), &options, today()).unwrap();
        assert_eq!(names(&media), vec!["a.mp4", "d.jpg"]);
    }

    #[test]
    fn test_recursive_skips_destination() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("archive");
        fs::create_dir_all(archive.join("2024/02/22")).unwrap();
        touch(&archive.join("2024/02/22"), "20240222-143025-video.mp4");
        fs::create_dir(dir.path().join("DCIM")).unwrap();
        touch(&dir.path().join("DCIM"), "GOPR0001.MP4");
        touch(dir.path(), "top.wav");

        let options = ScanOptions {
            recursive: true,
            exclude: Some(archive),
            ..Default::default()
        };
        let media = scan_source(dir.path(), &options, today()).unwrap();
        assert_eq!(names(&media), vec!["GOPR0001.MP4", "top.wav"]);
    }

    #[test]
    fn test_recent_days() {
        let dir = tempdir().unwrap();
        set_mtime(&touch(dir.path(), "today.mp4"), dt(2024, 2, 22, 8, 0, 0));
        set_mtime(&touch(dir.path(), "yesterday.mp4"), dt(2024, 2, 21, 23, 59, 0));
        set_mtime(&touch(dir.path(), "old.mp4"), dt(2024, 1, 1, 12, 0, 0));

        let only_today = ScanOptions {
            recent_days: 1,
            ..Default::default()
        };
        let media = scan_source(dir.path(), &only_today, today()).unwrap();
        assert_eq!(names(&media), vec!["today.mp4"]);

        let two_days = ScanOptions {
            recent_days: 2,
            ..Default::default()
        };
        let media = scan_source(dir.path(), &two_days, today()).unwrap();
        assert_eq!(names(&media), vec!["today.mp4", "yesterday.mp4"]);

        let media = scan_source(dir.path(), &ScanOptions::default(), today()).unwrap();
        assert_eq!(media.len(), 3);
    }

    #[test]
    fn test_mtime_is_captured() {
        let dir = tempdir().unwrap();
        set_mtime(&touch(dir.path(), "DJI_0001.MOV"), dt(2024, 2, 22, 14, 31, 26));
        let media = scan_source(dir.path(), &ScanOptions::default(), today()).unwrap();
        assert_eq!(media[0].modified, dt(2024, 2, 22, 14, 31, 26));
    }

    #[test]
    fn test_missing_source_is_unreadable() {
        let dir = tempdir().unwrap();
        let err = scan_source(&dir.path().join("nope"), &ScanOptions::default(), today()).unwrap_err();
        assert!(matches!(err, ArchiveError::SourceUnreadable { .. }));
    }
}
