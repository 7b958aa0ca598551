use chrono::{NaiveDate, NaiveDateTime, Timelike};
use exif::{Exif, In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

use super::{DateSource, Metadata, MetadataReader};

/// Date tags in preference order, each with its sub-second companion.
const DATE_TAGS: [(Tag, Tag); 3] = [
    (Tag::DateTimeOriginal, Tag::SubSecTimeOriginal),
    (Tag::DateTimeDigitized, Tag::SubSecTimeDigitized),
    (Tag::DateTime, Tag::SubSecTime),
];

/// Embedded-tag reader for JPEG, PNG and TIFF-based raw formats.
/// EXIF datetimes have no timezone info - they are local time as-is.
pub struct ExifReader;

impl MetadataReader for ExifReader {
    fn name(&self) -> &'static str {
        "exif"
    }

    fn source(&self) -> DateSource {
        DateSource::Exif
    }

    fn read(&self, path: &Path) -> Option<Metadata> {
        let file = File::open(path).ok()?;
        let exif = Reader::new()
            .read_from_container(&mut BufReader::new(file))
            .inspect_err(|e| debug!("{}: no exif: {}", path.display(), e))
            .ok()?;
        Some(Metadata {
            created: extract_exif_date(&exif),
            make: ascii_field(&exif, Tag::Make),
            model: ascii_field(&exif, Tag::Model),
        })
    }
}

fn extract_exif_date(exif: &Exif) -> Option<NaiveDateTime> {
    for (tag, subsec) in DATE_TAGS {
        let Some(val) = ascii_field(exif, tag) else {
            continue;
        };
        if let Some(dt) = parse_exif_datetime(&val) {
            let subsec = ascii_field(exif, subsec);
            return Some(with_subsec(dt, subsec.as_deref()));
        }
    }
    None
}

fn ascii_field(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match field.value {
        Value::Ascii(ref parts) => parts
            .first()
            .map(|b| String::from_utf8_lossy(b).trim_matches('\0').trim().to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    let cleaned = s
        .replace('-', ":")
        .replace('/', ":")
        .replace('\\', ":")
        .replace('.', ":");

    if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, "%Y:%m:%d %H:%M:%S") {
        return Some(dt);
    }

    // Zeroed "0000:00:00 00:00:00" fields fail here too
    let d = NaiveDate::parse_from_str(cleaned.split(' ').next()?, "%Y:%m:%d").ok()?;
    d.and_hms_opt(0, 0, 0)
}

/// SubSecTime holds the fraction's leading digits ("5" = 500 ms).
fn with_subsec(dt: NaiveDateTime, subsec: Option<&str>) -> NaiveDateTime {
    let Some(digits) = subsec else {
        return dt;
    };
    let digits: String = digits.chars().take_while(char::is_ascii_digit).take(3).collect();
    if digits.is_empty() {
        return dt;
    }
    let millis: u32 = format!("{:0<3}", digits).parse().unwrap_or(0);
    dt.with_nanosecond(millis * 1_000_000).unwrap_or(dt)
}
