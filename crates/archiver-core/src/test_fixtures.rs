//! Byte-level builders for the container, tag and image fixtures used in tests.

use std::io::Cursor;
use std::path::Path;

use chrono::{Local, NaiveDate, NaiveDateTime};
use filetime::FileTime;

pub fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .unwrap()
        .and_hms_opt(h, mi, s)
        .unwrap()
}

/// Pin a file's atime and mtime to a local wall-clock instant.
pub fn set_mtime(path: &Path, at: NaiveDateTime) {
    let local = at.and_local_timezone(Local).single().unwrap();
    let ft = FileTime::from_unix_time(local.timestamp(), 0);
    filetime::set_file_times(path, ft, ft).unwrap();
}

fn boxed(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 8);
    out.extend_from_slice(&(body.len() as u32 + 8).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(body);
    out
}

fn fourcc(name: &str) -> [u8; 4] {
    let mut out = [0u8; 4];
    for (slot, c) in out.iter_mut().zip(name.chars()) {
        *slot = if c == '©' { 0xA9 } else { c as u8 };
    }
    out
}

/// QuickTime metadata keys and iTunes item names used by the fixtures
pub const QT_CREATION_DATE: &str = "com.apple.quicktime.creationdate";
pub const QT_MAKE: &str = "com.apple.quicktime.make";
pub const QT_MODEL: &str = "com.apple.quicktime.model";
pub const DAY: &str = "©day";

fn mac_seconds(at: NaiveDateTime) -> u32 {
    (at - dt(1904, 1, 1, 0, 0, 0)).num_seconds() as u32
}

fn find(bytes: &[u8], kind: &[u8; 4]) -> usize {
    bytes.windows(4).position(|w| w == kind).unwrap()
}

/// Overwrite the creation time of the first version-0 `kind` header box.
fn set_creation_time(bytes: &mut [u8], kind: &[u8; 4], at: Option<NaiveDateTime>) {
    let Some(at) = at else {
        return;
    };
    let pos = find(bytes, kind);
    assert_eq!(bytes[pos + 4], 0, "expected a version 0 {:?}", kind);
    bytes[pos + 8..pos + 12].copy_from_slice(&mac_seconds(at).to_be_bytes());
}

fn hdlr(handler: &[u8; 4]) -> Vec<u8> {
    let mut body = vec![0u8; 8];
    body.extend_from_slice(handler);
    body.extend_from_slice(&[0u8; 13]);
    boxed(b"hdlr", &body)
}

fn data_box(text: &str) -> Vec<u8> {
    let mut body = 1u32.to_be_bytes().to_vec();
    body.extend_from_slice(&[0u8; 4]);
    body.extend_from_slice(text.as_bytes());
    boxed(b"data", &body)
}

#[derive(Debug, Clone, Default)]
pub struct Mp4Layout {
    pub movie_created: Option<NaiveDateTime>,
    /// `tkhd` and `mdhd` creation time of the single track
    pub track_created: Option<NaiveDateTime>,
    /// `moov/meta` keyed items, e.g. `(QT_MAKE, "Apple")`
    pub quicktime_keys: Vec<(&'static str, &'static str)>,
    /// iTunes-style items in `udta/meta/ilst`
    pub ilst: Vec<(&'static str, &'static str)>,
}

/// A valid, sample-less MP4 with one AAC track as written by the `mp4`
/// crate, header times patched in and extra metadata appended to `moov`.
pub fn mp4(layout: &Mp4Layout) -> Vec<u8> {
    let config = mp4::Mp4Config {
        major_brand: str::parse("isom").unwrap(),
        minor_version: 512,
        compatible_brands: vec![str::parse("isom").unwrap(), str::parse("mp41").unwrap()],
        timescale: 1000,
    };
    let mut writer = mp4::Mp4Writer::write_start(Cursor::new(Vec::new()), &config).unwrap();
    writer
        .add_track(&mp4::TrackConfig {
            track_type: mp4::TrackType::Audio,
            timescale: 48_000,
            language: "und".to_string(),
            media_conf: mp4::MediaConfig::AacConfig(mp4::AacConfig::default()),
        })
        .unwrap();
    writer.write_end().unwrap();
    let mut out = writer.into_writer().into_inner();

    set_creation_time(&mut out, b"mvhd", layout.movie_created);
    set_creation_time(&mut out, b"tkhd", layout.track_created);
    set_creation_time(&mut out, b"mdhd", layout.track_created);

    let mut extra = Vec::new();
    if !layout.ilst.is_empty() {
        let mut ilst = Vec::new();
        for (name, text) in &layout.ilst {
            ilst.extend(boxed(&fourcc(name), &data_box(text)));
        }
        let mut meta = vec![0u8; 4];
        meta.extend(hdlr(b"mdir"));
        meta.extend(boxed(b"ilst", &ilst));
        extra.extend(boxed(b"udta", &boxed(b"meta", &meta)));
    }
    if !layout.quicktime_keys.is_empty() {
        let mut keys = vec![0u8; 4];
        keys.extend_from_slice(&(layout.quicktime_keys.len() as u32).to_be_bytes());
        let mut ilst = Vec::new();
        for (i, (key, text)) in layout.quicktime_keys.iter().enumerate() {
            keys.extend_from_slice(&(key.len() as u32 + 8).to_be_bytes());
            keys.extend_from_slice(b"mdta");
            keys.extend_from_slice(key.as_bytes());
            ilst.extend(boxed(&(i as u32 + 1).to_be_bytes(), &data_box(text)));
        }
        let mut meta = hdlr(b"mdta");
        meta.extend(boxed(b"keys", &keys));
        meta.extend(boxed(b"ilst", &ilst));
        extra.extend(boxed(b"meta", &meta));
    }

    // moov is written last, so growing it only touches its own size field
    let moov = find(&out, b"moov") - 4;
    let size = u32::from_be_bytes(out[moov..moov + 4].try_into().unwrap()) as usize;
    assert_eq!(moov + size, out.len());
    out.extend(extra);
    let grown = (out.len() - moov) as u32;
    out[moov..moov + 4].copy_from_slice(&grown.to_be_bytes());
    out
}

fn riff_chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = id.to_vec();
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(body);
    if body.len() % 2 == 1 {
        out.push(0);
    }
    out
}

#[derive(Debug, Clone, Default)]
pub struct WavLayout {
    /// `LIST/INFO/ICRD` creation date text
    pub icrd: Option<&'static str>,
}

pub fn wav(layout: &WavLayout) -> Vec<u8> {
    let mut chunks = Vec::new();
    // PCM, mono, 48 kHz, 16 bit
    let mut fmt = Vec::new();
    fmt.extend_from_slice(&1u16.to_le_bytes());
    fmt.extend_from_slice(&1u16.to_le_bytes());
    fmt.extend_from_slice(&48_000u32.to_le_bytes());
    fmt.extend_from_slice(&96_000u32.to_le_bytes());
    fmt.extend_from_slice(&2u16.to_le_bytes());
    fmt.extend_from_slice(&16u16.to_le_bytes());
    chunks.extend(riff_chunk(b"fmt ", &fmt));

    if let Some(icrd) = layout.icrd {
        let mut text = icrd.as_bytes().to_vec();
        text.push(0);
        let mut list = b"INFO".to_vec();
        list.extend(riff_chunk(b"ICRD", &text));
        chunks.extend(riff_chunk(b"LIST", &list));
    }

    chunks.extend(riff_chunk(b"data", &[0u8; 32]));

    let mut out = b"RIFF".to_vec();
    out.extend_from_slice(&(chunks.len() as u32 + 4).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend(chunks);
    out
}

/// One ID3v2 text frame.
#[derive(Debug, Clone)]
pub struct Id3Frame {
    pub id: &'static str,
    pub body: Vec<u8>,
}

impl Id3Frame {
    pub fn latin1(id: &'static str, text: &str) -> Self {
        let mut body = vec![0u8];
        body.extend_from_slice(text.as_bytes());
        Self { id, body }
    }

    /// UTF-16 with a little-endian BOM and a terminator.
    pub fn utf16(id: &'static str, text: &str) -> Self {
        let mut body = vec![1u8, 0xFF, 0xFE];
        for unit in text.encode_utf16() {
            body.extend_from_slice(&unit.to_le_bytes());
        }
        body.extend_from_slice(&[0, 0]);
        Self { id, body }
    }
}

fn syncsafe_bytes(n: u32) -> [u8; 4] {
    [
        ((n >> 21) & 0x7F) as u8,
        ((n >> 14) & 0x7F) as u8,
        ((n >> 7) & 0x7F) as u8,
        (n & 0x7F) as u8,
    ]
}

/// ID3v2.3 or 2.4 tag in front of a minimal ADTS stream.
pub fn id3(major: u8, frames: &[Id3Frame]) -> Vec<u8> {
    let mut tag = Vec::new();
    for frame in frames {
        tag.extend_from_slice(frame.id.as_bytes());
        let size = frame.body.len() as u32;
        if major == 4 {
            tag.extend_from_slice(&syncsafe_bytes(size));
        } else {
            tag.extend_from_slice(&size.to_be_bytes());
        }
        tag.extend_from_slice(&[0, 0]);
        tag.extend_from_slice(&frame.body);
    }
    // Padding
    tag.extend_from_slice(&[0u8; 16]);

    let mut out = b"ID3".to_vec();
    out.extend_from_slice(&[major, 0, 0]);
    out.extend_from_slice(&syncsafe_bytes(tag.len() as u32));
    out.extend(tag);
    // One header-only ADTS frame: AAC LC, 44.1 kHz, stereo, 7 bytes
    out.extend_from_slice(&[0xFF, 0xF1, 0x50, 0x80, 0x00, 0xFF, 0xFC]);
    out
}

#[derive(Debug, Clone, Default)]
pub struct ExifLayout {
    pub make: Option<&'static str>,
    pub model: Option<&'static str>,
    pub original: Option<&'static str>,
    pub digitized: Option<&'static str>,
    pub subsec_original: Option<&'static str>,
}

const ASCII: u16 = 2;
const LONG: u16 = 4;

/// One big-endian IFD starting at `start`, ASCII values plus an optional LONG
/// pointer entry, followed by its out-of-line data.
fn ifd(start: usize, ascii: &[(u16, &str)], pointer: Option<(u16, u32)>) -> Vec<u8> {
    let count = ascii.len() + usize::from(pointer.is_some());
    let mut data_offset = start + 2 + 12 * count + 4;
    let mut entries = Vec::new();
    let mut data = Vec::new();

    entries.extend_from_slice(&(count as u16).to_be_bytes());
    for (tag, text) in ascii {
        let mut value = text.as_bytes().to_vec();
        value.push(0);
        entries.extend_from_slice(&tag.to_be_bytes());
        entries.extend_from_slice(&ASCII.to_be_bytes());
        entries.extend_from_slice(&(value.len() as u32).to_be_bytes());
        if value.len() <= 4 {
            value.resize(4, 0);
            entries.extend_from_slice(&value);
        } else {
            entries.extend_from_slice(&(data_offset as u32).to_be_bytes());
            if value.len() % 2 == 1 {
                value.push(0);
            }
            data_offset += value.len();
            data.extend(value);
        }
    }
    if let Some((tag, offset)) = pointer {
        entries.extend_from_slice(&tag.to_be_bytes());
        entries.extend_from_slice(&LONG.to_be_bytes());
        entries.extend_from_slice(&1u32.to_be_bytes());
        entries.extend_from_slice(&offset.to_be_bytes());
    }
    // No next IFD
    entries.extend_from_slice(&0u32.to_be_bytes());
    entries.extend(data);
    entries
}

/// Big-endian TIFF: IFD0 with Make/Model and an Exif IFD pointer, then the
/// Exif IFD with the date tags.
pub fn tiff_with_exif(layout: &ExifLayout) -> Vec<u8> {
    let ifd0_fields: Vec<(u16, &str)> = [(0x010F, layout.make), (0x0110, layout.model)]
        .into_iter()
        .filter_map(|(tag, v)| v.map(|v| (tag, v)))
        .collect();
    let exif_fields: Vec<(u16, &str)> = [
        (0x9003, layout.original),
        (0x9004, layout.digitized),
        (0x9291, layout.subsec_original),
    ]
    .into_iter()
    .filter_map(|(tag, v)| v.map(|v| (tag, v)))
    .collect();

    let ifd0_len = ifd(8, &ifd0_fields, Some((0x8769, 0))).len();
    let exif_start = 8 + ifd0_len;

    let mut out = b"MM\0\x2A".to_vec();
    out.extend_from_slice(&8u32.to_be_bytes());
    out.extend(ifd(8, &ifd0_fields, Some((0x8769, exif_start as u32))));
    out.extend(ifd(exif_start, &exif_fields, None));
    out
}

/// SOI, an APP1 `Exif` segment wrapping [`tiff_with_exif`], EOI.
pub fn jpeg_with_exif(layout: &ExifLayout) -> Vec<u8> {
    let tiff = tiff_with_exif(layout);
    let mut out = vec![0xFF, 0xD8, 0xFF, 0xE1];
    out.extend_from_slice(&(tiff.len() as u16 + 8).to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend(tiff);
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}
