use std::path::Path;

use lofty::config::ParseOptions;
use lofty::file::TaggedFileExt;
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag};
use tracing::debug;

use super::{parse_datetime_text, DateSource, Metadata, MetadataReader};

/// Date items in preference order. `lofty` maps ID3v2 `TDRC` (and v2.3
/// `TYER`/`TDAT`/`TIME`), RIFF `ICRD` and MP4 `©day` onto `RecordingDate`.
const DATE_KEYS: [ItemKey; 2] = [ItemKey::RecordingDate, ItemKey::OriginalReleaseDate];

fn tag_datetime(tag: &Tag) -> Option<chrono::NaiveDateTime> {
    DATE_KEYS
        .iter()
        .filter_map(|key| tag.get_string(key))
        .find_map(parse_datetime_text)
}

/// Audio tag reader for WAVE, ADTS `.aac` and `.m4a`. Only tags are read;
/// stream properties are skipped.
pub struct TagReader;

impl MetadataReader for TagReader {
    fn name(&self) -> &'static str {
        "audio tags"
    }

    fn source(&self) -> DateSource {
        DateSource::AudioTag
    }

    fn read(&self, path: &Path) -> Option<Metadata> {
        let tagged = Probe::open(path)
            .and_then(|file| {
                file.options(ParseOptions::new().read_properties(false))
                    .read()
            })
            .inspect_err(|e| debug!("{}: unreadable audio tags: {}", path.display(), e))
            .ok()?;
        Some(Metadata {
            created: tagged.tags().iter().find_map(tag_datetime),
            ..Default::default()
        })
    }
}
