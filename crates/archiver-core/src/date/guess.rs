use chrono::NaiveDateTime;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Date patterns camera firmware and phones embed in filenames, paired with
/// the chrono format of the captured text.
static PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        // VID_20240222_143025, PXL_20240222_143025123
        (r"(?P<date>(19|20)\d{2}[01]\d[0-3]\d_\d{6})", "%Y%m%d_%H%M%S"),
        // Screenshot_20240222-143025
        (r"(?P<date>(19|20)\d{2}[01]\d[0-3]\d-\d{6})", "%Y%m%d-%H%M%S"),
        // 2024-02-22 14.30.25, 2024-02-22_14-30-25
        (
            r"(?P<date>(19|20)\d{2}-[01]\d-[0-3]\d[ _T]\d{2}[.\-:]\d{2}[.\-:]\d{2})",
            "%Y-%m-%d %H:%M:%S",
        ),
        // DJI_20240222143025_0001
        (r"(?P<date>(19|20)\d{2}[01]\d[0-3]\d[0-2]\d[0-5]\d[0-5]\d)", "%Y%m%d%H%M%S"),
    ]
    .into_iter()
    .map(|(re, fmt)| (Regex::new(re).unwrap(), fmt))
    .collect()
});

pub fn guess_date_from_filename(filename: &str) -> Option<NaiveDateTime> {
    let basename = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    for (regex, format) in PATTERNS.iter() {
        let Some(date) = regex.captures(basename).and_then(|c| c.name("date")) else {
            continue;
        };
        let text = if format.contains(' ') {
            normalize_separators(date.as_str())
        } else {
            date.as_str().to_string()
        };
        if let Ok(dt) = NaiveDateTime::parse_from_str(&text, format) {
            return Some(dt);
        }
    }

    None
}

/// `2024-02-22_14.30.25` -> `2024-02-22 14:30:25`
fn normalize_separators(s: &str) -> String {
    let (date, time) = s.split_at(10);
    let time: String = time[1..]
        .chars()
        .map(|c| if c.is_ascii_digit() { c } else { ':' })
        .collect();
    format!("{} {}", date, time)
}
