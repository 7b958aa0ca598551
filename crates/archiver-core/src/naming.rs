use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::device::DeviceType;
use crate::media::MediaFile;

/// How the destination filename is composed. Mutually exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NamingMode {
    /// `YYYYMMDD-HHMMSS-<device>.<ext>`
    #[default]
    Device,
    /// `YYYYMMDD-HHMMSS.sss.<ext>`
    Flat,
}

/// The slice of the destination filesystem the name resolver needs.
pub trait DestinationFs {
    /// Entry names directly inside `dir`.
    fn list(&self, dir: &Path) -> io::Result<HashSet<String>>;

    fn create_dir_all(&self, dir: &Path) -> io::Result<()>;
}

pub struct LocalFs;

impl DestinationFs for LocalFs {
    fn list(&self, dir: &Path) -> io::Result<HashSet<String>> {
        let mut names = HashSet::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.insert(name.to_string());
            }
        }
        Ok(names)
    }

    fn create_dir_all(&self, dir: &Path) -> io::Result<()> {
        fs::create_dir_all(dir)
    }
}

/// Everything but the collision suffix of a destination name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Slot {
    partition: PathBuf,
    stem: String,
    ext: String,
}

impl Slot {
    fn name(&self, suffix: u32) -> String {
        match suffix {
            0 => format!("{}.{}", self.stem, self.ext),
            n => format!("{}.{}.{}", self.stem, n, self.ext),
        }
    }
}

/// A name that was already present in the destination before this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occupied {
    /// Path relative to the destination root
    pub path: PathBuf,
    slot: Slot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Free and now reserved for the caller, relative to the destination root
    Free(PathBuf),
    /// Taken by a file from an earlier run
    Occupied(Occupied),
}

/// Composes partition and filename, then makes the name unique for the run.
///
/// Each partition directory is listed once, on first visit, and that snapshot
/// is what "already in the destination" means. Names handed out during the run
/// are tracked separately, so two sources never get the same path.
pub struct NameResolver {
    root: PathBuf,
    mode: NamingMode,
    device_tag: Option<String>,
    fs: Box<dyn DestinationFs>,
    listings: HashMap<PathBuf, HashSet<String>>,
    claimed: HashSet<PathBuf>,
    counters: HashMap<Slot, u32>,
}

impl NameResolver {
    pub fn new(root: PathBuf, mode: NamingMode, device_tag: Option<&str>) -> Self {
        Self::with_fs(root, mode, device_tag, Box::new(LocalFs))
    }

    pub fn with_fs(
        root: PathBuf,
        mode: NamingMode,
        device_tag: Option<&str>,
        fs: Box<dyn DestinationFs>,
    ) -> Self {
        Self {
            root,
            mode,
            device_tag: device_tag.map(sanitize_tag).filter(|t| !t.is_empty()),
            fs,
            listings: HashMap::new(),
            claimed: HashSet::new(),
            counters: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Pick the destination for `file`. Creates the partition directory on
    /// first visit.
    pub fn resolve_destination(
        &mut self,
        file: &MediaFile,
        ts: &NaiveDateTime,
        device: DeviceType,
    ) -> io::Result<Destination> {
        let partition = partition_for(ts);
        if !self.listings.contains_key(&partition) {
            let dir = self.root.join(&partition);
            self.fs.create_dir_all(&dir)?;
            let names = self.fs.list(&dir)?;
            self.listings.insert(partition.clone(), names);
        }

        let slot = Slot {
            partition,
            stem: self.stem_for(ts, device),
            ext: file.extension.clone(),
        };
        Ok(self.settle(slot, 0))
    }

    /// Move past an occupied name to the next collision suffix.
    pub fn next_after(&mut self, occupied: Occupied) -> Destination {
        let suffix = self.bump(&occupied.slot);
        self.settle(occupied.slot, suffix)
    }

    /// Reserve an occupied name, for replacing the file that holds it.
    pub fn claim(&mut self, occupied: &Occupied) -> PathBuf {
        self.claimed.insert(occupied.path.clone());
        occupied.path.clone()
    }

    fn settle(&mut self, slot: Slot, mut suffix: u32) -> Destination {
        loop {
            let name = slot.name(suffix);
            let path = slot.partition.join(&name);
            if self.claimed.contains(&path) {
                suffix = self.bump(&slot);
                continue;
            }
            let existed = self
                .listings
                .get(&slot.partition)
                .is_some_and(|names| names.contains(&name));
            if existed {
                return Destination::Occupied(Occupied { path, slot });
            }
            self.claimed.insert(path.clone());
            return Destination::Free(path);
        }
    }

    /// Suffixes per slot only ever grow.
    fn bump(&mut self, slot: &Slot) -> u32 {
        let counter = self.counters.entry(slot.clone()).or_insert(0);
        *counter += 1;
        *counter
    }

    fn stem_for(&self, ts: &NaiveDateTime, device: DeviceType) -> String {
        match self.mode {
            NamingMode::Flat => ts.format("%Y%m%d-%H%M%S%.3f").to_string(),
            NamingMode::Device => {
                let mut stem = format!("{}-{}", ts.format("%Y%m%d-%H%M%S"), device);
                if let Some(tag) = &self.device_tag {
                    stem.push('-');
                    stem.push_str(tag);
                }
                stem
            }
        }
    }
}

/// `YYYY/MM/DD`
pub fn partition_for(ts: &NaiveDateTime) -> PathBuf {
    let mut p = PathBuf::from(ts.format("%Y").to_string());
    p.push(ts.format("%m").to_string());
    p.push(ts.format("%d").to_string());
    p
}

/// Keep user labels filename-safe: `GoPro A/1` -> `GoPro-A-1`.
fn sanitize_tag(tag: &str) -> String {
    tag.trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}
