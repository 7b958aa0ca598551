use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use filetime::FileTime;
use sha2::{Digest, Sha256};
use tracing::warn;

/// The byte-copy collaborator: puts an exact copy of `src` at `dest`.
pub trait FileCopier {
    /// Returns the number of bytes copied. On error no partial `dest` is left.
    fn copy(&self, src: &Path, dest: &Path) -> anyhow::Result<u64>;
}

/// `fs::copy` plus timestamp preservation, optionally SHA-256 verified and
/// retried.
#[derive(Debug, Clone)]
pub struct VerifyingCopier {
    verify: bool,
    attempts: u32,
    delay: Duration,
}

impl VerifyingCopier {
    pub fn new(verify: bool, attempts: u32) -> Self {
        Self {
            verify,
            attempts: attempts.max(1),
            delay: Duration::from_secs(1),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn copy_once(&self, src: &Path, dest: &Path) -> anyhow::Result<u64> {
        let bytes = fs::copy(src, dest)
            .with_context(|| format!("copy {} to {}", src.display(), dest.display()))?;
        copy_file_times(src, dest)?;
        if self.verify {
            let expected = sha256_file(src)?;
            let actual = sha256_file(dest)?;
            if expected != actual {
                bail!("checksum mismatch for {}", dest.display());
            }
        }
        Ok(bytes)
    }
}

impl Default for VerifyingCopier {
    fn default() -> Self {
        Self::new(true, 3)
    }
}

impl FileCopier for VerifyingCopier {
    fn copy(&self, src: &Path, dest: &Path) -> anyhow::Result<u64> {
        let mut attempt = 1;
        loop {
            match self.copy_once(src, dest) {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    if dest.exists() {
                        let _ = fs::remove_file(dest);
                    }
                    if attempt >= self.attempts {
                        return Err(e.context(format!("gave up after {} attempt(s)", attempt)));
                    }
                    warn!(
                        "Copy of {} failed (attempt {}/{}): {:#}",
                        src.display(),
                        attempt,
                        self.attempts,
                        e
                    );
                    thread::sleep(self.delay);
                    attempt += 1;
                }
            }
        }
    }
}

/// Apply `src`'s access and modification times to `dest`.
pub fn copy_file_times(src: &Path, dest: &Path) -> anyhow::Result<()> {
    let meta = fs::metadata(src).with_context(|| format!("stat {}", src.display()))?;
    let atime = FileTime::from_last_access_time(&meta);
    let mtime = FileTime::from_last_modification_time(&meta);
    filetime::set_file_times(dest, atime, mtime)
        .with_context(|| format!("set times on {}", dest.display()))?;
    Ok(())
}

pub fn sha256_file(path: &Path) -> anyhow::Result<String> {
    let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Whether two files have identical content, by size then SHA-256.
pub fn same_content(a: &Path, b: &Path) -> anyhow::Result<bool> {
    let size_a = fs::metadata(a).with_context(|| format!("stat {}", a.display()))?.len();
    let size_b = fs::metadata(b).with_context(|| format!("stat {}", b.display()))?.len();
    if size_a != size_b {
        return Ok(false);
    }
    Ok(sha256_file(a)? == sha256_file(b)?)
}
