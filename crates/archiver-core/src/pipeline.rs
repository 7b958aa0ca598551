use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::cancel::CancellationToken;
use crate::copy::{same_content, FileCopier, VerifyingCopier};
use crate::date::{Timestamp, TimestampResolver};
use crate::device::{DeviceClassifier, DeviceType};
use crate::media::MediaFile;
use crate::naming::{Destination, NameResolver};
use crate::{ProgressCallback, Settings};

/// What makes an existing destination file count as "already archived".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Same computed filename
    #[default]
    Name,
    /// Same computed filename and same SHA-256
    Content,
}

pub const REASON_EXISTS: &str = "already exists";
pub const REASON_IDENTICAL: &str = "identical file already exists";

/// Per-file result. Paths are relative to the destination root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Copied(PathBuf),
    Skipped { path: PathBuf, reason: String },
    Failed { path: Option<PathBuf>, error: String },
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub original_name: String,
    pub timestamp: Timestamp,
    pub device: DeviceType,
    pub outcome: Outcome,
}

impl FileReport {
    /// One human-readable log line per file.
    pub fn log(&self) {
        match &self.outcome {
            Outcome::Copied(path) => {
                info!("Copied: {} -> {}", self.original_name, path.display())
            }
            Outcome::Skipped { path, reason } => {
                info!("Skipped: {} -> {} ({})", self.original_name, path.display(), reason)
            }
            Outcome::Failed {
                path: Some(path),
                error,
            } => error!("Failed: {} -> {}: {}", self.original_name, path.display(), error),
            Outcome::Failed { path: None, error } => {
                error!("Failed: {}: {}", self.original_name, error)
            }
        }
    }
}

/// Run totals for the reporting side.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub found: u64,
    pub copied: u64,
    pub skipped: u64,
    pub failed: u64,
    /// Stopped early by a cancellation request
    pub cancelled: bool,
    pub reports: Vec<FileReport>,
}

impl RunSummary {
    fn record(&mut self, report: FileReport) {
        match report.outcome {
            Outcome::Copied(_) => self.copied += 1,
            Outcome::Skipped { .. } => self.skipped += 1,
            Outcome::Failed { .. } => self.failed += 1,
        }
        self.reports.push(report);
    }

    pub fn processed(&self) -> u64 {
        self.copied + self.skipped + self.failed
    }
}

/// resolve -> classify -> name -> copy, one file at a time.
pub struct Pipeline {
    resolver: TimestampResolver,
    classifier: DeviceClassifier,
    names: NameResolver,
    copier: Box<dyn FileCopier>,
    duplicates: DuplicatePolicy,
    overwrite: bool,
}

impl Pipeline {
    pub fn new(resolver: TimestampResolver, classifier: DeviceClassifier, names: NameResolver) -> Self {
        Self {
            resolver,
            classifier,
            names,
            copier: Box::new(VerifyingCopier::default()),
            duplicates: DuplicatePolicy::Name,
            overwrite: false,
        }
    }

    pub fn from_settings(destination: PathBuf, settings: &Settings) -> Self {
        Self::new(
            TimestampResolver::new(settings.read_track_headers, settings.guess_from_filename),
            DeviceClassifier::new(settings.devices.clone()),
            NameResolver::new(destination, settings.naming, settings.device_tag.as_deref()),
        )
        .with_copier(Box::new(VerifyingCopier::new(settings.verify_copy, settings.copy_retries)))
        .with_duplicates(settings.duplicates, settings.overwrite)
    }

    pub fn with_copier(mut self, copier: Box<dyn FileCopier>) -> Self {
        self.copier = copier;
        self
    }

    /// Replacing a file is only ever decided on content, so `overwrite`
    /// forces [`DuplicatePolicy::Content`].
    pub fn with_duplicates(mut self, policy: DuplicatePolicy, overwrite: bool) -> Self {
        self.duplicates = if overwrite { DuplicatePolicy::Content } else { policy };
        self.overwrite = overwrite;
        self
    }

    /// Process `files` in order. A failing file never stops the run; a
    /// cancellation request takes effect between files.
    pub fn run(
        &mut self,
        files: &[MediaFile],
        cancel: Option<&CancellationToken>,
        progress: &ProgressCallback<'_>,
    ) -> RunSummary {
        let total = files.len() as u64;
        let mut summary = RunSummary {
            found: total,
            ..Default::default()
        };

        for (i, file) in files.iter().enumerate() {
            if let Some(token) = cancel {
                if token.check().is_err() {
                    warn!("Cancelled after {} of {} files", i, total);
                    summary.cancelled = true;
                    break;
                }
            }
            progress(i as u64, total, &file.filename);
            let report = self.process_file(file);
            report.log();
            summary.record(report);
        }

        summary
    }

    pub fn process_file(&mut self, file: &MediaFile) -> FileReport {
        let resolved = self.resolver.resolve(file);
        let device = self.classifier.classify(file, resolved.metadata.as_ref());
        debug!(
            "{} ({} bytes): {} from {}, device {}",
            file.filename, file.size, resolved.timestamp.datetime, resolved.timestamp.source, device
        );

        let outcome = self
            .place(file, &resolved.timestamp.datetime, device)
            .unwrap_or_else(|e| Outcome::Failed {
                path: None,
                error: format!("{:#}", e),
            });

        FileReport {
            original_name: file.filename.clone(),
            timestamp: resolved.timestamp,
            device,
            outcome,
        }
    }

    fn place(&mut self, file: &MediaFile, ts: &NaiveDateTime, device: DeviceType) -> anyhow::Result<Outcome> {
        let mut dest = self
            .names
            .resolve_destination(file, ts, device)
            .with_context(|| format!("prepare destination directory for {}", file.filename))?;

        let relative = loop {
            let occupied = match dest {
                Destination::Free(path) => break path,
                Destination::Occupied(occupied) => occupied,
            };
            if self.duplicates == DuplicatePolicy::Name {
                return Ok(Outcome::Skipped {
                    path: occupied.path,
                    reason: REASON_EXISTS.to_string(),
                });
            }

            let existing = self.names.root().join(&occupied.path);
            if same_content(&file.path, &existing)? {
                return Ok(Outcome::Skipped {
                    path: occupied.path,
                    reason: REASON_IDENTICAL.to_string(),
                });
            }
            if self.overwrite {
                warn!(
                    "Destination file exists with different content: {} - overwriting",
                    occupied.path.display()
                );
                break self.names.claim(&occupied);
            }
            debug!("{} differs from {}, trying next suffix", file.filename, occupied.path.display());
            dest = self.names.next_after(occupied);
        };

        let target = self.names.root().join(&relative);
        match self.copier.copy(&file.path, &target) {
            Ok(_) => Ok(Outcome::Copied(relative)),
            Err(e) => Ok(Outcome::Failed {
                path: Some(relative),
                error: format!("{:#}", e),
            }),
        }
    }
}
