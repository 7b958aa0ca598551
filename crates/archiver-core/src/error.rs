use std::io;
use std::path::PathBuf;

/// Conditions that stop a run before any file is processed.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Source directory does not exist: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("Source path is not a directory: {}", .0.display())]
    SourceNotDirectory(PathBuf),

    #[error("Cannot read source directory {}: {source}", .path.display())]
    SourceUnreadable { path: PathBuf, source: io::Error },

    #[error("Cannot create destination directory {}: {source}", .path.display())]
    DestinationCreate { path: PathBuf, source: io::Error },

    #[error("Destination path is not a directory: {}", .0.display())]
    DestinationNotDirectory(PathBuf),

    #[error("No write permission in destination directory {}: {source}", .path.display())]
    DestinationNotWritable { path: PathBuf, source: io::Error },

    #[error("Invalid configuration {}: {reason}", .path.display())]
    Config { path: PathBuf, reason: String },
}
