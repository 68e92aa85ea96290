//! Error taxonomy for the backup engine
//!
//! Batch operations collect these per (target, destination) pair instead of
//! aborting the whole run. Scans never raise for individual entries: an
//! archive name that does not parse is surfaced as an undated backup.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("target not found: {0}")]
    TargetNotFound(PathBuf),

    #[error("destination not writable: {path}: {source}")]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("backup archive not found: {0}")]
    BackupNotFound(PathBuf),

    #[error("restore target already exists: {0}")]
    RestoreConflict(PathBuf),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
