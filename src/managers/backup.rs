//! Backup engine - creates, enumerates, rotates, and restores archives
//!
//! Every operation fans out over the preset's (target, destination) pairs
//! and isolates failures per pair: one unreachable destination never aborts
//! the rest of the batch. Scans are pure reads and reconstruct backup
//! metadata from filenames alone.

use crate::config::{Destination, Preset};
use crate::error::{EngineError, Result};
use crate::utils::archive::{self, ArchiveMeta, ContentType};
use crate::utils::clock::{Clock, SystemClock};
use crate::utils::naming::{archive_file_name, parse_timestamp, Backup};
use chrono::Duration;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Bound on timestamp bumps when a forced backup collides with an
/// existing archive name
const MAX_STAMP_BUMPS: u32 = 120;

/// Failure of a single (target, destination) operation within a batch
#[derive(Debug)]
pub struct PairError {
    pub target: PathBuf,
    pub destination: PathBuf,
    pub error: EngineError,
}

impl std::fmt::Display for PairError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> {}: {}",
            self.target.display(),
            self.destination.display(),
            self.error
        )
    }
}

/// Outcome of a create run: successes, dedup skips, and collected failures
#[derive(Debug, Default)]
pub struct CreateReport {
    pub created: Vec<Backup>,
    /// (target, destination) pairs skipped by the dedup guard
    pub skipped: Vec<(PathBuf, PathBuf)>,
    pub errors: Vec<PairError>,
}

impl CreateReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    /// Restore into this directory instead of the original target's parent
    pub into: Option<PathBuf>,
    /// Replace existing files at the restore location
    pub overwrite: bool,
    /// Delete the archive once extraction has fully succeeded
    pub delete_after: bool,
}

pub struct BackupEngine {
    clock: Arc<dyn Clock>,
}

impl Default for BackupEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl BackupEngine {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock::new()),
        }
    }

    /// Engine with an injected time source (used by the test suite)
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Create archives of every target in every destination.
    ///
    /// A backup already present for the current timestamp (at the
    /// destination's date format resolution) is skipped unless `force`.
    /// Retention runs per pair after a successful write unless `keep`.
    pub fn create_backup(&self, preset: &Preset, force: bool, keep: bool) -> CreateReport {
        info!("creating backups for preset '{}'", preset.name);
        let mut report = CreateReport::default();

        for target in &preset.targets {
            for dest in &preset.destinations {
                match self.create_for_pair(target, dest, force) {
                    Ok(Some(backup)) => {
                        info!("created {}", backup.path.display());
                        report.created.push(backup);
                        if !keep {
                            report.errors.extend(self.prune_pair(target, dest));
                        }
                    }
                    Ok(None) => {
                        debug!(
                            "already saved this period, skipping {} -> {}",
                            target.display(),
                            dest.path.display()
                        );
                        report.skipped.push((target.clone(), dest.path.clone()));
                    }
                    Err(err) => {
                        error!(
                            "backup of {} to {} failed: {}",
                            target.display(),
                            dest.path.display(),
                            err
                        );
                        report.errors.push(PairError {
                            target: target.clone(),
                            destination: dest.path.clone(),
                            error: err,
                        });
                    }
                }
            }
        }

        info!(
            "preset '{}': {} created, {} skipped, {} failed",
            preset.name,
            report.created.len(),
            report.skipped.len(),
            report.errors.len()
        );
        report
    }

    fn create_for_pair(
        &self,
        target: &Path,
        dest: &Destination,
        force: bool,
    ) -> Result<Option<Backup>> {
        if !target.exists() {
            return Err(EngineError::TargetNotFound(target.to_path_buf()));
        }
        let source_name = source_name_of(target)?;

        fs::create_dir_all(&dest.path).map_err(|source| EngineError::DestinationUnwritable {
            path: dest.path.clone(),
            source,
        })?;

        let mut stamp = self.clock.now();
        let mut name = archive_file_name(&source_name, dest, stamp);

        if dest.path.join(&name).exists() {
            if !force {
                return Ok(None);
            }
            // Forced duplicate in the same period: advance the timestamp
            // until the rendered name changes and is free. A date format too
            // coarse to move within the bound means the colliding archive
            // gets replaced instead.
            let mut free = false;
            for _ in 0..MAX_STAMP_BUMPS {
                stamp += Duration::seconds(1);
                let candidate = archive_file_name(&source_name, dest, stamp);
                if candidate == name {
                    continue;
                }
                name = candidate;
                if !dest.path.join(&name).exists() {
                    free = true;
                    break;
                }
            }
            if !free {
                warn!("date format too coarse to disambiguate, replacing {name}");
            }
        }

        let mut meta = ArchiveMeta::for_target(target, &dest.name_separator, &dest.date_format)?;
        let archive_path = dest.path.join(&name);
        archive::pack(target, &archive_path, &mut meta)?;

        let raw_timestamp = stamp.format(&dest.date_format).to_string();
        Ok(Some(Backup {
            source_name,
            path: archive_path,
            // reparse so the timestamp matches what a later scan reports
            created_at: parse_timestamp(&raw_timestamp, &dest.date_format),
            raw_timestamp,
            file_format: dest.file_format,
            date_format: dest.date_format.clone(),
            name_separator: dest.name_separator.clone(),
        }))
    }

    /// Enumerate all backups of the preset's targets across its
    /// destinations. Pure read, never fails on individual entries.
    ///
    /// Per (target, destination) pair: parseable backups ascending by
    /// timestamp, then unparseable-but-matching entries in filename order.
    pub fn get_backups(&self, preset: &Preset) -> Vec<Backup> {
        let mut all = Vec::new();
        for target in &preset.targets {
            for dest in &preset.destinations {
                all.extend(self.backups_for_pair(target, dest));
            }
        }
        all
    }

    fn backups_for_pair(&self, target: &Path, dest: &Destination) -> Vec<Backup> {
        let Ok(source_name) = source_name_of(target) else {
            return Vec::new();
        };
        let entries = match fs::read_dir(&dest.path) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("destination {} not readable: {e}", dest.path.display());
                return Vec::new();
            }
        };

        let mut dated = Vec::new();
        let mut undated = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(backup) = Backup::from_entry(&path, &source_name, dest) {
                if backup.created_at.is_some() {
                    dated.push(backup);
                } else {
                    undated.push(backup);
                }
            }
        }
        dated.sort_by_key(|b| b.created_at);
        undated.sort_by_key(|b| b.file_name());
        dated.extend(undated);
        dated
    }

    /// The most recent backup across the whole preset, if any
    pub fn get_latest_backup(&self, preset: &Preset) -> Option<Backup> {
        self.get_latest_backups(preset)
            .into_iter()
            .max_by_key(|b| b.created_at)
    }

    /// The most recent backup of each (target, destination) pair.
    /// Pairs without a dated backup are omitted, never fabricated.
    pub fn get_latest_backups(&self, preset: &Preset) -> Vec<Backup> {
        let mut latest = Vec::new();
        for target in &preset.targets {
            for dest in &preset.destinations {
                let newest = self
                    .backups_for_pair(target, dest)
                    .into_iter()
                    .filter(|b| b.created_at.is_some())
                    .last();
                if let Some(backup) = newest {
                    latest.push(backup);
                }
            }
        }
        latest
    }

    /// Preview what retention would delete, oldest first per pair
    pub fn get_delete_candidates(&self, preset: &Preset) -> Vec<Backup> {
        let mut candidates = Vec::new();
        for target in &preset.targets {
            for dest in &preset.destinations {
                candidates.extend(self.delete_candidates_for_pair(target, dest));
            }
        }
        candidates
    }

    fn delete_candidates_for_pair(&self, target: &Path, dest: &Destination) -> Vec<Backup> {
        // Entries without a parsed timestamp have no place in the age
        // ordering, so they neither count toward the limit nor get deleted.
        let dated: Vec<Backup> = self
            .backups_for_pair(target, dest)
            .into_iter()
            .filter(|b| b.created_at.is_some())
            .collect();
        if dated.len() > dest.max_backup_count {
            let excess = dated.len() - dest.max_backup_count;
            dated.into_iter().take(excess).collect()
        } else {
            Vec::new()
        }
    }

    /// Rotate out the oldest backups beyond each destination's
    /// `max_backup_count`. Deletion failures are reported, not raised.
    pub fn delete_old_backups(&self, preset: &Preset) -> Vec<PairError> {
        let mut failures = Vec::new();
        for target in &preset.targets {
            for dest in &preset.destinations {
                failures.extend(self.prune_pair(target, dest));
            }
        }
        failures
    }

    fn prune_pair(&self, target: &Path, dest: &Destination) -> Vec<PairError> {
        let mut failures = Vec::new();
        for backup in self.delete_candidates_for_pair(target, dest) {
            match self.delete_backup(&backup) {
                Ok(()) => info!("rotated out {}", backup.path.display()),
                Err(error) => {
                    warn!("could not rotate out {}: {error}", backup.path.display());
                    failures.push(PairError {
                        target: target.to_path_buf(),
                        destination: dest.path.clone(),
                        error,
                    });
                }
            }
        }
        failures
    }

    /// Extract a backup next to its original target (or into
    /// `options.into`), returning the path the contents landed at.
    ///
    /// The archive is deleted afterwards only when `delete_after` is set
    /// and extraction fully succeeded.
    pub fn restore_backup(
        &self,
        preset: &Preset,
        backup: &Backup,
        options: &RestoreOptions,
    ) -> Result<PathBuf> {
        // the archive may have vanished between listing and restoring
        if !backup.path.exists() {
            return Err(EngineError::BackupNotFound(backup.path.clone()));
        }
        // fail on a corrupt archive before touching the restore location
        archive::validate(&backup.path)?;

        let meta = archive::read_meta(&backup.path);
        let restore_dir = match &options.into {
            Some(dir) => dir.clone(),
            None => {
                let target = preset
                    .target_for_source(&backup.source_name)
                    .ok_or_else(|| {
                        EngineError::TargetNotFound(PathBuf::from(&backup.source_name))
                    })?;
                target
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."))
            }
        };

        // Foreign archives without metadata are treated as folder backups.
        let content_type = meta
            .map(|m| m.content_type)
            .unwrap_or(ContentType::Folder);
        let into = match content_type {
            ContentType::Folder => restore_dir.join(&backup.source_name),
            ContentType::File => restore_dir.clone(),
        };

        if content_type == ContentType::Folder && into.exists() && !options.overwrite {
            return Err(EngineError::RestoreConflict(into));
        }
        fs::create_dir_all(&into)?;
        archive::unpack(&backup.path, &into, options.overwrite)?;
        info!("restored {} to {}", backup.path.display(), into.display());

        if options.delete_after {
            fs::remove_file(&backup.path)?;
            info!("deleted archive {} after restore", backup.path.display());
        }
        Ok(into)
    }

    /// Delete an archive from its destination
    pub fn delete_backup(&self, backup: &Backup) -> Result<()> {
        if !backup.path.exists() {
            return Err(EngineError::BackupNotFound(backup.path.clone()));
        }
        fs::remove_file(&backup.path)?;
        Ok(())
    }

    /// Rename an archive in place and re-derive its identity from the new
    /// name. Renaming outside the naming convention is allowed; the result
    /// may carry no parsed timestamp.
    pub fn rename_backup(&self, backup: &Backup, new_name: &str) -> Result<Backup> {
        if !backup.path.exists() {
            return Err(EngineError::BackupNotFound(backup.path.clone()));
        }
        let new_path = backup.path.with_file_name(new_name);
        fs::rename(&backup.path, &new_path)?;
        Ok(Backup::from_archive(
            &new_path,
            &backup.name_separator,
            &backup.date_format,
            backup.file_format,
        ))
    }
}

/// A target's identity is its base name; targets with equal base names
/// under different parents are indistinguishable by design.
fn source_name_of(target: &Path) -> Result<String> {
    target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| EngineError::TargetNotFound(target.to_path_buf()))
}

/// Preset-level entry points, delegating to a borrowed engine
impl Preset {
    pub fn create_backup(&self, engine: &BackupEngine, force: bool, keep: bool) -> CreateReport {
        engine.create_backup(self, force, keep)
    }

    pub fn get_backups(&self, engine: &BackupEngine) -> Vec<Backup> {
        engine.get_backups(self)
    }

    pub fn get_latest_backup(&self, engine: &BackupEngine) -> Option<Backup> {
        engine.get_latest_backup(self)
    }

    pub fn restore_backup(
        &self,
        engine: &BackupEngine,
        backup: &Backup,
        options: &RestoreOptions,
    ) -> Result<PathBuf> {
        engine.restore_backup(self, backup, options)
    }
}
