//! Zip archive packing and unpacking
//!
//! Archives are written to a temp name in the destination and renamed into
//! place once complete, so a crash never leaves a half-written file that a
//! concurrent scan could mistake for a valid backup. Each archive carries a
//! `.yabu.meta` entry describing the target it was created from.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Name of the embedded metadata entry
pub const META_ENTRY: &str = ".yabu.meta";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    File,
    Folder,
}

/// Metadata embedded in every archive, recording the naming policy active
/// at creation time and what kind of target was archived
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArchiveMeta {
    pub target: PathBuf,
    pub content_type: ContentType,
    pub name_separator: String,
    pub date_format: String,
    /// Hex SHA-256 over the archived file contents, in entry order.
    /// Lets callers compare two backups of the same target without
    /// extracting either.
    #[serde(default)]
    pub content_hash: String,
}

impl ArchiveMeta {
    pub fn for_target(target: &Path, name_separator: &str, date_format: &str) -> Result<Self> {
        let content_type = if target.is_dir() {
            ContentType::Folder
        } else if target.is_file() {
            ContentType::File
        } else {
            return Err(EngineError::TargetNotFound(target.to_path_buf()));
        };
        Ok(Self {
            target: target.to_path_buf(),
            content_type,
            name_separator: name_separator.to_string(),
            date_format: date_format.to_string(),
            content_hash: String::new(),
        })
    }
}

/// Build a zip archive of `target` at `archive_path`, atomically.
///
/// The archive holds the target's contents relative to the target root
/// (for a file target, just the file), plus the metadata entry, whose
/// `content_hash` is filled in from the archived bytes.
pub fn pack(target: &Path, archive_path: &Path, meta: &mut ArchiveMeta) -> Result<()> {
    let file_name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = archive_path.with_file_name(format!("{file_name}.tmp"));

    match write_archive(target, &tmp, meta) {
        Ok(()) => {
            fs::rename(&tmp, archive_path).map_err(|source| unwritable(archive_path, source))?;
            debug!("wrote archive {:?}", archive_path);
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}

/// A failure to create or move the archive file is the destination's
/// fault, not generic I/O.
fn unwritable(archive_path: &Path, source: io::Error) -> EngineError {
    EngineError::DestinationUnwritable {
        path: archive_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
        source,
    }
}

fn write_archive(target: &Path, tmp: &Path, meta: &mut ArchiveMeta) -> Result<()> {
    let out = File::create(tmp).map_err(|source| unwritable(tmp, source))?;
    let mut zip = ZipWriter::new(out);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut hasher = Sha256::new();

    if target.is_dir() {
        for entry in WalkDir::new(target).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(io::Error::other)?;
            let rel = entry
                .path()
                .strip_prefix(target)
                .expect("walkdir yields paths under its root");
            let rel_name = zip_entry_name(rel);
            if entry.file_type().is_dir() {
                zip.add_directory(rel_name, options)?;
            } else {
                zip.start_file(rel_name, options)?;
                copy_hashed(entry.path(), &mut zip, &mut hasher)?;
            }
        }
    } else if target.is_file() {
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        zip.start_file(name, options)?;
        copy_hashed(target, &mut zip, &mut hasher)?;
    } else {
        return Err(EngineError::TargetNotFound(target.to_path_buf()));
    }

    meta.content_hash = format!("{:x}", hasher.finalize());
    zip.start_file(META_ENTRY, options)?;
    let meta_json = serde_json::to_vec_pretty(&*meta).map_err(io::Error::other)?;
    zip.write_all(&meta_json)?;

    zip.finish()?;
    Ok(())
}

/// Stream a file into the zip while feeding the content hasher
fn copy_hashed(path: &Path, zip: &mut ZipWriter<File>, hasher: &mut Sha256) -> Result<()> {
    let mut reader = File::open(path)?;
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        zip.write_all(&buf[..n])?;
    }
    Ok(())
}

/// Zip entry names always use forward slashes
fn zip_entry_name(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Check that the archive opens and has a readable central directory.
///
/// Callers run this before touching the restore location, so a corrupt
/// archive fails without leaving a half-created directory behind.
pub fn validate(archive_path: &Path) -> Result<()> {
    ZipArchive::new(File::open(archive_path)?)?;
    Ok(())
}

/// Read the embedded metadata entry, if the archive carries one.
///
/// Archives written by other tools simply have none; that is not an error.
pub fn read_meta(archive_path: &Path) -> Option<ArchiveMeta> {
    let mut zip = ZipArchive::new(File::open(archive_path).ok()?).ok()?;
    let mut entry = zip.by_name(META_ENTRY).ok()?;
    let mut contents = String::new();
    io::Read::read_to_string(&mut entry, &mut contents).ok()?;
    serde_json::from_str(&contents).ok()
}

/// Extract an archive's contents (metadata entry excluded) into `into`.
///
/// Without `overwrite`, the whole extraction fails with a conflict before
/// anything is written if any entry would land on an existing file.
pub fn unpack(archive_path: &Path, into: &Path, overwrite: bool) -> Result<()> {
    let mut zip = ZipArchive::new(File::open(archive_path)?)?;

    if !overwrite {
        for i in 0..zip.len() {
            let entry = zip.by_index(i)?;
            if entry.name() == META_ENTRY || entry.is_dir() {
                continue;
            }
            let Some(rel) = entry.enclosed_name() else {
                continue;
            };
            let out = into.join(rel);
            if out.exists() {
                return Err(EngineError::RestoreConflict(out));
            }
        }
    }

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        if entry.name() == META_ENTRY {
            continue;
        }
        let Some(rel) = entry.enclosed_name() else {
            debug!("skipping archive entry with unsafe path: {}", entry.name());
            continue;
        };
        let out = into.join(rel);
        if entry.is_dir() {
            fs::create_dir_all(&out)?;
        } else {
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut writer = File::create(&out)?;
            io::copy(&mut entry, &mut writer)?;
        }
    }

    Ok(())
}
