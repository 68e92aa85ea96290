//! Archive naming codec and the Backup value object
//!
//! A backup's identity is recoverable from its filename alone:
//! `<source_name><separator><timestamp per date_format>.<extension>`.
//! The separator and date format are per-destination policy, so a backup
//! created under an older policy may no longer parse; such entries are
//! still surfaced, just without a parsed timestamp.

use crate::config::{Destination, FileFormat};
use chrono::{NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};

/// One archived snapshot of a target, identified by filename convention
#[derive(Debug, Clone, PartialEq)]
pub struct Backup {
    /// Base name of the target the archive was created from
    pub source_name: String,
    /// Location of the archive on disk
    pub path: PathBuf,
    /// Parsed creation timestamp; `None` when the raw string does not
    /// parse under the format the backup was matched with
    pub created_at: Option<NaiveDateTime>,
    /// Timestamp portion of the filename, verbatim
    pub raw_timestamp: String,
    pub file_format: FileFormat,
    /// Date format the backup was matched with (best effort, the
    /// destination's currently configured one)
    pub date_format: String,
    pub name_separator: String,
}

impl Backup {
    /// Match a destination directory entry against a target's source name.
    ///
    /// Returns `None` when the entry does not belong to this target (wrong
    /// extension, or the name does not start with
    /// `<source_name><separator>`). A matching entry whose timestamp fails
    /// to parse is still returned, with `created_at` unset.
    pub fn from_entry(path: &Path, source_name: &str, dest: &Destination) -> Option<Backup> {
        let file_name = path.file_name()?.to_str()?;
        let stem = file_name.strip_suffix(&format!(".{}", dest.file_format.extension()))?;
        let prefix = format!("{}{}", source_name, dest.name_separator);
        let raw_timestamp = stem.strip_prefix(&prefix)?;

        Some(Backup {
            source_name: source_name.to_string(),
            path: path.to_path_buf(),
            created_at: parse_timestamp(raw_timestamp, &dest.date_format),
            raw_timestamp: raw_timestamp.to_string(),
            file_format: dest.file_format,
            date_format: dest.date_format.clone(),
            name_separator: dest.name_separator.clone(),
        })
    }

    /// Re-derive identity from an archive path with a known naming policy.
    ///
    /// Used after renames, where no target constrains the source name: the
    /// stem is split on the last occurrence of the separator. Both the
    /// source name and the timestamp may come out unparseable, which is
    /// allowed.
    pub fn from_archive(
        path: &Path,
        separator: &str,
        date_format: &str,
        file_format: FileFormat,
    ) -> Backup {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = file_name
            .strip_suffix(&format!(".{}", file_format.extension()))
            .unwrap_or(&file_name);

        let (source_name, raw_timestamp) = if !separator.is_empty() {
            match stem.rsplit_once(separator) {
                Some((name, raw)) => (name.to_string(), raw.to_string()),
                None => (stem.to_string(), String::new()),
            }
        } else {
            (stem.to_string(), String::new())
        };

        Backup {
            created_at: parse_timestamp(&raw_timestamp, date_format),
            source_name,
            path: path.to_path_buf(),
            raw_timestamp,
            file_format,
            date_format: date_format.to_string(),
            name_separator: separator.to_string(),
        }
    }

    /// The destination directory this archive lives in
    pub fn destination_dir(&self) -> Option<&Path> {
        self.path.parent()
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Backup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.created_at {
            Some(at) => write!(f, "{} ({})", self.file_name(), at),
            None => write!(f, "{} (unknown date)", self.file_name()),
        }
    }
}

/// Render the canonical archive filename for a target at a timestamp
pub fn archive_file_name(source_name: &str, dest: &Destination, stamp: NaiveDateTime) -> String {
    format!(
        "{}{}{}.{}",
        source_name,
        dest.name_separator,
        stamp.format(&dest.date_format),
        dest.file_format.extension()
    )
}

/// Parse a raw timestamp string under a strftime format.
///
/// Date-only formats are accepted by falling back to midnight.
pub fn parse_timestamp(raw: &str, date_format: &str) -> Option<NaiveDateTime> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(stamp) = NaiveDateTime::parse_from_str(raw, date_format) {
        return Some(stamp);
    }
    NaiveDate::parse_from_str(raw, date_format)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dest(date_format: &str, separator: &str) -> Destination {
        Destination {
            date_format: date_format.to_string(),
            name_separator: separator.to_string(),
            ..Destination::new("/backup")
        }
    }

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(12, 30, 45)
            .unwrap()
    }

    #[test]
    fn renders_canonical_name() {
        let d = dest("%Y%m%d%H%M%S", "-");
        assert_eq!(archive_file_name("notes", &d, stamp()), "notes-20230101123045.zip");
    }

    #[test]
    fn round_trips_through_parse() {
        let d = dest("%Y%m%d%H%M%S", "-");
        let name = archive_file_name("notes", &d, stamp());
        let backup = Backup::from_entry(Path::new(&name), "notes", &d).unwrap();
        assert_eq!(backup.source_name, "notes");
        assert_eq!(backup.created_at, Some(stamp()));
        assert_eq!(backup.raw_timestamp, "20230101123045");
    }

    #[test]
    fn ignores_foreign_entries() {
        let d = dest("%Y%m%d%H%M%S", "-");
        assert!(Backup::from_entry(Path::new("random.txt"), "notes", &d).is_none());
        assert!(Backup::from_entry(Path::new("other-20230101123045.zip"), "notes", &d).is_none());
        // prefix must include the separator, not just the source name
        assert!(Backup::from_entry(Path::new("notes20230101.zip"), "notes", &d).is_none());
    }

    #[test]
    fn stale_format_still_surfaces() {
        // Archive written under an older date format; the current policy
        // cannot parse it but the entry must not disappear.
        let d = dest("%Y%m%d%H%M%S", "-");
        let backup = Backup::from_entry(Path::new("notes-2023_01_01.zip"), "notes", &d).unwrap();
        assert_eq!(backup.created_at, None);
        assert_eq!(backup.raw_timestamp, "2023_01_01");
    }

    #[test]
    fn date_only_format_parses_to_midnight() {
        let d = dest("%Y%m%d", "-");
        let backup = Backup::from_entry(Path::new("notes-20230101.zip"), "notes", &d).unwrap();
        assert_eq!(
            backup.created_at,
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap().and_hms_opt(0, 0, 0)
        );
    }

    #[test]
    fn separator_inside_timestamp_is_kept() {
        let d = dest("%Y-%m-%d", "-");
        let backup = Backup::from_entry(Path::new("notes-2023-01-01.zip"), "notes", &d).unwrap();
        assert_eq!(backup.raw_timestamp, "2023-01-01");
        assert!(backup.created_at.is_some());
    }

    #[test]
    fn source_name_with_extension_matches() {
        // A file target's identity is its full base name, dot included.
        let d = dest("%Y%m%d%H%M%S", "-");
        let backup =
            Backup::from_entry(Path::new("a.txt-20230101123045.zip"), "a.txt", &d).unwrap();
        assert_eq!(backup.source_name, "a.txt");
        assert_eq!(backup.created_at, Some(stamp().date().and_hms_opt(12, 30, 45).unwrap()));
    }

    #[test]
    fn rederives_identity_after_rename() {
        let backup = Backup::from_archive(
            Path::new("/backup/notes-20230101123045.zip"),
            "-",
            "%Y%m%d%H%M%S",
            FileFormat::Zip,
        );
        assert_eq!(backup.source_name, "notes");
        assert_eq!(backup.created_at, Some(stamp()));

        let renamed = Backup::from_archive(
            Path::new("/backup/keep_this_one.zip"),
            "-",
            "%Y%m%d%H%M%S",
            FileFormat::Zip,
        );
        assert_eq!(renamed.source_name, "keep_this_one");
        assert_eq!(renamed.created_at, None);
    }
}
