use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Archive formats a destination can store backups in
///
/// Only zip today; the enum exists so new formats slot in without
/// touching the naming scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    #[default]
    Zip,
}

impl FileFormat {
    /// File extension written after the timestamp, without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Zip => "zip",
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// A storage location plus its per-location naming and retention policy
///
/// A destination directory may hold backups of many targets, possibly from
/// other presets; the engine only ever touches entries whose name matches
/// the current target's source name.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Destination {
    pub path: PathBuf,

    /// Backups kept per target before the oldest are rotated out
    #[serde(default = "default_max_backup_count")]
    pub max_backup_count: usize,

    #[serde(default)]
    pub file_format: FileFormat,

    /// chrono strftime string used to render the creation timestamp
    #[serde(default = "default_date_format")]
    pub date_format: String,

    /// Separates the source name from the timestamp in the archive name
    #[serde(default = "default_name_separator")]
    pub name_separator: String,
}

impl Destination {
    /// New destination with the default policy
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_backup_count: default_max_backup_count(),
            file_format: FileFormat::default(),
            date_format: default_date_format(),
            name_separator: default_name_separator(),
        }
    }
}

fn default_max_backup_count() -> usize {
    3
}

fn default_date_format() -> String {
    "%Y_%m_%d__%H%M%S".to_string()
}

fn default_name_separator() -> String {
    "-".to_string()
}

/// Named configuration binding targets to destinations
///
/// Owned by the preset store; the backup engine borrows one per operation
/// and never mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub name: String,
    pub targets: Vec<PathBuf>,
    pub destinations: Vec<Destination>,
}

impl Preset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            targets: Vec::new(),
            destinations: Vec::new(),
        }
    }

    pub fn add_target(&mut self, target: impl Into<PathBuf>) {
        self.targets.push(target.into());
    }

    /// Removes the first target equal to `target`; returns whether one was found
    pub fn remove_target(&mut self, target: &Path) -> bool {
        if let Some(pos) = self.targets.iter().position(|t| t == target) {
            self.targets.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn add_destination(&mut self, destination: Destination) {
        self.destinations.push(destination);
    }

    /// Removes the first destination with the given path; returns whether one was found
    pub fn remove_destination(&mut self, path: &Path) -> bool {
        if let Some(pos) = self.destinations.iter().position(|d| d.path == path) {
            self.destinations.remove(pos);
            true
        } else {
            false
        }
    }

    /// The target whose base name equals `source_name`, if any
    pub fn target_for_source(&self, source_name: &str) -> Option<&Path> {
        self.targets
            .iter()
            .find(|t| {
                t.file_name()
                    .map(|n| n.to_string_lossy() == source_name)
                    .unwrap_or(false)
            })
            .map(|t| t.as_path())
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "  Targets:")?;
        for target in &self.targets {
            writeln!(f, "    - {}", target.display())?;
        }
        writeln!(f, "  Destinations:")?;
        for dest in &self.destinations {
            writeln!(f, "    - {}", dest.path.display())?;
            writeln!(f, "        File Format: {}", dest.file_format)?;
            writeln!(f, "        Max Backup Count: {}", dest.max_backup_count)?;
            writeln!(f, "        Date Format: {}", dest.date_format)?;
            writeln!(f, "        Name Separator: {}", dest.name_separator)?;
        }
        Ok(())
    }
}

/// Preset as stored in the config file (the name is the map key)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PresetSpec {
    pub targets: Vec<PathBuf>,
    pub destinations: Vec<Destination>,
}

impl PresetSpec {
    pub fn into_preset(self, name: &str) -> Preset {
        Preset {
            name: name.to_string(),
            targets: self.targets,
            destinations: self.destinations,
        }
    }

    pub fn from_preset(preset: &Preset) -> Self {
        Self {
            targets: preset.targets.clone(),
            destinations: preset.destinations.clone(),
        }
    }
}

/// Root structure of the preset config file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConfigRoot {
    /// Schema version, bumped on incompatible layout changes
    pub format: u32,
    #[serde(default)]
    pub presets: BTreeMap<String, PresetSpec>,
}

impl ConfigRoot {
    pub fn empty() -> Self {
        Self {
            format: crate::config::CONFIG_FORMAT,
            presets: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_defaults_fill_in() {
        let dest: Destination = serde_json::from_str(r#"{"path": "/backup"}"#).unwrap();
        assert_eq!(dest.path, PathBuf::from("/backup"));
        assert_eq!(dest.max_backup_count, 3);
        assert_eq!(dest.file_format, FileFormat::Zip);
        assert_eq!(dest.date_format, "%Y_%m_%d__%H%M%S");
        assert_eq!(dest.name_separator, "-");
    }

    #[test]
    fn preset_target_mutations() {
        let mut preset = Preset::new("docs");
        preset.add_target("/home/u/notes");
        preset.add_target("/home/u/papers");
        assert!(preset.remove_target(Path::new("/home/u/notes")));
        assert!(!preset.remove_target(Path::new("/home/u/notes")));
        assert_eq!(preset.targets, vec![PathBuf::from("/home/u/papers")]);
    }

    #[test]
    fn preset_destination_mutations() {
        let mut preset = Preset::new("docs");
        preset.add_destination(Destination::new("/backup"));
        assert!(preset.remove_destination(Path::new("/backup")));
        assert!(preset.destinations.is_empty());
    }

    #[test]
    fn target_lookup_by_source_name() {
        let mut preset = Preset::new("docs");
        preset.add_target("/home/u/notes");
        assert_eq!(
            preset.target_for_source("notes"),
            Some(Path::new("/home/u/notes"))
        );
        assert_eq!(preset.target_for_source("other"), None);
    }
}
