use super::types::{ConfigRoot, Preset, PresetSpec};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("preset '{0}' not found")]
    PresetNotFound(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Persists preset definitions in a JSON config file.
///
/// The store owns the on-disk layout; the backup engine never touches the
/// config file itself.
pub struct PresetStore {
    path: PathBuf,
}

impl PresetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location under the user config directory
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("yabu")
            .join("presets.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every preset defined in the config file
    pub fn load_presets(&self) -> Result<Vec<Preset>> {
        let root = self.read_root()?;
        Ok(root
            .presets
            .into_iter()
            .map(|(name, spec)| spec.into_preset(&name))
            .collect())
    }

    /// Load a single preset by name
    pub fn load_preset(&self, name: &str) -> Result<Preset> {
        let mut root = self.read_root()?;
        root.presets
            .remove(name)
            .map(|spec| spec.into_preset(name))
            .ok_or_else(|| ConfigError::PresetNotFound(name.to_string()))
    }

    /// Insert or replace a preset and write the file back
    pub fn save_preset(&self, preset: &Preset) -> Result<()> {
        validate_preset(preset)?;
        let mut root = if self.path.exists() {
            self.read_root()?
        } else {
            ConfigRoot::empty()
        };
        root.presets
            .insert(preset.name.clone(), PresetSpec::from_preset(preset));
        self.write_root(&root)
    }

    /// Remove a preset and write the file back
    pub fn delete_preset(&self, name: &str) -> Result<()> {
        let mut root = self.read_root()?;
        if root.presets.remove(name).is_none() {
            return Err(ConfigError::PresetNotFound(name.to_string()));
        }
        self.write_root(&root)
    }

    fn read_root(&self) -> Result<ConfigRoot> {
        let contents = fs::read_to_string(&self.path)?;
        let root: ConfigRoot = serde_json::from_str(&contents)?;
        validate_root(&root)?;
        debug!("loaded {} preset(s) from {:?}", root.presets.len(), self.path);
        Ok(root)
    }

    fn write_root(&self, root: &ConfigRoot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(root)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

fn validate_root(root: &ConfigRoot) -> Result<()> {
    if root.format != super::CONFIG_FORMAT {
        return Err(ConfigError::Validation(format!(
            "unsupported config format {} (expected {})",
            root.format,
            super::CONFIG_FORMAT
        )));
    }
    for (name, spec) in &root.presets {
        if spec.targets.is_empty() {
            return Err(ConfigError::Validation(format!(
                "preset '{name}' has no targets"
            )));
        }
        if spec.destinations.is_empty() {
            return Err(ConfigError::Validation(format!(
                "preset '{name}' has no destinations"
            )));
        }
    }
    Ok(())
}

fn validate_preset(preset: &Preset) -> Result<()> {
    if preset.name.is_empty() {
        return Err(ConfigError::Validation("preset name is empty".to_string()));
    }
    if preset.targets.is_empty() {
        return Err(ConfigError::Validation(format!(
            "preset '{}' has no targets",
            preset.name
        )));
    }
    if preset.destinations.is_empty() {
        return Err(ConfigError::Validation(format!(
            "preset '{}' has no destinations",
            preset.name
        )));
    }
    Ok(())
}
