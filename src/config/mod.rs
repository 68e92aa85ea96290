//! Preset configuration: the data model and the JSON-backed store
//!
//! The file layout is a versioned root object with a map of presets, each
//! holding its targets and destinations:
//!
//! ```json
//! { "format": 1,
//!   "presets": { "docs": {
//!       "targets": ["/home/u/notes"],
//!       "destinations": [{ "path": "/backup", "max_backup_count": 2 }] } } }
//! ```
//!
//! Policy fields (retention count, archive format, date format, name
//! separator) are strictly per-destination.

mod loader;
mod types;

pub use loader::{ConfigError, PresetStore, Result};
pub use types::*;

/// Current config file schema version
pub const CONFIG_FORMAT: u32 = 1;
