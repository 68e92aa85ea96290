//! Yabu - yet another backup utility
//!
//! Preset-driven archive backups: each preset maps a set of targets
//! (files or directories) to one or more destinations, each with its own
//! naming and retention policy. The engine creates zip archives, rebuilds
//! backup metadata from filenames alone, rotates out the oldest archives,
//! and restores them safely.

pub mod config;
pub mod error;
pub mod managers;
pub mod utils;

// Re-export commonly used types
pub use config::{ConfigError, Destination, FileFormat, Preset, PresetStore};
pub use error::{EngineError, Result};
pub use managers::backup::{BackupEngine, CreateReport, PairError, RestoreOptions};
pub use managers::logging::{init_console_logging, init_logging, LogGuard, LoggingConfig};
pub use utils::naming::Backup;

// Time source abstraction (the manual clock is used by the test suite)
pub use utils::clock::{Clock, ManualClock, SystemClock};
