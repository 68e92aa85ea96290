use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use yabu::{
    managers, Backup, BackupEngine, CreateReport, Preset, PresetStore, RestoreOptions,
};

#[derive(Parser)]
#[command(name = "yabu")]
#[command(about = "Preset-driven backup tool with rotation", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the preset config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for rotated log files (console-only logging if omitted)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all configured presets
    List,

    /// Show a preset's targets and destinations
    Show {
        /// Preset name
        preset: String,
    },

    /// Create backups of a preset's targets in all of its destinations
    Backup {
        /// Preset name
        preset: String,

        /// Create even if a backup for the current period already exists
        #[arg(short, long)]
        force: bool,

        /// Skip rotation, keeping backups beyond the max count
        #[arg(short, long)]
        keep: bool,
    },

    /// List a preset's backups
    Backups {
        /// Preset name
        preset: String,
    },

    /// Restore a backup next to its original target
    Restore {
        /// Preset name
        preset: String,

        /// Archive file name (as shown by `backups`) or full path
        archive: String,

        /// Restore into this directory instead
        #[arg(long)]
        to: Option<PathBuf>,

        /// Replace existing files at the restore location
        #[arg(long)]
        overwrite: bool,

        /// Delete the archive after a successful restore
        #[arg(long)]
        delete_after: bool,
    },

    /// Delete a backup archive
    Delete {
        /// Preset name
        preset: String,

        /// Archive file name or full path
        archive: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _guard = match &cli.log_dir {
        Some(dir) => Some(managers::logging::init_logging(
            &managers::logging::LoggingConfig::new(dir),
        )?),
        None => {
            managers::logging::init_console_logging();
            None
        }
    };

    let store = PresetStore::new(cli.config.unwrap_or_else(PresetStore::default_path));
    let engine = BackupEngine::new();

    match cli.command {
        Commands::List => handle_list(&store),
        Commands::Show { preset } => {
            let preset = store.load_preset(&preset)?;
            print!("{preset}");
            Ok(())
        }
        Commands::Backup {
            preset,
            force,
            keep,
        } => {
            let preset = store.load_preset(&preset)?;
            handle_backup(&engine, &preset, force, keep)
        }
        Commands::Backups { preset } => {
            let preset = store.load_preset(&preset)?;
            handle_backups(&engine, &preset)
        }
        Commands::Restore {
            preset,
            archive,
            to,
            overwrite,
            delete_after,
        } => {
            let preset = store.load_preset(&preset)?;
            let backup = find_backup(&engine, &preset, &archive)?;
            let options = RestoreOptions {
                into: to,
                overwrite,
                delete_after,
            };
            let restored = preset.restore_backup(&engine, &backup, &options)?;
            println!("Restored to {}", restored.display());
            Ok(())
        }
        Commands::Delete { preset, archive } => {
            let preset = store.load_preset(&preset)?;
            let backup = find_backup(&engine, &preset, &archive)?;
            engine.delete_backup(&backup)?;
            println!("Deleted {}", backup.path.display());
            Ok(())
        }
    }
}

fn handle_list(store: &PresetStore) -> Result<()> {
    let presets = store
        .load_presets()
        .with_context(|| format!("Failed to load presets from {}", store.path().display()))?;
    if presets.is_empty() {
        println!("No presets configured.");
        return Ok(());
    }
    for preset in presets {
        println!(
            "{} ({} targets, {} destinations)",
            preset.name,
            preset.targets.len(),
            preset.destinations.len()
        );
    }
    Ok(())
}

fn handle_backup(engine: &BackupEngine, preset: &Preset, force: bool, keep: bool) -> Result<()> {
    let report = preset.create_backup(engine, force, keep);
    print_report(&report);
    if !report.is_success() {
        bail!("{} backup(s) failed", report.errors.len());
    }
    Ok(())
}

fn print_report(report: &CreateReport) {
    for backup in &report.created {
        println!("Created {}", backup.path.display());
    }
    for (target, destination) in &report.skipped {
        println!(
            "Skipped {} -> {} (already saved this period, use --force to override)",
            target.display(),
            destination.display()
        );
    }
    for error in &report.errors {
        eprintln!("Failed: {error}");
    }
}

fn handle_backups(engine: &BackupEngine, preset: &Preset) -> Result<()> {
    let backups = preset.get_backups(engine);
    if backups.is_empty() {
        println!("No backups found for preset '{}'.", preset.name);
        return Ok(());
    }
    for backup in backups {
        println!("{backup}");
    }
    Ok(())
}

fn find_backup(engine: &BackupEngine, preset: &Preset, archive: &str) -> Result<Backup> {
    engine
        .get_backups(preset)
        .into_iter()
        .find(|b| b.file_name() == archive || b.path == Path::new(archive))
        .with_context(|| format!("No backup '{archive}' found for preset '{}'", preset.name))
}
