// End-to-end tests of the yabu binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_config(dir: &Path, target: &Path, dest: &Path) -> std::path::PathBuf {
    let config = dir.join("presets.json");
    let contents = format!(
        r#"{{ "format": 1, "presets": {{ "docs": {{
            "targets": ["{}"],
            "destinations": [{{ "path": "{}", "max_backup_count": 2,
                "date_format": "%Y%m%d%H%M%S", "name_separator": "-" }}] }} }} }}"#,
        target.display(),
        dest.display()
    );
    fs::write(&config, contents).unwrap();
    config
}

#[test]
fn list_shows_configured_presets() {
    let tmp = TempDir::new().unwrap();
    let notes = tmp.path().join("notes");
    fs::create_dir_all(&notes).unwrap();
    let config = write_config(tmp.path(), &notes, &tmp.path().join("backup"));

    Command::cargo_bin("yabu")
        .unwrap()
        .args(["--config"])
        .arg(&config)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("docs"));
}

#[test]
fn list_fails_on_missing_config() {
    let tmp = TempDir::new().unwrap();
    Command::cargo_bin("yabu")
        .unwrap()
        .args(["--config"])
        .arg(tmp.path().join("nope.json"))
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load presets"));
}

#[test]
fn backup_creates_an_archive() {
    let tmp = TempDir::new().unwrap();
    let notes = tmp.path().join("notes");
    fs::create_dir_all(&notes).unwrap();
    fs::write(notes.join("a.txt"), b"alpha").unwrap();
    let dest = tmp.path().join("backup");
    let config = write_config(tmp.path(), &notes, &dest);

    Command::cargo_bin("yabu")
        .unwrap()
        .args(["--config"])
        .arg(&config)
        .args(["backup", "docs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created"));

    let archives: Vec<_> = fs::read_dir(&dest)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".zip"))
        .collect();
    assert_eq!(archives.len(), 1);
    assert!(archives[0]
        .file_name()
        .to_string_lossy()
        .starts_with("notes-"));
}

#[test]
fn backups_lists_created_archives() {
    let tmp = TempDir::new().unwrap();
    let notes = tmp.path().join("notes");
    fs::create_dir_all(&notes).unwrap();
    fs::write(notes.join("a.txt"), b"alpha").unwrap();
    let dest = tmp.path().join("backup");
    let config = write_config(tmp.path(), &notes, &dest);

    Command::cargo_bin("yabu")
        .unwrap()
        .args(["--config"])
        .arg(&config)
        .args(["backup", "docs"])
        .assert()
        .success();

    Command::cargo_bin("yabu")
        .unwrap()
        .args(["--config"])
        .arg(&config)
        .args(["backups", "docs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("notes-"));
}

#[test]
fn show_prints_preset_details() {
    let tmp = TempDir::new().unwrap();
    let notes = tmp.path().join("notes");
    fs::create_dir_all(&notes).unwrap();
    let config = write_config(tmp.path(), &notes, &tmp.path().join("backup"));

    Command::cargo_bin("yabu")
        .unwrap()
        .args(["--config"])
        .arg(&config)
        .args(["show", "docs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Targets:"))
        .stdout(predicate::str::contains("Max Backup Count: 2"));
}
