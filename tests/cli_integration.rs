use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
    config: PathBuf,
}

fn workspace() -> Workspace {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("rflog.toml");
    fs::write(&config, "[search]\ntimezone = \"UTC\"\n").unwrap();

    let svc = dir.path().join("logs/svc");
    fs::create_dir_all(&svc).unwrap();
    fs::write(
        svc.join("app.log"),
        "2024-03-01 09:00:00 INFO start\n\
         2024-03-01 09:00:01 ERROR db timeout\n\
         2024-03-01 09:00:02 WARN slow\n\
         2024-03-01 09:00:03 ERROR db refused\n\
         2024-03-01 09:10:00 ERROR later\n",
    )
    .unwrap();

    Workspace { dir, config }
}

fn rflog(ws: &Workspace) -> Command {
    let mut cmd = Command::cargo_bin("rflog").unwrap();
    cmd.arg("--config").arg(&ws.config);
    cmd
}

fn base_dir(ws: &Workspace) -> &Path {
    ws.dir.path()
}

#[test]
fn test_search_prints_matching_lines() {
    let ws = workspace();

    rflog(&ws)
        .args(["search", "--start", "2024-03-01 09:00:00", "--end", "2024-03-01 09:05:00"])
        .arg("--base-dir")
        .arg(base_dir(&ws))
        .args(["ERROR", "logs/svc"])
        .assert()
        .success()
        .stdout(
            "2024-03-01 09:00:01 ERROR db timeout\n2024-03-01 09:00:03 ERROR db refused\n",
        );
}

#[test]
fn test_search_with_regex() {
    let ws = workspace();

    rflog(&ws)
        .args(["search", "--start", "2024-03-01 09:00:00", "--end", "2024-03-01 09:05:00"])
        .arg("--base-dir")
        .arg(base_dir(&ws))
        .args(["--regex", "WARN|refused$", "logs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("WARN slow"))
        .stdout(predicate::str::contains("ERROR db refused"))
        .stdout(predicate::str::contains("timeout").not());
}

#[test]
fn test_files_lists_candidates() {
    let ws = workspace();

    rflog(&ws)
        .args(["files", "--start", "2024-03-01 09:00:00", "--end", "2099-01-01 00:00:00"])
        .arg("--base-dir")
        .arg(base_dir(&ws))
        .arg("logs/svc")
        .assert()
        .success()
        .stdout(predicate::str::contains("app.log"));
}

#[test]
fn test_rejects_folders_outside_base_dir() {
    let ws = workspace();

    rflog(&ws)
        .args(["search", "--start", "2024-03-01 09:00:00", "--end", "2024-03-01 09:05:00"])
        .arg("--base-dir")
        .arg(base_dir(&ws).join("logs"))
        .args(["ERROR", "../logs"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid folder"));
}

#[test]
fn test_rejects_malformed_timestamps() {
    let ws = workspace();

    rflog(&ws)
        .args(["search", "--start", "2024-03-01T09:00:00", "--end", "2024-03-01 09:05:00"])
        .args(["ERROR", "logs"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid timestamp"));
}

#[test]
fn test_missing_folder_fails() {
    let ws = workspace();

    rflog(&ws)
        .args(["search", "--start", "2024-03-01 09:00:00", "--end", "2024-03-01 09:05:00"])
        .arg("--base-dir")
        .arg(base_dir(&ws))
        .args(["ERROR", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to list folder"));
}

#[test]
fn test_completions() {
    Command::cargo_bin("rflog")
        .unwrap()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rflog"));
}
