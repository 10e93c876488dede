use assert_cmd::Command;
use predicates::prelude::*;

fn vasimport(home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("vasimport").unwrap();
    cmd.env("HOME", home).env("RUST_LOG", "warn").env("NO_COLOR", "1");
    cmd
}

#[test]
fn help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    vasimport(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("inspect"));
}

#[test]
fn init_creates_layout() {
    let home = tempfile::tempdir().unwrap();
    let data = home.path().join("data");
    vasimport(home.path())
        .args(["init", "--data-dir", data.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized vasimport"));

    assert!(data.join("vasimport.db").exists());
    assert!(data.join("input").is_dir());
    assert!(data.join("public").is_dir());
    assert!(data.join("errors").is_dir());
    assert!(home.path().join(".config/vasimport/settings.json").exists());
}

#[test]
fn import_with_empty_input_reports_nothing() {
    let home = tempfile::tempdir().unwrap();
    let data = home.path().join("data");
    vasimport(home.path())
        .args(["init", "--data-dir", data.to_str().unwrap()])
        .assert()
        .success();

    vasimport(home.path())
        .args(["import", "--kind", "parking"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 files processed"));
}

#[test]
fn unknown_kind_fails() {
    let home = tempfile::tempdir().unwrap();
    let data = home.path().join("data");
    vasimport(home.path())
        .args(["init", "--data-dir", data.to_str().unwrap()])
        .assert()
        .success();

    vasimport(home.path())
        .args(["import", "--kind", "bus"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown provider kind"));
}

#[test]
fn status_before_init_points_at_init() {
    let home = tempfile::tempdir().unwrap();
    vasimport(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("vasimport init"));
}

#[test]
fn import_help_describes_user_as_id() {
    let home = tempfile::tempdir().unwrap();
    vasimport(home.path())
        .args(["import", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("User id recorded as the actor"))
        .stdout(predicate::str::contains("email").not());
}
