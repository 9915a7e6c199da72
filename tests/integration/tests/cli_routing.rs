//! CLI binary integration tests.
//!
//! These tests exercise the compiled `credstore` binary to verify command
//! routing, output, and error handling against a store in a temp directory.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// Locate the compiled `credstore` binary in the workspace target directory.
///
/// Cargo sets `CARGO_MANIFEST_DIR` to the manifest directory of the package
/// being tested. We navigate up to the workspace root and look inside
/// `target/debug/`.
fn credstore_bin() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    // tests/integration -> workspace root
    let workspace_root = manifest_dir
        .parent()
        .expect("tests/ parent")
        .parent()
        .expect("workspace root");
    let bin = workspace_root.join("target").join("debug").join("credstore");
    assert!(
        bin.exists(),
        "credstore binary not found at {}; run `cargo build -p credstore-cli` first",
        bin.display()
    );
    bin
}

/// Command isolated to `home`, with no inherited config or store overrides.
fn credstore_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(credstore_bin());
    cmd.env("CREDSTORE_HOME", home)
        .env_remove("CREDSTORE_CONFIG")
        .env_remove("CREDSTORE_STORE_DIR")
        .env_remove("CREDSTORE_LOG");
    cmd
}

fn run(home: &Path, args: &[&str]) -> Output {
    credstore_cmd(home)
        .args(args)
        .output()
        .expect("failed to run credstore")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_cli_version() {
    let home = TempDir::new().unwrap();
    let output = run(home.path(), &["version"]);
    assert!(output.status.success(), "version command should succeed");
    assert!(
        stdout(&output).contains("credstore"),
        "version output should contain 'credstore', got: {}",
        stdout(&output)
    );
}

#[test]
fn test_cli_help() {
    let home = TempDir::new().unwrap();
    let output = run(home.path(), &["--help"]);
    assert!(output.status.success(), "--help should succeed");
    let text = stdout(&output);
    for command in ["get", "set", "import", "clear", "rotate-key"] {
        assert!(
            text.contains(command),
            "help output should mention '{}', got: {}",
            command,
            text
        );
    }
}

#[test]
fn test_cli_unknown_command() {
    let home = TempDir::new().unwrap();
    let output = run(home.path(), &["nonexistent-command"]);
    assert!(
        !output.status.success(),
        "unknown command should return non-zero exit code"
    );
}

#[test]
fn test_cli_set_get_list_delete() {
    let home = TempDir::new().unwrap();

    let output = run(
        home.path(),
        &["set", "github", "--user", "octocat", "--password", "ghp_123"],
    );
    assert!(output.status.success(), "set failed: {:?}", output);

    let output = run(home.path(), &["get", "github"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "ghp_123");

    let output = run(home.path(), &["get", "github", "--user", "someone-else"]);
    assert!(!output.status.success(), "user mismatch should not match");

    let output = run(home.path(), &["list"]);
    let text = stdout(&output);
    assert!(text.contains("github"));
    assert!(text.contains("octocat"));
    assert!(!text.contains("ghp_123"), "list must not print passwords");

    let output = run(home.path(), &["delete", "github"]);
    assert!(output.status.success());
    let output = run(home.path(), &["get", "github"]);
    assert!(!output.status.success());
}

#[test]
fn test_cli_store_files_live_under_home() {
    let home = TempDir::new().unwrap();
    run(home.path(), &["set", "svc", "--password", "p"]);

    let store = home.path().join("store");
    assert!(store.join("credentials.db").exists());
    assert!(store.join("credentials.key").exists());

    let raw = std::fs::read(store.join("credentials.db")).unwrap();
    assert!(!raw.windows(3).any(|w| w == b"svc"));
}

#[test]
fn test_cli_missing_key_reports_recovery() {
    let home = TempDir::new().unwrap();
    run(home.path(), &["set", "svc", "--password", "p"]);
    std::fs::remove_file(home.path().join("store").join("credentials.key")).unwrap();

    let output = run(home.path(), &["get", "svc"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("credstore clear"), "got: {}", stderr);

    let output = run(home.path(), &["clear"]);
    assert!(output.status.success());
    assert!(!home.path().join("store").join("credentials.db").exists());

    let output = run(home.path(), &["list"]);
    assert!(stdout(&output).contains("No credentials stored."));
}

#[test]
fn test_cli_import_with_key_file() {
    let source_home = TempDir::new().unwrap();
    let home = TempDir::new().unwrap();
    run(source_home.path(), &["set", "backup-svc", "--password", "restored"]);
    run(home.path(), &["set", "local", "--password", "old"]);

    let source_db = source_home.path().join("store").join("credentials.db");
    let output = run(home.path(), &["import", source_db.to_str().unwrap()]);
    assert!(output.status.success(), "import failed: {:?}", output);
    assert!(stdout(&output).contains("Imported 1 credential(s)"));

    let output = run(home.path(), &["get", "backup-svc"]);
    assert_eq!(stdout(&output).trim(), "restored");
    let output = run(home.path(), &["get", "local"]);
    assert!(!output.status.success());
}

#[test]
fn test_cli_rotate_key_and_reset() {
    let home = TempDir::new().unwrap();
    run(home.path(), &["set", "svc", "--password", "p"]);
    let key_file = home.path().join("store").join("credentials.key");
    let before = std::fs::read(&key_file).unwrap();

    let output = run(home.path(), &["rotate-key"]);
    assert!(output.status.success(), "rotate failed: {:?}", output);
    assert_ne!(std::fs::read(&key_file).unwrap(), before);
    assert_eq!(stdout(&run(home.path(), &["get", "svc"])).trim(), "p");

    let output = run(home.path(), &["reset"]);
    assert!(output.status.success());
    assert!(!key_file.exists());
}

#[test]
fn test_cli_config_path_and_validate() {
    let home = TempDir::new().unwrap();
    let output = run(home.path(), &["config", "path"]);
    assert_eq!(
        stdout(&output).trim(),
        home.path().join("credstore.json5").display().to_string()
    );

    let output = run(home.path(), &["config", "init"]);
    assert!(output.status.success());
    let output = run(home.path(), &["config", "validate"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Configuration is valid"));
}
