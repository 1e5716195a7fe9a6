use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn harvest_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("harvest");
    path
}

/// Config whose raw host is a closed local port, so every fetch fails fast.
fn setup_test_env(backend: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[[sources]]
owner = "acme"
repo = "prompts"

[[sources]]
owner = "acme"
repo = "translated"
primary_file = "README_en.md"

[fetch]
raw_base_url = "http://127.0.0.1:9"
timeout_secs = 2

[store]
backend = "{}"
db_path = "{}/data/harvest.sqlite"
batch_delay_ms = 0
"#,
        backend,
        root.display()
    );

    let config_path = config_dir.join("harvest.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_harvest(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    run_harvest_with_env(config_path, args, &[])
}

fn run_harvest_with_env(
    config_path: &Path,
    args: &[&str],
    envs: &[(&str, &str)],
) -> (String, String, bool) {
    let binary = harvest_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("AIRTABLE_API_KEY")
        .env_remove("AIRTABLE_BASE_ID")
        .env_remove("GITHUB_TOKEN")
        .env_remove("RUST_LOG")
        .envs(envs.iter().copied())
        .output()
        .unwrap_or_else(|e| panic!("Failed to run harvest binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_dry_run_needs_no_credentials() {
    let (_tmp, config_path) = setup_test_env("airtable");

    let (stdout, stderr, success) = run_harvest(&config_path, &["run"]);
    assert!(success, "dry-run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("harvest (dry-run)"));
    // Unreachable sources are reported, not fatal.
    assert!(stdout.contains("acme/prompts  FAILED"));
    assert!(stdout.contains("sources: 0 scraped, 2 failed"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_live_without_credentials_is_fatal() {
    let (_tmp, config_path) = setup_test_env("airtable");

    let (stdout, stderr, success) = run_harvest(&config_path, &["run", "--live"]);
    assert!(!success, "live run should fail: stdout={}", stdout);
    assert!(stderr.contains("AIRTABLE_API_KEY"), "stderr={}", stderr);
    assert!(!stdout.contains("totals"));
}

#[test]
fn test_unknown_source_is_fatal() {
    let (_tmp, config_path) = setup_test_env("airtable");

    let (_, stderr, success) = run_harvest(&config_path, &["run", "--source", "nobody/nothing"]);
    assert!(!success);
    assert!(stderr.contains("unknown source"), "stderr={}", stderr);
}

#[test]
fn test_source_filter_runs_one_source() {
    let (_tmp, config_path) = setup_test_env("airtable");

    let (stdout, stderr, success) =
        run_harvest(&config_path, &["run", "--source", "acme/translated"]);
    assert!(success, "stderr={}", stderr);
    assert!(stdout.contains("acme/translated  FAILED"));
    assert!(!stdout.contains("acme/prompts"));
    assert!(stdout.contains("main/README_en.md"));
}

#[test]
fn test_sources_lists_candidates() {
    let (_tmp, config_path) = setup_test_env("airtable");

    let (stdout, _, success) = run_harvest(&config_path, &["sources"]);
    assert!(success);
    assert!(stdout.contains("SOURCE"));
    assert!(stdout.contains("acme/prompts"));
    assert!(stdout.contains("main/README.md, master/README.md"));
    assert!(stdout.contains("primary+localized"));
}

#[test]
fn test_schema_prints_json() {
    let (_tmp, config_path) = setup_test_env("airtable");

    let (stdout, _, success) = run_harvest(&config_path, &["schema"]);
    assert!(success);
    let schema: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(schema["name"], "NanoBanana");
    assert!(schema["fields"]
        .as_array()
        .unwrap()
        .iter()
        .any(|f| f["name"] == "Fingerprint"));
}

#[test]
fn test_init_sqlite_idempotent() {
    let (tmp, config_path) = setup_test_env("sqlite");

    let (stdout, stderr, success1) = run_harvest(&config_path, &["init"]);
    assert!(success1, "First init failed: {}", stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/harvest.sqlite").exists());

    let (_, _, success2) = run_harvest(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_live_sqlite_run_survives_failed_sources() {
    let (_tmp, config_path) = setup_test_env("sqlite");

    let (stdout, stderr, success) = run_harvest(&config_path, &["run", "--live"]);
    assert!(success, "stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.starts_with("harvest\n"));
    assert!(stdout.contains("persisted: 0 created in 0 calls"));
    assert!(stdout.contains("failed batches: 0"));
}

#[test]
fn test_output_json_written_in_dry_run() {
    let (tmp, config_path) = setup_test_env("airtable");
    let out = tmp.path().join("exports/new.json");

    let (_, stderr, success) = run_harvest(
        &config_path,
        &["run", "--output-json", out.to_str().unwrap()],
    );
    assert!(success, "stderr={}", stderr);
    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(value["mode"], "dry-run");
    assert_eq!(value["count"], 0);
}

#[test]
fn test_output_csv_written_with_header_only_when_nothing_is_new() {
    let (tmp, config_path) = setup_test_env("airtable");
    let out = tmp.path().join("exports/cases.csv");

    let (_, stderr, success) = run_harvest(
        &config_path,
        &["run", "--output-csv", out.to_str().unwrap(), "--export-all"],
    );
    assert!(success, "stderr={}", stderr);
    let content = fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("fingerprint,title,prompt_text,author,"));
    assert!(stderr.contains("Exported 0 records to"));
}

#[test]
fn test_export_all_is_recorded_in_json_scope() {
    let (tmp, config_path) = setup_test_env("airtable");
    let out = tmp.path().join("all.json");

    let (_, stderr, success) = run_harvest(
        &config_path,
        &["run", "--export-all", "--output-json", out.to_str().unwrap()],
    );
    assert!(success, "stderr={}", stderr);
    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(value["scope"], "all");
}

#[test]
fn test_rust_log_raises_log_level() {
    let (_tmp, config_path) = setup_test_env("airtable");

    let (_, quiet_stderr, success) =
        run_harvest(&config_path, &["--progress", "off", "run"]);
    assert!(success, "stderr={}", quiet_stderr);
    assert!(!quiet_stderr.contains("run state"));

    let (_, stderr, success) = run_harvest_with_env(
        &config_path,
        &["--progress", "off", "run"],
        &[("RUST_LOG", "prompt_harvest=debug")],
    );
    assert!(success, "stderr={}", stderr);
    assert!(stderr.contains("run state"), "stderr={}", stderr);
}

#[test]
fn test_missing_explicit_config_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_harvest(&tmp.path().join("absent.toml"), &["sources"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
