use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn judge_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("judge");
    path
}

const RULES: &str = "\
Magic: The Gathering Comprehensive Rules

100. General

100.1. These Magic rules apply to any Magic game with two or more players.

100.1a A two-player game is a game that begins with only two players.

101.1. Whenever a card's text directly contradicts these rules, the card takes precedence.
";

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(root.join("rules.txt"), RULES).unwrap();

    let config_content = format!(
        r#"[index]
path = "{}/data/index.sqlite"

[retrieval]
top_k = 5

[llm]
api_key_env = "MTG_JUDGE_CLI_TEST_KEY"
"#,
        root.display()
    );

    let config_path = config_dir.join("judge.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_judge(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = judge_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run judge binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_index_file() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_judge(&config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Index initialized"));
    assert!(tmp.path().join("data/index.sqlite").exists());

    // Idempotent
    let (_, stderr, success) = run_judge(&config_path, &["init"]);
    assert!(success, "second init failed: {}", stderr);
}

#[test]
fn test_stats_on_empty_index() {
    let (_tmp, config_path) = setup_test_env();
    run_judge(&config_path, &["init"]);

    let (stdout, stderr, success) = run_judge(&config_path, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("Segments:    0"));
    assert!(stdout.contains("Model:       -"));
}

#[test]
fn test_ask_without_index_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_judge(&config_path, &["ask", "How does trample work?"]);
    assert!(!success);
    assert!(
        stderr.contains("vector index unavailable"),
        "unexpected stderr: {}",
        stderr
    );
}

#[test]
fn test_ask_with_uninitialized_schema_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_judge(&config_path, &["init"]);

    let (_, stderr, success) = run_judge(&config_path, &["ask", "How does trample work?"]);
    assert!(!success);
    assert!(stderr.contains("index metadata missing"), "unexpected stderr: {}", stderr);
}

#[test]
fn test_index_build_dry_run() {
    let (tmp, config_path) = setup_test_env();
    let rules = tmp.path().join("rules.txt");

    let (stdout, stderr, success) = run_judge(
        &config_path,
        &["index", "build", "--rules", rules.to_str().unwrap(), "--dry-run"],
    );
    assert!(success, "dry run failed: {}", stderr);
    assert!(stdout.contains("segments: 3"), "unexpected stdout: {}", stdout);
    assert!(!tmp.path().join("data/index.sqlite").exists());
}

#[test]
fn test_index_build_requires_embeddings() {
    let (tmp, config_path) = setup_test_env();
    let rules = tmp.path().join("rules.txt");

    let (_, stderr, success) = run_judge(
        &config_path,
        &["index", "build", "--rules", rules.to_str().unwrap()],
    );
    assert!(!success);
    assert!(stderr.contains("Embedding provider is disabled"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_judge(&tmp.path().join("nope.toml"), &["stats"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
