//! Drive the `lodestar` binary against a scratch repository.

use std::path::Path;
use std::process::{Command, Output};

fn lodestar(repo: &Path, args: &[&str]) -> Output {
    let output = Command::new(env!("CARGO_BIN_EXE_lodestar"))
        .args(args)
        .arg("--path")
        .arg(repo)
        .env_remove("RUST_LOG")
        .env_remove("LODESTAR_LOG")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "lodestar {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

fn sample_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    std::fs::create_dir_all(&src).unwrap();
    std::fs::write(
        src.join("request.ts"),
        "export function parseRequest(raw: string) {\n  return JSON.parse(raw);\n}\n",
    )
    .unwrap();
    std::fs::write(
        src.join("response.ts"),
        "export function parseResponse(raw: string) {\n  return JSON.parse(raw);\n}\n",
    )
    .unwrap();
    std::fs::create_dir_all(dir.path().join("node_modules/dep")).unwrap();
    std::fs::write(
        dir.path().join("node_modules/dep/index.js"),
        "function parseRequest() {}",
    )
    .unwrap();
    dir
}

#[test]
fn index_then_search_json() {
    let repo = sample_repo();

    let stats = json(&lodestar(repo.path(), &["index", "--format", "json"]));
    assert_eq!(stats["files_scanned"], 2);
    assert_eq!(stats["files_updated"], 2);
    assert!(repo.path().join(".lodestar/index.db").exists());

    let again = json(&lodestar(repo.path(), &["index", "--format", "json"]));
    assert_eq!(again["files_updated"], 0);

    let hits = json(&lodestar(
        repo.path(),
        &["search", "parseRequest", "--mode", "lexical", "--format", "json"],
    ));
    assert_eq!(hits[0]["path"], "src/request.ts");
    assert_eq!(hits[0]["kind"], "lexical");
}

#[test]
fn search_with_index_flag_and_text_output() {
    let repo = sample_repo();
    let output = lodestar(repo.path(), &["search", "parseRequest", "--index", "--limit", "1"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("1. src/request.ts"), "unexpected output: {stdout}");
    assert!(!stdout.contains("2."));
}

#[test]
fn status_reports_counts() {
    let repo = sample_repo();
    lodestar(repo.path(), &["index"]);

    let summary = json(&lodestar(repo.path(), &["status", "--format", "json"]));
    assert_eq!(summary["files"], 2);
    assert_eq!(summary["embeddings"], 2);
    assert_eq!(summary["dimensions"], 256);
}

#[test]
fn status_without_index_fails() {
    let repo = tempfile::tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_lodestar"))
        .args(["status", "--path"])
        .arg(repo.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(!repo.path().join(".lodestar").exists());
}

#[test]
fn repo_config_changes_index_dir() {
    let repo = sample_repo();
    std::fs::write(
        repo.path().join(".lodestar.toml"),
        "[index]\ndir = \"cache/idx\"\ndimensions = 64\n",
    )
    .unwrap();

    let stats = json(&lodestar(repo.path(), &["index", "--format", "json"]));
    // The config file itself is hidden and not indexed.
    assert_eq!(stats["files_scanned"], 2);
    assert!(repo.path().join("cache/idx/index.db").exists());

    let summary = json(&lodestar(repo.path(), &["status", "--format", "json"]));
    assert_eq!(summary["dimensions"], 64);
}

#[test]
fn search_without_index_is_empty_and_writes_nothing() {
    let repo = sample_repo();
    let hits = json(&lodestar(
        repo.path(),
        &["search", "parseRequest", "--format", "json"],
    ));
    assert_eq!(hits, serde_json::json!([]));
    assert!(!repo.path().join(".lodestar").exists());
}

#[test]
fn search_at_another_dimension_leaves_vectors_alone() {
    let repo = sample_repo();
    lodestar(repo.path(), &["index"]);

    std::fs::write(
        repo.path().join(".lodestar.toml"),
        "[index]\ndimensions = 64\n",
    )
    .unwrap();
    let hits = json(&lodestar(
        repo.path(),
        &["search", "parseRequest", "--mode", "vector", "--format", "json"],
    ));
    assert_eq!(hits, serde_json::json!([]));
    let lexical = json(&lodestar(
        repo.path(),
        &["search", "parseRequest", "--mode", "lexical", "--format", "json"],
    ));
    assert_eq!(lexical[0]["path"], "src/request.ts");

    std::fs::remove_file(repo.path().join(".lodestar.toml")).unwrap();
    let summary = json(&lodestar(repo.path(), &["status", "--format", "json"]));
    assert_eq!(summary["embeddings"], 2);
    let hits = json(&lodestar(
        repo.path(),
        &["search", "parseRequest", "--mode", "vector", "--format", "json"],
    ));
    assert_eq!(hits[0]["path"], "src/request.ts");
}
