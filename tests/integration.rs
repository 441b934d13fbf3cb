use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const DOCUMENTS: &str = r#"[
    {
        "id": "pubmed-001",
        "title": "Mindfulness-Based Interventions for Anxiety: A Meta-Analysis",
        "abstract": "This meta-analysis examined mindfulness-based interventions for anxiety. Thirty-nine trials were pooled. Effects were moderate and consistent.",
        "authors": ["Smith, J.A.", "Lee, K."],
        "journal": "Journal of Clinical Psychology",
        "publicationDate": "2023-01-15",
        "studyType": "Meta-Analysis",
        "sampleSize": 3515
    },
    {
        "id": "pubmed-002",
        "title": "Yoga for Chronic Low Back Pain",
        "abstract": "Participants attended weekly yoga classes for twelve weeks. Pain scores improved compared with usual care.",
        "journal": "Annals of Internal Medicine",
        "publication_date": "2022-03-01",
        "study_type": "Randomized Controlled Trial",
        "sample_size": 200
    },
    {
        "id": "pubmed-003",
        "title": "A Record Without A Study Type",
        "abstract": "This record should be rejected.",
        "publicationDate": "2021-06-01"
    }
]"#;

fn wrag_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_wrag"))
}

fn setup_test_env() -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let documents_path = root.join("documents.json");
    fs::write(&documents_path, DOCUMENTS).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/wrag.sqlite"

[chunking]
max_chunk_size = 1000
overlap_size = 200

[retrieval]
match_threshold = 0.7
match_count = 10

[logging]
level = "warn"
"#,
        root.display()
    );

    let config_path = config_dir.join("wrag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path, documents_path)
}

fn run_wrag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = wrag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("OPENAI_API_KEY")
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run wrag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path, _) = setup_test_env();

    let (stdout, stderr, success) = run_wrag(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/wrag.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path, _) = setup_test_env();

    let (_, _, first) = run_wrag(&config_path, &["init"]);
    assert!(first, "First init failed");
    let (_, _, second) = run_wrag(&config_path, &["init"]);
    assert!(second, "Second init failed (not idempotent)");
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_wrag(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_ingest_dry_run_reports_without_writing() {
    let (tmp, config_path, documents) = setup_test_env();

    let (stdout, stderr, success) =
        run_wrag(&config_path, &["ingest", documents.to_str().unwrap(), "--dry-run"]);
    assert!(success, "dry run failed: {}", stderr);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("records: 3"));
    assert!(stdout.contains("valid documents: 2"));
    assert!(stdout.contains("rejected: 1"));
    assert!(stdout.contains("pubmed-003"));
    assert!(stdout.contains("estimated chunks: 2"));
    assert!(!tmp.path().join("data/wrag.sqlite").exists());
}

#[test]
fn test_ingest_stages_chunks_when_embedding_disabled() {
    let (_tmp, config_path, documents) = setup_test_env();

    run_wrag(&config_path, &["init"]);
    let (stdout, stderr, success) =
        run_wrag(&config_path, &["ingest", documents.to_str().unwrap()]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("stored documents: 2"));
    assert!(stdout.contains("chunks written: 2"));
    assert!(stdout.contains("chunks pending embedding: 2"));
    assert!(stdout.contains("rejected: 1"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_ingest_twice_does_not_duplicate() {
    let (_tmp, config_path, documents) = setup_test_env();

    run_wrag(&config_path, &["init"]);
    run_wrag(&config_path, &["ingest", documents.to_str().unwrap()]);
    run_wrag(&config_path, &["ingest", documents.to_str().unwrap()]);

    let (stdout, _, success) = run_wrag(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Documents:   2"), "got: {}", stdout);
    assert!(stdout.contains("Chunks:      2"), "got: {}", stdout);
}

#[test]
fn test_ingest_limit() {
    let (_tmp, config_path, documents) = setup_test_env();

    run_wrag(&config_path, &["init"]);
    let (stdout, _, success) = run_wrag(
        &config_path,
        &["ingest", documents.to_str().unwrap(), "--limit", "1"],
    );
    assert!(success);
    assert!(stdout.contains("records: 1"));
    assert!(stdout.contains("stored documents: 1"));
}

#[test]
fn test_stats_shows_study_type_breakdown() {
    let (_tmp, config_path, documents) = setup_test_env();

    run_wrag(&config_path, &["init"]);
    run_wrag(&config_path, &["ingest", documents.to_str().unwrap()]);

    let (stdout, stderr, success) = run_wrag(&config_path, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("Embedded:    0 / 2 (0%)"));
    assert!(stdout.contains("Meta-Analysis"));
    assert!(stdout.contains("Randomized Controlled Trial"));
}

#[test]
fn test_grade_json_output() {
    let (_tmp, config_path, documents) = setup_test_env();

    let (stdout, stderr, success) = run_wrag(
        &config_path,
        &["grade", documents.to_str().unwrap(), "--as-of-year", "2024", "--json"],
    );
    assert!(success, "grade failed: {}", stderr);

    let grade: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(grade["strength"], "Strong");
    assert_eq!(grade["score"], 100);
    assert_eq!(grade["factors"]["metaAnalysisPresent"], true);
    assert_eq!(grade["factors"]["rctPresent"], true);
    assert!(grade["reasoning"]
        .as_str()
        .unwrap()
        .starts_with("Meta-analysis provides highest level of evidence"));
}

#[test]
fn test_grade_human_output() {
    let (_tmp, config_path, documents) = setup_test_env();

    let (stdout, _, success) = run_wrag(
        &config_path,
        &["grade", documents.to_str().unwrap(), "--as-of-year", "2024"],
    );
    assert!(success);
    assert!(stdout.contains("Evidence: Strong (score 100/100)"));
    assert!(stdout.contains("Records rejected:    1"));
}

#[test]
fn test_health_with_providers_disabled() {
    let (_tmp, config_path, _) = setup_test_env();

    let (stdout, stderr, success) = run_wrag(&config_path, &["health", "--json"]);
    assert!(success, "health failed: {}", stderr);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["status"], "healthy");
    assert_eq!(report["database"], "ok");
    assert_eq!(report["embedding"], "disabled");
    assert_eq!(report["api_key_present"], false);
}

#[test]
fn test_search_requires_embedding_provider() {
    let (_tmp, config_path, documents) = setup_test_env();

    run_wrag(&config_path, &["init"]);
    run_wrag(&config_path, &["ingest", documents.to_str().unwrap()]);

    let (_, stderr, success) = run_wrag(&config_path, &["search", "Does mindfulness reduce anxiety?"]);
    assert!(!success);
    assert!(stderr.contains("disabled"), "got: {}", stderr);
}

#[test]
fn test_search_rejects_blank_query() {
    let (_tmp, config_path, _) = setup_test_env();

    run_wrag(&config_path, &["init"]);
    let (_, stderr, success) = run_wrag(&config_path, &["search", "   "]);
    assert!(!success);
    assert!(stderr.contains("query must not be empty"), "got: {}", stderr);
}

#[test]
fn test_search_rejects_unknown_study_type() {
    let (_tmp, config_path, _) = setup_test_env();

    run_wrag(&config_path, &["init"]);
    let (_, stderr, success) = run_wrag(
        &config_path,
        &["search", "sleep", "--study-type", "Anecdote"],
    );
    assert!(!success);
    assert!(stderr.contains("unknown study type"), "got: {}", stderr);
}

#[test]
fn test_reembed_requires_embedding_provider() {
    let (_tmp, config_path, _) = setup_test_env();

    run_wrag(&config_path, &["init"]);
    let (_, stderr, success) = run_wrag(&config_path, &["reembed"]);
    assert!(!success);
    assert!(stderr.contains("disabled"));
}

#[test]
fn test_reset_requires_confirmation() {
    let (_tmp, config_path, documents) = setup_test_env();

    run_wrag(&config_path, &["init"]);
    run_wrag(&config_path, &["ingest", documents.to_str().unwrap()]);

    let (_, stderr, success) = run_wrag(&config_path, &["reset"]);
    assert!(!success);
    assert!(stderr.contains("--yes"));

    let (stdout, stderr, success) = run_wrag(&config_path, &["reset", "--yes"]);
    assert!(success, "reset failed: {}", stderr);
    assert!(stdout.contains("Reset complete: removed 2 documents and 2 chunks"));

    let (stdout, _, _) = run_wrag(&config_path, &["stats"]);
    assert!(stdout.contains("Documents:   0"));
}
