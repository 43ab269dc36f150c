use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn lectern_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("lectern");
    path
}

const RUST_COURSE: &str = "\
Title: Introduction to Rust
Link: https://example.com/rust
Instructor: Ada Lopez

Lesson 1: Getting Started
Link: https://example.com/rust/lesson-1
Rust is a systems programming language focused on safety and speed.
The cargo tool builds projects, runs tests, and manages dependencies.

Lesson 2: Ownership and Borrowing
Ownership rules govern how memory is managed in Rust programs.
Each value has a single owner, and borrows are checked at compile time.
";

const DB_COURSE: &str = "\
Title: Database Fundamentals
Instructor: Grace Chen

Lesson 1: Relational Models
Tables store rows and columns. Primary keys identify each row uniquely.

Lesson 2: Writing Queries
The SELECT statement retrieves rows. Joins combine tables by shared keys.
";

// No Title: header, so ingestion must reject it.
const MALFORMED_DOC: &str = "\
These are stray notes without any course header.
Folder ingestion should skip this file and keep going.
";

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    // Create config
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    // Create course documents
    let docs_dir = root.join("docs");
    fs::create_dir_all(&docs_dir).unwrap();
    fs::write(docs_dir.join("rust.txt"), RUST_COURSE).unwrap();
    fs::write(docs_dir.join("databases.txt"), DB_COURSE).unwrap();
    fs::write(docs_dir.join("notes.txt"), MALFORMED_DOC).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/lectern.sqlite"

[chunking]
chunk_size = 800
chunk_overlap = 100

[retrieval]
max_results = 5
resolve_threshold = 0.3

[embedding]
provider = "hash"
dims = 256

[server]
bind = "127.0.0.1:7431"

[corpus]
dir = "{}/docs"
include_globs = ["**/*.txt"]
exclude_globs = []
"#,
        root.display(),
        root.display()
    );

    let config_path = config_dir.join("lectern.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_lectern(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = lectern_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run lectern binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_lectern(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data").join("lectern.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    // Run init twice
    let (_, _, success1) = run_lectern(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_lectern(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_folder() {
    let (_tmp, config_path) = setup_test_env();

    run_lectern(&config_path, &["init"]);
    let (stdout, stderr, success) = run_lectern(&config_path, &["ingest"]);
    assert!(
        success,
        "ingest failed: stdout={}, stderr={}",
        stdout, stderr
    );
    assert!(stdout.contains("files found: 3"));
    assert!(stdout.contains("courses added: 2"));
    assert!(stdout.contains("chunks written: 4"));
    assert!(stdout.contains("errors: 1"), "malformed doc should be counted, got: {}", stdout);
    assert!(stdout.contains("notes.txt"), "error line should name the file, got: {}", stdout);
    assert!(stdout.contains("ok"));
}

#[test]
fn test_ingest_folder_skips_existing() {
    let (_tmp, config_path) = setup_test_env();

    run_lectern(&config_path, &["init"]);
    let (stdout1, _, _) = run_lectern(&config_path, &["ingest"]);
    assert!(stdout1.contains("courses added: 2"));

    // Second pass finds both courses already present
    let (stdout2, _, success) = run_lectern(&config_path, &["ingest"]);
    assert!(success);
    assert!(stdout2.contains("courses added: 0"));
    assert!(stdout2.contains("courses skipped: 2"));
}

#[test]
fn test_ingest_clear_reloads_everything() {
    let (_tmp, config_path) = setup_test_env();

    run_lectern(&config_path, &["init"]);
    run_lectern(&config_path, &["ingest"]);

    let (stdout, _, success) = run_lectern(&config_path, &["ingest", "--clear"]);
    assert!(success);
    assert!(stdout.contains("cleared existing courses"));
    assert!(stdout.contains("courses added: 2"));
    assert!(stdout.contains("courses skipped: 0"));
}

#[test]
fn test_ingest_dry_run_writes_nothing() {
    let (_tmp, config_path) = setup_test_env();

    run_lectern(&config_path, &["init"]);
    let (stdout, _, success) = run_lectern(&config_path, &["ingest", "--dry-run"]);
    assert!(success);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("files found: 3"));
    assert!(stdout.contains("courses to add: 2"));
    assert!(stdout.contains("errors: 1"));

    let (stdout, _, _) = run_lectern(&config_path, &["courses"]);
    assert!(
        stdout.contains("No courses available."),
        "dry-run must not write, got: {}",
        stdout
    );
}

#[test]
fn test_ingest_single_file() {
    let (tmp, config_path) = setup_test_env();

    run_lectern(&config_path, &["init"]);
    let rust_doc = tmp.path().join("docs").join("rust.txt");
    let (stdout, stderr, success) =
        run_lectern(&config_path, &["ingest", rust_doc.to_str().unwrap()]);
    assert!(
        success,
        "single-file ingest failed: stdout={}, stderr={}",
        stdout, stderr
    );
    assert!(stdout.contains("course: Introduction to Rust"));
    assert!(stdout.contains("lessons: 2"));
    assert!(stdout.contains("chunks written: 2"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_ingest_single_file_replaces() {
    let (tmp, config_path) = setup_test_env();

    run_lectern(&config_path, &["init"]);
    let rust_doc = tmp.path().join("docs").join("rust.txt");
    run_lectern(&config_path, &["ingest", rust_doc.to_str().unwrap()]);

    // Re-ingesting the same title replaces the course, even though a folder
    // scan would have skipped it
    let updated = format!("{}\nLesson 3: Lifetimes\nLifetimes tie borrows to scopes.\n", RUST_COURSE);
    fs::write(&rust_doc, updated).unwrap();
    let (stdout, _, success) = run_lectern(&config_path, &["ingest", rust_doc.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("lessons: 3"));

    let (stdout, _, _) = run_lectern(&config_path, &["lessons", "Introduction to Rust"]);
    assert!(
        stdout.contains("Lesson 3: Lifetimes"),
        "replacement should be visible, got: {}",
        stdout
    );

    let (stdout, _, _) = run_lectern(&config_path, &["courses"]);
    assert!(
        stdout.contains("Courses (1):"),
        "replacement must not duplicate the course, got: {}",
        stdout
    );
}

#[test]
fn test_courses_listing() {
    let (_tmp, config_path) = setup_test_env();

    run_lectern(&config_path, &["init"]);
    run_lectern(&config_path, &["ingest"]);

    let (stdout, _, success) = run_lectern(&config_path, &["courses"]);
    assert!(success);
    assert!(stdout.contains("Courses (2):"));
    assert!(stdout.contains("Introduction to Rust (2 lessons)"));
    assert!(stdout.contains("Database Fundamentals (2 lessons)"));
    assert!(stdout.contains("instructor: Ada Lopez"));
    assert!(stdout.contains("link: https://example.com/rust"));
}

#[test]
fn test_courses_empty() {
    let (_tmp, config_path) = setup_test_env();

    run_lectern(&config_path, &["init"]);
    let (stdout, _, success) = run_lectern(&config_path, &["courses"]);
    assert!(success);
    assert!(stdout.contains("No courses available."));
}

#[test]
fn test_lessons_fuzzy_name() {
    let (_tmp, config_path) = setup_test_env();

    run_lectern(&config_path, &["init"]);
    run_lectern(&config_path, &["ingest"]);

    // Partial name resolves against the catalog
    let (stdout, _, success) = run_lectern(&config_path, &["lessons", "intro rust"]);
    assert!(success);
    assert!(stdout.contains("Course: Introduction to Rust"));
    assert!(stdout.contains("Instructor: Ada Lopez"));
    assert!(stdout.contains("Lesson 1: Getting Started"));
    assert!(stdout.contains("Lesson 2: Ownership and Borrowing"));
}

#[test]
fn test_lessons_exact_title() {
    let (_tmp, config_path) = setup_test_env();

    run_lectern(&config_path, &["init"]);
    run_lectern(&config_path, &["ingest"]);

    let (stdout, _, success) = run_lectern(&config_path, &["lessons", "Database Fundamentals"]);
    assert!(success);
    assert!(stdout.contains("Course: Database Fundamentals"));
    assert!(stdout.contains("Instructor: Grace Chen"));
    assert!(stdout.contains("Lesson 1: Relational Models"));
}

#[test]
fn test_lessons_unknown_course() {
    let (_tmp, config_path) = setup_test_env();

    run_lectern(&config_path, &["init"]);
    run_lectern(&config_path, &["ingest"]);

    let (stdout, _, success) = run_lectern(&config_path, &["lessons", "xyzzyq"]);
    assert!(success, "an unmatched name reports, it does not fail");
    assert!(
        stdout.contains("No course found matching 'xyzzyq'"),
        "got: {}",
        stdout
    );
}

#[test]
fn test_search_scoped_to_course() {
    let (_tmp, config_path) = setup_test_env();

    run_lectern(&config_path, &["init"]);
    run_lectern(&config_path, &["ingest"]);

    let (stdout, _, success) = run_lectern(
        &config_path,
        &["search", "ownership and borrowing", "--course", "intro rust"],
    );
    assert!(success, "search failed");
    assert!(
        stdout.contains("Introduction to Rust - Lesson 2"),
        "Expected the ownership lesson in results, got: {}",
        stdout
    );
    assert!(
        !stdout.contains("Database Fundamentals"),
        "course filter leaked, got: {}",
        stdout
    );
    assert!(stdout.contains("excerpt:"));
}

#[test]
fn test_search_lesson_filter() {
    let (_tmp, config_path) = setup_test_env();

    run_lectern(&config_path, &["init"]);
    run_lectern(&config_path, &["ingest"]);

    let (stdout, _, success) = run_lectern(
        &config_path,
        &[
            "search",
            "rust",
            "--course",
            "intro rust",
            "--lesson",
            "1",
        ],
    );
    assert!(success);
    assert!(stdout.contains("Lesson 1 (chunk"));
    assert!(!stdout.contains("Lesson 2 (chunk"));
}

#[test]
fn test_search_deterministic() {
    let (_tmp, config_path) = setup_test_env();

    run_lectern(&config_path, &["init"]);
    run_lectern(&config_path, &["ingest"]);

    let (stdout1, _, _) = run_lectern(&config_path, &["search", "rows and columns"]);
    let (stdout2, _, _) = run_lectern(&config_path, &["search", "rows and columns"]);
    assert_eq!(
        stdout1, stdout2,
        "Search results should be deterministic across runs"
    );
}

#[test]
fn test_search_empty_query() {
    let (_tmp, config_path) = setup_test_env();

    run_lectern(&config_path, &["init"]);
    let (stdout, _, success) = run_lectern(&config_path, &["search", ""]);
    assert!(success, "Empty query should not panic");
    assert!(stdout.contains("No results"));
}

#[test]
fn test_search_empty_index() {
    let (_tmp, config_path) = setup_test_env();

    run_lectern(&config_path, &["init"]);
    let (stdout, _, success) = run_lectern(&config_path, &["search", "anything at all"]);
    assert!(success);
    assert!(stdout.contains("No results"));
}

#[test]
fn test_search_unknown_course_filter() {
    let (_tmp, config_path) = setup_test_env();

    run_lectern(&config_path, &["init"]);
    run_lectern(&config_path, &["ingest"]);

    let (stdout, _, success) =
        run_lectern(&config_path, &["search", "ownership", "--course", "xyzzyq"]);
    assert!(success);
    assert!(
        stdout.contains("No course found matching 'xyzzyq'"),
        "got: {}",
        stdout
    );
}

#[test]
fn test_ask_errors_when_chat_disabled() {
    let (_tmp, config_path) = setup_test_env();

    run_lectern(&config_path, &["init"]);
    run_lectern(&config_path, &["ingest"]);

    let (_, stderr, success) = run_lectern(&config_path, &["ask", "What is ownership?"]);
    assert!(!success, "ask without a chat provider should fail");
    assert!(
        stderr.contains("disabled"),
        "Should mention disabled, got: {}",
        stderr
    );
}

#[test]
fn test_ingest_missing_path() {
    let (tmp, config_path) = setup_test_env();

    run_lectern(&config_path, &["init"]);
    let missing = tmp.path().join("nope");
    let (_, stderr, success) = run_lectern(&config_path, &["ingest", missing.to_str().unwrap()]);
    assert!(!success, "ingest of a missing path should fail");
    assert!(
        stderr.contains("does not exist"),
        "Should report missing path, got: {}",
        stderr
    );
}
