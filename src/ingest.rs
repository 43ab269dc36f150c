//! Course ingestion pipeline.
//!
//! Coordinates the flow from raw documents to the store: read → parse →
//! chunk → embed → replace. Single files always replace whatever course
//! carries their title; folder runs skip titles that already exist, so
//! re-running over a corpus directory is cheap and idempotent. One bad
//! file in a folder spoils only itself: it is reported and counted, and
//! the run continues.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::db;
use crate::models::Course;
use crate::parse::parse_document;
use crate::store::CourseStore;

/// Outcome counts for one folder run.
#[derive(Debug, Default)]
pub struct FolderReport {
    pub files_found: usize,
    pub courses_added: usize,
    pub courses_skipped: usize,
    pub chunks_written: usize,
    pub errors: usize,
}

/// Parse one raw course document and store it, replacing any existing
/// course with the same title. Returns the course and its chunk count.
pub async fn ingest_document(
    store: &CourseStore,
    config: &Config,
    raw: &str,
) -> Result<(Course, usize)> {
    let parsed = parse_document(raw, &config.chunking)?;
    let chunk_count = parsed.chunks.len();
    store.upsert_course(&parsed).await?;
    Ok((parsed.course, chunk_count))
}

/// Ingest every matching file under `dir`, skipping courses whose titles
/// are already in the catalog.
pub async fn ingest_folder(
    store: &CourseStore,
    config: &Config,
    dir: &Path,
) -> Result<FolderReport> {
    let files = collect_course_files(config, dir)?;
    let mut report = FolderReport {
        files_found: files.len(),
        ..FolderReport::default()
    };

    for file in &files {
        let raw = match std::fs::read_to_string(file) {
            Ok(raw) => raw,
            Err(e) => {
                println!("  error: {}: {}", file.display(), e);
                report.errors += 1;
                continue;
            }
        };

        let parsed = match parse_document(&raw, &config.chunking) {
            Ok(parsed) => parsed,
            Err(e) => {
                println!("  error: {}: {}", file.display(), e);
                report.errors += 1;
                continue;
            }
        };

        if store.course_exists(&parsed.course.title).await? {
            report.courses_skipped += 1;
            continue;
        }

        let chunk_count = parsed.chunks.len();
        store.upsert_course(&parsed).await?;
        report.courses_added += 1;
        report.chunks_written += chunk_count;
    }

    Ok(report)
}

/// Matching files under `dir`, in deterministic path order.
///
/// Include and exclude globs come from `[corpus]` when configured,
/// otherwise every `*.txt` file matches. Globs match paths relative
/// to `dir`.
pub fn collect_course_files(config: &Config, dir: &Path) -> Result<Vec<PathBuf>> {
    let (include, exclude) = build_globs(config)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        if !include.is_match(rel) {
            continue;
        }
        if exclude.is_match(rel) {
            continue;
        }
        files.push(entry.path().to_path_buf());
    }

    Ok(files)
}

fn build_globs(config: &Config) -> Result<(GlobSet, GlobSet)> {
    let default_includes = vec!["**/*.txt".to_string()];
    let no_excludes: Vec<String> = Vec::new();
    let (includes, excludes) = match &config.corpus {
        Some(corpus) => (&corpus.include_globs, &corpus.exclude_globs),
        None => (&default_includes, &no_excludes),
    };

    let mut include_builder = GlobSetBuilder::new();
    for glob in includes {
        include_builder.add(Glob::new(glob).with_context(|| format!("Invalid glob: {}", glob))?);
    }
    let mut exclude_builder = GlobSetBuilder::new();
    for glob in excludes {
        exclude_builder.add(Glob::new(glob).with_context(|| format!("Invalid glob: {}", glob))?);
    }

    Ok((include_builder.build()?, exclude_builder.build()?))
}

/// The `ingest` command: load one file or a whole folder into the store.
pub async fn run_ingest(
    config: &Config,
    path: Option<PathBuf>,
    clear: bool,
    dry_run: bool,
) -> Result<()> {
    let target = match path {
        Some(p) => p,
        None => match &config.corpus {
            Some(corpus) => corpus.dir.clone(),
            None => bail!("No path given and no [corpus] directory configured"),
        },
    };

    let pool = db::connect(config).await?;
    let store = CourseStore::new(pool, config)?;

    if target.is_dir() {
        if dry_run {
            dry_run_folder(&store, config, &target).await?;
        } else {
            if clear {
                store.clear_all().await?;
                println!("cleared existing courses");
            }
            let report = ingest_folder(&store, config, &target).await?;
            println!("ingest {}", target.display());
            println!("  files found: {}", report.files_found);
            println!("  courses added: {}", report.courses_added);
            println!("  courses skipped: {}", report.courses_skipped);
            println!("  chunks written: {}", report.chunks_written);
            println!("  errors: {}", report.errors);
            println!("ok");
        }
    } else if target.is_file() {
        let raw = std::fs::read_to_string(&target)
            .with_context(|| format!("Failed to read {}", target.display()))?;

        if dry_run {
            let parsed = parse_document(&raw, &config.chunking)?;
            println!("ingest {} (dry-run)", target.display());
            println!("  course: {}", parsed.course.title);
            println!("  lessons: {}", parsed.course.lessons.len());
            println!("  estimated chunks: {}", parsed.chunks.len());
        } else {
            if clear {
                store.clear_all().await?;
                println!("cleared existing courses");
            }
            let (course, chunk_count) = ingest_document(&store, config, &raw).await?;
            println!("ingest {}", target.display());
            println!("  course: {}", course.title);
            println!("  lessons: {}", course.lessons.len());
            println!("  chunks written: {}", chunk_count);
            println!("ok");
        }
    } else {
        bail!("Path does not exist: {}", target.display());
    }

    store.pool().close().await;
    Ok(())
}

async fn dry_run_folder(store: &CourseStore, config: &Config, dir: &Path) -> Result<()> {
    let files = collect_course_files(config, dir)?;
    let mut would_add = 0usize;
    let mut would_skip = 0usize;
    let mut estimated_chunks = 0usize;
    let mut errors = 0usize;

    for file in &files {
        let raw = match std::fs::read_to_string(file) {
            Ok(raw) => raw,
            Err(e) => {
                println!("  error: {}: {}", file.display(), e);
                errors += 1;
                continue;
            }
        };
        let parsed = match parse_document(&raw, &config.chunking) {
            Ok(parsed) => parsed,
            Err(e) => {
                println!("  error: {}: {}", file.display(), e);
                errors += 1;
                continue;
            }
        };
        if store.course_exists(&parsed.course.title).await? {
            would_skip += 1;
        } else {
            would_add += 1;
            estimated_chunks += parsed.chunks.len();
        }
    }

    println!("ingest {} (dry-run)", dir.display());
    println!("  files found: {}", files.len());
    println!("  courses to add: {}", would_add);
    println!("  courses to skip: {}", would_skip);
    println!("  estimated chunks: {}", estimated_chunks);
    println!("  errors: {}", errors);
    Ok(())
}
