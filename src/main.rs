//! # Lectern CLI (`lectern`)
//!
//! The `lectern` binary is the primary interface for Lectern. It provides
//! commands for database initialization, course ingestion, catalog browsing,
//! content search, question answering, and starting the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! lectern --config ./config/lectern.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lectern init` | Create the SQLite database and run schema migrations |
//! | `lectern ingest [path]` | Ingest a course document or a folder of them |
//! | `lectern courses` | List all ingested courses |
//! | `lectern lessons <course>` | Show the lesson outline of a course |
//! | `lectern search "<query>"` | Search course content |
//! | `lectern ask "<query>"` | Ask a question and get a sourced answer |
//! | `lectern serve` | Start the HTTP API server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! lectern init --config ./config/lectern.toml
//!
//! # Ingest a folder of course documents
//! lectern ingest ./docs --config ./config/lectern.toml
//!
//! # Preview what a folder ingest would do
//! lectern ingest ./docs --dry-run --config ./config/lectern.toml
//!
//! # Search within one course
//! lectern search "ownership" --course rust --config ./config/lectern.toml
//!
//! # Ask a question (requires a chat provider)
//! lectern ask "What does lesson 2 cover?" --config ./config/lectern.toml
//!
//! # Start the HTTP API
//! lectern serve --config ./config/lectern.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use lectern::chat::create_chat_provider;
use lectern::orchestrator;
use lectern::session::SessionStore;
use lectern::store::CourseStore;
use lectern::{config, db, ingest, migrate, server};

/// Lectern CLI — a retrieval-augmented assistant for course materials.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/lectern.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "lectern",
    about = "Lectern — a retrieval-augmented assistant for course materials",
    version,
    long_about = "Lectern ingests structured course documents (Title/Lesson format), chunks and \
    embeds them into a SQLite index, and answers questions about them by driving a chat model \
    through retrieval tools. Answers cite the courses and lessons they came from."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/lectern.toml`. All database, chunking, embedding,
    /// chat, and server settings are read from this file.
    #[arg(long, global = true, default_value = "./config/lectern.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (courses, lessons, chunks, catalog_vectors, chunk_vectors).
    /// This command is idempotent — running it multiple times is safe.
    Init,

    /// Ingest a course document or a folder of documents.
    ///
    /// Parses each document's Title/Lesson structure, chunks the lesson
    /// bodies, embeds everything, and stores it in SQLite. A single file
    /// always replaces any existing course with the same title; a folder
    /// skips courses that are already ingested.
    ///
    /// Without a path, uses the `[corpus]` directory from the config file.
    Ingest {
        /// File or directory to ingest. Defaults to the configured corpus directory.
        path: Option<PathBuf>,

        /// Delete all existing courses before ingesting.
        #[arg(long)]
        clear: bool,

        /// Dry run — show course and chunk counts without writing to the database.
        #[arg(long)]
        dry_run: bool,
    },

    /// List all ingested courses.
    ///
    /// Shows each course title with its lesson count, instructor, and link.
    Courses,

    /// Show the lesson outline of a course.
    ///
    /// The course name is matched fuzzily against the catalog, so partial
    /// names like "rust" resolve to "Introduction to Rust".
    Lessons {
        /// Course name (exact or partial).
        course: String,
    },

    /// Search indexed course content.
    ///
    /// Embeds the query and returns the closest chunks with scores and
    /// excerpts. Filters narrow the search to one course or lesson.
    Search {
        /// The search query string.
        query: String,

        /// Restrict results to one course (name matched fuzzily).
        #[arg(long)]
        course: Option<String>,

        /// Restrict results to one lesson number within the course.
        #[arg(long)]
        lesson: Option<i64>,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Ask a question about the course materials.
    ///
    /// Sends the question to the configured chat provider, which may call
    /// retrieval tools before answering. Prints the answer followed by the
    /// courses and lessons it drew on. Requires `[chat]` to be configured.
    Ask {
        /// The question to answer.
        query: String,
    },

    /// Start the HTTP API server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// query, course listing, and session endpoints.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            path,
            clear,
            dry_run,
        } => {
            ingest::run_ingest(&cfg, path, clear, dry_run).await?;
        }
        Commands::Courses => {
            run_courses(&cfg).await?;
        }
        Commands::Lessons { course } => {
            run_lessons(&cfg, &course).await?;
        }
        Commands::Search {
            query,
            course,
            lesson,
            limit,
        } => {
            run_search(&cfg, &query, course.as_deref(), lesson, limit).await?;
        }
        Commands::Ask { query } => {
            run_ask(&cfg, &query).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

/// `lectern courses` — print the catalog.
async fn run_courses(cfg: &config::Config) -> anyhow::Result<()> {
    let pool = db::connect(cfg).await?;
    let store = CourseStore::new(pool, cfg)?;

    let courses = store.list_courses().await?;
    if courses.is_empty() {
        println!("No courses available.");
    } else {
        println!("Courses ({}):", courses.len());
        for course in &courses {
            println!("  {} ({} lessons)", course.title, course.lesson_count);
            if let Some(ref instructor) = course.instructor {
                println!("      instructor: {}", instructor);
            }
            if let Some(ref link) = course.link {
                println!("      link: {}", link);
            }
        }
    }

    store.pool().close().await;
    Ok(())
}

/// `lectern lessons <course>` — print a course outline.
async fn run_lessons(cfg: &config::Config, course: &str) -> anyhow::Result<()> {
    let pool = db::connect(cfg).await?;
    let store = CourseStore::new(pool, cfg)?;

    let Some(title) = store.resolve_course_name(course).await? else {
        println!("No course found matching '{}'", course);
        store.pool().close().await;
        return Ok(());
    };
    let outline = store.list_lessons(&title).await?;

    println!("Course: {}", outline.title);
    if let Some(ref link) = outline.link {
        println!("Link: {}", link);
    }
    if let Some(ref instructor) = outline.instructor {
        println!("Instructor: {}", instructor);
    }
    println!("Lessons:");
    if outline.lessons.is_empty() {
        println!("  (no lessons)");
    } else {
        for lesson in &outline.lessons {
            println!("  Lesson {}: {}", lesson.number, lesson.title);
        }
    }

    store.pool().close().await;
    Ok(())
}

/// `lectern search <query>` — print ranked content hits.
async fn run_search(
    cfg: &config::Config,
    query: &str,
    course: Option<&str>,
    lesson: Option<i64>,
    limit: Option<i64>,
) -> anyhow::Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let pool = db::connect(cfg).await?;
    let store = CourseStore::new(pool, cfg)?;

    // A course filter that matches nothing is a miss, not an empty search.
    let mut course_title: Option<String> = None;
    if let Some(name) = course {
        match store.resolve_course_name(name).await? {
            Some(title) => course_title = Some(title),
            None => {
                println!("No course found matching '{}'", name);
                store.pool().close().await;
                return Ok(());
            }
        }
    }

    let hits = store
        .search_content(query, course_title.as_deref(), lesson, limit)
        .await?;

    if hits.is_empty() {
        println!("No results.");
        store.pool().close().await;
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} - Lesson {} (chunk {})",
            i + 1,
            hit.score,
            hit.course_title,
            hit.lesson_number,
            hit.chunk_index
        );
        let excerpt: String = hit.text.chars().take(240).collect();
        println!("    excerpt: \"{}\"", excerpt.replace('\n', " ").trim());
        println!();
    }

    store.pool().close().await;
    Ok(())
}

/// `lectern ask <query>` — run one question through the answer loop.
async fn run_ask(cfg: &config::Config, query: &str) -> anyhow::Result<()> {
    let pool = db::connect(cfg).await?;
    let store = CourseStore::new(pool, cfg)?;
    let chat = create_chat_provider(&cfg.chat)?;
    let sessions = SessionStore::new(cfg.chat.max_history);

    let session_id = sessions.create_session().await;
    let answer = orchestrator::answer(
        &store,
        chat.as_ref(),
        &sessions,
        &cfg.chat,
        &session_id,
        query,
    )
    .await?;

    println!("{}", answer.text);
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &answer.sources {
            println!("  - {}", source);
        }
    }

    store.pool().close().await;
    Ok(())
}
