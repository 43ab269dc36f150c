use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    // Create courses table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS courses (
            title TEXT PRIMARY KEY,
            link TEXT,
            instructor TEXT,
            ingested_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Create lessons table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lessons (
            course_title TEXT NOT NULL,
            lesson_number INTEGER NOT NULL,
            title TEXT NOT NULL,
            link TEXT,
            PRIMARY KEY (course_title, lesson_number),
            FOREIGN KEY (course_title) REFERENCES courses(title)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Create chunks table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            course_title TEXT NOT NULL,
            lesson_number INTEGER NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            UNIQUE(course_title, lesson_number, chunk_index),
            FOREIGN KEY (course_title) REFERENCES courses(title)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Catalog vectors: one embedding per course title, for fuzzy resolution
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS catalog_vectors (
            course_title TEXT PRIMARY KEY,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Chunk vectors: one embedding per chunk, for content search
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunk_vectors (
            chunk_id TEXT PRIMARY KEY,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_course ON chunks(course_title)")
        .execute(&pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chunks_course_lesson ON chunks(course_title, lesson_number)",
    )
    .execute(&pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_lessons_course ON lessons(course_title)")
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}
