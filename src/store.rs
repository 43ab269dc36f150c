//! The course store: both retrieval indexes over one SQLite database.
//!
//! Two indexes serve two different questions:
//!
//! | Index | Rows | Answers |
//! |-------|------|---------|
//! | catalog | one vector per course title | "which course did the user mean?" |
//! | content | one vector per chunk | "which chunks answer this query?" |
//!
//! Both are brute-force cosine scans over BLOB-encoded vectors, which is
//! plenty for a course corpus measured in thousands of chunks.
//!
//! Ingesting a course replaces everything recorded under its title inside
//! a single transaction, so readers never observe a half-replaced course.
//! Embeddings are computed before the transaction opens; an embedding
//! failure leaves the previous version of the course fully intact.

use sqlx::{Row, SqlitePool};

use crate::config::{Config, EmbeddingConfig, RetrievalConfig};
use crate::embedding::{
    self, blob_to_vec, cosine_similarity, create_provider, vec_to_blob, EmbeddingProvider,
};
use crate::error::StoreError;
use crate::models::{CourseOutline, CourseSummary, OutlineLesson, SearchHit};
use crate::parse::ParsedDocument;

pub struct CourseStore {
    pool: SqlitePool,
    embedding: EmbeddingConfig,
    retrieval: RetrievalConfig,
    provider: Box<dyn EmbeddingProvider>,
}

impl CourseStore {
    pub fn new(pool: SqlitePool, config: &Config) -> Result<Self, StoreError> {
        let provider = create_provider(&config.embedding)?;
        Ok(Self {
            pool,
            embedding: config.embedding.clone(),
            retrieval: config.retrieval.clone(),
            provider,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert a parsed course, replacing any prior course with the same
    /// title along with all of its lessons, chunks, and vectors.
    ///
    /// All embeddings are computed up front; the delete-and-insert runs in
    /// one transaction afterwards.
    pub async fn upsert_course(&self, doc: &ParsedDocument) -> Result<(), StoreError> {
        let course = &doc.course;

        let catalog_vec =
            embedding::embed_query(self.provider.as_ref(), &self.embedding, &course.title).await?;

        let texts: Vec<String> = doc.chunks.iter().map(|c| c.text.clone()).collect();
        let mut chunk_vecs: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.embedding.batch_size.max(1)) {
            let mut vecs =
                embedding::embed_texts(self.provider.as_ref(), &self.embedding, batch).await?;
            chunk_vecs.append(&mut vecs);
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM chunk_vectors WHERE chunk_id IN (SELECT id FROM chunks WHERE course_title = ?)",
        )
        .bind(&course.title)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM catalog_vectors WHERE course_title = ?")
            .bind(&course.title)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chunks WHERE course_title = ?")
            .bind(&course.title)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM lessons WHERE course_title = ?")
            .bind(&course.title)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM courses WHERE title = ?")
            .bind(&course.title)
            .execute(&mut *tx)
            .await?;

        let now = chrono::Utc::now().timestamp();
        sqlx::query("INSERT INTO courses (title, link, instructor, ingested_at) VALUES (?, ?, ?, ?)")
            .bind(&course.title)
            .bind(&course.link)
            .bind(&course.instructor)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        for lesson in &course.lessons {
            sqlx::query(
                "INSERT INTO lessons (course_title, lesson_number, title, link) VALUES (?, ?, ?, ?)",
            )
            .bind(&course.title)
            .bind(lesson.number)
            .bind(&lesson.title)
            .bind(&lesson.link)
            .execute(&mut *tx)
            .await?;
        }

        for (chunk, vec) in doc.chunks.iter().zip(chunk_vecs.iter()) {
            sqlx::query(
                "INSERT INTO chunks (id, course_title, lesson_number, chunk_index, text) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.course_title)
            .bind(chunk.lesson_number)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .execute(&mut *tx)
            .await?;

            sqlx::query("INSERT INTO chunk_vectors (chunk_id, embedding) VALUES (?, ?)")
                .bind(&chunk.id)
                .bind(vec_to_blob(vec))
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("INSERT INTO catalog_vectors (course_title, embedding) VALUES (?, ?)")
            .bind(&course.title)
            .bind(vec_to_blob(&catalog_vec))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Resolve a possibly-partial course name against the catalog.
    ///
    /// Embeds the name, scans every catalog vector, and returns the
    /// best-scoring title provided it clears the resolve threshold.
    /// Returns `None` for an empty catalog or when nothing scores high
    /// enough; ties go to the lexicographically smallest title.
    pub async fn resolve_course_name(&self, name: &str) -> Result<Option<String>, StoreError> {
        let query_vec =
            embedding::embed_query(self.provider.as_ref(), &self.embedding, name).await?;

        let rows = sqlx::query("SELECT course_title, embedding FROM catalog_vectors")
            .fetch_all(&self.pool)
            .await?;

        let mut best: Option<(String, f64)> = None;
        for row in &rows {
            let title: String = row.get("course_title");
            let blob: Vec<u8> = row.get("embedding");
            let score = cosine_similarity(&query_vec, &blob_to_vec(&blob)) as f64;

            let better = match &best {
                None => true,
                Some((best_title, best_score)) => {
                    score > *best_score || (score == *best_score && title < *best_title)
                }
            };
            if better {
                best = Some((title, score));
            }
        }

        match best {
            Some((title, score)) if score >= self.retrieval.resolve_threshold => Ok(Some(title)),
            _ => Ok(None),
        }
    }

    /// Search the content index, optionally scoped to a course title
    /// (exact, as stored) and a lesson number.
    ///
    /// Returns up to `limit` hits (default `retrieval.max_results`) in
    /// score-descending order; ties break on chunk index, then course
    /// title, then lesson number, so the ordering is reproducible.
    pub async fn search_content(
        &self,
        query: &str,
        course_title: Option<&str>,
        lesson_number: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let final_limit = limit.unwrap_or(self.retrieval.max_results).max(1);

        let query_vec =
            embedding::embed_query(self.provider.as_ref(), &self.embedding, query).await?;

        let rows = sqlx::query(
            r#"
            SELECT c.course_title, c.lesson_number, c.chunk_index, c.text, cv.embedding
            FROM chunk_vectors cv
            JOIN chunks c ON c.id = cv.chunk_id
            WHERE (?1 IS NULL OR c.course_title = ?1)
              AND (?2 IS NULL OR c.lesson_number = ?2)
            "#,
        )
        .bind(course_title)
        .bind(lesson_number)
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<SearchHit> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let score = cosine_similarity(&query_vec, &blob_to_vec(&blob)) as f64;
                SearchHit {
                    course_title: row.get("course_title"),
                    lesson_number: row.get("lesson_number"),
                    chunk_index: row.get("chunk_index"),
                    text: row.get("text"),
                    score,
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk_index.cmp(&b.chunk_index))
                .then(a.course_title.cmp(&b.course_title))
                .then(a.lesson_number.cmp(&b.lesson_number))
        });
        hits.truncate(final_limit as usize);

        Ok(hits)
    }

    /// List every course with exact stored titles, ordered by title.
    pub async fn list_courses(&self) -> Result<Vec<CourseSummary>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT c.title, c.link, c.instructor, COUNT(l.lesson_number) AS lesson_count
            FROM courses c
            LEFT JOIN lessons l ON l.course_title = c.title
            GROUP BY c.title
            ORDER BY c.title
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| CourseSummary {
                title: row.get("title"),
                link: row.get("link"),
                instructor: row.get("instructor"),
                lesson_count: row.get("lesson_count"),
            })
            .collect())
    }

    /// Outline one course by exact title: metadata plus lessons in
    /// number order.
    pub async fn list_lessons(&self, course_title: &str) -> Result<CourseOutline, StoreError> {
        let course_row =
            sqlx::query("SELECT title, link, instructor FROM courses WHERE title = ?")
                .bind(course_title)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| StoreError::CourseNotFound(course_title.to_string()))?;

        let lesson_rows = sqlx::query(
            "SELECT lesson_number, title, link FROM lessons WHERE course_title = ? ORDER BY lesson_number",
        )
        .bind(course_title)
        .fetch_all(&self.pool)
        .await?;

        Ok(CourseOutline {
            title: course_row.get("title"),
            link: course_row.get("link"),
            instructor: course_row.get("instructor"),
            lessons: lesson_rows
                .iter()
                .map(|row| OutlineLesson {
                    number: row.get("lesson_number"),
                    title: row.get("title"),
                    link: row.get("link"),
                })
                .collect(),
        })
    }

    pub async fn course_exists(&self, title: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM courses WHERE title = ?")
            .bind(title)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Drop every course, lesson, chunk, and vector.
    pub async fn clear_all(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for table in [
            "chunk_vectors",
            "catalog_vectors",
            "chunks",
            "lessons",
            "courses",
        ] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChatConfig, ChunkingConfig, DbConfig, ServerConfig};
    use crate::parse::parse_document;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> Config {
        Config {
            db: DbConfig {
                path: dir.path().join("test.db"),
            },
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            chat: ChatConfig::default(),
            server: ServerConfig {
                bind: "127.0.0.1:0".to_string(),
            },
            corpus: None,
        }
    }

    async fn setup_store() -> (TempDir, CourseStore) {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        crate::migrate::run_migrations(&config).await.unwrap();
        let pool = crate::db::connect(&config).await.unwrap();
        let store = CourseStore::new(pool, &config).unwrap();
        (dir, store)
    }

    async fn ingest(store: &CourseStore, raw: &str) {
        let parsed = parse_document(raw, &ChunkingConfig::default()).unwrap();
        store.upsert_course(&parsed).await.unwrap();
    }

    const RUST_DOC: &str = "Title: Introduction to Rust\n\
        Link: https://example.com/rust\n\
        Instructor: Ada\n\
        \n\
        Lesson 1: Ownership\n\
        Ownership moves values between bindings. The borrow checker enforces aliasing rules.\n\
        \n\
        Lesson 2: Lifetimes\n\
        Lifetimes name the scope a reference is valid for.\n";

    const SQL_DOC: &str = "Title: Practical Databases\n\
        Instructor: Grace\n\
        \n\
        Lesson 1: Query Plans\n\
        The planner chooses indexes based on statistics about table contents.\n";

    #[tokio::test]
    async fn test_upsert_and_list_courses() {
        let (_dir, store) = setup_store().await;
        ingest(&store, RUST_DOC).await;
        ingest(&store, SQL_DOC).await;

        let courses = store.list_courses().await.unwrap();
        assert_eq!(courses.len(), 2);
        // Ordered by title
        assert_eq!(courses[0].title, "Introduction to Rust");
        assert_eq!(courses[0].lesson_count, 2);
        assert_eq!(courses[1].title, "Practical Databases");
        assert_eq!(courses[1].lesson_count, 1);
    }

    #[tokio::test]
    async fn test_reingest_replaces_course() {
        let (_dir, store) = setup_store().await;
        ingest(&store, RUST_DOC).await;

        let updated = "Title: Introduction to Rust\n\
            \n\
            Lesson 1: Traits\n\
            Traits define shared behavior through method signatures.\n";
        ingest(&store, updated).await;

        let outline = store.list_lessons("Introduction to Rust").await.unwrap();
        assert_eq!(outline.lessons.len(), 1);
        assert_eq!(outline.lessons[0].title, "Traits");

        // Old lesson content must be gone from the content index.
        let hits = store
            .search_content("borrow checker aliasing", Some("Introduction to Rust"), None, None)
            .await
            .unwrap();
        assert!(hits.iter().all(|h| !h.text.contains("borrow checker")));

        let chunk_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(chunk_count, 1);
        let vec_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(vec_count, 1);
    }

    #[tokio::test]
    async fn test_resolve_exact_and_fuzzy() {
        let (_dir, store) = setup_store().await;
        ingest(&store, RUST_DOC).await;
        ingest(&store, SQL_DOC).await;

        let exact = store
            .resolve_course_name("Introduction to Rust")
            .await
            .unwrap();
        assert_eq!(exact.as_deref(), Some("Introduction to Rust"));

        let fuzzy = store.resolve_course_name("intro rust").await.unwrap();
        assert_eq!(fuzzy.as_deref(), Some("Introduction to Rust"));
    }

    #[tokio::test]
    async fn test_resolve_rejects_below_threshold() {
        let (_dir, store) = setup_store().await;
        ingest(&store, RUST_DOC).await;

        let miss = store.resolve_course_name("qqq zzz xxx").await.unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_resolve_empty_catalog() {
        let (_dir, store) = setup_store().await;
        let miss = store.resolve_course_name("anything").await.unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_search_scoped_to_course() {
        let (_dir, store) = setup_store().await;
        ingest(&store, RUST_DOC).await;
        ingest(&store, SQL_DOC).await;

        let hits = store
            .search_content("lesson content", Some("Practical Databases"), None, None)
            .await
            .unwrap();
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|h| h.course_title == "Practical Databases"));
    }

    #[tokio::test]
    async fn test_search_scoped_to_lesson() {
        let (_dir, store) = setup_store().await;
        ingest(&store, RUST_DOC).await;

        let hits = store
            .search_content("ownership", Some("Introduction to Rust"), Some(2), None)
            .await
            .unwrap();
        assert!(hits.iter().all(|h| h.lesson_number == 2));
    }

    #[tokio::test]
    async fn test_search_unknown_scope_is_empty() {
        let (_dir, store) = setup_store().await;
        ingest(&store, RUST_DOC).await;

        let hits = store
            .search_content("ownership", Some("No Such Course"), None, None)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_search_ordering_and_limit() {
        let (_dir, store) = setup_store().await;
        ingest(&store, RUST_DOC).await;
        ingest(&store, SQL_DOC).await;

        let hits = store.search_content("ownership moves values", None, None, Some(2)).await.unwrap();
        assert!(hits.len() <= 2);
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        // The clearly matching chunk wins.
        assert!(hits[0].text.contains("Ownership moves values"));
    }

    #[tokio::test]
    async fn test_list_lessons_unknown_course() {
        let (_dir, store) = setup_store().await;
        let err = store.list_lessons("Ghost Course").await.unwrap_err();
        assert!(matches!(err, StoreError::CourseNotFound(_)));
    }

    #[tokio::test]
    async fn test_catalog_only_course_resolves_but_has_no_content() {
        let (_dir, store) = setup_store().await;
        ingest(&store, "Title: Metadata Only Course\n").await;

        let resolved = store
            .resolve_course_name("Metadata Only Course")
            .await
            .unwrap();
        assert_eq!(resolved.as_deref(), Some("Metadata Only Course"));

        let courses = store.list_courses().await.unwrap();
        assert_eq!(courses[0].lesson_count, 0);

        let hits = store
            .search_content("anything", Some("Metadata Only Course"), None, None)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_clear_all() {
        let (_dir, store) = setup_store().await;
        ingest(&store, RUST_DOC).await;
        store.clear_all().await.unwrap();

        assert!(store.list_courses().await.unwrap().is_empty());
        let vec_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM catalog_vectors")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(vec_count, 0);
    }

    #[tokio::test]
    async fn test_course_exists() {
        let (_dir, store) = setup_store().await;
        assert!(!store.course_exists("Introduction to Rust").await.unwrap());
        ingest(&store, RUST_DOC).await;
        assert!(store.course_exists("Introduction to Rust").await.unwrap());
    }
}
