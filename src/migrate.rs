use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

use crate::config::Config;
use crate::db;

/// Create the schema if it does not exist. Safe to run repeatedly.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    info!(db = %config.db.path.display(), "schema ready");
    Ok(())
}

pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // authors, conflicts and keywords are JSON arrays
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            abstract TEXT NOT NULL,
            authors TEXT NOT NULL DEFAULT '[]',
            journal TEXT NOT NULL DEFAULT '',
            publication_date TEXT NOT NULL,
            doi TEXT,
            pmid TEXT,
            url TEXT,
            study_type TEXT NOT NULL,
            sample_size INTEGER,
            conflicts_of_interest TEXT NOT NULL DEFAULT '[]',
            keywords TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            content TEXT NOT NULL,
            section TEXT NOT NULL DEFAULT 'abstract',
            page_number INTEGER,
            word_count INTEGER NOT NULL,
            hash TEXT NOT NULL,
            embedding BLOB,
            embedded_at INTEGER,
            created_at INTEGER NOT NULL,
            UNIQUE(document_id, section, chunk_index),
            FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_publication_date ON documents(publication_date DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_study_type ON documents(study_type)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Delete all chunks, then all documents.
pub async fn reset(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;

    let chunks = sqlx::query("DELETE FROM chunks").execute(&pool).await?;
    let documents = sqlx::query("DELETE FROM documents").execute(&pool).await?;
    pool.close().await;

    info!(
        chunks = chunks.rows_affected(),
        documents = documents.rows_affected(),
        "database reset"
    );
    println!(
        "Reset complete: removed {} documents and {} chunks",
        documents.rows_affected(),
        chunks.rows_affected()
    );
    Ok(())
}
