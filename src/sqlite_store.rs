//! SQLite-backed [`Store`] implementation.
//!
//! Documents and chunks live in the two tables created by
//! [`migrate::apply_schema`](crate::migrate::apply_schema). Embeddings are
//! stored on the chunk row as little-endian `f32` BLOBs; a `NULL` embedding
//! marks the chunk as pending. Similarity search is brute-force cosine over
//! every embedded chunk.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

use wellness_rag_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use wellness_rag_core::models::{
    Chunk, ChunkMatch, ChunkMetadata, Document, Section, StudyType,
};
use wellness_rag_core::store::{rank_matches, Store, StoreStats};

const DOCUMENT_COLUMNS: &str = "id, title, abstract, authors, journal, publication_date, doi, \
     pmid, url, study_type, sample_size, conflicts_of_interest, keywords";

const CHUNK_COLUMNS: &str =
    "id, document_id, chunk_index, content, section, page_number, word_count, hash";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn json_list(values: &[String]) -> Result<String> {
    Ok(serde_json::to_string(values)?)
}

fn parse_json_list(row: &SqliteRow, column: &str) -> Result<Vec<String>> {
    let raw: String = row.get(column);
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in documents.{}", column))
}

fn row_to_document(row: &SqliteRow) -> Result<Document> {
    let id: String = row.get("id");
    let date: String = row.get("publication_date");
    let study_type: String = row.get("study_type");
    let sample_size: Option<i64> = row.get("sample_size");

    Ok(Document {
        title: row.get("title"),
        abstract_text: row.get("abstract"),
        authors: parse_json_list(row, "authors")?,
        journal: row.get("journal"),
        publication_date: date
            .parse()
            .with_context(|| format!("document {} has invalid publication_date '{}'", id, date))?,
        doi: row.get("doi"),
        pmid: row.get("pmid"),
        url: row.get("url"),
        study_type: study_type
            .parse::<StudyType>()
            .map_err(|e| anyhow!("document {}: {}", id, e))?,
        sample_size: sample_size
            .map(u32::try_from)
            .transpose()
            .with_context(|| format!("document {} has invalid sample_size", id))?,
        conflicts_of_interest: parse_json_list(row, "conflicts_of_interest")?,
        keywords: parse_json_list(row, "keywords")?,
        id,
    })
}

fn row_to_chunk(row: &SqliteRow) -> Result<Chunk> {
    let section: String = row.get("section");
    let page_number: Option<i64> = row.get("page_number");
    let word_count: i64 = row.get("word_count");

    Ok(Chunk {
        id: row.get("id"),
        document_id: row.get("document_id"),
        chunk_index: row.get("chunk_index"),
        content: row.get("content"),
        metadata: ChunkMetadata {
            section: section.parse::<Section>().map_err(|e| anyhow!(e))?,
            page_number: page_number.and_then(|p| u32::try_from(p).ok()),
            word_count: usize::try_from(word_count).unwrap_or(0),
        },
        hash: row.get("hash"),
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn upsert_document(&self, doc: &Document) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO documents (id, title, abstract, authors, journal, publication_date,
                                   doi, pmid, url, study_type, sample_size,
                                   conflicts_of_interest, keywords, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                abstract = excluded.abstract,
                authors = excluded.authors,
                journal = excluded.journal,
                publication_date = excluded.publication_date,
                doi = excluded.doi,
                pmid = excluded.pmid,
                url = excluded.url,
                study_type = excluded.study_type,
                sample_size = excluded.sample_size,
                conflicts_of_interest = excluded.conflicts_of_interest,
                keywords = excluded.keywords,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.title)
        .bind(&doc.abstract_text)
        .bind(json_list(&doc.authors)?)
        .bind(&doc.journal)
        .bind(doc.publication_date.format("%Y-%m-%d").to_string())
        .bind(&doc.doi)
        .bind(&doc.pmid)
        .bind(&doc.url)
        .bind(doc.study_type.as_str())
        .bind(doc.sample_size.map(i64::from))
        .bind(json_list(&doc.conflicts_of_interest)?)
        .bind(json_list(&doc.keywords)?)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn replace_chunks(
        &self,
        document_id: &str,
        chunks: &[Chunk],
        embeddings: Option<&[Vec<f32>]>,
    ) -> Result<()> {
        if let Some(vecs) = embeddings {
            if vecs.len() != chunks.len() {
                bail!(
                    "got {} embeddings for {} chunks of document {}",
                    vecs.len(),
                    chunks.len(),
                    document_id
                );
            }
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        for (i, chunk) in chunks.iter().enumerate() {
            let blob = embeddings.map(|vecs| vec_to_blob(&vecs[i]));
            let embedded_at = blob.as_ref().map(|_| now);
            sqlx::query(
                r#"
                INSERT INTO chunks (id, document_id, chunk_index, content, section, page_number,
                                    word_count, hash, embedding, embedded_at, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(document_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.content)
            .bind(chunk.metadata.section.as_str())
            .bind(chunk.metadata.page_number.map(i64::from))
            .bind(chunk.metadata.word_count as i64)
            .bind(&chunk.hash)
            .bind(blob)
            .bind(embedded_at)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_embedding(&self, chunk_id: &str, embedding: &[f32]) -> Result<()> {
        let result = sqlx::query("UPDATE chunks SET embedding = ?, embedded_at = ? WHERE id = ?")
            .bind(vec_to_blob(embedding))
            .bind(chrono::Utc::now().timestamp())
            .bind(chunk_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            bail!("chunk not found: {}", chunk_id);
        }
        Ok(())
    }

    async fn get_chunk(&self, chunk_id: &str) -> Result<Option<Chunk>> {
        let row = sqlx::query(&format!("SELECT {} FROM chunks WHERE id = ?", CHUNK_COLUMNS))
            .bind(chunk_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_chunk).transpose()
    }

    async fn pending_chunks(&self, limit: Option<usize>) -> Result<Vec<Chunk>> {
        // LIMIT -1 is unbounded in SQLite
        let limit = limit.map_or(-1, |l| l as i64);
        let rows = sqlx::query(&format!(
            "SELECT {} FROM chunks WHERE embedding IS NULL \
             ORDER BY document_id ASC, chunk_index ASC LIMIT ?",
            CHUNK_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_chunk).collect()
    }

    async fn search_chunks(
        &self,
        query_vec: &[f32],
        match_threshold: f64,
        match_count: usize,
    ) -> Result<Vec<ChunkMatch>> {
        let rows = sqlx::query(
            "SELECT id, document_id, chunk_index, content, embedding FROM chunks WHERE embedding IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut matches: Vec<ChunkMatch> = rows
            .iter()
            .filter_map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let similarity = cosine_similarity(query_vec, &blob_to_vec(&blob)) as f64;
                (similarity > match_threshold).then(|| ChunkMatch {
                    chunk_id: row.get("id"),
                    document_id: row.get("document_id"),
                    content: row.get("content"),
                    chunk_index: row.get("chunk_index"),
                    similarity,
                })
            })
            .collect();

        rank_matches(&mut matches, match_count);
        Ok(matches)
    }

    async fn fetch_documents(&self, ids: &[String]) -> Result<Vec<Document>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM documents WHERE id IN ({})",
            DOCUMENT_COLUMNS, placeholders
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut by_id: HashMap<String, Document> = HashMap::with_capacity(rows.len());
        for row in &rows {
            let doc = row_to_document(row)?;
            by_id.insert(doc.id.clone(), doc);
        }
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        let chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        let embedded: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE embedding IS NOT NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok(StoreStats {
            documents: documents as u64,
            chunks: chunks as u64,
            embedded_chunks: embedded as u64,
        })
    }

    async fn reset(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM documents").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}
