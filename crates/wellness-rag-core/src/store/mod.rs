//! Storage abstraction for Wellness RAG.
//!
//! The [`Store`] trait covers everything the ingestion and retrieval
//! pipeline needs from persistence, so backends are pluggable: the
//! in-memory store here, and the SQLite store in the app crate.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

pub use crate::models::ChunkMatch;
use crate::models::{Chunk, Document};

/// Row counts reported by [`Store::stats`].
///
/// Printed by `wrag stats`; `wrag reembed --dry-run` reports the pending count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Stored documents.
    pub documents: u64,
    /// Stored chunks, embedded or not.
    pub chunks: u64,
    /// Chunks that carry an embedding.
    pub embedded_chunks: u64,
}

impl StoreStats {
    /// Chunks still waiting for an embedding.
    ///
    /// Saturates at zero.
    pub fn pending_chunks(&self) -> u64 {
        self.chunks.saturating_sub(self.embedded_chunks)
    }
}

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert_document`](Store::upsert_document) | Insert or update a document by id |
/// | [`replace_chunks`](Store::replace_chunks) | Replace a document's chunks, optionally with embeddings |
/// | [`update_embedding`](Store::update_embedding) | Set the embedding of one chunk |
/// | [`get_chunk`](Store::get_chunk) | Fetch a chunk by id |
/// | [`pending_chunks`](Store::pending_chunks) | Chunks without an embedding |
/// | [`search_chunks`](Store::search_chunks) | Cosine similarity search |
/// | [`fetch_documents`](Store::fetch_documents) | Fetch documents by id set |
/// | [`stats`](Store::stats) | Row counts |
/// | [`reset`](Store::reset) | Delete all chunks, then all documents |
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a document, or overwrite every field of the one with the same id.
    ///
    /// Existing chunks of the document are left untouched; callers follow up
    /// with [`replace_chunks`](Store::replace_chunks).
    async fn upsert_document(&self, doc: &Document) -> Result<()>;

    /// Replace all chunks of a document.
    ///
    /// Stale chunks from an earlier chunking are removed. When `embeddings`
    /// is given it must be index-aligned with `chunks`; otherwise the chunks
    /// are stored pending.
    ///
    /// # Errors
    ///
    /// Fails without writing anything when `embeddings` and `chunks`
    /// differ in length.
    async fn replace_chunks(
        &self,
        document_id: &str,
        chunks: &[Chunk],
        embeddings: Option<&[Vec<f32>]>,
    ) -> Result<()>;

    /// Set or overwrite the embedding of one chunk.
    ///
    /// The vector is stored as given; backends that persist bytes use the
    /// [`vec_to_blob`](crate::embedding::vec_to_blob) encoding.
    ///
    /// # Errors
    ///
    /// Fails if no chunk has the given id.
    async fn update_embedding(&self, chunk_id: &str, embedding: &[f32]) -> Result<()>;

    /// Fetch a chunk by id. Returns `Ok(None)` if it does not exist.
    async fn get_chunk(&self, chunk_id: &str) -> Result<Option<Chunk>>;

    /// Chunks without an embedding, ordered by document id then chunk index.
    ///
    /// `limit` caps the number returned; `None` returns all of them.
    async fn pending_chunks(&self, limit: Option<usize>) -> Result<Vec<Chunk>>;

    /// Cosine similarity search over embedded chunks.
    ///
    /// Returns at most `match_count` matches whose similarity is strictly
    /// greater than `match_threshold`, ordered as by [`rank_matches`].
    /// Similarity is [`cosine_similarity`](crate::embedding::cosine_similarity),
    /// so values lie in `[-1.0, 1.0]`:
    /// - `1.0` = same direction as the query
    /// - `0.0` = unrelated, or a chunk whose vector has a different length
    ///
    /// Chunks without an embedding are never returned.
    async fn search_chunks(
        &self,
        query_vec: &[f32],
        match_threshold: f64,
        match_count: usize,
    ) -> Result<Vec<ChunkMatch>>;

    /// Documents for the given ids, in the order requested.
    ///
    /// Unknown ids are skipped, so the result may be shorter than `ids`.
    async fn fetch_documents(&self, ids: &[String]) -> Result<Vec<Document>>;

    /// Current row counts.
    async fn stats(&self) -> Result<StoreStats>;

    /// Delete all chunks, then all documents.
    async fn reset(&self) -> Result<()>;
}

/// Order search matches and keep the best `match_count`.
///
/// Sort keys, in order:
/// - similarity, descending
/// - document id, ascending
/// - chunk index, ascending
///
/// The tie-breakers make results deterministic across backends. A `NaN`
/// similarity compares equal to everything.
pub fn rank_matches(matches: &mut Vec<ChunkMatch>, match_count: usize) {
    matches.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.document_id.cmp(&b.document_id))
            .then_with(|| a.chunk_index.cmp(&b.chunk_index))
    });
    matches.truncate(match_count);
}
