//! In-memory [`Store`] implementation for tests and embedding in other tools.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock`. Vector search is
//! brute-force cosine similarity over every embedded chunk.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{Chunk, ChunkMatch, Document};

use super::{rank_matches, Store, StoreStats};

struct StoredChunk {
    chunk: Chunk,
    embedding: Option<Vec<f32>>,
}

/// In-memory store for tests and for embedding the pipeline in other tools.
///
/// Documents live in a map keyed by id. Chunks and their optional vectors
/// live in one list, so a chunk and its embedding are always replaced
/// together. Nothing is persisted; dropping the store drops the data.
///
/// A poisoned lock surfaces as an error from the failing call rather than
/// a panic.
#[derive(Default)]
pub struct InMemoryStore {
    docs: RwLock<HashMap<String, Document>>,
    chunks: RwLock<Vec<StoredChunk>>,
}

impl InMemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_document(&self, doc: &Document) -> Result<()> {
        write(&self.docs)?.insert(doc.id.clone(), doc.clone());
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

        let mut stored = write(&self.chunks)?;
        stored.retain(|sc| sc.chunk.document_id != document_id);
        for (i, c) in chunks.iter().enumerate() {
            stored.push(StoredChunk {
                chunk: c.clone(),
                embedding: embeddings.map(|v| v[i].clone()),
            });
        }
        Ok(())
    }

    async fn update_embedding(&self, chunk_id: &str, embedding: &[f32]) -> Result<()> {
        let mut stored = write(&self.chunks)?;
        match stored.iter_mut().find(|sc| sc.chunk.id == chunk_id) {
            Some(sc) => {
                sc.embedding = Some(embedding.to_vec());
                Ok(())
            }
            None => bail!("chunk not found: {}", chunk_id),
        }
    }

    async fn get_chunk(&self, chunk_id: &str) -> Result<Option<Chunk>> {
        Ok(read(&self.chunks)?
            .iter()
            .find(|sc| sc.chunk.id == chunk_id)
            .map(|sc| sc.chunk.clone()))
    }

    async fn pending_chunks(&self, limit: Option<usize>) -> Result<Vec<Chunk>> {
        let mut pending: Vec<Chunk> = read(&self.chunks)?
            .iter()
            .filter(|sc| sc.embedding.is_none())
            .map(|sc| sc.chunk.clone())
            .collect();
        pending.sort_by(|a, b| {
            a.document_id
                .cmp(&b.document_id)
                .then(a.chunk_index.cmp(&b.chunk_index))
        });
        if let Some(limit) = limit {
            pending.truncate(limit);
        }
        Ok(pending)
    }

    async fn search_chunks(
        &self,
        query_vec: &[f32],
        match_threshold: f64,
        match_count: usize,
    ) -> Result<Vec<ChunkMatch>> {
        let stored = read(&self.chunks)?;
        let mut matches: Vec<ChunkMatch> = stored
            .iter()
            .filter_map(|sc| {
                let embedding = sc.embedding.as_ref()?;
                let similarity = cosine_similarity(query_vec, embedding) as f64;
                (similarity > match_threshold).then(|| ChunkMatch {
                    chunk_id: sc.chunk.id.clone(),
                    document_id: sc.chunk.document_id.clone(),
                    content: sc.chunk.content.clone(),
                    chunk_index: sc.chunk.chunk_index,
                    similarity,
                })
            })
            .collect();
        rank_matches(&mut matches, match_count);
        Ok(matches)
    }

    async fn fetch_documents(&self, ids: &[String]) -> Result<Vec<Document>> {
        let docs = read(&self.docs)?;
        Ok(ids.iter().filter_map(|id| docs.get(id).cloned()).collect())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let documents = read(&self.docs)?.len() as u64;
        let chunks = read(&self.chunks)?;
        Ok(StoreStats {
            documents,
            chunks: chunks.len() as u64,
            embedded_chunks: chunks.iter().filter(|sc| sc.embedding.is_some()).count() as u64,
        })
    }

    async fn reset(&self) -> Result<()> {
        write(&self.chunks)?.clear();
        write(&self.docs)?.clear();
        Ok(())
    }
}
