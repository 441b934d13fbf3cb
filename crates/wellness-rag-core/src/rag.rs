//! Ingestion and query pipeline.
//!
//! [`RagPipeline`] ties the chunker and grader to the injected collaborators:
//!
//! ```text
//! ingest: document ─► chunk abstract ─► embed (one batch) ─► store
//! search: query ─► embed ─► vector search ─► fetch documents ─► filter
//!         ─► context ─► answer ─► grade ─► citations
//! ```
//!
//! Collaborator errors propagate unchanged. Retries, if any, belong to the
//! providers themselves.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::chunk::{chunk_document, ChunkingOptions};
use crate::completion::{dangling_citations, parse_model_grade, CompletionProvider};
use crate::embedding::EmbeddingProvider;
use crate::error::CoreError;
use crate::grading::grade_evidence;
use crate::models::{
    Chunk, Citation, Document, QueryResult, RetrievedChunk, SearchMetadata, SearchRequest,
};
use crate::store::Store;

pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.7;
pub const DEFAULT_MATCH_COUNT: usize = 10;
pub const MAX_MATCH_COUNT: usize = 50;
pub const MAX_QUERY_CHARS: usize = 500;

const CITATION_PREVIEW_CHARS: usize = 100;
const NO_RESULTS_ANSWER: &str = "No relevant research was found for this query.";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalSettings {
    /// Minimum cosine similarity (exclusive) for a chunk to match.
    pub match_threshold: f64,
    /// Result limit when a request does not set one.
    pub match_count: usize,
    /// Also ask the completion provider for its own grade.
    pub model_grading: bool,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            match_count: DEFAULT_MATCH_COUNT,
            model_grading: false,
        }
    }
}

impl RetrievalSettings {
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(-1.0..=1.0).contains(&self.match_threshold) {
            return Err(CoreError::InvalidConfig(format!(
                "retrieval.match_threshold must be within [-1, 1], got {}",
                self.match_threshold
            )));
        }
        if self.match_count == 0 || self.match_count > MAX_MATCH_COUNT {
            return Err(CoreError::InvalidConfig(format!(
                "retrieval.match_count must be within 1..={}, got {}",
                MAX_MATCH_COUNT, self.match_count
            )));
        }
        Ok(())
    }
}

/// Outcome of staging or ingesting one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub document_id: String,
    pub chunks: usize,
    pub embedded: bool,
}

/// Outcome of [`RagPipeline::reembed_pending`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReembedReport {
    pub total: usize,
    pub embedded: usize,
    pub failed: usize,
}

pub struct RagPipeline<S: Store> {
    store: S,
    embedder: Arc<dyn EmbeddingProvider>,
    completer: Arc<dyn CompletionProvider>,
    chunking: ChunkingOptions,
    retrieval: RetrievalSettings,
}

impl<S: Store> RagPipeline<S> {
    /// Validates both option sets up front.
    pub fn new(
        store: S,
        embedder: Arc<dyn EmbeddingProvider>,
        completer: Arc<dyn CompletionProvider>,
        chunking: ChunkingOptions,
        retrieval: RetrievalSettings,
    ) -> Result<Self, CoreError> {
        chunking.validate()?;
        retrieval.validate()?;
        Ok(Self {
            store,
            embedder,
            completer,
            chunking,
            retrieval,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn prepare_chunks(&self, doc: &Document) -> Result<Vec<Chunk>> {
        let chunks = chunk_document(doc, &self.chunking)?
            .into_iter()
            .filter(|c| !c.content.trim().is_empty())
            .collect();
        Ok(chunks)
    }

    /// Store a document and its chunks without embeddings.
    ///
    /// The chunks stay pending until [`reembed_pending`](Self::reembed_pending)
    /// fills them in.
    pub async fn stage_document(&self, doc: &Document) -> Result<IngestReport> {
        let chunks = self.prepare_chunks(doc)?;
        self.store
            .upsert_document(doc)
            .await
            .with_context(|| format!("failed to store document {}", doc.id))?;
        self.store
            .replace_chunks(&doc.id, &chunks, None)
            .await
            .with_context(|| format!("failed to store chunks for {}", doc.id))?;

        debug!(document_id = %doc.id, chunks = chunks.len(), "document staged");
        Ok(IngestReport {
            document_id: doc.id.clone(),
            chunks: chunks.len(),
            embedded: false,
        })
    }

    /// Store a document and its embedded chunks.
    ///
    /// All chunk texts go to the embedding provider in one batch.
    pub async fn ingest_document(&self, doc: &Document) -> Result<IngestReport> {
        let chunks = self.prepare_chunks(doc)?;
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();

        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedder
                .embed_batch(&texts)
                .await
                .with_context(|| format!("failed to embed chunks of {}", doc.id))?
        };
        if embeddings.len() != chunks.len() {
            bail!(
                "embedding provider returned {} vectors for {} chunks of {}",
                embeddings.len(),
                chunks.len(),
                doc.id
            );
        }

        self.store
            .upsert_document(doc)
            .await
            .with_context(|| format!("failed to store document {}", doc.id))?;
        self.store
            .replace_chunks(&doc.id, &chunks, Some(embeddings.as_slice()))
            .await
            .with_context(|| format!("failed to store chunks for {}", doc.id))?;

        info!(document_id = %doc.id, chunk_count = chunks.len(), "document ingested");
        Ok(IngestReport {
            document_id: doc.id.clone(),
            chunks: chunks.len(),
            embedded: true,
        })
    }

    pub async fn reembed_chunk(&self, chunk_id: &str) -> Result<()> {
        let chunk = match self.store.get_chunk(chunk_id).await? {
            Some(c) => c,
            None => bail!("chunk not found: {}", chunk_id),
        };
        let embedding = self
            .embedder
            .embed(&chunk.content)
            .await
            .with_context(|| format!("failed to embed chunk {}", chunk_id))?;
        self.store.update_embedding(chunk_id, &embedding).await?;
        info!(chunk_id, "chunk re-embedded");
        Ok(())
    }

    /// Embed chunks that have no vector yet, `batch_size` at a time.
    ///
    /// A failing batch is logged and counted; later batches still run.
    pub async fn reembed_pending(
        &self,
        batch_size: usize,
        limit: Option<usize>,
    ) -> Result<ReembedReport> {
        if batch_size == 0 {
            return Err(CoreError::InvalidConfig("batch size must be greater than 0".into()).into());
        }

        let pending = self.store.pending_chunks(limit).await?;
        let mut report = ReembedReport {
            total: pending.len(),
            ..ReembedReport::default()
        };

        for (batch_no, batch) in pending.chunks(batch_size).enumerate() {
            match self.embed_and_update(batch).await {
                Ok(()) => report.embedded += batch.len(),
                Err(e) => {
                    warn!(batch = batch_no + 1, size = batch.len(), error = %e, "re-embedding batch failed");
                    report.failed += batch.len();
                }
            }
        }

        info!(
            total = report.total,
            embedded = report.embedded,
            failed = report.failed,
            "re-embedding finished"
        );
        Ok(report)
    }

    async fn embed_and_update(&self, batch: &[Chunk]) -> Result<()> {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != batch.len() {
            bail!(
                "embedding provider returned {} vectors for {} chunks",
                embeddings.len(),
                batch.len()
            );
        }
        for (chunk, embedding) in batch.iter().zip(&embeddings) {
            self.store.update_embedding(&chunk.id, embedding).await?;
        }
        Ok(())
    }

    /// Check a request and return its effective result limit.
    pub fn validate_request(&self, request: &SearchRequest) -> Result<usize, CoreError> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(CoreError::InvalidRequest("query must not be empty".into()));
        }
        let query_chars = query.chars().count();
        if query_chars > MAX_QUERY_CHARS {
            return Err(CoreError::InvalidRequest(format!(
                "query is {} characters, the maximum is {}",
                query_chars, MAX_QUERY_CHARS
            )));
        }
        let limit = request.limit.unwrap_or(self.retrieval.match_count);
        if limit == 0 || limit > MAX_MATCH_COUNT {
            return Err(CoreError::InvalidRequest(format!(
                "limit must be within 1..={}, got {}",
                MAX_MATCH_COUNT, limit
            )));
        }
        Ok(limit)
    }

    /// Answer a query from stored research with a graded, cited result.
    pub async fn search(&self, request: &SearchRequest) -> Result<QueryResult> {
        let limit = self.validate_request(request)?;
        let request_id = Uuid::new_v4().to_string();
        let span = info_span!("search", request_id = %request_id);
        self.run_search(request, limit, request_id).instrument(span).await
    }

    async fn run_search(
        &self,
        request: &SearchRequest,
        limit: usize,
        request_id: String,
    ) -> Result<QueryResult> {
        let query = request.query.trim();
        let started = Instant::now();

        let query_vec = self
            .embedder
            .embed(query)
            .await
            .context("failed to embed query")?;
        let embedding_time_ms = elapsed_ms(started);

        let retrieval_started = Instant::now();
        let matches = self
            .store
            .search_chunks(&query_vec, self.retrieval.match_threshold, limit)
            .await
            .context("vector search failed")?;
        let total_results = matches.len();

        let mut document_ids: Vec<String> = Vec::new();
        for m in &matches {
            if !document_ids.contains(&m.document_id) {
                document_ids.push(m.document_id.clone());
            }
        }
        let fetched = self
            .store
            .fetch_documents(&document_ids)
            .await
            .context("failed to fetch documents")?;

        let fetched_ids: HashSet<String> = fetched.iter().map(|d| d.id.clone()).collect();
        let documents: Vec<Document> = fetched
            .into_iter()
            .filter(|d| request.filters.matches(d))
            .collect();
        let by_id: HashMap<&str, &Document> =
            documents.iter().map(|d| (d.id.as_str(), d)).collect();

        let mut chunks: Vec<RetrievedChunk> = Vec::with_capacity(matches.len());
        for m in matches {
            let doc = by_id.get(m.document_id.as_str()).copied();
            match doc {
                Some(doc) => chunks.push(RetrievedChunk {
                    document: doc.clone(),
                    chunk: m,
                }),
                None if !fetched_ids.contains(&m.document_id) => {
                    warn!(chunk_id = %m.chunk_id, document_id = %m.document_id, "chunk references a missing document");
                }
                // filtered out
                None => {}
            }
        }
        let retrieval_time_ms = elapsed_ms(retrieval_started);
        debug!(matches = total_results, kept = chunks.len(), "retrieval done");

        let generation_started = Instant::now();
        let answer = if chunks.is_empty() {
            NO_RESULTS_ANSWER.to_string()
        } else {
            let context = build_context(&chunks);
            self.completer
                .generate_answer(query, &context)
                .await
                .context("answer generation failed")?
        };

        let evidence = grade_evidence(&documents);
        let model_grade = if self.retrieval.model_grading && !documents.is_empty() {
            let raw = self
                .completer
                .estimate_grade(&documents, &answer)
                .await
                .context("model grading failed")?;
            Some(parse_model_grade(&raw))
        } else {
            None
        };
        let generation_time_ms = elapsed_ms(generation_started);

        let dangling = dangling_citations(&answer, chunks.len());
        if !dangling.is_empty() {
            warn!(markers = ?dangling, available = chunks.len(), "answer cites sources that were not retrieved");
        }

        let citations = build_citations(&chunks);
        let search_time_ms = elapsed_ms(started);

        info!(
            query,
            results = total_results,
            cited = citations.len(),
            strength = %evidence.strength,
            score = evidence.score,
            duration_ms = search_time_ms,
            "search completed"
        );

        Ok(QueryResult {
            answer,
            citations,
            evidence,
            model_grade,
            documents,
            chunks,
            search_metadata: SearchMetadata {
                request_id,
                query: query.to_string(),
                total_results,
                search_time_ms,
                embedding_time_ms,
                retrieval_time_ms,
                generation_time_ms,
            },
        })
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

/// `"{title}\n{content}"` per chunk, separated by blank lines.
///
/// Order matters: the answer cites entries as `[n]` by their position here.
pub fn build_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|c| format!("{}\n{}", c.document.title, c.chunk.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// One citation per chunk, positions starting at 1.
pub fn build_citations(chunks: &[RetrievedChunk]) -> Vec<Citation> {
    chunks
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let preview: String = c.chunk.content.chars().take(CITATION_PREVIEW_CHARS).collect();
            Citation {
                id: format!("citation-{}", i),
                document_id: c.chunk.document_id.clone(),
                chunk_id: c.chunk.chunk_id.clone(),
                text: format!("{}...", preview),
                position: i + 1,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EvidenceStrength, SearchFilters, StudyType};
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;
    use chrono::{Datelike, NaiveDate, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Two-topic embedder: "sleep" and "stress" map to orthogonal axes.
    struct TopicEmbedder {
        calls: AtomicUsize,
        fail_on: Option<&'static str>,
    }

    impl TopicEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on: None,
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for TopicEmbedder {
        fn model_name(&self) -> &str {
            "topic"
        }

        fn dims(&self) -> usize {
            2
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(bad) = self.fail_on {
                if texts.iter().any(|t| t.contains(bad)) {
                    bail!("provider rejected input");
                }
            }
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    match (t.contains("sleep"), t.contains("stress")) {
                        (true, false) => vec![1.0, 0.0],
                        (false, true) => vec![0.0, 1.0],
                        _ => vec![0.7071, 0.7071],
                    }
                })
                .collect())
        }
    }

    struct ScriptedCompleter {
        answer: String,
        grade: String,
        contexts: Mutex<Vec<String>>,
    }

    impl ScriptedCompleter {
        fn new(answer: &str) -> Self {
            Self {
                answer: answer.to_string(),
                grade: "Moderate evidence. Score: 64".to_string(),
                contexts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedCompleter {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn generate_answer(&self, _query: &str, context: &str) -> Result<String> {
            self.contexts.lock().unwrap().push(context.to_string());
            Ok(self.answer.clone())
        }

        async fn estimate_grade(&self, _docs: &[Document], _answer: &str) -> Result<String> {
            Ok(self.grade.clone())
        }
    }

    fn doc(id: &str, study_type: StudyType, abstract_text: &str) -> Document {
        Document {
            id: id.to_string(),
            title: format!("Title of {}", id),
            abstract_text: abstract_text.to_string(),
            authors: vec!["Doe, J.".to_string()],
            journal: "Journal".to_string(),
            publication_date: NaiveDate::from_ymd_opt(Utc::now().year(), 1, 1).unwrap(),
            doi: None,
            pmid: None,
            url: None,
            study_type,
            sample_size: Some(1500),
            conflicts_of_interest: vec![],
            keywords: vec![],
        }
    }

    fn pipeline(
        embedder: Arc<TopicEmbedder>,
        completer: Arc<ScriptedCompleter>,
        retrieval: RetrievalSettings,
    ) -> RagPipeline<InMemoryStore> {
        RagPipeline::new(
            InMemoryStore::new(),
            embedder,
            completer,
            ChunkingOptions::default(),
            retrieval,
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_bad_settings() {
        let bad_chunking = ChunkingOptions {
            max_chunk_size: 10,
            overlap_size: 10,
            preserve_sentences: true,
        };
        let result = RagPipeline::new(
            InMemoryStore::new(),
            Arc::new(TopicEmbedder::new()),
            Arc::new(ScriptedCompleter::new("")),
            bad_chunking,
            RetrievalSettings::default(),
        );
        assert!(matches!(result, Err(CoreError::InvalidConfig(_))));

        let bad_retrieval = RetrievalSettings {
            match_count: 0,
            ..RetrievalSettings::default()
        };
        let result = RagPipeline::new(
            InMemoryStore::new(),
            Arc::new(TopicEmbedder::new()),
            Arc::new(ScriptedCompleter::new("")),
            ChunkingOptions::default(),
            bad_retrieval,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_ingest_embeds_in_one_batch() {
        let embedder = Arc::new(TopicEmbedder::new());
        let p = pipeline(
            embedder.clone(),
            Arc::new(ScriptedCompleter::new("")),
            RetrievalSettings::default(),
        );
        let long_abstract = "Sleep hygiene improved outcomes. ".repeat(80);
        let report = p
            .ingest_document(&doc("d1", StudyType::CohortStudy, &long_abstract))
            .await
            .unwrap();
        assert!(report.chunks > 1);
        assert!(report.embedded);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);

        let stats = p.store().stats().await.unwrap();
        assert_eq!(stats.chunks as usize, report.chunks);
        assert_eq!(stats.embedded_chunks, stats.chunks);
    }

    #[tokio::test]
    async fn test_empty_abstract_stores_no_chunks() {
        let embedder = Arc::new(TopicEmbedder::new());
        let p = pipeline(
            embedder.clone(),
            Arc::new(ScriptedCompleter::new("")),
            RetrievalSettings::default(),
        );
        let report = p
            .ingest_document(&doc("d1", StudyType::Review, "   "))
            .await
            .unwrap();
        assert_eq!(report.chunks, 0);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(p.store().stats().await.unwrap().documents, 1);
    }

    #[tokio::test]
    async fn test_stage_then_reembed_pending() {
        let embedder = Arc::new(TopicEmbedder::new());
        let p = pipeline(
            embedder.clone(),
            Arc::new(ScriptedCompleter::new("")),
            RetrievalSettings::default(),
        );
        for i in 0..5 {
            p.stage_document(&doc(&format!("d{}", i), StudyType::Review, "Stress matters."))
                .await
                .unwrap();
        }
        assert_eq!(p.store().stats().await.unwrap().embedded_chunks, 0);

        let report = p.reembed_pending(2, None).await.unwrap();
        assert_eq!(
            report,
            ReembedReport {
                total: 5,
                embedded: 5,
                failed: 0
            }
        );
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
        assert_eq!(p.store().stats().await.unwrap().pending_chunks(), 0);
    }

    #[tokio::test]
    async fn test_reembed_pending_counts_failed_batches() {
        let embedder = Arc::new(TopicEmbedder {
            calls: AtomicUsize::new(0),
            fail_on: Some("poison"),
        });
        let p = pipeline(
            embedder,
            Arc::new(ScriptedCompleter::new("")),
            RetrievalSettings::default(),
        );
        p.stage_document(&doc("a", StudyType::Review, "Sleep one."))
            .await
            .unwrap();
        p.stage_document(&doc("b", StudyType::Review, "A poison pill."))
            .await
            .unwrap();
        p.stage_document(&doc("c", StudyType::Review, "Sleep two."))
            .await
            .unwrap();

        let report = p.reembed_pending(1, None).await.unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.embedded, 2);
        assert_eq!(report.failed, 1);
        assert!(p.reembed_pending(0, None).await.is_err());
    }

    #[tokio::test]
    async fn test_reembed_chunk() {
        let p = pipeline(
            Arc::new(TopicEmbedder::new()),
            Arc::new(ScriptedCompleter::new("")),
            RetrievalSettings::default(),
        );
        p.stage_document(&doc("d1", StudyType::Review, "Sleep matters."))
            .await
            .unwrap();
        p.reembed_chunk("d1-abstract-0").await.unwrap();
        assert_eq!(p.store().stats().await.unwrap().embedded_chunks, 1);
        assert!(p.reembed_chunk("nope").await.is_err());
    }

    #[tokio::test]
    async fn test_search_end_to_end() {
        let completer = Arc::new(ScriptedCompleter::new("Sleep helps [1]. See also [5]."));
        let p = pipeline(
            Arc::new(TopicEmbedder::new()),
            completer.clone(),
            RetrievalSettings::default(),
        );
        p.ingest_document(&doc("meta", StudyType::MetaAnalysis, "Sleep duration predicts recovery."))
            .await
            .unwrap();
        p.ingest_document(&doc("rct", StudyType::RandomizedControlledTrial, "Stress reduction trial."))
            .await
            .unwrap();

        let result = p.search(&SearchRequest::new("how does sleep help")).await.unwrap();
        assert_eq!(result.answer, "Sleep helps [1]. See also [5].");
        assert_eq!(result.chunks.len(), 1);
        assert_eq!(result.documents.len(), 1);
        assert_eq!(result.documents[0].id, "meta");
        assert_eq!(result.evidence.score, 100);
        assert_eq!(result.evidence.strength, EvidenceStrength::Strong);
        assert!(result.model_grade.is_none());

        assert_eq!(result.citations.len(), 1);
        let c = &result.citations[0];
        assert_eq!(c.id, "citation-0");
        assert_eq!(c.position, 1);
        assert_eq!(c.chunk_id, "meta-abstract-0");
        assert_eq!(c.text, "Sleep duration predicts recovery....");

        let contexts = completer.contexts.lock().unwrap();
        assert_eq!(contexts[0], "Title of meta\nSleep duration predicts recovery.");
        assert_eq!(result.search_metadata.total_results, 1);
        assert!(!result.search_metadata.request_id.is_empty());
    }

    #[tokio::test]
    async fn test_search_without_matches_skips_generation() {
        let completer = Arc::new(ScriptedCompleter::new("unused"));
        let p = pipeline(
            Arc::new(TopicEmbedder::new()),
            completer.clone(),
            RetrievalSettings::default(),
        );
        let result = p.search(&SearchRequest::new("sleep")).await.unwrap();
        assert_eq!(result.answer, NO_RESULTS_ANSWER);
        assert_eq!(result.evidence.reasoning, "No evidence available");
        assert!(result.citations.is_empty());
        assert!(completer.contexts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_filters_drop_documents_and_chunks() {
        let p = pipeline(
            Arc::new(TopicEmbedder::new()),
            Arc::new(ScriptedCompleter::new("ok")),
            RetrievalSettings {
                match_threshold: 0.0,
                ..RetrievalSettings::default()
            },
        );
        p.ingest_document(&doc("meta", StudyType::MetaAnalysis, "Sleep and stress."))
            .await
            .unwrap();
        p.ingest_document(&doc("cohort", StudyType::CohortStudy, "Sleep and stress again."))
            .await
            .unwrap();

        let unfiltered = p.search(&SearchRequest::new("sleep")).await.unwrap();
        assert_eq!(unfiltered.documents.len(), 2);

        let mut request = SearchRequest::new("sleep");
        request.filters = SearchFilters {
            study_types: vec![StudyType::CohortStudy],
            ..SearchFilters::default()
        };
        let filtered = p.search(&request).await.unwrap();
        assert_eq!(filtered.documents.len(), 1);
        assert!(filtered.chunks.iter().all(|c| c.document.id == "cohort"));
        assert_eq!(filtered.citations.len(), filtered.chunks.len());
        assert_eq!(filtered.search_metadata.total_results, 2);
    }

    #[tokio::test]
    async fn test_search_with_model_grade() {
        let p = pipeline(
            Arc::new(TopicEmbedder::new()),
            Arc::new(ScriptedCompleter::new("Answer [1].")),
            RetrievalSettings {
                model_grading: true,
                ..RetrievalSettings::default()
            },
        );
        p.ingest_document(&doc("d", StudyType::CohortStudy, "Sleep quality."))
            .await
            .unwrap();
        let result = p.search(&SearchRequest::new("sleep")).await.unwrap();
        let model = result.model_grade.unwrap();
        assert_eq!(model.strength, EvidenceStrength::Moderate);
        assert_eq!(model.score, 64);
    }

    #[tokio::test]
    async fn test_search_request_validation() {
        let p = pipeline(
            Arc::new(TopicEmbedder::new()),
            Arc::new(ScriptedCompleter::new("")),
            RetrievalSettings::default(),
        );
        assert!(p.search(&SearchRequest::new("   ")).await.is_err());
        assert!(p.search(&SearchRequest::new("x".repeat(501))).await.is_err());
        assert_eq!(p.validate_request(&SearchRequest::new("x".repeat(500))), Ok(10));

        let mut request = SearchRequest::new("sleep");
        request.limit = Some(0);
        assert!(p.validate_request(&request).is_err());
        request.limit = Some(51);
        assert!(p.validate_request(&request).is_err());
        request.limit = Some(50);
        assert_eq!(p.validate_request(&request), Ok(50));
    }

    #[test]
    fn test_citation_preview_truncates_by_chars() {
        let d = doc("d", StudyType::Review, "");
        let content = "é".repeat(150);
        let chunks = vec![RetrievedChunk {
            chunk: crate::models::ChunkMatch {
                chunk_id: "d-abstract-0".to_string(),
                document_id: "d".to_string(),
                content,
                chunk_index: 0,
                similarity: 0.9,
            },
            document: d,
        }];
        let citations = build_citations(&chunks);
        assert_eq!(citations[0].text.chars().count(), 103);
        assert!(citations[0].text.ends_with("..."));
    }
}
