//! Research document ingestion.
//!
//! Reads a JSON file of document records, validates each one, optionally
//! normalizes abstracts and fills missing keywords, then chunks and stores
//! them. With an embedding provider configured the chunks are embedded
//! inline; otherwise they are staged for `wrag reembed`.
//!
//! A malformed record is reported and skipped. It never aborts the run.

use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::{info, warn};

use wellness_rag_core::chunk::{chunk_text, clean_text, extract_key_phrases};
use wellness_rag_core::models::{Document, DocumentRecord};
use wellness_rag_core::CoreError;

use crate::config::{ChunkingConfig, Config};
use crate::pipeline::{self, Usage};

/// Keywords derived from the abstract when a record carries none.
pub const DERIVED_KEYWORDS: usize = 10;

/// Parse a file holding either a JSON array of records or `{"documents": [...]}`.
pub fn load_records(path: &Path) -> Result<Vec<DocumentRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read documents file: {}", path.display()))?;
    parse_records(&content).with_context(|| format!("Invalid documents file: {}", path.display()))
}

pub fn parse_records(content: &str) -> Result<Vec<DocumentRecord>> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("documents") {
            Some(serde_json::Value::Array(items)) => items,
            _ => bail!("expected a JSON array or an object with a \"documents\" array"),
        },
        _ => bail!("expected a JSON array or an object with a \"documents\" array"),
    };

    // Each record is decoded on its own so field-level problems surface per record
    let mut records = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        let record: DocumentRecord = serde_json::from_value(item)
            .with_context(|| format!("record {} is not a document object", i))?;
        records.push(record);
    }
    Ok(records)
}

/// Validate records and apply ingest-time enrichment.
pub fn prepare_documents(
    records: Vec<DocumentRecord>,
    chunking: &ChunkingConfig,
) -> (Vec<Document>, Vec<CoreError>) {
    let mut documents = Vec::new();
    let mut rejected = Vec::new();

    for record in records {
        match Document::try_from(record) {
            Ok(mut doc) => {
                if chunking.normalize_whitespace {
                    doc.abstract_text = clean_text(&doc.abstract_text);
                }
                if doc.keywords.is_empty() {
                    doc.keywords = extract_key_phrases(&doc.abstract_text, DERIVED_KEYWORDS);
                }
                documents.push(doc);
            }
            Err(e) => rejected.push(e),
        }
    }

    (documents, rejected)
}

pub async fn run_ingest(
    config: &Config,
    path: &Path,
    dry_run: bool,
    limit: Option<usize>,
) -> Result<()> {
    let mut records = load_records(path)?;
    if let Some(lim) = limit {
        records.truncate(lim);
    }
    let total = records.len();
    let (documents, rejected) = prepare_documents(records, &config.chunking);

    for err in &rejected {
        warn!(error = %err, "skipping record");
    }

    if dry_run {
        let opts = config.chunking.options();
        let mut estimated = 0usize;
        for doc in &documents {
            estimated += chunk_text(&doc.abstract_text, &opts)?.len();
        }
        println!("ingest {} (dry-run)", path.display());
        println!("  records: {}", total);
        println!("  valid documents: {}", documents.len());
        println!("  rejected: {}", rejected.len());
        print_rejected(&rejected);
        println!("  estimated chunks: {}", estimated);
        return Ok(());
    }

    let pipeline = pipeline::open(config, Usage::Indexing).await?;
    let embed_inline = config.embedding.is_enabled();

    let mut stored = 0usize;
    let mut chunks_written = 0usize;
    let mut embedded = 0usize;
    let mut failed = 0usize;

    for doc in &documents {
        let result = if embed_inline {
            pipeline.ingest_document(doc).await
        } else {
            pipeline.stage_document(doc).await
        };
        match result {
            Ok(report) => {
                stored += 1;
                chunks_written += report.chunks;
                if report.embedded {
                    embedded += report.chunks;
                }
            }
            Err(e) => {
                warn!(document_id = %doc.id, error = %e, "ingest failed");
                failed += 1;
            }
        }
    }

    info!(stored, failed, chunks = chunks_written, "ingest finished");

    println!("ingest {}", path.display());
    println!("  records: {}", total);
    println!("  stored documents: {}", stored);
    println!("  chunks written: {}", chunks_written);
    if embed_inline {
        println!("  chunks embedded: {}", embedded);
    } else {
        println!("  chunks pending embedding: {}", chunks_written);
    }
    println!("  rejected: {}", rejected.len());
    print_rejected(&rejected);
    if failed > 0 {
        println!("  failed: {}", failed);
    }
    println!("ok");

    pipeline.store().pool().close().await;
    Ok(())
}

fn print_rejected(rejected: &[CoreError]) {
    for err in rejected {
        println!("    - {}", err);
    }
}
