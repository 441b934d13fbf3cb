//! Wires configuration into a [`RagPipeline`] over the SQLite store.

use anyhow::Result;
use std::sync::Arc;

use wellness_rag_core::completion::CompletionProvider;
use wellness_rag_core::rag::RagPipeline;

use crate::completion::{create_completer, DisabledCompleter};
use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::sqlite_store::SqliteStore;

/// Which providers a command actually calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    /// Ingest and re-embed: the completion provider is never used.
    Indexing,
    Querying,
}

/// Connect to the database and build a pipeline from config.
///
/// For [`Usage::Indexing`] the completion provider is left disabled so a
/// missing API key only matters for the provider that needs it.
pub async fn open(config: &Config, usage: Usage) -> Result<RagPipeline<SqliteStore>> {
    let embedder = create_embedder(&config.embedding)?;
    let completer: Arc<dyn CompletionProvider> = match usage {
        Usage::Indexing => Arc::new(DisabledCompleter),
        Usage::Querying => create_completer(&config.completion)?,
    };
    let pool = db::connect(config).await?;
    let pipeline = RagPipeline::new(
        SqliteStore::new(pool),
        embedder,
        completer,
        config.chunking.options(),
        config.retrieval.settings(),
    )?;
    Ok(pipeline)
}
