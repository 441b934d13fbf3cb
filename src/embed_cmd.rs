//! The `wrag reembed` command: fill in missing chunk embeddings.

use anyhow::{bail, Result};

use wellness_rag_core::store::Store;

use crate::config::Config;
use crate::pipeline::{self, Usage};

/// Re-embed one chunk, or every chunk still missing a vector.
pub async fn run_reembed(
    config: &Config,
    chunk_id: Option<&str>,
    limit: Option<usize>,
    batch_size_override: Option<usize>,
    dry_run: bool,
) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let pipeline = pipeline::open(config, Usage::Indexing).await?;

    if let Some(id) = chunk_id {
        if dry_run {
            println!("reembed {} (dry-run)", id);
        } else {
            pipeline.reembed_chunk(id).await?;
            println!("reembed {}", id);
            println!("ok");
        }
        pipeline.store().pool().close().await;
        return Ok(());
    }

    if dry_run {
        let stats = pipeline.store().stats().await?;
        println!("reembed pending (dry-run)");
        println!("  chunks needing embeddings: {}", stats.pending_chunks());
        pipeline.store().pool().close().await;
        return Ok(());
    }

    let batch_size = batch_size_override.unwrap_or(config.embedding.batch_size);
    let report = pipeline.reembed_pending(batch_size, limit).await?;

    println!("reembed pending");
    if report.total == 0 {
        println!("  all chunks up to date");
    } else {
        println!("  total pending: {}", report.total);
        println!("  embedded: {}", report.embedded);
        println!("  failed: {}", report.failed);
    }

    pipeline.store().pool().close().await;
    Ok(())
}
