//! Embedding providers backed by configuration.
//!
//! - **[`DisabledEmbedder`]** returns errors; used when `embedding.provider = "disabled"`.
//! - **[`OpenAiEmbedder`]** calls the OpenAI embeddings API in batches of
//!   `embedding.batch_size`, with the retry policy of [`OpenAiClient`].
//!
//! Use [`create_embedder`] to pick one from [`EmbeddingConfig`].

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use wellness_rag_core::embedding::EmbeddingProvider;

use crate::config::EmbeddingConfig;
use crate::openai::OpenAiClient;

/// Placeholder provider that refuses to embed.
pub struct DisabledEmbedder;

#[async_trait]
impl EmbeddingProvider for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled. Set [embedding] provider = \"openai\" in config.")
    }
}

pub struct OpenAiEmbedder {
    client: OpenAiClient,
    model: String,
    dims: usize,
    batch_size: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client =
            OpenAiClient::from_env(&config.api_base, config.timeout_secs, config.max_retries)?;
        Ok(Self {
            client,
            model: config.model.clone(),
            dims: config.dims,
            batch_size: config.batch_size.max(1),
        })
    }

    fn request_body(&self, texts: &[String]) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        // Only the v3 models accept a custom dimension count
        if self.model.starts_with("text-embedding-3") {
            body["dimensions"] = serde_json::json!(self.dims);
        }
        body
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!(batch = batch.len(), model = %self.model, "requesting embeddings");
            let response = self
                .client
                .post_json("embeddings", &self.request_body(batch))
                .await?;
            vectors.extend(parse_embeddings_response(&response, batch.len(), self.dims)?);
        }
        Ok(vectors)
    }
}

/// Pull vectors out of an embeddings response, ordered by each item's `index`.
pub fn parse_embeddings_response(
    response: &serde_json::Value,
    expected: usize,
    dims: usize,
) -> Result<Vec<Vec<f32>>> {
    let data = response["data"]
        .as_array()
        .ok_or_else(|| anyhow!("Invalid embeddings response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let index = item["index"].as_u64().map_or(pos, |i| i as usize);
        let values = item["embedding"]
            .as_array()
            .ok_or_else(|| anyhow!("Invalid embeddings response: item {} has no embedding", pos))?;
        let vector: Vec<f32> = values
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Option<_>>()
            .ok_or_else(|| anyhow!("Invalid embeddings response: non-numeric value in item {}", pos))?;
        if dims > 0 && vector.len() != dims {
            bail!(
                "Embedding dimension mismatch: expected {}, got {}",
                dims,
                vector.len()
            );
        }
        indexed.push((index, vector));
    }

    if indexed.len() != expected {
        bail!(
            "Embedding count mismatch: expected {}, got {}",
            expected,
            indexed.len()
        );
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

/// Create the embedding provider named by `config.provider`.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "openai" => Ok(Arc::new(OpenAiEmbedder::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
