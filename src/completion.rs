//! Completion providers: answer generation and the model's evidence estimate.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use wellness_rag_core::completion::CompletionProvider;
use wellness_rag_core::models::Document;

use crate::config::CompletionConfig;
use crate::openai::OpenAiClient;
use crate::prompts;

/// Refuses every request; used when `completion.provider = "disabled"`.
pub struct DisabledCompleter;

#[async_trait]
impl CompletionProvider for DisabledCompleter {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate_answer(&self, _query: &str, _context: &str) -> Result<String> {
        bail!("Completion provider is disabled. Set [completion] provider = \"openai\" in config.")
    }

    async fn estimate_grade(&self, _docs: &[Document], _answer: &str) -> Result<String> {
        bail!("Completion provider is disabled. Set [completion] provider = \"openai\" in config.")
    }
}

pub struct OpenAiCompleter {
    client: OpenAiClient,
    config: CompletionConfig,
}

impl OpenAiCompleter {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let client =
            OpenAiClient::from_env(&config.api_base, config.timeout_secs, config.max_retries)?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    async fn chat(
        &self,
        system: &str,
        user: String,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let body = chat_request(&self.config.model, system, &user, temperature, max_tokens);
        debug!(model = %self.config.model, prompt_chars = user.len(), "requesting completion");
        let response = self.client.post_json("chat/completions", &body).await?;
        parse_chat_response(&response)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompleter {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn generate_answer(&self, query: &str, context: &str) -> Result<String> {
        self.chat(
            prompts::ANSWER_SYSTEM_PROMPT,
            prompts::answer_prompt(query, context),
            self.config.temperature,
            self.config.max_tokens,
        )
        .await
    }

    async fn estimate_grade(&self, docs: &[Document], answer: &str) -> Result<String> {
        self.chat(
            prompts::GRADING_SYSTEM_PROMPT,
            prompts::grading_prompt(docs, answer),
            self.config.grading_temperature,
            self.config.grading_max_tokens,
        )
        .await
    }
}

pub fn chat_request(
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
    max_tokens: u32,
) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": user}
        ],
        "temperature": temperature,
        "max_tokens": max_tokens,
    })
}

/// Content of the first choice. A null content (e.g. a refusal) reads as empty.
pub fn parse_chat_response(response: &serde_json::Value) -> Result<String> {
    let choice = response["choices"]
        .as_array()
        .and_then(|choices| choices.first())
        .ok_or_else(|| anyhow!("Invalid completion response: no choices"))?;
    Ok(choice["message"]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string())
}

pub fn create_completer(config: &CompletionConfig) -> Result<Arc<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledCompleter)),
        "openai" => Ok(Arc::new(OpenAiCompleter::new(config)?)),
        other => bail!("Unknown completion provider: {}", other),
    }
}
