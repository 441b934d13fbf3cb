//! Error taxonomy for the core engines.
//!
//! Collaborator failures (embedding, completion, store) are carried as
//! [`anyhow::Error`] and never wrapped here; these variants cover the
//! failures the core itself detects.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Chunking or retrieval parameters that would make processing fail.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A document record rejected at the ingestion boundary.
    #[error("malformed document '{id}': {reason}")]
    MalformedDocument { id: String, reason: String },

    /// A search request outside the accepted bounds.
    #[error("invalid search request: {0}")]
    InvalidRequest(String),
}

impl CoreError {
    pub fn malformed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::MalformedDocument {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
