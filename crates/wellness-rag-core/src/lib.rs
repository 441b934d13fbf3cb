//! # Wellness RAG Core
//!
//! Pure logic for the wellness research search service: document models,
//! the sentence-aware chunker, the evidence grader, provider traits, the
//! store abstraction, and the retrieval pipeline that ties them together.
//!
//! This crate performs no filesystem or network I/O. Embedding, completion
//! and storage backends are injected by the application through the
//! [`embedding::EmbeddingProvider`], [`completion::CompletionProvider`] and
//! [`store::Store`] traits.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Documents, chunks, grades, citations, search requests |
//! | [`error`] | Configuration, malformed-input and request errors |
//! | [`chunk`] | Overlapping, sentence-aware text chunker |
//! | [`grading`] | Deterministic evidence grading |
//! | [`embedding`] | Embedding provider trait and vector utilities |
//! | [`completion`] | Completion provider trait, model grade parsing, citation markers |
//! | [`store`] | Storage trait and in-memory implementation |
//! | [`rag`] | Ingestion and query pipeline |

pub mod chunk;
pub mod completion;
pub mod embedding;
pub mod error;
pub mod grading;
pub mod models;
pub mod rag;
pub mod store;

pub use error::CoreError;
