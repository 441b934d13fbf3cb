//! # Wellness RAG
//!
//! Evidence-graded, cited answers over a local corpus of wellness research.
//!
//! Research abstracts are validated, split into overlapping sentence-aware
//! chunks, embedded and stored in SQLite. A query is embedded, matched
//! against stored chunks by cosine similarity, answered by a language
//! model from the matched context, and graded by a deterministic
//! evidence-strength formula.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────┐
//! │  JSON file  │──▶│   Pipeline   │──▶│  SQLite  │
//! │  (records)  │   │ Chunk+Embed  │   │ Vectors  │
//! └─────────────┘   └──────────────┘   └────┬─────┘
//!                                           │
//!                 ┌─────────────────────────┤
//!                 ▼                         ▼
//!           ┌──────────┐            ┌──────────────┐
//!           │  Answer  │◀───────────│ Grade + Cite │
//!           │  (LLM)   │            │              │
//!           └──────────┘            └──────────────┘
//! ```
//!
//! The engines (chunker, grader, pipeline) live in `wellness-rag-core`
//! and do no I/O. This crate supplies configuration, the SQLite store,
//! the OpenAI providers and the `wrag` CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation and reset |
//! | [`sqlite_store`] | SQLite implementation of the core `Store` |
//! | [`openai`] | Shared OpenAI HTTP client with retries |
//! | [`embedding`] | Embedding providers |
//! | [`completion`] | Completion providers |
//! | [`prompts`] | Prompt templates |
//! | [`pipeline`] | Config-driven pipeline construction |
//! | [`ingest`] | Document file ingestion |
//! | [`search`] | Query command |
//! | [`grade`] | Offline grading command |
//! | [`embed_cmd`] | Re-embedding command |
//! | [`stats`] | Stats and health commands |
//! | [`logging`] | Tracing subscriber setup |

pub mod completion;
pub mod config;
pub mod db;
pub mod embed_cmd;
pub mod embedding;
pub mod grade;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod openai;
pub mod pipeline;
pub mod prompts;
pub mod search;
pub mod sqlite_store;
pub mod stats;
