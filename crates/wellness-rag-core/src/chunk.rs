//! Sentence-aware overlapping text chunker.
//!
//! Splits a document's abstract into bounded, overlapping windows suitable
//! for embedding. Consecutive chunks share up to `overlap_size` characters
//! so that context spanning a boundary is retrievable from either side.
//!
//! Sizes are measured in Unicode scalar values (`char`s), never bytes, so
//! slicing is always on a valid UTF-8 boundary.
//!
//! # Algorithm
//!
//! 1. Reject `max_chunk_size == 0` and `overlap_size >= max_chunk_size`.
//! 2. Text no longer than `max_chunk_size` is returned whole, untrimmed.
//! 3. Otherwise the window ends `max_chunk_size` chars past the cursor.
//! 4. With `preserve_sentences`, and while the window ends before the text
//!    does, find the last `.`, `!` or `?` at or before the window end. If it
//!    sits past the window's midpoint, end the window just after it, so a
//!    terminator right at the boundary stretches the window by one char.
//! 5. Trim the window (clipped to the text) and keep it if non-empty.
//! 6. Move the cursor to `window_end - overlap_size`, always at least one
//!    char forward, and stop once it reaches the end of the text. The window
//!    end is not clipped here, so the last window may be followed by a short
//!    tail chunk made of its overlap.
//!
//! Abbreviations such as "Dr." or "et al." count as terminators.
//!
//! # Example
//!
//! ```rust
//! use wellness_rag_core::chunk::{chunk_text, ChunkingOptions};
//!
//! let opts = ChunkingOptions { max_chunk_size: 40, overlap_size: 0, preserve_sentences: true };
//! let text = "The first sentence is here. The second one follows it. The third closes.";
//! let chunks = chunk_text(text, &opts).unwrap();
//! assert_eq!(chunks[0], "The first sentence is here.");
//! assert_eq!(chunks.len(), 3);
//! ```

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::error::CoreError;
use crate::models::{Chunk, ChunkMetadata, Document, Section};

pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_OVERLAP_SIZE: usize = 200;

/// Parameters for [`chunk_text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingOptions {
    /// Maximum chunk length in characters.
    pub max_chunk_size: usize,
    /// Characters shared by consecutive chunks. Must be below `max_chunk_size`.
    pub overlap_size: usize,
    pub preserve_sentences: bool,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            overlap_size: DEFAULT_OVERLAP_SIZE,
            preserve_sentences: true,
        }
    }
}

impl ChunkingOptions {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_chunk_size == 0 {
            return Err(CoreError::InvalidConfig(
                "chunking.max_chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.overlap_size >= self.max_chunk_size {
            return Err(CoreError::InvalidConfig(format!(
                "chunking.overlap_size ({}) must be less than chunking.max_chunk_size ({})",
                self.overlap_size, self.max_chunk_size
            )));
        }
        Ok(())
    }
}

/// Split text into overlapping, sentence-aware chunks.
///
/// Text that fits in one window comes back as a single untrimmed element,
/// including the empty string. Longer text yields trimmed, non-empty
/// chunks in source order.
///
/// A chunk holds at most `max_chunk_size` chars, or one more when a
/// sentence terminator sits exactly at the window boundary.
pub fn chunk_text(text: &str, opts: &ChunkingOptions) -> Result<Vec<String>, CoreError> {
    opts.validate()?;

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    if len <= opts.max_chunk_size {
        return Ok(vec![text.to_string()]);
    }

    // offsets[i] is the byte offset of char i; offsets[len] == text.len()
    let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    offsets.push(text.len());

    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        // Unclipped; the cursor advance below depends on it
        let mut end = start + opts.max_chunk_size;

        if opts.preserve_sentences && end < len {
            if let Some(pos) = (start..=end)
                .rev()
                .find(|&i| is_sentence_terminator(chars[i]))
            {
                if (pos - start) * 2 > opts.max_chunk_size {
                    end = pos + 1;
                }
            }
        }

        let piece = text[offsets[start]..offsets[end.min(len)]].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        let next = end.saturating_sub(opts.overlap_size).max(start + 1);
        if next >= len {
            break;
        }
        start = next;
    }

    Ok(chunks)
}

fn is_sentence_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Chunk a document's abstract into [`Chunk`] entities.
///
/// Ids are `{document_id}-abstract-{index}`. The only section produced is
/// [`Section::Abstract`]. An empty abstract yields one empty chunk; callers
/// decide whether to keep it.
pub fn chunk_document(doc: &Document, opts: &ChunkingOptions) -> Result<Vec<Chunk>, CoreError> {
    let section = Section::Abstract;
    let chunks = chunk_text(&doc.abstract_text, opts)?
        .into_iter()
        .enumerate()
        .map(|(index, content)| Chunk {
            id: format!("{}-{}-{}", doc.id, section.as_str(), index),
            document_id: doc.id.clone(),
            chunk_index: index as i64,
            metadata: ChunkMetadata {
                section,
                page_number: None,
                word_count: word_count(&content),
            },
            hash: content_hash(&content),
            content,
        })
        .collect();
    Ok(chunks)
}

/// Number of whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// SHA-256 of the text, hex encoded.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Collapse whitespace runs (newlines included) to single spaces and trim.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Most frequent words longer than three characters.
///
/// Lowercases, deletes every character that is not alphanumeric, `_` or
/// whitespace, and counts whitespace-separated tokens. Ties keep the order
/// in which tokens first appear. No stemming or stopword removal.
pub fn extract_key_phrases(text: &str, max_phrases: usize) -> Vec<String> {
    let stripped: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();

    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for word in stripped.split_whitespace() {
        if word.chars().count() <= 3 {
            continue;
        }
        let count = counts.entry(word.to_string()).or_insert(0);
        if *count == 0 {
            order.push(word.to_string());
        }
        *count += 1;
    }

    // sort_by is stable, so equal counts stay in first-occurrence order
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order.truncate(max_phrases);
    order
}
