//! Completion provider trait and answer post-processing.
//!
//! The [`CompletionProvider`] writes the cited answer and, optionally, a
//! free-text evidence estimate. [`parse_model_grade`] turns that estimate
//! into a [`ModelGrade`]; it is a secondary signal and never replaces the
//! deterministic grade from [`crate::grading`].

use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Document, EvidenceStrength, ModelGrade};

static STRENGTH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(strong|moderate|weak|insufficient)\b").expect("Invalid strength regex pattern")
});

static SCORE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+").expect("Invalid score regex pattern"));

// Matches [3] and [1, 2]
static CITATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(\d+(?:\s*,\s*\d+)*)\]").expect("Invalid citation regex pattern")
});

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn model_name(&self) -> &str;

    /// Answer `query` from `context`, citing context entries as `[n]`.
    async fn generate_answer(&self, query: &str, context: &str) -> Result<String>;

    /// Ask the model to grade the documents behind `answer`. Returns raw text.
    async fn estimate_grade(&self, docs: &[Document], answer: &str) -> Result<String>;
}

/// Parse a model's free-text grade.
///
/// Strength is the first of Strong/Moderate/Weak/Insufficient mentioned
/// (any case), defaulting to Insufficient. Score is the first integer,
/// clamped to 100, defaulting to 0. Reasoning is the trimmed text.
pub fn parse_model_grade(text: &str) -> ModelGrade {
    let strength = STRENGTH_PATTERN
        .find(text)
        .and_then(|m| m.as_str().parse::<EvidenceStrength>().ok())
        .unwrap_or(EvidenceStrength::Insufficient);

    let score = SCORE_PATTERN
        .find(text)
        .map(|m| m.as_str().parse::<u64>().map_or(100, |n| n.min(100)) as u8)
        .unwrap_or(0);

    ModelGrade {
        strength,
        score,
        reasoning: text.trim().to_string(),
    }
}

/// Citation numbers referenced in an answer, in first-mention order, deduplicated.
pub fn extract_citation_markers(answer: &str) -> Vec<usize> {
    let mut markers = Vec::new();
    for caps in CITATION_PATTERN.captures_iter(answer) {
        for n in caps[1].split(',').filter_map(|s| s.trim().parse::<usize>().ok()) {
            if !markers.contains(&n) {
                markers.push(n);
            }
        }
    }
    markers
}

/// Markers outside `1..=available`.
pub fn dangling_citations(answer: &str, available: usize) -> Vec<usize> {
    extract_citation_markers(answer)
        .into_iter()
        .filter(|&n| n == 0 || n > available)
        .collect()
}
