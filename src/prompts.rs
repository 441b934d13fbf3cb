//! Prompt templates for answer generation and model-based evidence grading.

use wellness_rag_core::models::Document;

pub const ANSWER_SYSTEM_PROMPT: &str = "\
You are an expert in evidence-based wellness research. Your task is to provide accurate, concise answers based on the provided research context.

Guidelines:
- Always cite sources using inline numeric citations [1], [2], etc.
- Be objective and highlight any limitations or conflicting evidence
- Focus on actionable insights when appropriate
- If evidence is insufficient, clearly state this
- Use clear, accessible language while maintaining scientific accuracy
- Structure your response logically with clear conclusions";

pub const GRADING_SYSTEM_PROMPT: &str = "\
You are an expert in evidence grading for wellness research. Rate the evidence strength as Strong, Moderate, Weak, or Insufficient based on:

Study Quality Hierarchy (highest to lowest):
1. Meta-analyses and systematic reviews
2. Randomized controlled trials (RCTs)
3. Cohort studies
4. Case-control studies
5. Cross-sectional studies
6. Case studies

Additional Factors:
- Sample sizes (larger is better)
- Recency (newer is better, within 5 years preferred)
- Conflicts of interest (fewer is better)
- Consistency of findings across studies

Provide a score from 0-100 and brief reasoning for your assessment.";

pub fn answer_prompt(query: &str, context: &str) -> String {
    format!(
        "Query: {}\n\nResearch Context:\n{}\n\nPlease provide a comprehensive answer with proper citations. \
         Focus on the most relevant and highest-quality evidence.",
        query, context
    )
}

/// `- {title} ({study type}, n={sample size or N/A}, {year})`
pub fn document_summary_line(doc: &Document) -> String {
    let sample = doc
        .sample_size
        .map_or_else(|| "N/A".to_string(), |n| n.to_string());
    format!(
        "- {} ({}, n={}, {})",
        doc.title,
        doc.study_type,
        sample,
        doc.publication_year()
    )
}

pub fn grading_prompt(docs: &[Document], answer: &str) -> String {
    let summary = docs
        .iter()
        .map(document_summary_line)
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Documents Summary:\n{}\n\nGenerated Answer:\n{}\n\nPlease grade the evidence strength and provide reasoning.",
        summary, answer
    )
}
