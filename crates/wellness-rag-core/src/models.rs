//! Core data models used throughout Wellness RAG.
//!
//! These types represent the research documents, chunks, evidence grades
//! and query results that flow through the ingestion and retrieval
//! pipeline. Raw input arrives as a loosely-typed [`DocumentRecord`] and is
//! validated once into a [`Document`]; everything downstream works with the
//! validated type.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Research design classification, ordered informally by evidentiary strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StudyType {
    #[serde(rename = "Meta-Analysis")]
    MetaAnalysis,
    #[serde(rename = "Systematic Review")]
    SystematicReview,
    #[serde(rename = "Randomized Controlled Trial")]
    RandomizedControlledTrial,
    #[serde(rename = "Cohort Study")]
    CohortStudy,
    #[serde(rename = "Case-Control Study")]
    CaseControlStudy,
    #[serde(rename = "Cross-Sectional Study")]
    CrossSectionalStudy,
    #[serde(rename = "Case Study")]
    CaseStudy,
    Review,
    Other,
}

impl StudyType {
    pub const ALL: [StudyType; 9] = [
        StudyType::MetaAnalysis,
        StudyType::SystematicReview,
        StudyType::RandomizedControlledTrial,
        StudyType::CohortStudy,
        StudyType::CaseControlStudy,
        StudyType::CrossSectionalStudy,
        StudyType::CaseStudy,
        StudyType::Review,
        StudyType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StudyType::MetaAnalysis => "Meta-Analysis",
            StudyType::SystematicReview => "Systematic Review",
            StudyType::RandomizedControlledTrial => "Randomized Controlled Trial",
            StudyType::CohortStudy => "Cohort Study",
            StudyType::CaseControlStudy => "Case-Control Study",
            StudyType::CrossSectionalStudy => "Cross-Sectional Study",
            StudyType::CaseStudy => "Case Study",
            StudyType::Review => "Review",
            StudyType::Other => "Other",
        }
    }
}

impl fmt::Display for StudyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StudyType {
    type Err = String;

    /// Case-insensitive match on the canonical name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        StudyType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown study type '{}'", wanted))
    }
}

/// A validated bibliographic record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub authors: Vec<String>,
    pub journal: String,
    pub publication_date: NaiveDate,
    pub doi: Option<String>,
    pub pmid: Option<String>,
    pub url: Option<String>,
    pub study_type: StudyType,
    /// Always positive when present.
    pub sample_size: Option<u32>,
    #[serde(default)]
    pub conflicts_of_interest: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Document {
    pub fn publication_year(&self) -> i32 {
        self.publication_date.year()
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts_of_interest.is_empty()
    }
}

/// Unvalidated document input as it arrives from JSON files.
///
/// Accepts both camelCase and snake_case field names. Convert with
/// `Document::try_from(record)`, which is the only place publication dates,
/// study types and sample sizes are checked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub journal: String,
    #[serde(default, alias = "publication_date")]
    pub publication_date: Option<String>,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub pmid: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, alias = "study_type")]
    pub study_type: Option<String>,
    #[serde(default, alias = "sample_size")]
    pub sample_size: Option<i64>,
    #[serde(default, alias = "conflicts_of_interest")]
    pub conflicts_of_interest: Option<Vec<String>>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl TryFrom<DocumentRecord> for Document {
    type Error = CoreError;

    fn try_from(record: DocumentRecord) -> Result<Self, Self::Error> {
        let id = record.id.trim().to_string();
        if id.is_empty() {
            return Err(CoreError::malformed("<missing>", "id is required"));
        }
        if record.title.trim().is_empty() {
            return Err(CoreError::malformed(id, "title is required"));
        }

        let raw_date = match record.publication_date.as_deref().map(str::trim) {
            Some(d) if !d.is_empty() => d,
            _ => return Err(CoreError::malformed(id, "publication date is required")),
        };
        let publication_date = parse_publication_date(raw_date).ok_or_else(|| {
            CoreError::malformed(id.clone(), format!("invalid publication date '{}'", raw_date))
        })?;

        let study_type = match record.study_type.as_deref() {
            Some(s) => StudyType::from_str(s).map_err(|e| CoreError::malformed(id.clone(), e))?,
            None => return Err(CoreError::malformed(id, "study type is required")),
        };

        let sample_size = match record.sample_size {
            None => None,
            Some(n) if n <= 0 => {
                return Err(CoreError::malformed(
                    id,
                    format!("sample size must be positive, got {}", n),
                ))
            }
            Some(n) => Some(u32::try_from(n).map_err(|_| {
                CoreError::malformed(id.clone(), format!("sample size {} is out of range", n))
            })?),
        };

        Ok(Document {
            id,
            title: record.title.trim().to_string(),
            abstract_text: record.abstract_text,
            authors: record.authors,
            journal: record.journal,
            publication_date,
            doi: non_blank(record.doi),
            pmid: non_blank(record.pmid),
            url: non_blank(record.url),
            study_type,
            sample_size,
            conflicts_of_interest: record
                .conflicts_of_interest
                .unwrap_or_default()
                .into_iter()
                .filter(|c| !c.trim().is_empty())
                .collect(),
            keywords: record.keywords,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse a publication date given as `YYYY-MM-DD`, RFC 3339, `YYYY-MM` or `YYYY`.
///
/// Partial dates resolve to the first day of the month or year.
pub fn parse_publication_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    if let Ok(d) = NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d") {
        return Some(d);
    }
    if raw.len() == 4 && raw.chars().all(|c| c.is_ascii_digit()) {
        return NaiveDate::parse_from_str(&format!("{}-01-01", raw), "%Y-%m-%d").ok();
    }
    None
}

/// Document section a chunk was cut from.
///
/// Only `Abstract` is produced today; the rest are reserved for full-text
/// ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Abstract,
    Methods,
    Results,
    Discussion,
    Conclusion,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Abstract => "abstract",
            Section::Methods => "methods",
            Section::Results => "results",
            Section::Discussion => "discussion",
            Section::Conclusion => "conclusion",
        }
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abstract" => Ok(Section::Abstract),
            "methods" => Ok(Section::Methods),
            "results" => Ok(Section::Results),
            "discussion" => Ok(Section::Discussion),
            "conclusion" => Ok(Section::Conclusion),
            other => Err(format!("unknown section '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub section: Section,
    pub page_number: Option<u32>,
    pub word_count: usize,
}

/// A chunk of a document's text, the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// `{document_id}-{section}-{index}`.
    pub id: String,
    pub document_id: String,
    pub content: String,
    pub chunk_index: i64,
    pub metadata: ChunkMetadata,
    /// SHA-256 of `content`, hex encoded.
    pub hash: String,
}

/// A chunk returned by vector similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMatch {
    pub chunk_id: String,
    pub document_id: String,
    pub content: String,
    pub chunk_index: i64,
    pub similarity: f64,
}

/// A search hit joined with its parent document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedChunk {
    #[serde(flatten)]
    pub chunk: ChunkMatch,
    pub document: Document,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub id: String,
    pub document_id: String,
    pub chunk_id: String,
    pub text: String,
    /// 1-based position matching the `[n]` markers in the answer.
    pub position: usize,
}

/// Four-level ordinal summary of evidentiary quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EvidenceStrength {
    Insufficient,
    Weak,
    Moderate,
    Strong,
}

impl EvidenceStrength {
    pub const ALL: [EvidenceStrength; 4] = [
        EvidenceStrength::Insufficient,
        EvidenceStrength::Weak,
        EvidenceStrength::Moderate,
        EvidenceStrength::Strong,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceStrength::Insufficient => "Insufficient",
            EvidenceStrength::Weak => "Weak",
            EvidenceStrength::Moderate => "Moderate",
            EvidenceStrength::Strong => "Strong",
        }
    }
}

impl fmt::Display for EvidenceStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvidenceStrength {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        EvidenceStrength::ALL
            .iter()
            .copied()
            .find(|e| e.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown evidence strength '{}'", wanted))
    }
}

/// Inputs the grading formula was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceFactors {
    pub study_types: Vec<StudyType>,
    pub sample_sizes: Vec<u32>,
    /// Mean age in years relative to the grading year.
    pub recency: f64,
    pub conflicts_of_interest: bool,
    pub meta_analysis_present: bool,
    pub rct_present: bool,
}

impl EvidenceFactors {
    pub fn empty() -> Self {
        Self {
            study_types: Vec::new(),
            sample_sizes: Vec::new(),
            recency: 0.0,
            conflicts_of_interest: false,
            meta_analysis_present: false,
            rct_present: false,
        }
    }

    /// Mean of the observed sample sizes, `None` when no document reports one.
    pub fn mean_sample_size(&self) -> Option<f64> {
        if self.sample_sizes.is_empty() {
            return None;
        }
        let total: u64 = self.sample_sizes.iter().map(|&n| u64::from(n)).sum();
        Some(total as f64 / self.sample_sizes.len() as f64)
    }
}

/// Deterministic grade for a document set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceGrade {
    pub strength: EvidenceStrength,
    /// In `0..=100`.
    pub score: u8,
    pub factors: EvidenceFactors,
    pub reasoning: String,
}

/// Strength estimate produced by a language model.
///
/// Secondary signal only; [`EvidenceGrade`] is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelGrade {
    pub strength: EvidenceStrength,
    pub score: u8,
    pub reasoning: String,
}

/// Inclusive publication date bounds; either side may be open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    #[serde(default)]
    pub study_types: Vec<StudyType>,
    #[serde(default)]
    pub date_range: Option<DateRange>,
    #[serde(default)]
    pub min_sample_size: Option<u32>,
    #[serde(default)]
    pub exclude_conflicts: bool,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.study_types.is_empty()
            && self.date_range.is_none()
            && self.min_sample_size.is_none()
            && !self.exclude_conflicts
    }

    /// Whether a document passes every configured filter.
    ///
    /// A minimum sample size excludes documents that report none.
    pub fn matches(&self, doc: &Document) -> bool {
        if !self.study_types.is_empty() && !self.study_types.contains(&doc.study_type) {
            return false;
        }
        if let Some(range) = &self.date_range {
            if range.start.is_some_and(|s| doc.publication_date < s) {
                return false;
            }
            if range.end.is_some_and(|e| doc.publication_date > e) {
                return false;
            }
        }
        if let Some(min) = self.min_sample_size {
            if doc.sample_size.map_or(true, |n| n < min) {
                return false;
            }
        }
        if self.exclude_conflicts && doc.has_conflicts() {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub filters: SearchFilters,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }
}

/// Timings and bookkeeping for one search, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMetadata {
    pub request_id: String,
    pub query: String,
    pub total_results: usize,
    pub search_time_ms: u64,
    pub embedding_time_ms: u64,
    pub retrieval_time_ms: u64,
    pub generation_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub evidence: EvidenceGrade,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_grade: Option<ModelGrade>,
    pub documents: Vec<Document>,
    pub chunks: Vec<RetrievedChunk>,
    pub search_metadata: SearchMetadata,
}
