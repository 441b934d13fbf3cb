//! The `wrag search` command: ask a question, print a graded, cited answer.

use anyhow::{anyhow, Result};

use wellness_rag_core::models::{
    parse_publication_date, DateRange, QueryResult, SearchFilters, SearchRequest, StudyType,
};

use crate::config::Config;
use crate::pipeline::{self, Usage};

/// Filter flags as given on the command line.
#[derive(Debug, Default, Clone)]
pub struct FilterArgs {
    pub study_types: Vec<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub min_sample_size: Option<u32>,
    pub exclude_conflicts: bool,
}

impl FilterArgs {
    pub fn into_filters(self) -> Result<SearchFilters> {
        let study_types = self
            .study_types
            .iter()
            .map(|s| s.parse::<StudyType>().map_err(|e| anyhow!(e)))
            .collect::<Result<Vec<_>>>()?;

        let start = parse_bound(self.since.as_deref(), "--since")?;
        let end = parse_bound(self.until.as_deref(), "--until")?;
        let date_range = if start.is_some() || end.is_some() {
            Some(DateRange { start, end })
        } else {
            None
        };

        Ok(SearchFilters {
            study_types,
            date_range,
            min_sample_size: self.min_sample_size,
            exclude_conflicts: self.exclude_conflicts,
        })
    }
}

fn parse_bound(raw: Option<&str>, flag: &str) -> Result<Option<chrono::NaiveDate>> {
    match raw {
        None => Ok(None),
        Some(s) => parse_publication_date(s)
            .map(Some)
            .ok_or_else(|| anyhow!("Invalid {} date '{}': expected YYYY-MM-DD, YYYY-MM or YYYY", flag, s)),
    }
}

pub async fn run_search(
    config: &Config,
    query: &str,
    limit: Option<usize>,
    filters: FilterArgs,
    json: bool,
) -> Result<()> {
    let request = SearchRequest {
        query: query.to_string(),
        limit,
        filters: filters.into_filters()?,
    };

    let pipeline = pipeline::open(config, Usage::Querying).await?;
    // Reject bad requests before any provider call
    pipeline.validate_request(&request)?;
    let result = pipeline.search(&request).await?;
    pipeline.store().pool().close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

fn print_result(result: &QueryResult) {
    println!("{}", result.answer);
    println!();
    println!(
        "Evidence: {} (score {}/100)",
        result.evidence.strength, result.evidence.score
    );
    println!("  {}", result.evidence.reasoning);
    if let Some(model) = &result.model_grade {
        println!("Model estimate: {} (score {}/100)", model.strength, model.score);
    }

    if !result.citations.is_empty() {
        println!();
        println!("Sources:");
        for citation in &result.citations {
            let title = result
                .documents
                .iter()
                .find(|d| d.id == citation.document_id)
                .map_or("(unknown document)", |d| d.title.as_str());
            println!("  [{}] {}", citation.position, title);
            println!("      {}", citation.text);
        }
    }

    let meta = &result.search_metadata;
    println!();
    println!(
        "{} matches, {} ms (embed {} ms, retrieve {} ms, generate {} ms)",
        meta.total_results,
        meta.search_time_ms,
        meta.embedding_time_ms,
        meta.retrieval_time_ms,
        meta.generation_time_ms
    );
}
