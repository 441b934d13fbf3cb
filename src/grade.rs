//! The `wrag grade` command: grade a set of documents without retrieval.
//!
//! Runs the deterministic grader over every valid record in a documents
//! file. No database or provider is touched.

use anyhow::Result;
use chrono::{Datelike, Utc};
use std::path::Path;
use tracing::warn;

use wellness_rag_core::grading::grade_evidence_as_of;
use wellness_rag_core::models::EvidenceGrade;

use crate::config::Config;
use crate::ingest::{load_records, prepare_documents};

pub fn run_grade(config: &Config, path: &Path, as_of_year: Option<i32>, json: bool) -> Result<()> {
    let (documents, rejected) = prepare_documents(load_records(path)?, &config.chunking);
    for err in &rejected {
        warn!(error = %err, "skipping record");
    }

    let year = as_of_year.unwrap_or_else(|| Utc::now().year());
    let grade = grade_evidence_as_of(&documents, year);

    if json {
        println!("{}", serde_json::to_string_pretty(&grade)?);
    } else {
        print_grade(&grade, documents.len(), rejected.len());
    }
    Ok(())
}

fn print_grade(grade: &EvidenceGrade, graded: usize, rejected: usize) {
    let f = &grade.factors;
    println!("Evidence: {} (score {}/100)", grade.strength, grade.score);
    println!("  {}", grade.reasoning);
    println!();
    println!("  Documents graded:    {}", graded);
    if rejected > 0 {
        println!("  Records rejected:    {}", rejected);
    }
    println!("  Meta-analysis:       {}", yes_no(f.meta_analysis_present));
    println!("  RCT:                 {}", yes_no(f.rct_present));
    match f.mean_sample_size() {
        Some(mean) => println!("  Mean sample size:    {:.0}", mean),
        None => println!("  Mean sample size:    n/a"),
    }
    println!("  Mean age:            {:.1} years", f.recency);
    println!("  Conflicts declared:  {}", yes_no(f.conflicts_of_interest));
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
