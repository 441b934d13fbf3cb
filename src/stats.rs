//! Database statistics and service health.
//!
//! `wrag stats` summarizes what is indexed: document and chunk counts,
//! embedding coverage and a per-study-type breakdown. `wrag health`
//! checks that the database answers and that every enabled provider has
//! the credentials it needs.

use anyhow::{bail, Result};
use serde::Serialize;
use sqlx::Row;

use wellness_rag_core::store::Store;

use crate::config::{Config, API_KEY_ENV};
use crate::db;
use crate::sqlite_store::SqliteStore;

struct StudyTypeStats {
    study_type: String,
    doc_count: i64,
    chunk_count: i64,
    embedded_count: i64,
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let totals = store.stats().await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Wellness RAG — Database Stats");
    println!("=============================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Documents:   {}", totals.documents);
    println!("  Chunks:      {}", totals.chunks);
    println!(
        "  Embedded:    {} / {} ({}%)",
        totals.embedded_chunks,
        totals.chunks,
        coverage_percent(totals.embedded_chunks, totals.chunks)
    );

    let rows = sqlx::query(
        r#"
        SELECT
            d.study_type,
            COUNT(DISTINCT d.id) AS doc_count,
            COUNT(c.id) AS chunk_count,
            COUNT(c.embedding) AS embedded_count
        FROM documents d
        LEFT JOIN chunks c ON c.document_id = d.id
        GROUP BY d.study_type
        ORDER BY doc_count DESC, d.study_type
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let by_type: Vec<StudyTypeStats> = rows
        .iter()
        .map(|row| StudyTypeStats {
            study_type: row.get("study_type"),
            doc_count: row.get("doc_count"),
            chunk_count: row.get("chunk_count"),
            embedded_count: row.get("embedded_count"),
        })
        .collect();

    if !by_type.is_empty() {
        println!();
        println!("  By study type:");
        println!(
            "  {:<30} {:>6} {:>8} {:>10}",
            "STUDY TYPE", "DOCS", "CHUNKS", "EMBEDDED"
        );
        println!("  {}", "-".repeat(58));
        for s in &by_type {
            println!(
                "  {:<30} {:>6} {:>8} {:>10}",
                s.study_type, s.doc_count, s.chunk_count, s.embedded_count
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Database is fine but an enabled provider cannot authenticate.
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub database: String,
    pub embedding: String,
    pub completion: String,
    pub api_key_present: bool,
}

pub async fn check_health(config: &Config) -> HealthReport {
    let database = match db::connect(config).await {
        Ok(pool) => {
            let probe = sqlx::query("SELECT 1").execute(&pool).await;
            pool.close().await;
            match probe {
                Ok(_) => "ok".to_string(),
                Err(e) => format!("error: {}", e),
            }
        }
        Err(e) => format!("error: {:#}", e),
    };

    let api_key_present = std::env::var(API_KEY_ENV)
        .map(|k| !k.trim().is_empty())
        .unwrap_or(false);
    let needs_key = config.embedding.is_enabled() || config.completion.is_enabled();

    let status = if database != "ok" {
        HealthStatus::Unhealthy
    } else if needs_key && !api_key_present {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    HealthReport {
        status,
        database,
        embedding: provider_label(&config.embedding.provider, &config.embedding.model),
        completion: provider_label(&config.completion.provider, &config.completion.model),
        api_key_present,
    }
}

pub async fn run_health(config: &Config, json: bool) -> Result<()> {
    let report = check_health(config).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("status: {}", status_label(&report.status));
        println!("  database:   {}", report.database);
        println!("  embedding:  {}", report.embedding);
        println!("  completion: {}", report.completion);
        println!(
            "  {}: {}",
            API_KEY_ENV,
            if report.api_key_present { "set" } else { "not set" }
        );
    }

    if report.status == HealthStatus::Unhealthy {
        bail!("database is unreachable");
    }
    Ok(())
}

fn provider_label(provider: &str, model: &str) -> String {
    if provider == "disabled" {
        "disabled".to_string()
    } else {
        format!("{} ({})", provider, model)
    }
}

fn status_label(status: &HealthStatus) -> &'static str {
    match status {
        HealthStatus::Healthy => "healthy",
        HealthStatus::Degraded => "degraded",
        HealthStatus::Unhealthy => "unhealthy",
    }
}

fn coverage_percent(part: u64, whole: u64) -> u64 {
    if whole > 0 {
        part * 100 / whole
    } else {
        0
    }
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
