//! Batch resolution for domain lists read from CSV/JSON files
//!
//! Supports:
//! - CSV files with one domain per line or a "domain" column
//! - JSON files with array of domain strings or objects with "domain" field
//! - Bounded parallel resolution through the concurrency runner
//! - Summary export as JSON plus a flat contacts CSV
//! - Error resilience (a failing domain never stops its siblings)

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use csv::Writer;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::contact::{ContactRecord, ContactType};
use crate::domain_utils::normalize_domain;
use crate::logger::BatchProgress;
use crate::resolver::{ContactResolver, ResolveOptions};
use crate::runner::run_bounded;

pub const SUMMARY_FILE_NAME: &str = "batch_summary.json";
pub const CONTACTS_FILE_NAME: &str = "contacts.csv";

/// Represents a domain entry from a batch input file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomainEntry {
    /// Normalized domain to resolve
    pub domain: String,
    /// Optional label/identifier for the domain (e.g., company name)
    #[serde(default)]
    pub label: Option<String>,
}

impl DomainEntry {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            label: None,
        }
    }

    pub fn with_label(domain: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            label: Some(label.into()),
        }
    }
}

/// Result of resolving a single domain in a batch
#[derive(Debug, Clone, Serialize)]
pub struct DomainContactResult {
    pub domain: String,
    pub label: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    pub contact_type: Option<ContactType>,
    pub value: Option<String>,
    pub confidence: Option<u8>,
    pub checked_at: Option<DateTime<Utc>>,
    pub duration_secs: f64,
}

impl DomainContactResult {
    fn resolved(entry: &DomainEntry, record: &ContactRecord, duration_secs: f64) -> Self {
        Self {
            domain: record.domain.clone(),
            label: entry.label.clone(),
            success: true,
            error: None,
            contact_type: Some(record.contact_type()),
            value: record.value().map(str::to_string),
            confidence: Some(record.confidence),
            checked_at: record.checked_at,
            duration_secs,
        }
    }

    fn failed(entry: &DomainEntry, error: &anyhow::Error, duration_secs: f64) -> Self {
        Self {
            domain: entry.domain.clone(),
            label: entry.label.clone(),
            success: false,
            error: Some(format!("{:#}", error)),
            contact_type: None,
            value: None,
            confidence: None,
            checked_at: None,
            duration_secs,
        }
    }
}

/// Summary of a batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total_domains: usize,
    pub successful: usize,
    pub failed: usize,
    /// Successful lookups that found an email or form
    pub contacts_found: usize,
    pub domain_results: Vec<DomainContactResult>,
    pub total_duration_secs: f64,
    pub started_at: String,
    pub completed_at: String,
}

/// Input format for batch domain files
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputFormat {
    Csv,
    Json,
}

impl InputFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()).as_deref() {
            Some("csv") => Some(Self::Csv),
            Some("json") => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse domain list from a file (auto-detects format from extension)
pub fn parse_domain_file(path: &Path) -> Result<Vec<DomainEntry>> {
    let format = InputFormat::from_path(path)
        .context(format!("Cannot determine input format from file extension. Expected .csv or .json: {}", path.display()))?;

    let content = fs::read_to_string(path)
        .context(format!("Failed to read input file: {}", path.display()))?;

    let entries = match format {
        InputFormat::Csv => parse_csv_domains(&content)?,
        InputFormat::Json => parse_json_domains(&content)?,
    };

    Ok(dedup_entries(entries))
}

/// Normalize a raw domain cell, skipping anything unusable.
fn entry_domain(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }
    match normalize_domain(raw) {
        Ok(domain) => Some(domain),
        Err(e) => {
            debug!("Skipping batch entry '{}': {}", raw, e);
            None
        }
    }
}

/// Keep the first occurrence of each domain.
fn dedup_entries(entries: Vec<DomainEntry>) -> Vec<DomainEntry> {
    let mut seen = std::collections::HashSet::new();
    entries
        .into_iter()
        .filter(|entry| seen.insert(entry.domain.clone()))
        .collect()
}

/// Parse domains from CSV content
///
/// Supports two formats:
/// 1. One domain per line (no header)
/// 2. CSV with "domain" column header (and optional "label" column)
pub fn parse_csv_domains(content: &str) -> Result<Vec<DomainEntry>> {
    let mut domains = Vec::new();
    let Some(first_line) = content.lines().next() else {
        return Ok(domains);
    };

    let has_header = first_line
        .split(',')
        .any(|cell| cell.trim().eq_ignore_ascii_case("domain"));

    if has_header {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers = reader.headers()
            .context("Failed to read CSV headers")?
            .clone();

        let domain_idx = headers.iter().position(|h| h.trim().eq_ignore_ascii_case("domain"))
            .context("CSV must have a 'domain' column when using headers")?;
        let label_idx = headers.iter().position(|h| h.trim().eq_ignore_ascii_case("label"));

        for result in reader.records() {
            let record = result.context("Failed to parse CSV record")?;

            let Some(domain) = record.get(domain_idx).and_then(entry_domain) else {
                continue;
            };
            let label = label_idx
                .and_then(|idx| record.get(idx))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());

            domains.push(DomainEntry { domain, label });
        }
    } else {
        for line in content.lines() {
            // Take the first column as the domain
            let cell = line.split(',').next().unwrap_or(line);
            if let Some(domain) = entry_domain(cell) {
                domains.push(DomainEntry::new(domain));
            }
        }
    }

    Ok(domains)
}

/// Parse domains from JSON content
///
/// Supports three formats:
/// 1. Array of domain strings: ["example.com", "test.org"]
/// 2. Array of objects with "domain" field: [{"domain": "example.com"}, {"domain": "test.org"}]
/// 3. Object with "domains" array: {"domains": ["example.com", "test.org"]}
pub fn parse_json_domains(content: &str) -> Result<Vec<DomainEntry>> {
    let value: serde_json::Value = serde_json::from_str(content)
        .context("Failed to parse JSON content")?;

    let entries = match &value {
        serde_json::Value::Array(arr) => parse_json_array(arr),

        serde_json::Value::Object(obj) => match obj.get("domains") {
            Some(serde_json::Value::Array(arr)) => parse_json_array(arr),
            Some(_) => bail!("'domains' field must be an array"),
            None => bail!("JSON object must have a 'domains' array field"),
        },

        _ => bail!("JSON must be an array of domains or an object with 'domains' field"),
    };

    Ok(entries)
}

fn parse_json_array(arr: &[serde_json::Value]) -> Vec<DomainEntry> {
    let mut entries = Vec::new();

    for item in arr {
        match item {
            serde_json::Value::String(raw) => {
                if let Some(domain) = entry_domain(raw) {
                    entries.push(DomainEntry::new(domain));
                }
            }

            serde_json::Value::Object(obj) => {
                let Some(domain) = obj.get("domain").and_then(|v| v.as_str()).and_then(entry_domain) else {
                    continue;
                };
                let label = obj.get("label")
                    .and_then(|v| v.as_str())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty());

                entries.push(DomainEntry { domain, label });
            }

            _ => {
                // Skip invalid entries
            }
        }
    }

    entries
}

/// Resolve many domains, one result per input in input order.
pub async fn resolve_all(
    resolver: &ContactResolver,
    domains: Vec<String>,
    concurrency: usize,
    options: ResolveOptions,
) -> Vec<Result<ContactRecord>> {
    run_bounded(domains, concurrency, |domain| async move {
        resolver
            .resolve_contact(&domain, options)
            .await
            .with_context(|| format!("Failed to resolve {}", domain))
    })
    .await
}

/// Resolve every entry and collect a summary.
pub async fn resolve_batch(
    resolver: &ContactResolver,
    entries: Vec<DomainEntry>,
    concurrency: usize,
    options: ResolveOptions,
    progress: Option<&BatchProgress>,
) -> BatchSummary {
    let started = Instant::now();
    let mut summary = new_batch_summary();

    info!("Resolving {} domains with {} workers", entries.len(), concurrency.max(1));

    let outcomes = run_bounded(entries.clone(), concurrency, |entry| async move {
        let item_started = Instant::now();
        let outcome = resolver
            .resolve_contact(&entry.domain, options)
            .await
            .with_context(|| format!("Failed to resolve {}", entry.domain));
        let elapsed = item_started.elapsed().as_secs_f64();

        if let Some(progress) = progress {
            progress.advance(&entry.domain);
        }

        Ok(match outcome {
            Ok(record) => DomainContactResult::resolved(&entry, &record, elapsed),
            Err(e) => {
                warn!("{:#}", e);
                DomainContactResult::failed(&entry, &e, elapsed)
            }
        })
    })
    .await;

    for (entry, outcome) in entries.iter().zip(outcomes) {
        let result = outcome.unwrap_or_else(|e| DomainContactResult::failed(entry, &e, 0.0));
        summary.domain_results.push(result);
    }

    summary.total_duration_secs = started.elapsed().as_secs_f64();
    finalize_batch_summary(&mut summary);
    summary
}

/// Write `batch_summary.json` and `contacts.csv` into `output_dir`.
pub fn export_batch(summary: &BatchSummary, output_dir: &Path) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(output_dir)
        .context(format!("Failed to create output directory: {}", output_dir.display()))?;

    let summary_path = output_dir.join(SUMMARY_FILE_NAME);
    export_batch_summary(summary, &summary_path)?;

    let contacts_path = output_dir.join(CONTACTS_FILE_NAME);
    export_contacts_csv(summary, &contacts_path)?;

    Ok((summary_path, contacts_path))
}

/// Export batch summary to JSON file
pub fn export_batch_summary(summary: &BatchSummary, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)
        .context("Failed to serialize batch summary")?;

    fs::write(output_path, json)
        .context(format!("Failed to write batch summary to: {}", output_path.display()))?;

    Ok(())
}

/// One row per domain: domain, label, contact type, value, confidence, checked at, error
pub fn export_contacts_csv(summary: &BatchSummary, output_path: &Path) -> Result<()> {
    debug!("Exporting {} rows to CSV: {}", summary.domain_results.len(), output_path.display());

    let file = fs::File::create(output_path)
        .context(format!("Failed to create CSV file: {}", output_path.display()))?;
    let mut wtr = Writer::from_writer(file);

    wtr.write_record(["Domain", "Label", "Contact Type", "Value", "Confidence", "Checked At", "Error"])?;

    for result in &summary.domain_results {
        let contact_type = result.contact_type.map(|t| t.to_string()).unwrap_or_default();
        let confidence = result.confidence.map(|c| c.to_string()).unwrap_or_default();
        let checked_at = result.checked_at.map(|t| t.to_rfc3339()).unwrap_or_default();

        wtr.write_record([
            result.domain.as_str(),
            result.label.as_deref().unwrap_or(""),
            contact_type.as_str(),
            result.value.as_deref().unwrap_or(""),
            confidence.as_str(),
            checked_at.as_str(),
            result.error.as_deref().unwrap_or(""),
        ])?;
    }

    wtr.flush()?;
    info!("Exported {} contacts to {}", summary.domain_results.len(), output_path.display());

    Ok(())
}

/// Create a new batch summary
pub fn new_batch_summary() -> BatchSummary {
    BatchSummary {
        total_domains: 0,
        successful: 0,
        failed: 0,
        contacts_found: 0,
        domain_results: Vec::new(),
        total_duration_secs: 0.0,
        started_at: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        completed_at: String::new(),
    }
}

/// Finalize a batch summary with end time
pub fn finalize_batch_summary(summary: &mut BatchSummary) {
    summary.completed_at = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    summary.total_domains = summary.domain_results.len();
    summary.successful = summary.domain_results.iter().filter(|r| r.success).count();
    summary.failed = summary.domain_results.iter().filter(|r| !r.success).count();
    summary.contacts_found = summary
        .domain_results
        .iter()
        .filter(|r| matches!(r.contact_type, Some(ContactType::Email) | Some(ContactType::Form)))
        .count();
}
