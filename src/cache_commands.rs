//! Store management commands for the dpofinder CLI
//!
//! List, show and clear the per-domain contact records kept under the
//! configured store directory.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};

use crate::contact::ContactRecord;
use crate::domain_utils::normalize_domain;
use crate::store::{ContactStore, FileContactStore};

/// List all stored domains, most recently checked first
pub async fn list_cached_domains(store: &FileContactStore) -> Result<()> {
    if !store.store_dir().exists() {
        println!("No store directory found at {}. Resolve a domain to create records.", store.store_dir().display());
        return Ok(());
    }

    let mut records = store.list().await.context("Failed to read store directory")?;
    if records.is_empty() {
        println!("No stored domains found.");
        return Ok(());
    }

    records.sort_by(|a, b| b.checked_at.cmp(&a.checked_at));

    println!("Stored Domains ({} total):", records.len());
    println!("{}", "=".repeat(100));
    println!("{:<32} {:<7} {:<5} {:<22} {}", "Domain", "Type", "Conf", "Checked", "Value");
    println!("{}", "-".repeat(100));

    for record in records {
        println!(
            "{:<32} {:<7} {:<5} {:<22} {}",
            record.domain,
            record.contact_type().to_string(),
            record.confidence,
            format_timestamp(record.checked_at),
            truncate_display(record.value().unwrap_or("-"), 40)
        );
    }

    Ok(())
}

/// Show the stored record for a domain
pub async fn show_cache_entry(store: &FileContactStore, domain: &str) -> Result<()> {
    let domain = normalize_domain(domain)?;

    let Some(record) = store.get(&domain).await? else {
        let similar: Vec<String> = store
            .list()
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|r| r.domain)
            .filter(|d| d.contains(&domain) || domain.contains(d.as_str()))
            .collect();

        if !similar.is_empty() {
            eprintln!("Did you mean one of these?");
            for s in similar {
                eprintln!("  - {}", s);
            }
        }
        bail!("No stored record for: {}", domain);
    };

    print_record(&record);
    Ok(())
}

pub fn print_record(record: &ContactRecord) {
    println!("Contact for: {}", record.domain);
    println!("{}", "=".repeat(60));
    println!("Type:        {}", record.contact_type());
    println!("Value:       {}", record.value().unwrap_or("-"));
    println!("Confidence:  {}", record.confidence);
    println!("Checked:     {}", format_timestamp(record.checked_at));

    if record.bounce_count > 0 || record.last_bounce_at.is_some() {
        println!();
        println!("Bounces:     {}", record.bounce_count);
        println!("Last bounce: {}", format_timestamp(record.last_bounce_at));
        if let Some(reason) = &record.bounce_reason {
            println!("Reason:      {}", reason);
        }
    }

    if !record.meta.pages_crawled.is_empty() {
        println!();
        println!("Pages crawled ({}):", record.meta.pages_crawled.len());
        for page in &record.meta.pages_crawled {
            println!("  - {}", page);
        }
    }

    if !record.meta.tried.is_empty() {
        println!();
        println!("Candidates ({}):", record.meta.tried.len());
        for finding in &record.meta.tried {
            println!("  [{:>3}] {:?} {}", finding.confidence, finding.kind, finding.value);
        }
    }
}

/// Clear the record for a specific domain
pub async fn clear_domain_cache(store: &FileContactStore, domain: &str) -> Result<()> {
    let domain = normalize_domain(domain)?;

    if store.remove(&domain).await? {
        println!("Successfully cleared stored record for: {}", domain);
        Ok(())
    } else {
        bail!("No stored record for: {}", domain)
    }
}

/// Clear every stored record
pub async fn clear_all_cache(store: &FileContactStore) -> Result<()> {
    let count = store.clear().await.context("Failed to clear store")?;
    if count > 0 {
        println!("Successfully cleared {} stored records.", count);
    } else {
        println!("No stored records to clear.");
    }
    Ok(())
}

fn format_timestamp(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "Never".to_string())
}

fn truncate_display(value: &str, max_chars: usize) -> String {
    if value.chars().count() > max_chars {
        let head: String = value.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(None), "Never");
        let t = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z").unwrap().with_timezone(&Utc);
        assert_eq!(format_timestamp(Some(t)), "2026-01-02 03:04 UTC");
    }

    #[test]
    fn test_truncate_display() {
        assert_eq!(truncate_display("short", 10), "short");
        assert_eq!(truncate_display("https://example.com/a/very/long/path", 12), "https://e...");
    }
}
