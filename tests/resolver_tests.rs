mod common;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::fake_fetcher::FakeFetcher;
use common::fixtures::{html_page, load_fixture};
use dpofinder::config::AppConfig;
use dpofinder::contact::{Contact, ContactRecord};
use dpofinder::resolver::{ContactResolver, ResolveError, ResolveOptions};
use dpofinder::store::{ContactStore, FileContactStore, MemoryContactStore, StoreError};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

const FORCE: ResolveOptions = ResolveOptions { force: true, allow_downgrade: false };
const DOWNGRADE: ResolveOptions = ResolveOptions { force: true, allow_downgrade: true };

fn dpo_site() -> FakeFetcher {
    FakeFetcher::new().with_page("https://example.com/privacy", &load_fixture("privacy_policy.html"))
}

fn resolver(fetcher: &Arc<FakeFetcher>, store: Arc<dyn ContactStore>) -> ContactResolver {
    ContactResolver::from_config(&AppConfig::default(), fetcher.clone(), store).unwrap()
}

fn good_email(checked_days_ago: i64) -> ContactRecord {
    ContactRecord::new(
        "example.com",
        Contact::Email("verified@example.com".to_string()),
        80,
        Some(Utc::now() - Duration::days(checked_days_ago)),
    )
}

#[tokio::test]
async fn test_first_resolution_crawls_and_persists() {
    let fetcher = Arc::new(dpo_site());
    let store = Arc::new(MemoryContactStore::new());
    let resolver = resolver(&fetcher, store.clone());

    let record = resolver.resolve_contact("example.com", ResolveOptions::default()).await.unwrap();

    assert_eq!(record.contact, Contact::Email("dpo@example.com".to_string()));
    assert_eq!(record.confidence, 85);
    assert!(record.checked_at.is_some());
    assert_eq!(record.meta.pages_crawled, vec!["https://example.com/", "https://example.com/privacy"]);
    assert_eq!(store.get("example.com").await.unwrap(), Some(record));
}

#[tokio::test]
async fn test_fresh_record_is_returned_without_crawling() {
    let fetcher = Arc::new(dpo_site());
    let store = Arc::new(MemoryContactStore::new());
    let cached = good_email(3);
    store.upsert(&cached).await.unwrap();

    let record = resolver(&fetcher, store).resolve_contact("example.com", ResolveOptions::default()).await.unwrap();

    assert_eq!(record, cached);
    assert_eq!(fetcher.call_count(), 0);
}

#[tokio::test]
async fn test_low_confidence_record_is_recrawled() {
    let fetcher = Arc::new(dpo_site());
    let store = Arc::new(MemoryContactStore::new());
    let weak = ContactRecord::new(
        "example.com",
        Contact::Form("https://example.com/contact".to_string()),
        50,
        Some(Utc::now()),
    );
    store.upsert(&weak).await.unwrap();

    let record = resolver(&fetcher, store).resolve_contact("example.com", ResolveOptions::default()).await.unwrap();

    assert!(fetcher.call_count() > 0);
    assert_eq!(record.value(), Some("dpo@example.com"));
}

#[tokio::test]
async fn test_force_recrawls_fresh_record() {
    let fetcher = Arc::new(dpo_site());
    let store = Arc::new(MemoryContactStore::new());
    store.upsert(&good_email(1)).await.unwrap();

    let record = resolver(&fetcher, store).resolve_contact("example.com", FORCE).await.unwrap();

    assert!(fetcher.call_count() > 0);
    // A fresh good email replaces the prior good email
    assert_eq!(record.value(), Some("dpo@example.com"));
}

#[tokio::test]
async fn test_sticky_guard_keeps_verified_email_on_failed_recrawl() {
    let fetcher = Arc::new(FakeFetcher::new());
    let store = Arc::new(MemoryContactStore::new());
    let prior = good_email(45);
    store.upsert(&prior).await.unwrap();

    let record = resolver(&fetcher, store.clone()).resolve_contact("example.com", ResolveOptions::default()).await.unwrap();

    assert_eq!(record.contact, prior.contact);
    assert_eq!(record.confidence, 80);
    assert!(record.checked_at > prior.checked_at);
    assert_eq!(record.meta.pages_crawled.len(), 9);
    assert_eq!(store.get("example.com").await.unwrap(), Some(record));
}

#[tokio::test]
async fn test_allow_downgrade_replaces_verified_email() {
    let fetcher = Arc::new(FakeFetcher::new());
    let store = Arc::new(MemoryContactStore::new());
    store.upsert(&good_email(1)).await.unwrap();

    let record = resolver(&fetcher, store).resolve_contact("example.com", DOWNGRADE).await.unwrap();

    assert_eq!(record.contact, Contact::None);
    assert_eq!(record.confidence, 0);
    assert_eq!(record.value(), None);
}

#[tokio::test]
async fn test_bounce_state_survives_recrawl() {
    let fetcher = Arc::new(dpo_site());
    let store = Arc::new(MemoryContactStore::new());
    let mut prior = good_email(60);
    prior.bounce_count = 2;
    prior.bounce_reason = Some("550 mailbox unavailable".to_string());
    prior.last_bounce_at = Some(Utc::now() - Duration::days(5));
    store.upsert(&prior).await.unwrap();

    let record = resolver(&fetcher, store).resolve_contact("example.com", ResolveOptions::default()).await.unwrap();

    assert_eq!(record.value(), Some("dpo@example.com"));
    assert_eq!(record.bounce_count, 2);
    assert_eq!(record.bounce_reason, prior.bounce_reason);
    assert_eq!(record.last_bounce_at, prior.last_bounce_at);
}

#[tokio::test]
async fn test_invalid_domain_is_rejected_before_any_io() {
    let fetcher = Arc::new(dpo_site());
    let store = Arc::new(MemoryContactStore::new());
    let resolver = resolver(&fetcher, store.clone());

    for input in ["", "   ", "not a domain", "localhost"] {
        let err = resolver.resolve_contact(input, ResolveOptions::default()).await.unwrap_err();
        assert!(matches!(err, ResolveError::InvalidDomain(_)), "{:?} gave {:?}", input, err);
    }

    assert_eq!(fetcher.call_count(), 0);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_input_is_normalized_before_lookup() {
    let fetcher = Arc::new(dpo_site());
    let store = Arc::new(MemoryContactStore::new());

    let record = resolver(&fetcher, store.clone())
        .resolve_contact("https://WWW.Example.com/about?ref=1", ResolveOptions::default())
        .await
        .unwrap();

    assert_eq!(record.domain, "example.com");
    assert!(store.get("example.com").await.unwrap().is_some());
    assert!(fetcher.calls().iter().all(|u| u.starts_with("https://example.com/")));
}

#[tokio::test]
async fn test_file_store_persists_across_resolvers() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(dpo_site());

    let store = Arc::new(FileContactStore::open(dir.path()).await.unwrap());
    let first = resolver(&fetcher, store).resolve_contact("example.com", ResolveOptions::default()).await.unwrap();
    let calls_after_first = fetcher.call_count();

    let reopened = Arc::new(FileContactStore::open(dir.path()).await.unwrap());
    let second = resolver(&fetcher, reopened).resolve_contact("example.com", ResolveOptions::default()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(fetcher.call_count(), calls_after_first);
    assert!(dir.path().join("example.com.json").exists());
}

struct FailingStore;

#[async_trait]
impl ContactStore for FailingStore {
    async fn get(&self, _domain: &str) -> Result<Option<ContactRecord>, StoreError> {
        Ok(None)
    }

    async fn upsert(&self, _record: &ContactRecord) -> Result<(), StoreError> {
        Err(StoreError::Io {
            path: PathBuf::from("/unwritable/example.com.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }
}

#[tokio::test]
async fn test_store_failure_is_surfaced() {
    let fetcher = Arc::new(dpo_site());
    let err = resolver(&fetcher, Arc::new(FailingStore))
        .resolve_contact("example.com", ResolveOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::Store(StoreError::Io { .. })));
}

#[tokio::test]
async fn test_corrupt_store_file_is_surfaced() {
    let dir = TempDir::new().unwrap();
    let store = FileContactStore::open(dir.path()).await.unwrap();
    std::fs::write(store.record_path("example.com"), "{ definitely not json").unwrap();

    let fetcher = Arc::new(dpo_site());
    let err = resolver(&fetcher, Arc::new(store))
        .resolve_contact("example.com", ResolveOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::Store(StoreError::Corrupt { .. })));
    assert_eq!(fetcher.call_count(), 0);
}

#[tokio::test]
async fn test_concurrent_resolutions_of_one_domain_are_serialized() {
    let fetcher = Arc::new(
        FakeFetcher::new()
            .with_page("https://example.com/", &html_page(r#"<a href="mailto:dpo@example.com">DPO</a>"#))
            .with_delay(std::time::Duration::from_millis(30)),
    );
    let store = Arc::new(MemoryContactStore::new());
    let resolver = Arc::new(resolver(&fetcher, store));

    let (a, b) = tokio::join!(
        resolver.resolve_contact("example.com", ResolveOptions::default()),
        resolver.resolve_contact("www.example.com", ResolveOptions::default()),
    );

    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a, b);
    // The second caller waits for the first and then sees its fresh record
    assert_eq!(fetcher.call_count(), 1);
}

#[tokio::test]
async fn test_different_domains_do_not_share_state() {
    let fetcher = Arc::new(
        FakeFetcher::new()
            .with_page("https://example.com/", &html_page(r#"<a href="mailto:dpo@example.com">DPO</a>"#))
            .with_page("https://other.org/", &html_page(r#"<a href="mailto:dpo@example.com">Our DPO</a>"#)),
    );
    let store = Arc::new(MemoryContactStore::new());
    let resolver = resolver(&fetcher, store);

    let (a, b) = tokio::join!(
        resolver.resolve_contact("example.com", ResolveOptions::default()),
        resolver.resolve_contact("other.org", ResolveOptions::default()),
    );

    assert_eq!(a.unwrap().value(), Some("dpo@example.com"));
    // example.com's address is off-domain for other.org
    assert!(b.unwrap().contact.is_none());
}

#[tokio::test]
async fn test_address_scored_from_body_context_is_kept_fresh() {
    let fetcher = Arc::new(FakeFetcher::new().with_page(
        "https://example.com/privacy",
        &html_page(r#"<h1>Privacy Policy</h1><p>Write to <a href="mailto:privacy@example.com">us</a> or privacy@example.com</p>"#),
    ));
    let store = Arc::new(MemoryContactStore::new());
    let resolver = resolver(&fetcher, store);

    let first = resolver.resolve_contact("example.com", ResolveOptions::default()).await.unwrap();
    assert_eq!(first.value(), Some("privacy@example.com"));
    assert_eq!(first.confidence, 65);
    assert!(!resolver.freshness().is_stale(&first, Utc::now()));

    let calls = fetcher.call_count();
    let second = resolver.resolve_contact("example.com", ResolveOptions::default()).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(fetcher.call_count(), calls);
}
