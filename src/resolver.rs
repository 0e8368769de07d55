//! `resolve_contact`: cache check, crawl, merge and persist for one domain.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::contact::ContactRecord;
use crate::crawler::Crawler;
use crate::domain_utils::{normalize_domain, InvalidDomainError};
use crate::fetcher::PageFetcher;
use crate::policy::FreshnessPolicy;
use crate::store::{ContactStore, StoreError};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    InvalidDomain(#[from] InvalidDomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Crawl even if the stored record is fresh
    pub force: bool,
    /// Let a worse probe replace a verified good email
    pub allow_downgrade: bool,
}

pub struct ContactResolver {
    store: Arc<dyn ContactStore>,
    crawler: Crawler,
    freshness: FreshnessPolicy,
    /// One writer per domain across the get/crawl/merge/upsert sequence
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ContactResolver {
    pub fn new(store: Arc<dyn ContactStore>, crawler: Crawler, freshness: FreshnessPolicy) -> Self {
        Self {
            store,
            crawler,
            freshness,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(
        config: &AppConfig,
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn ContactStore>,
    ) -> Result<Self, regex::Error> {
        let crawler = Crawler::new(fetcher, &config.crawl)?;
        Ok(Self::new(store, crawler, FreshnessPolicy::from_config(&config.cache)))
    }

    pub fn freshness(&self) -> &FreshnessPolicy {
        &self.freshness
    }

    async fn domain_lock(&self, domain: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn release_domain_lock(&self, domain: &str) {
        let mut locks = self.locks.lock().await;
        if locks.get(domain).map(|l| Arc::strong_count(l) == 1).unwrap_or(false) {
            locks.remove(domain);
        }
    }

    /// Return the best known contact for `domain`, crawling if needed.
    ///
    /// Invalid input is rejected before any network or store access. Store
    /// failures are returned as errors; page failures never are.
    pub async fn resolve_contact(&self, domain: &str, options: ResolveOptions) -> Result<ContactRecord, ResolveError> {
        let domain = normalize_domain(domain)?;

        let lock = self.domain_lock(&domain).await;
        let result = {
            let _guard = lock.lock().await;
            self.resolve_locked(&domain, options).await
        };
        drop(lock);
        self.release_domain_lock(&domain).await;

        result
    }

    async fn resolve_locked(&self, domain: &str, options: ResolveOptions) -> Result<ContactRecord, ResolveError> {
        let prior = self.store.get(domain).await?;

        if let Some(record) = &prior {
            if !options.force && !self.freshness.is_stale(record, Utc::now()) {
                debug!("Using stored contact for {} (confidence {})", domain, record.confidence);
                return Ok(record.clone());
            }
        }

        info!("Crawling {} for a privacy contact", domain);
        let probe = self.crawler.crawl(domain).await;

        let merged = self
            .freshness
            .merge(prior.as_ref(), probe, domain, Utc::now(), options.allow_downgrade);
        self.store.upsert(&merged).await?;

        Ok(merged)
    }
}
