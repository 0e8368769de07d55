//! Bounded breadth-first crawl for one domain.
//!
//! Seeds are the site root plus a curated list of legal/privacy paths. Only
//! pages popped from the seed set contribute next-links, so exploration never
//! goes more than one hop past the seeds. The crawl stops at the page cap or
//! as soon as a finding reaches the strong-hit confidence.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::CrawlConfig;
use crate::contact::{CrawlMeta, Finding, FindingKind, ProbeResult};
use crate::domain_utils::{email_domain, is_same_or_subdomain};
use crate::extractor::Extractor;
use crate::fetcher::PageFetcher;

/// Per-call crawl bookkeeping. Never shared between domains.
#[derive(Debug, Default)]
struct CrawlState {
    visited: HashSet<String>,
    queue: VecDeque<Url>,
    best: Option<Finding>,
    tried: Vec<Finding>,
    pages_crawled: Vec<String>,
}

impl CrawlState {
    fn best_confidence(&self) -> u8 {
        self.best.as_ref().map(|f| f.confidence).unwrap_or(0)
    }

    fn record(&mut self, finding: Finding) {
        if finding.confidence > self.best_confidence() {
            self.best = Some(finding.clone());
        }
        self.tried.push(finding);
    }

    fn into_probe(self) -> ProbeResult {
        let meta = CrawlMeta {
            tried: self.tried,
            pages_crawled: self.pages_crawled,
        };
        match self.best {
            Some(best) => ProbeResult::from_finding(&best, meta),
            None => ProbeResult::none(meta),
        }
    }
}

pub struct Crawler {
    fetcher: Arc<dyn PageFetcher>,
    extractor: Extractor,
    max_pages: usize,
    strong_hit_confidence: u8,
    seed_paths: Vec<String>,
}

impl Crawler {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &CrawlConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            fetcher,
            extractor: Extractor::from_config(config)?,
            max_pages: config.max_pages,
            strong_hit_confidence: config.strong_hit_confidence,
            seed_paths: config.seed_paths.clone(),
        })
    }

    /// Root URL followed by each seed path, deduplicated, in order.
    pub fn seed_urls(&self, domain: &str) -> Vec<Url> {
        let root = match Url::parse(&format!("https://{}/", domain)) {
            Ok(url) => url,
            Err(e) => {
                warn!("Cannot build seed URLs for {}: {}", domain, e);
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let mut seeds = Vec::with_capacity(self.seed_paths.len() + 1);
        seen.insert(root.as_str().to_string());
        seeds.push(root.clone());

        for path in &self.seed_paths {
            let Ok(url) = root.join(path.trim_start_matches('/')) else {
                debug!("Skipping unusable seed path '{}'", path);
                continue;
            };
            if seen.insert(url.as_str().to_string()) {
                seeds.push(url);
            }
        }

        seeds
    }

    /// Crawl `domain` (already normalized) and return the best finding.
    ///
    /// Page-level failures are logged and skipped; this never fails.
    pub async fn crawl(&self, domain: &str) -> ProbeResult {
        let seeds = self.seed_urls(domain);
        let seed_set: HashSet<String> = seeds.iter().map(|u| u.as_str().to_string()).collect();

        let mut state = CrawlState {
            queue: seeds.into_iter().collect(),
            ..Default::default()
        };

        while let Some(url) = state.queue.pop_front() {
            if state.pages_crawled.len() >= self.max_pages {
                debug!("Page cap {} reached for {}", self.max_pages, domain);
                break;
            }
            if !state.visited.insert(url.as_str().to_string()) {
                continue;
            }
            state.pages_crawled.push(url.to_string());

            let page = match self.fetcher.fetch(&url).await {
                Ok(page) => page,
                Err(e) => {
                    debug!("Skipping {}: {}", url, e);
                    continue;
                }
            };

            if page.url != url && !state.visited.insert(page.url.as_str().to_string()) {
                debug!("{} redirected to already visited {}", url, page.url);
                continue;
            }

            let extraction = match self.extractor.extract_page(&page, domain) {
                Ok(extraction) => extraction,
                Err(e) => {
                    debug!("No findings from {}: {}", url, e);
                    continue;
                }
            };

            for finding in extraction.findings {
                if belongs_to_target(&finding, domain) {
                    state.record(finding);
                } else {
                    debug!("Dropping off-domain email {} found on {}", finding.value, url);
                }
            }

            if seed_set.contains(url.as_str()) {
                state.queue.extend(extraction.next_links);
            }

            if state.best_confidence() >= self.strong_hit_confidence {
                debug!("Strong hit ({}) for {} after {} pages", state.best_confidence(), domain, state.pages_crawled.len());
                break;
            }
        }

        let probe = state.into_probe();
        info!(
            "Crawled {} ({} pages): {} {} (confidence {})",
            domain,
            probe.meta.pages_crawled.len(),
            probe.contact_type(),
            probe.contact.value().unwrap_or("-"),
            probe.confidence
        );
        probe
    }
}

/// Emails must sit on the target's registrable domain; forms always count.
fn belongs_to_target(finding: &Finding, target_domain: &str) -> bool {
    match finding.kind {
        FindingKind::Form => true,
        FindingKind::Email => email_domain(&finding.value)
            .map(|domain| is_same_or_subdomain(&domain, target_domain))
            .unwrap_or(false),
    }
}
