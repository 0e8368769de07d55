pub mod batch;
pub mod cache_commands;
pub mod cli;
pub mod config;
pub mod contact;
pub mod crawler;
pub mod domain_utils;
pub mod extractor;
pub mod fetcher;
pub mod logger;
pub mod policy;
pub mod rate_limit;
pub mod resolver;
pub mod runner;
pub mod scorer;
pub mod store;

pub use config::AppConfig;
pub use contact::{Contact, ContactRecord, ContactType, CrawlMeta, Finding, FindingKind, ProbeResult};
pub use crawler::Crawler;
pub use fetcher::{FetchError, FetchedPage, HttpFetcher, PageFetcher};
pub use policy::FreshnessPolicy;
pub use resolver::{ContactResolver, ResolveError, ResolveOptions};
pub use runner::run_bounded;
pub use store::{ContactStore, FileContactStore, MemoryContactStore, StoreError};
