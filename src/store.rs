//! Persistent contact store
//!
//! One record per domain. `FileContactStore` keeps a pretty-printed JSON file
//! per domain under the store directory:
//!
//! ```text
//! cache/
//!   example.com.json
//!   acme.co.uk.json
//! ```
//!
//! Writes go to a temporary file that is renamed over the target, so a reader
//! never observes a half-written record. Files stamped with another
//! `cache_version` are treated as absent and overwritten on the next upsert.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::contact::ContactRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize record for {domain}: {source}")]
    Serialize {
        domain: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("corrupt store file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Keyed get/upsert of contact records.
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn get(&self, domain: &str) -> Result<Option<ContactRecord>, StoreError>;

    /// Insert or replace the record for `record.domain`.
    async fn upsert(&self, record: &ContactRecord) -> Result<(), StoreError>;
}

/// On-disk wrapper carrying the format version.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    cache_version: u32,
    #[serde(flatten)]
    record: ContactRecord,
}

/// Only the version stamp, so an incompatible file can be recognized
/// without deserializing the rest of it.
#[derive(Debug, Deserialize)]
struct VersionProbe {
    #[serde(default)]
    cache_version: u32,
}

#[derive(Debug, Clone)]
pub struct FileContactStore {
    store_dir: PathBuf,
}

impl FileContactStore {
    const CACHE_VERSION: u32 = 2;

    pub fn new(store_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_dir: store_dir.into(),
        }
    }

    /// Create the store directory if needed.
    pub async fn open(store_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self::new(store_dir);
        tokio::fs::create_dir_all(&store.store_dir)
            .await
            .map_err(|source| StoreError::Io {
                path: store.store_dir.clone(),
                source,
            })?;
        debug!("Contact store ready in {:?}", store.store_dir);
        Ok(store)
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// File path for a domain, sanitized against path traversal.
    pub fn record_path(&self, domain: &str) -> PathBuf {
        let safe_domain: String = domain
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
                _ => '_',
            })
            .collect();
        let safe_domain = safe_domain.replace("..", "_");
        if safe_domain.is_empty() || safe_domain == "." {
            return self.store_dir.join("_invalid_domain_.json");
        }
        self.store_dir.join(format!("{}.json", safe_domain))
    }

    async fn read_record(&self, path: &Path) -> Result<Option<ContactRecord>, StoreError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let probe: VersionProbe = serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        if probe.cache_version != Self::CACHE_VERSION {
            debug!(
                "Ignoring {:?}: cache_version {} (expected {})",
                path,
                probe.cache_version,
                Self::CACHE_VERSION
            );
            return Ok(None);
        }

        let stored: StoredRecord = serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(stored.record))
    }

    /// All readable records, sorted by domain. Unreadable files are skipped.
    pub async fn list(&self) -> Result<Vec<ContactRecord>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.store_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.store_dir.clone(),
                    source,
                })
            }
        };

        let mut records = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            match self.read_record(&path).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => debug!("Skipping {:?}: {}", path, e),
            }
        }

        records.sort_by(|a, b| a.domain.cmp(&b.domain));
        Ok(records)
    }

    /// Delete one domain's record. Returns whether a file was removed.
    pub async fn remove(&self, domain: &str) -> Result<bool, StoreError> {
        let path = self.record_path(domain);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed stored record for {}", domain);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    /// Delete every record file. Returns how many were removed.
    pub async fn clear(&self) -> Result<usize, StoreError> {
        let mut count = 0;

        if let Ok(mut entries) = tokio::fs::read_dir(&self.store_dir).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                if entry.path().extension().and_then(|s| s.to_str()) == Some("json") {
                    if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                        debug!("Failed to remove store file {:?}: {}", entry.path(), e);
                    } else {
                        count += 1;
                    }
                }
            }
        }

        debug!("Cleared {} store files", count);
        Ok(count)
    }
}

#[async_trait]
impl ContactStore for FileContactStore {
    async fn get(&self, domain: &str) -> Result<Option<ContactRecord>, StoreError> {
        self.read_record(&self.record_path(domain)).await
    }

    async fn upsert(&self, record: &ContactRecord) -> Result<(), StoreError> {
        let path = self.record_path(&record.domain);
        let stored = StoredRecord {
            cache_version: Self::CACHE_VERSION,
            record: record.clone(),
        };
        let content = serde_json::to_string_pretty(&stored).map_err(|source| StoreError::Serialize {
            domain: record.domain.clone(),
            source,
        })?;

        tokio::fs::create_dir_all(&self.store_dir)
            .await
            .map_err(|source| StoreError::Io {
                path: self.store_dir.clone(),
                source,
            })?;

        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, content)
            .await
            .map_err(|source| StoreError::Io {
                path: tmp_path.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;

        debug!("Stored record for {} at {:?}", record.domain, path);
        Ok(())
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryContactStore {
    records: RwLock<HashMap<String, ContactRecord>>,
}

impl MemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ContactStore for MemoryContactStore {
    async fn get(&self, domain: &str) -> Result<Option<ContactRecord>, StoreError> {
        Ok(self.records.read().await.get(domain).cloned())
    }

    async fn upsert(&self, record: &ContactRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(record.domain.clone(), record.clone());
        Ok(())
    }
}
