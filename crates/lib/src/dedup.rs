//! Duplicate cache: remembers recently seen message ids so platform redeliveries are not answered twice.
//!
//! The whole cache is one JSON object (`{"<mid>": <unix seconds>, ...}`) kept in insertion
//! order. Every check reloads it from the store and every mark rewrites it, so separate
//! processes share state through the store alone. There is no locking: two deliveries of the
//! same id racing each other can both observe `seen == false`.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Durable backing for the cache document.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Raw document, or None when nothing has been stored yet.
    async fn read(&self) -> std::io::Result<Option<String>>;
    /// Replace the stored document.
    async fn write(&self, document: &str) -> std::io::Result<()>;
}

/// Cache document stored in a single JSON file.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl CacheStore for FileStore {
    async fn read(&self) -> std::io::Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn write(&self, document: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, document).await
    }
}

/// Cache document held in process memory. Lost on restart; intended for tests and embedding.
#[derive(Default)]
pub struct MemoryStore {
    document: RwLock<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a raw document (may be invalid JSON).
    pub fn with_document(document: impl Into<String>) -> Self {
        Self {
            document: RwLock::new(Some(document.into())),
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn read(&self) -> std::io::Result<Option<String>> {
        Ok(self.document.read().await.clone())
    }

    async fn write(&self, document: &str) -> std::io::Result<()> {
        *self.document.write().await = Some(document.to_string());
        Ok(())
    }
}

/// Bounded set of seen message ids over a [`CacheStore`].
#[derive(Clone)]
pub struct DuplicateCache {
    store: Arc<dyn CacheStore>,
    limit: usize,
}

impl DuplicateCache {
    /// A limit of 0 is raised to 1; otherwise every mark would evict itself.
    pub fn new(store: Arc<dyn CacheStore>, limit: usize) -> Self {
        if limit == 0 {
            log::warn!("dedup: cache limit 0 would disable duplicate suppression, using 1");
        }
        Self {
            store,
            limit: limit.max(1),
        }
    }

    /// Load the cache document. Unreadable or corrupt storage yields an empty cache.
    async fn load(&self) -> Map<String, Value> {
        let raw = match self.store.read().await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Map::new(),
            Err(e) => {
                log::warn!("dedup: cache unreadable, treating as empty: {}", e);
                return Map::new();
            }
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                log::warn!("dedup: cache document corrupt, treating as empty");
                Map::new()
            }
        }
    }

    /// True if `id` is among the retained ids.
    pub async fn seen(&self, id: &str) -> bool {
        self.load().await.contains_key(id)
    }

    /// Record `id` with the current time and drop the oldest entries beyond the limit.
    /// Re-marking an existing id refreshes its timestamp but keeps its position.
    pub async fn mark(&self, id: &str) {
        let mut entries = self.load().await;
        entries.insert(
            id.to_string(),
            Value::from(chrono::Utc::now().timestamp()),
        );
        let entries = retain_newest(entries, self.limit);
        let document = match serde_json::to_string(&entries) {
            Ok(d) => d,
            Err(e) => {
                log::warn!("dedup: failed to encode cache: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.write(&document).await {
            log::warn!("dedup: failed to persist cache: {}", e);
        }
    }
}

/// Keep the last `limit` entries in insertion order.
fn retain_newest(entries: Map<String, Value>, limit: usize) -> Map<String, Value> {
    let excess = entries.len().saturating_sub(limit);
    if excess == 0 {
        return entries;
    }
    entries.into_iter().skip(excess).collect()
}
