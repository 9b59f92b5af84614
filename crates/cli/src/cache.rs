use dashmap::DashMap;
use extract::{CompletionClient, LlmError};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::fs;
use tracing::{debug, warn};

use crate::config::CacheConfig;

/// Completion responses keyed by (model, token budget, prompt)
pub struct ResponseCache {
    enabled: bool,
    responses: DashMap<String, String>,
    dir: Option<PathBuf>,
    max_entries: usize,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Arc<Self> {
        Arc::new(Self {
            enabled: config.enabled,
            responses: DashMap::new(),
            dir: config.dir.clone().filter(|_| config.enabled),
            max_entries: config.max_entries.max(1),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        })
    }

    pub fn key(model: &str, max_tokens: usize, prompt: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(model.as_bytes());
        hasher.update([0u8]);
        hasher.update(max_tokens.to_le_bytes());
        hasher.update([0u8]);
        hasher.update(prompt.as_bytes());
        hex::encode(hasher.finalize())
    }

    async fn get(&self, key: &str) -> Option<String> {
        if !self.enabled {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        if let Some(hit) = self.responses.get(key).map(|r| r.value().clone()) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(hit);
        }

        if let Some(dir) = &self.dir {
            if let Ok(hit) = fs::read_to_string(dir.join(format!("{key}.txt"))).await {
                self.remember(key.to_string(), &hit);
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(hit);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    async fn insert(&self, key: String, response: &str) {
        if !self.enabled {
            return;
        }

        // Disk errors only cost a future cache miss
        if let Some(dir) = &self.dir {
            if let Err(e) = persist(dir, &key, response).await {
                warn!(dir = %dir.display(), error = %e, "Failed to persist cached response");
            }
        }
        self.remember(key, response);
    }

    fn remember(&self, key: String, response: &str) {
        if self.responses.len() >= self.max_entries {
            // Simple eviction: drop a quarter when full; persisted copies stay on disk
            let to_remove: Vec<_> = self
                .responses
                .iter()
                .take((self.max_entries / 4).max(1))
                .map(|r| r.key().clone())
                .collect();
            debug!(evicted = to_remove.len(), "Response cache full");
            for key in to_remove {
                self.responses.remove(&key);
            }
        }
        self.responses.insert(key, response.to_string());
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            enabled: self.enabled,
            responses_cached: self.responses.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

async fn persist(dir: &Path, key: &str, response: &str) -> std::io::Result<()> {
    fs::create_dir_all(dir).await?;
    let staging = dir.join(format!("{key}.tmp"));
    fs::write(&staging, response).await?;
    fs::rename(&staging, dir.join(format!("{key}.txt"))).await
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub responses_cached: usize,
    pub hits: usize,
    /// Calls that reached the completion service
    pub misses: usize,
}

/// Serves repeated prompts from a [`ResponseCache`] before calling `inner`
pub struct CachingClient<C> {
    inner: C,
    cache: Arc<ResponseCache>,
}

impl<C: CompletionClient> CachingClient<C> {
    pub fn new(inner: C, cache: Arc<ResponseCache>) -> Self {
        Self { inner, cache }
    }
}

impl<C: CompletionClient> CompletionClient for CachingClient<C> {
    async fn complete(&self, prompt: &str, max_tokens: usize) -> Result<String, LlmError> {
        let key = ResponseCache::key(self.inner.model(), max_tokens, prompt);

        if let Some(hit) = self.cache.get(&key).await {
            debug!(key = &key[..12], "Completion served from cache");
            return Ok(hit);
        }

        let response = self.inner.complete(prompt, max_tokens).await?;
        self.cache.insert(key, &response).await;
        Ok(response)
    }

    fn model(&self) -> &str {
        self.inner.model()
    }
}
