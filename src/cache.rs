//! Response caching keyed by request fingerprint.
//!
//! ## Contract
//!
//! - Key: `"{smart_code}:{task_type}:{first 50 chars of base64(prompt)}"`
//! - Capacity bounded by [`CacheConfig::max_entries`]; when full, the entry
//!   with the fewest hits (oldest first on ties) is evicted
//! - Entries older than [`CacheConfig::ttl`] are dropped on their next access
//! - A cache hit returns a clone; the stored response is never modified
//! - Realtime requests are filtered out by the router, not here
//!
//! The maps sit behind `tokio::sync::RwLock`, so concurrent requests with the
//! same fingerprint may both miss and both write; the last write wins.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::types::{AIRequest, AIResponse};

/// Number of base64 characters of the prompt kept in a fingerprint.
pub const FINGERPRINT_PROMPT_CHARS: usize = 50;

fn default_max_entries() -> usize {
    1000
}

fn default_ttl() -> Duration {
    Duration::from_secs(3600)
}

fn default_true() -> bool {
    true
}

/// Configuration for the response cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether responses are cached at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum number of entries in the cache.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Time-to-live for cache entries.
    #[serde(default = "default_ttl", with = "ttl_seconds", rename = "ttl_seconds")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: default_max_entries(),
            ttl: default_ttl(),
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with specified max entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            ..Default::default()
        }
    }

    /// Set the TTL for cache entries.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Enable or disable caching.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

mod ttl_seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(ttl: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(ttl.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Compute the cache fingerprint of a request.
pub fn fingerprint(request: &AIRequest) -> String {
    let encoded = STANDARD.encode(request.prompt.as_bytes());
    let prefix: String = encoded.chars().take(FINGERPRINT_PROMPT_CHARS).collect();
    format!("{}:{}:{}", request.smart_code, request.task_type, prefix)
}

/// A cached entry with metadata.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: AIResponse,
    created_at: Instant,
    access_count: usize,
}

impl CacheEntry {
    fn new(value: AIResponse) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            access_count: 0,
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }

    fn access(&mut self) -> AIResponse {
        self.access_count += 1;
        self.value.clone()
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: usize,
    /// Number of cache misses.
    pub misses: usize,
    /// Current number of entries.
    pub entries: usize,
    /// Number of evictions (capacity, expiry or clear).
    pub evictions: usize,
}

impl CacheStats {
    /// Get the cache hit rate.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Bounded in-memory response cache.
pub struct ResponseCache {
    config: CacheConfig,
    entries: RwLock<HashMap<String, CacheEntry>>,
    stats: RwLock<CacheStats>,
}

impl ResponseCache {
    /// Create a new cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        // Same lock order as the writers: entries, then stats.
        let entries = self.entries.read().await;
        let stats = self.stats.read().await;

        CacheStats {
            entries: entries.len(),
            ..stats.clone()
        }
    }

    /// Clear all cache entries.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        let mut stats = self.stats.write().await;

        stats.evictions += entries.len();
        entries.clear();
    }

    /// Look up a response by fingerprint.
    pub async fn get(&self, key: &str) -> Option<AIResponse> {
        if !self.config.enabled {
            return None;
        }

        let mut entries = self.entries.write().await;

        if let Some(entry) = entries.get_mut(key) {
            if entry.is_expired(self.config.ttl) {
                entries.remove(key);
                let mut stats = self.stats.write().await;
                stats.misses += 1;
                stats.evictions += 1;
                return None;
            }

            let mut stats = self.stats.write().await;
            stats.hits += 1;
            return Some(entry.access());
        }

        let mut stats = self.stats.write().await;
        stats.misses += 1;
        None
    }

    /// Store a response under a fingerprint.
    pub async fn put(&self, key: impl Into<String>, response: AIResponse) {
        if !self.config.enabled || self.config.max_entries == 0 {
            return;
        }

        let key = key.into();
        let mut entries = self.entries.write().await;

        if !entries.contains_key(&key) && entries.len() >= self.config.max_entries {
            self.evict_one(&mut entries).await;
        }

        entries.insert(key, CacheEntry::new(response));
    }

    async fn evict_one(&self, entries: &mut HashMap<String, CacheEntry>) {
        // Expired entries go first, then the least used (oldest on ties).
        let ttl = self.config.ttl;
        let victim = entries
            .iter()
            .find(|(_, e)| e.is_expired(ttl))
            .or_else(|| {
                entries
                    .iter()
                    .min_by_key(|(_, e)| (e.access_count, e.created_at))
            })
            .map(|(k, _)| k.clone());

        if let Some(key) = victim {
            entries.remove(&key);
            let mut stats = self.stats.write().await;
            stats.evictions += 1;
        }
    }
}
