//! Similarity-aware analysis result cache.
//!
//! Results are keyed by classification, text prefix and parameters. A miss
//! on the exact key falls back to the most similar unexpired entry with the
//! same classification. Memory is bounded by entry count and serialized
//! size; eviction prefers expired entries, then the worst blend of recency
//! and access frequency.
//!
//! ## Locking
//!
//! The entry table and the classification index live behind one mutex.
//! Counters are atomics outside it. No lock is held across an await.

pub mod fingerprint;
pub mod metrics;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::error::Result;
use crate::models::{AnalysisContext, AnalysisResult, CacheConfig, Classification, Parameters};

use self::fingerprint::{
    KEY_TEXT_PREFIX_CHARS, classification_fingerprint, parameter_similarity,
    parameters_fingerprint, text_fingerprint, text_prefix, text_similarity,
};
use self::metrics::Counters;

pub use self::metrics::CacheMetrics;

/// Fixed bookkeeping cost added to each entry's serialized size.
pub const ENTRY_OVERHEAD_BYTES: u64 = 200;

/// Weight of the text fingerprint in combined similarity.
const TEXT_SIMILARITY_WEIGHT: f64 = 0.7;
/// Weight of the parameter overlap in combined similarity.
const PARAM_SIMILARITY_WEIGHT: f64 = 0.3;

/// Weight of hours since last access in the eviction score.
const RECENCY_WEIGHT: f64 = 0.7;
/// Weight of inverse access count in the eviction score.
const FREQUENCY_WEIGHT: f64 = 0.3;

/// Sweep period used when the configured interval is zero.
const FALLBACK_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Default threshold for [`ResultCache::invalidate_by_text_similarity`].
pub const DEFAULT_INVALIDATION_SIMILARITY: f64 = 0.9;

#[derive(Debug, Clone)]
struct CacheEntry {
    result: Arc<AnalysisResult>,
    created_at: Instant,
    parameters: Parameters,
    text_fingerprint: String,
    classification_fingerprint: String,
    access_count: u64,
    last_accessed_at: Instant,
    size_bytes: u64,
    /// Insertion order, breaks eviction-score ties
    seq: u64,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.duration_since(self.created_at) >= ttl
    }

    fn touch(&mut self, now: Instant) {
        self.access_count += 1;
        self.last_accessed_at = now;
    }

    /// Higher means a better eviction candidate.
    fn eviction_score(&self, now: Instant) -> f64 {
        let hours = now.duration_since(self.last_accessed_at).as_secs_f64() / 3600.0;
        RECENCY_WEIGHT * hours + FREQUENCY_WEIGHT * (1.0 / (self.access_count as f64 + 1.0))
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    /// classification fingerprint -> keys of its entries
    by_classification: HashMap<String, HashSet<String>>,
    size_bytes: u64,
    next_seq: u64,
}

impl Inner {
    fn insert(&mut self, key: String, entry: CacheEntry) {
        self.size_bytes += entry.size_bytes;
        self.by_classification
            .entry(entry.classification_fingerprint.clone())
            .or_default()
            .insert(key.clone());
        self.entries.insert(key, entry);
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.size_bytes = self.size_bytes.saturating_sub(entry.size_bytes);
        if let Some(keys) = self.by_classification.get_mut(&entry.classification_fingerprint) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_classification
                    .remove(&entry.classification_fingerprint);
            }
        }
        Some(entry)
    }

    /// Remove every entry matching the predicate, returning how many went.
    fn remove_where(&mut self, mut predicate: impl FnMut(&CacheEntry) -> bool) -> usize {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| predicate(entry))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            self.remove(key);
        }
        keys.len()
    }

    /// Oldest expired entry if any, otherwise the highest eviction score.
    fn eviction_candidate(&self, ttl: Duration, now: Instant) -> Option<String> {
        let expired = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(ttl, now))
            .min_by_key(|(_, e)| e.seq);
        if let Some((key, _)) = expired {
            return Some(key.clone());
        }

        self.entries
            .iter()
            .max_by(|(_, a), (_, b)| {
                a.eviction_score(now)
                    .total_cmp(&b.eviction_score(now))
                    // Older entry wins ties
                    .then_with(|| b.seq.cmp(&a.seq))
            })
            .map(|(key, _)| key.clone())
    }
}

/// Outcome of [`ResultCache::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheWrite {
    /// Entry stored after evicting `evicted` others
    Stored { size_bytes: u64, evicted: usize },
    /// Entry alone exceeds the memory budget and was not stored
    Rejected { size_bytes: u64 },
}

/// Shared result cache. Construct once and pass by reference or `Arc`.
#[derive(Debug)]
pub struct ResultCache {
    config: CacheConfig,
    max_size_bytes: u64,
    inner: Mutex<Inner>,
    counters: Counters,
}

impl ResultCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            max_size_bytes: config.max_size_bytes(),
            config,
            inner: Mutex::new(Inner::default()),
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Exact cache key: classification, first 500 characters, parameters.
    pub fn key(context: &AnalysisContext) -> String {
        format!(
            "{}_{}_{}",
            classification_fingerprint(&context.classification),
            text_fingerprint(text_prefix(&context.text, KEY_TEXT_PREFIX_CHARS)),
            parameters_fingerprint(&context.parameters)
        )
    }

    /// Serialized result size plus the fixed per-entry overhead.
    pub fn entry_size(result: &AnalysisResult) -> Result<u64> {
        Ok(serde_json::to_vec(result)?.len() as u64 + ENTRY_OVERHEAD_BYTES)
    }

    /// Look up a result by exact key, then by similarity.
    pub fn get(&self, context: &AnalysisContext) -> Option<Arc<AnalysisResult>> {
        let metrics = self.config.enable_metrics;
        if metrics {
            self.counters.record_request();
        }

        let key = Self::key(context);
        let ttl = self.config.ttl();
        let now = Instant::now();
        let mut inner = self.lock();

        if let Some(entry) = inner.entries.get_mut(&key) {
            if !entry.is_expired(ttl, now) {
                entry.touch(now);
                if metrics {
                    self.counters.record_hit();
                }
                return Some(Arc::clone(&entry.result));
            }
        }

        let text_fp = text_fingerprint(&context.text);
        let class_fp = classification_fingerprint(&context.classification);

        let best = inner.by_classification.get(&class_fp).and_then(|keys| {
            keys.iter()
                .filter_map(|k| inner.entries.get(k).map(|e| (k, e)))
                .filter(|(_, e)| !e.is_expired(ttl, now))
                .map(|(k, e)| {
                    let similarity = TEXT_SIMILARITY_WEIGHT
                        * text_similarity(&text_fp, &e.text_fingerprint)
                        + PARAM_SIMILARITY_WEIGHT
                            * parameter_similarity(&context.parameters, &e.parameters);
                    (k.clone(), similarity)
                })
                .filter(|(_, similarity)| *similarity >= self.config.similarity_threshold)
                .max_by(|a, b| a.1.total_cmp(&b.1))
        });

        if let Some((best_key, similarity)) = best {
            if let Some(entry) = inner.entries.get_mut(&best_key) {
                entry.touch(now);
                if metrics {
                    self.counters.record_hit();
                }
                log::debug!("Cache similarity hit ({similarity:.3})");
                return Some(Arc::clone(&entry.result));
            }
        }

        if metrics {
            self.counters.record_miss();
        }
        None
    }

    /// Store a result, evicting until it fits.
    ///
    /// A result larger than the whole memory budget is rejected so the size
    /// bound always holds.
    pub fn set(
        &self,
        context: &AnalysisContext,
        result: impl Into<Arc<AnalysisResult>>,
    ) -> Result<CacheWrite> {
        let result = result.into();
        let size_bytes = Self::entry_size(&result)?;
        if size_bytes > self.max_size_bytes {
            log::warn!(
                "Not caching result of {} bytes: exceeds cache budget of {} bytes",
                size_bytes,
                self.max_size_bytes
            );
            return Ok(CacheWrite::Rejected { size_bytes });
        }

        let key = Self::key(context);
        let ttl = self.config.ttl();
        let now = Instant::now();
        let mut inner = self.lock();

        // Replacing an entry is not an eviction
        inner.remove(&key);

        let mut evicted = 0;
        while inner.size_bytes + size_bytes > self.max_size_bytes
            || inner.entries.len() >= self.config.max_entries
        {
            let Some(victim) = inner.eviction_candidate(ttl, now) else {
                break;
            };
            inner.remove(&victim);
            evicted += 1;
        }
        if evicted > 0 {
            log::debug!("Evicted {evicted} cache entries to fit {size_bytes} bytes");
        }
        self.counters.record_evictions(evicted);

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.insert(
            key,
            CacheEntry {
                result,
                created_at: now,
                parameters: context.parameters.clone(),
                text_fingerprint: text_fingerprint(&context.text),
                classification_fingerprint: classification_fingerprint(&context.classification),
                access_count: 0,
                last_accessed_at: now,
                size_bytes,
                seq,
            },
        );

        Ok(CacheWrite::Stored {
            size_bytes,
            evicted,
        })
    }

    /// Drop every entry whose stored parameters differ from `parameters`.
    pub fn invalidate_by_parameters(&self, parameters: &Parameters) -> usize {
        let removed = self.lock().remove_where(|e| e.parameters != *parameters);
        self.counters.record_evictions(removed);
        log::info!("Invalidated {removed} cache entries after parameter change");
        removed
    }

    /// Drop every entry stored under this classification.
    pub fn invalidate_by_classification(&self, classification: &Classification) -> usize {
        let class_fp = classification_fingerprint(classification);
        let mut inner = self.lock();
        let keys: Vec<String> = inner
            .by_classification
            .get(&class_fp)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        for key in &keys {
            inner.remove(key);
        }
        drop(inner);

        self.counters.record_evictions(keys.len());
        log::info!(
            "Invalidated {} cache entries for classification '{}'",
            keys.len(),
            classification
        );
        keys.len()
    }

    /// Drop every entry whose text fingerprint similarity to `text` reaches `threshold`.
    pub fn invalidate_by_text_similarity(&self, text: &str, threshold: f64) -> usize {
        let text_fp = text_fingerprint(text);
        let removed = self
            .lock()
            .remove_where(|e| text_similarity(&text_fp, &e.text_fingerprint) >= threshold);
        self.counters.record_evictions(removed);
        log::info!("Invalidated {removed} cache entries by text similarity");
        removed
    }

    /// Remove every TTL-expired entry.
    pub fn purge_expired(&self) -> usize {
        let ttl = self.config.ttl();
        let now = Instant::now();
        let removed = self.lock().remove_where(|e| e.is_expired(ttl, now));
        self.counters.record_evictions(removed);
        if removed > 0 {
            log::debug!("Expiry sweep removed {removed} cache entries");
        }
        removed
    }

    /// Drop all entries and reset the counters.
    pub fn clear(&self) {
        let mut inner = self.lock();
        *inner = Inner::default();
        self.counters.reset();
    }

    pub fn metrics(&self) -> CacheMetrics {
        let (size_bytes, entry_count) = {
            let inner = self.lock();
            (inner.size_bytes, inner.entries.len())
        };
        self.counters.snapshot(size_bytes, entry_count)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start the periodic expiry sweep on the current tokio runtime.
    ///
    /// The task holds only a weak reference and stops once the cache is dropped.
    /// A zero interval falls back to [`FALLBACK_SWEEP_INTERVAL`].
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        let mut period = self.config.cleanup_interval();
        if period.is_zero() {
            log::warn!(
                "cache.cleanup_interval_ms is 0, sweeping every {:?}",
                FALLBACK_SWEEP_INTERVAL
            );
            period = FALLBACK_SWEEP_INTERVAL;
        }

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                cache.purge_expired();
            }
        })
    }
}
