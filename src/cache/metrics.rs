//! Cache counters.
//!
//! Hit/miss/eviction counters are atomics so they can be bumped without the
//! entry-table lock; size and entry count are read from the table itself.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time view of the cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub requests: u64,
    pub size_bytes: u64,
    pub entry_count: usize,
    pub hit_rate: f64,
    pub eviction_count: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    requests: AtomicU64,
    evictions: AtomicU64,
}

impl Counters {
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: usize) {
        if count > 0 {
            self.evictions.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub fn reset(&self) {
        for counter in [&self.hits, &self.misses, &self.requests, &self.evictions] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self, size_bytes: u64, entry_count: usize) -> CacheMetrics {
        let hits = self.hits.load(Ordering::Relaxed);
        let requests = self.requests.load(Ordering::Relaxed);
        let hit_rate = if requests > 0 {
            hits as f64 / requests as f64
        } else {
            0.0
        };

        CacheMetrics {
            hits,
            misses: self.misses.load(Ordering::Relaxed),
            requests,
            size_bytes,
            entry_count,
            hit_rate,
            eviction_count: self.evictions.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_is_hits_over_requests() {
        let counters = Counters::default();
        for _ in 0..4 {
            counters.record_request();
        }
        counters.record_hit();
        counters.record_miss();
        counters.record_miss();
        counters.record_miss();

        let snapshot = counters.snapshot(10, 1);
        assert_eq!(snapshot.hit_rate, 0.25);
        assert_eq!(snapshot.misses, 3);
    }

    #[test]
    fn reset_zeroes_counters() {
        let counters = Counters::default();
        counters.record_request();
        counters.record_evictions(3);
        counters.reset();

        assert_eq!(counters.snapshot(0, 0), CacheMetrics::default());
    }
}
