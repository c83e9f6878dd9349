// Short-lived cache of hotel search results so repeated searches for the same
// city and dates do not hit the availability API again

use crate::model::{Hotel, HotelSearchQuery};
use crate::validation::ranges_overlap;
use chrono::NaiveDate;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Default)]
struct CacheStats {
    hit_count: AtomicUsize,
    miss_count: AtomicUsize,
    expired_count: AtomicUsize,
    eviction_count: AtomicUsize,
    invalidated_count: AtomicUsize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStatsReport {
    pub items_count: usize,
    pub hit_count: usize,
    pub miss_count: usize,
    pub expired_count: usize,
    pub eviction_count: usize,
    pub invalidated_count: usize,
}

struct CacheEntry {
    hotels: Vec<Hotel>,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }
}

// Searches are case-insensitive on the city
fn cache_key(query: &HotelSearchQuery) -> HotelSearchQuery {
    HotelSearchQuery {
        city: query.city.trim().to_lowercase(),
        ..query.clone()
    }
}

pub struct AvailabilityCache {
    entries: DashMap<HotelSearchQuery, CacheEntry>,
    ttl: Duration,
    max_entries: usize,
    stats: CacheStats,
}

impl AvailabilityCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
            stats: CacheStats::default(),
        }
    }

    pub fn get(&self, query: &HotelSearchQuery) -> Option<Vec<Hotel>> {
        let key = cache_key(query);

        let expired = match self.entries.get(&key) {
            Some(entry) if !entry.is_expired() => {
                self.stats.hit_count.fetch_add(1, Ordering::SeqCst);
                return Some(entry.hotels.clone());
            }
            Some(_) => true,
            None => false,
        };

        // read guard is dropped before removing
        if expired && self.entries.remove(&key).is_some() {
            self.stats.expired_count.fetch_add(1, Ordering::SeqCst);
        }
        self.stats.miss_count.fetch_add(1, Ordering::SeqCst);
        None
    }

    pub fn store(&self, query: &HotelSearchQuery, hotels: Vec<Hotel>) {
        let key = cache_key(query);

        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.evict_oldest();
        }

        debug!(
            "Caching {} hotels for {} {}..{}",
            hotels.len(),
            key.city,
            key.check_in,
            key.check_out
        );
        self.entries.insert(
            key,
            CacheEntry {
                hotels,
                created_at: Instant::now(),
                ttl: self.ttl,
            },
        );
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.created_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            if self.entries.remove(&key).is_some() {
                self.stats.eviction_count.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    // Drop every cached search whose stay shares a night with the given dates
    pub fn invalidate_stay(&self, check_in: NaiveDate, check_out: NaiveDate) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|key, _| !ranges_overlap(key.check_in, key.check_out, check_in, check_out));
        let removed = before.saturating_sub(self.entries.len());
        self.stats
            .invalidated_count
            .fetch_add(removed, Ordering::SeqCst);
        removed
    }

    pub fn invalidate_city(&self, city: &str) -> usize {
        let city = city.trim().to_lowercase();
        let before = self.entries.len();
        self.entries.retain(|key, _| key.city != city);
        let removed = before.saturating_sub(self.entries.len());
        self.stats
            .invalidated_count
            .fetch_add(removed, Ordering::SeqCst);
        removed
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStatsReport {
        CacheStatsReport {
            items_count: self.entries.len(),
            hit_count: self.stats.hit_count.load(Ordering::SeqCst),
            miss_count: self.stats.miss_count.load(Ordering::SeqCst),
            expired_count: self.stats.expired_count.load(Ordering::SeqCst),
            eviction_count: self.stats.eviction_count.load(Ordering::SeqCst),
            invalidated_count: self.stats.invalidated_count.load(Ordering::SeqCst),
        }
    }
}
