// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keyed store with per-entry TTL, bounded size, lazy eviction (§4.4).
//!
//! Backs the health-result cache, recovery-attempt counters, rebuild
//! cooldowns, and the resource-usage cache (§4.8). Expiration is
//! last-access based: a `get` that finds a live entry refreshes its touch
//! time, matching §4.4's "last-access based" wording.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sbx_core::Clock;

struct Entry<V> {
    value: V,
    ttl: Duration,
    touched_at: Instant,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.touched_at) >= self.ttl
    }
}

struct State<K, V> {
    entries: HashMap<K, Entry<V>>,
}

/// A single mutex-protected map; every operation takes the lock for the
/// duration of its work (§4.4: "all operations are mutex-protected").
pub struct TtlCache<K, V, C: Clock> {
    default_ttl: Duration,
    max_size: usize,
    clock: C,
    state: Mutex<State<K, V>>,
}

impl<K, V, C> TtlCache<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    pub fn new(default_ttl: Duration, max_size: usize, clock: C) -> Self {
        Self { default_ttl, max_size, clock, state: Mutex::new(State { entries: HashMap::new() }) }
    }

    /// Returns the live value for `key`, refreshing its touch time. `None`
    /// if absent or expired (an expired entry is removed as a side effect).
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        match state.entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.touched_at = now;
                Some(entry.value.clone())
            }
            Some(_) => {
                state.entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Inserts/overwrites `key` with `ttl` (falling back to the default).
    /// If this insertion would push the cache past `max_size`, expired
    /// entries are reaped first; if still full, the oldest-touched entries
    /// are evicted to make room.
    pub fn set(&self, key: K, value: V, ttl: Option<Duration>) {
        let now = self.clock.now();
        let ttl = ttl.unwrap_or(self.default_ttl);
        let mut state = self.state.lock();
        if !state.entries.contains_key(&key) && state.entries.len() >= self.max_size {
            reap_expired(&mut state.entries, now);
        }
        while !state.entries.contains_key(&key) && state.entries.len() >= self.max_size {
            if let Some(oldest) = oldest_key(&state.entries) {
                state.entries.remove(&oldest);
            } else {
                break;
            }
        }
        state.entries.insert(key, Entry { value, ttl, touched_at: now });
    }

    pub fn delete(&self, key: &K) {
        self.state.lock().entries.remove(key);
    }

    /// Sweeps every entry for expiry; returns the count removed. Called by
    /// the Health Monitor's TTL cleanup loop (§4.5) and after every
    /// Resource Accounting slot release (§4.8).
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock();
        reap_expired(&mut state.entries, now)
    }

    pub fn size(&self) -> usize {
        self.state.lock().entries.len()
    }
}

/// Object-safe sweep hook so the Health Monitor's TTL cleanup loop (§4.5)
/// can sweep every TTL cache in the process — including ones it doesn't
/// itself own, like the Lifecycle Service's rebuild-cooldown cache — without
/// knowing their concrete key/value types.
pub trait TtlSweepable: Send + Sync {
    fn cleanup_expired(&self) -> usize;
}

impl<K, V, C> TtlSweepable for TtlCache<K, V, C>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
    C: Clock + Send + Sync,
{
    fn cleanup_expired(&self) -> usize {
        TtlCache::cleanup_expired(self)
    }
}

fn reap_expired<K: Eq + Hash + Clone, V>(entries: &mut HashMap<K, Entry<V>>, now: Instant) -> usize {
    let expired: Vec<K> =
        entries.iter().filter(|(_, e)| e.is_expired(now)).map(|(k, _)| k.clone()).collect();
    let count = expired.len();
    for key in expired {
        entries.remove(&key);
    }
    count
}

fn oldest_key<K: Eq + Hash + Clone, V>(entries: &HashMap<K, Entry<V>>) -> Option<K> {
    entries.iter().min_by_key(|(_, e)| e.touched_at).map(|(k, _)| k.clone())
}

#[cfg(test)]
#[path = "ttl_cache_tests.rs"]
mod tests;
