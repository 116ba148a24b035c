//! Fixed-capacity recency list of changed URLs

use serde::Serialize;
use std::collections::VecDeque;

/// Changed URL with its change time (unix seconds)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeltaEntry {
    pub url: String,
    pub changed_at: i64,
}

/// Newest-first ring of unique URLs
///
/// Re-pushing a URL moves it to the front with the new timestamp. Pushing
/// past capacity evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct DeltaRing {
    capacity: usize,
    entries: VecDeque<DeltaEntry>,
}

impl DeltaRing {
    /// A capacity of zero is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a change, returning URLs evicted by the capacity limit
    pub fn push(&mut self, url: impl Into<String>, changed_at: i64) -> Vec<String> {
        let url = url.into();
        if let Some(pos) = self.entries.iter().position(|e| e.url == url) {
            self.entries.remove(pos);
        }
        self.entries.push_front(DeltaEntry { url, changed_at });
        self.evict()
    }

    /// Change capacity, returning URLs evicted by shrinking
    pub fn set_capacity(&mut self, capacity: usize) -> Vec<String> {
        self.capacity = capacity.max(1);
        self.evict()
    }

    fn evict(&mut self) -> Vec<String> {
        let mut evicted = Vec::new();
        while self.entries.len() > self.capacity {
            if let Some(entry) = self.entries.pop_back() {
                evicted.push(entry.url);
            }
        }
        evicted
    }

    /// Up to `limit` newest entries
    pub fn recent(&self, limit: usize) -> Vec<DeltaEntry> {
        self.entries.iter().take(limit).cloned().collect()
    }

    /// Entries changed at or after `since`, newest first
    pub fn since(&self, since: i64) -> Vec<DeltaEntry> {
        self.entries
            .iter()
            .filter(|e| e.changed_at >= since)
            .cloned()
            .collect()
    }
}
