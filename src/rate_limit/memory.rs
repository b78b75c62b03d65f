//! Single-process counter store.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{unix_now, CounterStore};

const MAX_TRACKED_KEYS: usize = 10_000;
const STALE_AFTER_SECS: u64 = 3_600;

struct Counter {
    window_start: u64,
    count: u64,
    touched: u64,
}

/// Counters behind a process-local mutex. Correct for a single instance
/// only; a shared deployment needs the Mongo-backed store.
#[derive(Default)]
pub struct MemoryCounterStore {
    counters: Mutex<HashMap<String, Counter>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr(&self, key: &str, window_start: u64) -> Result<u64, String> {
        let mut counters = self.counters.lock().map_err(|e| e.to_string())?;
        let now = unix_now();
        let entry = counters.entry(key.to_string()).or_insert(Counter {
            window_start,
            count: 0,
            touched: now,
        });
        if entry.window_start != window_start {
            entry.window_start = window_start;
            entry.count = 0;
        }
        entry.count += 1;
        entry.touched = now;
        let count = entry.count;

        if counters.len() > MAX_TRACKED_KEYS {
            counters.retain(|_, c| now.saturating_sub(c.touched) < STALE_AFTER_SECS);
        }

        Ok(count)
    }
}
