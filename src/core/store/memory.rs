//! In-memory `Store` implementation. Used by the core's own tests and
//! usable as a standalone backend for development. Grounded in the teacher's
//! `RwLock<HashMap<String, VecDeque<_>>>` per-key windowing idiom
//! (`route_quality::baseline::BaselineCalculator`), swapped to `parking_lot`
//! locks for the same reason the teacher uses them: short critical sections,
//! no `.await` held across a lock.

use super::{BaselineOps, DedupOps, DirtyOps, DurationOps, ListOps, Store};
use crate::core::error::CoreResult;
use crate::core::model::Baseline;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

#[derive(Default)]
pub struct MemoryStore {
    durations: RwLock<HashMap<String, VecDeque<i64>>>,
    baselines: RwLock<HashMap<String, Baseline>>,
    dedup: RwLock<HashMap<String, Instant>>,
    dirty: RwLock<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DurationOps for MemoryStore {
    async fn append_duration(&self, key: &str, ms: i64, window_size: usize) -> CoreResult<()> {
        let mut durations = self.durations.write();
        let window = durations.entry(key.to_string()).or_default();
        window.push_front(ms);
        window.truncate(window_size.max(1));
        Ok(())
    }

    async fn get_durations(&self, key: &str) -> CoreResult<Vec<i64>> {
        Ok(self
            .durations
            .read()
            .get(key)
            .map(|w| w.iter().copied().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl BaselineOps for MemoryStore {
    async fn get_baseline(&self, key: &str) -> CoreResult<Option<Baseline>> {
        Ok(self.baselines.read().get(key).copied())
    }

    async fn set_baseline(&self, key: &str, mut baseline: Baseline) -> CoreResult<()> {
        if baseline.updated_at.timestamp() == 0 {
            baseline.updated_at = Utc::now();
        }
        self.baselines.write().insert(key.to_string(), baseline);
        Ok(())
    }

    async fn get_baselines(&self, keys: &[String]) -> CoreResult<HashMap<String, Baseline>> {
        let baselines = self.baselines.read();
        Ok(keys
            .iter()
            .filter_map(|k| baselines.get(k).map(|b| (k.clone(), *b)))
            .collect())
    }
}

#[async_trait]
impl DedupOps for MemoryStore {
    async fn is_duplicate_or_mark(&self, trace_id: &str, ttl: Duration) -> CoreResult<bool> {
        let now = Instant::now();
        let mut dedup = self.dedup.write();
        if let Some(expires_at) = dedup.get(trace_id) {
            if *expires_at > now {
                return Ok(true);
            }
        }
        dedup.insert(trace_id.to_string(), now + ttl);
        Ok(false)
    }
}

#[async_trait]
impl DirtyOps for MemoryStore {
    async fn mark_dirty(&self, key: &str) -> CoreResult<()> {
        self.dirty.write().insert(key.to_string());
        Ok(())
    }

    async fn pop_dirty_batch(&self, n: usize) -> CoreResult<Vec<String>> {
        let mut dirty = self.dirty.write();
        let keys: Vec<String> = dirty.iter().take(n).cloned().collect();
        for key in &keys {
            dirty.remove(key);
        }
        Ok(keys)
    }
}

#[async_trait]
impl ListOps for MemoryStore {
    async fn list_baseline_keys(&self, min_samples: i64) -> CoreResult<Vec<String>> {
        Ok(self
            .baselines
            .read()
            .iter()
            .filter(|(_, b)| b.sample_count >= min_samples)
            .map(|(k, _)| k.clone())
            .collect())
    }
}

impl Store for MemoryStore {}
