//! Recomputer (C5): drains the dirty set, reloads each bucket's window,
//! recomputes statistics, and writes the baseline back. Runs as a periodic
//! task (see `core::poller`).

use crate::core::keys::parse_baseline_key;
use crate::core::stats::compute_baseline;
use crate::core::store::Store;
use std::sync::Arc;
use tracing::warn;

pub const DEFAULT_BATCH_SIZE: usize = 100;

pub struct Recomputer {
    store: Arc<dyn Store>,
}

impl Recomputer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Recomputer { store }
    }

    /// One tick: pop up to `batch_size` dirty keys and recompute each.
    /// Per-key errors are logged and do not abort the batch (spec.md §4.5,
    /// §7). Returns the number of keys successfully recomputed.
    pub async fn tick(&self, batch_size: usize) -> usize {
        let keys = match self.store.pop_dirty_batch(batch_size).await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(%err, "failed to pop dirty batch");
                return 0;
            }
        };

        let mut recomputed = 0;
        for key in keys {
            match self.recompute_one(&key).await {
                Ok(true) => recomputed += 1,
                Ok(false) => {}
                Err(err) => warn!(key = %key, %err, "recompute failed for key"),
            }
        }
        metrics::counter!("recompute_keys_total").increment(recomputed as u64);
        recomputed
    }

    /// `Ok(true)` means a baseline was written; `Ok(false)` means the key
    /// was dropped (unknown prefix) without being counted as recomputed.
    async fn recompute_one(&self, key: &str) -> anyhow::Result<bool> {
        let parsed = match parse_baseline_key(key) {
            Some(p) => p,
            None => {
                warn!(key = %key, "dropping dirty key with unknown prefix");
                return Ok(false);
            }
        };

        let durations = self.store.get_durations(&parsed.duration_key()).await?;
        let baseline = compute_baseline(&durations);
        self.store.set_baseline(key, baseline).await?;
        Ok(true)
    }
}
