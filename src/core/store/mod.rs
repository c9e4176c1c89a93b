//! Store (C1): keyed persistence split into five narrow capability groups
//! composed into one `Store` trait, so an in-memory implementation (tests)
//! and a Redis-backed implementation (production) can substitute for each
//! other without touching callers (spec.md §9: "the `Store` capability set
//! is the only abstract seam").

pub mod memory;
pub mod redis_store;

use crate::core::error::CoreResult;
use crate::core::model::Baseline;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

#[async_trait]
pub trait DurationOps: Send + Sync {
    /// Prepend `ms` to the list at `key`; truncate so length <= `window_size`.
    /// Append + trim is observably atomic: the list is never seen by a
    /// concurrent reader with more than `window_size` elements for long.
    async fn append_duration(&self, key: &str, ms: i64, window_size: usize) -> CoreResult<()>;

    /// All samples at `key`, newest-first, in storage order. Missing key ->
    /// empty vec. Malformed entries are silently skipped.
    async fn get_durations(&self, key: &str) -> CoreResult<Vec<i64>>;
}

#[async_trait]
pub trait BaselineOps: Send + Sync {
    /// `None` means "absent", distinct from a zero-valued baseline.
    async fn get_baseline(&self, key: &str) -> CoreResult<Option<Baseline>>;

    /// Overwrite the record. If `updated_at` is the Unix epoch (the
    /// "unstamped" sentinel used by `compute_baseline`), the implementation
    /// stamps it to now before writing.
    async fn set_baseline(&self, key: &str, baseline: Baseline) -> CoreResult<()>;

    /// Batch read; the returned map omits absent keys. Implementations
    /// should pipeline the reads rather than issue them serially.
    async fn get_baselines(&self, keys: &[String]) -> CoreResult<HashMap<String, Baseline>>;
}

#[async_trait]
pub trait DedupOps: Send + Sync {
    /// Atomic test-and-set with expiry. Returns `true` iff the marker
    /// already existed; otherwise installs it with the given TTL and
    /// returns `false`.
    async fn is_duplicate_or_mark(&self, trace_id: &str, ttl: Duration) -> CoreResult<bool>;
}

#[async_trait]
pub trait DirtyOps: Send + Sync {
    /// Add `key` to the unordered dirty set.
    async fn mark_dirty(&self, key: &str) -> CoreResult<()>;

    /// Pop up to `n` elements from the dirty set. Pop must remove: no key
    /// popped here is visible to a concurrent `pop_dirty_batch` call.
    async fn pop_dirty_batch(&self, n: usize) -> CoreResult<Vec<String>>;
}

#[async_trait]
pub trait ListOps: Send + Sync {
    /// All baseline keys (both `base:` and `spanbase:` families) with a
    /// recorded `sample_count >= min_samples`. Unordered.
    async fn list_baseline_keys(&self, min_samples: i64) -> CoreResult<Vec<String>>;
}

/// The aggregate capability set every core subsystem depends on.
#[async_trait]
pub trait Store: DurationOps + BaselineOps + DedupOps + DirtyOps + ListOps {
    /// Release resources. Idempotent; the default no-op is correct for
    /// connection-pooled backends that manage their own lifecycle.
    fn close(&self) {}

    /// Cheap reachability check for `/healthz`; does not imply any of the
    /// capability groups above are individually healthy.
    async fn ping(&self) -> CoreResult<()> {
        Ok(())
    }
}
