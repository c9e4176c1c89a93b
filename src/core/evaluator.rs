//! Evaluator (C7): threshold decision and stable explanation string, shared
//! between the trace and span check paths.

use crate::core::bucket::bucket_for_nanos;
use crate::core::config::StatsConfig;
use crate::core::lookup::{BaselineLookup, SpanBaselineLookup};
use crate::core::model::{
    AnomalyCheckRequest, AnomalyCheckResponse, Baseline, SpanAnomalyCheckRequest,
};
use std::collections::HashMap;
use std::sync::Arc;

/// `max(P95 * factor, P50 + k * MAD)`.
pub fn threshold(baseline: &Baseline, stats: &StatsConfig) -> f64 {
    let relative = baseline.p95 * stats.factor;
    let absolute = baseline.p50 + stats.k as f64 * baseline.mad;
    relative.max(absolute)
}

fn explanation(duration_ms: i64, threshold_ms: f64, baseline: &Baseline, stats: &StatsConfig) -> String {
    let verb = if duration_ms as f64 > threshold_ms {
        "exceeds"
    } else {
        "within"
    };
    format!(
        "duration {duration_ms}ms {verb} threshold {threshold_ms:.2}ms (p50={:.2}, p95={:.2}, MAD={:.2}, factor={:.2}, k={})",
        baseline.p50, baseline.p95, baseline.mad, stats.factor, stats.k
    )
}

fn insufficient_explanation(sample_count: i64, min_samples: i64) -> String {
    format!("no baseline available or insufficient samples (have {sample_count}, need >= {min_samples})")
}

/// Decides anomaly status given an already-resolved baseline and sample
/// count. Applies the insufficient-samples re-check from spec.md §4.7: even
/// a baseline a fallback level already accepted is re-checked against the
/// global `Stats.MinSamples`.
fn decide(
    duration_ms: i64,
    baseline: Option<Baseline>,
    fallback_level: u8,
    source: &str,
    stats: &StatsConfig,
) -> AnomalyCheckResponse {
    let sample_count = baseline.map(|b| b.sample_count).unwrap_or(0);
    if baseline.is_none() || sample_count < stats.min_samples {
        metrics::counter!("anomaly_checks_total", "result" => "insufficient").increment(1);
        return AnomalyCheckResponse {
            is_anomaly: false,
            cannot_determine: true,
            explanation: insufficient_explanation(sample_count, stats.min_samples),
            threshold_ms: 0.0,
            baseline_source: source.to_string(),
            fallback_level,
        };
    }

    let baseline = baseline.unwrap();
    let threshold_ms = threshold(&baseline, stats);
    let is_anomaly = duration_ms as f64 > threshold_ms;
    metrics::counter!("anomaly_checks_total", "result" => if is_anomaly { "anomaly" } else { "normal" })
        .increment(1);

    AnomalyCheckResponse {
        is_anomaly,
        cannot_determine: false,
        explanation: explanation(duration_ms, threshold_ms, &baseline, stats),
        threshold_ms,
        baseline_source: source.to_string(),
        fallback_level,
    }
}

pub struct Evaluator {
    lookup: Arc<BaselineLookup>,
    span_lookup: Arc<SpanBaselineLookup>,
    stats: StatsConfig,
    timezone: String,
}

impl Evaluator {
    pub fn new(
        lookup: Arc<BaselineLookup>,
        span_lookup: Arc<SpanBaselineLookup>,
        stats: StatsConfig,
        timezone: String,
    ) -> Self {
        Evaluator {
            lookup,
            span_lookup,
            stats,
            timezone,
        }
    }

    pub async fn check(&self, req: &AnomalyCheckRequest) -> crate::core::error::CoreResult<AnomalyCheckResponse> {
        let bucket = bucket_for_nanos(req.start_nano, &self.timezone)?;
        let result = self.lookup.lookup(&req.service, &req.endpoint, bucket).await;
        Ok(decide(
            req.duration_ms,
            result.baseline,
            result.fallback_level,
            result.source.as_str(),
            &self.stats,
        ))
    }

    pub async fn span_check(
        &self,
        req: &SpanAnomalyCheckRequest,
    ) -> crate::core::error::CoreResult<AnomalyCheckResponse> {
        let bucket = bucket_for_nanos(req.start_nano, &self.timezone)?;
        let result = self
            .span_lookup
            .lookup(&req.service_name, &req.span_name, bucket)
            .await;
        Ok(decide(
            req.duration_ms,
            result.baseline,
            result.fallback_level,
            result.source.as_str(),
            &self.stats,
        ))
    }

    /// Batch variant: caches lookup results by `service|endpoint|hour|dayType`
    /// across the batch to avoid redundant store calls; output order matches
    /// input order (spec.md §4.7).
    pub async fn check_batch(
        &self,
        requests: &[AnomalyCheckRequest],
    ) -> crate::core::error::CoreResult<Vec<AnomalyCheckResponse>> {
        let mut cache: HashMap<String, crate::core::model::BaselineResult> = HashMap::new();
        let mut responses = Vec::with_capacity(requests.len());

        for req in requests {
            let bucket = bucket_for_nanos(req.start_nano, &self.timezone)?;
            let cache_key = format!(
                "{}|{}|{}|{}",
                req.service,
                req.endpoint,
                bucket.hour,
                bucket.day_type.as_str()
            );
            if !cache.contains_key(&cache_key) {
                let result = self.lookup.lookup(&req.service, &req.endpoint, bucket).await;
                cache.insert(cache_key.clone(), result);
            }
            let result = cache.get(&cache_key).unwrap();
            responses.push(decide(
                req.duration_ms,
                result.baseline,
                result.fallback_level,
                result.source.as_str(),
                &self.stats,
            ));
        }

        Ok(responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::FallbackConfig;
    use crate::core::error::CoreResult;
    use crate::core::keys::baseline_key;
    use crate::core::model::{DayType, TimeBucket};
    use crate::core::store::memory::MemoryStore;
    use crate::core::store::{BaselineOps, DedupOps, DirtyOps, DurationOps, ListOps, Store};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Wraps a `MemoryStore` to count `get_baseline` calls, so the batch
    /// variant's per-bucket caching can be verified directly rather than
    /// inferred from response contents alone.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        get_baseline_calls: AtomicUsize,
    }

    #[async_trait]
    impl DurationOps for CountingStore {
        async fn append_duration(&self, key: &str, ms: i64, window_size: usize) -> CoreResult<()> {
            self.inner.append_duration(key, ms, window_size).await
        }
        async fn get_durations(&self, key: &str) -> CoreResult<Vec<i64>> {
            self.inner.get_durations(key).await
        }
    }

    #[async_trait]
    impl BaselineOps for CountingStore {
        async fn get_baseline(&self, key: &str) -> CoreResult<Option<Baseline>> {
            self.get_baseline_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get_baseline(key).await
        }
        async fn set_baseline(&self, key: &str, baseline: Baseline) -> CoreResult<()> {
            self.inner.set_baseline(key, baseline).await
        }
        async fn get_baselines(&self, keys: &[String]) -> CoreResult<HashMap<String, Baseline>> {
            self.inner.get_baselines(keys).await
        }
    }

    #[async_trait]
    impl DedupOps for CountingStore {
        async fn is_duplicate_or_mark(&self, trace_id: &str, ttl: Duration) -> CoreResult<bool> {
            self.inner.is_duplicate_or_mark(trace_id, ttl).await
        }
    }

    #[async_trait]
    impl DirtyOps for CountingStore {
        async fn mark_dirty(&self, key: &str) -> CoreResult<()> {
            self.inner.mark_dirty(key).await
        }
        async fn pop_dirty_batch(&self, n: usize) -> CoreResult<Vec<String>> {
            self.inner.pop_dirty_batch(n).await
        }
    }

    #[async_trait]
    impl ListOps for CountingStore {
        async fn list_baseline_keys(&self, min_samples: i64) -> CoreResult<Vec<String>> {
            self.inner.list_baseline_keys(min_samples).await
        }
    }

    impl Store for CountingStore {}

    fn baseline(p50: f64, p95: f64, mad: f64, count: i64) -> Baseline {
        Baseline {
            p50,
            p95,
            mad,
            sample_count: count,
            updated_at: Utc::now(),
        }
    }

    fn stats(factor: f64, k: i64, min_samples: i64) -> StatsConfig {
        StatsConfig {
            factor,
            k,
            min_samples,
        }
    }

    #[test]
    fn threshold_matches_scenario_3() {
        let b = baseline(100.0, 200.0, 20.0, 100);
        let s = stats(1.5, 3, 10);
        assert_eq!(threshold(&b, &s), 300.0);
    }

    #[test]
    fn scenario_3_within_then_exceeds() {
        let b = baseline(100.0, 200.0, 20.0, 100);
        let s = stats(1.5, 3, 10);
        let within = decide(250, Some(b), 1, "exact", &s);
        assert!(!within.is_anomaly);
        assert!(within.explanation.contains("within threshold 300.00ms"));

        let exceeds = decide(350, Some(b), 1, "exact", &s);
        assert!(exceeds.is_anomaly);
        assert!(exceeds.explanation.contains("exceeds"));
    }

    #[test]
    fn scenario_4_insufficient_samples_at_exact() {
        let b = baseline(100.0, 200.0, 20.0, 4);
        let s = stats(2.0, 10, 10);
        let result = decide(999, Some(b), 5, "unavailable", &s);
        assert!(!result.is_anomaly);
        assert!(result.cannot_determine);
        assert!(result.explanation.contains("have 4, need >= 10"));
    }

    #[test]
    fn threshold_is_monotonic_shrinking_factor_or_k_only_lowers_it() {
        let b = baseline(100.0, 200.0, 20.0, 100);
        let base = threshold(&b, &stats(2.0, 10, 10));
        let lower_factor = threshold(&b, &stats(1.0, 10, 10));
        let lower_k = threshold(&b, &stats(2.0, 5, 10));
        assert!(lower_factor <= base);
        assert!(lower_k <= base);
    }

    #[tokio::test]
    async fn check_batch_caches_lookups_sharing_the_same_bucket() {
        let store = Arc::new(CountingStore::default());
        let bucket = TimeBucket {
            hour: 16,
            day_type: DayType::Weekday,
        };
        store
            .set_baseline(&baseline_key("api", "GET /u", bucket), baseline(100.0, 200.0, 20.0, 100))
            .await
            .unwrap();

        let store_dyn: Arc<dyn Store> = store.clone();
        let lookup = Arc::new(BaselineLookup::new(store_dyn.clone(), FallbackConfig::default(), 10));
        let span_lookup = Arc::new(SpanBaselineLookup::new(store_dyn, FallbackConfig::default(), 10));
        let evaluator = Evaluator::new(lookup, span_lookup, stats(1.5, 3, 10), "Asia/Taipei".to_string());

        let requests = vec![
            AnomalyCheckRequest {
                service: "api".to_string(),
                endpoint: "GET /u".to_string(),
                start_nano: 1_704_700_800_000_000_000,
                duration_ms: 250,
            },
            AnomalyCheckRequest {
                service: "api".to_string(),
                endpoint: "GET /u".to_string(),
                start_nano: 1_704_700_800_000_000_000,
                duration_ms: 350,
            },
        ];

        let responses = evaluator.check_batch(&requests).await.unwrap();
        assert_eq!(responses.len(), 2);
        assert!(!responses[0].is_anomaly);
        assert!(responses[1].is_anomaly);
        assert_eq!(responses[0].baseline_source, responses[1].baseline_source);
        assert_eq!(responses[0].threshold_ms, responses[1].threshold_ms);

        // Both requests share the same service|endpoint|hour|dayType key, so
        // only one underlying store lookup should have fired.
        assert_eq!(store.get_baseline_calls.load(Ordering::SeqCst), 1);
    }
}
