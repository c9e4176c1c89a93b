//! Baseline Lookup (C6): five-level fallback with weighted aggregation
//! across already-percentiled buckets. `BaselineLookup` drives `base:`/
//! `dur:` keys; `SpanBaselineLookup` is the identical shape over
//! `spanbase:`/`spandur:` keys (spec.md §4.6).

use crate::core::config::FallbackConfig;
use crate::core::keys::{baseline_key, span_baseline_key};
use crate::core::model::{Baseline, BaselineResult, BaselineSource, DayType, TimeBucket};
use crate::core::store::Store;
use std::sync::Arc;
use tracing::warn;

const ALL_HOURS: [u8; 24] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23,
];
const ALL_DAY_TYPES: [DayType; 2] = [DayType::Weekday, DayType::Weekend];

/// Sample-count-weighted aggregation of already-percentiled baselines
/// (spec.md §4.6's caveat: this approximates percentiles over the raw
/// samples and is documented as such, not "corrected").
fn aggregate(baselines: &[Baseline]) -> Baseline {
    let total: i64 = baselines.iter().map(|b| b.sample_count).sum();
    if total == 0 {
        return Baseline::zero();
    }
    let total_f = total as f64;
    let mut p50 = 0.0;
    let mut p95 = 0.0;
    let mut mad = 0.0;
    let mut updated_at = baselines[0].updated_at;
    for b in baselines {
        let weight = b.sample_count as f64 / total_f;
        p50 += b.p50 * weight;
        p95 += b.p95 * weight;
        mad += b.mad * weight;
        if b.updated_at > updated_at {
            updated_at = b.updated_at;
        }
    }
    Baseline {
        p50,
        p95,
        mad,
        sample_count: total,
        updated_at,
    }
}

/// Neighbor hours in the order `±1, ±2, ..., ±range`, wrapping modulo 24,
/// deduplicated.
fn nearby_hours(hour: u8, range: u8) -> Vec<u8> {
    let mut seen = std::collections::HashSet::new();
    let mut hours = Vec::new();
    for i in 1..=range as i32 {
        for delta in [-i, i] {
            let h = (hour as i32 + delta).rem_euclid(24) as u8;
            if h != hour && seen.insert(h) {
                hours.push(h);
            }
        }
    }
    hours
}

type KeyFn = fn(&str, &str, TimeBucket) -> String;

pub struct BaselineLookup {
    store: Arc<dyn Store>,
    fallback: FallbackConfig,
    min_samples: i64,
}

impl BaselineLookup {
    pub fn new(store: Arc<dyn Store>, fallback: FallbackConfig, min_samples: i64) -> Self {
        BaselineLookup {
            store,
            fallback,
            min_samples,
        }
    }

    pub async fn lookup(&self, service: &str, endpoint: &str, bucket: TimeBucket) -> BaselineResult {
        lookup_impl(
            &self.store,
            service,
            endpoint,
            bucket,
            &self.fallback,
            self.min_samples,
            baseline_key,
        )
        .await
    }
}

pub struct SpanBaselineLookup {
    store: Arc<dyn Store>,
    fallback: FallbackConfig,
    min_samples: i64,
}

impl SpanBaselineLookup {
    pub fn new(store: Arc<dyn Store>, fallback: FallbackConfig, min_samples: i64) -> Self {
        SpanBaselineLookup {
            store,
            fallback,
            min_samples,
        }
    }

    pub async fn lookup(&self, service: &str, span_name: &str, bucket: TimeBucket) -> BaselineResult {
        lookup_impl(
            &self.store,
            service,
            span_name,
            bucket,
            &self.fallback,
            self.min_samples,
            span_baseline_key,
        )
        .await
    }
}

async fn lookup_impl(
    store: &Arc<dyn Store>,
    service: &str,
    leaf: &str,
    bucket: TimeBucket,
    fallback: &FallbackConfig,
    min_samples: i64,
    key_of: KeyFn,
) -> BaselineResult {
    // Level 1 -- exact.
    match store.get_baseline(&key_of(service, leaf, bucket)).await {
        Ok(Some(baseline)) if baseline.sample_count >= min_samples => {
            return BaselineResult {
                baseline: Some(baseline),
                source: BaselineSource::Exact,
                fallback_level: 1,
                details: format!("exact match: {}|{}", bucket.hour, bucket.day_type.as_str()),
                cannot_determine: false,
            };
        }
        Ok(_) => {}
        Err(err) => warn!(%err, "level-1 lookup failed, treating as no data"),
    }

    // Level 2 -- nearby hours.
    if fallback.nearby_hours_enabled {
        let neighbor_hours = nearby_hours(bucket.hour, fallback.nearby_hours_range);
        let keys: Vec<String> = neighbor_hours
            .iter()
            .map(|&h| {
                key_of(
                    service,
                    leaf,
                    TimeBucket {
                        hour: h,
                        day_type: bucket.day_type,
                    },
                )
            })
            .collect();

        match store.get_baselines(&keys).await {
            Ok(found) => {
                let mut contributing_hours = Vec::new();
                let mut baselines = Vec::new();
                for (hour, key) in neighbor_hours.iter().zip(keys.iter()) {
                    if let Some(b) = found.get(key) {
                        if b.sample_count <= 0 {
                            continue;
                        }
                        contributing_hours.push(*hour);
                        baselines.push(*b);
                    }
                }
                let total: i64 = baselines.iter().map(|b| b.sample_count).sum();
                if total >= fallback.nearby_min_samples && !baselines.is_empty() {
                    let hours_str = contributing_hours
                        .iter()
                        .map(|h| h.to_string())
                        .collect::<Vec<_>>()
                        .join(",");
                    return BaselineResult {
                        baseline: Some(aggregate(&baselines)),
                        source: BaselineSource::Nearby,
                        fallback_level: 2,
                        details: format!("nearby hours: {hours_str} ({})", bucket.day_type.as_str()),
                        cannot_determine: false,
                    };
                }
            }
            Err(err) => warn!(%err, "level-2 lookup failed, treating as no data"),
        }
    }

    // Level 3 -- day-type global.
    if fallback.day_type_global_enabled {
        let keys: Vec<String> = ALL_HOURS
            .iter()
            .map(|&h| {
                key_of(
                    service,
                    leaf,
                    TimeBucket {
                        hour: h,
                        day_type: bucket.day_type,
                    },
                )
            })
            .collect();

        match store.get_baselines(&keys).await {
            Ok(found) => {
                let mut contributing_hours: Vec<u8> = Vec::new();
                let mut baselines = Vec::new();
                for (hour, key) in ALL_HOURS.iter().zip(keys.iter()) {
                    if let Some(b) = found.get(key) {
                        if b.sample_count <= 0 {
                            continue;
                        }
                        contributing_hours.push(*hour);
                        baselines.push(*b);
                    }
                }
                let total: i64 = baselines.iter().map(|b| b.sample_count).sum();
                if total >= fallback.day_type_global_min_samples && !baselines.is_empty() {
                    contributing_hours.sort_unstable();
                    let hours_str = contributing_hours
                        .iter()
                        .map(|h| h.to_string())
                        .collect::<Vec<_>>()
                        .join(",");
                    return BaselineResult {
                        baseline: Some(aggregate(&baselines)),
                        source: BaselineSource::Daytype,
                        fallback_level: 3,
                        details: format!("daytype={} hours={hours_str}", bucket.day_type.as_str()),
                        cannot_determine: false,
                    };
                }
            }
            Err(err) => warn!(%err, "level-3 lookup failed, treating as no data"),
        }
    }

    // Level 4 -- full global.
    if fallback.full_global_enabled {
        let keys: Vec<String> = ALL_DAY_TYPES
            .iter()
            .flat_map(|&dt| {
                ALL_HOURS.iter().map(move |&h| {
                    key_of(
                        service,
                        leaf,
                        TimeBucket {
                            hour: h,
                            day_type: dt,
                        },
                    )
                })
            })
            .collect();

        match store.get_baselines(&keys).await {
            Ok(found) => {
                let baselines: Vec<Baseline> = keys
                    .iter()
                    .filter_map(|k| found.get(k).copied().filter(|b| b.sample_count > 0))
                    .collect();
                let total: i64 = baselines.iter().map(|b| b.sample_count).sum();
                if total >= fallback.full_global_min_samples && !baselines.is_empty() {
                    return BaselineResult {
                        baseline: Some(aggregate(&baselines)),
                        source: BaselineSource::Global,
                        fallback_level: 4,
                        details: "full global across all hours/daytypes".to_string(),
                        cannot_determine: false,
                    };
                }
            }
            Err(err) => warn!(%err, "level-4 lookup failed, treating as no data"),
        }
    }

    // Level 5 -- unavailable.
    BaselineResult {
        baseline: None,
        source: BaselineSource::Unavailable,
        fallback_level: 5,
        details: "no baseline data available".to_string(),
        cannot_determine: true,
    }
}
