//! Core-level configuration: the subset of `spec.md` §6's option table the
//! core subsystems (C4-C8) consume directly. The full `Config` (including
//! the facade's HTTP/Redis/Tempo sections) lives in `crate::config` and
//! embeds these structs.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatsConfig {
    /// Relative-threshold multiplier on P95.
    pub factor: f64,
    /// MAD multiplier for the absolute threshold.
    pub k: i64,
    /// Minimum `sampleCount` to trust a baseline.
    pub min_samples: i64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        StatsConfig {
            factor: 2.0,
            k: 10,
            min_samples: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FallbackConfig {
    pub nearby_hours_enabled: bool,
    pub nearby_hours_range: u8,
    pub nearby_min_samples: i64,
    pub day_type_global_enabled: bool,
    pub day_type_global_min_samples: i64,
    pub full_global_enabled: bool,
    pub full_global_min_samples: i64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        FallbackConfig {
            nearby_hours_enabled: true,
            nearby_hours_range: 2,
            nearby_min_samples: 20,
            day_type_global_enabled: true,
            day_type_global_min_samples: 50,
            full_global_enabled: true,
            full_global_min_samples: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DedupConfig {
    #[serde(with = "crate::config::duration_serde")]
    pub ttl: Duration,
}

impl Default for DedupConfig {
    fn default() -> Self {
        DedupConfig {
            ttl: Duration::from_secs(6 * 3600),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PollingConfig {
    #[serde(with = "crate::config::duration_serde")]
    pub tempo_interval: Duration,
    #[serde(with = "crate::config::duration_serde")]
    pub tempo_lookback: Duration,
    #[serde(with = "crate::config::duration_serde")]
    pub baseline_interval: Duration,
    pub backfill_enabled: bool,
    #[serde(with = "crate::config::duration_serde")]
    pub backfill_duration: Duration,
    #[serde(with = "crate::config::duration_serde")]
    pub backfill_batch: Duration,
    pub span_tracking_enabled: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        PollingConfig {
            tempo_interval: Duration::from_secs(15),
            tempo_lookback: Duration::from_secs(120),
            baseline_interval: Duration::from_secs(30),
            backfill_enabled: true,
            backfill_duration: Duration::from_secs(24 * 3600),
            backfill_batch: Duration::from_secs(600),
            span_tracking_enabled: true,
        }
    }
}
