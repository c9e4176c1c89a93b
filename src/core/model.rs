//! Data model shared across the core subsystems (C1-C8): buckets, events,
//! baselines, and the request/response shapes the facade marshals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `{hour: 0..=23, day_type}`, derived from a Unix-nanosecond instant in a
/// configured IANA timezone. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeBucket {
    pub hour: u8,
    pub day_type: DayType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayType {
    Weekday,
    Weekend,
}

impl DayType {
    pub fn as_str(self) -> &'static str {
        match self {
            DayType::Weekday => "weekday",
            DayType::Weekend => "weekend",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "weekday" => Some(DayType::Weekday),
            "weekend" => Some(DayType::Weekend),
            _ => None,
        }
    }
}

/// Transient event consumed by trace-level ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub trace_id: String,
    pub service: String,
    pub endpoint: String,
    pub start_nano: i64,
    pub duration_ms: i64,
}

/// Transient event consumed by span-level ingest. Carries no trace id: spans
/// are never deduplicated (spec.md §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanEvent {
    pub service_name: String,
    pub name: String,
    pub start_nano: i64,
    pub end_nano: i64,
}

/// Persisted summary statistics for one bucket. Created/mutated only by the
/// recomputer; never deleted by core logic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub p50: f64,
    pub p95: f64,
    pub mad: f64,
    pub sample_count: i64,
    pub updated_at: DateTime<Utc>,
}

impl Baseline {
    pub fn zero() -> Self {
        Baseline {
            p50: 0.0,
            p95: 0.0,
            mad: 0.0,
            sample_count: 0,
            updated_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselineSource {
    Exact,
    Nearby,
    Daytype,
    Global,
    Unavailable,
}

impl BaselineSource {
    pub fn as_str(self) -> &'static str {
        match self {
            BaselineSource::Exact => "exact",
            BaselineSource::Nearby => "nearby",
            BaselineSource::Daytype => "daytype",
            BaselineSource::Global => "global",
            BaselineSource::Unavailable => "unavailable",
        }
    }
}

/// Output of the five-level fallback lookup (C6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineResult {
    pub baseline: Option<Baseline>,
    pub source: BaselineSource,
    pub fallback_level: u8,
    pub details: String,
    pub cannot_determine: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnomalyCheckRequest {
    pub service: String,
    pub endpoint: String,
    pub start_nano: i64,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpanAnomalyCheckRequest {
    pub service_name: String,
    pub span_name: String,
    pub start_nano: i64,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnomalyCheckResponse {
    pub is_anomaly: bool,
    pub cannot_determine: bool,
    pub explanation: String,
    pub threshold_ms: f64,
    pub baseline_source: String,
    pub fallback_level: u8,
}

/// `service -> sorted endpoint/span names`, with no bucket detail, as
/// produced by `ListAvailable` (SPEC_FULL.md §4.10).
#[derive(Debug, Clone, Default, Serialize)]
pub struct AvailableServicesResponse {
    pub trace_endpoints: HashMap<String, Vec<String>>,
    pub span_names: HashMap<String, Vec<String>>,
}

/// Supplemental trace-introspection types (SPEC_FULL.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSummary {
    pub trace_id: String,
    pub root_service_name: String,
    pub root_endpoint: String,
    pub start_nano: i64,
    pub duration_ms: i64,
    pub span_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    pub span_id: String,
    pub parent_span_id: String,
    pub trace_id: String,
    pub service_name: String,
    pub name: String,
    pub start_nano: i64,
    pub end_nano: i64,
}

impl Span {
    pub fn duration_nano(&self) -> i64 {
        self.end_nano - self.start_nano
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChildSpanAnomaly {
    pub span: Span,
    pub check: AnomalyCheckResponse,
}
