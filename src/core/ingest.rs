//! Ingest (C4): dedup -> bucket -> append-and-trim -> mark baseline dirty,
//! for both trace-level and span-level events.

use crate::core::bucket::bucket_for_nanos;
use crate::core::error::CoreResult;
use crate::core::keys::{baseline_key, duration_key, span_baseline_key, span_duration_key};
use crate::core::model::{SpanEvent, TraceEvent};
use crate::core::store::Store;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct IngestConfig {
    pub dedup_ttl: Duration,
    pub window_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Ingested,
    NotIngested,
}

pub struct Ingest {
    store: Arc<dyn Store>,
    timezone: String,
    config: IngestConfig,
}

impl Ingest {
    pub fn new(store: Arc<dyn Store>, timezone: String, config: IngestConfig) -> Self {
        Ingest {
            store,
            timezone,
            config,
        }
    }

    /// Trace-level ingest (spec.md §4.4).
    pub async fn ingest_trace(&self, event: &TraceEvent) -> CoreResult<IngestOutcome> {
        if self
            .store
            .is_duplicate_or_mark(&event.trace_id, self.config.dedup_ttl)
            .await?
        {
            debug!(trace_id = %event.trace_id, "duplicate trace, not ingested");
            metrics::counter!("ingest_total", "outcome" => "duplicate").increment(1);
            return Ok(IngestOutcome::NotIngested);
        }

        let bucket = bucket_for_nanos(event.start_nano, &self.timezone)?;
        let dur_key = duration_key(&event.service, &event.endpoint, bucket);
        let base_key = baseline_key(&event.service, &event.endpoint, bucket);

        self.store
            .append_duration(&dur_key, event.duration_ms, self.config.window_size)
            .await?;
        self.store.mark_dirty(&base_key).await?;

        metrics::counter!("ingest_total", "outcome" => "ingested").increment(1);
        Ok(IngestOutcome::Ingested)
    }

    /// Span-level ingest. No dedup; spans with empty identifiers,
    /// unparseable timestamps, or non-positive duration are skipped rather
    /// than erroring the whole batch (spec.md §4.4 span variant).
    pub async fn ingest_spans(&self, spans: &[SpanEvent]) -> CoreResult<usize> {
        let mut ingested = 0;
        for span in spans {
            if span.service_name.is_empty() || span.name.is_empty() {
                continue;
            }
            let duration_ms = (span.end_nano - span.start_nano) / 1_000_000;
            if duration_ms <= 0 {
                continue;
            }
            let bucket = match bucket_for_nanos(span.start_nano, &self.timezone) {
                Ok(b) => b,
                Err(err) => {
                    warn!(service = %span.service_name, name = %span.name, %err, "unparseable span timestamp, skipping");
                    continue;
                }
            };

            let dur_key = span_duration_key(&span.service_name, &span.name, bucket);
            let base_key = span_baseline_key(&span.service_name, &span.name, bucket);

            self.store
                .append_duration(&dur_key, duration_ms, self.config.window_size)
                .await?;
            self.store.mark_dirty(&base_key).await?;
            metrics::counter!("span_ingest_total", "outcome" => "ingested").increment(1);
            ingested += 1;
        }
        Ok(ingested)
    }
}
