//! Poller/Scheduler (C8): the trace poller and the recompute worker. Both
//! run one immediate execution at startup, then an interval loop, cancelled
//! by a shared `CancellationToken` (spec.md §4.8, §5). Task-loop shape is
//! grounded in the teacher's `route_quality::prober` multi-timer
//! `tokio::select!` loop.

use crate::core::config::PollingConfig;
use crate::core::ingest::{Ingest, IngestOutcome};
use crate::core::model::{SpanEvent, Span, TraceEvent, TraceSummary};
use crate::core::recompute::Recomputer;
use crate::core::trace_source::TraceSource;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Trace summaries at or above this count signal the query is near its
/// 500-result cap; lookback or limit should be tuned (spec.md §4.8A.3).
const NEAR_CAP_WARNING_THRESHOLD: usize = 450;
const TEMPO_QUERY_LIMIT: usize = 500;
const BACKFILL_STEP_DELAY: Duration = Duration::from_secs(1);

fn event_from_summary(t: &TraceSummary) -> TraceEvent {
    TraceEvent {
        trace_id: t.trace_id.clone(),
        service: t.root_service_name.clone(),
        endpoint: t.root_endpoint.clone(),
        start_nano: t.start_nano,
        duration_ms: t.duration_ms,
    }
}

fn span_events(spans: Vec<Span>) -> Vec<SpanEvent> {
    spans
        .into_iter()
        .map(|s| SpanEvent {
            service_name: s.service_name,
            name: s.name,
            start_nano: s.start_nano,
            end_nano: s.end_nano,
        })
        .collect()
}

pub struct TracePoller {
    trace_source: Arc<dyn TraceSource>,
    ingest: Arc<Ingest>,
    polling: PollingConfig,
}

impl TracePoller {
    pub fn new(trace_source: Arc<dyn TraceSource>, ingest: Arc<Ingest>, polling: PollingConfig) -> Self {
        TracePoller {
            trace_source,
            ingest,
            polling,
        }
    }

    pub async fn run(&self, cancel: CancellationToken) {
        if self.polling.backfill_enabled {
            self.backfill(&cancel).await;
        }
        if cancel.is_cancelled() {
            return;
        }

        self.poll_once().await;

        let mut ticker = tokio::time::interval(self.polling.tempo_interval);
        ticker.tick().await; // first tick fires immediately; the poll above already covered it
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.poll_once().await,
            }
        }
    }

    async fn poll_once(&self) {
        let traces = match self
            .trace_source
            .query_traces(self.polling.tempo_lookback, TEMPO_QUERY_LIMIT)
            .await
        {
            Ok(traces) => traces,
            Err(err) => {
                warn!(%err, "tempo poll failed");
                return;
            }
        };

        if traces.len() >= NEAR_CAP_WARNING_THRESHOLD {
            warn!(
                count = traces.len(),
                "trace query result count near cap; consider tuning lookback or limit"
            );
        }

        for summary in &traces {
            let event = event_from_summary(summary);
            match self.ingest.ingest_trace(&event).await {
                Ok(IngestOutcome::Ingested) => {
                    if self.polling.span_tracking_enabled {
                        self.ingest_spans_for(&summary.trace_id).await;
                    }
                }
                Ok(IngestOutcome::NotIngested) => {}
                Err(err) => warn!(trace_id = %summary.trace_id, %err, "ingest failed"),
            }
        }
    }

    async fn ingest_spans_for(&self, trace_id: &str) {
        match self.trace_source.get_spans(trace_id).await {
            Ok(spans) => {
                if let Err(err) = self.ingest.ingest_spans(&span_events(spans)).await {
                    warn!(trace_id = %trace_id, %err, "span ingest failed");
                }
            }
            Err(err) => warn!(trace_id = %trace_id, %err, "span fetch failed"),
        }
    }

    /// Walks backfill windows from `now - BackfillDuration` to
    /// `now - TempoLookback`, oldest first, sleeping 1s between windows
    /// (spec.md §4.8's backfill mode).
    async fn backfill(&self, cancel: &CancellationToken) {
        let now_nanos = match chrono::Utc::now().timestamp_nanos_opt() {
            Some(n) => n,
            None => return,
        };
        let horizon_start = now_nanos - self.polling.backfill_duration.as_nanos() as i64;
        let horizon_end = now_nanos - self.polling.tempo_lookback.as_nanos() as i64;
        let batch_nanos = self.polling.backfill_batch.as_nanos().max(1) as i64;

        let mut window_start = horizon_start;
        while window_start < horizon_end {
            if cancel.is_cancelled() {
                return;
            }
            let window_end = (window_start + batch_nanos).min(horizon_end);
            let query_lookback = Duration::from_nanos((now_nanos - window_start).max(0) as u64);

            match self
                .trace_source
                .query_traces(query_lookback, TEMPO_QUERY_LIMIT)
                .await
            {
                Ok(traces) => {
                    for summary in traces
                        .iter()
                        .filter(|t| t.start_nano >= window_start && t.start_nano < window_end)
                    {
                        let event = event_from_summary(summary);
                        if let Err(err) = self.ingest.ingest_trace(&event).await {
                            warn!(trace_id = %summary.trace_id, %err, "backfill ingest failed");
                        }
                    }
                }
                Err(err) => warn!(%err, "backfill window query failed"),
            }

            window_start = window_end;

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(BACKFILL_STEP_DELAY) => {}
            }
        }
    }
}

pub struct RecomputeWorker {
    recomputer: Arc<Recomputer>,
    interval: Duration,
    batch_size: usize,
}

impl RecomputeWorker {
    pub fn new(recomputer: Arc<Recomputer>, interval: Duration, batch_size: usize) -> Self {
        RecomputeWorker {
            recomputer,
            interval,
            batch_size,
        }
    }

    pub async fn run(&self, cancel: CancellationToken) {
        self.recomputer.tick(self.batch_size).await;

        let mut ticker = tokio::time::interval(self.interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.recomputer.tick(self.batch_size).await;
                }
            }
        }
    }
}
