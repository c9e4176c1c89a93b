//! Trace introspection (SPEC_FULL.md §4.9), grounded in
//! `original_source/internal/api/handlers/trace_lookup.go`,
//! `trace_longest_span.go`, `trace_child_spans.go`, and
//! `trace_child_span_anomalies.go`. Read-only; makes no store writes.

use crate::core::error::{CoreError, CoreResult};
use crate::core::evaluator::Evaluator;
use crate::core::model::{ChildSpanAnomaly, Span, SpanAnomalyCheckRequest, TraceSummary};
use crate::core::trace_source::TraceSource;
use std::sync::Arc;

pub struct TraceIntrospection {
    trace_source: Arc<dyn TraceSource>,
    evaluator: Arc<Evaluator>,
}

impl TraceIntrospection {
    pub fn new(trace_source: Arc<dyn TraceSource>, evaluator: Arc<Evaluator>) -> Self {
        TraceIntrospection {
            trace_source,
            evaluator,
        }
    }

    pub async fn get_trace(&self, trace_id: &str) -> CoreResult<TraceSummary> {
        self.trace_source.get_trace(trace_id).await
    }

    /// The span with the largest `end_nano - start_nano`; ties broken by
    /// first occurrence in source order.
    pub async fn longest_span(&self, trace_id: &str) -> CoreResult<Span> {
        let spans = self.trace_source.get_spans(trace_id).await?;
        spans
            .into_iter()
            .fold(None::<Span>, |best, span| match &best {
                Some(b) if b.duration_nano() >= span.duration_nano() => best,
                _ => Some(span),
            })
            .ok_or_else(|| CoreError::NotFound(format!("no spans for trace {trace_id}")))
    }

    /// Direct children of `parent_span_id`: unordered, stable by source
    /// order.
    pub async fn child_spans(&self, trace_id: &str, parent_span_id: &str) -> CoreResult<Vec<Span>> {
        let spans = self.trace_source.get_spans(trace_id).await?;
        Ok(spans
            .into_iter()
            .filter(|s| s.parent_span_id == parent_span_id)
            .collect())
    }

    pub async fn child_span_anomalies(
        &self,
        trace_id: &str,
        parent_span_id: &str,
    ) -> CoreResult<Vec<ChildSpanAnomaly>> {
        let children = self.child_spans(trace_id, parent_span_id).await?;
        let mut out = Vec::with_capacity(children.len());
        for span in children {
            let req = SpanAnomalyCheckRequest {
                service_name: span.service_name.clone(),
                span_name: span.name.clone(),
                start_nano: span.start_nano,
                duration_ms: span.duration_nano() / 1_000_000,
            };
            let check = self.evaluator.span_check(&req).await?;
            out.push(ChildSpanAnomaly { span, check });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(id: &str, parent: &str, start: i64, end: i64) -> Span {
        Span {
            span_id: id.to_string(),
            parent_span_id: parent.to_string(),
            trace_id: "t1".to_string(),
            service_name: "api".to_string(),
            name: "handler".to_string(),
            start_nano: start,
            end_nano: end,
        }
    }

    #[test]
    fn duration_nano_is_end_minus_start() {
        assert_eq!(span("s1", "", 100, 300).duration_nano(), 200);
    }

    #[test]
    fn longest_span_selection_prefers_first_on_tie() {
        let spans = vec![span("s1", "", 0, 100), span("s2", "", 0, 100), span("s3", "", 0, 50)];
        let best = spans
            .into_iter()
            .fold(None::<Span>, |best, s| match &best {
                Some(b) if b.duration_nano() >= s.duration_nano() => best,
                _ => Some(s),
            })
            .unwrap();
        assert_eq!(best.span_id, "s1");
    }
}
