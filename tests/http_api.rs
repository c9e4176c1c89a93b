//! End-to-end HTTP facade tests, driving the full axum router the way the
//! teacher's own `tower::ServiceExt::oneshot` middleware tests do, but
//! against an in-memory `Store` instead of a live Redis/Tempo pair.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use tempo_latency_guard::core::config::{FallbackConfig, StatsConfig};
use tempo_latency_guard::core::evaluator::Evaluator;
use tempo_latency_guard::core::introspection::TraceIntrospection;
use tempo_latency_guard::core::list_available::ListAvailable;
use tempo_latency_guard::core::lookup::{BaselineLookup, SpanBaselineLookup};
use tempo_latency_guard::core::model::{Baseline, Span, TraceSummary};
use tempo_latency_guard::core::store::memory::MemoryStore;
use tempo_latency_guard::core::store::Store;
use tempo_latency_guard::core::trace_source::TraceSource;
use tempo_latency_guard::facade::{router, AppState};
use tower::ServiceExt;

/// A `TraceSource` stub so `AppState` can be built without a live Tempo
/// endpoint; the HTTP-API tests below never exercise the poller/introspection
/// paths that would call it.
struct StubTraceSource;

#[async_trait::async_trait]
impl TraceSource for StubTraceSource {
    async fn query_traces(
        &self,
        _lookback: std::time::Duration,
        _limit: usize,
    ) -> tempo_latency_guard::core::error::CoreResult<Vec<TraceSummary>> {
        Ok(Vec::new())
    }

    async fn get_trace(
        &self,
        trace_id: &str,
    ) -> tempo_latency_guard::core::error::CoreResult<TraceSummary> {
        Err(tempo_latency_guard::core::error::CoreError::NotFound(format!(
            "trace {trace_id}"
        )))
    }

    async fn get_spans(
        &self,
        _trace_id: &str,
    ) -> tempo_latency_guard::core::error::CoreResult<Vec<Span>> {
        Ok(Vec::new())
    }
}

/// `PrometheusBuilder::install_recorder` panics if a global recorder is
/// already installed, so every test in this binary shares one `OnceLock`.
fn metrics_handle() -> metrics_exporter_prometheus::PrometheusHandle {
    static HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();
    HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("install prometheus recorder")
        })
        .clone()
}

fn test_state(store: Arc<dyn Store>) -> AppState {
    let fallback = FallbackConfig::default();
    let stats = StatsConfig {
        factor: 1.5,
        k: 3,
        min_samples: 10,
    };
    let lookup = Arc::new(BaselineLookup::new(store.clone(), fallback.clone(), stats.min_samples));
    let span_lookup = Arc::new(SpanBaselineLookup::new(store.clone(), fallback, stats.min_samples));
    let evaluator = Arc::new(Evaluator::new(
        lookup.clone(),
        span_lookup.clone(),
        stats,
        "Asia/Taipei".to_string(),
    ));
    let trace_source: Arc<dyn TraceSource> = Arc::new(StubTraceSource);
    let introspection = Arc::new(TraceIntrospection::new(trace_source, evaluator.clone()));

    AppState {
        store: store.clone(),
        lookup,
        span_lookup,
        evaluator,
        list_available: Arc::new(ListAvailable::new(store)),
        introspection,
        metrics_handle: metrics_handle(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn check_endpoint_matches_spec_scenario_3() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    store
        .set_baseline(
            "base:api|GET /u|16|weekday",
            Baseline {
                p50: 100.0,
                p95: 200.0,
                mad: 20.0,
                sample_count: 100,
                updated_at: chrono::Utc::now(),
            },
        )
        .await
        .unwrap();

    let app = router(test_state(store));

    let request = Request::builder()
        .method("POST")
        .uri("/v1/check")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "service": "api",
                "endpoint": "GET /u",
                "start_nano": 1_704_700_800_000_000_000i64,
                "duration_ms": 250
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["is_anomaly"], json!(false));
    assert!(body["explanation"]
        .as_str()
        .unwrap()
        .contains("within threshold 300.00ms"));
}

#[tokio::test]
async fn check_endpoint_reports_exceeds_above_threshold() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    store
        .set_baseline(
            "base:api|GET /u|16|weekday",
            Baseline {
                p50: 100.0,
                p95: 200.0,
                mad: 20.0,
                sample_count: 100,
                updated_at: chrono::Utc::now(),
            },
        )
        .await
        .unwrap();

    let app = router(test_state(store));
    let request = Request::builder()
        .method("POST")
        .uri("/v1/check")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "service": "api",
                "endpoint": "GET /u",
                "start_nano": 1_704_700_800_000_000_000i64,
                "duration_ms": 350
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["is_anomaly"], json!(true));
    assert!(body["explanation"].as_str().unwrap().contains("exceeds"));
}

#[tokio::test]
async fn check_endpoint_insufficient_samples_with_fallback_disabled() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    store
        .set_baseline(
            "base:api|GET /u|16|weekday",
            Baseline {
                p50: 100.0,
                p95: 200.0,
                mad: 20.0,
                sample_count: 4,
                updated_at: chrono::Utc::now(),
            },
        )
        .await
        .unwrap();

    let mut state = test_state(store.clone());
    let fallback = FallbackConfig {
        nearby_hours_enabled: false,
        day_type_global_enabled: false,
        full_global_enabled: false,
        ..FallbackConfig::default()
    };
    let stats = StatsConfig {
        factor: 2.0,
        k: 10,
        min_samples: 10,
    };
    let lookup = Arc::new(BaselineLookup::new(store.clone(), fallback.clone(), stats.min_samples));
    let span_lookup = Arc::new(SpanBaselineLookup::new(store, fallback, stats.min_samples));
    state.evaluator = Arc::new(Evaluator::new(
        lookup.clone(),
        span_lookup,
        stats,
        "Asia/Taipei".to_string(),
    ));
    state.lookup = lookup;

    let app = router(state);
    let request = Request::builder()
        .method("POST")
        .uri("/v1/check")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "service": "api",
                "endpoint": "GET /u",
                "start_nano": 1_704_700_800_000_000_000i64,
                "duration_ms": 999
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["cannot_determine"], json!(true));
    assert_eq!(body["is_anomaly"], json!(false));
    assert_eq!(body["fallback_level"], json!(5));
}

#[tokio::test]
async fn baseline_endpoint_returns_404_when_absent() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let app = router(test_state(store));

    let request = Request::builder()
        .uri("/v1/baseline?service=api&endpoint=GET%20%2Fu&hour=16&dayType=weekday")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn healthz_reports_ok_for_a_reachable_store() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let app = router(test_state(store));

    let request = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn available_endpoint_lists_ingested_services() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    store
        .set_baseline(
            "base:api|GET /u|16|weekday",
            Baseline {
                p50: 10.0,
                p95: 20.0,
                mad: 1.0,
                sample_count: 5,
                updated_at: chrono::Utc::now(),
            },
        )
        .await
        .unwrap();

    let app = router(test_state(store));
    let request = Request::builder().uri("/v1/available").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["trace_endpoints"]["api"], json!(["GET /u"]));
}
