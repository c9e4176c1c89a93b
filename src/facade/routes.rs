//! HTTP facade (C9): axum router translating JSON requests to core calls
//! (SPEC_FULL.md §6). Request validation and error-to-status mapping live
//! here, not in the core.

use crate::core::keys::baseline_key;
use crate::core::model::{AnomalyCheckRequest, DayType, SpanAnomalyCheckRequest, TimeBucket};
use crate::facade::error::ApiError;
use crate::facade::request_id;
use crate::facade::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/check", post(check))
        .route("/v1/spans/check", post(span_check))
        .route("/v1/baseline", get(get_baseline))
        .route("/v1/available", get(list_available))
        .route("/v1/traces/:id", get(get_trace))
        .route("/v1/traces/:id/longest-span", get(longest_span))
        .route("/v1/traces/:id/child-spans", get(child_spans))
        .route("/v1/traces/:id/child-span-anomalies", get(child_span_anomalies))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .layer(middleware::from_fn(request_id::middleware))
        .with_state(state)
}

async fn check(
    State(state): State<AppState>,
    Json(req): Json<AnomalyCheckRequest>,
) -> Result<Json<crate::core::model::AnomalyCheckResponse>, ApiError> {
    Ok(Json(state.evaluator.check(&req).await?))
}

async fn span_check(
    State(state): State<AppState>,
    Json(req): Json<SpanAnomalyCheckRequest>,
) -> Result<Json<crate::core::model::AnomalyCheckResponse>, ApiError> {
    Ok(Json(state.evaluator.span_check(&req).await?))
}

#[derive(Deserialize)]
struct BaselineQuery {
    service: String,
    endpoint: String,
    hour: u8,
    #[serde(rename = "dayType")]
    day_type: String,
}

async fn get_baseline(
    State(state): State<AppState>,
    Query(q): Query<BaselineQuery>,
) -> Result<Json<crate::core::model::Baseline>, ApiError> {
    let day_type = DayType::parse(&q.day_type)
        .ok_or_else(|| crate::core::error::CoreError::InvalidInput(format!("unknown dayType: {}", q.day_type)))?;
    if q.hour > 23 {
        return Err(crate::core::error::CoreError::InvalidInput(format!("hour out of range: {}", q.hour)).into());
    }
    let bucket = TimeBucket {
        hour: q.hour,
        day_type,
    };
    let key = baseline_key(&q.service, &q.endpoint, bucket);
    match state.store.get_baseline(&key).await? {
        Some(baseline) => Ok(Json(baseline)),
        None => Err(crate::core::error::CoreError::NotFound(key).into()),
    }
}

async fn list_available(
    State(state): State<AppState>,
) -> Result<Json<crate::core::model::AvailableServicesResponse>, ApiError> {
    Ok(Json(state.list_available.list().await?))
}

async fn get_trace(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<crate::core::model::TraceSummary>, ApiError> {
    Ok(Json(state.introspection.get_trace(&id).await?))
}

async fn longest_span(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<crate::core::model::Span>, ApiError> {
    Ok(Json(state.introspection.longest_span(&id).await?))
}

#[derive(Deserialize)]
struct ParentQuery {
    parent: String,
}

async fn child_spans(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<ParentQuery>,
) -> Result<Json<Vec<crate::core::model::Span>>, ApiError> {
    Ok(Json(state.introspection.child_spans(&id, &q.parent).await?))
}

async fn child_span_anomalies(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<ParentQuery>,
) -> Result<Json<Vec<crate::core::model::ChildSpanAnomaly>>, ApiError> {
    Ok(Json(
        state.introspection.child_span_anomalies(&id, &q.parent).await?,
    ))
}

async fn healthz(State(state): State<AppState>) -> StatusCode {
    match state.store.ping().await {
        Ok(()) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Prometheus exposition for ingest/recompute/anomaly counters (SPEC_FULL.md
/// §6/§9 C13).
async fn metrics(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}
