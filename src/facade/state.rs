//! Shared application state handed to every axum handler.

use crate::core::evaluator::Evaluator;
use crate::core::introspection::TraceIntrospection;
use crate::core::list_available::ListAvailable;
use crate::core::lookup::{BaselineLookup, SpanBaselineLookup};
use crate::core::store::Store;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub lookup: Arc<BaselineLookup>,
    pub span_lookup: Arc<SpanBaselineLookup>,
    pub evaluator: Arc<Evaluator>,
    pub list_available: Arc<ListAvailable>,
    pub introspection: Arc<TraceIntrospection>,
    /// Renders the process's Prometheus exposition text for `/metrics`
    /// (SPEC_FULL.md §6/§9 C13).
    pub metrics_handle: PrometheusHandle,
}
