//! Trace-source client (C11): the outbound HTTP collaborator the poller and
//! the introspection endpoints use to reach the external trace store.
//! Deliberately thin per spec.md §1 ("the trace-store HTTP client's
//! transport details" are out of the core's scope); only the shape the
//! poller needs is specified here.

use crate::core::error::{CoreError, CoreResult};
use crate::core::model::{Span, TraceSummary};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

/// Every outbound trace-source call is bounded by this timeout,
/// independent of any caller-supplied deadline (spec.md §5).
const CLIENT_TIMEOUT: Duration = Duration::from_secs(15);

#[async_trait]
pub trait TraceSource: Send + Sync {
    async fn query_traces(&self, lookback: Duration, limit: usize) -> CoreResult<Vec<TraceSummary>>;
    async fn get_trace(&self, trace_id: &str) -> CoreResult<TraceSummary>;
    async fn get_spans(&self, trace_id: &str) -> CoreResult<Vec<Span>>;
}

pub struct HttpTraceSource {
    client: reqwest::Client,
    base_url: String,
    auth_token: String,
}

impl HttpTraceSource {
    pub fn new(base_url: String, auth_token: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(CLIENT_TIMEOUT).build()?;
        Ok(HttpTraceSource {
            client,
            base_url,
            auth_token,
        })
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.get(url);
        if self.auth_token.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.auth_token)
        }
    }
}

#[async_trait]
impl TraceSource for HttpTraceSource {
    async fn query_traces(&self, lookback: Duration, limit: usize) -> CoreResult<Vec<TraceSummary>> {
        let url = format!(
            "{}/api/search?lookback={}s&limit={}",
            self.base_url,
            lookback.as_secs(),
            limit
        );
        let resp = self
            .request(&url)
            .send()
            .await
            .map_err(CoreError::transient)?;
        if !resp.status().is_success() {
            return Err(CoreError::transient(anyhow::anyhow!(
                "trace source returned {}",
                resp.status()
            )));
        }
        resp.json::<Vec<TraceSummary>>().await.map_err(CoreError::transient)
    }

    async fn get_trace(&self, trace_id: &str) -> CoreResult<TraceSummary> {
        let url = format!("{}/api/traces/{trace_id}", self.base_url);
        let resp = self
            .request(&url)
            .send()
            .await
            .map_err(CoreError::transient)?;
        match resp.status() {
            StatusCode::NOT_FOUND => Err(CoreError::NotFound(format!("trace {trace_id}"))),
            status if status.is_success() => {
                resp.json::<TraceSummary>().await.map_err(CoreError::transient)
            }
            status => Err(CoreError::transient(anyhow::anyhow!(
                "trace source returned {status}"
            ))),
        }
    }

    async fn get_spans(&self, trace_id: &str) -> CoreResult<Vec<Span>> {
        let url = format!("{}/api/traces/{trace_id}/spans", self.base_url);
        let resp = self
            .request(&url)
            .send()
            .await
            .map_err(CoreError::transient)?;
        match resp.status() {
            StatusCode::NOT_FOUND => Err(CoreError::NotFound(format!("trace {trace_id}"))),
            status if status.is_success() => {
                resp.json::<Vec<Span>>().await.map_err(CoreError::transient)
            }
            status => Err(CoreError::transient(anyhow::anyhow!(
                "trace source returned {status}"
            ))),
        }
    }
}
