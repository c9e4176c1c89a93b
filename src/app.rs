//! App/Lifecycle (C12): wires C1-C11 from [`Config`] and drives the three
//! structured-concurrency tasks (HTTP server, trace poller, recompute
//! worker) under one cancellation token, with a bounded graceful-shutdown
//! drain. Grounded in `original_source/internal/app/{app,lifecycle}.go`'s
//! wiring shape.

use crate::config::Config;
use crate::core::evaluator::Evaluator;
use crate::core::ingest::{Ingest, IngestConfig};
use crate::core::introspection::TraceIntrospection;
use crate::core::list_available::ListAvailable;
use crate::core::lookup::{BaselineLookup, SpanBaselineLookup};
use crate::core::poller::{RecomputeWorker, TracePoller};
use crate::core::recompute::{Recomputer, DEFAULT_BATCH_SIZE};
use crate::core::store::redis_store::RedisStore;
use crate::core::store::Store;
use crate::core::trace_source::{HttpTraceSource, TraceSource};
use crate::facade::{self, AppState};
use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Time budget for draining in-flight work after a shutdown signal
/// (spec.md §5).
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct App {
    state: AppState,
    poller: Arc<TracePoller>,
    recompute_worker: Arc<RecomputeWorker>,
    http_port: u16,
    http_timeout: Duration,
}

impl App {
    pub async fn new(config: Config) -> anyhow::Result<App> {
        let store: Arc<dyn Store> = Arc::new(
            RedisStore::connect(&(&config.redis).into())
                .await
                .context("connecting to redis store")?,
        );

        let ingest = Arc::new(Ingest::new(
            store.clone(),
            config.timezone.clone(),
            IngestConfig {
                dedup_ttl: config.dedup.ttl,
                window_size: config.window_size,
            },
        ));
        let recomputer = Arc::new(Recomputer::new(store.clone()));

        let lookup = Arc::new(BaselineLookup::new(
            store.clone(),
            config.fallback.clone(),
            config.stats.min_samples,
        ));
        let span_lookup = Arc::new(SpanBaselineLookup::new(
            store.clone(),
            config.fallback.clone(),
            config.stats.min_samples,
        ));
        let evaluator = Arc::new(Evaluator::new(
            lookup.clone(),
            span_lookup.clone(),
            config.stats.clone(),
            config.timezone.clone(),
        ));
        let list_available = Arc::new(ListAvailable::new(store.clone()));

        let trace_source: Arc<dyn TraceSource> = Arc::new(
            HttpTraceSource::new(config.tempo.url.clone(), config.tempo.auth_token.clone())
                .context("building trace-source client")?,
        );
        let introspection = Arc::new(TraceIntrospection::new(trace_source.clone(), evaluator.clone()));

        let metrics_handle = PrometheusBuilder::new()
            .install_recorder()
            .context("installing prometheus recorder")?;

        let state = AppState {
            store: store.clone(),
            lookup,
            span_lookup,
            evaluator,
            list_available,
            introspection,
            metrics_handle,
        };

        let poller = Arc::new(TracePoller::new(trace_source, ingest, config.polling.clone()));
        let recompute_worker = Arc::new(RecomputeWorker::new(
            recomputer,
            config.polling.baseline_interval,
            DEFAULT_BATCH_SIZE,
        ));

        Ok(App {
            state,
            poller,
            recompute_worker,
            http_port: config.http.port,
            http_timeout: config.http.timeout,
        })
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let cancel = CancellationToken::new();

        let router = facade::router(self.state.clone())
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(self.http_timeout));
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", self.http_port))
            .await
            .with_context(|| format!("binding http port {}", self.http_port))?;
        info!(port = self.http_port, "http server listening");

        let server_cancel = cancel.clone();
        let server_task = tokio::spawn(async move {
            let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
                server_cancel.cancelled().await;
            });
            if let Err(err) = serve.await {
                error!(%err, "http server error");
            }
        });

        let poller = self.poller.clone();
        let poller_cancel = cancel.clone();
        let poller_task = tokio::spawn(async move {
            poller.run(poller_cancel).await;
        });

        let worker = self.recompute_worker.clone();
        let worker_cancel = cancel.clone();
        let worker_task = tokio::spawn(async move {
            worker.run(worker_cancel).await;
        });

        shutdown_signal().await;
        info!("shutdown signal received, draining");
        cancel.cancel();

        let drain = tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, async {
            let _ = tokio::join!(server_task, poller_task, worker_task);
        });
        if drain.await.is_err() {
            warn!("graceful shutdown timed out after {:?}", SHUTDOWN_DRAIN_TIMEOUT);
        }

        self.state.store.close();
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl_c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
