//! HTTP endpoint serving scrapes and health checks

use crate::render::{encode_families, text_content_type, to_metric_families};
use crate::{AmdCollector, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use exporter_core::PassContext;
use prometheus::core::Collector;
use prometheus::proto::MetricFamily;
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Default scrape deadline
pub const DEFAULT_SCRAPE_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP endpoint running one collection pass per `/metrics` request
#[derive(Clone)]
pub struct MetricsEndpoint {
    collector: Arc<AmdCollector>,
    scrape_timeout: Duration,
    process: Option<Arc<dyn Collector>>,
}

impl MetricsEndpoint {
    pub fn new(collector: Arc<AmdCollector>) -> Self {
        Self {
            collector,
            scrape_timeout: DEFAULT_SCRAPE_TIMEOUT,
            process: None,
        }
    }

    /// Deadline given to each scrape's pass
    pub fn with_scrape_timeout(mut self, scrape_timeout: Duration) -> Self {
        self.scrape_timeout = scrape_timeout;
        self
    }

    pub fn scrape_timeout(&self) -> Duration {
        self.scrape_timeout
    }

    /// Append the exporter's own `process_*` metrics after the AMD families. Linux only;
    /// elsewhere this is a no-op.
    pub fn with_process_metrics(mut self) -> Self {
        #[cfg(target_os = "linux")]
        {
            self.process = Some(Arc::new(prometheus::process_collector::ProcessCollector::for_self()));
        }
        self
    }

    pub fn process_metrics_enabled(&self) -> bool {
        self.process.is_some()
    }

    fn process_families(&self) -> Vec<MetricFamily> {
        self.process
            .as_ref()
            .map(|process| process.collect())
            .unwrap_or_default()
    }

    /// Build the router
    pub fn router(&self) -> Router {
        create_app(self.clone())
    }

    /// Bind the listener the endpoint will serve on
    pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
        Ok(TcpListener::bind(addr).await?)
    }

    /// Serve until `shutdown` resolves, then drain in-flight scrapes
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        info!("Starting metrics endpoint server on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Metrics endpoint server stopped");
        Ok(())
    }
}

fn create_app(endpoint: MetricsEndpoint) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(endpoint)
}

async fn metrics_handler(State(endpoint): State<MetricsEndpoint>) -> Response {
    let ctx = PassContext::with_timeout(endpoint.scrape_timeout);
    let observations = endpoint.collector.collect(&ctx).await;

    let mut families = to_metric_families(&observations);
    families.extend(endpoint.process_families());

    match encode_families(&families) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, text_content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(pass = %ctx.id(), "Failed to render metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render metrics").into_response()
        }
    }
}

async fn health_handler() -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
        .into_response()
}
