//! # exporter-metrics
//!
//! Turns hardware snapshots into Prometheus samples.
//!
//! This crate provides:
//! - The fixed metric catalog and its emission order
//! - The emission engine that labels samples and fans them out over workloads
//! - The collector that runs one correlate, scan, emit pass per scrape
//! - Text exposition and the `/metrics` HTTP endpoint

pub mod catalog;
pub mod collector;
pub mod emission;
pub mod endpoint;
pub mod observation;
pub mod render;

pub use catalog::{MetricCatalog, MetricDefinition, MetricKind, MetricSource};
pub use collector::AmdCollector;
pub use emission::EmissionEngine;
pub use endpoint::MetricsEndpoint;
pub use observation::Observation;
pub use render::{encode_families, encode_text, text_content_type, to_metric_families};

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MetricsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MetricsError::Export("buffer closed".to_string());
        assert_eq!(err.to_string(), "Export error: buffer closed");

        let err: MetricsError = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken").into();
        assert!(matches!(err, MetricsError::Io(_)));
    }
}
