//! # exporter-agent
//!
//! Node daemon (amd-exporterd) for the AMD telemetry exporter.
//!
//! This crate loads the exporter configuration, installs logging, wires the device registry,
//! the sysfs scanner and the Kubernetes collaborators into a collector, and serves it over
//! HTTP until the process is asked to stop.

pub mod app;
pub mod config;
pub mod logging;

pub use app::{wait_for_termination, Exporter};
pub use config::ExporterConfig;
pub use logging::init_logging;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] ::config::ConfigError),

    #[error("GPU error: {0}")]
    Gpu(#[from] exporter_gpu::GpuError),

    #[error("Kubernetes error: {0}")]
    Kube(#[from] exporter_kube::KubeError),

    #[error("Core error: {0}")]
    Core(#[from] exporter_core::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] exporter_metrics::MetricsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl AgentError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversions() {
        let err: AgentError = exporter_gpu::GpuError::ToolUnavailable("rocm-smi".to_string()).into();
        assert!(matches!(err, AgentError::Gpu(_)));

        let err: AgentError = exporter_kube::KubeError::config("no socket").into();
        assert!(matches!(err, AgentError::Kube(_)));

        let err = AgentError::config("port must be greater than 0");
        assert_eq!(err.to_string(), "Configuration error: port must be greater than 0");
    }
}
