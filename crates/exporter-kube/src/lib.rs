//! # exporter-kube
//!
//! Kubernetes collaborators for the AMD exporter.
//!
//! - [`KubeletClient`] reports which pods hold AMD devices through the kubelet PodResources
//!   API served on a local unix socket.
//! - [`ApiServerClient`] resolves allow-listed pod labels through the Kubernetes API server.

pub mod apiserver;
pub mod config;
pub mod kubelet;

// Generated protobuf code
pub mod podresources {
    pub mod v1 {
        tonic::include_proto!("v1");
    }
}

pub use apiserver::ApiServerClient;
pub use config::{ApiServerConfig, KubeletConfig};
pub use kubelet::KubeletClient;

/// Errors raised by the Kubernetes clients
#[derive(Debug, thiserror::Error)]
pub enum KubeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("gRPC error: {0}")]
    Grpc(#[from] tonic::Status),

    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API server returned {status}: {message}")]
    ApiServer { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, KubeError>;

impl KubeError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KubeError::ApiServer {
            status: 403,
            message: "pods is forbidden".to_string(),
        };
        assert_eq!(err.to_string(), "API server returned 403: pods is forbidden");

        let err = KubeError::config("missing KUBERNETES_SERVICE_HOST");
        assert_eq!(err.to_string(), "Configuration error: missing KUBERNETES_SERVICE_HOST");
    }

    #[test]
    fn test_status_conversion() {
        let err: KubeError = tonic::Status::unavailable("kubelet restarting").into();
        assert!(matches!(err, KubeError::Grpc(_)));
    }
}
