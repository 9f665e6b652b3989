//! Kubernetes client configuration

use exporter_core::AMD_RESOURCE_NAME;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default kubelet PodResources socket
pub const DEFAULT_KUBELET_SOCKET: &str = "/var/lib/kubelet/pod-resources/kubelet.sock";

/// Mounted service-account token
pub const SERVICE_ACCOUNT_TOKEN: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Mounted cluster CA bundle
pub const SERVICE_ACCOUNT_CA: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

/// Kubelet PodResources client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubeletConfig {
    /// Unix socket the kubelet serves the PodResources API on
    pub socket_path: PathBuf,

    /// Resource names counted as AMD devices in addition to `amd.com/gpu`
    pub resource_names: Vec<String>,

    /// Node recorded on every discovered workload
    pub node_name: String,
}

impl KubeletConfig {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            resource_names: Vec::new(),
            node_name: String::new(),
        }
    }

    pub fn with_resource_names(mut self, resource_names: Vec<String>) -> Self {
        self.resource_names = resource_names;
        self
    }

    pub fn with_node_name(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = node_name.into();
        self
    }

    /// Whether devices of `resource_name` belong to the exporter
    pub fn is_tracked_resource(&self, resource_name: &str) -> bool {
        resource_name == AMD_RESOURCE_NAME || self.resource_names.iter().any(|name| name == resource_name)
    }
}

impl Default for KubeletConfig {
    fn default() -> Self {
        Self::new(DEFAULT_KUBELET_SOCKET)
    }
}

/// Kubernetes API server client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiServerConfig {
    /// Base URL, e.g. `https://10.96.0.1:443`
    pub url: String,

    /// Bearer token file, re-read on every request so rotated tokens are picked up
    pub token_path: Option<PathBuf>,

    /// PEM bundle trusted for the API server certificate
    pub ca_path: Option<PathBuf>,

    /// Per-request timeout
    pub request_timeout: Duration,
}

impl ApiServerConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token_path: None,
            ca_path: None,
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Settings for a pod running inside the cluster.
    ///
    /// `url` overrides the address derived from `KUBERNETES_SERVICE_HOST` and
    /// `KUBERNETES_SERVICE_PORT`. Service-account files are used when mounted.
    pub fn in_cluster(url: Option<String>) -> Option<Self> {
        let url = url.filter(|url| !url.is_empty()).or_else(|| {
            let host = std::env::var("KUBERNETES_SERVICE_HOST").ok()?;
            let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());
            Some(service_url(&host, &port))
        })?;

        let mounted = |path: &str| {
            let path = PathBuf::from(path);
            path.exists().then_some(path)
        };

        Some(Self {
            url,
            token_path: mounted(SERVICE_ACCOUNT_TOKEN),
            ca_path: mounted(SERVICE_ACCOUNT_CA),
            request_timeout: Duration::from_secs(10),
        })
    }

    pub fn with_token_path(mut self, token_path: impl Into<PathBuf>) -> Self {
        self.token_path = Some(token_path.into());
        self
    }

    pub fn with_ca_path(mut self, ca_path: impl Into<PathBuf>) -> Self {
        self.ca_path = Some(ca_path.into());
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

fn service_url(host: &str, port: &str) -> String {
    // IPv6 service addresses need brackets
    if host.contains(':') {
        format!("https://[{host}]:{port}")
    } else {
        format!("https://{host}:{port}")
    }
}
