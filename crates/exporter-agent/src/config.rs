//! Exporter configuration
//!
//! Sources in increasing precedence: built-in defaults, an optional YAML file, then
//! `AMD_EXPORTER_*` environment variables. Command-line flags are applied by the binary on
//! top of the loaded value.

use crate::{AgentError, Result};
use exporter_gpu::GpuConfig;
use exporter_kube::config::DEFAULT_KUBELET_SOCKET;
use exporter_kube::KubeletConfig;
use exporter_metrics::endpoint::DEFAULT_SCRAPE_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Prefix of every configuration environment variable
pub const ENV_PREFIX: &str = "AMD_EXPORTER";

/// Names the configuration file
pub const CONFIG_ENV_VAR: &str = "AMD_EXPORTER_CONFIG";

pub const NODE_NAME_ENV_VAR: &str = "AMD_EXPORTER_NODE_NAME";
pub const POD_NAME_ENV_VAR: &str = "AMD_EXPORTER_POD_NAME";
pub const POD_NAMESPACE_ENV_VAR: &str = "AMD_EXPORTER_NAMESPACE";

pub const DEFAULT_PORT: u16 = 2021;

/// Keys holding comma-separated lists in the environment
const LIST_KEYS: [&str; 2] = ["resource_names", "pod_labels"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// `development`, `production` or a tracing level
    pub log_level: String,

    /// `json` or `text`
    pub log_format: String,

    pub web_server_port: u16,

    pub kubelet_socket_path: PathBuf,

    /// Device resource names tracked besides `amd.com/gpu`
    pub resource_names: Vec<String>,

    /// Attach workloads to accelerator samples
    pub with_kubernetes: bool,

    pub node_name: String,

    pub pod_name: String,

    pub pod_namespace: String,

    /// Workload labels copied onto accelerator samples
    pub pod_labels: Vec<String>,

    pub label_prefix: String,

    pub scrape_timeout_seconds: u64,

    pub sysfs_root: PathBuf,

    pub rocm_smi_path: PathBuf,

    /// API server address when not derivable from the in-cluster environment
    pub kube_api_url: Option<String>,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        let gpu = GpuConfig::default();
        Self {
            log_level: "development".to_string(),
            log_format: "json".to_string(),
            web_server_port: DEFAULT_PORT,
            kubelet_socket_path: PathBuf::from(DEFAULT_KUBELET_SOCKET),
            resource_names: Vec::new(),
            with_kubernetes: true,
            node_name: String::new(),
            pod_name: String::new(),
            pod_namespace: String::new(),
            pod_labels: Vec::new(),
            label_prefix: exporter_core::DEFAULT_LABEL_PREFIX.to_string(),
            scrape_timeout_seconds: DEFAULT_SCRAPE_TIMEOUT.as_secs(),
            sysfs_root: gpu.sysfs_root,
            rocm_smi_path: gpu.rocm_smi_path,
            kube_api_url: None,
        }
    }
}

impl ExporterConfig {
    /// Load from `path`, or the file named by `AMD_EXPORTER_CONFIG`, and the process
    /// environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));

        Self::load_from(path.as_deref(), None)
    }

    /// Load with an explicit environment instead of the process one
    pub fn load_from(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            info!("Loading configuration from: {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }

        // The namespace variable does not follow the key naming
        let namespace = match &env {
            Some(vars) => vars.get(POD_NAMESPACE_ENV_VAR).cloned(),
            None => std::env::var(POD_NAMESPACE_ENV_VAR).ok(),
        };

        let mut environment = config::Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .list_separator(",")
            .source(env);
        for key in LIST_KEYS {
            environment = environment.with_list_parse_key(key);
        }
        builder = builder.add_source(environment);
        builder = builder.set_override_option("pod_namespace", namespace)?;

        let parsed: Self = builder.build()?.try_deserialize()?;
        parsed.validate()?;

        Ok(parsed)
    }

    pub fn validate(&self) -> Result<()> {
        if self.web_server_port == 0 {
            return Err(AgentError::config("Web server port must be greater than 0"));
        }

        if self.scrape_timeout_seconds == 0 {
            return Err(AgentError::config("Scrape timeout must be greater than 0"));
        }

        match self.log_format.as_str() {
            "text" | "json" => {}
            _ => return Err(AgentError::config(format!("Invalid log format: {}", self.log_format))),
        }

        match self.log_level.to_lowercase().as_str() {
            "development" | "production" | "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(AgentError::config(format!("Invalid log level: {}", self.log_level))),
        }

        Ok(())
    }

    /// Address the HTTP endpoint listens on
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), self.web_server_port)
    }

    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_secs(self.scrape_timeout_seconds)
    }

    /// Lower-cased label allow-list with blanks dropped
    pub fn allow_list(&self) -> Vec<String> {
        self.pod_labels
            .iter()
            .map(|label| label.trim().to_lowercase())
            .filter(|label| !label.is_empty())
            .collect()
    }

    pub fn gpu_config(&self) -> GpuConfig {
        GpuConfig::new(&self.sysfs_root, &self.rocm_smi_path)
    }

    pub fn kubelet_config(&self) -> KubeletConfig {
        KubeletConfig::new(&self.kubelet_socket_path)
            .with_resource_names(self.resource_names.clone())
            .with_node_name(self.node_name.clone())
    }

    /// Log the pod identity values that are not set, with where they should come from
    pub fn log_missing_identity(&self) {
        let identity = [
            (&self.node_name, "node name", NODE_NAME_ENV_VAR, "spec.nodeName"),
            (&self.pod_name, "exporter pod name", POD_NAME_ENV_VAR, "metadata.name"),
            (&self.pod_namespace, "exporter pod namespace", POD_NAMESPACE_ENV_VAR, "metadata.namespace"),
        ];

        for (value, what, env_var, field_path) in identity {
            if value.is_empty() {
                info!(
                    envvar = env_var,
                    hint = format!("env.valueFrom.fieldRef.fieldPath: {}", field_path),
                    "{} is not set",
                    what
                );
            }
        }
    }
}
