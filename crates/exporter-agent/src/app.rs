//! Exporter wiring and lifecycle

use crate::{AgentError, ExporterConfig, Result};
use exporter_core::{TelemetrySource, WorkloadCorrelator};
use exporter_gpu::{RocmSmi, SysfsScanner};
use exporter_kube::{ApiServerClient, ApiServerConfig, KubeletClient};
use exporter_metrics::{AmdCollector, MetricCatalog, MetricsEndpoint};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// A fully wired exporter, ready to serve
pub struct Exporter {
    config: ExporterConfig,
    endpoint: MetricsEndpoint,
}

impl Exporter {
    /// Connect collaborators and build the collector.
    ///
    /// Fails when the Kubernetes clients cannot be built or the device registry cannot be read.
    pub async fn build(config: ExporterConfig) -> Result<Self> {
        let correlator = if config.with_kubernetes {
            Some(build_correlator(&config).await?)
        } else {
            info!("Running without Kubernetes workload correlation");
            None
        };

        let gpu = config.gpu_config();
        info!("Reading GPU product information");
        let registry = RocmSmi::new(&gpu.rocm_smi_path).fetch_device_registry().await?;
        info!(cards = registry.populated(), "Device registry loaded");

        let telemetry: Arc<dyn TelemetrySource> = Arc::new(SysfsScanner::new(&gpu.sysfs_root));

        info!("Initializing the metrics collector");
        let mut collector = AmdCollector::new(Arc::new(MetricCatalog::build()), Arc::new(registry), telemetry)?
            .with_label_prefix(config.label_prefix.clone());
        if let Some(correlator) = correlator {
            collector = collector.with_correlator(correlator);
        }

        let endpoint = MetricsEndpoint::new(Arc::new(collector))
            .with_scrape_timeout(config.scrape_timeout())
            .with_process_metrics();

        Ok(Self { config, endpoint })
    }

    pub fn config(&self) -> &ExporterConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &MetricsEndpoint {
        &self.endpoint
    }

    /// Serve on the configured port until SIGINT or SIGTERM
    pub async fn run(self) -> Result<()> {
        let listener = MetricsEndpoint::bind(self.config.bind_addr()).await?;
        self.serve(listener, wait_for_termination()).await
    }

    /// Serve on `listener` until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.endpoint.serve(listener, shutdown).await?;
        info!("Exporter stopped");
        Ok(())
    }
}

async fn build_correlator(config: &ExporterConfig) -> Result<WorkloadCorrelator> {
    config.log_missing_identity();

    let kubelet_config = config.kubelet_config();
    info!("Connecting to kubelet at {}", kubelet_config.socket_path.display());
    let kubelet = KubeletClient::connect(kubelet_config).await?;

    let allow_list = config.allow_list();
    let mut correlator = WorkloadCorrelator::new(Arc::new(kubelet))
        .with_node_name(config.node_name.clone())
        .with_allow_list(allow_list.clone());

    // Labels are only ever looked up for allow-listed keys
    if allow_list.is_empty() {
        info!("No workload labels requested, skipping the API server client");
        return Ok(correlator);
    }

    let api_config = ApiServerConfig::in_cluster(config.kube_api_url.clone()).ok_or_else(|| {
        AgentError::config(
            "Kubernetes API server address unknown: set AMD_EXPORTER_KUBE_API_URL or run inside the cluster",
        )
    })?;
    info!("Using Kubernetes API server at {}", api_config.url);
    correlator = correlator.with_label_source(Arc::new(ApiServerClient::new(api_config)?));

    Ok(correlator)
}

/// Resolve on SIGTERM or SIGINT
#[cfg(unix)]
pub async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
        _ => {
            tracing::warn!("Failed to install signal handlers, falling back to Ctrl+C");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
        }
    }
}

/// Resolve on Ctrl+C
#[cfg(not(unix))]
pub async fn wait_for_termination() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const ROCM_SMI_OUTPUT: &str = r#"{"card0": {"Card series": "AMD INSTINCT MI250 (MCM) OAM AC MBA", "Card model": "0x0c34", "Card vendor": "Advanced Micro Devices, Inc. [AMD/ATI]", "Card SKU": "D65209", "PCI Bus": "0000:B3:00.0"}}"#;

    /// Shell script standing in for rocm-smi
    fn fake_rocm_smi(dir: &Path) -> PathBuf {
        let path = dir.join("rocm-smi");
        std::fs::write(&path, format!("#!/bin/sh\ncat <<'EOF'\n{}\nEOF\n", ROCM_SMI_OUTPUT)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn standalone_config(dir: &TempDir) -> ExporterConfig {
        ExporterConfig {
            with_kubernetes: false,
            rocm_smi_path: fake_rocm_smi(dir.path()),
            sysfs_root: dir.path().join("sys"),
            ..ExporterConfig::default()
        }
    }

    #[tokio::test]
    async fn test_build_and_serve_without_kubernetes() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::build(standalone_config(&dir)).await.unwrap();
        assert_eq!(exporter.endpoint().scrape_timeout(), exporter.config().scrape_timeout());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(exporter.serve(listener, async {
            let _ = stop_rx.await;
        }));

        let text = reqwest::get(format!("http://{}/metrics", addr))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        // Empty sysfs tree: no readable cards, only the aggregates
        assert!(text.contains(r#"amd_num_gpus{num_gpus=""} 0"#));
        assert!(text.contains(r#"amd_num_sockets{num_sockets=""} 0"#));
        #[cfg(target_os = "linux")]
        assert!(text.contains("process_resident_memory_bytes"));

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_missing_rocm_smi_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExporterConfig {
            rocm_smi_path: dir.path().join("absent"),
            ..standalone_config(&dir)
        };

        let result = Exporter::build(config).await;

        assert!(matches!(result, Err(AgentError::Gpu(_))));
    }

    #[tokio::test]
    async fn test_unreachable_kubelet_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExporterConfig {
            with_kubernetes: true,
            kubelet_socket_path: dir.path().join("kubelet.sock"),
            ..standalone_config(&dir)
        };

        let result = Exporter::build(config).await;

        assert!(matches!(result, Err(AgentError::Kube(_))));
    }
}
