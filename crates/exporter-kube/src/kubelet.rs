//! Kubelet PodResources client
//!
//! The kubelet serves the PodResources API on a unix socket local to the node. Every `List`
//! answer is flattened into (device identifier, workload) pairs for the tracked resources.

use crate::config::KubeletConfig;
use crate::podresources::v1::pod_resources_lister_client::PodResourcesListerClient;
use crate::podresources::v1::{ListPodResourcesRequest, ListPodResourcesResponse};
use crate::Result;
use async_trait::async_trait;
use exporter_core::{DeviceAllocation, DeviceAllocationSource, Error, WorkloadIdentity};
use hyper_util::rt::TokioIo;
use std::path::PathBuf;
use tokio::net::UnixStream;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;
use tracing::{debug, error, info};

// Ignored by the connector, tonic only needs a syntactically valid URI
const PLACEHOLDER_ENDPOINT: &str = "http://[::]:50051";

/// Client for the kubelet PodResources API
#[derive(Debug, Clone)]
pub struct KubeletClient {
    client: PodResourcesListerClient<Channel>,
    config: KubeletConfig,
}

impl KubeletClient {
    /// Connect to the kubelet socket named in `config`
    pub async fn connect(config: KubeletConfig) -> Result<Self> {
        info!("Using kubelet socket path {}", config.socket_path.display());

        let socket_path: PathBuf = config.socket_path.clone();
        let channel = Endpoint::from_static(PLACEHOLDER_ENDPOINT)
            .connect_with_connector(service_fn(move |_: Uri| {
                let socket_path = socket_path.clone();
                async move {
                    let stream = UnixStream::connect(socket_path).await?;
                    Ok::<_, std::io::Error>(TokioIo::new(stream))
                }
            }))
            .await
            .map_err(|e| {
                error!(
                    socket_path = %config.socket_path.display(),
                    "Failed to connect to pod resources API: {}", e
                );
                e
            })?;

        Ok(Self {
            client: PodResourcesListerClient::new(channel),
            config,
        })
    }

    pub fn config(&self) -> &KubeletConfig {
        &self.config
    }

    /// Fetch current pod resources and keep the tracked devices
    pub async fn list(&self) -> Result<Vec<DeviceAllocation>> {
        // Clients are cheap clones sharing one channel
        let mut client = self.client.clone();
        let response = client
            .list(ListPodResourcesRequest {})
            .await
            .map_err(|status| {
                error!("Failed to list pod resources: {}", status);
                status
            })?
            .into_inner();

        Ok(tracked_allocations(&response, &self.config))
    }
}

#[async_trait]
impl DeviceAllocationSource for KubeletClient {
    async fn list_allocations(&self) -> exporter_core::Result<Vec<DeviceAllocation>> {
        self.list()
            .await
            .map_err(|e| Error::allocation(format!("unable to get pod resources: {}", e)))
    }
}

/// Flatten a `List` response into allocations of tracked resources, in response order
pub fn tracked_allocations(
    response: &ListPodResourcesResponse,
    config: &KubeletConfig,
) -> Vec<DeviceAllocation> {
    let mut allocations = Vec::new();

    for pod in &response.pod_resources {
        for container in &pod.containers {
            for device in &container.devices {
                if !config.is_tracked_resource(&device.resource_name) {
                    continue;
                }

                for device_id in &device.device_ids {
                    debug!(
                        pod = %pod.name,
                        container = %container.name,
                        namespace = %pod.namespace,
                        device_id = %device_id,
                        node = %config.node_name,
                        "Pod device info"
                    );

                    allocations.push(DeviceAllocation::new(
                        device_id.clone(),
                        WorkloadIdentity::new(&pod.name, &pod.namespace, &container.name, &config.node_name),
                    ));
                }
            }
        }
    }

    allocations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::podresources::v1::pod_resources_lister_server::{
        PodResourcesLister, PodResourcesListerServer,
    };
    use crate::podresources::v1::{ContainerDevices, ContainerResources, PodResources};
    use crate::KubeError;
    use tempfile::TempDir;
    use tokio::net::UnixListener;
    use tokio_stream::wrappers::UnixListenerStream;
    use tonic::{Request, Response, Status};

    struct FakeKubelet {
        pod_resources: Vec<PodResources>,
    }

    #[tonic::async_trait]
    impl PodResourcesLister for FakeKubelet {
        async fn list(
            &self,
            _request: Request<ListPodResourcesRequest>,
        ) -> std::result::Result<Response<ListPodResourcesResponse>, Status> {
            Ok(Response::new(ListPodResourcesResponse {
                pod_resources: self.pod_resources.clone(),
            }))
        }
    }

    fn pod(name: &str, namespace: &str, resource_name: &str, device_ids: &[&str]) -> PodResources {
        PodResources {
            name: name.to_string(),
            namespace: namespace.to_string(),
            containers: vec![ContainerResources {
                name: "container-1".to_string(),
                devices: vec![ContainerDevices {
                    resource_name: resource_name.to_string(),
                    device_ids: device_ids.iter().map(|id| id.to_string()).collect(),
                    topology: None,
                }],
                cpu_ids: Vec::new(),
            }],
        }
    }

    fn fixture_pods() -> Vec<PodResources> {
        vec![
            pod("pod-1", "team-a", "amd.com/gpu", &["0001:34:00.0"]),
            pod("pod-b", "team-2", "custom.amd.com/gpu", &["80EE/vgpu-2345"]),
            pod("pod-c", "team-2", "amd.com/gpu", &["0000:8e:00.0"]),
            pod("pod-i", "team-b", "amd.com/gpu", &["amd123/gi456"]),
            pod("pod-ii", "team-b", "amd.com/gpu", &["0000:b3:00.0"]),
            pod("pod-y", "team-b", "unknown/resource", &["12345"]),
        ]
    }

    async fn serve_fake_kubelet(dir: &TempDir, pod_resources: Vec<PodResources>) -> PathBuf {
        let socket_path = dir.path().join("kubelet.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();

        tokio::spawn(async move {
            tonic::transport::Server::builder()
                .add_service(PodResourcesListerServer::new(FakeKubelet { pod_resources }))
                .serve_with_incoming(UnixListenerStream::new(listener))
                .await
                .unwrap();
        });

        socket_path
    }

    #[test]
    fn test_tracked_allocations_filter_resources() {
        let response = ListPodResourcesResponse {
            pod_resources: fixture_pods(),
        };
        let config = KubeletConfig::default()
            .with_resource_names(vec!["custom.amd.com/gpu".to_string()])
            .with_node_name("node-1");

        let allocations = tracked_allocations(&response, &config);

        let ids: Vec<&str> = allocations.iter().map(|a| a.device_id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["0001:34:00.0", "80EE/vgpu-2345", "0000:8e:00.0", "amd123/gi456", "0000:b3:00.0"]
        );
        assert!(allocations.iter().all(|a| a.workload.node == "node-1"));
        assert_eq!(allocations[2].workload.name, "pod-c");
        assert_eq!(allocations[2].workload.namespace, "team-2");
        assert_eq!(allocations[2].workload.container, "container-1");
    }

    #[test]
    fn test_custom_resources_need_configuration() {
        let response = ListPodResourcesResponse {
            pod_resources: fixture_pods(),
        };

        let allocations = tracked_allocations(&response, &KubeletConfig::default());

        assert_eq!(allocations.len(), 4);
        assert!(allocations.iter().all(|a| a.workload.name != "pod-b"));
    }

    #[test]
    fn test_every_device_id_is_reported() {
        let response = ListPodResourcesResponse {
            pod_resources: vec![pod("pod-multi", "ml", "amd.com/gpu", &["0000:b3:00.0", "0000:8e:00.0"])],
        };

        let allocations = tracked_allocations(&response, &KubeletConfig::default());

        assert_eq!(allocations.len(), 2);
        assert!(allocations.iter().all(|a| a.workload.name == "pod-multi"));
    }

    #[tokio::test]
    async fn test_list_over_unix_socket() {
        let dir = TempDir::new().unwrap();
        let socket_path = serve_fake_kubelet(&dir, fixture_pods()).await;

        let client = KubeletClient::connect(KubeletConfig::new(socket_path).with_node_name("node-1"))
            .await
            .unwrap();
        let allocations = client.list_allocations().await.unwrap();

        assert_eq!(allocations.len(), 4);
        assert_eq!(allocations[0].workload.name, "pod-1");
        assert_eq!(allocations[3].device_id, "0000:b3:00.0");
    }

    #[tokio::test]
    async fn test_connect_to_missing_socket_fails() {
        let dir = TempDir::new().unwrap();

        let result = KubeletClient::connect(KubeletConfig::new(dir.path().join("missing.sock"))).await;

        assert!(matches!(result, Err(KubeError::Transport(_))));
    }
}
