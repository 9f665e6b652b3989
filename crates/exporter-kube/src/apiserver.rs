//! Kubernetes API server client used to resolve pod labels

use crate::config::ApiServerConfig;
use crate::{KubeError, Result};
use async_trait::async_trait;
use exporter_core::{
    select_labels, Error, LabelIndex, NamespacedName, WorkloadLabelSource, WorkloadLabels,
};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

#[derive(Debug, Deserialize)]
struct Pod {
    metadata: ObjectMeta,
}

#[derive(Debug, Default, Deserialize)]
struct ObjectMeta {
    #[serde(default)]
    name: String,
    #[serde(default)]
    namespace: String,
    #[serde(default)]
    labels: HashMap<String, String>,
}

impl Pod {
    fn namespaced_name(&self) -> NamespacedName {
        NamespacedName::new(&self.metadata.name, &self.metadata.namespace)
    }
}

/// Reads pods from the API server
#[derive(Debug, Clone)]
pub struct ApiServerClient {
    client: Client,
    config: ApiServerConfig,
}

impl ApiServerClient {
    /// Build the HTTP client, trusting the configured CA bundle
    pub fn new(config: ApiServerConfig) -> Result<Self> {
        info!("Creating API server client for {}", config.url);

        let mut builder = Client::builder().timeout(config.request_timeout);

        if let Some(ca_path) = &config.ca_path {
            let pem = std::fs::read(ca_path)?;
            let certificate = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| KubeError::config(format!("invalid CA bundle {}: {}", ca_path.display(), e)))?;
            builder = builder.add_root_certificate(certificate);
        }

        let client = builder
            .build()
            .map_err(|e| KubeError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ApiServerConfig {
        &self.config
    }

    /// Pods scheduled on `node`
    async fn pods_on_node(&self, node: &str) -> Result<Vec<Pod>> {
        let url = format!("{}/api/v1/pods", self.base_url());
        debug!("Listing pods on node {} from {}", node, url);

        let request = self
            .client
            .get(&url)
            .query(&[("fieldSelector", format!("spec.nodeName={node}"))]);
        let response = self.authorized(request).await?.send().await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let pods: PodList = response.json().await?;
        Ok(pods.items)
    }

    /// A single pod, `None` when it no longer exists
    async fn pod(&self, workload: &NamespacedName) -> Result<Option<Pod>> {
        let url = format!(
            "{}/api/v1/namespaces/{}/pods/{}",
            self.base_url(),
            workload.namespace,
            workload.name
        );
        debug!("Getting pod {} from {}", workload, url);

        let response = self.authorized(self.client.get(&url)).await?.send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(Some(response.json().await?))
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        match &self.config.token_path {
            Some(token_path) => {
                let token = tokio::fs::read_to_string(token_path).await?;
                Ok(request.bearer_auth(token.trim()))
            }
            None => Ok(request),
        }
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }
}

async fn api_error(response: reqwest::Response) -> KubeError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    KubeError::ApiServer { status, message }
}

#[async_trait]
impl WorkloadLabelSource for ApiServerClient {
    async fn node_labels(&self, node: &str, allow_list: &[String]) -> exporter_core::Result<LabelIndex> {
        let pods = self
            .pods_on_node(node)
            .await
            .map_err(|e| Error::label_resolution(format!("unable to get pods from node {node}: {e}")))?;

        Ok(pods
            .iter()
            .map(|pod| (pod.namespaced_name(), select_labels(&pod.metadata.labels, allow_list)))
            .collect())
    }

    async fn workload_labels(
        &self,
        workload: &NamespacedName,
        allow_list: &[String],
    ) -> exporter_core::Result<Option<WorkloadLabels>> {
        let pod = self
            .pod(workload)
            .await
            .map_err(|e| Error::label_resolution(format!("unable to get pod {workload}: {e}")))?;

        Ok(pod.map(|pod| select_labels(&pod.metadata.labels, allow_list)))
    }
}
