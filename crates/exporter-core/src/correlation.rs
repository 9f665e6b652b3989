//! Workload correlation
//!
//! Builds, once per collection pass, the map from device key to the workloads currently bound
//! to that device. The map is owned by the pass that built it and never changes afterwards.

use crate::context::PassContext;
use crate::normalize::additional_device_keys;
use crate::traits::{DeviceAllocationSource, LabelIndex, WorkloadLabelSource};
use crate::workload::{DeviceAllocation, NamespacedName, WorkloadBinding};
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Device key to bound workloads, in discovery order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceKeyMap {
    entries: HashMap<String, Vec<WorkloadBinding>>,
}

impl DeviceKeyMap {
    /// Map with no bindings, used when correlation failed for a pass
    pub fn empty() -> Self {
        Self::default()
    }

    /// File every binding under its raw device identifier and its canonical keys
    pub fn from_bindings<I>(bindings: I) -> Self
    where
        I: IntoIterator<Item = (String, WorkloadBinding)>,
    {
        let mut entries: HashMap<String, Vec<WorkloadBinding>> = HashMap::new();

        for (device_id, binding) in bindings {
            for key in additional_device_keys(&device_id) {
                entries.entry(key).or_default().push(binding.clone());
            }
            entries.entry(device_id).or_default().push(binding);
        }

        Self { entries }
    }

    /// Bindings filed under `key`; empty when the device is not in use
    pub fn bindings(&self, key: &str) -> &[WorkloadBinding] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Correlates allocated devices with the workloads holding them
#[derive(Clone)]
pub struct WorkloadCorrelator {
    allocations: Arc<dyn DeviceAllocationSource>,
    labels: Option<Arc<dyn WorkloadLabelSource>>,
    node_name: Option<String>,
    allow_list: Vec<String>,
}

impl WorkloadCorrelator {
    pub fn new(allocations: Arc<dyn DeviceAllocationSource>) -> Self {
        Self {
            allocations,
            labels: None,
            node_name: None,
            allow_list: Vec::new(),
        }
    }

    pub fn with_label_source(mut self, labels: Arc<dyn WorkloadLabelSource>) -> Self {
        self.labels = Some(labels);
        self
    }

    /// Node this exporter runs on; enables the bulk label lookup
    pub fn with_node_name(mut self, node_name: impl Into<String>) -> Self {
        let node_name = node_name.into();
        self.node_name = (!node_name.is_empty()).then_some(node_name);
        self
    }

    /// Workload label keys to carry into metrics, compared lower-case
    pub fn with_allow_list(mut self, allow_list: Vec<String>) -> Self {
        self.allow_list = allow_list;
        self
    }

    pub fn allow_list(&self) -> &[String] {
        &self.allow_list
    }

    /// Build the device key map for one pass.
    ///
    /// Only a failed allocation query is an error. Label lookups degrade to fewer labels.
    pub async fn correlate(&self, ctx: &PassContext) -> Result<DeviceKeyMap> {
        let allocations = ctx
            .bound("list device allocations", self.allocations.list_allocations())
            .await?;

        debug!(pass = %ctx.id(), allocations = allocations.len(), "Discovered device allocations");

        let workloads = unique_workloads(&allocations);
        let labels = self.resolve_labels(ctx, &workloads).await;

        let bindings = allocations.into_iter().map(|allocation| {
            let workload_labels = labels
                .get(&allocation.workload.namespaced_name())
                .cloned()
                .unwrap_or_default();
            let binding = WorkloadBinding::new(allocation.workload).with_labels(workload_labels);
            (allocation.device_id, binding)
        });

        Ok(DeviceKeyMap::from_bindings(bindings))
    }

    async fn resolve_labels(&self, ctx: &PassContext, workloads: &[NamespacedName]) -> LabelIndex {
        let Some(source) = &self.labels else {
            return LabelIndex::new();
        };
        if workloads.is_empty() || self.allow_list.is_empty() {
            return LabelIndex::new();
        }

        if let Some(node) = &self.node_name {
            match ctx
                .bound("list node workload labels", source.node_labels(node, &self.allow_list))
                .await
            {
                Ok(mut index) => {
                    index.retain(|name, _| workloads.contains(name));
                    if !index.is_empty() {
                        return index;
                    }
                    debug!(pass = %ctx.id(), node = %node, "Node label lookup matched no workloads");
                }
                Err(e) => {
                    warn!(pass = %ctx.id(), node = %node, "Failed to list workload labels on node: {}", e);
                }
            }
        }

        info!(pass = %ctx.id(), workloads = workloads.len(), "Resolving workload labels one by one");

        let mut index = LabelIndex::new();
        for workload in workloads {
            match ctx
                .bound("get workload labels", source.workload_labels(workload, &self.allow_list))
                .await
            {
                Ok(Some(labels)) => {
                    index.insert(workload.clone(), labels);
                }
                Ok(None) => debug!(pass = %ctx.id(), workload = %workload, "Workload no longer exists"),
                Err(e) => {
                    warn!(pass = %ctx.id(), workload = %workload, "Failed to get workload labels: {}", e);
                }
            }
        }
        index
    }
}

fn unique_workloads(allocations: &[DeviceAllocation]) -> Vec<NamespacedName> {
    let mut workloads: Vec<NamespacedName> = Vec::new();
    for allocation in allocations {
        let name = allocation.workload.namespaced_name();
        if !workloads.contains(&name) {
            workloads.push(name);
        }
    }
    workloads
}
