//! Workloads holding accelerator devices

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Namespace assumed when the allocation API reports none
pub const DEFAULT_NAMESPACE: &str = "default";

/// Allow-listed workload labels, ordered by key
pub type WorkloadLabels = BTreeMap<String, String>;

/// `namespace/name` identity of a pod
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamespacedName {
    pub namespace: String,
    pub name: String,
}

impl NamespacedName {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            namespace: if namespace.is_empty() {
                DEFAULT_NAMESPACE.to_string()
            } else {
                namespace
            },
            name: name.into(),
        }
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Pod, container and node currently using a device
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkloadIdentity {
    pub name: String,
    pub namespace: String,
    pub container: String,
    pub node: String,
}

impl WorkloadIdentity {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        container: impl Into<String>,
        node: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            container: container.into(),
            node: node.into(),
        }
    }

    pub fn namespaced_name(&self) -> NamespacedName {
        NamespacedName::new(&self.name, &self.namespace)
    }
}

/// One device identifier reported by the allocation API together with its holder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAllocation {
    pub device_id: String,
    pub workload: WorkloadIdentity,
}

impl DeviceAllocation {
    pub fn new(device_id: impl Into<String>, workload: WorkloadIdentity) -> Self {
        Self {
            device_id: device_id.into(),
            workload,
        }
    }
}

/// A workload filed under a device key, with its allow-listed labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadBinding {
    pub workload: WorkloadIdentity,
    pub labels: WorkloadLabels,
}

impl WorkloadBinding {
    pub fn new(workload: WorkloadIdentity) -> Self {
        Self {
            workload,
            labels: WorkloadLabels::new(),
        }
    }

    pub fn with_labels(mut self, labels: WorkloadLabels) -> Self {
        self.labels = labels;
        self
    }
}

/// Keep the labels whose lower-cased key appears in `allow_list`
pub fn select_labels<'a, I>(labels: I, allow_list: &[String]) -> WorkloadLabels
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    labels
        .into_iter()
        .filter(|(key, _)| {
            let key = key.to_lowercase();
            allow_list.iter().any(|allowed| *allowed == key)
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
