//! Metric emission
//!
//! Turns one snapshot plus the pass's device bindings into the ordered observation list.
//! Families come out in catalog order and samples within a family by ascending index.

use crate::catalog::{MetricCatalog, MetricDefinition, MetricSource};
use crate::observation::Observation;
use exporter_core::{
    sanitize_label_name, DeviceKeyMap, DeviceRegistry, LabelSet, TelemetrySnapshot, WorkloadBinding,
    DEFAULT_LABEL_PREFIX,
};
use std::sync::Arc;
use tracing::warn;

pub const POD_LABEL: &str = "exported_pod";
pub const CONTAINER_LABEL: &str = "exported_container";
pub const NAMESPACE_LABEL: &str = "exported_namespace";
pub const NODE_LABEL: &str = "exported_node";

const DEVICE_PREFIX: &str = "amd";

/// Builds observations from catalog definitions
#[derive(Debug, Clone)]
pub struct EmissionEngine {
    catalog: Arc<MetricCatalog>,
    label_prefix: String,
}

impl EmissionEngine {
    pub fn new(catalog: Arc<MetricCatalog>) -> Self {
        Self {
            catalog,
            label_prefix: DEFAULT_LABEL_PREFIX.to_string(),
        }
    }

    /// Prefix for workload label names that needed sanitizing
    pub fn with_label_prefix(mut self, label_prefix: impl Into<String>) -> Self {
        self.label_prefix = label_prefix.into();
        self
    }

    pub fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    /// Emit every family for one pass.
    ///
    /// `bindings` is `None` when workload correlation is disabled; accelerator samples then
    /// carry only their base labels.
    pub fn emit(
        &self,
        snapshot: &TelemetrySnapshot,
        registry: &DeviceRegistry,
        bindings: Option<&DeviceKeyMap>,
    ) -> Vec<Observation> {
        let mut observations = Vec::new();

        for definition in self.catalog.iter() {
            match definition.source {
                MetricSource::Thread(field) => {
                    indexed(&mut observations, definition, snapshot.thread_values(field));
                }
                MetricSource::Socket(field) => {
                    indexed(&mut observations, definition, snapshot.socket_values(field));
                }
                MetricSource::Accelerator(field) => {
                    for (slot, value) in snapshot.accelerator_values(field).iter().enumerate() {
                        self.accelerator(&mut observations, definition, *value, slot, registry, bindings);
                    }
                }
                MetricSource::Aggregate(field) => {
                    let labels = label_set(definition, [String::new()]);
                    observations.push(Observation::new(definition, f64::from(snapshot.count(field)), labels));
                }
            }
        }

        observations
    }

    /// One sample per workload bound to the slot's device, or one base sample when none is
    fn accelerator(
        &self,
        observations: &mut Vec<Observation>,
        definition: &MetricDefinition,
        value: f64,
        slot: usize,
        registry: &DeviceRegistry,
        bindings: Option<&DeviceKeyMap>,
    ) {
        let base = label_set(
            definition,
            [slot.to_string(), registry.series(slot).to_string(), format!("{DEVICE_PREFIX}{slot}")],
        );

        let bound = bindings
            .map(|map| map.bindings(registry.bus_address(slot)))
            .unwrap_or_default();

        if bound.is_empty() {
            observations.push(Observation::new(definition, value, base));
            return;
        }

        for binding in bound {
            observations.push(Observation::new(definition, value, self.workload_labels(base.clone(), binding)));
        }
    }

    fn workload_labels(&self, mut labels: LabelSet, binding: &WorkloadBinding) -> LabelSet {
        let workload = &binding.workload;
        labels.push(POD_LABEL, &workload.name);
        labels.push(CONTAINER_LABEL, &workload.container);
        labels.push(NAMESPACE_LABEL, &workload.namespace);
        labels.push(NODE_LABEL, &workload.node);

        // Key-ordered map, so the first key to claim a name keeps it
        for (key, value) in &binding.labels {
            let name = sanitize_label_name(key, Some(self.label_prefix.as_str()));
            if labels.get(&name).is_some() {
                warn!(label = %key, name = %name, "Skipping workload label that collides with an existing label");
                continue;
            }
            labels.push(name, value);
        }
        labels
    }
}

fn indexed(observations: &mut Vec<Observation>, definition: &MetricDefinition, values: &[f64]) {
    for (index, value) in values.iter().enumerate() {
        observations.push(Observation::new(definition, *value, label_set(definition, [index.to_string()])));
    }
}

/// Zip intrinsic label names with their values
fn label_set<const N: usize>(definition: &MetricDefinition, values: [String; N]) -> LabelSet {
    definition.labels.iter().cloned().zip(values).collect()
}
