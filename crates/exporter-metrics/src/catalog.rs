//! Metric catalog
//!
//! The fixed list of metric families the exporter emits, in emission order. Built once at
//! startup and shared read-only by every collection pass.

use exporter_core::{AcceleratorField, CountField, SocketField, ThreadField};
use serde::Serialize;

/// Namespace prefixed to every family name
pub const NAMESPACE: &str = "amd";

/// Help text shared by every family
pub const HELP: &str = "AMD Params";

/// Name of the single descriptor advertised by `describe`
pub const DATA_DESC_NAME: &str = "amd_data";

/// Variable label of the advertised descriptor
pub const DATA_DESC_LABEL: &str = "socket";

pub const PRODUCT_NAME_LABEL: &str = "productname";
pub const DEVICE_LABEL: &str = "device";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
}

/// Where a family reads its values from in the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricSource {
    Thread(ThreadField),
    Socket(SocketField),
    Accelerator(AcceleratorField),
    Aggregate(CountField),
}

/// One metric family
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDefinition {
    pub name: String,
    pub namespace: Option<String>,
    pub subsystem: Option<String>,
    pub help: String,
    pub kind: MetricKind,
    /// Intrinsic label names, before any workload labels
    pub labels: Vec<String>,
    /// Applied as `value / divisor` when positive
    pub divisor: Option<f64>,
    pub source: MetricSource,
}

impl MetricDefinition {
    fn new(name: &str, kind: MetricKind, source: MetricSource, labels: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            namespace: Some(NAMESPACE.to_string()),
            subsystem: None,
            help: HELP.to_string(),
            kind,
            labels: labels.iter().map(|label| label.to_string()).collect(),
            divisor: None,
            source,
        }
    }

    fn per_thread(name: &str, kind: MetricKind, field: ThreadField) -> Self {
        Self::new(name, kind, MetricSource::Thread(field), &["thread"])
    }

    fn per_socket(name: &str, kind: MetricKind, field: SocketField, label: &str) -> Self {
        Self::new(name, kind, MetricSource::Socket(field), &[label])
    }

    fn per_accelerator(name: &str, kind: MetricKind, field: AcceleratorField) -> Self {
        Self::new(
            name,
            kind,
            MetricSource::Accelerator(field),
            &[name, PRODUCT_NAME_LABEL, DEVICE_LABEL],
        )
    }

    fn aggregate(name: &str, field: CountField) -> Self {
        Self::new(name, MetricKind::Gauge, MetricSource::Aggregate(field), &[name])
    }

    fn with_divisor(mut self, divisor: f64) -> Self {
        self.divisor = Some(divisor);
        self
    }

    /// `namespace_subsystem_name`, skipping empty parts
    pub fn fq_name(&self) -> String {
        [self.namespace.as_deref(), self.subsystem.as_deref(), Some(self.name.as_str())]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Scale a raw reading for exposition
    pub fn transform(&self, value: f64) -> f64 {
        match self.divisor {
            Some(divisor) if divisor > 0.0 => value / divisor,
            _ => value,
        }
    }
}

/// Ordered, immutable set of metric families
#[derive(Debug, Clone, PartialEq)]
pub struct MetricCatalog {
    definitions: Vec<MetricDefinition>,
}

impl MetricCatalog {
    /// The exporter's families in emission order
    pub fn build() -> Self {
        use MetricKind::{Counter, Gauge};

        let definitions = vec![
            MetricDefinition::per_thread("core_energy", Counter, ThreadField::CoreEnergy),
            MetricDefinition::per_thread("boost_limit", Gauge, ThreadField::BoostLimit),
            MetricDefinition::per_socket("socket_energy", Counter, SocketField::Energy, "socket"),
            MetricDefinition::per_socket("socket_power", Gauge, SocketField::Power, "socket"),
            MetricDefinition::per_socket("power_limit", Gauge, SocketField::PowerLimit, "power_limit"),
            MetricDefinition::per_socket(
                "prochot_status",
                Gauge,
                SocketField::ProchotStatus,
                "prochot_status",
            ),
            MetricDefinition::per_accelerator("gpu_dev_id", Gauge, AcceleratorField::DeviceId),
            MetricDefinition::per_accelerator("gpu_power_cap", Gauge, AcceleratorField::PowerCap)
                .with_divisor(1e6),
            MetricDefinition::per_accelerator("gpu_power", Counter, AcceleratorField::Power)
                .with_divisor(1e6),
            MetricDefinition::per_accelerator(
                "gpu_current_temperature",
                Gauge,
                AcceleratorField::Temperature,
            )
            .with_divisor(1e3),
            MetricDefinition::per_accelerator("gpu_SCLK", Gauge, AcceleratorField::CoreClock)
                .with_divisor(1e6),
            MetricDefinition::per_accelerator("gpu_MCLK", Gauge, AcceleratorField::MemoryClock)
                .with_divisor(1e6),
            MetricDefinition::per_accelerator("gpu_use_percent", Gauge, AcceleratorField::Utilization),
            MetricDefinition::per_accelerator(
                "gpu_memory_use_percent",
                Gauge,
                AcceleratorField::MemoryUtilization,
            ),
            MetricDefinition::aggregate("num_sockets", CountField::Sockets),
            MetricDefinition::aggregate("num_threads", CountField::Threads),
            MetricDefinition::aggregate("num_threads_per_core", CountField::ThreadsPerCore),
            MetricDefinition::aggregate("num_gpus", CountField::Accelerators),
        ];

        Self { definitions }
    }

    pub fn definitions(&self) -> &[MetricDefinition] {
        &self.definitions
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.definitions.iter()
    }

    /// Look a family up by its short name
    pub fn get(&self, name: &str) -> Option<&MetricDefinition> {
        self.definitions.iter().find(|definition| definition.name == name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl Default for MetricCatalog {
    fn default() -> Self {
        Self::build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_order() {
        let catalog = MetricCatalog::build();
        let names: Vec<String> = catalog.iter().map(MetricDefinition::fq_name).collect();

        assert_eq!(
            names,
            vec![
                "amd_core_energy",
                "amd_boost_limit",
                "amd_socket_energy",
                "amd_socket_power",
                "amd_power_limit",
                "amd_prochot_status",
                "amd_gpu_dev_id",
                "amd_gpu_power_cap",
                "amd_gpu_power",
                "amd_gpu_current_temperature",
                "amd_gpu_SCLK",
                "amd_gpu_MCLK",
                "amd_gpu_use_percent",
                "amd_gpu_memory_use_percent",
                "amd_num_sockets",
                "amd_num_threads",
                "amd_num_threads_per_core",
                "amd_num_gpus",
            ]
        );
    }

    #[test]
    fn test_family_labels_and_kinds() {
        let catalog = MetricCatalog::build();

        let core_energy = catalog.get("core_energy").unwrap();
        assert_eq!(core_energy.kind, MetricKind::Counter);
        assert_eq!(core_energy.labels, vec!["thread"]);

        let power_limit = catalog.get("power_limit").unwrap();
        assert_eq!(power_limit.labels, vec!["power_limit"]);

        let gpu_power = catalog.get("gpu_power").unwrap();
        assert_eq!(gpu_power.kind, MetricKind::Counter);
        assert_eq!(gpu_power.labels, vec!["gpu_power", "productname", "device"]);

        let num_gpus = catalog.get("num_gpus").unwrap();
        assert_eq!(num_gpus.kind, MetricKind::Gauge);
        assert_eq!(num_gpus.labels, vec!["num_gpus"]);
        assert!(catalog.iter().all(|definition| definition.help == HELP));
    }

    #[test]
    fn test_divisors() {
        let catalog = MetricCatalog::build();

        assert_eq!(catalog.get("gpu_power_cap").unwrap().transform(300.0), 0.0003);
        assert_eq!(catalog.get("gpu_current_temperature").unwrap().transform(302.0), 0.302);
        assert_eq!(catalog.get("gpu_dev_id").unwrap().transform(302.0), 302.0);
    }

    #[test]
    fn test_non_positive_divisor_is_ignored() {
        let definition = MetricDefinition::per_accelerator("gpu_power", MetricKind::Counter, AcceleratorField::Power)
            .with_divisor(0.0);
        assert_eq!(definition.transform(301.0), 301.0);

        let definition = definition.with_divisor(-2.0);
        assert_eq!(definition.transform(301.0), 301.0);
    }

    #[test]
    fn test_fq_name_skips_empty_parts() {
        let mut definition = MetricDefinition::aggregate("num_gpus", CountField::Accelerators);
        definition.subsystem = Some("node".to_string());
        assert_eq!(definition.fq_name(), "amd_node_num_gpus");

        definition.namespace = None;
        definition.subsystem = Some(String::new());
        assert_eq!(definition.fq_name(), "num_gpus");
    }
}
