//! # exporter-core
//!
//! Core types, traits, and the workload correlator for the AMD telemetry exporter.
//!
//! This crate holds everything that does not touch hardware, Kubernetes, or HTTP:
//!
//! - The telemetry snapshot and device registry data model
//! - Device identifier normalization and workload correlation
//! - Label sets and label-name sanitization
//! - Collaborator traits implemented by the gpu and kube crates
//! - The per-pass context bounding every collaborator call

pub mod context;
pub mod correlation;
pub mod device;
pub mod error;
pub mod labels;
pub mod normalize;
pub mod snapshot;
pub mod traits;
pub mod workload;

// Re-export commonly used types at the crate root
pub use context::PassContext;
pub use correlation::{DeviceKeyMap, WorkloadCorrelator};
pub use device::{DeviceInfo, DeviceRegistry, AMD_RESOURCE_NAME};
pub use error::{Error, Result};
pub use labels::{sanitize_label_name, LabelSet, DEFAULT_LABEL_PREFIX};
pub use normalize::additional_device_keys;
pub use snapshot::{
    AcceleratorField, CountField, SocketField, TelemetrySnapshot, ThreadField, MAX_ACCELERATORS,
    MAX_SOCKETS, MAX_THREADS, SENTINEL,
};
pub use traits::{DeviceAllocationSource, LabelIndex, TelemetrySource, WorkloadLabelSource};
pub use workload::{
    select_labels, DeviceAllocation, NamespacedName, WorkloadBinding, WorkloadIdentity,
    WorkloadLabels, DEFAULT_NAMESPACE,
};
