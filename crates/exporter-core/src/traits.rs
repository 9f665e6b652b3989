//! Collaborator interfaces
//!
//! These traits describe the sources the exporter reads from. Hardware and Kubernetes
//! implementations live in their own crates; tests substitute in-memory versions.

use crate::snapshot::TelemetrySnapshot;
use crate::workload::{DeviceAllocation, NamespacedName, WorkloadLabels};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Labels per workload as returned by a bulk lookup
pub type LabelIndex = HashMap<NamespacedName, WorkloadLabels>;

/// Produces a fresh hardware snapshot on every call.
///
/// Scans never fail: readings that cannot be taken stay at the sentinel.
pub trait TelemetrySource: Send + Sync {
    fn scan(&self) -> TelemetrySnapshot;
}

impl<F> TelemetrySource for F
where
    F: Fn() -> TelemetrySnapshot + Send + Sync,
{
    fn scan(&self) -> TelemetrySnapshot {
        self()
    }
}

/// Device-allocation API reporting which workload holds which device on this node
#[async_trait]
pub trait DeviceAllocationSource: Send + Sync {
    /// Allocations in discovery order
    async fn list_allocations(&self) -> Result<Vec<DeviceAllocation>>;
}

/// Resolves the allow-listed labels of workloads
#[async_trait]
pub trait WorkloadLabelSource: Send + Sync {
    /// Labels of every workload scheduled on `node`
    async fn node_labels(&self, node: &str, allow_list: &[String]) -> Result<LabelIndex>;

    /// Labels of a single workload, `None` when it no longer exists
    async fn workload_labels(
        &self,
        workload: &NamespacedName,
        allow_list: &[String],
    ) -> Result<Option<WorkloadLabels>>;
}
