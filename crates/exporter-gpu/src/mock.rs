//! Static telemetry and registry fixtures for testing

use exporter_core::{DeviceInfo, DeviceRegistry, TelemetrySnapshot, TelemetrySource};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Product series reported for every mock card
pub const MOCK_SERIES: &str = "amdinstinctmi250(mcm)oamacmba";

/// Telemetry source returning the same snapshot on every scan
#[derive(Debug)]
pub struct StaticTelemetry {
    snapshot: TelemetrySnapshot,
    scans: AtomicUsize,
}

impl StaticTelemetry {
    pub fn new(snapshot: TelemetrySnapshot) -> Self {
        Self {
            snapshot,
            scans: AtomicUsize::new(0),
        }
    }

    /// Number of scans served so far
    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

impl TelemetrySource for StaticTelemetry {
    fn scan(&self) -> TelemetrySnapshot {
        self.scans.fetch_add(1, Ordering::SeqCst);
        debug!("Serving static telemetry snapshot");
        self.snapshot.clone()
    }
}

/// Snapshot with `accelerators` cards whose readings are 0, 300, 301, ... 306 per field order
/// and no CPU telemetry
pub fn mock_accelerator_snapshot(accelerators: u32) -> TelemetrySnapshot {
    let mut snapshot = TelemetrySnapshot::new();
    snapshot.num_accelerators = accelerators;

    let count = (accelerators as usize).min(exporter_core::MAX_ACCELERATORS);
    for slot in 0..count {
        snapshot.accelerator_device_id[slot] = 0.0;
        snapshot.accelerator_power_cap[slot] = 300.0;
        snapshot.accelerator_power[slot] = 301.0;
        snapshot.accelerator_temperature[slot] = 302.0;
        snapshot.accelerator_core_clock[slot] = 303.0;
        snapshot.accelerator_memory_clock[slot] = 304.0;
        snapshot.accelerator_utilization[slot] = 305.0;
        snapshot.accelerator_memory_utilization[slot] = 306.0;
    }
    snapshot
}

/// Registry with one card per bus address, filed in slot order
pub fn mock_registry<I, S>(bus_addresses: I) -> DeviceRegistry
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    DeviceRegistry::from_slots(bus_addresses.into_iter().map(|bus| DeviceInfo {
        series: MOCK_SERIES.to_string(),
        model: "0x0c34".to_string(),
        vendor: "advancedmicrodevices,inc.[amd/ati]".to_string(),
        sku: "d65209".to_string(),
        bus_address: bus.into(),
        guid: String::new(),
    }))
}
