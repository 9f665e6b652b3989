//! Hardware telemetry snapshot
//!
//! A snapshot is one immutable read of the current CPU and accelerator counters. Arrays have
//! fixed capacities and only the first `count` entries are meaningful for a given read.

/// Maximum number of logical threads tracked per snapshot
pub const MAX_THREADS: usize = 768;

/// Maximum number of CPU sockets tracked per snapshot
pub const MAX_SOCKETS: usize = 8;

/// Maximum number of accelerators tracked per snapshot
pub const MAX_ACCELERATORS: usize = 24;

/// Reading used when a measurement is unavailable. Never a valid zero.
pub const SENTINEL: f64 = -1.0;

/// Per-thread measurements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadField {
    CoreEnergy,
    BoostLimit,
}

/// Per-socket measurements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketField {
    Energy,
    Power,
    PowerLimit,
    ProchotStatus,
}

/// Per-accelerator measurements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcceleratorField {
    DeviceId,
    PowerCap,
    Power,
    Temperature,
    CoreClock,
    MemoryClock,
    Utilization,
    MemoryUtilization,
}

/// Unit counts reported alongside the measurements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CountField {
    Sockets,
    Threads,
    ThreadsPerCore,
    Accelerators,
}

/// One read of the hardware counters.
///
/// Every array starts filled with [`SENTINEL`]; scanners only overwrite values they could read.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySnapshot {
    pub sockets: u32,
    pub threads: u32,
    pub threads_per_core: u32,
    pub num_accelerators: u32,

    pub core_energy: [f64; MAX_THREADS],
    pub boost_limit: [f64; MAX_THREADS],

    pub socket_energy: [f64; MAX_SOCKETS],
    pub socket_power: [f64; MAX_SOCKETS],
    pub power_limit: [f64; MAX_SOCKETS],
    pub prochot_status: [f64; MAX_SOCKETS],

    pub accelerator_device_id: [f64; MAX_ACCELERATORS],
    pub accelerator_power_cap: [f64; MAX_ACCELERATORS],
    pub accelerator_power: [f64; MAX_ACCELERATORS],
    pub accelerator_temperature: [f64; MAX_ACCELERATORS],
    pub accelerator_core_clock: [f64; MAX_ACCELERATORS],
    pub accelerator_memory_clock: [f64; MAX_ACCELERATORS],
    pub accelerator_utilization: [f64; MAX_ACCELERATORS],
    pub accelerator_memory_utilization: [f64; MAX_ACCELERATORS],
}

impl TelemetrySnapshot {
    /// Create a snapshot with zero counts and every reading set to the sentinel
    pub fn new() -> Self {
        Self {
            sockets: 0,
            threads: 0,
            threads_per_core: 0,
            num_accelerators: 0,
            core_energy: [SENTINEL; MAX_THREADS],
            boost_limit: [SENTINEL; MAX_THREADS],
            socket_energy: [SENTINEL; MAX_SOCKETS],
            socket_power: [SENTINEL; MAX_SOCKETS],
            power_limit: [SENTINEL; MAX_SOCKETS],
            prochot_status: [SENTINEL; MAX_SOCKETS],
            accelerator_device_id: [SENTINEL; MAX_ACCELERATORS],
            accelerator_power_cap: [SENTINEL; MAX_ACCELERATORS],
            accelerator_power: [SENTINEL; MAX_ACCELERATORS],
            accelerator_temperature: [SENTINEL; MAX_ACCELERATORS],
            accelerator_core_clock: [SENTINEL; MAX_ACCELERATORS],
            accelerator_memory_clock: [SENTINEL; MAX_ACCELERATORS],
            accelerator_utilization: [SENTINEL; MAX_ACCELERATORS],
            accelerator_memory_utilization: [SENTINEL; MAX_ACCELERATORS],
        }
    }

    /// Raw count as reported by the scanner
    pub fn count(&self, field: CountField) -> u32 {
        match field {
            CountField::Sockets => self.sockets,
            CountField::Threads => self.threads,
            CountField::ThreadsPerCore => self.threads_per_core,
            CountField::Accelerators => self.num_accelerators,
        }
    }

    /// Valid per-thread readings
    pub fn thread_values(&self, field: ThreadField) -> &[f64] {
        let values = match field {
            ThreadField::CoreEnergy => &self.core_energy,
            ThreadField::BoostLimit => &self.boost_limit,
        };
        &values[..clamp(self.threads, MAX_THREADS)]
    }

    /// Valid per-socket readings
    pub fn socket_values(&self, field: SocketField) -> &[f64] {
        let values = match field {
            SocketField::Energy => &self.socket_energy,
            SocketField::Power => &self.socket_power,
            SocketField::PowerLimit => &self.power_limit,
            SocketField::ProchotStatus => &self.prochot_status,
        };
        &values[..clamp(self.sockets, MAX_SOCKETS)]
    }

    /// Valid per-accelerator readings
    pub fn accelerator_values(&self, field: AcceleratorField) -> &[f64] {
        let values = match field {
            AcceleratorField::DeviceId => &self.accelerator_device_id,
            AcceleratorField::PowerCap => &self.accelerator_power_cap,
            AcceleratorField::Power => &self.accelerator_power,
            AcceleratorField::Temperature => &self.accelerator_temperature,
            AcceleratorField::CoreClock => &self.accelerator_core_clock,
            AcceleratorField::MemoryClock => &self.accelerator_memory_clock,
            AcceleratorField::Utilization => &self.accelerator_utilization,
            AcceleratorField::MemoryUtilization => &self.accelerator_memory_utilization,
        };
        &values[..clamp(self.num_accelerators, MAX_ACCELERATORS)]
    }
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp(count: u32, capacity: usize) -> usize {
    (count as usize).min(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_snapshot_is_sentinel_filled() {
        let snapshot = TelemetrySnapshot::new();
        assert_eq!(snapshot.threads, 0);
        assert!(snapshot.core_energy.iter().all(|v| *v == SENTINEL));
        assert!(snapshot.accelerator_memory_utilization.iter().all(|v| *v == SENTINEL));
        assert!(snapshot.thread_values(ThreadField::CoreEnergy).is_empty());
    }

    #[test]
    fn test_values_follow_counts() {
        let mut snapshot = TelemetrySnapshot::new();
        snapshot.sockets = 2;
        snapshot.socket_power[0] = 120.0;

        let values = snapshot.socket_values(SocketField::Power);
        assert_eq!(values, &[120.0, SENTINEL]);
    }

    #[test]
    fn test_counts_above_capacity_are_clamped() {
        let mut snapshot = TelemetrySnapshot::new();
        snapshot.num_accelerators = 100;

        assert_eq!(snapshot.accelerator_values(AcceleratorField::Power).len(), MAX_ACCELERATORS);
        assert_eq!(snapshot.count(CountField::Accelerators), 100);
    }
}
