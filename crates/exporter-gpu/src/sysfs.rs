//! Sysfs telemetry scanner
//!
//! Reads CPU and accelerator telemetry from the kernel's sysfs interfaces. Units follow the
//! kernel: energy in microjoules, accelerator power in microwatts, temperature in millidegrees
//! Celsius, and clocks in hertz. CPU boost limits are reported in megahertz and socket power
//! limits in milliwatts. A file that is missing or unparsable leaves its reading at the
//! sentinel.

use exporter_core::{
    TelemetrySnapshot, TelemetrySource, MAX_ACCELERATORS, MAX_SOCKETS, MAX_THREADS,
};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const AMD_PCI_VENDOR: &str = "0x1002";
const AMD_ENERGY_DRIVER: &str = "amd_energy";

/// Scans a sysfs tree on every call
#[derive(Debug, Clone)]
pub struct SysfsScanner {
    root: PathBuf,
}

impl SysfsScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scan_cpus(&self, snapshot: &mut TelemetrySnapshot) {
        let cpu_dir = self.root.join("devices/system/cpu");
        let cpus = numbered_entries(&cpu_dir, "cpu");

        // Threads are counted, not numbered, so offline gaps in cpuN shift later readings down
        let mut packages = BTreeSet::new();
        for (position, (_, cpu)) in cpus.iter().enumerate() {
            if let Some(package) = read_trimmed(&cpu.join("topology/physical_package_id")) {
                packages.insert(package);
            }
            if let Some(slot) = snapshot.boost_limit.get_mut(position) {
                if let Some(khz) = read_f64(&cpu.join("cpufreq/scaling_max_freq")) {
                    *slot = khz / 1000.0;
                }
            }
        }

        snapshot.threads = cpus.len() as u32;
        snapshot.sockets = packages.len() as u32;
        snapshot.threads_per_core = cpus
            .first()
            .and_then(|(_, cpu)| read_trimmed(&cpu.join("topology/thread_siblings_list")))
            .map(|list| cpu_list_len(&list))
            .unwrap_or(0);

        self.scan_energy_hwmon(snapshot);
        self.scan_rapl(snapshot);
    }

    /// Per-core and per-socket counters exposed by the `amd_energy` hwmon driver
    fn scan_energy_hwmon(&self, snapshot: &mut TelemetrySnapshot) {
        let hwmons = numbered_entries(&self.root.join("class/hwmon"), "hwmon");

        for (_, hwmon) in hwmons {
            if read_trimmed(&hwmon.join("name")).as_deref() != Some(AMD_ENERGY_DRIVER) {
                continue;
            }

            for (channel, label_path) in numbered_files(&hwmon, "energy", "_label") {
                let Some(label) = read_trimmed(&label_path) else {
                    continue;
                };
                let Some(value) = read_f64(&hwmon.join(format!("energy{channel}_input"))) else {
                    continue;
                };

                if let Some(core) = label.strip_prefix("Ecore").and_then(|n| n.parse::<usize>().ok()) {
                    if core < MAX_THREADS {
                        snapshot.core_energy[core] = value;
                    }
                } else if let Some(socket) =
                    label.strip_prefix("Esocket").and_then(|n| n.parse::<usize>().ok())
                {
                    if socket < MAX_SOCKETS {
                        snapshot.socket_energy[socket] = value;
                    }
                }
            }
        }
    }

    /// Package energy and power limits from the powercap RAPL zones
    fn scan_rapl(&self, snapshot: &mut TelemetrySnapshot) {
        let zones = numbered_entries(&self.root.join("class/powercap"), "intel-rapl:");

        for (socket, zone) in zones {
            if socket >= MAX_SOCKETS {
                continue;
            }
            if snapshot.socket_energy[socket] < 0.0 {
                if let Some(energy) = read_f64(&zone.join("energy_uj")) {
                    snapshot.socket_energy[socket] = energy;
                }
            }
            if let Some(limit) = read_f64(&zone.join("constraint_0_power_limit_uw")) {
                snapshot.power_limit[socket] = limit / 1000.0;
            }
        }
    }

    fn scan_accelerators(&self, snapshot: &mut TelemetrySnapshot) {
        let cards: Vec<PathBuf> = numbered_entries(&self.root.join("class/drm"), "card")
            .into_iter()
            .map(|(_, card)| card.join("device"))
            .filter(|device| read_trimmed(&device.join("vendor")).as_deref() == Some(AMD_PCI_VENDOR))
            .collect();

        snapshot.num_accelerators = cards.len() as u32;

        for (slot, device) in cards.iter().enumerate().take(MAX_ACCELERATORS) {
            set_reading(&mut snapshot.accelerator_device_id[slot], read_hex(&device.join("device")));
            set_reading(
                &mut snapshot.accelerator_utilization[slot],
                read_f64(&device.join("gpu_busy_percent")),
            );
            set_reading(
                &mut snapshot.accelerator_memory_utilization[slot],
                read_f64(&device.join("mem_busy_percent")),
            );

            let Some((_, hwmon)) = numbered_entries(&device.join("hwmon"), "hwmon").into_iter().next()
            else {
                continue;
            };

            set_reading(&mut snapshot.accelerator_power_cap[slot], read_f64(&hwmon.join("power1_cap")));
            set_reading(
                &mut snapshot.accelerator_power[slot],
                read_f64(&hwmon.join("power1_average")).or_else(|| read_f64(&hwmon.join("power1_input"))),
            );
            // Edge sensor first, junction when the edge sensor is absent
            set_reading(
                &mut snapshot.accelerator_temperature[slot],
                read_f64(&hwmon.join("temp1_input")).or_else(|| read_f64(&hwmon.join("temp2_input"))),
            );
            set_reading(&mut snapshot.accelerator_core_clock[slot], read_f64(&hwmon.join("freq1_input")));
            set_reading(&mut snapshot.accelerator_memory_clock[slot], read_f64(&hwmon.join("freq2_input")));
        }
    }
}

impl TelemetrySource for SysfsScanner {
    fn scan(&self) -> TelemetrySnapshot {
        let mut snapshot = TelemetrySnapshot::new();

        self.scan_cpus(&mut snapshot);
        self.scan_accelerators(&mut snapshot);

        debug!(
            sockets = snapshot.sockets,
            threads = snapshot.threads,
            accelerators = snapshot.num_accelerators,
            "Scanned sysfs telemetry"
        );
        snapshot
    }
}

fn set_reading(slot: &mut f64, value: Option<f64>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|raw| raw.trim().to_string())
}

fn read_f64(path: &Path) -> Option<f64> {
    read_trimmed(path)?.parse().ok()
}

fn read_hex(path: &Path) -> Option<f64> {
    let raw = read_trimmed(path)?;
    u64::from_str_radix(raw.trim_start_matches("0x"), 16)
        .ok()
        .map(|value| value as f64)
}

/// Directory entries named `<prefix><number>`, ordered by number
fn numbered_entries(dir: &Path, prefix: &str) -> Vec<(usize, PathBuf)> {
    numbered_files(dir, prefix, "")
}

/// Directory entries named `<prefix><number><suffix>`, ordered by number
fn numbered_files(dir: &Path, prefix: &str, suffix: &str) -> Vec<(usize, PathBuf)> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut numbered: Vec<(usize, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            let index = name
                .to_str()?
                .strip_prefix(prefix)?
                .strip_suffix(suffix)?
                .parse::<usize>()
                .ok()?;
            Some((index, entry.path()))
        })
        .collect();

    numbered.sort_by_key(|(index, _)| *index);
    numbered
}

/// Number of CPUs in a kernel cpu list such as `0,64` or `0-1`
fn cpu_list_len(list: &str) -> u32 {
    list.split(',')
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('-') {
            Some((start, end)) => match (start.parse::<u32>(), end.parse::<u32>()) {
                (Ok(start), Ok(end)) if end >= start => end - start + 1,
                _ => 0,
            },
            None => u32::from(part.parse::<u32>().is_ok()),
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use exporter_core::{AcceleratorField, SocketField, ThreadField, SENTINEL};
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn cpu_tree(root: &Path) {
        for (cpu, package) in [(0, 0), (1, 0), (2, 1), (3, 1)] {
            write(root, &format!("devices/system/cpu/cpu{cpu}/topology/physical_package_id"), &format!("{package}\n"));
            write(root, &format!("devices/system/cpu/cpu{cpu}/topology/thread_siblings_list"), "0-1\n");
        }
        write(root, "devices/system/cpu/cpu0/cpufreq/scaling_max_freq", "3500000\n");
        write(root, "devices/system/cpu/cpu2/cpufreq/scaling_max_freq", "2800000\n");
        // Not a cpu directory
        write(root, "devices/system/cpu/cpufreq/boost", "1\n");

        write(root, "class/hwmon/hwmon0/name", "amd_energy\n");
        write(root, "class/hwmon/hwmon0/energy1_label", "Ecore000\n");
        write(root, "class/hwmon/hwmon0/energy1_input", "123456\n");
        write(root, "class/hwmon/hwmon0/energy2_label", "Ecore001\n");
        write(root, "class/hwmon/hwmon0/energy2_input", "654321\n");
        write(root, "class/hwmon/hwmon0/energy5_label", "Esocket0\n");
        write(root, "class/hwmon/hwmon0/energy5_input", "999000\n");

        write(root, "class/powercap/intel-rapl:0/energy_uj", "1\n");
        write(root, "class/powercap/intel-rapl:0/constraint_0_power_limit_uw", "280000000\n");
        write(root, "class/powercap/intel-rapl:1/energy_uj", "777000\n");
        write(root, "class/powercap/intel-rapl:0:0/energy_uj", "5\n");
    }

    fn gpu_tree(root: &Path) {
        write(root, "class/drm/card0/device/vendor", "0x1002\n");
        write(root, "class/drm/card0/device/device", "0x740c\n");
        write(root, "class/drm/card0/device/gpu_busy_percent", "42\n");
        write(root, "class/drm/card0/device/mem_busy_percent", "7\n");
        write(root, "class/drm/card0/device/hwmon/hwmon3/power1_cap", "500000000\n");
        write(root, "class/drm/card0/device/hwmon/hwmon3/power1_average", "300000\n");
        write(root, "class/drm/card0/device/hwmon/hwmon3/temp1_input", "45000\n");
        write(root, "class/drm/card0/device/hwmon/hwmon3/freq1_input", "800000000\n");
        write(root, "class/drm/card0/device/hwmon/hwmon3/freq2_input", "1600000000\n");

        // Connector entries and foreign vendors are not accelerators
        write(root, "class/drm/card0-DP-1/status", "disconnected\n");
        write(root, "class/drm/card1/device/vendor", "0x10de\n");

        write(root, "class/drm/card2/device/vendor", "0x1002\n");
        write(root, "class/drm/card2/device/device", "0x740c\n");
        write(root, "class/drm/card2/device/hwmon/hwmon4/power1_input", "250000\n");
        write(root, "class/drm/card2/device/hwmon/hwmon4/temp2_input", "51000\n");
    }

    #[test]
    fn test_scan_cpu_topology() {
        let dir = TempDir::new().unwrap();
        cpu_tree(dir.path());

        let snapshot = SysfsScanner::new(dir.path()).scan();

        assert_eq!(snapshot.threads, 4);
        assert_eq!(snapshot.sockets, 2);
        assert_eq!(snapshot.threads_per_core, 2);
        assert_eq!(snapshot.thread_values(ThreadField::BoostLimit), &[3500.0, SENTINEL, 2800.0, SENTINEL]);
    }

    #[test]
    fn test_cpu_numbering_gaps() {
        let dir = TempDir::new().unwrap();
        for cpu in [0, 2] {
            write(dir.path(), &format!("devices/system/cpu/cpu{cpu}/topology/physical_package_id"), "0\n");
        }
        write(dir.path(), "devices/system/cpu/cpu0/cpufreq/scaling_max_freq", "3500000\n");
        write(dir.path(), "devices/system/cpu/cpu2/cpufreq/scaling_max_freq", "2800000\n");

        let snapshot = SysfsScanner::new(dir.path()).scan();

        assert_eq!(snapshot.threads, 2);
        assert_eq!(snapshot.thread_values(ThreadField::BoostLimit), &[3500.0, 2800.0]);
        assert_eq!(snapshot.boost_limit[2], SENTINEL);
    }

    #[test]
    fn test_scan_cpu_energy_and_limits() {
        let dir = TempDir::new().unwrap();
        cpu_tree(dir.path());

        let snapshot = SysfsScanner::new(dir.path()).scan();

        assert_eq!(snapshot.thread_values(ThreadField::CoreEnergy), &[123456.0, 654321.0, SENTINEL, SENTINEL]);
        // The hwmon socket counter wins over RAPL for socket 0
        assert_eq!(snapshot.socket_values(SocketField::Energy), &[999000.0, 777000.0]);
        assert_eq!(snapshot.socket_values(SocketField::PowerLimit), &[280000.0, SENTINEL]);
        assert_eq!(snapshot.socket_values(SocketField::Power), &[SENTINEL, SENTINEL]);
    }

    #[test]
    fn test_scan_accelerators() {
        let dir = TempDir::new().unwrap();
        gpu_tree(dir.path());

        let snapshot = SysfsScanner::new(dir.path()).scan();

        assert_eq!(snapshot.num_accelerators, 2);
        assert_eq!(snapshot.accelerator_values(AcceleratorField::DeviceId), &[29708.0, 29708.0]);
        assert_eq!(snapshot.accelerator_values(AcceleratorField::PowerCap), &[500000000.0, SENTINEL]);
        assert_eq!(snapshot.accelerator_values(AcceleratorField::Power), &[300000.0, 250000.0]);
        assert_eq!(snapshot.accelerator_values(AcceleratorField::Temperature), &[45000.0, 51000.0]);
        assert_eq!(snapshot.accelerator_values(AcceleratorField::CoreClock), &[800000000.0, SENTINEL]);
        assert_eq!(snapshot.accelerator_values(AcceleratorField::MemoryClock), &[1600000000.0, SENTINEL]);
        assert_eq!(snapshot.accelerator_values(AcceleratorField::Utilization), &[42.0, SENTINEL]);
        assert_eq!(snapshot.accelerator_values(AcceleratorField::MemoryUtilization), &[7.0, SENTINEL]);
    }

    #[test]
    fn test_empty_tree() {
        let dir = TempDir::new().unwrap();

        let snapshot = SysfsScanner::new(dir.path()).scan();

        assert_eq!(snapshot.threads, 0);
        assert_eq!(snapshot.sockets, 0);
        assert_eq!(snapshot.threads_per_core, 0);
        assert_eq!(snapshot.num_accelerators, 0);
    }

    #[test]
    fn test_cpu_list_len() {
        assert_eq!(cpu_list_len("0,64"), 2);
        assert_eq!(cpu_list_len("0-1"), 2);
        assert_eq!(cpu_list_len("0-3,8"), 5);
        assert_eq!(cpu_list_len("5"), 1);
        assert_eq!(cpu_list_len(""), 0);
    }

    #[test]
    fn test_read_hex() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "device", "0x740c\n");
        write(dir.path(), "bogus", "zz\n");

        assert_eq!(read_hex(&dir.path().join("device")), Some(29708.0));
        assert_eq!(read_hex(&dir.path().join("bogus")), None);
        assert_eq!(read_hex(&dir.path().join("missing")), None);
    }
}
