//! Static accelerator identity
//!
//! The registry is fetched once at startup and shared read-only by every collection pass.

use crate::snapshot::MAX_ACCELERATORS;
use serde::{Deserialize, Serialize};

/// Resource name the device plugin advertises for AMD accelerators
pub const AMD_RESOURCE_NAME: &str = "amd.com/gpu";

/// Suffix marker of GKE-style virtual GPU device identifiers
pub const VGPU_DEVICE_ID_SEPARATOR: &str = "/vgpu";

/// Suffix marker of AMD MxGPU virtual function device identifiers
pub const MXGPU_DEVICE_ID_SEPARATOR: &str = "/mxgpu";

/// Identity and metadata of one accelerator slot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(rename = "cardseries", default)]
    pub series: String,

    #[serde(rename = "cardmodel", default)]
    pub model: String,

    #[serde(rename = "cardvendor", default)]
    pub vendor: String,

    #[serde(rename = "cardsku", default)]
    pub sku: String,

    /// PCI bus address, also the key workload bindings are looked up under
    #[serde(rename = "pcibus", default)]
    pub bus_address: String,

    #[serde(rename = "guid", default)]
    pub guid: String,
}

/// Accelerator identities indexed by the same slot as the snapshot arrays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRegistry {
    slots: Vec<DeviceInfo>,
}

impl DeviceRegistry {
    /// Empty registry with every slot unset
    pub fn new() -> Self {
        Self {
            slots: vec![DeviceInfo::default(); MAX_ACCELERATORS],
        }
    }

    /// Build a registry from slot-ordered entries. Entries past capacity are dropped.
    pub fn from_slots(slots: impl IntoIterator<Item = DeviceInfo>) -> Self {
        let mut registry = Self::new();
        for (slot, info) in slots.into_iter().take(MAX_ACCELERATORS).enumerate() {
            registry.slots[slot] = info;
        }
        registry
    }

    /// Store `info` at `slot`; returns false when the slot is out of range
    pub fn set(&mut self, slot: usize, info: DeviceInfo) -> bool {
        match self.slots.get_mut(slot) {
            Some(entry) => {
                *entry = info;
                true
            }
            None => false,
        }
    }

    /// Slot metadata, or `None` past capacity
    pub fn get(&self, slot: usize) -> Option<&DeviceInfo> {
        self.slots.get(slot)
    }

    /// Product series of a slot, empty when unknown
    pub fn series(&self, slot: usize) -> &str {
        self.get(slot).map(|info| info.series.as_str()).unwrap_or_default()
    }

    /// Bus address of a slot, empty when unknown
    pub fn bus_address(&self, slot: usize) -> &str {
        self.get(slot).map(|info| info.bus_address.as_str()).unwrap_or_default()
    }

    /// Number of slots that carry a bus address
    pub fn populated(&self) -> usize {
        self.slots.iter().filter(|info| !info.bus_address.is_empty()).count()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(bus: &str) -> DeviceInfo {
        DeviceInfo {
            series: "amdinstinctmi250(mcm)oamacmba".to_string(),
            bus_address: bus.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_registry_slots() {
        let registry = DeviceRegistry::from_slots(vec![card("0000:b3:00.0"), card("0000:8e:00.0")]);

        assert_eq!(registry.bus_address(1), "0000:8e:00.0");
        assert_eq!(registry.series(0), "amdinstinctmi250(mcm)oamacmba");
        assert_eq!(registry.bus_address(5), "");
        assert_eq!(registry.populated(), 2);
    }

    #[test]
    fn test_out_of_range_slot() {
        let mut registry = DeviceRegistry::new();
        assert!(!registry.set(MAX_ACCELERATORS, card("0000:01:00.0")));
        assert!(registry.get(MAX_ACCELERATORS).is_none());
        assert_eq!(registry.series(MAX_ACCELERATORS), "");
    }

    #[test]
    fn test_device_info_field_names() {
        let info: DeviceInfo =
            serde_json::from_str(r#"{"cardseries":"mi210","pcibus":"0000:31:00.0","guid":"63755"}"#)
                .unwrap();
        assert_eq!(info.series, "mi210");
        assert_eq!(info.bus_address, "0000:31:00.0");
        assert_eq!(info.guid, "63755");
        assert!(info.sku.is_empty());
    }
}
