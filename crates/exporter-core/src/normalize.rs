//! Device identifier normalization
//!
//! The allocation API reports devices in several shapes depending on how the device plugin
//! partitions them. Each identifier is filed under its raw form plus the canonical keys
//! computed here, so a physical device can be found by bus address or partition index.

use crate::device::{MXGPU_DEVICE_ID_SEPARATOR, VGPU_DEVICE_ID_SEPARATOR};

/// Extra keys a raw device identifier should be filed under.
///
/// Rules are tried in order and the first match wins:
/// 1. `amd<index>/gi<instance>` becomes `<index>-<instance>`
/// 2. anything before a `/vgpu` marker
/// 3. anything before a `/mxgpu` marker
/// 4. anything before the first `:`
///
/// Rule 4 turns PCI addresses like `0000:b3:00.0` into the domain `0000`, which every device on
/// that domain shares. Callers always also file the raw identifier.
pub fn additional_device_keys(device_id: &str) -> Vec<String> {
    if let Some((index, instance)) = partition_instance(device_id) {
        return vec![format!("{index}-{instance}")];
    }

    for separator in [VGPU_DEVICE_ID_SEPARATOR, MXGPU_DEVICE_ID_SEPARATOR, ":"] {
        if let Some((head, _)) = device_id.split_once(separator) {
            return vec![head.to_string()];
        }
    }

    Vec::new()
}

/// Parse `amd<digits>/gi<digits>`, anchored on both ends
fn partition_instance(device_id: &str) -> Option<(&str, &str)> {
    let (index, instance) = device_id.strip_prefix("amd")?.split_once("/gi")?;
    if is_digits(index) && is_digits(instance) {
        Some((index, instance))
    } else {
        None
    }
}

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}
